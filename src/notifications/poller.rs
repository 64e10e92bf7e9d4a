//! Background refresh of the unread notification counter.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::session::SessionManager;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountResponse {
    unread_count: u64,
}

/// Owns the polling task. Dropping the poller stops it.
pub struct NotificationPoller {
    handle: JoinHandle<()>,
    unread: watch::Receiver<u64>,
}

impl NotificationPoller {
    /// Starts polling `/notifications/unread-count` on a fixed interval.
    ///
    /// The first fetch happens immediately. Ticks while no session is active
    /// skip the network entirely, and fetch errors are logged without
    /// killing the loop.
    #[must_use]
    pub fn spawn(manager: Arc<SessionManager>, poll_interval: Duration) -> Self {
        let (tx, rx) = watch::channel(0);

        let handle = tokio::spawn(async move {
            // Intervals reject a zero period.
            let mut ticker = interval(poll_interval.max(Duration::from_millis(1)));

            loop {
                ticker.tick().await;

                if !manager.is_authenticated() {
                    debug!("Skipping unread poll: no active session");
                    continue;
                }

                match fetch_unread(&manager).await {
                    Ok(count) => {
                        // Send only fails once every receiver is gone.
                        let _ = tx.send(count);
                    }
                    Err(err) => warn!("Failed to fetch unread count: {err}"),
                }
            }
        });

        Self { handle, unread: rx }
    }

    /// A receiver that observes every published unread count.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.unread.clone()
    }

    /// Most recently published unread count, zero before the first fetch.
    #[must_use]
    pub fn latest(&self) -> u64 {
        *self.unread.borrow()
    }

    /// Stops the polling task, cancelling any in-flight fetch.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for NotificationPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn fetch_unread(manager: &SessionManager) -> Result<u64, ApiError> {
    let bearer = manager.bearer_token();
    let response: UnreadCountResponse = manager
        .api()
        .get_json("/notifications/unread-count", bearer.as_deref())
        .await?;

    Ok(response.unread_count)
}
