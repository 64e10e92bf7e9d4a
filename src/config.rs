//! Runtime configuration for the session core.
//!
//! Deployment-specific knobs live in one value handed to each component at
//! construction time; nothing in the crate reads ambient globals.

use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_OTP_TTL_SECS: u64 = 15 * 60;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Configuration shared by the session manager, recovery flow, and poller.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    api_base_url: String,
    request_timeout: Duration,
    otp_ttl: Duration,
    resend_cooldown: Option<Duration>,
    poll_interval: Duration,
    default_service_scope: Option<String>,
}

impl CoreConfig {
    #[must_use]
    pub fn new(api_base_url: String) -> Self {
        Self {
            api_base_url,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            otp_ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECS),
            resend_cooldown: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            default_service_scope: None,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Fallback validity window for one-time codes when the server response
    /// does not carry its own expiry.
    #[must_use]
    pub fn with_otp_ttl(mut self, ttl: Duration) -> Self {
        self.otp_ttl = ttl;
        self
    }

    /// Gate on code resends. `None` keeps resend locked until the current
    /// code's countdown has elapsed.
    #[must_use]
    pub fn with_resend_cooldown(mut self, cooldown: Duration) -> Self {
        self.resend_cooldown = Some(cooldown);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Scope sent with login requests when the caller passes none, for
    /// deployments pinned to a single service vertical.
    #[must_use]
    pub fn with_default_service_scope(mut self, scope: String) -> Self {
        self.default_service_scope = Some(scope);
        self
    }

    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        self.otp_ttl
    }

    #[must_use]
    pub fn resend_cooldown(&self) -> Option<Duration> {
        self.resend_cooldown
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn default_service_scope(&self) -> Option<&str> {
        self.default_service_scope.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = CoreConfig::new("https://api.example.com".to_string());

        assert_eq!(config.api_base_url(), "https://api.example.com");
        assert_eq!(
            config.request_timeout(),
            Duration::from_secs(super::DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(
            config.otp_ttl(),
            Duration::from_secs(super::DEFAULT_OTP_TTL_SECS)
        );
        assert_eq!(config.resend_cooldown(), None);
        assert_eq!(
            config.poll_interval(),
            Duration::from_secs(super::DEFAULT_POLL_INTERVAL_SECS)
        );
        assert_eq!(config.default_service_scope(), None);

        let config = config
            .with_request_timeout(Duration::from_secs(3))
            .with_otp_ttl(Duration::from_secs(120))
            .with_resend_cooldown(Duration::from_secs(30))
            .with_poll_interval(Duration::from_secs(5))
            .with_default_service_scope("moving".to_string());

        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.otp_ttl(), Duration::from_secs(120));
        assert_eq!(config.resend_cooldown(), Some(Duration::from_secs(30)));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.default_service_scope(), Some("moving"));
    }
}
