pub mod flow;
pub mod models;

pub use flow::RecoveryFlow;
pub use models::{RecoveryAttempt, RecoveryState, ResetToken};
