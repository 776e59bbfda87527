//! Outbound notification with failure classification.
//!
//! The dispatcher never marks a task sent unless `send` returned `Ok`, so
//! every error here leaves the task eligible for the next scan.

mod sendgrid;

pub use sendgrid::SendGridMailer;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail send timed out")]
    Timeout,

    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail provider rejected the request: status {status}")]
    Provider { status: u16 },
}

impl NotifyError {
    /// Whether a retry on a later tick is likely to succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::Timeout | NotifyError::Transport(_) => true,
            NotifyError::Provider { status } => *status == 429 || *status >= 500,
        }
    }
}

/// Sends a single email. Implementations must bound how long a send can
/// block; a timeout is reported as [`NotifyError::Timeout`].
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}
