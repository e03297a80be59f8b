use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// Outbound call made after a password reset token is issued.
#[async_trait]
pub trait PasswordResetNotifier: Send + Sync {
    async fn notify(&self, mail: &str, token: Uuid);
}

/// Writes the reset instructions to the log instead of sending a mail.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    pub reset_url: String,
}

impl LogNotifier {
    pub fn new(reset_url: impl Into<String>) -> Self {
        Self {
            reset_url: reset_url.into(),
        }
    }
}

#[async_trait]
impl PasswordResetNotifier for LogNotifier {
    async fn notify(&self, mail: &str, token: Uuid) {
        info!(
            mail,
            link = %format!("{}?token={}", self.reset_url, token),
            "password reset requested"
        );
    }
}
