//! Outbound notification contract
//!
//! Auth flows hand finished tokens to a [`Mailer`] and move on; the actual
//! transport lives behind the trait. [`LogMailer`] writes messages to the
//! log, which is enough for development and tests.

use async_trait::async_trait;

/// Mail delivery error types
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    SendFailed(String),
}

/// Delivery port consumed by the auth flows
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Deliver a password reset token to the given address
    async fn send_password_reset(
        &self,
        email: &str,
        token: &str,
        display_name: Option<&str>,
    ) -> Result<(), MailError>;

    /// Deliver an email verification token to the given address
    async fn send_email_verification(
        &self,
        email: &str,
        token: &str,
        display_name: Option<&str>,
    ) -> Result<(), MailError>;
}

/// Mailer that logs instead of sending. Raw tokens end up in the log, so
/// this must never back a production deployment.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(
        &self,
        email: &str,
        token: &str,
        display_name: Option<&str>,
    ) -> Result<(), MailError> {
        tracing::info!(
            email = %email,
            name = display_name.unwrap_or(""),
            token = %token,
            "password reset email (log transport)"
        );
        Ok(())
    }

    async fn send_email_verification(
        &self,
        email: &str,
        token: &str,
        display_name: Option<&str>,
    ) -> Result<(), MailError> {
        tracing::info!(
            email = %email,
            name = display_name.unwrap_or(""),
            token = %token,
            "email verification email (log transport)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = LogMailer;

        let reset = mailer
            .send_password_reset("user@example.com", "abc123", Some("Test User"))
            .await;
        assert!(reset.is_ok());

        let verify = mailer
            .send_email_verification("user@example.com", "def456", None)
            .await;
        assert!(verify.is_ok());
    }

    #[test]
    fn test_mail_error_display() {
        let err = MailError::SendFailed("connection refused".to_string());
        assert_eq!(
            format!("{}", err),
            "Mail delivery failed: connection refused"
        );
    }
}
