//! Outbound mail seam used by `User::email_user`.

use async_trait::async_trait;
use tracing::info;

use crate::error::AppResult;

/// Sends plain-text email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(
        &self,
        subject: &str,
        message: &str,
        from_email: Option<&str>,
        recipients: &[String],
    ) -> AppResult<()>;
}

/// Mailer that only logs. Used until a real transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    pub default_from: Option<String>,
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_mail(
        &self,
        subject: &str,
        message: &str,
        from_email: Option<&str>,
        recipients: &[String],
    ) -> AppResult<()> {
        let from = from_email
            .or(self.default_from.as_deref())
            .unwrap_or("webmaster@localhost");
        info!(
            target: "mail",
            from = %from,
            to = ?recipients,
            subject = %subject,
            body_len = message.len(),
            "Mail queued"
        );
        Ok(())
    }
}
