use std::time::Duration;

use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::TextNotifier;
use crate::config::EmailCredentials;

/// Sends texts through an SMTP relay to carrier SMS gateways.
/// Built without lettre's `pool` feature: one SMTP session per send.
pub struct EmailTexter {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailTexter {
    pub fn new(creds: &EmailCredentials, timeout: Duration) -> Result<Self> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&creds.url)
            .with_context(|| format!("invalid SMTP host {:?}", creds.url))?
            .credentials(Credentials::new(creds.user.clone(), creds.pass.clone()))
            .timeout(Some(timeout))
            .build();

        let from_addr = creds.from.as_deref().unwrap_or(&creds.user);
        let from = from_addr
            .parse()
            .with_context(|| format!("invalid sender address {from_addr:?}"))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait::async_trait]
impl TextNotifier for EmailTexter {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient {to:?}"))?;

        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
