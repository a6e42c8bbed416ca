pub mod email;
pub mod gateway;

use std::time::Duration;

use anyhow::Result;
use metrics::counter;
use serde::Serialize;

pub use email::EmailTexter;
pub use gateway::{sms_gateway_address, Carrier};

/// "Send this text to that address."
#[async_trait::async_trait]
pub trait TextNotifier: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Logs messages instead of sending them (dry runs, local development).
pub struct LogNotifier;

#[async_trait::async_trait]
impl TextNotifier for LogNotifier {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        tracing::info!(target: "notify", to, body, "dry-run text");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Send each message to every recipient, batch by batch, in order.
///
/// Batches are separated by `gap` so the transport cannot reorder them;
/// each send is bounded by `timeout`. A failed send is logged and skipped.
pub async fn deliver(
    notifier: &dyn TextNotifier,
    recipients: &[String],
    messages: &[String],
    gap: Duration,
    timeout: Duration,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for (i, body) in messages.iter().enumerate() {
        if i > 0 && !gap.is_zero() {
            tokio::time::sleep(gap).await;
        }
        for to in recipients {
            match tokio::time::timeout(timeout, notifier.send_text(to, body)).await {
                Ok(Ok(())) => {
                    report.sent += 1;
                    counter!("notify_sent_total").increment(1);
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    counter!("notify_failed_total").increment(1);
                    tracing::warn!(
                        target: "notify",
                        notifier = notifier.name(),
                        to = %to,
                        error = %format!("{e:#}"),
                        "send failed"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    counter!("notify_failed_total").increment(1);
                    tracing::warn!(
                        target: "notify",
                        notifier = notifier.name(),
                        to = %to,
                        timeout_ms = timeout.as_millis() as u64,
                        "send timed out"
                    );
                }
            }
        }
    }
    report
}
