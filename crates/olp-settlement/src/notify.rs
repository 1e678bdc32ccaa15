//! Operator notification channel.

use async_trait::async_trait;
use tracing::error;

/// Escalation channel for failures that need a human.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, subject: &str, detail: &str) -> anyhow::Result<()>;
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl OperatorNotifier for LogNotifier {
    async fn notify(&self, subject: &str, detail: &str) -> anyhow::Result<()> {
        error!("[NOTIFY] {}: {}", subject, detail);
        Ok(())
    }
}
