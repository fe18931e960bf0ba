//! Backup run notifications
//!
//! Every scheduled or manual run produces one [`RunSummary`], rendered into
//! both channels: a plaintext email and a colored chat-webhook attachment.
//! The dispatcher always attempts every channel; a channel failure is
//! logged on its own and never suppresses the other channel or masks the
//! backup outcome.

use crate::error::{BackupError, BackupResult};
use crate::metadata::{BackupMetadata, BackupStatus};
use crate::utils::BackupUtils;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::Mailbox, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;
use tracing::{error, info};

/// Shared success/failure summary of one backup run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Job name ("daily-incremental", "manual-full", ...)
    pub job: String,
    /// Overall run outcome
    pub success: bool,
    /// Wall-clock duration of the run
    pub duration: std::time::Duration,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Artifacts produced by the run
    pub artifacts: Vec<ArtifactSummary>,
    /// Raw error text for failed runs
    pub error: Option<String>,
}

/// One produced artifact, as rendered into notifications
#[derive(Debug, Clone)]
pub struct ArtifactSummary {
    /// Backup id
    pub id: String,
    /// Final status
    pub status: BackupStatus,
    /// Artifact size in bytes
    pub size: u64,
}

impl From<&BackupMetadata> for ArtifactSummary {
    fn from(m: &BackupMetadata) -> Self {
        Self {
            id: m.id.clone(),
            status: m.status,
            size: m.size,
        }
    }
}

impl RunSummary {
    /// Email subject / webhook title
    pub fn title(&self) -> String {
        if self.success {
            format!("✅ CÁRIS backup succeeded: {}", self.job)
        } else {
            format!("❌ CÁRIS backup failed: {}", self.job)
        }
    }

    /// Plaintext body shared by both channels
    pub fn body(&self) -> String {
        let mut lines = vec![
            format!("Job: {}", self.job),
            format!("Duration: {:.1}s", self.duration.as_secs_f64()),
        ];
        for artifact in &self.artifacts {
            lines.push(format!(
                "Artifact {} [{:?}] {}",
                artifact.id,
                artifact.status,
                BackupUtils::format_size(artifact.size)
            ));
        }
        if let Some(err) = &self.error {
            lines.push(format!("Error: {}", err));
        }
        lines.join("\n")
    }
}

/// A single notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for log lines
    fn channel(&self) -> &'static str;

    /// Deliver the summary
    async fn notify(&self, summary: &RunSummary) -> BackupResult<()>;
}

/// SMTP email channel
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// Create an email notifier from an SMTP relay host and addresses
    pub fn new(smtp_host: &str, from: &str, to: &str) -> BackupResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| BackupError::notification(format!("SMTP relay setup: {}", e)))?
            .build();
        let from = from
            .parse()
            .map_err(|e| BackupError::notification(format!("invalid from address: {}", e)))?;
        let to = to
            .parse()
            .map_err(|e| BackupError::notification(format!("invalid to address: {}", e)))?;
        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, summary: &RunSummary) -> BackupResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(summary.title())
            .body(summary.body())
            .map_err(|e| BackupError::notification(format!("building email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| BackupError::notification(format!("sending email: {}", e)))?;
        Ok(())
    }
}

/// Chat webhook channel posting a colored attachment
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a webhook notifier posting to `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, summary: &RunSummary) -> BackupResult<()> {
        let payload = json!({
            "attachments": [{
                "color": if summary.success { "#36a64f" } else { "#d00000" },
                "title": summary.title(),
                "text": summary.body(),
                "footer": "CÁRIS backup",
                "ts": summary.finished_at.timestamp(),
            }]
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackupError::notification(format!("webhook post: {}", e)))?;

        if !response.status().is_success() {
            return Err(BackupError::notification(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Fans one summary out to every configured channel
///
/// Channels are independent: each failure is logged with its channel name
/// and the remaining channels still run.
pub struct AlertDispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl AlertDispatcher {
    /// Create a dispatcher over the given channels
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Dispatcher with no channels (notifications disabled)
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Deliver `summary` on every channel
    pub async fn dispatch(&self, summary: &RunSummary) {
        for channel in &self.channels {
            match channel.notify(summary).await {
                Ok(()) => info!("📣 Notified {} channel for {}", channel.channel(), summary.job),
                Err(e) => error!(
                    "❌ {} notification failed for {}: {}",
                    channel.channel(),
                    summary.job,
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingNotifier {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn channel(&self) -> &'static str {
            self.name
        }

        async fn notify(&self, _summary: &RunSummary) -> BackupResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BackupError::notification("channel down"))
            } else {
                Ok(())
            }
        }
    }

    fn summary(success: bool) -> RunSummary {
        RunSummary {
            job: "weekly-full".into(),
            success,
            duration: std::time::Duration::from_secs(42),
            finished_at: Utc::now(),
            artifacts: vec![ArtifactSummary {
                id: "db_20250601T020000000_ab12cd34".into(),
                status: BackupStatus::Completed,
                size: 5 * 1024 * 1024,
            }],
            error: if success { None } else { Some("pg_dump exited with 1".into()) },
        }
    }

    #[tokio::test]
    async fn test_one_channel_failure_never_suppresses_the_other() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let dispatcher = AlertDispatcher::new(vec![
            Box::new(RecordingNotifier {
                name: "email",
                calls: first.clone(),
                fail: true,
            }),
            Box::new(RecordingNotifier {
                name: "webhook",
                calls: second.clone(),
                fail: false,
            }),
        ]);

        dispatcher.dispatch(&summary(true)).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_summary_rendering() {
        let ok = summary(true);
        assert!(ok.title().contains("succeeded"));
        assert!(ok.body().contains("weekly-full"));
        assert!(ok.body().contains("5.0 MiB"));

        let failed = summary(false);
        assert!(failed.title().contains("failed"));
        assert!(failed.body().contains("pg_dump exited with 1"));
    }
}
