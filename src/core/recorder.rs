use crate::core::stage::{forward, Stage, StageContext};
use crate::core::stats::bump;
use crate::domain::model::{Artifact, Envelope, Feedback, JournalEntry, Pulse, WorkspaceLayout};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub fn artifact_file_name(kind: Pulse, created_at: DateTime<Utc>, sequence: u64) -> String {
    let timestamp = created_at.format("%Y%m%d_%H%M%S");
    match kind {
        Pulse::PythonScript => format!("script_{}_{:04}.py", timestamp, sequence),
        Pulse::SeoContent => format!("seo_{}_{:04}.txt", timestamp, sequence),
    }
}

/// 記錄階段：落地生成內容、寫日誌、把回饋轉給 composer
pub struct Recorder<S: Storage> {
    storage: S,
    layout: WorkspaceLayout,
    input: mpsc::Receiver<Envelope<String>>,
    journal: mpsc::UnboundedReceiver<JournalEntry>,
    feedback: mpsc::UnboundedSender<Feedback>,
    output: mpsc::Sender<Artifact>,
    sequence: u64,
}

impl<S: Storage> Recorder<S> {
    pub fn new(
        storage: S,
        layout: WorkspaceLayout,
        input: mpsc::Receiver<Envelope<String>>,
        journal: mpsc::UnboundedReceiver<JournalEntry>,
        feedback: mpsc::UnboundedSender<Feedback>,
        output: mpsc::Sender<Artifact>,
    ) -> Self {
        Self {
            storage,
            layout,
            input,
            journal,
            feedback,
            output,
            sequence: 0,
        }
    }

    pub async fn persist(&mut self, envelope: &Envelope<String>) -> Result<Artifact> {
        self.sequence += 1;
        let file_name = artifact_file_name(envelope.kind, envelope.created_at, self.sequence);
        let path = format!("{}/{}", self.layout.active_dir(envelope.kind), file_name);

        self.storage
            .write_file(&path, envelope.content.as_bytes())
            .await?;
        tracing::info!("💾 Saved {} to {}", envelope.kind, path);

        Ok(Artifact {
            kind: envelope.kind,
            file_name,
            path,
        })
    }

    pub async fn record(&mut self, entry: JournalEntry) {
        match serde_json::to_string(&entry) {
            Ok(mut line) => {
                line.push('\n');
                if let Err(e) = self
                    .storage
                    .append_file(&self.layout.journal_path(), line.as_bytes())
                    .await
                {
                    tracing::warn!("⚠️ Failed to append journal entry: {}", e);
                }
            }
            Err(e) => tracing::warn!("⚠️ Failed to serialize journal entry: {}", e),
        }

        if let JournalEntry::Feedback(feedback) = entry {
            if self.feedback.send(feedback).is_err() {
                tracing::debug!("Composer gone, feedback dropped");
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage + 'static> Stage for Recorder<S> {
    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn run(mut self: Box<Self>, mut ctx: StageContext) -> Result<()> {
        tracing::info!("📚 Recorder entering main loop");

        loop {
            tokio::select! {
                biased;
                _ = ctx.shutdown.triggered() => break,
                Some(entry) = self.journal.recv() => self.record(entry).await,
                received = self.input.recv() => {
                    let Some(envelope) = received else { break };
                    match self.persist(&envelope).await {
                        Ok(artifact) => {
                            bump(&ctx.stats.artifacts_written);
                            if !forward(&self.output, artifact, &mut ctx.shutdown, "recorder").await? {
                                break;
                            }
                        }
                        Err(e) => {
                            bump(&ctx.stats.write_failures);
                            tracing::error!("❌ Failed to save {} content: {}", envelope.kind, e);
                        }
                    }
                }
            }
        }

        // 關閉前寫完剩餘日誌
        while let Ok(entry) = self.journal.try_recv() {
            self.record(entry).await;
        }

        tracing::info!("Recorder shutting down");
        Ok(())
    }
}
