use crate::core::stage::{Stage, StageContext};
use crate::core::stats::bump;
use crate::domain::model::{Artifact, Feedback, JournalEntry, Pulse, Stability, Verdict, WorkspaceLayout};
use crate::domain::ports::{RunOutcome, ScriptRunner, Storage};
use crate::utils::error::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const FILTER_SOURCE: &str = "entropy_filter";

/// 把腳本執行結果轉成穩定性判定
pub fn verdict_from_outcome(outcome: Result<RunOutcome>) -> Verdict {
    match outcome {
        Ok(RunOutcome::Success) => Verdict::stable(),
        Ok(RunOutcome::Failed { stderr, .. }) if stderr.trim().is_empty() => {
            Verdict::unstable("No specific error output.")
        }
        Ok(RunOutcome::Failed { stderr, .. }) => Verdict::unstable(stderr.trim()),
        Ok(RunOutcome::TimedOut { .. }) => Verdict::unstable("Script timed out."),
        Err(e) => Verdict::unstable(format!("Execution error: {}", e)),
    }
}

/// 熵過濾器：測試生成內容、歸檔並切換脈衝
pub struct EntropyFilter<S: Storage> {
    storage: S,
    layout: WorkspaceLayout,
    runner: Arc<dyn ScriptRunner>,
    input: mpsc::Receiver<Artifact>,
    journal: mpsc::UnboundedSender<JournalEntry>,
}

impl<S: Storage> EntropyFilter<S> {
    pub fn new(
        storage: S,
        layout: WorkspaceLayout,
        runner: Arc<dyn ScriptRunner>,
        input: mpsc::Receiver<Artifact>,
        journal: mpsc::UnboundedSender<JournalEntry>,
    ) -> Self {
        Self {
            storage,
            layout,
            runner,
            input,
            journal,
        }
    }

    pub async fn evaluate(&self, artifact: &Artifact) -> Verdict {
        match artifact.kind {
            Pulse::PythonScript => {
                tracing::info!("🧪 Testing Python script: {}", artifact.path);
                let script = self.storage.locate(&artifact.path);
                verdict_from_outcome(self.runner.run(&script).await)
            }
            Pulse::SeoContent => {
                tracing::info!("🔍 Validating SEO content: {}", artifact.path);
                match self.storage.read_file(&artifact.path).await {
                    Ok(bytes) if String::from_utf8_lossy(&bytes).trim().is_empty() => {
                        Verdict::unstable("Content is empty.")
                    }
                    Ok(_) => Verdict::stable(),
                    Err(e) => Verdict::unstable(format!("File read error: {}", e)),
                }
            }
        }
    }

    /// 移到對應的歸檔目錄，回傳目的路徑
    pub async fn archive(&self, artifact: &Artifact, status: Stability) -> Result<String> {
        let destination = format!(
            "{}/{}",
            self.layout.archive_dir(artifact.kind, status),
            artifact.file_name
        );
        self.storage.move_file(&artifact.path, &destination).await?;
        Ok(destination)
    }

    fn journal(&self, entry: JournalEntry) {
        if self.journal.send(entry).is_err() {
            tracing::debug!("Journal closed, entry dropped");
        }
    }

    async fn process(&self, artifact: Artifact, ctx: &StageContext) {
        let verdict = self.evaluate(&artifact).await;
        match verdict.status {
            Stability::Stable => {
                bump(&ctx.stats.stable);
                tracing::info!("✅ {} {} is STABLE", artifact.kind, artifact.file_name);
            }
            Stability::Unstable => {
                bump(&ctx.stats.unstable);
                tracing::warn!(
                    "⚠️ {} {} is UNSTABLE: {}",
                    artifact.kind,
                    artifact.file_name,
                    verdict.error
                );
            }
        }

        self.journal(JournalEntry::Feedback(Feedback::from_verdict(
            FILTER_SOURCE,
            artifact.kind,
            &verdict,
        )));

        match self.archive(&artifact, verdict.status).await {
            Ok(destination) => {
                tracing::info!("📦 Archived {} as {} to {}", artifact.file_name, verdict.status, destination);
                self.journal(JournalEntry::Archived {
                    kind: artifact.kind,
                    file_name: artifact.file_name.clone(),
                    status: verdict.status,
                    destination,
                });
            }
            Err(e) => {
                tracing::error!("❌ Error archiving {} from {}: {}", artifact.file_name, artifact.path, e);
            }
        }

        // 穩定與否都切換，避免卡在同一種脈衝
        let next = ctx.pulse.toggle();
        bump(&ctx.stats.pulse_switches);
        tracing::info!("🔄 PULSE SWITCH: processed {} output, switching to {}", artifact.kind, next);
    }
}

#[async_trait::async_trait]
impl<S: Storage + 'static> Stage for EntropyFilter<S> {
    fn name(&self) -> &'static str {
        "entropy_filter"
    }

    async fn run(mut self: Box<Self>, mut ctx: StageContext) -> Result<()> {
        tracing::info!("⚖️ Entropy filter entering main loop");

        loop {
            let artifact = tokio::select! {
                biased;
                _ = ctx.shutdown.triggered() => break,
                received = self.input.recv() => match received {
                    Some(artifact) => artifact,
                    None => break,
                },
            };
            self.process(artifact, &ctx).await;
        }

        tracing::info!("Entropy filter shutting down");
        Ok(())
    }
}
