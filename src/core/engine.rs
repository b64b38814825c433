use crate::config::toml_config::EngineConfig;
use crate::core::composer::Composer;
use crate::core::entropy_filter::EntropyFilter;
use crate::core::fragmenter::Fragmenter;
use crate::core::generator::Generator;
use crate::core::recorder::Recorder;
use crate::core::signals::{shutdown_channel, LlmGate, PulseSwitch};
use crate::core::stage::{Stage, StageContext};
use crate::core::stats::{EngineStats, StatsSnapshot};
use crate::core::synthesizer::{KeywordSynthesizer, Synthesizer};
use crate::domain::model::{Pulse, WorkspaceLayout};
use crate::domain::ports::{ScriptRunner, Storage, TextGenerator};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 一次運行的摘要，同時寫入 run_summary.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub execution_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub initial_pulse: Pulse,
    pub final_pulse: Pulse,
    pub stats: StatsSnapshot,
    pub stage_errors: Vec<String>,
}

/// 啟動六個階段、計時、關閉並彙整結果
pub struct SpiralEngine<S: Storage + Clone + 'static> {
    config: EngineConfig,
    storage: S,
    generator: Arc<dyn TextGenerator>,
    runner: Arc<dyn ScriptRunner>,
    layout: WorkspaceLayout,
    monitor: SystemMonitor,
}

impl<S: Storage + Clone + 'static> SpiralEngine<S> {
    pub fn new(
        config: EngineConfig,
        storage: S,
        generator: Arc<dyn TextGenerator>,
        runner: Arc<dyn ScriptRunner>,
    ) -> Self {
        Self::new_with_monitoring(config, storage, generator, runner, false)
    }

    pub fn new_with_monitoring(
        config: EngineConfig,
        storage: S,
        generator: Arc<dyn TextGenerator>,
        runner: Arc<dyn ScriptRunner>,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            config,
            storage,
            generator,
            runner,
            layout: WorkspaceLayout::new(),
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// 建立 generated_scripts/ 下所有目錄
    pub async fn prepare_workspace(&self) -> Result<()> {
        for dir in self.layout.all_dirs() {
            self.storage.ensure_dir(&dir).await?;
        }
        tracing::info!("📁 Ensured workspace directories under {}", self.layout.root());
        Ok(())
    }

    /// 依配置時長運行
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_until(std::future::pending()).await
    }

    /// 運行到時限結束或 stop 完成 (例如 Ctrl-C)
    pub async fn run_until<F>(&self, stop: F) -> Result<RunSummary>
    where
        F: Future<Output = ()> + Send,
    {
        self.prepare_workspace().await?;

        let started_at = Utc::now();
        let execution_id = format!("spiral_{}", started_at.format("%Y%m%d_%H%M%S"));
        let start = Instant::now();
        let initial_pulse = self.config.engine.initial_pulse;

        let (trigger, shutdown) = shutdown_channel();
        let ctx = StageContext {
            shutdown,
            gate: LlmGate::new(),
            pulse: PulseSwitch::new(initial_pulse),
            stats: Arc::new(EngineStats::default()),
        };

        let handles: Vec<(&'static str, JoinHandle<Result<()>>)> = self
            .build_stages()?
            .into_iter()
            .map(|stage| {
                let name = stage.name();
                tracing::info!("▶️ Starting stage: {}", name);
                (name, tokio::spawn(stage.run(ctx.clone())))
            })
            .collect();

        tracing::info!(
            "🚀 Spiral engine {} running for {:?} (initial pulse: {})",
            execution_id,
            self.config.run_duration(),
            initial_pulse
        );
        self.monitor.log_stats("Engine started", &ctx.stats.snapshot());

        tokio::select! {
            _ = tokio::time::sleep(self.config.run_duration()) => {
                tracing::info!("⏱️ Run duration reached");
            }
            _ = stop => {
                tracing::info!("🛑 Stop requested");
            }
        }

        self.monitor.log_stats("Shutting down", &ctx.stats.snapshot());
        trigger.trigger();
        let stage_errors = self.join_stages(handles, self.config.shutdown_grace()).await;

        let summary = RunSummary {
            execution_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            initial_pulse,
            final_pulse: ctx.pulse.current(),
            stats: ctx.stats.snapshot(),
            stage_errors,
        };

        self.write_summary(&summary).await?;
        self.monitor.log_final_stats(&summary.stats);
        tracing::info!(
            "✅ Run complete: {} generated, {} evaluated ({} stable, {} unstable), {} pulse switches",
            summary.stats.generations,
            summary.stats.evaluated(),
            summary.stats.stable,
            summary.stats.unstable,
            summary.stats.pulse_switches
        );
        if let Some(ratio) = summary.stats.stability_ratio() {
            tracing::info!("⚖️ Stability ratio: {:.1}%", ratio * 100.0);
        }

        Ok(summary)
    }

    fn build_stages(&self) -> Result<Vec<Box<dyn Stage>>> {
        let capacity = self.config.engine.channel_capacity;
        let (raw_tx, raw_rx) = mpsc::channel(capacity);
        let (fragments_tx, fragments_rx) = mpsc::channel(capacity);
        let (keywords_tx, keywords_rx) = mpsc::channel(capacity);
        let (content_tx, content_rx) = mpsc::channel(capacity);
        let (artifact_tx, artifact_rx) = mpsc::channel(capacity);
        // 回傳方向用無界通道，避免環狀背壓死鎖
        let (journal_tx, journal_rx) = mpsc::unbounded_channel();
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();

        let generator_config = &self.config.generator;
        // 兩個隨機源使用不同種子
        let synth_seed = generator_config.seed.map(|seed| seed.wrapping_add(1));

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(Generator::new(
                raw_tx,
                generator_config.batch_size,
                self.config.generation_interval(),
                generator_config.seed,
            )),
            Box::new(Fragmenter::new(raw_rx, fragments_tx)?),
            Box::new(Synthesizer::new(
                KeywordSynthesizer::new(generator_config.max_keywords, synth_seed),
                fragments_rx,
                keywords_tx,
                journal_tx.clone(),
            )),
            Box::new(Composer::new(
                self.generator.clone(),
                self.config.model_for(Pulse::PythonScript).to_string(),
                self.config.model_for(Pulse::SeoContent).to_string(),
                keywords_rx,
                feedback_rx,
                content_tx,
            )?),
            Box::new(Recorder::new(
                self.storage.clone(),
                self.layout.clone(),
                content_rx,
                journal_rx,
                feedback_tx,
                artifact_tx,
            )),
            Box::new(EntropyFilter::new(
                self.storage.clone(),
                self.layout.clone(),
                self.runner.clone(),
                artifact_rx,
                journal_tx,
            )),
        ];
        Ok(stages)
    }

    /// 等待各階段結束，超過寬限期的強制中止
    async fn join_stages(
        &self,
        handles: Vec<(&'static str, JoinHandle<Result<()>>)>,
        grace: Duration,
    ) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, mut handle) in handles {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(Ok(()))) => tracing::debug!("Stage {} stopped", name),
                Ok(Ok(Err(e))) => {
                    tracing::error!("❌ Stage {} failed: {}", name, e);
                    errors.push(format!("{}: {}", name, e));
                }
                Ok(Err(join_error)) => {
                    tracing::error!("❌ Stage {} panicked: {}", name, join_error);
                    errors.push(format!("{}: {}", name, join_error));
                }
                Err(_) => {
                    tracing::warn!(
                        "⚠️ Stage {} did not terminate within {:?}, aborting",
                        name,
                        grace
                    );
                    handle.abort();
                    errors.push(format!("{}: aborted after {:?}", name, grace));
                }
            }
        }

        errors
    }

    async fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        let json = serde_json::to_string_pretty(summary)?;
        self.storage
            .write_file(&self.layout.summary_path(), json.as_bytes())
            .await?;
        tracing::debug!("Run summary written to {}", self.layout.summary_path());
        Ok(())
    }
}
