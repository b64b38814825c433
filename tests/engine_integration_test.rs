use async_trait::async_trait;
use httpmock::prelude::*;
use spiral_engine::core::engine::RunSummary;
use spiral_engine::domain::model::Pulse;
use spiral_engine::domain::ports::{RunOutcome, ScriptRunner, TextGenerator};
use spiral_engine::{EngineConfig, LocalStorage, OllamaClient, SpiralEngine};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct FixedRunner {
    outcome: RunOutcome,
    scripts: Mutex<Vec<PathBuf>>,
}

impl FixedRunner {
    fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            scripts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ScriptRunner for FixedRunner {
    async fn run(&self, script: &Path) -> spiral_engine::Result<RunOutcome> {
        self.scripts.lock().unwrap().push(script.to_path_buf());
        Ok(self.outcome.clone())
    }
}

struct RecordingGenerator {
    prompts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> spiral_engine::Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));
        Ok("Sure!\n```python\nraise RuntimeError('kaboom')\n```".to_string())
    }
}

fn fast_config(seed: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.duration_secs = 20;
    config.engine.channel_capacity = 2;
    config.engine.shutdown_grace_secs = 2;
    config.generator.batch_size = 400;
    config.generator.interval_ms = 20;
    config.generator.seed = Some(seed);
    config
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

fn read_journal(base: &Path) -> Vec<serde_json::Value> {
    let journal = std::fs::read_to_string(base.join("generated_scripts/journal.jsonl")).unwrap();
    journal
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_spiral_with_mock_ollama() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_path_buf();

    let server = MockServer::start();
    let generate_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/generate")
            .body_contains("\"stream\":false");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "model": "tinydolphin:latest",
                "response": "Here is the script:\n```python\nprint('hello from the spiral')\n```",
                "done": true
            }));
    });

    let config = fast_config(42);
    let generator = Arc::new(OllamaClient::new(&server.base_url(), Duration::from_secs(5)).unwrap());
    let runner = Arc::new(FixedRunner::new(RunOutcome::Success));
    let engine = SpiralEngine::new(
        config,
        LocalStorage::new(base.clone()),
        generator,
        runner.clone(),
    );

    let stable_python = base.join("generated_scripts/lethian_archive/stable_python_scripts");
    let stable_seo = base.join("generated_scripts/lethian_archive/stable_seo_keywords");
    let summary = engine
        .run_until(async {
            while file_count(&stable_python) == 0 || file_count(&stable_seo) == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();

    assert!(generate_mock.hits() >= 2);
    assert!(summary.stage_errors.is_empty(), "{:?}", summary.stage_errors);
    assert!(summary.stats.stable >= 2);
    assert_eq!(summary.stats.unstable, 0);
    assert!(summary.stats.pulse_switches >= 2);
    assert_eq!(summary.initial_pulse, Pulse::PythonScript);

    // 歸檔的腳本只保留程式碼區塊內容
    let archived = std::fs::read_dir(&stable_python)
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    let script = std::fs::read_to_string(archived.path()).unwrap();
    assert_eq!(script, "print('hello from the spiral')");
    assert!(archived.file_name().to_string_lossy().starts_with("script_"));
    assert!(!runner.scripts.lock().unwrap().is_empty());

    let summary_path = base.join("generated_scripts/run_summary.json");
    let written: RunSummary =
        serde_json::from_str(&std::fs::read_to_string(summary_path).unwrap()).unwrap();
    assert_eq!(written.execution_id, summary.execution_id);
    assert_eq!(written.stats, summary.stats);

    let events: Vec<String> = read_journal(&base)
        .iter()
        .map(|entry| entry["event"].as_str().unwrap().to_string())
        .collect();
    assert!(events.iter().any(|e| e == "keywords"));
    assert!(events.iter().any(|e| e == "feedback"));
    assert!(events.iter().any(|e| e == "archived"));
}

#[tokio::test]
async fn test_failed_scripts_feed_back_into_prompts() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_path_buf();

    let mut config = fast_config(7);
    config.ollama.python_model = "py-model".to_string();
    config.ollama.seo_model = "seo-model".to_string();

    let generator = Arc::new(RecordingGenerator {
        prompts: Mutex::new(Vec::new()),
    });
    let runner = Arc::new(FixedRunner::new(RunOutcome::Failed {
        code: Some(1),
        stderr: "RuntimeError: kaboom\n".to_string(),
    }));
    let engine = SpiralEngine::new(
        config,
        LocalStorage::new(base.clone()),
        generator.clone(),
        runner,
    );

    let unstable_python = base.join("generated_scripts/lethian_archive/unstable_python_scripts");
    let summary = engine
        .run_until(async {
            loop {
                let corrected = generator
                    .prompts
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|(_, prompt)| prompt.contains("'RuntimeError: kaboom'"));
                if corrected && file_count(&unstable_python) > 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();

    assert!(summary.stats.unstable >= 1);
    assert!(summary.stats.pulse_switches >= 1);

    let prompts = generator.prompts.lock().unwrap().clone();
    assert_eq!(prompts[0].0, "py-model");
    assert!(!prompts[0].1.contains("previous attempt failed"));
    assert!(prompts.iter().any(|(_, prompt)| prompt.contains(
        "The previous attempt failed with error: 'RuntimeError: kaboom'. Please try to correct this and generate a working version."
    )));

    let feedback: Vec<serde_json::Value> = read_journal(&base)
        .into_iter()
        .filter(|entry| entry["event"] == "feedback" && entry["status"] == "UNSTABLE")
        .collect();
    assert!(!feedback.is_empty());
    assert_eq!(feedback[0]["error"], "RuntimeError: kaboom");
    assert_eq!(feedback[0]["kind"], "python_script");
}

#[tokio::test]
async fn test_ollama_errors_do_not_stop_the_engine() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_path_buf();

    let server = MockServer::start();
    let failing_mock = server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(500).body("model not loaded");
    });

    let mut config = fast_config(3);
    config.engine.duration_secs = 2;
    config.engine.initial_pulse = Pulse::SeoContent;

    let generator = Arc::new(OllamaClient::new(&server.base_url(), Duration::from_secs(2)).unwrap());
    let engine = SpiralEngine::new(
        config,
        LocalStorage::new(base.clone()),
        generator,
        Arc::new(FixedRunner::new(RunOutcome::Success)),
    );

    let summary = engine.run().await.unwrap();

    assert!(failing_mock.hits() >= 1);
    assert!(summary.stats.generation_failures >= 1);
    assert_eq!(summary.stats.generations, 0);
    assert_eq!(summary.stats.artifacts_written, 0);
    assert_eq!(summary.final_pulse, Pulse::SeoContent);
    assert!(summary.stage_errors.is_empty(), "{:?}", summary.stage_errors);

    assert!(base.join("generated_scripts/active/seo_keywords").is_dir());
    assert_eq!(file_count(&base.join("generated_scripts/active/seo_keywords")), 0);
    assert!(base.join("generated_scripts/run_summary.json").exists());
}

struct StuckRunner {
    started: tokio::sync::Notify,
}

#[async_trait]
impl ScriptRunner for StuckRunner {
    async fn run(&self, _script: &Path) -> spiral_engine::Result<RunOutcome> {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(RunOutcome::Success)
    }
}

#[tokio::test]
async fn test_stuck_stage_is_aborted_after_grace_period() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_path_buf();

    let mut config = fast_config(11);
    config.engine.shutdown_grace_secs = 1;

    let runner = Arc::new(StuckRunner {
        started: tokio::sync::Notify::new(),
    });
    let engine = SpiralEngine::new(
        config,
        LocalStorage::new(base.clone()),
        Arc::new(RecordingGenerator {
            prompts: Mutex::new(Vec::new()),
        }),
        runner.clone(),
    );

    let stopped_at = Mutex::new(None);
    let summary = engine
        .run_until(async {
            runner.started.notified().await;
            *stopped_at.lock().unwrap() = Some(std::time::Instant::now());
        })
        .await
        .unwrap();

    let stopped_at = stopped_at.lock().unwrap().expect("stop future resolved");
    // 只有卡住的階段會耗盡寬限期
    assert!(stopped_at.elapsed() < Duration::from_secs(4));

    assert_eq!(summary.stage_errors.len(), 1, "{:?}", summary.stage_errors);
    assert!(summary.stage_errors[0].starts_with("entropy_filter: aborted after"));
    assert_eq!(summary.stats.stable + summary.stats.unstable, 0);
    assert!(base.join("generated_scripts/run_summary.json").exists());
}
