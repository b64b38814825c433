use anyhow::Context;
use clap::Parser;
use spiral_engine::domain::model::Pulse;
use spiral_engine::utils::error::{EngineError, ErrorCategory};
use spiral_engine::utils::validation::Validate;
use spiral_engine::CliArgs;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(content: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn test_cli_flags_override_config_file() -> anyhow::Result<()> {
    std::env::set_var("SPIRAL_IT_MODEL", "qwen2.5-coder:1.5b");
    let file = config_file(
        r#"
[engine]
duration_secs = 300
base_dir = "/tmp/spiral"

[generator]
batch_size = 2048
interval_ms = 250
seed = 99

[ollama]
base_url = "http://ollama.internal:11434"
python_model = "${SPIRAL_IT_MODEL}"
seo_model = "tinydolphin:latest"
timeout_secs = 45

[runner]
interpreter = "python3.12"
timeout_secs = 5
"#,
    )?;
    let path = file.path().to_str().context("temp path is not UTF-8")?;

    let args = CliArgs::parse_from([
        "spiral-engine",
        "--config",
        path,
        "--duration",
        "30",
        "--initial-pulse",
        "seo_content",
    ]);
    let config = args.load_config()?;
    config.validate()?;

    assert_eq!(config.run_duration(), Duration::from_secs(30));
    assert_eq!(config.engine.base_dir, "/tmp/spiral");
    assert_eq!(config.engine.initial_pulse, Pulse::SeoContent);
    assert_eq!(config.generator.batch_size, 2048);
    assert_eq!(config.generation_interval(), Duration::from_millis(250));
    assert_eq!(config.generator.seed, Some(99));
    assert_eq!(config.model_for(Pulse::PythonScript), "qwen2.5-coder:1.5b");
    assert_eq!(config.ollama_timeout(), Duration::from_secs(45));
    assert_eq!(config.runner.interpreter, "python3.12");
    assert_eq!(config.runner_timeout(), Duration::from_secs(5));
    Ok(())
}

#[test]
fn test_invalid_config_is_reported_as_configuration_error() -> anyhow::Result<()> {
    let file = config_file("[ollama]\nbase_url = \"not a url\"\n")?;
    let path = file.path().to_str().context("temp path is not UTF-8")?;
    let args = CliArgs::parse_from(["spiral-engine", "--config", path]);

    let config = args.load_config()?;
    let error = config.validate().unwrap_err();
    assert!(matches!(error, EngineError::InvalidConfigValueError { .. }));
    assert_eq!(error.category(), ErrorCategory::Configuration);
    assert!(!error.is_retryable());
    Ok(())
}

#[test]
fn test_missing_config_file() {
    let args = CliArgs::parse_from(["spiral-engine", "--config", "/nonexistent/spiral.toml"]);
    let error = args.load_config().unwrap_err();
    assert!(matches!(error, EngineError::IoError(_)));
}

#[test]
fn test_dry_run_reports_effective_configuration() -> anyhow::Result<()> {
    let args = CliArgs::parse_from([
        "spiral-engine",
        "--dry-run",
        "--duration",
        "15",
        "--model",
        "llama3:8b",
        "--ollama-url",
        "http://gpu-box:11434",
    ]);
    assert!(args.dry_run);

    let config = args.load_config()?;
    config.validate()?;
    let report = config.describe();

    assert!(report.contains("   Duration: 15s\n"));
    assert!(report.contains("   Initial pulse: python_script\n"));
    assert!(report.contains("   Ollama: http://gpu-box:11434\n"));
    assert!(report.contains("   Python model: llama3:8b\n"));
    assert!(report.contains("   SEO model: llama3:8b\n"));
    assert!(report.contains("   Runner: python3 (timeout 10s)\n"));
    assert_eq!(report.lines().count(), 9);
    Ok(())
}

#[test]
fn test_dry_run_still_validates() -> anyhow::Result<()> {
    let args = CliArgs::parse_from(["spiral-engine", "--dry-run", "--duration", "0"]);
    let config = args.load_config()?;
    let error = config.validate().unwrap_err();
    assert!(error.to_string().contains("engine.duration_secs"));
    Ok(())
}
