use clap::Parser;
use spiral_engine::utils::error::{EngineError, ErrorSeverity};
use spiral_engine::utils::{logger, validation::Validate};
use spiral_engine::{CliArgs, EngineConfig, LocalStorage, OllamaClient, PythonRunner, SpiralEngine};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting spiral-engine CLI");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    // 載入並驗證配置
    let config = match args.load_config().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if args.dry_run {
        println!("🔍 Dry run: effective configuration");
        print!("{}", config.describe());
        return Ok(());
    }

    let monitor_enabled = config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = run(config, monitor_enabled).await {
        tracing::error!(
            "❌ Spiral engine failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(config: EngineConfig, monitor_enabled: bool) -> Result<(), EngineError> {
    let storage = LocalStorage::new(config.engine.base_dir.clone());
    tracing::info!("📁 Workspace base directory: {}", storage.base_path().display());
    let generator = Arc::new(OllamaClient::new(
        &config.ollama.base_url,
        config.ollama_timeout(),
    )?);
    let runner = Arc::new(PythonRunner::new(
        config.runner.interpreter.clone(),
        config.runner_timeout(),
    ));
    tracing::info!("🐍 Generated scripts run with: {}", runner.interpreter());

    let engine =
        SpiralEngine::new_with_monitoring(config, storage, generator, runner, monitor_enabled);

    let summary = engine
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("⚠️ Unable to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    println!("✅ Spiral engine run {} completed", summary.execution_id);
    println!(
        "📊 Generated: {} | Stable: {} | Unstable: {} | Pulse switches: {}",
        summary.stats.generations,
        summary.stats.stable,
        summary.stats.unstable,
        summary.stats.pulse_switches
    );
    if let Some(ratio) = summary.stats.stability_ratio() {
        println!(
            "⚖️ Stability: {:.1}% of {} evaluated outputs",
            ratio * 100.0,
            summary.stats.evaluated()
        );
    }
    println!("🔁 Final pulse: {}", summary.final_pulse);
    if !summary.stage_errors.is_empty() {
        println!("⚠️ Stage errors:");
        for error in &summary.stage_errors {
            println!("   - {}", error);
        }
    }
    println!(
        "📁 Output under: {}/{}",
        engine.config().engine.base_dir,
        engine.layout().root()
    );

    Ok(())
}
