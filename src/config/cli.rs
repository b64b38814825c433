use crate::config::toml_config::EngineConfig;
use crate::domain::model::Pulse;
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "spiral-engine")]
#[command(about = "Turns random noise into keyword-driven Python scripts and SEO content")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Duration in seconds for the engine to run
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Directory under which generated_scripts/ is created
    #[arg(long)]
    pub base_dir: Option<String>,

    /// Ollama server base URL
    #[arg(long)]
    pub ollama_url: Option<String>,

    /// Model used for both pulses
    #[arg(long)]
    pub model: Option<String>,

    /// Pulse to start with (python_script or seo_content)
    #[arg(long, value_parser = parse_pulse)]
    pub initial_pulse: Option<Pulse>,

    /// Seed for the random generator
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, help = "Log CPU and memory usage")]
    pub monitor: bool,

    /// Show the effective configuration without running
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_pulse(value: &str) -> std::result::Result<Pulse, String> {
    value.parse::<Pulse>().map_err(|e| e.to_string())
}

impl CliArgs {
    /// 載入配置檔 (若有) 並套用命令列覆蓋
    pub fn load_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(duration) = self.duration {
            config.engine.duration_secs = duration;
        }
        if let Some(base_dir) = &self.base_dir {
            config.engine.base_dir = base_dir.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.ollama.python_model = model.clone();
            config.ollama.seo_model = model.clone();
        }
        if let Some(pulse) = self.initial_pulse {
            config.engine.initial_pulse = pulse;
        }
        if self.seed.is_some() {
            config.generator.seed = self.seed;
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let args = CliArgs::parse_from(["spiral-engine"]);
        let config = args.load_config().unwrap();
        assert_eq!(config.engine.duration_secs, 60);
        assert!(!config.monitoring_enabled());
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::parse_from([
            "spiral-engine",
            "--duration",
            "5",
            "--model",
            "llama3",
            "--initial-pulse",
            "seo_content",
            "--seed",
            "42",
            "--monitor",
        ]);
        let config = args.load_config().unwrap();
        assert_eq!(config.engine.duration_secs, 5);
        assert_eq!(config.ollama.python_model, "llama3");
        assert_eq!(config.ollama.seo_model, "llama3");
        assert_eq!(config.engine.initial_pulse, Pulse::SeoContent);
        assert_eq!(config.generator.seed, Some(42));
        assert!(config.monitoring_enabled());
    }

    #[test]
    fn test_rejects_unknown_pulse() {
        assert!(CliArgs::try_parse_from(["spiral-engine", "--initial-pulse", "blog"]).is_err());
    }
}
