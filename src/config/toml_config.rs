use crate::adapters::ollama::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::adapters::python_runner::DEFAULT_INTERPRETER;
use crate::domain::model::Pulse;
use crate::utils::error::{EngineError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 引擎完整配置，所有區段皆可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub generator: GeneratorConfig,
    pub ollama: OllamaConfig,
    pub runner: RunnerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub duration_secs: u64,
    pub base_dir: String,
    pub initial_pulse: Pulse,
    pub channel_capacity: usize,
    pub shutdown_grace_secs: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            base_dir: ".".to_string(),
            initial_pulse: Pulse::PythonScript,
            channel_capacity: 32,
            shutdown_grace_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub batch_size: usize,
    pub interval_ms: u64,
    pub max_keywords: usize,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            interval_ms: 1000,
            max_keywords: 5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub python_model: String,
    pub seo_model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            python_model: DEFAULT_MODEL.to_string(),
            seo_model: DEFAULT_MODEL.to_string(),
            timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub interpreter: String,
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl EngineConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EngineError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EngineError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OLLAMA_HOST})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EngineError::ConfigError {
            message: format!("Invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.engine.duration_secs)
    }

    pub fn generation_interval(&self) -> Duration {
        Duration::from_millis(self.generator.interval_ms)
    }

    pub fn ollama_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.timeout_secs)
    }

    pub fn runner_timeout(&self) -> Duration {
        Duration::from_secs(self.runner.timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.engine.shutdown_grace_secs)
    }

    pub fn model_for(&self, kind: Pulse) -> &str {
        match kind {
            Pulse::PythonScript => &self.ollama.python_model,
            Pulse::SeoContent => &self.ollama.seo_model,
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }

    /// 供 --dry-run 顯示的有效配置，每行一項
    pub fn describe(&self) -> String {
        let lines = [
            format!("Duration: {:?}", self.run_duration()),
            format!("Base dir: {}", self.engine.base_dir),
            format!("Initial pulse: {}", self.engine.initial_pulse),
            format!(
                "Generator: {} chars every {:?}",
                self.generator.batch_size,
                self.generation_interval()
            ),
            format!("Ollama: {}", self.ollama.base_url),
            format!("Python model: {}", self.ollama.python_model),
            format!("SEO model: {}", self.ollama.seo_model),
            format!(
                "Runner: {} (timeout {:?})",
                self.runner.interpreter,
                self.runner_timeout()
            ),
            format!("Monitoring: {}", self.monitoring_enabled()),
        ];
        lines
            .iter()
            .map(|line| format!("   {}\n", line))
            .collect()
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("engine.duration_secs", self.engine.duration_secs, 1)?;
        validate_path("engine.base_dir", &self.engine.base_dir)?;
        validate_range("engine.channel_capacity", self.engine.channel_capacity, 1, 10_000)?;

        validate_positive_number("generator.batch_size", self.generator.batch_size as u64, 1)?;
        validate_range("generator.max_keywords", self.generator.max_keywords, 1, 50)?;

        validate_url("ollama.base_url", &self.ollama.base_url)?;
        validate_non_empty_string("ollama.python_model", &self.ollama.python_model)?;
        validate_non_empty_string("ollama.seo_model", &self.ollama.seo_model)?;
        validate_positive_number("ollama.timeout_secs", self.ollama.timeout_secs, 1)?;

        validate_non_empty_string("runner.interpreter", &self.runner.interpreter)?;
        validate_positive_number("runner.timeout_secs", self.runner.timeout_secs, 1)?;

        Ok(())
    }
}
