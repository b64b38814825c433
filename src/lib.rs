pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::{LocalStorage, OllamaClient, PythonRunner};
pub use config::EngineConfig;
pub use core::engine::{RunSummary, SpiralEngine};
pub use utils::error::{EngineError, Result};
