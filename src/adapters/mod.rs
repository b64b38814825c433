// Adapters layer: concrete implementations for external systems (filesystem, Ollama, script interpreter).

pub mod ollama;
pub mod python_runner;
pub mod storage;

pub use ollama::OllamaClient;
pub use python_runner::PythonRunner;
pub use storage::LocalStorage;
