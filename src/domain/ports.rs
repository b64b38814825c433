use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 工作區檔案存取，路徑皆相對於工作區根目錄
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn move_file(
        &self,
        from: &str,
        to: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn ensure_dir(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// 轉成可交給外部程式的實際路徑
    fn locate(&self, path: &str) -> PathBuf;
}

/// 文字生成後端 (Ollama)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed { code: Option<i32>, stderr: String },
    TimedOut { after: Duration },
}

/// 執行生成的腳本
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &Path) -> Result<RunOutcome>;
}
