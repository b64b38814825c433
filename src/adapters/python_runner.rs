use crate::domain::ports::{RunOutcome, ScriptRunner};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_INTERPRETER: &str = "python3";

/// 用外部直譯器執行腳本，超時即終止子進程
#[derive(Debug, Clone)]
pub struct PythonRunner {
    interpreter: String,
    timeout: Duration,
}

impl PythonRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }
}

#[async_trait]
impl ScriptRunner for PythonRunner {
    async fn run(&self, script: &Path) -> Result<RunOutcome> {
        tracing::debug!("Running {} {}", self.interpreter, script.display());

        let child = Command::new(&self.interpreter)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // 超時後 future 被丟棄，kill_on_drop 會結束子進程
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                if output.status.success() {
                    Ok(RunOutcome::Success)
                } else {
                    Ok(RunOutcome::Failed {
                        code: output.status.code(),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    })
                }
            }
            Err(_) => Ok(RunOutcome::TimedOut {
                after: self.timeout,
            }),
        }
    }
}
