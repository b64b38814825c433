use crate::utils::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 引擎目前的脈衝：決定生成 Python 腳本還是 SEO 內容
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pulse {
    #[default]
    PythonScript,
    SeoContent,
}

impl Pulse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pulse::PythonScript => "python_script",
            Pulse::SeoContent => "seo_content",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Pulse::PythonScript => Pulse::SeoContent,
            Pulse::SeoContent => Pulse::PythonScript,
        }
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pulse {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "python_script" => Ok(Pulse::PythonScript),
            "seo_content" => Ok(Pulse::SeoContent),
            other => Err(EngineError::InvalidConfigValueError {
                field: "pulse".to_string(),
                value: other.to_string(),
                reason: "Expected 'python_script' or 'seo_content'".to_string(),
            }),
        }
    }
}

/// 在各階段間傳遞的數據，附帶產生時的脈衝
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub kind: Pulse,
    pub content: T,
    pub created_at: DateTime<Utc>,
}

impl<T> Envelope<T> {
    pub fn new(kind: Pulse, content: T) -> Self {
        Self {
            kind,
            content,
            created_at: Utc::now(),
        }
    }

    /// 保留 kind 與時間戳，替換內容
    pub fn map<U>(self, content: U) -> Envelope<U> {
        Envelope {
            kind: self.kind,
            content,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stability {
    Stable,
    Unstable,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stability::Stable => f.write_str("STABLE"),
            Stability::Unstable => f.write_str("UNSTABLE"),
        }
    }
}

pub const NO_ERROR: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: Stability,
    pub error: String,
}

impl Verdict {
    pub fn stable() -> Self {
        Self {
            status: Stability::Stable,
            error: NO_ERROR.to_string(),
        }
    }

    pub fn unstable(error: impl Into<String>) -> Self {
        Self {
            status: Stability::Unstable,
            error: error.into(),
        }
    }

    pub fn is_stable(&self) -> bool {
        self.status == Stability::Stable
    }
}

/// 已寫入工作區的生成檔案，path 相對於工作區根目錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: Pulse,
    pub file_name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub source: String,
    pub kind: Pulse,
    pub status: Stability,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl Feedback {
    pub fn from_verdict(source: &str, kind: Pulse, verdict: &Verdict) -> Self {
        Self {
            source: source.to_string(),
            kind,
            status: verdict.status,
            error: verdict.error.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// 日誌條目，每條以一行 JSON 寫入 journal.jsonl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    Keywords {
        kind: Pulse,
        keywords: Vec<String>,
    },
    Feedback(Feedback),
    Archived {
        kind: Pulse,
        file_name: String,
        status: Stability,
        destination: String,
    },
}

/// generated_scripts/ 下的目錄結構
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: String,
}

impl WorkspaceLayout {
    pub const ROOT: &'static str = "generated_scripts";

    pub fn new() -> Self {
        Self {
            root: Self::ROOT.to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn active_dir(&self, kind: Pulse) -> String {
        match kind {
            Pulse::PythonScript => format!("{}/active/python_scripts", self.root),
            Pulse::SeoContent => format!("{}/active/seo_keywords", self.root),
        }
    }

    pub fn archive_dir(&self, kind: Pulse, status: Stability) -> String {
        let prefix = match status {
            Stability::Stable => "stable",
            Stability::Unstable => "unstable",
        };
        let suffix = match kind {
            Pulse::PythonScript => "python_scripts",
            Pulse::SeoContent => "seo_keywords",
        };
        format!("{}/lethian_archive/{}_{}", self.root, prefix, suffix)
    }

    pub fn journal_path(&self) -> String {
        format!("{}/journal.jsonl", self.root)
    }

    pub fn summary_path(&self) -> String {
        format!("{}/run_summary.json", self.root)
    }

    pub fn all_dirs(&self) -> Vec<String> {
        let mut dirs = Vec::new();
        for kind in [Pulse::PythonScript, Pulse::SeoContent] {
            dirs.push(self.active_dir(kind));
            dirs.push(self.archive_dir(kind, Stability::Stable));
            dirs.push(self.archive_dir(kind, Stability::Unstable));
        }
        dirs
    }
}

impl Default for WorkspaceLayout {
    fn default() -> Self {
        Self::new()
    }
}
