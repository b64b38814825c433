use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// 以本地檔案系統為工作區
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn ensure_parent(full_path: &Path) -> Result<()> {
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.locate(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.locate(path);
        Self::ensure_parent(&full_path).await?;
        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    async fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.locate(path);
        Self::ensure_parent(&full_path).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(full_path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let destination = self.locate(to);
        Self::ensure_parent(&destination).await?;
        tokio::fs::rename(self.locate(from), destination).await?;
        Ok(())
    }

    async fn ensure_dir(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.locate(path)).await?;
        Ok(())
    }

    fn locate(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_append_and_move() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage
            .write_file("generated_scripts/active/a.txt", b"hello")
            .await
            .unwrap();
        storage
            .append_file("generated_scripts/journal.jsonl", b"{\"n\":1}\n")
            .await
            .unwrap();
        storage
            .append_file("generated_scripts/journal.jsonl", b"{\"n\":2}\n")
            .await
            .unwrap();

        let journal = storage
            .read_file("generated_scripts/journal.jsonl")
            .await
            .unwrap();
        assert_eq!(String::from_utf8(journal).unwrap().lines().count(), 2);

        storage
            .move_file(
                "generated_scripts/active/a.txt",
                "generated_scripts/archive/a.txt",
            )
            .await
            .unwrap();
        assert!(!temp_dir.path().join("generated_scripts/active/a.txt").exists());
        assert_eq!(
            storage
                .read_file("generated_scripts/archive/a.txt")
                .await
                .unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        assert!(storage.read_file("missing.txt").await.is_err());
    }
}
