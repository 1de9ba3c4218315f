use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::PathBuf;

/// 以本機資料夾為根目錄的儲存
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
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    fn locate(&self, path: &str) -> String {
        self.base_path.join(path).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_creates_folders() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("traffic_data"));

        storage
            .write_file("nested/file.parquet", b"PAR1")
            .await
            .unwrap();

        let data = storage.read_file("nested/file.parquet").await.unwrap();
        assert_eq!(data, b"PAR1");
        assert!(storage
            .locate("nested/file.parquet")
            .ends_with("file.parquet"));
    }

    #[tokio::test]
    async fn test_ensure_root_creates_folder() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("source_data").join("weather");
        let storage = LocalStorage::new(&root);

        storage.ensure_root().await.unwrap();
        storage.ensure_root().await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        let err = storage.read_file("missing.parquet").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::EtlError::IoError(_)));
    }
}
