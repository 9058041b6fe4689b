use crate::core::interfaces::FileSystemService;
use crate::utils::{Result, RnaError};
use std::path::Path;
use tokio::fs;

pub struct TokioFileSystemService;

#[async_trait::async_trait]
impl FileSystemService for TokioFileSystemService {
    async fn read_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).await
            .map_err(RnaError::Io)
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.create_directory(parent).await?;
        }

        fs::write(path, content).await
            .map_err(RnaError::Io)
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await
            .map_err(RnaError::Io)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
