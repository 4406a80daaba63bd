//! Local image directory.
//!
//! Payloads live at `{root}/{storage path}`. Writes go to a uniquely named
//! temp file first and are renamed into place, so readers never observe a
//! partially written image.

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if it is missing.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Absolute location of a storage path. Only plain relative paths
    /// (such as `12.png`) are accepted.
    pub fn resolve(&self, rel: &Path) -> std::io::Result<PathBuf> {
        let plain = rel.components().count() > 0
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("storage path must be relative: {}", rel.display()),
            ));
        }
        Ok(self.root.join(rel))
    }

    pub async fn write(&self, rel: &Path, data: &[u8]) -> std::io::Result<()> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_file_name(format!(
            ".{}.tmp.{}",
            rel.display(),
            Uuid::new_v4()
        ));
        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    pub async fn read(&self, rel: &Path) -> std::io::Result<Vec<u8>> {
        fs::read(self.resolve(rel)?).await
    }

    /// Removes a payload; a missing file is not an error.
    pub async fn remove(&self, rel: &Path) -> std::io::Result<()> {
        match fs::remove_file(self.resolve(rel)?).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
