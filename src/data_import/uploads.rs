// =====================================================
// UPLOAD STORE
// Session-scoped uploaded files between preview and import
// =====================================================

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::data_import::models::FileFormat;
use crate::error::{CoreError, CoreResult};

const MAX_EXTENSION_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub file_id: String,
    pub format: FileFormat,
}

/// Flat directory of uploads named `<uuid>[.<ext>]`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn open(dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::storage(format!("Failed to create upload directory: {}", e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn store_file(&self, bytes: &[u8], original_name: Option<&str>) -> CoreResult<StoredUpload> {
        let extension = original_name.and_then(upload_extension);
        let file_id = match &extension {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        tokio::fs::write(self.dir.join(&file_id), bytes)
            .await
            .map_err(|e| CoreError::storage(format!("Failed to store upload: {}", e)))?;
        log::debug!("Stored upload {} ({} bytes)", file_id, bytes.len());

        Ok(StoredUpload {
            format: FileFormat::from_extension(extension.as_deref()),
            file_id,
        })
    }

    pub async fn read_file(&self, file_id: &str) -> CoreResult<Vec<u8>> {
        let path = self.path_for(file_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::FileNotFound(file_id.to_string()))
            }
            Err(e) => Err(CoreError::storage(format!("Failed to read upload: {}", e))),
        }
    }

    /// Removing an already-missing file is not an error.
    pub async fn delete_file(&self, file_id: &str) -> CoreResult<()> {
        let path = self.path_for(file_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::storage(format!("Failed to delete upload: {}", e))),
        }
    }

    pub fn format_of(&self, file_id: &str) -> CoreResult<FileFormat> {
        validate_file_id(file_id)?;
        let extension = file_id.split_once('.').map(|(_, ext)| ext);
        Ok(FileFormat::from_extension(extension))
    }

    /// Deletes uploads last modified more than `ttl` ago; returns how many went.
    pub async fn expire_older_than(&self, ttl: Duration) -> CoreResult<usize> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CoreError::storage(format!("Failed to list uploads: {}", e)))?;
        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::storage(format!("Failed to list uploads: {}", e)))?
        {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= ttl {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to expire upload {:?}: {}", entry.file_name(), e),
            }
        }
        Ok(removed)
    }

    fn path_for(&self, file_id: &str) -> CoreResult<PathBuf> {
        validate_file_id(file_id)?;
        Ok(self.dir.join(file_id))
    }
}

fn upload_extension(original_name: &str) -> Option<String> {
    let (_, ext) = original_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    is_valid_extension(&ext).then_some(ext)
}

fn is_valid_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Accepts only ids this store generates: a UUID with an optional short
/// alphanumeric extension.
pub fn validate_file_id(file_id: &str) -> CoreResult<()> {
    let invalid = || CoreError::InvalidInput(format!("Invalid file id: {}", file_id));
    let (stem, extension) = match file_id.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file_id, None),
    };
    Uuid::parse_str(stem).map_err(|_| invalid())?;
    if let Some(ext) = extension {
        if !is_valid_extension(ext) {
            return Err(invalid());
        }
    }
    Ok(())
}
