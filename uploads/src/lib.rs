//! # Uploads Crate
//!
//! Validation and storage for uploaded photos. The HTTP layer hands this
//! crate the declared MIME type, the original file name and the payload
//! bytes; it enforces the upload policy and writes the file under a
//! deterministic name derived from the owning entity id.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use uploads::{PhotoStore, UploadConfig};
//!
//! # async fn example() -> uploads::Result<()> {
//! let store = PhotoStore::new(UploadConfig::new("data/uploads", 5 * 1024 * 1024));
//! let name = store
//!     .store_photo("01ARZ3NDEKTSV4RRFFQ69G5FAV", "pizza.jpg", "image/jpeg", b"...")
//!     .await?;
//! assert_eq!(name, "photo_01ARZ3NDEKTSV4RRFFQ69G5FAV.jpg");
//! # Ok(())
//! # }
//! ```

pub mod error;

use std::path::{Path, PathBuf};

use tracing::info;

pub use error::UploadError;

pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload policy and destination directory
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory photos are written into
    pub dir: PathBuf,
    /// Upper bound on accepted payload size, in bytes
    pub max_bytes: u64,
}

impl UploadConfig {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }
}

/// Validates and stores uploaded photos
#[derive(Debug, Clone)]
pub struct PhotoStore {
    config: UploadConfig,
}

impl PhotoStore {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Check an upload against the policy before anything touches disk
    pub fn validate(&self, content_type: &str, len: u64) -> Result<()> {
        if !content_type.starts_with("image") {
            return Err(UploadError::NotAnImage);
        }
        if len > self.config.max_bytes {
            return Err(UploadError::TooLarge(self.config.max_bytes));
        }
        Ok(())
    }

    /// Stored file name for an entity's photo, keeping the original
    /// extension when there is one
    pub fn photo_file_name(&self, entity_id: &str, original_name: &str) -> String {
        match Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(ext) => format!("photo_{}.{}", entity_id, ext),
            None => format!("photo_{}", entity_id),
        }
    }

    /// Validate and write a photo, returning the stored file name
    pub async fn store_photo(
        &self,
        entity_id: &str,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String> {
        self.validate(content_type, bytes.len() as u64)?;

        let file_name = self.photo_file_name(entity_id, original_name);
        tokio::fs::create_dir_all(&self.config.dir).await?;
        let dest = self.config.dir.join(&file_name);
        tokio::fs::write(&dest, bytes).await?;

        info!("Stored photo {} ({} bytes)", dest.display(), bytes.len());
        Ok(file_name)
    }
}
