//! Error types for photo uploads

use thiserror::Error;

/// Errors that can occur while accepting an uploaded photo
#[derive(Error, Debug)]
pub enum UploadError {
    /// The request carried no file part
    #[error("Please upload a file")]
    MissingFile,

    /// The declared MIME type is not an image type
    #[error("Please upload an image file")]
    NotAnImage,

    /// The payload exceeds the configured ceiling
    #[error("Please upload an image less than {0} bytes")]
    TooLarge(u64),

    /// Writing the file to disk failed
    #[error("Problem with file upload: {0}")]
    Io(#[from] std::io::Error),
}
