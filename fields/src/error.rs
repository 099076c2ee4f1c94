use thiserror::Error;

pub type Result<T> = std::result::Result<T, FieldsError>;

#[derive(Error, Debug)]
pub enum FieldsError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    TypeConversion(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),
}
