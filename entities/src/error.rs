use thiserror::Error;

pub type Result<T> = std::result::Result<T, EntitiesError>;

#[derive(Error, Debug)]
pub enum EntitiesError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Table creation error: {0}")]
    TableCreation(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("SQL execution error: {0}")]
    SqlExecution(String),
}

// Helper to convert from sqlx errors
impl From<sqlx::Error> for EntitiesError {
    fn from(err: sqlx::Error) -> Self {
        EntitiesError::Database(err.to_string())
    }
}
