use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Duplicate value: {0}")]
    UniqueViolation(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Table creation error: {0}")]
    TableCreation(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return DatabaseError::UniqueViolation(db_err.message().to_string());
            }
        }
        DatabaseError::Connection(err)
    }
}

impl From<fields::FieldsError> for DatabaseError {
    fn from(err: fields::FieldsError) -> Self {
        DatabaseError::Validation(err.to_string())
    }
}

impl From<entities::EntitiesError> for DatabaseError {
    fn from(err: entities::EntitiesError) -> Self {
        DatabaseError::TableCreation(err.to_string())
    }
}
