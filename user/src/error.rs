use thiserror::Error;

/// Errors from the account and credential layer
#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Covers both an unknown email and a wrong password, so a login
    /// response never reveals which one it was
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password hashing error: {0}")]
    Hashing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Mail delivery error: {0}")]
    Mail(String),
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                // The only unique column on users is the email address
                return UserError::DuplicateEmail;
            }
        }
        UserError::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, UserError>;
