//! Accounts and credentials.
//!
//! This crate owns everything that touches a secret: password hashing,
//! signed bearer tokens, and the password reset flow with its outbound
//! mail. The HTTP layer resolves tokens to accounts through
//! [`TokenService`] and [`UserStore`]; everything else it reads about a
//! user goes through the generic entity pipeline, which never exposes
//! credential columns.

pub mod error;
pub mod mailer;
pub mod password;
pub mod reset;
pub mod store;
pub mod token;

pub use error::{Result as UserResult, UserError};
pub use mailer::{Mailer, MailerConfig};
pub use password::{hash_password, verify_password};
pub use reset::{generate_reset_token, hash_token, ResetToken, RESET_TOKEN_TTL_MINUTES};
pub use store::{NewUser, UserRecord, UserStore, UserUpdate};
pub use token::{Claims, TokenService};
