//! Typed access to the users table.
//!
//! Credential columns never leave this module. Public reads return
//! [`UserRecord`], which carries no secrets; password hashes are only
//! compared inside [`UserStore::verify_credentials`] and
//! [`UserStore::password_matches`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::{info, warn};
use ulid::Ulid;

use crate::error::{Result, UserError};
use crate::password;
use crate::reset::{self, ResetToken};

/// An account, without its credential columns
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an account
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

#[derive(FromRow)]
struct CredentialRow {
    id: String,
    password_hash: String,
}

/// Account storage over the shared connection pool
#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an account, hashing the password before it is stored
    pub async fn create(&self, new_user: NewUser) -> Result<UserRecord> {
        let id = Ulid::new().to_string();
        let password_hash = password::hash_password(&new_user.password)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, password_hash)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.role)
        .bind(&password_hash)
        .execute(&self.pool)
        .await?;

        info!("Created user {} ({})", id, new_user.email);

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| UserError::UserNotFound(id))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Resolve an email and password to an account. The same error comes
    /// back for an unknown email and a wrong password.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<UserRecord> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, password_hash
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            warn!("Login attempt for unknown email: {}", email);
            return Err(UserError::InvalidCredentials);
        };

        if !password::verify_password(password, &row.password_hash) {
            warn!("Failed login for user: {}", row.id);
            return Err(UserError::InvalidCredentials);
        }

        self.find_by_id(&row.id)
            .await?
            .ok_or(UserError::InvalidCredentials)
    }

    /// Check a password against the stored hash for a known account
    pub async fn password_matches(&self, id: &str, password: &str) -> Result<bool> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, password_hash
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| UserError::UserNotFound(id.to_string()))?;

        Ok(password::verify_password(password, &row.password_hash))
    }

    /// Apply a partial update. A new password is hashed before storage.
    pub async fn update_user(&self, id: &str, update: UserUpdate) -> Result<UserRecord> {
        let password_hash = match update.password.as_deref() {
            Some(plain) => Some(password::hash_password(plain)?),
            None => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                email = COALESCE(?, email),
                role = COALESCE(?, role),
                password_hash = COALESCE(?, password_hash),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.email.as_deref())
        .bind(update.role.as_deref())
        .bind(password_hash.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::UserNotFound(id.to_string()));
        }

        info!("Updated user: {}", id);

        self.find_by_id(id)
            .await?
            .ok_or_else(|| UserError::UserNotFound(id.to_string()))
    }

    /// Replace the password for an account
    pub async fn update_password(&self, id: &str, new_password: &str) -> Result<()> {
        let password_hash = password::hash_password(new_password)?;

        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::UserNotFound(id.to_string()));
        }

        info!("Updated password for user: {}", id);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::UserNotFound(id.to_string()));
        }

        info!("Deleted user: {}", id);
        Ok(())
    }

    /// Issue a reset token for the account with this email, or None for
    /// an unknown email.
    pub async fn begin_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(UserRecord, ResetToken)>> {
        let Some(user) = self.find_by_email(email).await? else {
            info!("Password reset requested for unknown email: {}", email);
            return Ok(None);
        };

        let token = reset::generate_reset_token();

        sqlx::query(
            r#"
            UPDATE users SET
                reset_token_hash = ?,
                reset_token_expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&token.hashed)
        .bind(token.expires_at)
        .bind(&user.id)
        .execute(&self.pool)
        .await?;

        info!("Issued password reset token for user: {}", user.id);
        Ok(Some((user, token)))
    }

    /// Resolve a live reset token to its account
    pub async fn find_by_reset_token(&self, plain_token: &str) -> Result<Option<UserRecord>> {
        let hashed = reset::hash_token(plain_token);

        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, role, created_at, updated_at
            FROM users
            WHERE reset_token_hash = ? AND reset_token_expires_at > ?
            "#,
        )
        .bind(&hashed)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Set the new password and clear the reset token in one statement
    pub async fn complete_password_reset(&self, id: &str, new_password: &str) -> Result<()> {
        let password_hash = password::hash_password(new_password)?;

        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = ?,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::UserNotFound(id.to_string()));
        }

        info!("Password reset completed for user: {}", id);
        Ok(())
    }

    /// Drop a pending reset token, e.g. when the reset email fails to send
    pub async fn clear_reset_token(&self, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                reset_token_hash = NULL,
                reset_token_expires_at = NULL
            WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use entities::{definitions, Entity, GenericEntity};
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::TempDir;

    async fn setup_store() -> (TempDir, UserStore) {
        let temp_dir = TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(temp_dir.path().join("test.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();

        GenericEntity::new(definitions::users())
            .create_tables(&pool)
            .await
            .unwrap();

        (temp_dir, UserStore::new(pool))
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password: "hunter42".to_string(),
            role: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (_dir, store) = setup_store().await;

        let created = store.create(new_user("alice@example.com")).await.unwrap();
        assert_eq!(created.name, "Test User");
        assert_eq!(created.email, "alice@example.com");
        assert_eq!(created.role, "user");
        assert!(!created.id.is_empty());

        let by_id = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, created.email);

        let by_email = store
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(store.find_by_id("missing").await.unwrap().is_none());
        assert!(store
            .find_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let (_dir, store) = setup_store().await;

        store.create(new_user("alice@example.com")).await.unwrap();
        let result = store.create(new_user("alice@example.com")).await;
        assert!(matches!(result, Err(UserError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_verify_credentials() {
        let (_dir, store) = setup_store().await;
        let created = store.create(new_user("alice@example.com")).await.unwrap();

        let verified = store
            .verify_credentials("alice@example.com", "hunter42")
            .await
            .unwrap();
        assert_eq!(verified.id, created.id);

        let wrong_password = store
            .verify_credentials("alice@example.com", "wrong")
            .await;
        assert!(matches!(wrong_password, Err(UserError::InvalidCredentials)));

        let unknown_email = store
            .verify_credentials("nobody@example.com", "hunter42")
            .await;
        assert!(matches!(unknown_email, Err(UserError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_password_matches() {
        let (_dir, store) = setup_store().await;
        let created = store.create(new_user("alice@example.com")).await.unwrap();

        assert!(store
            .password_matches(&created.id, "hunter42")
            .await
            .unwrap());
        assert!(!store.password_matches(&created.id, "wrong").await.unwrap());

        let missing = store.password_matches("missing", "hunter42").await;
        assert!(matches!(missing, Err(UserError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_user_partial() {
        let (_dir, store) = setup_store().await;
        let created = store.create(new_user("alice@example.com")).await.unwrap();

        let updated = store
            .update_user(
                &created.id,
                UserUpdate {
                    name: Some("Alice".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alice");
        assert_eq!(updated.email, "alice@example.com");
        assert_eq!(updated.role, "user");

        let promoted = store
            .update_user(
                &created.id,
                UserUpdate {
                    role: Some("publisher".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.role, "publisher");
        assert_eq!(promoted.name, "Alice");
    }

    #[tokio::test]
    async fn test_update_user_rehashes_password() {
        let (_dir, store) = setup_store().await;
        let created = store.create(new_user("alice@example.com")).await.unwrap();

        store
            .update_user(
                &created.id,
                UserUpdate {
                    password: Some("new-password".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store
            .verify_credentials("alice@example.com", "new-password")
            .await
            .is_ok());
        assert!(store
            .verify_credentials("alice@example.com", "hunter42")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_email() {
        let (_dir, store) = setup_store().await;
        store.create(new_user("alice@example.com")).await.unwrap();
        let bob = store.create(new_user("bob@example.com")).await.unwrap();

        let result = store
            .update_user(
                &bob.id,
                UserUpdate {
                    email: Some("alice@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(UserError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let (_dir, store) = setup_store().await;
        let result = store
            .update_user(
                "missing",
                UserUpdate {
                    name: Some("Nobody".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(UserError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_password() {
        let (_dir, store) = setup_store().await;
        let created = store.create(new_user("alice@example.com")).await.unwrap();

        store
            .update_password(&created.id, "changed")
            .await
            .unwrap();

        assert!(store.password_matches(&created.id, "changed").await.unwrap());
        assert!(!store
            .password_matches(&created.id, "hunter42")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, store) = setup_store().await;
        let created = store.create(new_user("alice@example.com")).await.unwrap();

        store.delete(&created.id).await.unwrap();
        assert!(store.find_by_id(&created.id).await.unwrap().is_none());

        let again = store.delete(&created.id).await;
        assert!(matches!(again, Err(UserError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (_dir, store) = setup_store().await;
        let created = store.create(new_user("alice@example.com")).await.unwrap();

        let (user, token) = store
            .begin_password_reset("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, created.id);

        let resolved = store
            .find_by_reset_token(&token.plain)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, created.id);

        store
            .complete_password_reset(&resolved.id, "after-reset")
            .await
            .unwrap();

        assert!(store
            .verify_credentials("alice@example.com", "after-reset")
            .await
            .is_ok());
        // Token is single-use
        assert!(store
            .find_by_reset_token(&token.plain)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reset_for_unknown_email() {
        let (_dir, store) = setup_store().await;
        let result = store
            .begin_password_reset("nobody@example.com")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_rejected() {
        let (_dir, store) = setup_store().await;
        store.create(new_user("alice@example.com")).await.unwrap();

        let (user, token) = store
            .begin_password_reset("alice@example.com")
            .await
            .unwrap()
            .unwrap();

        sqlx::query("UPDATE users SET reset_token_expires_at = ? WHERE id = ?")
            .bind(Utc::now() - Duration::hours(1))
            .bind(&user.id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store
            .find_by_reset_token(&token.plain)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_clear_reset_token() {
        let (_dir, store) = setup_store().await;
        store.create(new_user("alice@example.com")).await.unwrap();

        let (user, token) = store
            .begin_password_reset("alice@example.com")
            .await
            .unwrap()
            .unwrap();

        store.clear_reset_token(&user.id).await.unwrap();

        assert!(store
            .find_by_reset_token(&token.plain)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_reset_token() {
        let (_dir, store) = setup_store().await;
        store.create(new_user("alice@example.com")).await.unwrap();

        assert!(store
            .find_by_reset_token("deadbeef")
            .await
            .unwrap()
            .is_none());
    }
}
