use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

pub mod error;
pub mod init;
pub mod query;
pub mod storage;

pub use error::{DatabaseError, Result};
pub use query::{
    Filter, FilterOp, ListQuery, Page, Populate, SortDirection, SortKey, DEFAULT_PAGE,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use storage::{haversine_miles, EntityStorage, StoredItem};

// Re-export entity and field types from the sibling crates
pub use entities::{definitions, Entity, EntityDefinition, GenericEntity};
pub use fields::{Field, FieldType};

// Re-export initialization functions for convenience
pub use init::{create_entity_tables, initialize_database, initialize_default, DatabaseConfig};

/// Database connection pool
#[derive(Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_path: &str) -> Result<Self> {
        // Ensure the data directory exists
        if let Some(parent) = Path::new(database_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Connecting to database at: {}", database_path);

        // For SQLite, we need to ensure the proper connection string format
        let connection_string =
            if database_path.starts_with("sqlite:") || database_path.starts_with(":memory:") {
                database_path.to_string()
            } else {
                // SQLite connection strings need to be in the format sqlite://path
                // For absolute paths, use sqlite:///path
                // For relative paths, use sqlite://path
                if database_path.starts_with("/") {
                    format!("sqlite://{}", database_path)
                } else {
                    format!("sqlite:{}", database_path)
                }
            };

        debug!("Using connection string: {}", connection_string);

        let pool = SqlitePool::connect(&connection_string).await?;

        debug!("Database connection established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Get a clone of the connection pool
    pub fn get_pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    /// Check if a table exists
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) as count
            FROM sqlite_master
            WHERE type='table' AND name=?
        "#;

        let result: (i32,) = sqlx::query_as(query)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0 > 0)
    }

    /// Execute raw SQL (for table creation, etc.)
    pub async fn execute_raw(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create the database file first (SQLite requires this)
        std::fs::File::create(&db_path).unwrap();

        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (temp_dir, db)
    }

    #[tokio::test]
    async fn test_database_connection() {
        let (_guard, db) = create_test_db().await;
        assert!(db.pool().acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_table_exists() {
        let (_guard, db) = create_test_db().await;

        db.execute_raw("CREATE TABLE test_table (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();

        assert!(db.table_exists("test_table").await.unwrap());
        assert!(!db.table_exists("non_existent_table").await.unwrap());
    }
}
