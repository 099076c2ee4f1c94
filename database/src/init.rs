use crate::{Database, Result};
use entities::{definitions, Entity, GenericEntity};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Database initialization configuration
pub struct DatabaseConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Whether to create tables on initialization
    pub create_tables: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data").join("platter.db"),
            create_tables: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom database path
    pub fn with_database_path(mut self, path: PathBuf) -> Self {
        self.database_path = path;
        self
    }

    /// Set whether to create tables on initialization
    pub fn with_create_tables(mut self, create: bool) -> Self {
        self.create_tables = create;
        self
    }
}

/// Initialize the database with the given configuration
pub async fn initialize_database(config: DatabaseConfig) -> Result<Arc<Database>> {
    // Ensure the data directory exists
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create the database file if it doesn't exist
    if !config.database_path.exists() {
        std::fs::File::create(&config.database_path)?;
        info!("Created new database file at: {:?}", config.database_path);
    }

    let db_path_str = config
        .database_path
        .to_str()
        .ok_or_else(|| crate::DatabaseError::Other("Invalid database path".into()))?;

    let db = Database::new(db_path_str).await?;
    let db = Arc::new(db);

    if config.create_tables {
        create_entity_tables(&db).await?;
    }

    Ok(db)
}

/// Create tables for every entity definition. Table creation failures are
/// fatal; a server with missing tables cannot serve anything correctly.
pub async fn create_entity_tables(db: &Database) -> Result<()> {
    for definition in definitions::all() {
        let entity_id = definition.id.clone();
        let entity = GenericEntity::new(definition);
        entity.create_tables(db.pool()).await?;
        info!("Created tables for entity: {}", entity_id);
    }

    Ok(())
}

/// Initialize database with default configuration
pub async fn initialize_default() -> Result<Arc<Database>> {
    initialize_database(DatabaseConfig::new()).await
}
