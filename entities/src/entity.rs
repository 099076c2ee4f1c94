use crate::{EntitiesError, Result};
use async_trait::async_trait;
use fields::{Field, FieldType};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

/// Entity definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<Field>,
}

impl EntityDefinition {
    /// Get the table name for this entity
    pub fn table_name(&self) -> &str {
        &self.id
    }

    /// Look up a field by id
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Columns that may appear in filters, sorts and projections.
    /// Hidden fields are stored but never reachable from a query.
    pub fn queryable_columns(&self) -> Vec<&str> {
        let mut columns = vec!["id"];
        columns.extend(
            self.fields
                .iter()
                .filter(|f| !f.hidden)
                .map(|f| f.id.as_str()),
        );
        columns.push("created_at");
        columns.push("updated_at");
        columns
    }

    /// All stored columns, including hidden ones, in table order
    pub fn all_columns(&self) -> Vec<&str> {
        let mut columns = vec!["id"];
        columns.extend(self.fields.iter().map(|f| f.id.as_str()));
        columns.push("created_at");
        columns.push("updated_at");
        columns
    }

    /// Resolve the storage type of a queryable column
    pub fn column_type(&self, name: &str) -> Option<FieldType> {
        match name {
            "id" => Some(FieldType::Text),
            "created_at" | "updated_at" => Some(FieldType::Timestamp),
            other => self
                .fields
                .iter()
                .find(|f| f.id == other && !f.hidden)
                .map(|f| f.field_type.clone()),
        }
    }

    /// Check whether a column may be used in filters, sorts and projections
    pub fn is_queryable(&self, name: &str) -> bool {
        self.column_type(name).is_some()
    }
}

/// Trait for entity operations
#[async_trait]
pub trait Entity: Send + Sync {
    /// Get the entity definition
    fn definition(&self) -> &EntityDefinition;

    /// Create the database tables for this entity
    async fn create_tables(&self, pool: &Pool<Sqlite>) -> Result<()>;

    /// Drop the database tables for this entity
    async fn drop_tables(&self, pool: &Pool<Sqlite>) -> Result<()>;

    /// Check if the entity tables exist
    async fn tables_exist(&self, pool: &Pool<Sqlite>) -> Result<bool>;
}

/// Generic entity implementation
pub struct GenericEntity {
    definition: EntityDefinition,
}

impl GenericEntity {
    pub fn new(definition: EntityDefinition) -> Self {
        Self { definition }
    }

    /// Generate SQL for creating the entity table
    fn generate_create_table_sql(&self) -> String {
        let mut columns = vec![
            "id TEXT PRIMARY KEY".to_string(), // ULID, assigned by storage
            "created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string(),
            "updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string(),
        ];

        for field in &self.definition.fields {
            columns.push(field.to_sql_column());
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.definition.table_name(),
            columns.join(",\n    ")
        )
    }

    /// Generate SQL for creating indexes
    fn generate_index_sql(&self) -> Vec<String> {
        let mut indexes = Vec::new();

        // Creation-time index backs the default sort
        indexes.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_created_at ON {}(created_at)",
            self.definition.id,
            self.definition.table_name()
        ));

        // Index entity references for parent-scoped listings and ownership lookups
        for field in &self.definition.fields {
            if field.field_type == FieldType::EntityReference {
                indexes.push(format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
                    self.definition.id,
                    field.id,
                    self.definition.table_name(),
                    field.id
                ));
            }
        }

        indexes
    }

    /// Execute raw SQL on the pool
    async fn execute_raw(pool: &Pool<Sqlite>, sql: &str) -> Result<()> {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| EntitiesError::SqlExecution(e.to_string()))?;
        Ok(())
    }

    /// Check if a table exists
    async fn table_exists(pool: &Pool<Sqlite>, table_name: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) as count
            FROM sqlite_master
            WHERE type='table' AND name=?
        "#;

        let result: (i32,) = sqlx::query_as(query)
            .bind(table_name)
            .fetch_one(pool)
            .await?;

        Ok(result.0 > 0)
    }
}

#[async_trait]
impl Entity for GenericEntity {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    async fn create_tables(&self, pool: &Pool<Sqlite>) -> Result<()> {
        let create_sql = self.generate_create_table_sql();
        Self::execute_raw(pool, &create_sql).await?;

        for index_sql in self.generate_index_sql() {
            Self::execute_raw(pool, &index_sql).await?;
        }

        Ok(())
    }

    async fn drop_tables(&self, pool: &Pool<Sqlite>) -> Result<()> {
        let drop_sql = format!("DROP TABLE IF EXISTS {}", self.definition.table_name());
        Self::execute_raw(pool, &drop_sql).await?;

        Ok(())
    }

    async fn tables_exist(&self, pool: &Pool<Sqlite>) -> Result<bool> {
        Self::table_exists(pool, self.definition.table_name()).await
    }
}
