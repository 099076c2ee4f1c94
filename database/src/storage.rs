use crate::query::{Filter, FilterOp, ListQuery, Page, Populate, SortKey};
use crate::{Database, DatabaseError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use entities::EntityDefinition;
use fields::{FieldType, FieldValidator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use ulid::Ulid;

/// Mean Earth radius in miles, used to bound geospatial searches
const EARTH_RADIUS_MILES: f64 = 3963.0;

/// A stored entity row, keyed by column name. Hidden columns never appear
/// here; reads project them away before rows leave the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: String,
    pub fields: Map<String, JsonValue>,
}

impl StoredItem {
    pub fn value(&self, column: &str) -> Option<&JsonValue> {
        self.fields.get(column)
    }

    pub fn str_value(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(JsonValue::as_str)
    }

    pub fn float_value(&self, column: &str) -> Option<f64> {
        self.fields.get(column).and_then(JsonValue::as_f64)
    }

    /// Flatten into a single JSON object with the id first
    pub fn into_json(self) -> JsonValue {
        let mut object = Map::new();
        object.insert("id".to_string(), JsonValue::String(self.id));
        object.extend(self.fields);
        JsonValue::Object(object)
    }
}

/// Typed values bound into generated SQL. Column names are resolved against
/// the entity definition's allow-list; everything else goes through a bind
/// parameter, so no request string is ever interpolated into a statement.
#[derive(Debug, Clone)]
enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

/// Entity row storage operations
pub struct EntityStorage<'a> {
    db: &'a Database,
    definition: EntityDefinition,
}

impl<'a> EntityStorage<'a> {
    pub fn new(db: &'a Database, definition: EntityDefinition) -> Self {
        Self { db, definition }
    }

    pub fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    /// Create a new row and return it.
    ///
    /// Keys without a matching field are dropped, column defaults are filled
    /// in for absent keys, and the whole payload is validated before the
    /// insert. Ids are ULIDs, so they order by creation time.
    pub async fn create(&self, fields: Map<String, JsonValue>) -> Result<StoredItem> {
        self.insert_row(Ulid::new().to_string(), fields).await
    }

    /// Create a row under a caller-chosen id. The seeder uses this to keep
    /// fixture cross-references intact.
    pub async fn create_with_id(
        &self,
        id: &str,
        fields: Map<String, JsonValue>,
    ) -> Result<StoredItem> {
        if id.trim().is_empty() {
            return Err(DatabaseError::Validation("id must not be empty".to_string()));
        }
        self.insert_row(id.to_string(), fields).await
    }

    async fn insert_row(&self, id: String, fields: Map<String, JsonValue>) -> Result<StoredItem> {
        let payload = self.writable_payload(fields);
        FieldValidator::validate_all(&self.definition.fields, &payload)?;

        let mut columns = vec!["id".to_string()];
        let mut values = vec![SqlValue::Text(id.clone())];

        for (name, value) in &payload {
            // Lookup cannot fail: writable_payload kept known fields only
            let Some(field) = self.definition.field(name) else {
                continue;
            };
            columns.push(name.clone());
            values.push(coerce_json(&field.field_type, name, value)?);
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.definition.table_name(),
            columns.join(", "),
            placeholders
        );

        debug!("Executing SQL: {}", sql);

        bind_values(sqlx::query(&sql), &values)
            .execute(self.db.pool())
            .await?;

        info!("Created {} with id: {}", self.definition.id, id);

        self.get(&id, None)
            .await?
            .ok_or_else(|| DatabaseError::EntityNotFound(format!("{} with id: {}", self.definition.id, id)))
    }

    /// Get a row by id, optionally loading a configured relation
    pub async fn get(&self, id: &str, populate: Option<&Populate>) -> Result<Option<StoredItem>> {
        let projection = self.projection(None)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            projection.join(", "),
            self.definition.table_name()
        );

        let row = match sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let item = self.row_to_item(&row, &projection)?;
        let mut items = vec![item];
        if let Some(populate) = populate {
            self.apply_populate(&mut items, populate).await?;
        }

        Ok(items.pop())
    }

    /// Fetch the first row whose column equals the given value
    pub async fn find_one(&self, column: &str, value: &str) -> Result<Option<StoredItem>> {
        if !self.definition.is_queryable(column) {
            return Err(DatabaseError::UnknownField(column.to_string()));
        }

        let projection = self.projection(None)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? LIMIT 1",
            projection.join(", "),
            self.definition.table_name(),
            column
        );

        let row = sqlx::query(&sql)
            .bind(value.to_string())
            .fetch_optional(self.db.pool())
            .await?;

        row.map(|row| self.row_to_item(&row, &projection)).transpose()
    }

    /// Update a row and return its new state.
    ///
    /// Unlike create, unknown keys are an error here so a client learns when
    /// its payload was not applied.
    pub async fn update(&self, id: &str, fields: Map<String, JsonValue>) -> Result<StoredItem> {
        if fields.is_empty() {
            return self.get(id, None).await?.ok_or_else(|| {
                DatabaseError::EntityNotFound(format!("{} with id: {}", self.definition.id, id))
            });
        }

        for (name, value) in &fields {
            let Some(field) = self.definition.field(name) else {
                return Err(DatabaseError::UnknownField(name.clone()));
            };
            FieldValidator::validate_field_value(field, value)?;
        }

        let mut set_clauses = vec!["updated_at = CURRENT_TIMESTAMP".to_string()];
        let mut values: Vec<SqlValue> = Vec::new();

        for (name, value) in &fields {
            let Some(field) = self.definition.field(name) else {
                continue;
            };
            set_clauses.push(format!("{} = ?", name));
            values.push(coerce_json(&field.field_type, name, value)?);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.definition.table_name(),
            set_clauses.join(", ")
        );

        debug!("Executing SQL: {}", sql);

        let query = bind_values(sqlx::query(&sql), &values).bind(id.to_string());
        let result = query.execute(self.db.pool()).await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::EntityNotFound(format!(
                "{} with id: {}",
                self.definition.id, id
            )));
        }

        info!("Updated {} with id: {}", self.definition.id, id);

        self.get(id, None).await?.ok_or_else(|| {
            DatabaseError::EntityNotFound(format!("{} with id: {}", self.definition.id, id))
        })
    }

    /// Delete a row by id
    pub async fn delete(&self, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.definition.table_name());

        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::EntityNotFound(format!(
                "{} with id: {}",
                self.definition.id, id
            )));
        }

        info!("Deleted {} with id: {}", self.definition.id, id);

        Ok(())
    }

    /// Delete every row of this entity, returning how many went away
    pub async fn delete_all(&self) -> Result<u64> {
        let sql = format!("DELETE FROM {}", self.definition.table_name());
        let result = sqlx::query(&sql).execute(self.db.pool()).await?;

        info!(
            "Deleted {} rows from {}",
            result.rows_affected(),
            self.definition.id
        );

        Ok(result.rows_affected())
    }

    /// Delete every row whose `column` equals `value`, returning how many
    /// went away. Used for cascading deletes across entity references.
    pub async fn delete_where(&self, column: &str, value: &str) -> Result<u64> {
        if !self.definition.is_queryable(column) {
            return Err(DatabaseError::UnknownField(column.to_string()));
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.definition.table_name(),
            column
        );

        let result = sqlx::query(&sql)
            .bind(value.to_string())
            .execute(self.db.pool())
            .await?;

        info!(
            "Deleted {} {} rows where {} = {}",
            result.rows_affected(),
            self.definition.id,
            column,
            value
        );

        Ok(result.rows_affected())
    }

    /// Execute a list query: filter, sort, project and paginate.
    ///
    /// The total is counted against the filter alone, so pagination never
    /// changes which rows qualify, only which slice comes back.
    pub async fn list(
        &self,
        query: &ListQuery,
        populate: Option<&Populate>,
    ) -> Result<Page<StoredItem>> {
        let projection = self.projection(query.select.as_deref())?;
        let (where_clause, bound) = self.filter_clause(&query.filters)?;
        let order_clause = self.order_clause(&query.sort)?;

        let total = self.count(&where_clause, &bound).await?;

        let sql = format!(
            "SELECT {} FROM {}{} {} LIMIT ? OFFSET ?",
            projection.join(", "),
            self.definition.table_name(),
            where_clause,
            order_clause
        );

        debug!("Executing SQL: {}", sql);

        let rows = bind_values(sqlx::query(&sql), &bound)
            .bind(query.limit)
            .bind(query.offset())
            .fetch_all(self.db.pool())
            .await?;

        let mut items = rows
            .iter()
            .map(|row| self.row_to_item(row, &projection))
            .collect::<Result<Vec<_>>>()?;

        if let Some(populate) = populate {
            self.apply_populate(&mut items, populate).await?;
        }

        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// All rows whose coordinates fall within a great-circle radius of the
    /// given point. Rows without coordinates never match.
    pub async fn list_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_miles: f64,
    ) -> Result<Vec<StoredItem>> {
        for column in ["latitude", "longitude"] {
            if self.definition.field(column).is_none() {
                return Err(DatabaseError::UnknownField(column.to_string()));
            }
        }

        let projection = self.projection(None)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE latitude IS NOT NULL AND longitude IS NOT NULL",
            projection.join(", "),
            self.definition.table_name()
        );

        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;

        let mut items = Vec::new();
        for row in &rows {
            let item = self.row_to_item(row, &projection)?;
            let (Some(lat), Some(lng)) = (item.float_value("latitude"), item.float_value("longitude"))
            else {
                continue;
            };
            if haversine_miles(latitude, longitude, lat, lng) <= radius_miles {
                items.push(item);
            }
        }

        Ok(items)
    }

    /// Drop unknown keys and fill column defaults for absent ones
    fn writable_payload(&self, fields: Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut payload = Map::new();

        for (name, value) in fields {
            if self.definition.field(&name).is_some() {
                payload.insert(name, value);
            } else {
                debug!(
                    "Dropping unknown field '{}' from {} payload",
                    name, self.definition.id
                );
            }
        }

        for field in &self.definition.fields {
            if let Some(default) = &field.default_value {
                if !payload.contains_key(&field.id) {
                    payload.insert(field.id.clone(), JsonValue::String(default.clone()));
                }
            }
        }

        payload
    }

    /// Resolve the projected column list. `None` selects every queryable
    /// column; an explicit list always gets the id column prepended.
    fn projection(&self, select: Option<&[String]>) -> Result<Vec<String>> {
        match select {
            None => Ok(self
                .definition
                .queryable_columns()
                .iter()
                .map(|c| c.to_string())
                .collect()),
            Some(columns) => {
                let mut projection = vec!["id".to_string()];
                for column in columns {
                    if column == "id" {
                        continue;
                    }
                    if !self.definition.is_queryable(column) {
                        return Err(DatabaseError::UnknownField(column.clone()));
                    }
                    if !projection.contains(column) {
                        projection.push(column.clone());
                    }
                }
                Ok(projection)
            }
        }
    }

    /// Translate filters into a WHERE clause plus its bound values
    fn filter_clause(&self, filters: &[Filter]) -> Result<(String, Vec<SqlValue>)> {
        if filters.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut clauses = Vec::new();
        let mut values = Vec::new();

        for filter in filters {
            let Some(column_type) = self.definition.column_type(&filter.field) else {
                return Err(DatabaseError::UnknownField(filter.field.clone()));
            };

            match filter.op {
                FilterOp::In => {
                    if filter.values.is_empty() {
                        return Err(DatabaseError::Validation(format!(
                            "Filter on '{}' needs at least one value",
                            filter.field
                        )));
                    }
                    let placeholders = vec!["?"; filter.values.len()].join(", ");
                    clauses.push(format!("{} IN ({})", filter.field, placeholders));
                    for raw in &filter.values {
                        values.push(coerce_raw(&column_type, &filter.field, raw)?);
                    }
                }
                op => {
                    let Some(raw) = filter.values.first() else {
                        return Err(DatabaseError::Validation(format!(
                            "Filter on '{}' is missing a value",
                            filter.field
                        )));
                    };
                    clauses.push(format!("{} {} ?", filter.field, op.sql_operator()));
                    values.push(coerce_raw(&column_type, &filter.field, raw)?);
                }
            }
        }

        Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
    }

    /// Translate sort keys into an ORDER BY clause. The id column is
    /// appended as a tie-break so equal keys still order deterministically.
    fn order_clause(&self, sort: &[SortKey]) -> Result<String> {
        if sort.is_empty() {
            return Ok("ORDER BY created_at DESC, id DESC".to_string());
        }

        let mut terms = Vec::new();
        for key in sort {
            if !self.definition.is_queryable(&key.field) {
                return Err(DatabaseError::UnknownField(key.field.clone()));
            }
            terms.push(format!("{} {}", key.field, key.direction.sql_keyword()));
        }

        if !sort.iter().any(|key| key.field == "id") {
            let direction = sort
                .last()
                .map(|key| key.direction.sql_keyword())
                .unwrap_or("DESC");
            terms.push(format!("id {}", direction));
        }

        Ok(format!("ORDER BY {}", terms.join(", ")))
    }

    /// Count every row matching the filter, ignoring pagination
    async fn count(&self, where_clause: &str, values: &[SqlValue]) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            self.definition.table_name(),
            where_clause
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in values {
            query = match value {
                SqlValue::Text(s) => query.bind(s.clone()),
                SqlValue::Integer(n) => query.bind(*n),
                SqlValue::Real(f) => query.bind(*f),
                SqlValue::Null => query.bind(None::<String>),
            };
        }

        Ok(query.fetch_one(self.db.pool()).await?)
    }

    /// Decode a fetched row into a StoredItem using the projected columns
    fn row_to_item(&self, row: &SqliteRow, projection: &[String]) -> Result<StoredItem> {
        let id: String = row.try_get("id")?;
        let mut fields = Map::new();

        for column in projection {
            if column == "id" {
                continue;
            }
            fields.insert(column.clone(), self.column_value(row, column)?);
        }

        Ok(StoredItem { id, fields })
    }

    /// Decode one column into JSON, driven by the definition's column type
    fn column_value(&self, row: &SqliteRow, column: &str) -> Result<JsonValue> {
        let Some(column_type) = self.definition.column_type(column) else {
            return Ok(JsonValue::Null);
        };

        let value = match column_type {
            FieldType::Text | FieldType::LongText | FieldType::EntityReference => row
                .try_get::<Option<String>, _>(column)?
                .map(JsonValue::String),
            FieldType::Integer => row
                .try_get::<Option<i64>, _>(column)?
                .map(|n| JsonValue::Number(n.into())),
            FieldType::Float => row
                .try_get::<Option<f64>, _>(column)?
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number),
            FieldType::Boolean => row
                .try_get::<Option<i64>, _>(column)?
                .map(|n| JsonValue::Bool(n != 0)),
            FieldType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(column)?
                .map(|dt| JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true))),
        };

        Ok(value.unwrap_or(JsonValue::Null))
    }

    /// Load the configured relation for a batch of items in one extra query
    async fn apply_populate(&self, items: &mut [StoredItem], populate: &Populate) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        match populate {
            Populate::Parent {
                field,
                definition,
                columns,
            } => {
                let ids: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.str_value(field).map(String::from))
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                if ids.is_empty() {
                    return Ok(());
                }

                let parent = EntityStorage::new(self.db, definition.clone());
                let projection = parent.projection(Some(columns.as_slice()))?;

                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT {} FROM {} WHERE id IN ({})",
                    projection.join(", "),
                    parent.definition.table_name(),
                    placeholders
                );

                let mut query = sqlx::query(&sql);
                for id in &ids {
                    query = query.bind(id.clone());
                }
                let rows = query.fetch_all(self.db.pool()).await?;

                let mut loaded = HashMap::new();
                for row in &rows {
                    let item = parent.row_to_item(row, &projection)?;
                    loaded.insert(item.id.clone(), item.into_json());
                }

                for item in items.iter_mut() {
                    let Some(parent_id) = item.str_value(field).map(String::from) else {
                        continue;
                    };
                    if let Some(value) = loaded.get(&parent_id) {
                        item.fields.insert(field.clone(), value.clone());
                    }
                }
            }
            Populate::Children {
                name,
                definition,
                foreign_key,
            } => {
                let child = EntityStorage::new(self.db, definition.clone());
                if child.definition.field(foreign_key).is_none() {
                    return Err(DatabaseError::UnknownField(foreign_key.clone()));
                }

                let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
                let projection = child.projection(None)?;

                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY created_at DESC, id DESC",
                    projection.join(", "),
                    child.definition.table_name(),
                    foreign_key,
                    placeholders
                );

                let mut query = sqlx::query(&sql);
                for id in &ids {
                    query = query.bind(id.clone());
                }
                let rows = query.fetch_all(self.db.pool()).await?;

                let mut grouped: HashMap<String, Vec<JsonValue>> = HashMap::new();
                for row in &rows {
                    let item = child.row_to_item(row, &projection)?;
                    let Some(parent_id) = item.str_value(foreign_key).map(String::from) else {
                        continue;
                    };
                    grouped.entry(parent_id).or_default().push(item.into_json());
                }

                for item in items.iter_mut() {
                    let children = grouped.remove(&item.id).unwrap_or_default();
                    item.fields.insert(name.clone(), JsonValue::Array(children));
                }
            }
        }

        Ok(())
    }
}

/// Great-circle distance between two coordinates in miles
pub fn haversine_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Coerce a JSON payload value into a bindable SQL value
fn coerce_json(field_type: &FieldType, field: &str, value: &JsonValue) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    match field_type {
        FieldType::Text | FieldType::LongText | FieldType::EntityReference => value
            .as_str()
            .map(|s| SqlValue::Text(s.to_string()))
            .ok_or_else(|| {
            DatabaseError::Validation(format!("Field '{}' expects a string value", field))
        }),
        FieldType::Integer => value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(SqlValue::Integer)
            .ok_or_else(|| {
                DatabaseError::Validation(format!("Field '{}' expects an integer value", field))
            }),
        FieldType::Float => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(SqlValue::Real)
            .ok_or_else(|| {
                DatabaseError::Validation(format!("Field '{}' expects a numeric value", field))
            }),
        FieldType::Boolean => match value {
            JsonValue::Bool(b) => Ok(SqlValue::Integer(*b as i64)),
            JsonValue::Number(n) if n.as_i64() == Some(0) || n.as_i64() == Some(1) => {
                Ok(SqlValue::Integer(n.as_i64().unwrap_or(0)))
            }
            _ => Err(DatabaseError::Validation(format!(
                "Field '{}' expects a boolean value",
                field
            ))),
        },
        FieldType::Timestamp => value
            .as_str()
            .and_then(normalize_timestamp)
            .map(SqlValue::Text)
            .ok_or_else(|| {
                DatabaseError::Validation(format!("Field '{}' expects a datetime value", field))
            }),
    }
}

/// Coerce a raw query-string value into a bindable SQL value
fn coerce_raw(column_type: &FieldType, field: &str, raw: &str) -> Result<SqlValue> {
    match column_type {
        FieldType::Text | FieldType::LongText | FieldType::EntityReference => {
            Ok(SqlValue::Text(raw.to_string()))
        }
        FieldType::Integer => raw.parse::<i64>().map(SqlValue::Integer).map_err(|_| {
            DatabaseError::Validation(format!(
                "Invalid integer value '{}' for field '{}'",
                raw, field
            ))
        }),
        FieldType::Float => raw.parse::<f64>().map(SqlValue::Real).map_err(|_| {
            DatabaseError::Validation(format!(
                "Invalid numeric value '{}' for field '{}'",
                raw, field
            ))
        }),
        FieldType::Boolean => match raw {
            "true" | "1" => Ok(SqlValue::Integer(1)),
            "false" | "0" => Ok(SqlValue::Integer(0)),
            _ => Err(DatabaseError::Validation(format!(
                "Invalid boolean value '{}' for field '{}'",
                raw, field
            ))),
        },
        FieldType::Timestamp => normalize_timestamp(raw).map(SqlValue::Text).ok_or_else(|| {
            DatabaseError::Validation(format!(
                "Invalid datetime value '{}' for field '{}'",
                raw, field
            ))
        }),
    }
}

/// Normalize an incoming timestamp to the storage format CURRENT_TIMESTAMP
/// writes, so lexicographic comparisons against stored values stay sound
fn normalize_timestamp(raw: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(format!("{} 00:00:00", date.format("%Y-%m-%d")));
    }
    None
}

/// Bind typed values onto a query in order
fn bind_values<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    values: &[SqlValue],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for value in values {
        query = match value {
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Integer(n) => query.bind(*n),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortDirection;
    use entities::{definitions, Entity, GenericEntity};
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        std::fs::File::create(&db_path).unwrap();

        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        for definition in definitions::all() {
            GenericEntity::new(definition)
                .create_tables(db.pool())
                .await
                .unwrap();
        }

        (temp_dir, db)
    }

    fn payload(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn order_payload(title: &str, amount: f64, owner: &str) -> Map<String, JsonValue> {
        payload(json!({
            "title": title,
            "description": "A spread of shared dishes",
            "address": "123 Main St, Minneapolis, MN",
            "total_amount": amount,
            "owner": owner,
            "owner_unique": owner,
        }))
    }

    fn food_payload(title: &str, price: f64, order_id: &str, owner: &str) -> Map<String, JsonValue> {
        payload(json!({
            "title": title,
            "description": "Freshly made",
            "price": price,
            "quantity": 2,
            "order_id": order_id,
            "owner": owner,
        }))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::orders());

        let created = storage
            .create(order_payload("Family dinner", 49.5, "01USER"))
            .await
            .unwrap();

        let item = storage.get(&created.id, None).await.unwrap().unwrap();
        assert_eq!(item.id, created.id);
        assert_eq!(item.str_value("title"), Some("Family dinner"));
        assert_eq!(item.float_value("total_amount"), Some(49.5));
        // Hidden columns stay out of read results
        assert!(item.value("owner_unique").is_none());
        assert!(item.value("created_at").is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_fields() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::orders());

        let err = storage
            .create(payload(json!({"title": "No details"})))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, DatabaseError::Validation(_)));
        assert!(message.contains("Description is required"));
        assert!(message.contains("Address is required"));
    }

    #[tokio::test]
    async fn test_create_applies_column_defaults() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        let created = storage
            .create(food_payload("Spring rolls", 5.5, "01ORDER", "01USER"))
            .await
            .unwrap();

        assert_eq!(created.str_value("photo"), Some("no-photo.jpg"));
    }

    #[tokio::test]
    async fn test_create_drops_unknown_keys() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        let mut fields = food_payload("Soup", 4.0, "01ORDER", "01USER");
        fields.insert("bogus".to_string(), json!("ignored"));
        fields.insert("id".to_string(), json!("forced-id"));

        let created = storage.create(fields).await.unwrap();
        assert!(created.value("bogus").is_none());
        assert_ne!(created.id, "forced-id");
    }

    #[tokio::test]
    async fn test_unique_violation_on_owner_key() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::orders());

        storage
            .create(order_payload("First order", 20.0, "01SAME"))
            .await
            .unwrap();

        let err = storage
            .create(order_payload("Second order", 30.0, "01SAME"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_null_owner_key_admits_many_rows() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::orders());

        // Rows without the uniqueness key never collide with each other
        for n in 0..3 {
            let mut fields = order_payload(&format!("Admin order {}", n), 10.0, "01ADMIN");
            fields.remove("owner_unique");
            storage.create(fields).await.unwrap();
        }

        let page = storage.list(&ListQuery::default(), None).await.unwrap();
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_update_and_not_found() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        let created = storage
            .create(food_payload("Dumplings", 8.0, "01ORDER", "01USER"))
            .await
            .unwrap();

        let updated = storage
            .update(&created.id, payload(json!({"price": 9.5})))
            .await
            .unwrap();
        assert_eq!(updated.float_value("price"), Some(9.5));
        assert_eq!(updated.str_value("title"), Some("Dumplings"));

        let err = storage
            .update("01MISSING", payload(json!({"price": 1.0})))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::EntityNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_keys() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        let created = storage
            .create(food_payload("Noodles", 7.0, "01ORDER", "01USER"))
            .await
            .unwrap();

        let err = storage
            .update(&created.id, payload(json!({"not_a_column": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownField(_)));

        // Nothing half-applied
        let item = storage.get(&created.id, None).await.unwrap().unwrap();
        assert_eq!(item.float_value("price"), Some(7.0));
    }

    #[tokio::test]
    async fn test_update_rejects_null_for_required_field() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        let created = storage
            .create(food_payload("Rice", 3.0, "01ORDER", "01USER"))
            .await
            .unwrap();

        let err = storage
            .update(&created.id, payload(json!({"title": null})))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        let created = storage
            .create(food_payload("Salad", 6.0, "01ORDER", "01USER"))
            .await
            .unwrap();

        storage.delete(&created.id).await.unwrap();
        assert!(storage.get(&created.id, None).await.unwrap().is_none());

        let err = storage.delete(&created.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::EntityNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        for n in 0..4 {
            storage
                .create(food_payload(&format!("Item {}", n), 1.0, "01ORDER", "01USER"))
                .await
                .unwrap();
        }

        assert_eq!(storage.delete_all().await.unwrap(), 4);
        let page = storage.list(&ListQuery::default(), None).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_delete_where() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        for n in 0..3 {
            storage
                .create(food_payload(&format!("Keep {}", n), 1.0, "01ORDER_A", "01USER"))
                .await
                .unwrap();
        }
        storage
            .create(food_payload("Gone", 1.0, "01ORDER_B", "01USER"))
            .await
            .unwrap();

        assert_eq!(storage.delete_where("order_id", "01ORDER_A").await.unwrap(), 3);

        let page = storage.list(&ListQuery::default(), None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].str_value("title"), Some("Gone"));

        // Unknown and hidden columns are rejected, not interpolated
        assert!(matches!(
            storage.delete_where("bogus", "x").await,
            Err(DatabaseError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn test_create_with_id_keeps_the_given_id() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        let created = storage
            .create_with_id("01FIXTURE", food_payload("Soup", 4.0, "01ORDER", "01USER"))
            .await
            .unwrap();
        assert_eq!(created.id, "01FIXTURE");

        let fetched = storage.get("01FIXTURE", None).await.unwrap().unwrap();
        assert_eq!(fetched.str_value("title"), Some("Soup"));

        assert!(matches!(
            storage.create_with_id("  ", food_payload("Blank", 1.0, "01ORDER", "01USER")).await,
            Err(DatabaseError::Validation(_))
        ));

        // A second row under the same id trips the primary key
        assert!(matches!(
            storage.create_with_id("01FIXTURE", food_payload("Dup", 2.0, "01ORDER", "01USER")).await,
            Err(DatabaseError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        for price in [10.0, 60.0, 70.0, 20.0, 80.0] {
            storage
                .create(food_payload(&format!("Dish {}", price), price, "01ORDER", "01USER"))
                .await
                .unwrap();
        }

        // First page of everything priced at 50 or more, newest first
        let query = ListQuery::new()
            .with_filter(Filter::new("price", FilterOp::Gte, "50"))
            .with_sort(SortKey::descending("created_at"))
            .with_page(1, 2);

        let page = storage.list(&query, None).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_next());
        assert!(!page.has_previous());
        let prices: Vec<f64> = page
            .items
            .iter()
            .filter_map(|i| i.float_value("price"))
            .collect();
        assert_eq!(prices, vec![80.0, 70.0]);

        let query = query.with_page(2, 2);
        let page = storage.list(&query, None).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].float_value("price"), Some(60.0));
        assert!(!page.has_next());
        assert!(page.has_previous());
    }

    #[tokio::test]
    async fn test_list_in_filter() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        for price in [5.0, 15.0, 25.0] {
            storage
                .create(food_payload(&format!("Dish {}", price), price, "01ORDER", "01USER"))
                .await
                .unwrap();
        }

        let query = ListQuery::new().with_filter(Filter::many(
            "price",
            FilterOp::In,
            vec!["5".to_string(), "25".to_string()],
        ));

        let page = storage.list(&query, None).await.unwrap();
        assert_eq!(page.total, 2);
        let mut prices: Vec<f64> = page
            .items
            .iter()
            .filter_map(|i| i.float_value("price"))
            .collect();
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(prices, vec![5.0, 25.0]);
    }

    #[tokio::test]
    async fn test_default_sort_is_newest_first_with_id_tiebreak() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        for n in 0..3 {
            storage
                .create(food_payload(&format!("Dish {}", n), 1.0, "01ORDER", "01USER"))
                .await
                .unwrap();
        }

        let page = storage.list(&ListQuery::default(), None).await.unwrap();
        let listed: Vec<String> = page.items.iter().map(|i| i.id.clone()).collect();

        // Rows created in the same second tie on created_at; ids break the tie
        let mut expected = listed.clone();
        expected.sort();
        expected.reverse();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn test_explicit_ascending_sort() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        for price in [30.0, 10.0, 20.0] {
            storage
                .create(food_payload(&format!("Dish {}", price), price, "01ORDER", "01USER"))
                .await
                .unwrap();
        }

        let query = ListQuery::new().with_sort(SortKey::ascending("price"));
        let page = storage.list(&query, None).await.unwrap();
        let prices: Vec<f64> = page
            .items
            .iter()
            .filter_map(|i| i.float_value("price"))
            .collect();
        assert_eq!(prices, vec![10.0, 20.0, 30.0]);
    }

    #[tokio::test]
    async fn test_list_select_projection() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        storage
            .create(food_payload("Bread", 2.0, "01ORDER", "01USER"))
            .await
            .unwrap();

        let mut query = ListQuery::new();
        query.select = Some(vec!["title".to_string()]);

        let page = storage.list(&query, None).await.unwrap();
        let item = &page.items[0];
        assert!(!item.id.is_empty());
        assert_eq!(item.str_value("title"), Some("Bread"));
        assert_eq!(item.fields.len(), 1);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_and_hidden_fields() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::orders());

        let query = ListQuery::new().with_filter(Filter::new("no_such", FilterOp::Eq, "x"));
        assert!(matches!(
            storage.list(&query, None).await.unwrap_err(),
            DatabaseError::UnknownField(_)
        ));

        let query = ListQuery::new().with_filter(Filter::new("owner_unique", FilterOp::Eq, "x"));
        assert!(matches!(
            storage.list(&query, None).await.unwrap_err(),
            DatabaseError::UnknownField(_)
        ));

        let mut query = ListQuery::new();
        query.select = Some(vec!["owner_unique".to_string()]);
        assert!(matches!(
            storage.list(&query, None).await.unwrap_err(),
            DatabaseError::UnknownField(_)
        ));

        let query = ListQuery::new().with_sort(SortKey {
            field: "owner_unique".to_string(),
            direction: SortDirection::Ascending,
        });
        assert!(matches!(
            storage.list(&query, None).await.unwrap_err(),
            DatabaseError::UnknownField(_)
        ));
    }

    #[tokio::test]
    async fn test_timestamp_filter_bounds() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::foods());

        storage
            .create(food_payload("Pie", 4.0, "01ORDER", "01USER"))
            .await
            .unwrap();

        let query =
            ListQuery::new().with_filter(Filter::new("created_at", FilterOp::Lte, "2100-01-01"));
        assert_eq!(storage.list(&query, None).await.unwrap().total, 1);

        let query =
            ListQuery::new().with_filter(Filter::new("created_at", FilterOp::Gte, "2100-01-01"));
        assert_eq!(storage.list(&query, None).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_find_one() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::orders());

        storage
            .create(order_payload("Owned order", 12.0, "01OWNER"))
            .await
            .unwrap();

        let found = storage.find_one("owner", "01OWNER").await.unwrap();
        assert!(found.is_some());

        let missing = storage.find_one("owner", "01NOBODY").await.unwrap();
        assert!(missing.is_none());

        let err = storage.find_one("owner_unique", "x").await.unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownField(_)));
    }

    #[tokio::test]
    async fn test_populate_parent() {
        let (_guard, db) = setup_test_db().await;
        let orders = EntityStorage::new(&db, definitions::orders());
        let foods = EntityStorage::new(&db, definitions::foods());

        let order = orders
            .create(order_payload("Big platter", 42.0, "01OWNER"))
            .await
            .unwrap();
        let food = foods
            .create(food_payload("Kebab", 9.0, &order.id, "01OWNER"))
            .await
            .unwrap();

        let populate = Populate::parent(
            "order_id",
            definitions::orders(),
            &["title", "description"],
        );
        let item = foods.get(&food.id, Some(&populate)).await.unwrap().unwrap();

        let parent = item.value("order_id").unwrap();
        assert_eq!(parent["id"], json!(order.id));
        assert_eq!(parent["title"], json!("Big platter"));
        assert_eq!(parent["description"], json!("A spread of shared dishes"));
        assert!(parent.get("total_amount").is_none());
    }

    #[tokio::test]
    async fn test_populate_children() {
        let (_guard, db) = setup_test_db().await;
        let orders = EntityStorage::new(&db, definitions::orders());
        let foods = EntityStorage::new(&db, definitions::foods());

        let order = orders
            .create(order_payload("Street food", 30.0, "01OWNER"))
            .await
            .unwrap();
        for n in 0..2 {
            foods
                .create(food_payload(&format!("Snack {}", n), 3.0, &order.id, "01OWNER"))
                .await
                .unwrap();
        }

        let populate = Populate::children("foods", definitions::foods(), "order_id");
        let page = orders
            .list(&ListQuery::default(), Some(&populate))
            .await
            .unwrap();

        let children = page.items[0].value("foods").unwrap().as_array().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0]["order_id"], json!(order.id));
    }

    #[tokio::test]
    async fn test_list_within_radius() {
        let (_guard, db) = setup_test_db().await;
        let storage = EntityStorage::new(&db, definitions::orders());

        let mut near = order_payload("Minneapolis order", 10.0, "01A");
        near.insert("latitude".to_string(), json!(44.98));
        near.insert("longitude".to_string(), json!(-93.27));
        storage.create(near).await.unwrap();

        let mut far = order_payload("Chicago order", 10.0, "01B");
        far.insert("latitude".to_string(), json!(41.88));
        far.insert("longitude".to_string(), json!(-87.63));
        storage.create(far).await.unwrap();

        // No coordinates at all, never matches
        storage
            .create(order_payload("Unplaced order", 10.0, "01C"))
            .await
            .unwrap();

        let items = storage.list_within_radius(44.95, -93.09, 50.0).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].str_value("title"), Some("Minneapolis order"));
    }

    #[test]
    fn test_haversine_distance() {
        // Minneapolis to St. Paul is roughly ten miles
        let distance = haversine_miles(44.98, -93.27, 44.95, -93.09);
        assert!(distance > 8.0 && distance < 12.0);

        let distance = haversine_miles(44.98, -93.27, 44.98, -93.27);
        assert!(distance < 0.1);
    }

    #[test]
    fn test_normalize_timestamp_forms() {
        assert_eq!(
            normalize_timestamp("2024-06-01T10:30:00Z").as_deref(),
            Some("2024-06-01 10:30:00")
        );
        assert_eq!(
            normalize_timestamp("2024-06-01 10:30:00").as_deref(),
            Some("2024-06-01 10:30:00")
        );
        assert_eq!(
            normalize_timestamp("2024-06-01").as_deref(),
            Some("2024-06-01 00:00:00")
        );
        assert_eq!(normalize_timestamp("yesterday"), None);
    }
}
