use anyhow::{bail, Context, Result};
use colored::*;
use database::{initialize_database, Database, DatabaseConfig, EntityDefinition, EntityStorage};
use entities::definitions;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Import all fixture files into the database
pub async fn import(data_dir: PathBuf, fixtures: PathBuf) -> Result<()> {
    let db = open_database(&data_dir).await?;

    let users = read_fixture(&fixtures, "users")?;
    let orders = read_fixture(&fixtures, "orders")?;
    let foods = read_fixture(&fixtures, "foods")?;

    let users = hash_user_passwords(users)?;

    // Parents before children so the cross-references resolve
    insert_rows(&db, definitions::users(), users, "users").await?;
    insert_rows(&db, definitions::orders(), orders, "orders").await?;
    insert_rows(&db, definitions::foods(), foods, "foods").await?;

    println!("{}", "Data imported".green().bold());
    Ok(())
}

/// Delete every row from every entity table
pub async fn destroy(data_dir: PathBuf) -> Result<()> {
    let db = open_database(&data_dir).await?;

    // Children before parents
    let foods = EntityStorage::new(&db, definitions::foods())
        .delete_all()
        .await?;
    let orders = EntityStorage::new(&db, definitions::orders())
        .delete_all()
        .await?;
    let users = EntityStorage::new(&db, definitions::users())
        .delete_all()
        .await?;

    println!("Deleted {} foods, {} orders, {} users", foods, orders, users);
    println!("{}", "Data destroyed".red().bold());
    Ok(())
}

async fn open_database(data_dir: &Path) -> Result<Arc<Database>> {
    let config = DatabaseConfig::new().with_database_path(data_dir.join("platter.db"));
    let db = initialize_database(config)
        .await
        .context("Failed to open the database")?;
    Ok(db)
}

/// Read one fixture file as an array of JSON objects
fn read_fixture(dir: &Path, name: &str) -> Result<Vec<Map<String, Value>>> {
    let path = dir.join(format!("{}.json", name));
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Cannot read fixture file {}", path.display()))?;
    let rows: Vec<Map<String, Value>> = serde_json::from_str(&raw)
        .with_context(|| format!("Fixture file {} is not an array of objects", path.display()))?;
    Ok(rows)
}

/// Swap each plaintext `password` for a `password_hash` column
fn hash_user_passwords(rows: Vec<Map<String, Value>>) -> Result<Vec<Map<String, Value>>> {
    let mut hashed = Vec::with_capacity(rows.len());
    for mut row in rows {
        let Some(password) = row
            .remove("password")
            .and_then(|v| v.as_str().map(str::to_string))
        else {
            bail!("Every user fixture must carry a password");
        };
        let hash = user::hash_password(&password).context("Failed to hash a fixture password")?;
        row.insert("password_hash".to_string(), Value::String(hash));
        hashed.push(row);
    }
    Ok(hashed)
}

/// Pull an explicit id out of the row, if one was given
fn take_id(row: &mut Map<String, Value>) -> Option<String> {
    match row.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        _ => None,
    }
}

async fn insert_rows(
    db: &Database,
    definition: EntityDefinition,
    rows: Vec<Map<String, Value>>,
    label: &str,
) -> Result<()> {
    let storage = EntityStorage::new(db, definition);
    let mut count = 0usize;

    for mut row in rows {
        match take_id(&mut row) {
            Some(id) => {
                storage.create_with_id(&id, row).await?;
            }
            None => {
                storage.create(row).await?;
            }
        }
        count += 1;
    }

    println!("Imported {} {}", count, label);
    Ok(())
}
