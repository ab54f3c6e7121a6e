//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::LedgerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), LedgerError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
pub fn get_schema_version(conn: &Connection) -> Result<i32, LedgerError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| LedgerError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| LedgerError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| LedgerError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute_batch(ACTORS_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create actor tables: {}", e)))?;

    conn.execute_batch(COLLECTIONS_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create collections table: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

const ACTORS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS farmers (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    phone TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS collectors (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    phone TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

const COLLECTIONS_SCHEMA: &str = r#"
-- value = weight_kg * price_per_kg is derived on read
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY NOT NULL,
    farmer_id TEXT NOT NULL,
    collector_id TEXT NOT NULL,
    crop_type TEXT NOT NULL,
    weight_kg REAL NOT NULL CHECK (weight_kg > 0),
    price_per_kg REAL NOT NULL CHECK (price_per_kg > 0),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'verified', 'paid')),
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (farmer_id) REFERENCES farmers(id),
    FOREIGN KEY (collector_id) REFERENCES collectors(id)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_collections_farmer ON collections(farmer_id);
CREATE INDEX IF NOT EXISTS idx_collections_collector ON collections(collector_id);
CREATE INDEX IF NOT EXISTS idx_collections_created ON collections(created_at);
"#;
