//! Collection CRUD operations
//!
//! Every status write here is version-qualified; there is no unconditional
//! status update for collections.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::{Collection, LedgerStatus};

const SELECT_COLUMNS: &str = "SELECT id, farmer_id, collector_id, crop_type, weight_kg, \
     price_per_kg, status, version, created_at, updated_at FROM collections";

fn from_row(row: &Row) -> Result<Collection, rusqlite::Error> {
    let status: String = row.get("status")?;
    let status = status.parse::<LedgerStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;

    Ok(Collection {
        id: row.get("id")?,
        farmer_id: row.get("farmer_id")?,
        collector_id: row.get("collector_id")?,
        crop_type: row.get("crop_type")?,
        weight_kg: row.get("weight_kg")?,
        price_per_kg: row.get("price_per_kg")?,
        status,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Get collection by ID
pub fn get_collection(conn: &Connection, id: &str) -> Result<Option<Collection>, LedgerError> {
    let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
    let collection = conn
        .query_row(&sql, params![id], from_row)
        .optional()?;
    Ok(collection)
}

/// Collections for one farmer, newest first
pub fn list_by_farmer(conn: &Connection, farmer_id: &str) -> Result<Vec<Collection>, LedgerError> {
    let sql = format!("{} WHERE farmer_id = ? ORDER BY created_at DESC", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![farmer_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All collections, newest first
pub fn list_all(conn: &Connection) -> Result<Vec<Collection>, LedgerError> {
    let sql = format!("{} ORDER BY created_at DESC", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert a new collection row as given
pub fn insert_collection(conn: &Connection, c: &Collection) -> Result<(), LedgerError> {
    let result = conn.execute(
        r#"
        INSERT INTO collections (
            id, farmer_id, collector_id, crop_type, weight_kg, price_per_kg,
            status, version, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            c.id,
            c.farmer_id,
            c.collector_id,
            c.crop_type,
            c.weight_kg,
            c.price_per_kg,
            c.status.as_str(),
            c.version,
            c.created_at,
            c.updated_at,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, msg))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(LedgerError::InvalidInput(format!(
                "collection {} violates a constraint: {}",
                c.id,
                msg.unwrap_or_else(|| "unknown farmer, collector or duplicate id".to_string())
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Compare-and-swap status write.
///
/// Applies only when the stored version equals `expected_version`; returns
/// the number of rows affected (0 or 1).
pub fn update_status_if_version(
    conn: &Connection,
    id: &str,
    expected_version: i64,
    status: LedgerStatus,
    updated_at: &str,
) -> Result<usize, LedgerError> {
    let changes = conn.execute(
        r#"
        UPDATE collections
        SET status = ?, version = version + 1, updated_at = ?
        WHERE id = ? AND version = ?
        "#,
        params![status.as_str(), updated_at, id, expected_version],
    )?;

    debug!(id = %id, expected_version, changes, "Conditional status write");
    Ok(changes)
}

/// Delete collection by ID
pub fn delete_collection(conn: &Connection, id: &str) -> Result<bool, LedgerError> {
    let changes = conn.execute("DELETE FROM collections WHERE id = ?", params![id])?;
    Ok(changes > 0)
}
