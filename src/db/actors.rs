//! Farmer and collector accounts
//!
//! Both tables share one shape, so a single set of functions serves both,
//! keyed by [`ActorKind`].

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::now_rfc3339;

/// Which actor table to address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Farmer,
    Collector,
}

impl ActorKind {
    fn table(&self) -> &'static str {
        match self {
            ActorKind::Farmer => "farmers",
            ActorKind::Collector => "collectors",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActorKind::Farmer => "farmer",
            ActorKind::Collector => "collector",
        }
    }
}

/// Actor row from database
#[derive(Debug, Clone, Serialize)]
pub struct ActorRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl ActorRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            password_hash: row.get("password_hash")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for creating an actor; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewActor {
    pub id: Option<String>,
    pub name: String,
    pub phone: String,
    pub password_hash: String,
}

/// Create a farmer or collector
pub fn create_actor(
    conn: &Connection,
    kind: ActorKind,
    input: NewActor,
) -> Result<ActorRow, LedgerError> {
    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = now_rfc3339();

    let sql = format!(
        "INSERT INTO {} (id, name, phone, password_hash, version, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 1, ?, ?)",
        kind.table()
    );

    match conn.execute(&sql, params![id, input.name, input.phone, input.password_hash, now, now]) {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            return Err(LedgerError::InvalidInput(format!(
                "a {} with this id or phone already exists",
                kind.label()
            )));
        }
        Err(e) => return Err(e.into()),
    }

    get_actor(conn, kind, &id)?
        .ok_or_else(|| LedgerError::Internal(format!("{} not found after insert", kind.label())))
}

/// Get actor by ID
pub fn get_actor(
    conn: &Connection,
    kind: ActorKind,
    id: &str,
) -> Result<Option<ActorRow>, LedgerError> {
    let sql = format!("SELECT * FROM {} WHERE id = ?", kind.table());
    Ok(conn.query_row(&sql, params![id], ActorRow::from_row).optional()?)
}

/// Get actor by phone (login lookup)
pub fn get_actor_by_phone(
    conn: &Connection,
    kind: ActorKind,
    phone: &str,
) -> Result<Option<ActorRow>, LedgerError> {
    let sql = format!("SELECT * FROM {} WHERE phone = ?", kind.table());
    Ok(conn.query_row(&sql, params![phone], ActorRow::from_row).optional()?)
}
