//! Durable per-project, per-entity-type sequence counters

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use super::connection::Database;
use super::traits::SequenceRepository;
use crate::error::Result;
use crate::ids::{EntityId, EntityType};

/// Increments and returns the counter for `(project, entity_type)`.
///
/// A single UPSERT ... RETURNING statement, so no other writer can observe
/// or claim the same value. The first call for a pair returns 1.
pub(crate) fn next_sequence_number(
    conn: &Connection,
    project: &str,
    entity_type: EntityType,
) -> Result<u64> {
    let value: i64 = conn.query_row(
        "INSERT INTO sequences (project, entity_type, value) VALUES (?1, ?2, 1)
         ON CONFLICT (project, entity_type) DO UPDATE SET value = value + 1
         RETURNING value",
        params![project, entity_type.as_str()],
        |row| row.get(0),
    )?;
    tracing::debug!(project, entity_type = %entity_type, value, "issued sequence number");
    Ok(value as u64)
}

/// Draws the next number and formats it as an entity ID
pub(crate) fn next_entity_id(
    conn: &Connection,
    project: &str,
    entity_type: EntityType,
) -> Result<String> {
    let seq = next_sequence_number(conn, project, entity_type)?;
    Ok(EntityId::new(project, entity_type, seq).to_string())
}

/// Last value issued for the pair, 0 if none
pub(crate) fn peek_sequence_number(
    conn: &Connection,
    project: &str,
    entity_type: EntityType,
) -> Result<u64> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT value FROM sequences WHERE project = ?1 AND entity_type = ?2",
            params![project, entity_type.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0) as u64)
}

pub struct SqliteSequenceStore {
    db: Arc<Database>,
}

impl SqliteSequenceStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl SequenceRepository for SqliteSequenceStore {
    fn next_sequence_number(&self, project: &str, entity_type: EntityType) -> Result<u64> {
        self.db
            .with_tx(|conn| next_sequence_number(conn, project, entity_type))
    }

    fn peek_sequence_number(&self, project: &str, entity_type: EntityType) -> Result<u64> {
        self.db
            .with_conn(|conn| peek_sequence_number(conn, project, entity_type))
    }
}
