use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::Database;
use super::integrity::{check_adr_supersede, require_adr, require_track};
use super::rows::{parse_col, time_col, to_sql_time};
use super::sequence::next_entity_id;
use super::traits::AdrRepository;
use crate::error::{classify_write, Error, Result};
use crate::ids::{check_id, EntityType};
use crate::models::{Adr, AdrStatus, NewAdr};

const COLUMNS: &str = "id, track_id, title, status, context, decision, consequences,
                       superseded_by, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Adr> {
    Ok(Adr {
        id: row.get(0)?,
        track_id: row.get(1)?,
        title: row.get(2)?,
        status: parse_col(row, 3)?,
        context: row.get(4)?,
        decision: row.get(5)?,
        consequences: row.get(6)?,
        superseded_by: row.get(7)?,
        created_at: time_col(row, 8)?,
        updated_at: time_col(row, 9)?,
    })
}

fn load(conn: &Connection, id: &str) -> Result<Adr> {
    check_id(id, EntityType::Adr)?;
    conn.query_row(
        &format!("SELECT {} FROM adrs WHERE id = ?1", COLUMNS),
        [id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("ADR", id))
}

pub(crate) fn list_adrs(conn: &Connection, track_id: Option<&str>) -> Result<Vec<Adr>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM adrs WHERE (?1 IS NULL OR track_id = ?1) ORDER BY created_at, id",
        COLUMNS
    ))?;
    let adrs = stmt
        .query_map([track_id], from_row)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(adrs)
}

pub struct SqliteAdrStore {
    db: Arc<Database>,
    project: String,
}

impl SqliteAdrStore {
    pub fn new(db: Arc<Database>, project: impl Into<String>) -> Self {
        Self {
            db,
            project: project.into(),
        }
    }
}

impl AdrRepository for SqliteAdrStore {
    fn create(&self, adr: NewAdr) -> Result<Adr> {
        let created = self.db.with_tx(|conn| {
            require_track(conn, &adr.track_id)?;
            check_adr_supersede(conn, None, adr.status, adr.superseded_by.as_deref())?;
            let id = next_entity_id(conn, &self.project, EntityType::Adr)?;
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "INSERT INTO adrs (id, track_id, title, status, context, decision, consequences,
                                   superseded_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    id,
                    adr.track_id,
                    adr.title,
                    adr.status.as_str(),
                    adr.context,
                    adr.decision,
                    adr.consequences,
                    adr.superseded_by,
                    now
                ],
            )
            .map_err(|e| classify_write(e, "ADR", &id))?;
            load(conn, &id)
        })?;

        tracing::info!(adr_id = %created.id, track_id = %created.track_id, "created ADR");
        Ok(created)
    }

    fn get(&self, id: &str) -> Result<Adr> {
        self.db.with_conn(|conn| load(conn, id))
    }

    fn list(&self, track_id: Option<&str>) -> Result<Vec<Adr>> {
        self.db.with_conn(|conn| {
            if let Some(track_id) = track_id {
                require_track(conn, track_id)?;
            }
            list_adrs(conn, track_id)
        })
    }

    fn update(&self, adr: &Adr) -> Result<Adr> {
        let updated = self.db.with_tx(|conn| {
            require_adr(conn, &adr.id)?;
            require_track(conn, &adr.track_id)?;
            check_adr_supersede(conn, Some(&adr.id), adr.status, adr.superseded_by.as_deref())?;
            conn.execute(
                "UPDATE adrs SET track_id = ?2, title = ?3, status = ?4, context = ?5, decision = ?6,
                        consequences = ?7, superseded_by = ?8, updated_at = ?9
                 WHERE id = ?1",
                params![
                    adr.id,
                    adr.track_id,
                    adr.title,
                    adr.status.as_str(),
                    adr.context,
                    adr.decision,
                    adr.consequences,
                    adr.superseded_by,
                    to_sql_time(&Utc::now())
                ],
            )?;
            load(conn, &adr.id)
        })?;

        tracing::info!(adr_id = %updated.id, status = %updated.status, "updated ADR");
        Ok(updated)
    }

    fn supersede(&self, id: &str, by: &str) -> Result<Adr> {
        let adr = self.db.with_tx(|conn| {
            // Each side is checked on its own so the error names the missing one
            require_adr(conn, id)?;
            check_adr_supersede(conn, Some(id), AdrStatus::Superseded, Some(by))?;
            conn.execute(
                "UPDATE adrs SET status = ?2, superseded_by = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    id,
                    AdrStatus::Superseded.as_str(),
                    by,
                    to_sql_time(&Utc::now())
                ],
            )?;
            load(conn, id)
        })?;

        tracing::info!(adr_id = id, superseded_by = by, "superseded ADR");
        Ok(adr)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            require_adr(conn, id)?;
            conn.execute("DELETE FROM adrs WHERE id = ?1", [id])?;
            Ok(())
        })?;
        tracing::info!(adr_id = id, "deleted ADR");
        Ok(())
    }
}
