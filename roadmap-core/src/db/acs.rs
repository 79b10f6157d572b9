use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::Database;
use super::integrity::require_task;
use super::rows::{parse_col, time_col, to_sql_time};
use super::sequence::next_entity_id;
use super::traits::AcceptanceCriteriaRepository;
use crate::error::{classify_write, Error, Result};
use crate::ids::{check_id, EntityType};
use crate::models::{AcStatus, AcceptanceCriteria, NewAcceptanceCriteria};

const COLUMNS: &str = "id, task_id, description, status, notes, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<AcceptanceCriteria> {
    Ok(AcceptanceCriteria {
        id: row.get(0)?,
        task_id: row.get(1)?,
        description: row.get(2)?,
        status: parse_col(row, 3)?,
        notes: row.get(4)?,
        created_at: time_col(row, 5)?,
        updated_at: time_col(row, 6)?,
    })
}

fn load(conn: &Connection, id: &str) -> Result<AcceptanceCriteria> {
    check_id(id, EntityType::Ac)?;
    conn.query_row(
        &format!("SELECT {} FROM acceptance_criteria WHERE id = ?1", COLUMNS),
        [id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("acceptance criteria", id))
}

pub(crate) fn list_all(conn: &Connection) -> Result<Vec<AcceptanceCriteria>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM acceptance_criteria ORDER BY task_id, created_at, id",
        COLUMNS
    ))?;
    let acs = stmt.query_map([], from_row)?.collect::<rusqlite::Result<_>>()?;
    Ok(acs)
}

pub struct SqliteAcceptanceCriteriaStore {
    db: Arc<Database>,
    project: String,
}

impl SqliteAcceptanceCriteriaStore {
    pub fn new(db: Arc<Database>, project: impl Into<String>) -> Self {
        Self {
            db,
            project: project.into(),
        }
    }
}

impl AcceptanceCriteriaRepository for SqliteAcceptanceCriteriaStore {
    fn create(&self, ac: NewAcceptanceCriteria) -> Result<AcceptanceCriteria> {
        let created = self.db.with_tx(|conn| {
            require_task(conn, &ac.task_id)?;
            let id = next_entity_id(conn, &self.project, EntityType::Ac)?;
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "INSERT INTO acceptance_criteria (id, task_id, description, status, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, '', ?5, ?5)",
                params![id, ac.task_id, ac.description, AcStatus::Pending.as_str(), now],
            )
            .map_err(|e| classify_write(e, "acceptance criteria", &id))?;
            load(conn, &id)
        })?;

        tracing::info!(ac_id = %created.id, task_id = %created.task_id, "created acceptance criteria");
        Ok(created)
    }

    fn get(&self, id: &str) -> Result<AcceptanceCriteria> {
        self.db.with_conn(|conn| load(conn, id))
    }

    fn list_for_task(&self, task_id: &str) -> Result<Vec<AcceptanceCriteria>> {
        self.db.with_conn(|conn| {
            require_task(conn, task_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM acceptance_criteria WHERE task_id = ?1 ORDER BY created_at, id",
                COLUMNS
            ))?;
            let acs = stmt
                .query_map([task_id], from_row)?
                .collect::<rusqlite::Result<_>>()?;
            Ok(acs)
        })
    }

    fn update(&self, ac: &AcceptanceCriteria) -> Result<AcceptanceCriteria> {
        let updated = self.db.with_tx(|conn| {
            load(conn, &ac.id)?;
            require_task(conn, &ac.task_id)?;
            conn.execute(
                "UPDATE acceptance_criteria
                 SET task_id = ?2, description = ?3, status = ?4, notes = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    ac.id,
                    ac.task_id,
                    ac.description,
                    ac.status.as_str(),
                    ac.notes,
                    to_sql_time(&Utc::now())
                ],
            )?;
            load(conn, &ac.id)
        })?;

        tracing::info!(ac_id = %updated.id, status = %updated.status, "updated acceptance criteria");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            check_id(id, EntityType::Ac)?;
            let removed = conn.execute("DELETE FROM acceptance_criteria WHERE id = ?1", [id])?;
            if removed == 0 {
                return Err(Error::not_found("acceptance criteria", id));
            }
            Ok(())
        })?;
        tracing::info!(ac_id = id, "deleted acceptance criteria");
        Ok(())
    }
}
