//! Cross-cutting read queries over the whole project

use chrono::Utc;
use rusqlite::Connection;
use std::sync::Arc;

use super::connection::Database;
use super::integrity::{require_iteration, require_track};
use super::rows::parse_col;
use super::traits::AggregateRepository;
use super::{acs, adrs, documents, iterations, roadmaps, tasks, tracks};
use crate::error::Result;
use crate::models::{
    Progress, ProjectSnapshot, ProjectStats, TaskFilter, TaskStatus, TrackFilter,
};

fn count(conn: &Connection, table: &str) -> Result<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(n as usize)
}

fn progress(conn: &Connection, sql: &str, key: &dyn rusqlite::ToSql) -> Result<Progress> {
    let mut stmt = conn.prepare(sql)?;
    let statuses = stmt.query_map([key], |row| parse_col::<TaskStatus>(row, 0))?;
    let mut progress = Progress::default();
    for status in statuses {
        progress.record(status?);
    }
    Ok(progress)
}

pub struct SqliteAggregateStore {
    db: Arc<Database>,
    project: String,
}

impl SqliteAggregateStore {
    pub fn new(db: Arc<Database>, project: impl Into<String>) -> Self {
        Self {
            db,
            project: project.into(),
        }
    }
}

impl AggregateRepository for SqliteAggregateStore {
    fn stats(&self) -> Result<ProjectStats> {
        self.db.with_conn(|conn| {
            Ok(ProjectStats {
                roadmaps: count(conn, "roadmaps")?,
                tracks: count(conn, "tracks")?,
                dependencies: count(conn, "track_dependencies")?,
                tasks: count(conn, "tasks")?,
                iterations: count(conn, "iterations")?,
                acceptance_criteria: count(conn, "acceptance_criteria")?,
                adrs: count(conn, "adrs")?,
                documents: count(conn, "documents")?,
            })
        })
    }

    fn track_progress(&self, track_id: &str) -> Result<Progress> {
        self.db.with_conn(|conn| {
            require_track(conn, track_id)?;
            progress(conn, "SELECT status FROM tasks WHERE track_id = ?1", &track_id)
        })
    }

    fn iteration_progress(&self, number: u32) -> Result<Progress> {
        self.db.with_conn(|conn| {
            require_iteration(conn, number)?;
            progress(
                conn,
                "SELECT t.status FROM iteration_tasks it JOIN tasks t ON t.id = it.task_id
                 WHERE it.iteration_number = ?1",
                &number,
            )
        })
    }

    fn snapshot(&self) -> Result<ProjectSnapshot> {
        // One read transaction, so the snapshot is consistent
        self.db.with_tx(|conn| {
            Ok(ProjectSnapshot {
                project_code: self.project.clone(),
                exported_at: Utc::now(),
                roadmaps: roadmaps::list_roadmaps(conn)?,
                tracks: tracks::list_tracks(conn, &TrackFilter::default())?,
                tasks: tasks::list_tasks(conn, &TaskFilter::default())?,
                iterations: iterations::list_iterations(conn)?,
                acceptance_criteria: acs::list_all(conn)?,
                adrs: adrs::list_adrs(conn, None)?,
                documents: documents::list_documents(conn, None)?,
            })
        })
    }
}
