use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::Database;
use super::integrity::{require_task, require_track};
use super::rows::{parse_col, time_col, to_sql_time};
use super::sequence::next_entity_id;
use super::traits::TaskRepository;
use crate::error::{classify_write, Error, Result};
use crate::ids::{check_id, EntityType};
use crate::models::{NewTask, Task, TaskFilter};

pub(crate) const COLUMNS: &str =
    "id, track_id, title, description, status, rank, created_at, updated_at";

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        track_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_col(row, 4)?,
        rank: row.get(5)?,
        created_at: time_col(row, 6)?,
        updated_at: time_col(row, 7)?,
    })
}

fn load(conn: &Connection, id: &str) -> Result<Task> {
    check_id(id, EntityType::Task)?;
    conn.query_row(
        &format!("SELECT {} FROM tasks WHERE id = ?1", COLUMNS),
        [id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("task", id))
}

pub(crate) fn list_tasks(conn: &Connection, filter: &TaskFilter) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tasks
         WHERE (?1 IS NULL OR track_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY rank, created_at, id",
        COLUMNS
    ))?;
    let tasks = stmt
        .query_map(
            params![filter.track_id, filter.status.map(|s| s.as_str())],
            from_row,
        )?
        .collect::<rusqlite::Result<_>>()?;
    Ok(tasks)
}

pub struct SqliteTaskStore {
    db: Arc<Database>,
    project: String,
}

impl SqliteTaskStore {
    pub fn new(db: Arc<Database>, project: impl Into<String>) -> Self {
        Self {
            db,
            project: project.into(),
        }
    }
}

impl TaskRepository for SqliteTaskStore {
    fn create(&self, task: NewTask) -> Result<Task> {
        let created = self.db.with_tx(|conn| {
            require_track(conn, &task.track_id)?;
            let id = next_entity_id(conn, &self.project, EntityType::Task)?;
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "INSERT INTO tasks (id, track_id, title, description, status, rank, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    task.track_id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.rank,
                    now
                ],
            )
            .map_err(|e| classify_write(e, "task", &id))?;
            load(conn, &id)
        })?;

        tracing::info!(task_id = %created.id, track_id = %created.track_id, "created task");
        Ok(created)
    }

    fn get(&self, id: &str) -> Result<Task> {
        self.db.with_conn(|conn| load(conn, id))
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.db.with_conn(|conn| list_tasks(conn, filter))
    }

    fn update(&self, task: &Task) -> Result<Task> {
        let updated = self.db.with_tx(|conn| {
            require_task(conn, &task.id)?;
            require_track(conn, &task.track_id)?;
            conn.execute(
                "UPDATE tasks SET track_id = ?2, title = ?3, description = ?4, status = ?5,
                        rank = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    task.id,
                    task.track_id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.rank,
                    to_sql_time(&Utc::now())
                ],
            )?;
            load(conn, &task.id)
        })?;

        tracing::info!(task_id = %updated.id, status = %updated.status, "updated task");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            require_task(conn, id)?;
            conn.execute("DELETE FROM tasks WHERE id = ?1", [id])
                .map_err(|e| classify_write(e, "task", id))?;
            Ok(())
        })?;
        tracing::info!(task_id = id, "deleted task");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{RoadmapRepository, SqliteRoadmapStore, SqliteTrackStore, TrackRepository};
    use crate::error::ErrorKind;
    use crate::models::{NewRoadmap, NewTrack, TaskStatus};

    struct Fixture {
        tasks: SqliteTaskStore,
        track_a: String,
        track_b: String,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        SqliteRoadmapStore::new(db.clone())
            .create(NewRoadmap {
                id: "main".into(),
                title: "Main".into(),
                vision: String::new(),
            })
            .unwrap();
        let tracks = SqliteTrackStore::new(db.clone(), "PRJ");
        let track_a = tracks.create(NewTrack::new("main", "A")).unwrap().id;
        let track_b = tracks.create(NewTrack::new("main", "B")).unwrap().id;
        Fixture {
            tasks: SqliteTaskStore::new(db, "PRJ"),
            track_a,
            track_b,
        }
    }

    #[test]
    fn test_create_requires_existing_track() {
        let f = fixture();
        let task = f.tasks.create(NewTask::new(&f.track_a, "Write schema")).unwrap();
        assert_eq!(task.id, "PRJ-task-1");

        let err = f.tasks.create(NewTask::new("PRJ-track-42", "Orphan")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("PRJ-track-42"));
    }

    #[test]
    fn test_update_rechecks_track() {
        let f = fixture();
        let mut task = f.tasks.create(NewTask::new(&f.track_a, "Write schema")).unwrap();

        task.track_id = f.track_b.clone();
        task.status = TaskStatus::Done;
        let updated = f.tasks.update(&task).unwrap();
        assert_eq!(updated.track_id, f.track_b);
        assert_eq!(updated.status, TaskStatus::Done);

        task.track_id = "PRJ-track-9".into();
        assert_eq!(f.tasks.update(&task).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(f.tasks.get(&task.id).unwrap().track_id, f.track_b);
    }

    #[test]
    fn test_list_filters_by_track() {
        let f = fixture();
        f.tasks.create(NewTask::new(&f.track_a, "One")).unwrap();
        f.tasks.create(NewTask::new(&f.track_b, "Two")).unwrap();

        let filter = TaskFilter {
            track_id: Some(f.track_b.clone()),
            ..Default::default()
        };
        let listed = f.tasks.list(&filter).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Two");
    }

    #[test]
    fn test_delete_missing_task() {
        let f = fixture();
        let err = f.tasks.delete("PRJ-task-5").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
