//! Iteration store: CRUD, lifecycle transitions and task membership

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::Database;
use super::integrity::{require_iteration, require_task};
use super::rows::{opt_time_col, parse_col, time_col, to_sql_time};
use super::sequence::next_sequence_number;
use super::tasks;
use super::traits::IterationRepository;
use crate::error::{classify_write, Error, Result};
use crate::ids::EntityType;
use crate::lifecycle::{can_complete_iteration, can_start_iteration, check_transition, Transition};
use crate::models::{check_rank, Iteration, IterationStatus, NewIteration, Task};

const COLUMNS: &str = "number, name, goal, deliverable, status, rank, started_at, completed_at,
                       created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Iteration> {
    Ok(Iteration {
        number: row.get(0)?,
        name: row.get(1)?,
        goal: row.get(2)?,
        deliverable: row.get(3)?,
        status: parse_col(row, 4)?,
        rank: row.get(5)?,
        task_ids: Vec::new(),
        started_at: opt_time_col(row, 6)?,
        completed_at: opt_time_col(row, 7)?,
        created_at: time_col(row, 8)?,
        updated_at: time_col(row, 9)?,
    })
}

fn load_task_ids(conn: &Connection, number: u32) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT task_id FROM iteration_tasks WHERE iteration_number = ?1 ORDER BY seq",
    )?;
    let ids = stmt
        .query_map([number], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

fn find(conn: &Connection, number: u32) -> Result<Option<Iteration>> {
    let iteration = conn
        .query_row(
            &format!("SELECT {} FROM iterations WHERE number = ?1", COLUMNS),
            [number],
            from_row,
        )
        .optional()?;
    match iteration {
        Some(mut iteration) => {
            iteration.task_ids = load_task_ids(conn, number)?;
            Ok(Some(iteration))
        }
        None => Ok(None),
    }
}

fn load(conn: &Connection, number: u32) -> Result<Iteration> {
    find(conn, number)?.ok_or_else(|| Error::not_found("iteration", number))
}

/// The current iteration, if any. Absence is the normal state, not an error.
pub(crate) fn load_current(conn: &Connection) -> Result<Option<Iteration>> {
    let number: Option<u32> = conn
        .query_row(
            "SELECT number FROM iterations WHERE status = 'current'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match number {
        Some(number) => find(conn, number),
        None => Ok(None),
    }
}

pub(crate) fn list_iterations(conn: &Connection) -> Result<Vec<Iteration>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM iterations ORDER BY rank, number",
        COLUMNS
    ))?;
    let mut iterations: Vec<Iteration> = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<_>>()?;
    for iteration in &mut iterations {
        iteration.task_ids = load_task_ids(conn, iteration.number)?;
    }
    Ok(iterations)
}

/// Draws iteration numbers from the sequence until one is free
fn next_free_number(conn: &Connection, project: &str) -> Result<u32> {
    loop {
        let seq = next_sequence_number(conn, project, EntityType::Iteration)?;
        let number = u32::try_from(seq)
            .map_err(|_| Error::invalid(format!("iteration sequence overflow at {}", seq)))?;
        if find(conn, number)?.is_none() {
            return Ok(number);
        }
    }
}

fn start_in(conn: &Connection, number: u32) -> Result<(Iteration, Transition)> {
    let iteration = load(conn, number)?;
    let decision = can_start_iteration(&iteration, || load_current(conn));
    match decision {
        Ok(Transition::Unchanged) => Ok((iteration, Transition::Unchanged)),
        Ok(transition @ Transition::Advance { .. }) => {
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "UPDATE iterations SET status = ?2, started_at = ?3, updated_at = ?3
                 WHERE number = ?1",
                params![number, IterationStatus::Current.as_str(), now],
            )
            .map_err(|e| classify_write(e, "current iteration", &number.to_string()))?;
            Ok((load(conn, number)?, transition))
        }
        Err(err) => {
            tracing::debug!(number, error = %err, "rejected iteration start");
            Err(err)
        }
    }
}

fn complete_in(conn: &Connection, number: u32) -> Result<(Iteration, Transition)> {
    let iteration = load(conn, number)?;
    match can_complete_iteration(&iteration) {
        Ok(Transition::Unchanged) => Ok((iteration, Transition::Unchanged)),
        Ok(transition @ Transition::Advance { .. }) => {
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "UPDATE iterations SET status = ?2, completed_at = ?3, updated_at = ?3
                 WHERE number = ?1",
                params![number, IterationStatus::Complete.as_str(), now],
            )?;
            Ok((load(conn, number)?, transition))
        }
        Err(err) => {
            tracing::debug!(number, error = %err, "rejected iteration completion");
            Err(err)
        }
    }
}

fn log_transition(number: u32, transition: Transition, message: &str) {
    match transition {
        Transition::Advance { from, to } => {
            tracing::info!(number, from = %from, to = %to, "{}", message)
        }
        Transition::Unchanged => tracing::debug!(number, "iteration status unchanged"),
    }
}

pub struct SqliteIterationStore {
    db: Arc<Database>,
    project: String,
}

impl SqliteIterationStore {
    pub fn new(db: Arc<Database>, project: impl Into<String>) -> Self {
        Self {
            db,
            project: project.into(),
        }
    }
}

impl IterationRepository for SqliteIterationStore {
    fn create(&self, iteration: NewIteration) -> Result<Iteration> {
        check_rank("iteration", iteration.rank)?;
        if iteration.number == Some(0) {
            return Err(Error::invalid("iteration number must be positive"));
        }

        let created = self.db.with_tx(|conn| {
            let number = match iteration.number {
                Some(number) => number,
                None => next_free_number(conn, &self.project)?,
            };
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "INSERT INTO iterations (number, name, goal, deliverable, status, rank, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    number,
                    iteration.name,
                    iteration.goal,
                    iteration.deliverable,
                    IterationStatus::Planned.as_str(),
                    iteration.rank,
                    now
                ],
            )
            .map_err(|e| classify_write(e, "iteration", &number.to_string()))?;
            load(conn, number)
        })?;

        tracing::info!(number = created.number, "created iteration");
        Ok(created)
    }

    fn get(&self, number: u32) -> Result<Iteration> {
        self.db.with_conn(|conn| load(conn, number))
    }

    fn list(&self) -> Result<Vec<Iteration>> {
        self.db.with_conn(list_iterations)
    }

    fn update(&self, iteration: &Iteration) -> Result<Iteration> {
        check_rank("iteration", iteration.rank)?;

        let updated = self.db.with_tx(|conn| {
            require_iteration(conn, iteration.number)?;
            conn.execute(
                "UPDATE iterations SET name = ?2, goal = ?3, deliverable = ?4, rank = ?5,
                        updated_at = ?6
                 WHERE number = ?1",
                params![
                    iteration.number,
                    iteration.name,
                    iteration.goal,
                    iteration.deliverable,
                    iteration.rank,
                    to_sql_time(&Utc::now())
                ],
            )?;
            load(conn, iteration.number)
        })?;

        tracing::info!(number = updated.number, "updated iteration");
        Ok(updated)
    }

    fn delete(&self, number: u32) -> Result<()> {
        self.db.with_tx(|conn| {
            let removed = conn.execute("DELETE FROM iterations WHERE number = ?1", [number])?;
            if removed == 0 {
                return Err(Error::not_found("iteration", number));
            }
            Ok(())
        })?;
        tracing::info!(number, "deleted iteration");
        Ok(())
    }

    fn start(&self, number: u32) -> Result<Iteration> {
        let (iteration, transition) = self.db.with_tx(|conn| start_in(conn, number))?;
        log_transition(number, transition, "started iteration");
        Ok(iteration)
    }

    fn complete(&self, number: u32) -> Result<Iteration> {
        let (iteration, transition) = self.db.with_tx(|conn| complete_in(conn, number))?;
        log_transition(number, transition, "completed iteration");
        Ok(iteration)
    }

    fn set_status(&self, number: u32, status: IterationStatus) -> Result<Iteration> {
        match status {
            IterationStatus::Current => self.start(number),
            IterationStatus::Complete => self.complete(number),
            IterationStatus::Planned => self.db.with_conn(|conn| {
                let iteration = load(conn, number)?;
                check_transition(number, iteration.status, IterationStatus::Planned)?;
                Ok(iteration)
            }),
        }
    }

    fn current(&self) -> Result<Option<Iteration>> {
        self.db.with_conn(load_current)
    }

    fn add_task(&self, number: u32, task_id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            require_iteration(conn, number)?;
            require_task(conn, task_id)?;
            let present: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM iteration_tasks WHERE iteration_number = ?1 AND task_id = ?2",
                    params![number, task_id],
                    |row| row.get(0),
                )
                .optional()?;
            if present.is_some() {
                return Err(Error::TaskAlreadyInIteration {
                    task_id: task_id.to_string(),
                    number,
                });
            }
            conn.execute(
                "INSERT INTO iteration_tasks (iteration_number, task_id) VALUES (?1, ?2)",
                params![number, task_id],
            )?;
            Ok(())
        })?;
        tracing::info!(number, task_id, "added task to iteration");
        Ok(())
    }

    fn remove_task(&self, number: u32, task_id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            require_iteration(conn, number)?;
            let removed = conn.execute(
                "DELETE FROM iteration_tasks WHERE iteration_number = ?1 AND task_id = ?2",
                params![number, task_id],
            )?;
            if removed == 0 {
                return Err(Error::TaskNotInIteration {
                    task_id: task_id.to_string(),
                    number,
                });
            }
            Ok(())
        })?;
        tracing::info!(number, task_id, "removed task from iteration");
        Ok(())
    }

    fn tasks(&self, number: u32) -> Result<Vec<Task>> {
        self.db.with_conn(|conn| {
            require_iteration(conn, number)?;
            let columns = tasks::COLUMNS
                .split(", ")
                .map(|c| format!("t.{}", c))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM iteration_tasks it JOIN tasks t ON t.id = it.task_id
                 WHERE it.iteration_number = ?1 ORDER BY it.seq",
                columns
            ))?;
            let rows = stmt
                .query_map([number], tasks::from_row)?
                .collect::<rusqlite::Result<_>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        RoadmapRepository, SqliteRoadmapStore, SqliteTaskStore, SqliteTrackStore, TaskRepository,
        TrackRepository,
    };
    use crate::error::{ErrorKind, TransitionReason};
    use crate::log_capture::capture_logs;
    use crate::models::{NewRoadmap, NewTask, NewTrack};

    fn store() -> SqliteIterationStore {
        SqliteIterationStore::new(Arc::new(Database::open_in_memory().unwrap()), "PRJ")
    }

    fn planned(store: &SqliteIterationStore, number: u32) -> Iteration {
        store
            .create(NewIteration::new(Some(number), format!("Iteration {}", number)))
            .unwrap()
    }

    #[test]
    fn test_created_planned_without_timestamps() {
        let store = store();
        let it = planned(&store, 1);
        assert_eq!(it.status, IterationStatus::Planned);
        assert!(it.started_at.is_none());
        assert!(it.completed_at.is_none());
    }

    #[test]
    fn test_duplicate_number_already_exists() {
        let store = store();
        planned(&store, 1);
        let err = store
            .create(NewIteration::new(Some(1), "again"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_auto_number_skips_taken_numbers() {
        let store = store();
        planned(&store, 1);
        planned(&store, 2);
        let it = store.create(NewIteration::new(None, "auto")).unwrap();
        assert_eq!(it.number, 3);
        let it = store.create(NewIteration::new(None, "auto")).unwrap();
        assert_eq!(it.number, 4);
    }

    #[test]
    fn test_single_current_scenario() {
        let store = store();
        planned(&store, 1);
        let started = store.start(1).unwrap();
        assert_eq!(started.status, IterationStatus::Current);
        assert!(started.started_at.is_some());

        planned(&store, 2);
        let err = store.start(2).unwrap_err();
        assert!(matches!(
            err,
            Error::IterationAlreadyCurrent {
                number: 2,
                current: 1
            }
        ));
        assert_eq!(store.get(1).unwrap().status, IterationStatus::Current);
        assert_eq!(store.get(2).unwrap().status, IterationStatus::Planned);

        let completed = store.complete(1).unwrap();
        assert_eq!(completed.status, IterationStatus::Complete);
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.started_at, started.started_at);

        store.start(2).unwrap();
        assert_eq!(store.current().unwrap().unwrap().number, 2);
    }

    #[test]
    fn test_no_current_is_none() {
        let store = store();
        planned(&store, 1);
        assert!(store.current().unwrap().is_none());
    }

    #[test]
    fn test_illegal_transitions() {
        let store = store();
        planned(&store, 1);

        let err = store.complete(1).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                reason: TransitionReason::SkipStage,
                ..
            }
        ));

        store.start(1).unwrap();
        let err = store.set_status(1, IterationStatus::Planned).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        store.complete(1).unwrap();
        for target in [IterationStatus::Planned, IterationStatus::Current] {
            let err = store.set_status(1, target).unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidTransition {
                    reason: TransitionReason::Terminal,
                    ..
                }
            ));
        }
        assert_eq!(store.get(1).unwrap().status, IterationStatus::Complete);
    }

    #[test]
    fn test_repeated_start_is_noop() {
        let store = store();
        planned(&store, 1);
        let first = store.start(1).unwrap();
        let second = store.start(1).unwrap();
        assert_eq!(first.started_at, second.started_at);
    }

    #[test]
    fn test_only_advancing_transitions_log_at_info() {
        let store = store();
        planned(&store, 1);

        let logs = capture_logs(|| {
            store.start(1).unwrap();
        });
        assert!(logs.contains("started iteration"), "{}", logs);

        let logs = capture_logs(|| {
            store.start(1).unwrap();
        });
        assert!(!logs.contains("started iteration"), "{}", logs);
        assert!(logs.contains("iteration status unchanged"), "{}", logs);

        store.complete(1).unwrap();
        let logs = capture_logs(|| {
            store.complete(1).unwrap();
        });
        assert!(!logs.contains("completed iteration"), "{}", logs);
    }

    #[test]
    fn test_update_is_logged() {
        let store = store();
        let mut it = planned(&store, 1);
        it.name = "Renamed".into();
        let logs = capture_logs(|| {
            store.update(&it).unwrap();
        });
        assert!(logs.contains("updated iteration"), "{}", logs);
    }

    #[test]
    fn test_update_never_touches_status() {
        let store = store();
        let mut it = planned(&store, 1);
        it.status = IterationStatus::Complete;
        it.goal = "Ship it".into();
        let updated = store.update(&it).unwrap();
        assert_eq!(updated.status, IterationStatus::Planned);
        assert_eq!(updated.goal, "Ship it");
    }

    #[test]
    fn test_task_membership_guards() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        SqliteRoadmapStore::new(db.clone())
            .create(NewRoadmap {
                id: "main".into(),
                title: "Main".into(),
                vision: String::new(),
            })
            .unwrap();
        let track = SqliteTrackStore::new(db.clone(), "PRJ")
            .create(NewTrack::new("main", "A"))
            .unwrap();
        let task = SqliteTaskStore::new(db.clone(), "PRJ")
            .create(NewTask::new(&track.id, "Do it"))
            .unwrap();
        let store = SqliteIterationStore::new(db, "PRJ");
        planned(&store, 1);

        store.add_task(1, &task.id).unwrap();
        let err = store.add_task(1, &task.id).unwrap_err();
        assert!(matches!(err, Error::TaskAlreadyInIteration { .. }));

        assert_eq!(store.get(1).unwrap().task_ids, vec![task.id.clone()]);
        assert_eq!(store.tasks(1).unwrap()[0].title, "Do it");

        store.remove_task(1, &task.id).unwrap();
        let err = store.remove_task(1, &task.id).unwrap_err();
        assert!(matches!(err, Error::TaskNotInIteration { .. }));

        let err = store.add_task(1, "PRJ-task-77").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = store.add_task(9, &task.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
