//! Consistency facade
//!
//! `Repository` owns the project's single connection (and, for file-backed
//! projects, the single-writer lock) and hands out one narrow repository per
//! entity type. Every store goes through the same validators, so callers
//! cannot reach the tables without them.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::db::{
    AcceptanceCriteriaRepository, AdrRepository, AggregateRepository, Database,
    DocumentRepository, IterationRepository, RoadmapRepository, SequenceRepository,
    SqliteAcceptanceCriteriaStore, SqliteAdrStore, SqliteAggregateStore, SqliteDocumentStore,
    SqliteIterationStore, SqliteRoadmapStore, SqliteSequenceStore, SqliteTaskStore,
    SqliteTrackStore, TaskRepository, TrackRepository,
};
use crate::error::{Error, Result};
use crate::ids::{normalize_project_code, EntityType};
use crate::lock::ProjectLock;

pub struct Repository {
    project_code: String,
    db: Arc<Database>,
    lock: Mutex<Option<ProjectLock>>,
    roadmaps: SqliteRoadmapStore,
    tracks: SqliteTrackStore,
    tasks: SqliteTaskStore,
    iterations: SqliteIterationStore,
    acceptance_criteria: SqliteAcceptanceCriteriaStore,
    adrs: SqliteAdrStore,
    documents: SqliteDocumentStore,
    sequences: SqliteSequenceStore,
    aggregate: SqliteAggregateStore,
}

impl Repository {
    /// Opens the project described by `config`, taking the project lock
    pub fn open(config: &Config) -> Result<Self> {
        let project_code = config.project_code()?;
        let path = config.database_path()?;
        Self::open_at(&path, &project_code, config.lock_timeout())
    }

    /// Opens a database file directly
    pub fn open_at(path: &Path, project_code: &str, lock_timeout: Duration) -> Result<Self> {
        let project_code = normalize_project_code(Some(project_code))?;
        let lock = ProjectLock::acquire(path, lock_timeout)?;
        let db = Database::open(path)?;

        tracing::info!(
            project = %project_code,
            database = %path.display(),
            "opened project"
        );
        Ok(Self::assemble(project_code, db, Some(lock)))
    }

    /// In-memory project, without a lock
    pub fn open_in_memory(project_code: &str) -> Result<Self> {
        let project_code = normalize_project_code(Some(project_code))?;
        let db = Database::open_in_memory()?;
        Ok(Self::assemble(project_code, db, None))
    }

    fn assemble(project_code: String, db: Database, lock: Option<ProjectLock>) -> Self {
        let db = Arc::new(db);
        let code = project_code.as_str();
        Self {
            roadmaps: SqliteRoadmapStore::new(db.clone()),
            tracks: SqliteTrackStore::new(db.clone(), code),
            tasks: SqliteTaskStore::new(db.clone(), code),
            iterations: SqliteIterationStore::new(db.clone(), code),
            acceptance_criteria: SqliteAcceptanceCriteriaStore::new(db.clone(), code),
            adrs: SqliteAdrStore::new(db.clone(), code),
            documents: SqliteDocumentStore::new(db.clone()),
            sequences: SqliteSequenceStore::new(db.clone()),
            aggregate: SqliteAggregateStore::new(db.clone(), code),
            lock: Mutex::new(lock),
            project_code,
            db,
        }
    }

    pub fn project_code(&self) -> &str {
        &self.project_code
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn roadmaps(&self) -> &dyn RoadmapRepository {
        &self.roadmaps
    }

    pub fn tracks(&self) -> &dyn TrackRepository {
        &self.tracks
    }

    pub fn tasks(&self) -> &dyn TaskRepository {
        &self.tasks
    }

    pub fn iterations(&self) -> &dyn IterationRepository {
        &self.iterations
    }

    pub fn acceptance_criteria(&self) -> &dyn AcceptanceCriteriaRepository {
        &self.acceptance_criteria
    }

    pub fn adrs(&self) -> &dyn AdrRepository {
        &self.adrs
    }

    pub fn documents(&self) -> &dyn DocumentRepository {
        &self.documents
    }

    pub fn sequences(&self) -> &dyn SequenceRepository {
        &self.sequences
    }

    pub fn aggregate(&self) -> &dyn AggregateRepository {
        &self.aggregate
    }

    /// Draws the next number for this project's counter of `entity_type`
    pub fn next_sequence_number(&self, entity_type: EntityType) -> Result<u64> {
        self.sequences
            .next_sequence_number(&self.project_code, entity_type)
    }

    /// Closes the connection and releases the lock. Safe to call repeatedly.
    pub fn close(&self) -> Result<()> {
        self.db.close()?;
        let mut lock = self
            .lock
            .lock()
            .map_err(|_| Error::Lock("project lock mutex poisoned".to_string()))?;
        if let Some(mut held) = lock.take() {
            held.release()?;
            tracing::info!(project = %self.project_code, "closed project");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.db.is_closed()
    }
}
