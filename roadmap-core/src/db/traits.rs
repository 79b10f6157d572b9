//! Repository traits
//!
//! One narrow trait per entity type, plus the sequence counter and the
//! cross-cutting aggregate queries. Each is implemented by a single
//! SQLite-backed store; all stores share the facade's connection.

use crate::error::Result;
use crate::ids::EntityType;
use crate::models::{
    AcceptanceCriteria, Adr, Document, DocumentAttachment, Iteration, IterationStatus,
    NewAcceptanceCriteria, NewAdr, NewDocument, NewIteration, NewRoadmap, NewTask, NewTrack,
    Progress, ProjectSnapshot, ProjectStats, Roadmap, Task, TaskFilter, Track, TrackFilter,
};

pub trait RoadmapRepository: Send + Sync {
    /// Creates a roadmap; a duplicate ID is `AlreadyExists`
    fn create(&self, roadmap: NewRoadmap) -> Result<Roadmap>;

    fn get(&self, id: &str) -> Result<Roadmap>;

    fn list(&self) -> Result<Vec<Roadmap>>;

    fn update(&self, roadmap: &Roadmap) -> Result<Roadmap>;

    /// Fails with `InvalidArgument` while tracks still reference the roadmap
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait TrackRepository: Send + Sync {
    // =========================================================================
    // CRUD
    // =========================================================================

    /// Creates a track under an existing roadmap and assigns its ID
    fn create(&self, track: NewTrack) -> Result<Track>;

    /// Gets a track, including its dependency edges
    fn get(&self, id: &str) -> Result<Track>;

    /// Lists tracks ordered by rank, then ID
    fn list(&self, filter: &TrackFilter) -> Result<Vec<Track>>;

    /// Updates title, description, status, rank and roadmap. Dependency
    /// edges are only changed through `add_dependency`/`remove_dependency`.
    fn update(&self, track: &Track) -> Result<Track>;

    fn delete(&self, id: &str) -> Result<()>;

    // =========================================================================
    // Dependency graph
    // =========================================================================

    /// Adds the edge `track_id -> depends_on_id` unless it would close a cycle
    fn add_dependency(&self, track_id: &str, depends_on_id: &str) -> Result<()>;

    /// Removes an edge; an absent edge is `NotFound`
    fn remove_dependency(&self, track_id: &str, depends_on_id: &str) -> Result<()>;

    /// Outgoing edges in insertion order
    fn dependencies(&self, track_id: &str) -> Result<Vec<String>>;

    /// Tracks that depend on `track_id`
    fn dependents(&self, track_id: &str) -> Result<Vec<String>>;

    /// Re-validates the stored graph reachable from `track_id`
    fn validate_no_cycles(&self, track_id: &str) -> Result<()>;
}

pub trait TaskRepository: Send + Sync {
    /// Creates a task under an existing track and assigns its ID
    fn create(&self, task: NewTask) -> Result<Task>;

    fn get(&self, id: &str) -> Result<Task>;

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Updates a task; moving it to another track re-checks that track
    fn update(&self, task: &Task) -> Result<Task>;

    fn delete(&self, id: &str) -> Result<()>;
}

pub trait IterationRepository: Send + Sync {
    // =========================================================================
    // CRUD
    // =========================================================================

    /// Creates a planned iteration. Without an explicit number one is drawn
    /// from the iteration sequence.
    fn create(&self, iteration: NewIteration) -> Result<Iteration>;

    fn get(&self, number: u32) -> Result<Iteration>;

    /// Lists iterations ordered by rank, then number
    fn list(&self) -> Result<Vec<Iteration>>;

    /// Updates name, goal, deliverable and rank. Status is never written here.
    fn update(&self, iteration: &Iteration) -> Result<Iteration>;

    fn delete(&self, number: u32) -> Result<()>;

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// planned -> current, provided no other iteration is current
    fn start(&self, number: u32) -> Result<Iteration>;

    /// current -> complete
    fn complete(&self, number: u32) -> Result<Iteration>;

    /// Moves to `status` through the state machine
    fn set_status(&self, number: u32, status: IterationStatus) -> Result<Iteration>;

    /// The current iteration, `None` when there is none
    fn current(&self) -> Result<Option<Iteration>>;

    // =========================================================================
    // Task membership
    // =========================================================================

    fn add_task(&self, number: u32, task_id: &str) -> Result<()>;

    fn remove_task(&self, number: u32, task_id: &str) -> Result<()>;

    fn tasks(&self, number: u32) -> Result<Vec<Task>>;
}

pub trait AcceptanceCriteriaRepository: Send + Sync {
    /// Creates an AC under an existing task and assigns its ID
    fn create(&self, ac: NewAcceptanceCriteria) -> Result<AcceptanceCriteria>;

    fn get(&self, id: &str) -> Result<AcceptanceCriteria>;

    fn list_for_task(&self, task_id: &str) -> Result<Vec<AcceptanceCriteria>>;

    fn update(&self, ac: &AcceptanceCriteria) -> Result<AcceptanceCriteria>;

    fn delete(&self, id: &str) -> Result<()>;
}

pub trait AdrRepository: Send + Sync {
    /// Creates an ADR under an existing track and assigns its ID
    fn create(&self, adr: NewAdr) -> Result<Adr>;

    fn get(&self, id: &str) -> Result<Adr>;

    /// Lists ADRs, optionally only those of one track
    fn list(&self, track_id: Option<&str>) -> Result<Vec<Adr>>;

    fn update(&self, adr: &Adr) -> Result<Adr>;

    /// Marks `id` superseded by `by`; both must exist
    fn supersede(&self, id: &str, by: &str) -> Result<Adr>;

    fn delete(&self, id: &str) -> Result<()>;
}

pub trait DocumentRepository: Send + Sync {
    /// Creates a document; track and iteration are mutually exclusive
    fn create(&self, document: NewDocument) -> Result<Document>;

    fn get(&self, id: i64) -> Result<Document>;

    /// Lists documents, optionally only those with the given attachment
    fn list(&self, attachment: Option<&DocumentAttachment>) -> Result<Vec<Document>>;

    fn update(&self, document: &Document) -> Result<Document>;

    /// Replaces the document's attachment
    fn attach(&self, id: i64, attachment: DocumentAttachment) -> Result<Document>;

    /// Clears both track and iteration
    fn detach(&self, id: i64) -> Result<Document>;

    fn delete(&self, id: i64) -> Result<()>;
}

pub trait SequenceRepository: Send + Sync {
    /// Atomically increments and returns the counter for the pair
    fn next_sequence_number(&self, project: &str, entity_type: EntityType) -> Result<u64>;

    /// Last issued value, 0 when nothing was issued yet
    fn peek_sequence_number(&self, project: &str, entity_type: EntityType) -> Result<u64>;
}

/// Cross-cutting read queries
pub trait AggregateRepository: Send + Sync {
    fn stats(&self) -> Result<ProjectStats>;

    fn track_progress(&self, track_id: &str) -> Result<Progress>;

    fn iteration_progress(&self, number: u32) -> Result<Progress>;

    /// Every entity in the project
    fn snapshot(&self) -> Result<ProjectSnapshot>;
}
