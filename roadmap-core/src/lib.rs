pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod graph;
pub mod ids;
pub mod lifecycle;
pub mod lock;
#[cfg(test)]
mod log_capture;
pub mod models;
pub mod repository;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    AcceptanceCriteriaRepository, AdrRepository, AggregateRepository, DocumentRepository,
    IterationRepository, RoadmapRepository, SequenceRepository, TaskRepository, TrackRepository,
};
pub use error::{Error, ErrorKind, Result, TransitionReason};
pub use export::{render_snapshot, write_snapshot, ExportFormat};
pub use ids::{EntityId, EntityType, DEFAULT_PROJECT_CODE};
pub use lifecycle::Transition;
pub use models::{
    AcStatus,
    AcceptanceCriteria,
    Adr,
    AdrStatus,
    Document,
    DocumentAttachment,
    DocumentType,
    Iteration,
    IterationStatus,
    NewAcceptanceCriteria,
    NewAdr,
    NewDocument,
    NewIteration,
    NewRoadmap,
    NewTask,
    NewTrack,
    Progress,
    ProjectSnapshot,
    ProjectStats,
    Roadmap,
    Task,
    TaskFilter,
    TaskStatus,
    Track,
    TrackFilter,
    TrackStatus,
    // Rank bounds
    MAX_RANK,
    MIN_RANK,
};
pub use repository::Repository;
