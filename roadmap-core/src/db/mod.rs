//! Storage layer for roadmap planning entities
//!
//! `Database` owns the single SQLite connection. Each entity type has a
//! narrow repository trait (see `traits`) implemented by one SQLite store;
//! the stores run their referential checks, sequence draws and validator
//! reads in the same transaction as the write they guard.

mod acs;
mod adrs;
mod aggregate;
mod connection;
mod documents;
mod integrity;
mod iterations;
mod roadmaps;
mod rows;
pub(crate) mod sequence;
mod tasks;
mod tracks;
mod traits;

pub use acs::SqliteAcceptanceCriteriaStore;
pub use adrs::SqliteAdrStore;
pub use aggregate::SqliteAggregateStore;
pub use connection::Database;
pub use documents::SqliteDocumentStore;
pub use iterations::SqliteIterationStore;
pub use roadmaps::SqliteRoadmapStore;
pub use sequence::SqliteSequenceStore;
pub use tasks::SqliteTaskStore;
pub use tracks::SqliteTrackStore;
pub use traits::{
    AcceptanceCriteriaRepository, AdrRepository, AggregateRepository, DocumentRepository,
    IterationRepository, RoadmapRepository, SequenceRepository, TaskRepository, TrackRepository,
};
