use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lowest and highest rank a track may hold
pub const MIN_RANK: u32 = 1;
pub const MAX_RANK: u32 = 1000;

/// Represents the status of a track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TrackStatus {
    NotStarted,
    InProgress,
    Complete,
    Blocked,
    Waiting,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::NotStarted => "not-started",
            TrackStatus::InProgress => "in-progress",
            TrackStatus::Complete => "complete",
            TrackStatus::Blocked => "blocked",
            TrackStatus::Waiting => "waiting",
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "not-started" => Ok(TrackStatus::NotStarted),
            "in-progress" => Ok(TrackStatus::InProgress),
            "complete" => Ok(TrackStatus::Complete),
            "blocked" => Ok(TrackStatus::Blocked),
            "waiting" => Ok(TrackStatus::Waiting),
            other => Err(Error::invalid(format!("unknown track status '{}'", other))),
        }
    }
}

/// Represents the status of a task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(Error::invalid(format!("unknown task status '{}'", other))),
        }
    }
}

/// Iteration lifecycle status. The derived ordering follows the lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum IterationStatus {
    Planned,
    Current,
    Complete,
}

impl IterationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IterationStatus::Planned => "planned",
            IterationStatus::Current => "current",
            IterationStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IterationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "planned" => Ok(IterationStatus::Planned),
            "current" => Ok(IterationStatus::Current),
            "complete" => Ok(IterationStatus::Complete),
            other => Err(Error::invalid(format!(
                "unknown iteration status '{}'",
                other
            ))),
        }
    }
}

/// Verification state of an acceptance criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AcStatus {
    Pending,
    Verified,
    Failed,
}

impl AcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcStatus::Pending => "pending",
            AcStatus::Verified => "verified",
            AcStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AcStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(AcStatus::Pending),
            "verified" => Ok(AcStatus::Verified),
            "failed" => Ok(AcStatus::Failed),
            other => Err(Error::invalid(format!("unknown AC status '{}'", other))),
        }
    }
}

/// Status of an architecture decision record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AdrStatus {
    Proposed,
    Accepted,
    Deprecated,
    Superseded,
}

impl AdrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdrStatus::Proposed => "proposed",
            AdrStatus::Accepted => "accepted",
            AdrStatus::Deprecated => "deprecated",
            AdrStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for AdrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AdrStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "proposed" => Ok(AdrStatus::Proposed),
            "accepted" => Ok(AdrStatus::Accepted),
            "deprecated" => Ok(AdrStatus::Deprecated),
            "superseded" => Ok(AdrStatus::Superseded),
            other => Err(Error::invalid(format!("unknown ADR status '{}'", other))),
        }
    }
}

/// Kind of a planning document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    Plan,
    Retrospective,
    Reference,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Plan => "plan",
            DocumentType::Retrospective => "retrospective",
            DocumentType::Reference => "reference",
            DocumentType::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plan" => Ok(DocumentType::Plan),
            "retrospective" => Ok(DocumentType::Retrospective),
            "reference" => Ok(DocumentType::Reference),
            "other" => Ok(DocumentType::Other),
            other => Err(Error::invalid(format!("unknown document type '{}'", other))),
        }
    }
}

/// Top-level planning container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Roadmap {
    /// Caller-chosen slug (e.g., "platform")
    pub id: String,
    pub title: String,
    pub vision: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRoadmap {
    pub id: String,
    pub title: String,
    pub vision: String,
}

/// A grouping of related tasks that participates in the dependency DAG
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    /// Sequence-issued ID (e.g., "PRJ-track-3")
    pub id: String,
    pub roadmap_id: String,
    pub title: String,
    pub description: String,
    pub status: TrackStatus,
    /// Sort key, 1 (highest) to 1000
    pub rank: u32,
    /// Tracks this track depends on, in the order the edges were added
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTrack {
    pub roadmap_id: String,
    pub title: String,
    pub description: String,
    pub status: TrackStatus,
    pub rank: u32,
}

impl NewTrack {
    pub fn new(roadmap_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            roadmap_id: roadmap_id.into(),
            title: title.into(),
            description: String::new(),
            status: TrackStatus::NotStarted,
            rank: 500,
        }
    }
}

/// Filter for listing tracks
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    pub roadmap_id: Option<String>,
    pub status: Option<TrackStatus>,
}

/// A unit of work owned by a track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub track_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub rank: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub track_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub rank: u32,
}

impl NewTask {
    pub fn new(track_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            rank: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub track_id: Option<String>,
    pub status: Option<TaskStatus>,
}

/// A time-boxed grouping of tasks with an ordered lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Iteration {
    /// User-assigned, unique, positive
    pub number: u32,
    pub name: String,
    pub goal: String,
    pub deliverable: String,
    pub status: IterationStatus,
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIteration {
    /// Drawn from the iteration sequence when `None`
    pub number: Option<u32>,
    pub name: String,
    pub goal: String,
    pub deliverable: String,
    pub rank: u32,
}

impl NewIteration {
    pub fn new(number: Option<u32>, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            goal: String::new(),
            deliverable: String::new(),
            rank: 500,
        }
    }
}

/// A verification requirement attached to a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcceptanceCriteria {
    pub id: String,
    pub task_id: String,
    pub description: String,
    pub status: AcStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAcceptanceCriteria {
    pub task_id: String,
    pub description: String,
}

/// An architecture decision record attached to a track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Adr {
    pub id: String,
    pub track_id: String,
    pub title: String,
    pub status: AdrStatus,
    pub context: String,
    pub decision: String,
    pub consequences: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdr {
    pub track_id: String,
    pub title: String,
    pub status: AdrStatus,
    pub context: String,
    pub decision: String,
    pub consequences: String,
    pub superseded_by: Option<String>,
}

impl NewAdr {
    pub fn new(track_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            title: title.into(),
            status: AdrStatus::Proposed,
            context: String::new(),
            decision: String::new(),
            consequences: String::new(),
            superseded_by: None,
        }
    }
}

/// A planning document, attached to at most one of {track, iteration}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Store-assigned key
    pub id: i64,
    pub title: String,
    pub doc_type: DocumentType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_number: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn attachment(&self) -> Result<DocumentAttachment> {
        DocumentAttachment::from_parts(self.track_id.clone(), self.iteration_number)
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub doc_type: DocumentType,
    pub content: String,
    pub track_id: Option<String>,
    pub iteration_number: Option<u32>,
}

/// Where a document hangs. Only one target can be expressed at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentAttachment {
    Unattached,
    Track(String),
    Iteration(u32),
}

impl DocumentAttachment {
    /// Builds an attachment from the two nullable columns, rejecting both-set
    pub fn from_parts(track_id: Option<String>, iteration_number: Option<u32>) -> Result<Self> {
        match (track_id, iteration_number) {
            (Some(track), Some(number)) => Err(Error::invalid(format!(
                "document cannot be attached to both track {} and iteration {}",
                track, number
            ))),
            (Some(track), None) => Ok(DocumentAttachment::Track(track)),
            (None, Some(number)) => Ok(DocumentAttachment::Iteration(number)),
            (None, None) => Ok(DocumentAttachment::Unattached),
        }
    }

    pub fn track_id(&self) -> Option<&str> {
        match self {
            DocumentAttachment::Track(id) => Some(id),
            _ => None,
        }
    }

    pub fn iteration_number(&self) -> Option<u32> {
        match self {
            DocumentAttachment::Iteration(n) => Some(*n),
            _ => None,
        }
    }
}

/// Task counts for a track or iteration, by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl Progress {
    pub fn total(&self) -> usize {
        self.todo + self.in_progress + self.done
    }

    pub(crate) fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Todo => self.todo += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Done => self.done += 1,
        }
    }
}

/// Statistics about a project database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub roadmaps: usize,
    pub tracks: usize,
    pub dependencies: usize,
    pub tasks: usize,
    pub iterations: usize,
    pub acceptance_criteria: usize,
    pub adrs: usize,
    pub documents: usize,
}

/// Every entity in a project, as written by the exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_code: String,
    pub exported_at: DateTime<Utc>,
    pub roadmaps: Vec<Roadmap>,
    pub tracks: Vec<Track>,
    pub tasks: Vec<Task>,
    pub iterations: Vec<Iteration>,
    pub acceptance_criteria: Vec<AcceptanceCriteria>,
    pub adrs: Vec<Adr>,
    pub documents: Vec<Document>,
}

/// Rejects ranks outside 1..=1000
pub(crate) fn check_rank(entity: &str, rank: u32) -> Result<()> {
    if !(MIN_RANK..=MAX_RANK).contains(&rank) {
        return Err(Error::invalid(format!(
            "{} rank {} is outside {}..={}",
            entity, rank, MIN_RANK, MAX_RANK
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip_through_display() {
        for status in [
            TrackStatus::NotStarted,
            TrackStatus::InProgress,
            TrackStatus::Complete,
            TrackStatus::Blocked,
            TrackStatus::Waiting,
        ] {
            assert_eq!(status.to_string().parse::<TrackStatus>().unwrap(), status);
        }
        assert!("finished".parse::<TrackStatus>().is_err());
    }

    #[test]
    fn test_iteration_status_is_ordered() {
        assert!(IterationStatus::Planned < IterationStatus::Current);
        assert!(IterationStatus::Current < IterationStatus::Complete);
    }

    #[test]
    fn test_document_attachment_xor() {
        assert!(DocumentAttachment::from_parts(Some("PRJ-track-1".into()), Some(2)).is_err());
        assert_eq!(
            DocumentAttachment::from_parts(None, Some(2)).unwrap(),
            DocumentAttachment::Iteration(2)
        );
        assert_eq!(
            DocumentAttachment::from_parts(None, None).unwrap(),
            DocumentAttachment::Unattached
        );
    }

    #[test]
    fn test_check_rank_bounds() {
        assert!(check_rank("track", 1).is_ok());
        assert!(check_rank("track", 1000).is_ok());
        assert!(check_rank("track", 0).is_err());
        assert!(check_rank("track", 1001).is_err());
    }
}
