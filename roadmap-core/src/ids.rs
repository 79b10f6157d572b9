//! Human-readable entity IDs
//!
//! IDs have the form `<PROJECT-CODE>-<entity-type>-<seq>`, e.g. `PRJ-track-4`.
//! The sequence part comes from the durable per-project counter in
//! [`crate::db::sequence`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Project code used when none is configured
pub const DEFAULT_PROJECT_CODE: &str = "PRJ";

/// Entity types that draw IDs from a sequence counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Task,
    Track,
    #[serde(rename = "iter")]
    Iteration,
    Adr,
    Ac,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Task,
        EntityType::Track,
        EntityType::Iteration,
        EntityType::Adr,
        EntityType::Ac,
    ];

    /// The segment used inside IDs and as the counter key
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Task => "task",
            EntityType::Track => "track",
            EntityType::Iteration => "iter",
            EntityType::Adr => "adr",
            EntityType::Ac => "ac",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "task" => Ok(EntityType::Task),
            "track" => Ok(EntityType::Track),
            "iter" | "iteration" => Ok(EntityType::Iteration),
            "adr" => Ok(EntityType::Adr),
            "ac" => Ok(EntityType::Ac),
            other => Err(Error::invalid(format!("unknown entity type '{}'", other))),
        }
    }
}

/// Parsed form of a sequence-issued ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityId {
    pub project_code: String,
    pub entity_type: EntityType,
    pub seq: u64,
}

impl EntityId {
    pub fn new(project_code: &str, entity_type: EntityType, seq: u64) -> Self {
        Self {
            project_code: project_code.to_string(),
            entity_type,
            seq,
        }
    }

    /// Parses `id` and checks it names an entity of type `expected`.
    ///
    /// The code must be a normalized project code and the sequence part a
    /// canonical positive decimal, so `PRJ-track-01` is malformed rather
    /// than a miss on `PRJ-track-1`.
    pub fn parse(id: &str, expected: EntityType) -> Result<Self> {
        let malformed = || Error::MalformedId {
            expected: expected.as_str(),
            id: id.to_string(),
        };

        let mut parts = id.rsplitn(3, '-');
        let seq = parts.next().ok_or_else(malformed)?;
        let type_part = parts.next().ok_or_else(malformed)?;
        let code = parts.next().ok_or_else(malformed)?;

        if !is_project_code(code) || type_part != expected.as_str() {
            return Err(malformed());
        }
        // Canonical decimal only: no sign, no leading zero
        if seq.is_empty() || seq.starts_with('0') || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let seq: u64 = seq.parse().map_err(|_| malformed())?;

        Ok(Self {
            project_code: code.to_string(),
            entity_type: expected,
            seq,
        })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.project_code, self.entity_type, self.seq)
    }
}

fn is_project_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Normalizes a configured project code, falling back to [`DEFAULT_PROJECT_CODE`]
pub fn normalize_project_code(code: Option<&str>) -> Result<String> {
    let code = match code.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_uppercase(),
        _ => return Ok(DEFAULT_PROJECT_CODE.to_string()),
    };

    if !is_project_code(&code) {
        return Err(Error::invalid(format!(
            "project code '{}' may only contain letters, digits and underscores",
            code
        )));
    }
    Ok(code)
}

/// Checks an ID argument without keeping the parsed parts
pub(crate) fn check_id(id: &str, expected: EntityType) -> Result<()> {
    EntityId::parse(id, expected).map(|_| ())
}
