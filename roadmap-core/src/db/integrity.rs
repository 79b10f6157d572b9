//! Referential checks run inside a write transaction before the write
//!
//! Each check names the missing parent in its `NotFound` error so the caller
//! can tell which side of a relationship is absent.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::ids::{check_id, EntityType};
use crate::models::{AdrStatus, DocumentAttachment};

fn exists(conn: &Connection, sql: &str, key: &dyn rusqlite::ToSql) -> Result<bool> {
    let found: Option<i64> = conn.query_row(sql, params![key], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

pub(crate) fn require_roadmap(conn: &Connection, roadmap_id: &str) -> Result<()> {
    if !exists(conn, "SELECT 1 FROM roadmaps WHERE id = ?1", &roadmap_id)? {
        return Err(Error::not_found("roadmap", roadmap_id));
    }
    Ok(())
}

pub(crate) fn require_track(conn: &Connection, track_id: &str) -> Result<()> {
    check_id(track_id, EntityType::Track)?;
    if !exists(conn, "SELECT 1 FROM tracks WHERE id = ?1", &track_id)? {
        return Err(Error::not_found("track", track_id));
    }
    Ok(())
}

pub(crate) fn require_task(conn: &Connection, task_id: &str) -> Result<()> {
    check_id(task_id, EntityType::Task)?;
    if !exists(conn, "SELECT 1 FROM tasks WHERE id = ?1", &task_id)? {
        return Err(Error::not_found("task", task_id));
    }
    Ok(())
}

pub(crate) fn require_iteration(conn: &Connection, number: u32) -> Result<()> {
    if !exists(conn, "SELECT 1 FROM iterations WHERE number = ?1", &number)? {
        return Err(Error::not_found("iteration", number));
    }
    Ok(())
}

pub(crate) fn require_adr(conn: &Connection, adr_id: &str) -> Result<()> {
    check_id(adr_id, EntityType::Adr)?;
    if !exists(conn, "SELECT 1 FROM adrs WHERE id = ?1", &adr_id)? {
        return Err(Error::not_found("ADR", adr_id));
    }
    Ok(())
}

/// Checks the supersede link of ADR `adr_id` (None while creating).
///
/// `superseded_by` is only legal together with status `superseded`, must not
/// point back at the ADR itself, and must name an existing ADR.
pub(crate) fn check_adr_supersede(
    conn: &Connection,
    adr_id: Option<&str>,
    status: AdrStatus,
    superseded_by: Option<&str>,
) -> Result<()> {
    let Some(successor) = superseded_by else {
        return Ok(());
    };
    if status != AdrStatus::Superseded {
        return Err(Error::invalid(format!(
            "superseded_by {} requires status superseded, got {}",
            successor, status
        )));
    }
    if adr_id == Some(successor) {
        return Err(Error::invalid(format!("ADR {} cannot supersede itself", successor)));
    }
    require_adr(conn, successor)
}

/// Validates a document's attachment target: XOR plus existence
pub(crate) fn check_document_attachment(
    conn: &Connection,
    track_id: Option<&str>,
    iteration_number: Option<u32>,
) -> Result<DocumentAttachment> {
    let attachment =
        DocumentAttachment::from_parts(track_id.map(str::to_string), iteration_number)?;
    match &attachment {
        DocumentAttachment::Track(track) => require_track(conn, track)?,
        DocumentAttachment::Iteration(number) => require_iteration(conn, *number)?,
        DocumentAttachment::Unattached => {}
    }
    Ok(attachment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::ErrorKind;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|conn| {
            conn.execute_batch(
                "INSERT INTO roadmaps (id, title, created_at, updated_at) VALUES ('main', 'Main', '', '');
                 INSERT INTO tracks (id, roadmap_id, title, status, rank, created_at, updated_at)
                     VALUES ('PRJ-track-1', 'main', 'Core', 'not-started', 1, '', '');
                 INSERT INTO adrs (id, track_id, title, status, created_at, updated_at)
                     VALUES ('PRJ-adr-1', 'PRJ-track-1', 'Use SQLite', 'accepted', '', '');",
            )?;
            Ok(())
        })
        .unwrap();
        db
    }

    #[test]
    fn test_existence_checks_name_missing_parent() {
        let db = seeded();
        db.with_conn(|conn| {
            require_track(conn, "PRJ-track-1")?;
            let err = require_track(conn, "PRJ-track-2").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert!(err.to_string().contains("PRJ-track-2"));

            let err = require_task(conn, "PRJ-task-1").unwrap_err();
            assert_eq!(err.to_string(), "task not found: PRJ-task-1");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_malformed_id_is_invalid_argument() {
        let db = seeded();
        db.with_conn(|conn| {
            for bad in ["nonsense", "PRJ-track-01", "PRJ-track-+1", "--track-1"] {
                let err = require_track(conn, bad).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", bad);
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_supersede_rules() {
        let db = seeded();
        db.with_conn(|conn| {
            check_adr_supersede(conn, None, AdrStatus::Superseded, Some("PRJ-adr-1"))?;
            check_adr_supersede(conn, None, AdrStatus::Accepted, None)?;

            let err = check_adr_supersede(conn, None, AdrStatus::Accepted, Some("PRJ-adr-1"))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);

            let err =
                check_adr_supersede(conn, Some("PRJ-adr-1"), AdrStatus::Superseded, Some("PRJ-adr-1"))
                    .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);

            let err = check_adr_supersede(conn, None, AdrStatus::Superseded, Some("PRJ-adr-9"))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_document_attachment_checks() {
        let db = seeded();
        db.with_conn(|conn| {
            let err = check_document_attachment(conn, Some("PRJ-track-1"), Some(1)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);

            assert_eq!(
                check_document_attachment(conn, Some("PRJ-track-1"), None)?,
                DocumentAttachment::Track("PRJ-track-1".into())
            );
            assert_eq!(
                check_document_attachment(conn, None, None)?,
                DocumentAttachment::Unattached
            );

            let err = check_document_attachment(conn, None, Some(4)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            Ok(())
        })
        .unwrap();
    }
}
