//! Document store
//!
//! A document hangs off a track, an iteration, or nothing. The table's CHECK
//! constraint backs up the XOR rule enforced here.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::Database;
use super::integrity::check_document_attachment;
use super::rows::{parse_col, time_col, to_sql_time};
use super::traits::DocumentRepository;
use crate::error::{classify_write, Error, Result};
use crate::models::{Document, DocumentAttachment, NewDocument};

const COLUMNS: &str =
    "id, title, doc_type, content, track_id, iteration_number, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        doc_type: parse_col(row, 2)?,
        content: row.get(3)?,
        track_id: row.get(4)?,
        iteration_number: row.get(5)?,
        created_at: time_col(row, 6)?,
        updated_at: time_col(row, 7)?,
    })
}

fn load(conn: &Connection, id: i64) -> Result<Document> {
    conn.query_row(
        &format!("SELECT {} FROM documents WHERE id = ?1", COLUMNS),
        [id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("document", id))
}

pub(crate) fn list_documents(
    conn: &Connection,
    attachment: Option<&DocumentAttachment>,
) -> Result<Vec<Document>> {
    let base = format!("SELECT {} FROM documents", COLUMNS);
    let mut stmt;
    let rows = match attachment {
        None => {
            stmt = conn.prepare(&format!("{} ORDER BY id", base))?;
            stmt.query_map([], from_row)?
        }
        Some(DocumentAttachment::Track(track_id)) => {
            stmt = conn.prepare(&format!("{} WHERE track_id = ?1 ORDER BY id", base))?;
            stmt.query_map([track_id], from_row)?
        }
        Some(DocumentAttachment::Iteration(number)) => {
            stmt = conn.prepare(&format!("{} WHERE iteration_number = ?1 ORDER BY id", base))?;
            stmt.query_map([number], from_row)?
        }
        Some(DocumentAttachment::Unattached) => {
            stmt = conn.prepare(&format!(
                "{} WHERE track_id IS NULL AND iteration_number IS NULL ORDER BY id",
                base
            ))?;
            stmt.query_map([], from_row)?
        }
    };
    let documents = rows.collect::<rusqlite::Result<_>>()?;
    Ok(documents)
}

fn write_attachment(conn: &Connection, id: i64, attachment: &DocumentAttachment) -> Result<()> {
    conn.execute(
        "UPDATE documents SET track_id = ?2, iteration_number = ?3, updated_at = ?4 WHERE id = ?1",
        params![
            id,
            attachment.track_id(),
            attachment.iteration_number(),
            to_sql_time(&Utc::now())
        ],
    )
    .map_err(|e| classify_write(e, "document", &id.to_string()))?;
    Ok(())
}

pub struct SqliteDocumentStore {
    db: Arc<Database>,
}

impl SqliteDocumentStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl DocumentRepository for SqliteDocumentStore {
    fn create(&self, document: NewDocument) -> Result<Document> {
        let created = self.db.with_tx(|conn| {
            let attachment = check_document_attachment(
                conn,
                document.track_id.as_deref(),
                document.iteration_number,
            )?;
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "INSERT INTO documents (title, doc_type, content, track_id, iteration_number, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    document.title,
                    document.doc_type.as_str(),
                    document.content,
                    attachment.track_id(),
                    attachment.iteration_number(),
                    now
                ],
            )
            .map_err(|e| classify_write(e, "document", &document.title))?;
            load(conn, conn.last_insert_rowid())
        })?;

        tracing::info!(document_id = created.id, "created document");
        Ok(created)
    }

    fn get(&self, id: i64) -> Result<Document> {
        self.db.with_conn(|conn| load(conn, id))
    }

    fn list(&self, attachment: Option<&DocumentAttachment>) -> Result<Vec<Document>> {
        self.db.with_conn(|conn| list_documents(conn, attachment))
    }

    fn update(&self, document: &Document) -> Result<Document> {
        let updated = self.db.with_tx(|conn| {
            load(conn, document.id)?;
            let attachment = check_document_attachment(
                conn,
                document.track_id.as_deref(),
                document.iteration_number,
            )?;
            conn.execute(
                "UPDATE documents SET title = ?2, doc_type = ?3, content = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    document.id,
                    document.title,
                    document.doc_type.as_str(),
                    document.content,
                    to_sql_time(&Utc::now())
                ],
            )?;
            write_attachment(conn, document.id, &attachment)?;
            load(conn, document.id)
        })?;

        tracing::info!(document_id = updated.id, "updated document");
        Ok(updated)
    }

    fn attach(&self, id: i64, attachment: DocumentAttachment) -> Result<Document> {
        let document = self.db.with_tx(|conn| {
            load(conn, id)?;
            let attachment = check_document_attachment(
                conn,
                attachment.track_id(),
                attachment.iteration_number(),
            )?;
            write_attachment(conn, id, &attachment)?;
            load(conn, id)
        })?;

        tracing::info!(
            document_id = id,
            track_id = ?document.track_id,
            iteration_number = ?document.iteration_number,
            "attached document"
        );
        Ok(document)
    }

    fn detach(&self, id: i64) -> Result<Document> {
        self.attach(id, DocumentAttachment::Unattached)
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.db.with_tx(|conn| {
            let removed = conn.execute("DELETE FROM documents WHERE id = ?1", [id])?;
            if removed == 0 {
                return Err(Error::not_found("document", id));
            }
            Ok(())
        })?;
        tracing::info!(document_id = id, "deleted document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        IterationRepository, RoadmapRepository, SqliteIterationStore, SqliteRoadmapStore,
        SqliteTrackStore, TrackRepository,
    };
    use crate::error::ErrorKind;
    use crate::models::{DocumentType, NewIteration, NewRoadmap, NewTrack};

    fn fixture() -> (SqliteDocumentStore, String) {
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
        SqliteIterationStore::new(db.clone(), "PRJ")
            .create(NewIteration::new(Some(1), "First"))
            .unwrap();
        (SqliteDocumentStore::new(db), track.id)
    }

    fn doc(track_id: Option<String>, iteration_number: Option<u32>) -> NewDocument {
        NewDocument {
            title: "Plan".into(),
            doc_type: DocumentType::Plan,
            content: "Steps".into(),
            track_id,
            iteration_number,
        }
    }

    #[test]
    fn test_create_xor() {
        let (store, track_id) = fixture();

        let err = store.create(doc(Some(track_id.clone()), Some(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let on_track = store.create(doc(Some(track_id.clone()), None)).unwrap();
        assert_eq!(on_track.track_id.as_deref(), Some(track_id.as_str()));

        let on_iteration = store.create(doc(None, Some(1))).unwrap();
        assert_eq!(on_iteration.iteration_number, Some(1));

        let loose = store.create(doc(None, None)).unwrap();
        assert_eq!(loose.attachment().unwrap(), DocumentAttachment::Unattached);
    }

    #[test]
    fn test_create_checks_targets_exist() {
        let (store, _) = fixture();
        let err = store.create(doc(Some("PRJ-track-5".into()), None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = store.create(doc(None, Some(7))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_update_xor() {
        let (store, track_id) = fixture();
        let mut document = store.create(doc(None, Some(1))).unwrap();
        document.track_id = Some(track_id);
        let err = store.update(&document).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(store.get(document.id).unwrap().track_id, None);
    }

    #[test]
    fn test_attach_switches_target_and_detach_clears() {
        let (store, track_id) = fixture();
        let document = store.create(doc(None, Some(1))).unwrap();

        let moved = store
            .attach(document.id, DocumentAttachment::Track(track_id.clone()))
            .unwrap();
        assert_eq!(moved.track_id.as_deref(), Some(track_id.as_str()));
        assert_eq!(moved.iteration_number, None);

        let listed = store
            .list(Some(&DocumentAttachment::Track(track_id)))
            .unwrap();
        assert_eq!(listed.len(), 1);

        let detached = store.detach(document.id).unwrap();
        assert_eq!(detached.track_id, None);
        assert_eq!(detached.iteration_number, None);
        assert_eq!(
            store.list(Some(&DocumentAttachment::Unattached)).unwrap().len(),
            1
        );
    }
}
