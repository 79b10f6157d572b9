use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::Database;
use super::rows::{time_col, to_sql_time};
use super::traits::RoadmapRepository;
use crate::error::{classify_write, Error, Result};
use crate::models::{NewRoadmap, Roadmap};

const COLUMNS: &str = "id, title, vision, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Roadmap> {
    Ok(Roadmap {
        id: row.get(0)?,
        title: row.get(1)?,
        vision: row.get(2)?,
        created_at: time_col(row, 3)?,
        updated_at: time_col(row, 4)?,
    })
}

fn load(conn: &Connection, id: &str) -> Result<Roadmap> {
    conn.query_row(
        &format!("SELECT {} FROM roadmaps WHERE id = ?1", COLUMNS),
        [id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("roadmap", id))
}

pub(crate) fn list_roadmaps(conn: &Connection) -> Result<Vec<Roadmap>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM roadmaps ORDER BY id", COLUMNS))?;
    let roadmaps = stmt.query_map([], from_row)?.collect::<rusqlite::Result<_>>()?;
    Ok(roadmaps)
}

pub struct SqliteRoadmapStore {
    db: Arc<Database>,
}

impl SqliteRoadmapStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl RoadmapRepository for SqliteRoadmapStore {
    fn create(&self, roadmap: NewRoadmap) -> Result<Roadmap> {
        let id = roadmap.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::invalid("roadmap id must not be empty"));
        }

        let created = self.db.with_tx(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO roadmaps (id, title, vision, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, roadmap.title, roadmap.vision, to_sql_time(&now)],
            )
            .map_err(|e| classify_write(e, "roadmap", &id))?;
            load(conn, &id)
        })?;

        tracing::info!(roadmap_id = %created.id, "created roadmap");
        Ok(created)
    }

    fn get(&self, id: &str) -> Result<Roadmap> {
        self.db.with_conn(|conn| load(conn, id))
    }

    fn list(&self) -> Result<Vec<Roadmap>> {
        self.db.with_conn(list_roadmaps)
    }

    fn update(&self, roadmap: &Roadmap) -> Result<Roadmap> {
        let updated = self.db.with_tx(|conn| {
            let changed = conn.execute(
                "UPDATE roadmaps SET title = ?2, vision = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    roadmap.id,
                    roadmap.title,
                    roadmap.vision,
                    to_sql_time(&Utc::now())
                ],
            )?;
            if changed == 0 {
                return Err(Error::not_found("roadmap", &roadmap.id));
            }
            load(conn, &roadmap.id)
        })?;

        tracing::info!(roadmap_id = %updated.id, "updated roadmap");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            let changed = conn
                .execute("DELETE FROM roadmaps WHERE id = ?1", [id])
                .map_err(|e| classify_write(e, "roadmap", id))?;
            if changed == 0 {
                return Err(Error::not_found("roadmap", id));
            }
            Ok(())
        })?;
        tracing::info!(roadmap_id = id, "deleted roadmap");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn store() -> SqliteRoadmapStore {
        SqliteRoadmapStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn new_roadmap(id: &str) -> NewRoadmap {
        NewRoadmap {
            id: id.to_string(),
            title: "Platform".to_string(),
            vision: "One store".to_string(),
        }
    }

    #[test]
    fn test_roadmap_crud() {
        let store = store();
        let mut roadmap = store.create(new_roadmap("platform")).unwrap();
        assert_eq!(store.get("platform").unwrap().title, "Platform");

        roadmap.title = "Platform v2".to_string();
        store.update(&roadmap).unwrap();
        assert_eq!(store.list().unwrap()[0].title, "Platform v2");

        store.delete("platform").unwrap();
        assert_eq!(store.get("platform").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_duplicate_roadmap_already_exists() {
        let store = store();
        store.create(new_roadmap("platform")).unwrap();
        let err = store.create(new_roadmap("platform")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = store().create(new_roadmap("  ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
