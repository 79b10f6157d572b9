//! Track store and dependency edges

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use super::connection::Database;
use super::integrity::{require_roadmap, require_track};
use super::rows::{parse_col, time_col, to_sql_time};
use super::sequence::next_entity_id;
use super::traits::TrackRepository;
use crate::error::{classify_write, Error, Result};
use crate::graph;
use crate::ids::{check_id, EntityType};
use crate::models::{check_rank, NewTrack, Track, TrackFilter};

const COLUMNS: &str = "id, roadmap_id, title, description, status, rank, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        roadmap_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_col(row, 4)?,
        rank: row.get(5)?,
        dependencies: Vec::new(),
        created_at: time_col(row, 6)?,
        updated_at: time_col(row, 7)?,
    })
}

/// Outgoing edges of `track_id`, in insertion order
pub(crate) fn load_dependencies(conn: &Connection, track_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT depends_on_id FROM track_dependencies WHERE track_id = ?1 ORDER BY seq",
    )?;
    let edges = stmt
        .query_map([track_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(edges)
}

fn load(conn: &Connection, id: &str) -> Result<Track> {
    check_id(id, EntityType::Track)?;
    let mut track = conn
        .query_row(
            &format!("SELECT {} FROM tracks WHERE id = ?1", COLUMNS),
            [id],
            from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("track", id))?;
    track.dependencies = load_dependencies(conn, id)?;
    Ok(track)
}

pub(crate) fn list_tracks(conn: &Connection, filter: &TrackFilter) -> Result<Vec<Track>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tracks
         WHERE (?1 IS NULL OR roadmap_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY rank, id",
        COLUMNS
    ))?;
    let mut tracks: Vec<Track> = stmt
        .query_map(
            params![filter.roadmap_id, filter.status.map(|s| s.as_str())],
            from_row,
        )?
        .collect::<rusqlite::Result<_>>()?;
    for track in &mut tracks {
        track.dependencies = load_dependencies(conn, &track.id)?;
    }
    Ok(tracks)
}

pub struct SqliteTrackStore {
    db: Arc<Database>,
    project: String,
}

impl SqliteTrackStore {
    pub fn new(db: Arc<Database>, project: impl Into<String>) -> Self {
        Self {
            db,
            project: project.into(),
        }
    }
}

impl TrackRepository for SqliteTrackStore {
    fn create(&self, track: NewTrack) -> Result<Track> {
        check_rank("track", track.rank)?;

        let created = self.db.with_tx(|conn| {
            require_roadmap(conn, &track.roadmap_id)?;
            let id = next_entity_id(conn, &self.project, EntityType::Track)?;
            let now = to_sql_time(&Utc::now());
            conn.execute(
                "INSERT INTO tracks (id, roadmap_id, title, description, status, rank, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    track.roadmap_id,
                    track.title,
                    track.description,
                    track.status.as_str(),
                    track.rank,
                    now
                ],
            )
            .map_err(|e| classify_write(e, "track", &id))?;
            load(conn, &id)
        })?;

        tracing::info!(track_id = %created.id, roadmap_id = %created.roadmap_id, "created track");
        Ok(created)
    }

    fn get(&self, id: &str) -> Result<Track> {
        self.db.with_conn(|conn| load(conn, id))
    }

    fn list(&self, filter: &TrackFilter) -> Result<Vec<Track>> {
        self.db.with_conn(|conn| list_tracks(conn, filter))
    }

    fn update(&self, track: &Track) -> Result<Track> {
        check_rank("track", track.rank)?;

        let updated = self.db.with_tx(|conn| {
            require_track(conn, &track.id)?;
            require_roadmap(conn, &track.roadmap_id)?;
            conn.execute(
                "UPDATE tracks SET roadmap_id = ?2, title = ?3, description = ?4, status = ?5,
                        rank = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    track.id,
                    track.roadmap_id,
                    track.title,
                    track.description,
                    track.status.as_str(),
                    track.rank,
                    to_sql_time(&Utc::now())
                ],
            )?;
            load(conn, &track.id)
        })?;

        tracing::info!(track_id = %updated.id, status = %updated.status, "updated track");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            require_track(conn, id)?;
            conn.execute("DELETE FROM tracks WHERE id = ?1", [id])
                .map_err(|e| classify_write(e, "track", id))?;
            Ok(())
        })?;
        tracing::info!(track_id = id, "deleted track");
        Ok(())
    }

    fn add_dependency(&self, track_id: &str, depends_on_id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            // Existence first: cycle detection assumes both endpoints exist
            require_track(conn, track_id)?;
            require_track(conn, depends_on_id)?;

            if let Err(err) = graph::validate_new_edge(track_id, depends_on_id, |id| {
                load_dependencies(conn, id)
            }) {
                tracing::debug!(track_id, depends_on_id, error = %err, "rejected track dependency");
                return Err(err);
            }

            conn.execute(
                "INSERT INTO track_dependencies (track_id, depends_on_id) VALUES (?1, ?2)",
                params![track_id, depends_on_id],
            )
            .map_err(|e| {
                classify_write(e, "track dependency", &format!("{} -> {}", track_id, depends_on_id))
            })?;
            conn.execute(
                "UPDATE tracks SET updated_at = ?2 WHERE id = ?1",
                params![track_id, to_sql_time(&Utc::now())],
            )?;
            Ok(())
        })?;

        tracing::info!(track_id, depends_on_id, "added track dependency");
        Ok(())
    }

    fn remove_dependency(&self, track_id: &str, depends_on_id: &str) -> Result<()> {
        self.db.with_tx(|conn| {
            require_track(conn, track_id)?;
            let removed = conn.execute(
                "DELETE FROM track_dependencies WHERE track_id = ?1 AND depends_on_id = ?2",
                params![track_id, depends_on_id],
            )?;
            if removed == 0 {
                return Err(Error::not_found(
                    "track dependency",
                    format!("{} -> {}", track_id, depends_on_id),
                ));
            }
            conn.execute(
                "UPDATE tracks SET updated_at = ?2 WHERE id = ?1",
                params![track_id, to_sql_time(&Utc::now())],
            )?;
            Ok(())
        })?;

        tracing::info!(track_id, depends_on_id, "removed track dependency");
        Ok(())
    }

    fn dependencies(&self, track_id: &str) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            require_track(conn, track_id)?;
            load_dependencies(conn, track_id)
        })
    }

    fn dependents(&self, track_id: &str) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            require_track(conn, track_id)?;
            let mut stmt = conn.prepare(
                "SELECT track_id FROM track_dependencies WHERE depends_on_id = ?1 ORDER BY seq",
            )?;
            let ids = stmt
                .query_map([track_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<_>>()?;
            Ok(ids)
        })
    }

    fn validate_no_cycles(&self, track_id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            require_track(conn, track_id)?;
            graph::validate_no_cycles(track_id, |id| load_dependencies(conn, id))
        })
    }
}
