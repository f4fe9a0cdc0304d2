use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pathfinding::grid::GridSettings;

const WORLD_SCHEMA_VERSION: i64 = 1;
const WORLD_SAVE_VERSION: i64 = 1;

const WORLD_DB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS world_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  schema_version INTEGER NOT NULL,
  save_version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS grid_layouts (
  name TEXT PRIMARY KEY,
  settings_json TEXT NOT NULL,
  layout TEXT NOT NULL,
  updated_at_tick INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS session_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  seed INTEGER NOT NULL,
  runners_caught INTEGER NOT NULL,
  run_time REAL NOT NULL,
  time_remaining REAL NOT NULL,
  finished_tick INTEGER NOT NULL
);
"#;

#[derive(Debug)]
pub enum WorldDbError {
    Sqlite(rusqlite::Error),
    Json(serde_json::Error),
    InvalidData(String),
}

impl std::fmt::Display for WorldDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldDbError::Sqlite(err) => write!(f, "sqlite error: {}", err),
            WorldDbError::Json(err) => write!(f, "stored settings are not valid json: {}", err),
            WorldDbError::InvalidData(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for WorldDbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorldDbError::Sqlite(err) => Some(err),
            WorldDbError::Json(err) => Some(err),
            WorldDbError::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for WorldDbError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl From<serde_json::Error> for WorldDbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// A named grid configuration together with the terrain layout it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLayout {
    pub name: String,
    pub settings: GridSettings,
    pub layout: String,
    pub updated_at_tick: u64,
}

/// Outcome of one finished round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub seed: u64,
    pub runners_caught: u32,
    pub run_time: f32,
    pub time_remaining: f32,
    pub finished_tick: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    pub result: SessionResult,
}

pub struct WorldDb {
    conn: Connection,
}

impl WorldDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorldDbError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, WorldDbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, WorldDbError> {
        let mut db = Self { conn };
        db.conn.execute_batch(WORLD_DB_SCHEMA)?;
        db.ensure_world_meta()?;
        Ok(db)
    }

    /// Insert or replace a layout by name.
    pub fn save_layout(
        &mut self,
        name: &str,
        settings: &GridSettings,
        layout: &str,
        tick: u64,
    ) -> Result<(), WorldDbError> {
        if name.trim().is_empty() {
            return Err(WorldDbError::InvalidData(
                "layout name cannot be empty".to_string(),
            ));
        }
        let settings_json = serde_json::to_string(settings)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM grid_layouts WHERE name = ?1", params![name])?;
        tx.execute(
            "INSERT INTO grid_layouts (name, settings_json, layout, updated_at_tick) VALUES (?1, ?2, ?3, ?4)",
            params![name, settings_json, layout, tick as i64],
        )?;
        tx.commit()?;
        debug!(name, "layout saved");
        Ok(())
    }

    pub fn load_layout(&self, name: &str) -> Result<Option<StoredLayout>, WorldDbError> {
        let row = self
            .conn
            .query_row(
                "SELECT name, settings_json, layout, updated_at_tick FROM grid_layouts WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, settings_json, layout, updated_at_tick)) = row else {
            return Ok(None);
        };
        let settings: GridSettings = serde_json::from_str(&settings_json)?;
        Ok(Some(StoredLayout {
            name,
            settings,
            layout,
            updated_at_tick: non_negative(updated_at_tick, "updated_at_tick")?,
        }))
    }

    /// Layout names in alphabetical order.
    pub fn list_layouts(&self) -> Result<Vec<String>, WorldDbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM grid_layouts ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for name in rows {
            names.push(name?);
        }
        Ok(names)
    }

    pub fn record_session(&mut self, result: &SessionResult) -> Result<i64, WorldDbError> {
        self.conn.execute(
            "INSERT INTO session_results (seed, runners_caught, run_time, time_remaining, finished_tick) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.seed as i64,
                result.runners_caught as i64,
                result.run_time as f64,
                result.time_remaining as f64,
                result.finished_tick as i64
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, caught = result.runners_caught, "session recorded");
        Ok(id)
    }

    /// Newest sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, WorldDbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, seed, runners_caught, run_time, time_remaining, finished_tick FROM session_results ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], read_session_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(session_from_row(row?)?);
        }
        Ok(records)
    }

    /// Most catches; ties go to the longer run.
    pub fn best_session(&self) -> Result<Option<SessionRecord>, WorldDbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, seed, runners_caught, run_time, time_remaining, finished_tick FROM session_results ORDER BY runners_caught DESC, run_time DESC, id ASC LIMIT 1",
                [],
                read_session_row,
            )
            .optional()?;
        row.map(session_from_row).transpose()
    }

    fn ensure_world_meta(&mut self) -> Result<(), WorldDbError> {
        let meta = self
            .conn
            .query_row(
                "SELECT schema_version, save_version FROM world_meta WHERE id = 1",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match meta {
            Some((schema_version, save_version)) => {
                if schema_version == WORLD_SCHEMA_VERSION && save_version == WORLD_SAVE_VERSION {
                    return Ok(());
                }
                return Err(WorldDbError::InvalidData(format!(
                    "world_meta version mismatch (schema {}, save {}, expected {}, {})",
                    schema_version, save_version, WORLD_SCHEMA_VERSION, WORLD_SAVE_VERSION
                )));
            }
            None => {
                self.conn.execute(
                    "INSERT INTO world_meta (id, schema_version, save_version) VALUES (1, ?1, ?2)",
                    params![WORLD_SCHEMA_VERSION, WORLD_SAVE_VERSION],
                )?;
            }
        }

        Ok(())
    }
}

type SessionRow = (i64, i64, i64, f64, f64, i64);

fn read_session_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn session_from_row(row: SessionRow) -> Result<SessionRecord, WorldDbError> {
    let (id, seed, runners_caught, run_time, time_remaining, finished_tick) = row;
    let runners_caught = u32::try_from(runners_caught).map_err(|_| {
        WorldDbError::InvalidData(format!("invalid runners_caught {}", runners_caught))
    })?;
    Ok(SessionRecord {
        id,
        result: SessionResult {
            seed: seed as u64,
            runners_caught,
            run_time: run_time as f32,
            time_remaining: time_remaining as f32,
            finished_tick: non_negative(finished_tick, "finished_tick")?,
        },
    })
}

fn non_negative(value: i64, column: &str) -> Result<u64, WorldDbError> {
    u64::try_from(value)
        .map_err(|_| WorldDbError::InvalidData(format!("negative {} {}", column, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(caught: u32, run_time: f32) -> SessionResult {
        SessionResult {
            seed: 7,
            runners_caught: caught,
            run_time,
            time_remaining: 0.0,
            finished_tick: 600,
        }
    }

    #[test]
    fn layouts_upsert_and_list_alphabetically() {
        let mut db = WorldDb::open_in_memory().unwrap();
        let settings = GridSettings::default();
        db.save_layout("plaza", &settings, "....", 1).unwrap();
        db.save_layout("alley", &settings, "#..#", 2).unwrap();
        db.save_layout("plaza", &settings, "..#.", 3).unwrap();

        assert_eq!(db.list_layouts().unwrap(), vec!["alley", "plaza"]);
        let plaza = db.load_layout("plaza").unwrap().unwrap();
        assert_eq!(plaza.layout, "..#.");
        assert_eq!(plaza.updated_at_tick, 3);
        assert_eq!(plaza.settings, settings);
        assert!(db.load_layout("missing").unwrap().is_none());
        assert!(matches!(
            db.save_layout(" ", &settings, "", 0),
            Err(WorldDbError::InvalidData(_))
        ));
    }

    #[test]
    fn sessions_are_ranked() {
        let mut db = WorldDb::open_in_memory().unwrap();
        assert!(db.best_session().unwrap().is_none());
        let first = db.record_session(&session(3, 80.0)).unwrap();
        let second = db.record_session(&session(5, 70.0)).unwrap();
        let third = db.record_session(&session(5, 95.0)).unwrap();
        assert!(first < second && second < third);

        let recent = db.recent_sessions(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, third);
        assert_eq!(recent[1].id, second);

        let best = db.best_session().unwrap().unwrap();
        assert_eq!(best.id, third);
        assert_eq!(best.result, session(5, 95.0));
    }

    #[test]
    fn reopening_keeps_data_and_checks_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.db");
        {
            let mut db = WorldDb::open(&path).unwrap();
            db.record_session(&session(1, 10.0)).unwrap();
        }
        let db = WorldDb::open(&path).unwrap();
        assert_eq!(db.recent_sessions(10).unwrap().len(), 1);
        db.conn
            .execute("UPDATE world_meta SET schema_version = 99 WHERE id = 1", [])
            .unwrap();
        drop(db);
        assert!(matches!(
            WorldDb::open(&path),
            Err(WorldDbError::InvalidData(_))
        ));
    }
}
