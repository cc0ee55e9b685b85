//! Sessions on the relational store.
//!
//! A session is a dedicated SQLite connection; dropping it closes it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{debug, warn};

use super::dao::RaceDao;
use super::schema::create_tables;
use crate::error::Result;
use crate::types::Race;

/// Session factory for the relational store
#[derive(Debug, Clone)]
pub struct RelationalStore {
    path: PathBuf,
}

impl RelationalStore {
    /// Open the store, creating the database file and tables if needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path: path.to_path_buf(),
        };
        let conn = store.session()?;
        create_tables(&conn)?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new session
    pub fn session(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(conn)
    }
}

/// Lazily paged iteration over every race.
///
/// The stream owns its session. The session is released as soon as the last
/// page has been read, when a read fails, or when the stream is dropped
/// before being drained.
pub struct RaceStream {
    session: Option<Connection>,
    buffer: VecDeque<Race>,
    last_id: i64,
    page_size: usize,
}

impl RaceStream {
    pub fn new(session: Connection, page_size: usize) -> Self {
        Self {
            session: Some(session),
            buffer: VecDeque::new(),
            last_id: 0,
            page_size: page_size.max(1),
        }
    }

    /// Whether the backing session is still held
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Release the backing session; further calls to `next` only drain the
    /// already buffered races
    pub fn close(&mut self) {
        if let Some(conn) = self.session.take() {
            match conn.close() {
                Ok(()) => debug!("Race stream session closed"),
                Err((_, e)) => warn!("Failed to close race stream session: {}", e),
            }
        }
    }
}

impl Iterator for RaceStream {
    type Item = Result<Race>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            let conn = self.session.as_ref()?;
            match RaceDao::page_after(conn, self.last_id, self.page_size) {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.close();
                    }
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }
        }

        let race = self.buffer.pop_front()?;
        self.last_id = race.id;
        Some(Ok(race))
    }
}

impl Drop for RaceStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewRace;
    use tempfile::TempDir;

    fn seeded_store(dir: &TempDir, races: u32) -> RelationalStore {
        let store = RelationalStore::open(&dir.path().join("nested/races.db")).unwrap();
        let conn = store.session().unwrap();
        for race in 1..=races {
            RaceDao::save(
                &conn,
                &NewRace {
                    date_string: "01012023".to_string(),
                    meeting_number: 1,
                    race_number: race,
                    name: None,
                    venue: None,
                    discipline: None,
                    length: 1600,
                    length_unit: "METRE".to_string(),
                    duration: None,
                },
            )
            .unwrap();
        }
        store
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, 0);
        assert!(store.path().exists());
    }

    #[test]
    fn test_drained_stream_releases_session() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, 5);

        let mut stream = RaceStream::new(store.session().unwrap(), 2);
        let mut numbers = Vec::new();
        for race in stream.by_ref() {
            numbers.push(race.unwrap().race_number);
        }

        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(!stream.is_open());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_exact_page_multiple_releases_session() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, 4);

        let mut stream = RaceStream::new(store.session().unwrap(), 2);
        assert_eq!(stream.by_ref().count(), 4);
        assert!(!stream.is_open());
    }

    #[test]
    fn test_early_stop_keeps_session_until_closed() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, 5);

        let mut stream = RaceStream::new(store.session().unwrap(), 2);
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.race_number, 1);
        assert!(stream.is_open());

        stream.close();
        assert!(!stream.is_open());
        // The buffered race is still handed out, nothing more is read
        assert_eq!(stream.next().unwrap().unwrap().race_number, 2);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, 0);

        let mut stream = RaceStream::new(store.session().unwrap(), 10);
        assert!(stream.next().is_none());
        assert!(!stream.is_open());
    }
}
