//! SQLite schema definitions
//!
//! Relational store tables:
//! - races: Normalized races, unique per (date, meeting, race)
//! - horses: Horses, unique per (name, birth year)
//! - drivers: Jockeys/drivers, unique per (name, weight)
//! - participants: Horse runs in a race, unique per (race, horse)
//!
//! Document store collections each live in their own `doc_`-prefixed table
//! holding the raw JSON plus the key column their unique index is built on.
//! The prefix keeps them apart from the relational tables when both stores
//! share one database file.

use rusqlite::{Connection, Result};

/// A raw document collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub table: &'static str,
    /// Document field copied into an indexed column, unique when set
    pub key: Option<&'static str>,
}

pub const PROGRAMS: Collection = Collection {
    name: "programs",
    table: "doc_programs",
    key: Some("date_string"),
};

pub const PARTICIPANTS: Collection = Collection {
    name: "participants",
    table: "doc_participants",
    key: Some("race_id"),
};

pub const PARTICIPANTS_DETAILED_PERF: Collection = Collection {
    name: "participants_detailed_perf",
    table: "doc_participants_detailed_perf",
    key: Some("race_id"),
};

pub const LATEST_SCRAPPING: Collection = Collection {
    name: "latest_scrapping",
    table: "doc_latest_scrapping",
    key: None,
};

pub const COLLECTIONS: [Collection; 4] = [
    PROGRAMS,
    PARTICIPANTS,
    PARTICIPANTS_DETAILED_PERF,
    LATEST_SCRAPPING,
];

/// Create all relational tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pmu_id TEXT NOT NULL UNIQUE,
            date_string TEXT NOT NULL,
            meeting_number INTEGER NOT NULL,
            race_number INTEGER NOT NULL,
            name TEXT,
            venue TEXT,
            discipline TEXT,
            length INTEGER NOT NULL,
            length_unit TEXT NOT NULL,
            duration REAL,
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(date_string, meeting_number, race_number)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS horses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_year INTEGER NOT NULL,
            UNIQUE(name, birth_year)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS drivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            weight REAL NOT NULL,
            UNIQUE(name, weight)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(id),
            horse_id INTEGER NOT NULL REFERENCES horses(id),
            rank INTEGER,
            number INTEGER,
            speed REAL CHECK (speed IS NULL OR speed > 0),
            UNIQUE(race_id, horse_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_horses_name ON horses(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participants_horse ON participants(horse_id)",
        [],
    )?;

    Ok(())
}

/// Create all document collections and their key indexes
pub fn create_collections(conn: &Connection) -> Result<()> {
    for collection in COLLECTIONS {
        match collection.key {
            Some(key) => {
                conn.execute(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS {name} (
                            id INTEGER PRIMARY KEY AUTOINCREMENT,
                            {key} TEXT NOT NULL,
                            document TEXT NOT NULL
                        )",
                        name = collection.table,
                    ),
                    [],
                )?;
                conn.execute(
                    &format!(
                        "CREATE UNIQUE INDEX IF NOT EXISTS idx_{name}_{key} ON {name}({key})",
                        name = collection.table,
                    ),
                    [],
                )?;
            }
            None => {
                conn.execute(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS {name} (
                            id INTEGER PRIMARY KEY AUTOINCREMENT,
                            document TEXT NOT NULL
                        )",
                        name = collection.table,
                    ),
                    [],
                )?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('races', 'horses', 'drivers', 'participants')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_create_collections() {
        let conn = Connection::open_in_memory().unwrap();
        create_collections(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('doc_programs', 'doc_participants', 'doc_participants_detailed_perf',
                  'doc_latest_scrapping')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);

        let unique_indexes: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(unique_indexes, 3);
    }

    #[test]
    fn test_create_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let docs = Connection::open_in_memory().unwrap();
        create_collections(&docs).unwrap();
        create_collections(&docs).unwrap();
    }

    #[test]
    fn test_both_stores_in_one_database() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_collections(&conn).unwrap();

        // The relational participants table keeps only its own unique keys
        let unique_on_race: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type='index' AND tbl_name='participants' AND sql LIKE '%UNIQUE%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(unique_on_race, 0);

        let document_tables: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'doc_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(document_tables, COLLECTIONS.len() as i32);
    }
}
