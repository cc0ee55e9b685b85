//! Raw document store for scraped PMU payloads.
//!
//! Documents are stored as JSON, write-once, keyed by program date or by
//! composite race id. Key uniqueness is enforced by the collection indexes,
//! so inserting a second document for the same key fails.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::schema::{
    create_collections, Collection, LATEST_SCRAPPING, PARTICIPANTS, PARTICIPANTS_DETAILED_PERF,
    PROGRAMS,
};
use crate::error::{DataError, Result};
use crate::identifiers::{date_string_from_date, parse_date_string, race_key};
use crate::payload::{RawDetailedPerfs, RawParticipants, RawProgram};
use crate::types::NewRace;

/// Gateway over the raw scraped documents
pub struct ScrapedDataService {
    conn: Connection,
}

impl ScrapedDataService {
    /// Open the document store, creating collections and indexes if needed
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        create_collections(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory document store (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_collections(&conn)?;
        Ok(Self { conn })
    }

    // ==================== Latest scrapping ====================

    /// Date of the latest completed scrape, if any
    pub fn get_latest_scrapping(&self) -> Result<Option<NaiveDate>> {
        let document = self.find_first(LATEST_SCRAPPING)?;
        let latest = document
            .as_ref()
            .and_then(|doc| doc.get("latest"))
            .and_then(Value::as_str);

        latest.map(parse_date_string).transpose()
    }

    /// Replace the latest scrape date
    pub fn set_latest_scrapping(&self, date: NaiveDate) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("DELETE FROM {}", LATEST_SCRAPPING.table), [])?;
        insert_one(
            &tx,
            LATEST_SCRAPPING,
            &json!({ "latest": date_string_from_date(date) }),
        )?;
        tx.commit()?;

        info!("Latest scrapping set to {}", date);
        Ok(())
    }

    // ==================== Inserts ====================

    /// Insert a program, tagged with its ddMMyyyy date string
    pub fn save_program(&self, program: Value, date_string: &str) -> Result<i64> {
        let document = tag(program, "date_string", date_string)?;
        let id = insert_one(&self.conn, PROGRAMS, &document)?;
        info!("Program {} saved", date_string);
        Ok(id)
    }

    pub fn save_participants(
        &self,
        participants: Value,
        date_string: &str,
        meeting_id: u32,
        race_id: u32,
    ) -> Result<i64> {
        let key = race_key(date_string, meeting_id, race_id);
        let document = tag(participants, "race_id", &key)?;
        let id = insert_one(&self.conn, PARTICIPANTS, &document)?;
        info!("Participants for {} saved", key);
        Ok(id)
    }

    pub fn save_participants_detailed_perf(
        &self,
        participants_detailed_perf: Value,
        date_string: &str,
        meeting_id: u32,
        race_id: u32,
    ) -> Result<i64> {
        let key = race_key(date_string, meeting_id, race_id);
        let document = tag(participants_detailed_perf, "race_id", &key)?;
        let id = insert_one(&self.conn, PARTICIPANTS_DETAILED_PERF, &document)?;
        info!("Detailed performances for {} saved", key);
        Ok(id)
    }

    // ==================== Queries ====================

    pub fn get_all_programs(&self) -> Result<Vec<Value>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT document FROM {} ORDER BY id",
            PROGRAMS.table
        ))?;

        let documents = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        documents
            .iter()
            .map(|doc| serde_json::from_str(doc).map_err(DataError::from))
            .collect()
    }

    /// Program stored for a ddMMyyyy date
    pub fn get_program(&self, date_string: &str) -> Result<RawProgram> {
        let document = find_by_key(&self.conn, PROGRAMS, date_string)?
            .ok_or_else(|| DataError::not_found(format!("program for {}", date_string)))?;
        Ok(serde_json::from_value(document)?)
    }

    /// Every race of a program, as normalized race values
    pub fn get_races_by_date(&self, date_string: &str) -> Result<Vec<NewRace>> {
        let program = self.get_program(date_string)?;
        let races: Vec<NewRace> = program
            .reunions
            .iter()
            .flat_map(|meeting| {
                meeting
                    .courses
                    .iter()
                    .map(move |race| NewRace::from_payload(race, meeting, date_string))
            })
            .collect();

        debug!("{} races found for {}", races.len(), date_string);
        Ok(races)
    }

    pub fn get_participants(&self, race_id: &str) -> Result<Option<RawParticipants>> {
        find_by_key(&self.conn, PARTICIPANTS, race_id)?
            .map(|doc| serde_json::from_value(doc).map_err(DataError::from))
            .transpose()
    }

    pub fn get_participants_detailed_perf(
        &self,
        race_id: &str,
    ) -> Result<Option<RawDetailedPerfs>> {
        find_by_key(&self.conn, PARTICIPANTS_DETAILED_PERF, race_id)?
            .map(|doc| serde_json::from_value(doc).map_err(DataError::from))
            .transpose()
    }

    fn find_first(&self, collection: Collection) -> Result<Option<Value>> {
        let document: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT document FROM {} ORDER BY id LIMIT 1", collection.table),
                [],
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|doc| serde_json::from_str(&doc).map_err(DataError::from))
            .transpose()
    }
}

/// Set `field` on a JSON object document
fn tag(document: Value, field: &str, value: &str) -> Result<Value> {
    let mut object: Map<String, Value> = match document {
        Value::Object(object) => object,
        other => {
            return Err(DataError::validation(format!(
                "expected a JSON object document, got {}",
                json_kind(&other)
            )))
        }
    };
    object.insert(field.to_string(), Value::String(value.to_string()));
    Ok(Value::Object(object))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn insert_one(conn: &Connection, collection: Collection, document: &Value) -> Result<i64> {
    let body = serde_json::to_string(document)?;
    match collection.key {
        Some(key) => {
            let key_value = document.get(key).and_then(Value::as_str).ok_or_else(|| {
                DataError::validation(format!("{} document without '{}'", collection.name, key))
            })?;
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}, document) VALUES (?1, ?2)",
                    collection.table, key
                ),
                params![key_value, body],
            )?;
        }
        None => {
            conn.execute(
                &format!("INSERT INTO {} (document) VALUES (?1)", collection.table),
                [body],
            )?;
        }
    }
    Ok(conn.last_insert_rowid())
}

fn find_by_key(
    conn: &Connection,
    collection: Collection,
    key_value: &str,
) -> Result<Option<Value>> {
    let Some(key) = collection.key else {
        return Ok(None);
    };

    let document: Option<String> = conn
        .query_row(
            &format!(
                "SELECT document FROM {} WHERE {} = ?1",
                collection.table, key
            ),
            [key_value],
            |row| row.get(0),
        )
        .optional()?;

    document
        .map(|doc| serde_json::from_str(&doc).map_err(DataError::from))
        .transpose()
}
