//! Data access for the normalized race entities.
//!
//! Every dao call takes the connection (or transaction) it runs on; daos hold
//! no session of their own. `save` is get-or-create on the entity's natural
//! key: an existing row is returned untouched.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::types::{
    Driver, Horse, NewDriver, NewHorse, NewParticipant, NewRace, Participant, Race,
};

/// Get-or-create by business key, one operation per entity type
pub trait EntityStore {
    fn save_race(&self, race: &NewRace) -> Result<Race>;
    fn save_horse(&self, horse: &NewHorse) -> Result<Horse>;
    fn save_driver(&self, driver: &NewDriver) -> Result<Driver>;
    fn save_participant(&self, participant: &NewParticipant) -> Result<Participant>;
}

impl EntityStore for Connection {
    fn save_race(&self, race: &NewRace) -> Result<Race> {
        RaceDao::save(self, race)
    }

    fn save_horse(&self, horse: &NewHorse) -> Result<Horse> {
        HorseDao::save(self, horse)
    }

    fn save_driver(&self, driver: &NewDriver) -> Result<Driver> {
        DriverDao::save(self, driver)
    }

    fn save_participant(&self, participant: &NewParticipant) -> Result<Participant> {
        ParticipantDao::save(self, participant)
    }
}

// ==================== Races ====================

const RACE_COLUMNS: &str = "id, pmu_id, date_string, meeting_number, race_number, name, venue, \
                            discipline, length, length_unit, duration";

fn race_from_row(row: &Row<'_>) -> rusqlite::Result<Race> {
    Ok(Race {
        id: row.get(0)?,
        pmu_id: row.get(1)?,
        date_string: row.get(2)?,
        meeting_number: row.get(3)?,
        race_number: row.get(4)?,
        name: row.get(5)?,
        venue: row.get(6)?,
        discipline: row.get(7)?,
        length: row.get(8)?,
        length_unit: row.get(9)?,
        duration: row.get(10)?,
    })
}

pub struct RaceDao;

impl RaceDao {
    pub fn save(conn: &Connection, race: &NewRace) -> Result<Race> {
        if let Some(existing) =
            Self::get_by_pmu_id(conn, &race.date_string, race.meeting_number, race.race_number)?
        {
            return Ok(existing);
        }

        conn.execute(
            r#"
            INSERT INTO races
            (pmu_id, date_string, meeting_number, race_number, name, venue,
             discipline, length, length_unit, duration)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                race.pmu_id(),
                race.date_string,
                race.meeting_number,
                race.race_number,
                race.name,
                race.venue,
                race.discipline,
                race.length,
                race.length_unit,
                race.duration,
            ],
        )?;

        Self::get_by_id(conn, conn.last_insert_rowid())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Race> {
        let race = conn.query_row(
            &format!("SELECT {} FROM races WHERE id = ?1", RACE_COLUMNS),
            [id],
            race_from_row,
        )?;
        Ok(race)
    }

    /// Look a race up by its business key
    pub fn get_by_pmu_id(
        conn: &Connection,
        date_string: &str,
        meeting_number: u32,
        race_number: u32,
    ) -> Result<Option<Race>> {
        let race = conn
            .query_row(
                &format!(
                    "SELECT {} FROM races
                     WHERE date_string = ?1 AND meeting_number = ?2 AND race_number = ?3",
                    RACE_COLUMNS
                ),
                params![date_string, meeting_number, race_number],
                race_from_row,
            )
            .optional()?;
        Ok(race)
    }

    /// Races with an id greater than `after_id`, in id order
    pub fn page_after(conn: &Connection, after_id: i64, limit: usize) -> Result<Vec<Race>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM races WHERE id > ?1 ORDER BY id LIMIT ?2",
            RACE_COLUMNS
        ))?;

        let races = stmt
            .query_map(params![after_id, limit as i64], race_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(races)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM races", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ==================== Horses ====================

pub struct HorseDao;

impl HorseDao {
    pub fn save(conn: &Connection, horse: &NewHorse) -> Result<Horse> {
        let existing = conn
            .query_row(
                "SELECT id, name, birth_year FROM horses WHERE name = ?1 AND birth_year = ?2",
                params![horse.name, horse.birth_year],
                horse_from_row,
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        conn.execute(
            "INSERT INTO horses (name, birth_year) VALUES (?1, ?2)",
            params![horse.name, horse.birth_year],
        )?;

        Ok(Horse {
            id: conn.last_insert_rowid(),
            name: horse.name.clone(),
            birth_year: horse.birth_year,
        })
    }

    /// Horse by name; the youngest one wins when several share the name
    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Horse>> {
        let horse = conn
            .query_row(
                "SELECT id, name, birth_year FROM horses WHERE name = ?1
                 ORDER BY birth_year DESC, id LIMIT 1",
                [name],
                horse_from_row,
            )
            .optional()?;
        Ok(horse)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM horses", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn horse_from_row(row: &Row<'_>) -> rusqlite::Result<Horse> {
    Ok(Horse {
        id: row.get(0)?,
        name: row.get(1)?,
        birth_year: row.get(2)?,
    })
}

// ==================== Drivers ====================

pub struct DriverDao;

impl DriverDao {
    pub fn save(conn: &Connection, driver: &NewDriver) -> Result<Driver> {
        let existing = conn
            .query_row(
                "SELECT id, name, weight FROM drivers WHERE name = ?1 AND weight = ?2",
                params![driver.name, driver.weight],
                |row| {
                    Ok(Driver {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        weight: row.get(2)?,
                    })
                },
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        conn.execute(
            "INSERT INTO drivers (name, weight) VALUES (?1, ?2)",
            params![driver.name, driver.weight],
        )?;

        Ok(Driver {
            id: conn.last_insert_rowid(),
            name: driver.name.clone(),
            weight: driver.weight,
        })
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM drivers", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ==================== Participants ====================

const PARTICIPANT_SELECT: &str = r#"
    SELECT p.id, p.race_id, r.pmu_id, p.horse_id, h.name, p.rank, p.number, p.speed
    FROM participants p
    JOIN races r ON r.id = p.race_id
    JOIN horses h ON h.id = p.horse_id
"#;

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        race_id: row.get(1)?,
        race_pmu_id: row.get(2)?,
        horse_id: row.get(3)?,
        horse_name: row.get(4)?,
        rank: row.get(5)?,
        number: row.get(6)?,
        speed: row.get(7)?,
    })
}

pub struct ParticipantDao;

impl ParticipantDao {
    pub fn save(conn: &Connection, participant: &NewParticipant) -> Result<Participant> {
        let existing = conn
            .query_row(
                &format!("{} WHERE p.race_id = ?1 AND p.horse_id = ?2", PARTICIPANT_SELECT),
                params![participant.race_id, participant.horse_id],
                participant_from_row,
            )
            .optional()?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        conn.execute(
            r#"
            INSERT INTO participants (race_id, horse_id, rank, number, speed)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                participant.race_id,
                participant.horse_id,
                participant.rank,
                participant.number,
                participant.speed,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let saved = conn.query_row(
            &format!("{} WHERE p.id = ?1", PARTICIPANT_SELECT),
            [id],
            participant_from_row,
        )?;
        Ok(saved)
    }

    /// Every run of a horse, oldest race first
    pub fn get_for_horse(conn: &Connection, horse_id: i64) -> Result<Vec<Participant>> {
        Self::query(conn, "WHERE p.horse_id = ?1 ORDER BY r.id", horse_id)
    }

    /// Field of a race in arrival order, non-finishers last
    pub fn get_for_race(conn: &Connection, race_id: i64) -> Result<Vec<Participant>> {
        Self::query(
            conn,
            "WHERE p.race_id = ?1 ORDER BY p.rank IS NULL, p.rank, p.id",
            race_id,
        )
    }

    fn query(conn: &Connection, clause: &str, id: i64) -> Result<Vec<Participant>> {
        let mut stmt = conn.prepare(&format!("{} {}", PARTICIPANT_SELECT, clause))?;
        let participants = stmt
            .query_map([id], participant_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(participants)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::create_tables;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn new_race(meeting: u32, race: u32) -> NewRace {
        NewRace {
            date_string: "01012023".to_string(),
            meeting_number: meeting,
            race_number: race,
            name: Some("PRIX D'AMERIQUE".to_string()),
            venue: Some("VINCENNES".to_string()),
            discipline: Some("ATTELE".to_string()),
            length: 2700,
            length_unit: "METRE".to_string(),
            duration: Some(195_000.0),
        }
    }

    fn horse(name: &str, birth_year: i32) -> NewHorse {
        NewHorse {
            name: name.to_string(),
            birth_year,
        }
    }

    fn driver(name: &str, weight: f64) -> NewDriver {
        NewDriver {
            name: name.to_string(),
            weight,
        }
    }

    fn entry(race: &Race, horse: &Horse, rank: Option<u32>, speed: Option<f64>) -> NewParticipant {
        NewParticipant {
            race_id: race.id,
            horse_id: horse.id,
            rank,
            number: None,
            speed,
        }
    }

    #[test]
    fn test_save_race_get_or_create() {
        let conn = conn();
        let first = RaceDao::save(&conn, &new_race(1, 5)).unwrap();
        assert_eq!(first.pmu_id, "01012023R1C5");

        // Same business key, different attributes: the stored row wins
        let mut changed = new_race(1, 5);
        changed.length = 2100;
        let second = RaceDao::save(&conn, &changed).unwrap();
        assert_eq!(second, first);
        assert_eq!(RaceDao::count(&conn).unwrap(), 1);

        RaceDao::save(&conn, &new_race(1, 6)).unwrap();
        assert_eq!(RaceDao::count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_get_race_by_pmu_id() {
        let conn = conn();
        let saved = RaceDao::save(&conn, &new_race(2, 3)).unwrap();

        let found = RaceDao::get_by_pmu_id(&conn, "01012023", 2, 3).unwrap();
        assert_eq!(found, Some(saved));
        assert!(RaceDao::get_by_pmu_id(&conn, "01012023", 3, 2).unwrap().is_none());
    }

    #[test]
    fn test_page_after() {
        let conn = conn();
        for race in 1..=5 {
            RaceDao::save(&conn, &new_race(1, race)).unwrap();
        }

        let first = RaceDao::page_after(&conn, 0, 2).unwrap();
        assert_eq!(first.len(), 2);
        let rest = RaceDao::page_after(&conn, first[1].id, 10).unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].race_number, 3);
    }

    #[test]
    fn test_horse_get_or_create_and_lookup() {
        let conn = conn();
        let a = HorseDao::save(&conn, &horse("BOLD EAGLE", 2011)).unwrap();
        let again = HorseDao::save(&conn, &horse("BOLD EAGLE", 2011)).unwrap();
        assert_eq!(a, again);

        let younger = HorseDao::save(&conn, &horse("BOLD EAGLE", 2019)).unwrap();
        assert_ne!(a.id, younger.id);
        assert_eq!(HorseDao::count(&conn).unwrap(), 2);

        assert_eq!(HorseDao::get_by_name(&conn, "BOLD EAGLE").unwrap(), Some(younger));
        assert!(HorseDao::get_by_name(&conn, "READY CASH").unwrap().is_none());
    }

    #[test]
    fn test_driver_get_or_create() {
        let conn = conn();
        let d = DriverDao::save(&conn, &driver("F. NIVARD", 62.5)).unwrap();
        let again = DriverDao::save(&conn, &driver("F. NIVARD", 62.5)).unwrap();
        assert_eq!(d, again);
        DriverDao::save(&conn, &driver("F. NIVARD", 63.0)).unwrap();
        assert_eq!(DriverDao::count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_participants_for_race_and_horse() {
        let conn = conn();
        let race = RaceDao::save(&conn, &new_race(1, 1)).unwrap();
        let other = RaceDao::save(&conn, &new_race(1, 2)).unwrap();
        let eagle = HorseDao::save(&conn, &horse("BOLD EAGLE", 2011)).unwrap();
        let cash = HorseDao::save(&conn, &horse("READY CASH", 2005)).unwrap();

        let dnf = ParticipantDao::save(&conn, &entry(&race, &cash, None, None)).unwrap();
        let winner =
            ParticipantDao::save(&conn, &entry(&race, &eagle, Some(1), Some(0.0142))).unwrap();
        ParticipantDao::save(&conn, &entry(&other, &eagle, Some(3), None)).unwrap();

        assert_eq!(winner.horse_name, "BOLD EAGLE");
        assert_eq!(winner.race_pmu_id, "01012023R1C1");

        let field = ParticipantDao::get_for_race(&conn, race.id).unwrap();
        assert_eq!(field.len(), 2);
        assert_eq!(field[0], winner);
        assert_eq!(field[1], dnf);

        let runs = ParticipantDao::get_for_horse(&conn, eagle.id).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].race_pmu_id, "01012023R1C2");

        // Re-saving the same (race, horse) pair returns the stored row
        let again = ParticipantDao::save(&conn, &entry(&race, &eagle, Some(2), None)).unwrap();
        assert_eq!(again, winner);
        assert_eq!(ParticipantDao::count(&conn).unwrap(), 3);
    }

    #[test]
    fn test_speed_check_constraint() {
        let conn = conn();
        let race = RaceDao::save(&conn, &new_race(1, 1)).unwrap();
        let unknown = HorseDao::save(&conn, &horse("X", 2015)).unwrap();
        let result = ParticipantDao::save(&conn, &entry(&race, &unknown, Some(1), Some(0.0)));
        assert!(result.is_err());
    }
}
