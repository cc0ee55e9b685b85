//! Normalized race entities and API response types.

use serde::{Deserialize, Serialize};

use crate::identifiers::race_key;
use crate::payload::{RawMeeting, RawParticipant, RawRace};

/// The only length unit races can be normalized from
pub const METRE: &str = "METRE";

/// Race before it is persisted, keyed by (date, meeting, race)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRace {
    pub date_string: String,
    pub meeting_number: u32,
    pub race_number: u32,
    pub name: Option<String>,
    pub venue: Option<String>,
    pub discipline: Option<String>,
    pub length: u32,
    pub length_unit: String,
    /// Winner's time as published, in milliseconds
    pub duration: Option<f64>,
}

impl NewRace {
    pub fn from_payload(race: &RawRace, meeting: &RawMeeting, date_string: &str) -> Self {
        Self {
            date_string: date_string.to_string(),
            meeting_number: race.num_reunion,
            race_number: race.num_ordre,
            name: race.libelle.clone(),
            venue: meeting.venue().map(str::to_string),
            discipline: race
                .discipline
                .clone()
                .or_else(|| meeting.discipline().map(str::to_string)),
            length: race.distance,
            length_unit: race.distance_unit.clone(),
            duration: race.duree_course.map(|d| d as f64),
        }
    }

    pub fn pmu_id(&self) -> String {
        race_key(&self.date_string, self.meeting_number, self.race_number)
    }
}

/// Persisted race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: i64,
    pub pmu_id: String,
    pub date_string: String,
    pub meeting_number: u32,
    pub race_number: u32,
    pub name: Option<String>,
    pub venue: Option<String>,
    pub discipline: Option<String>,
    pub length: u32,
    pub length_unit: String,
    pub duration: Option<f64>,
}

impl Race {
    /// Winner's time in seconds
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration.map(|ms| ms / 1000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHorse {
    pub name: String,
    pub birth_year: i32,
}

impl NewHorse {
    pub fn from_payload(participant: &RawParticipant, birth_year: i32) -> Self {
        Self {
            name: participant.nom.clone(),
            birth_year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horse {
    pub id: i64,
    pub name: String,
    pub birth_year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: i64,
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub race_id: i64,
    pub horse_id: i64,
    pub rank: Option<u32>,
    pub number: Option<u32>,
    /// Race length over elapsed time, in metres per millisecond
    pub speed: Option<f64>,
}

impl NewParticipant {
    pub fn from_payload(
        participant: &RawParticipant,
        race_id: i64,
        horse_id: i64,
        speed: Option<f64>,
    ) -> Self {
        Self {
            race_id,
            horse_id,
            rank: participant.ordre_arrivee,
            number: participant.num_pmu,
            speed,
        }
    }
}

/// Persisted participant, joined with its race and horse identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub race_id: i64,
    pub race_pmu_id: String,
    pub horse_id: i64,
    pub horse_name: String,
    pub rank: Option<u32>,
    pub number: Option<u32>,
    pub speed: Option<f64>,
}

impl Participant {
    /// Speed in metres per second
    pub fn speed_mps(&self) -> Option<f64> {
        self.speed.map(|s| s * 1000.0)
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::RawVenue;

    fn meeting() -> RawMeeting {
        RawMeeting {
            num_officiel: Some(3),
            disciplines_mere: vec!["PLAT".to_string()],
            hippodrome: Some(RawVenue {
                libelle_long: Some("LONGCHAMP".to_string()),
            }),
            courses: Vec::new(),
        }
    }

    #[test]
    fn test_race_from_payload() {
        let raw = RawRace {
            num_reunion: 3,
            num_ordre: 4,
            libelle: Some("PRIX DU JOCKEY CLUB".to_string()),
            distance: 2100,
            distance_unit: METRE.to_string(),
            duree_course: Some(125_400),
            discipline: None,
        };
        let race = NewRace::from_payload(&raw, &meeting(), "04062023");

        assert_eq!(race.pmu_id(), "04062023R3C4");
        assert_eq!(race.venue.as_deref(), Some("LONGCHAMP"));
        // Falls back to the meeting discipline
        assert_eq!(race.discipline.as_deref(), Some("PLAT"));
        assert_eq!(race.duration, Some(125_400.0));
    }

    #[test]
    fn test_unit_views() {
        let race = Race {
            id: 1,
            pmu_id: "04062023R3C4".to_string(),
            date_string: "04062023".to_string(),
            meeting_number: 3,
            race_number: 4,
            name: None,
            venue: None,
            discipline: Some("PLAT".to_string()),
            length: 2100,
            length_unit: METRE.to_string(),
            duration: Some(125_400.0),
        };
        assert_eq!(race.duration_seconds(), Some(125.4));

        let participant = Participant {
            id: 1,
            race_id: 1,
            race_pmu_id: race.pmu_id.clone(),
            horse_id: 1,
            horse_name: "ACE IMPACT".to_string(),
            rank: Some(1),
            number: Some(7),
            speed: Some(2100.0 / 125_400.0),
        };
        let mps = participant.speed_mps().unwrap();
        assert!((mps - 2100.0 / 125.4).abs() < 1e-9);
    }
}
