//! Raw PMU payloads as scraped.
//!
//! Only the fields the pipeline reads are mapped; everything else in the
//! scraped JSON is kept untouched in the document store.

use serde::{Deserialize, Serialize};

/// One day's program: meetings (`reunions`) holding races (`courses`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawProgram {
    #[serde(default)]
    pub reunions: Vec<RawMeeting>,
}

/// Meeting metadata: one venue on one date
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawMeeting {
    #[serde(default)]
    pub num_officiel: Option<u32>,
    #[serde(default, rename = "disciplinesMere")]
    pub disciplines_mere: Vec<String>,
    #[serde(default)]
    pub hippodrome: Option<RawVenue>,
    #[serde(default)]
    pub courses: Vec<RawRace>,
}

impl RawMeeting {
    /// Parent discipline of the meeting ("TROT", "PLAT", "OBSTACLE", ...)
    pub fn discipline(&self) -> Option<&str> {
        self.disciplines_mere.first().map(String::as_str)
    }

    pub fn venue(&self) -> Option<&str> {
        self.hippodrome.as_ref()?.libelle_long.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawVenue {
    #[serde(default)]
    pub libelle_long: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawRace {
    pub num_reunion: u32,
    pub num_ordre: u32,
    #[serde(default)]
    pub libelle: Option<String>,
    pub distance: u32,
    pub distance_unit: String,
    /// Winner's time in milliseconds
    #[serde(default)]
    pub duree_course: Option<u64>,
    #[serde(default)]
    pub discipline: Option<String>,
}

/// Participants document for one race
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawParticipants {
    #[serde(default)]
    pub participants: Vec<RawParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawParticipant {
    pub nom: String,
    pub age: i32,
    #[serde(default)]
    pub num_pmu: Option<u32>,
    /// Finishing rank, absent when the horse did not finish
    #[serde(default)]
    pub ordre_arrivee: Option<u32>,
    /// Elapsed time in milliseconds (trotting only)
    #[serde(default)]
    pub temps_obtenu: Option<u64>,
    #[serde(default)]
    pub distance_cheval_precedent: Option<RawDistance>,
}

impl RawParticipant {
    pub fn distance_label(&self) -> Option<&str> {
        self.distance_cheval_precedent
            .as_ref()?
            .libelle_court
            .as_deref()
    }

    /// Elapsed time as published
    pub fn elapsed_time(&self) -> Option<f64> {
        self.temps_obtenu.map(|t| t as f64)
    }
}

/// Distance behind the previous horse, e.g. `{"libelleCourt": "1 Lon 1/2"}`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawDistance {
    #[serde(default)]
    pub libelle_court: Option<String>,
}

/// Detailed performances document for one race
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawDetailedPerfs {
    #[serde(default)]
    pub participants: Vec<RawDetailedPerf>,
}

/// Race history of one runner
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawDetailedPerf {
    #[serde(default)]
    pub courses_courues: Vec<RawPastRace>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawPastRace {
    #[serde(default)]
    pub participants: Vec<RawPastRunner>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawPastRunner {
    #[serde(default)]
    pub nom_jockey: Option<String>,
    #[serde(default)]
    pub poids_jockey: Option<f64>,
}
