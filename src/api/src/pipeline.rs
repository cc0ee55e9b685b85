//! Moves one stored program from the document store into the relational store.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::identifiers::{date_string_from_date, race_key};
use crate::service::DataService;
use crate::storage::ScrapedDataService;

/// Outcome of normalizing a program
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeSummary {
    pub saved: usize,
    /// Races without a stored participants document
    pub skipped: usize,
    pub failed: usize,
}

/// Save every race of the program stored for `program_date`.
///
/// Each race is saved in its own transaction: a failing race is logged and
/// counted, the others are still saved.
pub fn normalize_program(
    documents: &ScrapedDataService,
    data: &DataService,
    program_date: NaiveDate,
) -> Result<NormalizeSummary> {
    let date_string = date_string_from_date(program_date);
    let program = documents.get_program(&date_string)?;
    let mut summary = NormalizeSummary::default();

    for meeting in &program.reunions {
        for race in &meeting.courses {
            let key = race_key(&date_string, race.num_reunion, race.num_ordre);

            let Some(participants) = documents.get_participants(&key)? else {
                warn!("No participants stored for {}, skipping", key);
                summary.skipped += 1;
                continue;
            };
            let detailed_perf = documents
                .get_participants_detailed_perf(&key)?
                .map(|doc| doc.participants)
                .unwrap_or_default();

            match data.save_race(
                race,
                &participants.participants,
                &detailed_perf,
                meeting,
                program_date,
            ) {
                Ok(saved) => {
                    info!("Race {} normalized", saved.pmu_id);
                    summary.saved += 1;
                }
                Err(e) => {
                    error!("Failed to save race {}: {}", key, e);
                    summary.failed += 1;
                }
            }
        }
    }

    info!(
        "Program {} normalized: {} saved, {} skipped, {} failed",
        date_string, summary.saved, summary.skipped, summary.failed
    );
    Ok(summary)
}
