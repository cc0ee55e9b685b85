//! Race persistence and read paths over the relational store.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{DataError, Result};
use crate::identifiers::date_string_from_date;
use crate::payload::{RawDetailedPerf, RawMeeting, RawParticipant, RawRace};
use crate::speed::{arrival_rank, derive_speeds, SpeedBasis, SpeedInput};
use crate::storage::{
    DriverDao, EntityStore, HorseDao, ParticipantDao, RaceDao, RaceStream, RelationalStore,
};
use crate::types::{NewDriver, NewHorse, NewParticipant, NewRace, Participant, Race, METRE};

/// Races read per page by [`DataService::get_all_races`]
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Row counts of the relational store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub races: i64,
    pub horses: i64,
    pub drivers: i64,
    pub participants: i64,
}

/// Entry point for saving and querying normalized race data
#[derive(Debug, Clone)]
pub struct DataService {
    store: RelationalStore,
    page_size: usize,
}

impl DataService {
    pub fn new(store: RelationalStore) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Normalize and persist one race with its field, in a single transaction.
    ///
    /// Nothing is written when any step fails.
    pub fn save_race(
        &self,
        raw_race: &RawRace,
        raw_participants: &[RawParticipant],
        raw_participants_detailed_perf: &[RawDetailedPerf],
        meeting: &RawMeeting,
        program_date: NaiveDate,
    ) -> Result<Race> {
        let mut session = self.store.session()?;
        let tx = session.transaction()?;

        let race = save_race_in(
            &*tx,
            raw_race,
            raw_participants,
            raw_participants_detailed_perf,
            meeting,
            program_date,
        )?;

        tx.commit()?;
        Ok(race)
    }

    pub fn get_race(
        &self,
        date_string: &str,
        meeting_id: u32,
        race_id: u32,
    ) -> Result<Option<Race>> {
        let session = self.store.session()?;
        RaceDao::get_by_pmu_id(&session, date_string, meeting_id, race_id)
    }

    /// Field of a persisted race in arrival order
    pub fn get_race_participants(&self, race: &Race) -> Result<Vec<Participant>> {
        let session = self.store.session()?;
        ParticipantDao::get_for_race(&session, race.id)
    }

    pub fn get_participations_for_horse(&self, horse_name: &str) -> Result<Vec<Participant>> {
        let session = self.store.session()?;
        let horse = HorseDao::get_by_name(&session, horse_name)?
            .ok_or_else(|| DataError::not_found(format!("horse {}", horse_name)))?;
        ParticipantDao::get_for_horse(&session, horse.id)
    }

    /// Every persisted race, read lazily.
    ///
    /// The returned stream holds its own session until it is drained or
    /// dropped.
    pub fn get_all_races(&self) -> Result<RaceStream> {
        Ok(RaceStream::new(self.store.session()?, self.page_size))
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let session = self.store.session()?;
        Ok(StoreStats {
            races: RaceDao::count(&session)?,
            horses: HorseDao::count(&session)?,
            drivers: DriverDao::count(&session)?,
            participants: ParticipantDao::count(&session)?,
        })
    }
}

/// Participants in arrival order; unranked ones keep their input order after
/// every ranked participant
pub fn arrival_order(raw_participants: &[RawParticipant]) -> Vec<&RawParticipant> {
    let mut sorted: Vec<&RawParticipant> = raw_participants.iter().collect();
    sorted.sort_by_key(|p| arrival_rank(p.ordre_arrivee));
    sorted
}

/// Build and persist one race on the given store.
pub fn save_race_in<S: EntityStore + ?Sized>(
    store: &S,
    raw_race: &RawRace,
    raw_participants: &[RawParticipant],
    raw_participants_detailed_perf: &[RawDetailedPerf],
    meeting: &RawMeeting,
    program_date: NaiveDate,
) -> Result<Race> {
    let date_string = date_string_from_date(program_date);
    let new_race = NewRace::from_payload(raw_race, meeting, &date_string);
    let pmu_id = new_race.pmu_id();

    let discipline = meeting.discipline().ok_or_else(|| {
        DataError::validation(format!("meeting of race {} has no discipline", pmu_id))
    })?;
    info!(
        "Dealing with {} - {} - {}",
        pmu_id,
        discipline,
        meeting.venue().unwrap_or("unknown venue")
    );

    if new_race.length_unit != METRE {
        return Err(DataError::validation(format!(
            "unsupported race length unit for {}: {}",
            pmu_id, new_race.length_unit
        )));
    }

    let race = store.save_race(&new_race)?;
    info!("Race {} saved with id {}", race.pmu_id, race.id);

    let participants = arrival_order(raw_participants);
    let inputs: Vec<SpeedInput<'_>> = participants
        .iter()
        .map(|p| SpeedInput {
            rank: p.ordre_arrivee,
            elapsed: p.elapsed_time(),
            distance_behind: p.distance_label(),
        })
        .collect();
    let speeds = derive_speeds(
        SpeedBasis::for_discipline(discipline),
        f64::from(race.length),
        race.duration,
        &inputs,
    );

    for (raw_participant, speed) in participants.into_iter().zip(speeds) {
        let birth_year = program_date.year() - raw_participant.age;
        let horse = store.save_horse(&NewHorse::from_payload(raw_participant, birth_year))?;
        info!("Horse {} saved with id {}", horse.name, horse.id);

        let participant = store.save_participant(&NewParticipant::from_payload(
            raw_participant,
            race.id,
            horse.id,
            speed,
        ))?;
        info!(
            "Saving {} for race {} - Rank: {:?} - speed: {:?}",
            participant.horse_name, race.pmu_id, participant.rank, participant.speed
        );
        if participant.speed.is_none() {
            warn!("Speed was not defined for horse {}", participant.horse_name);
        }
    }

    save_drivers(store, raw_participants_detailed_perf)?;

    Ok(race)
}

/// Save every jockey found in the detailed performances. Drivers are not
/// linked to the race being saved.
fn save_drivers<S: EntityStore + ?Sized>(store: &S, perfs: &[RawDetailedPerf]) -> Result<usize> {
    let runners = perfs
        .iter()
        .flat_map(|perf| &perf.courses_courues)
        .flat_map(|past_race| &past_race.participants);

    let mut saved = 0;
    for runner in runners {
        let Some(weight) = runner.poids_jockey else {
            continue;
        };
        let Some(name) = runner.nom_jockey.as_deref() else {
            warn!("Jockey weight {} without a jockey name, skipped", weight);
            continue;
        };

        let driver = store.save_driver(&NewDriver {
            name: name.to_string(),
            weight,
        })?;
        info!("Driver {} saved with id {}", driver.name, driver.id);
        saved += 1;
    }

    Ok(saved)
}
