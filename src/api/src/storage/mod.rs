//! SQLite storage
//!
//! Two stores live here: the raw document store holding scraped payloads as
//! they were fetched, and the relational store holding normalized races,
//! horses, drivers and participants.

pub mod dao;
pub mod documents;
pub mod schema;
pub mod session;

pub use dao::{DriverDao, EntityStore, HorseDao, ParticipantDao, RaceDao};
pub use documents::ScrapedDataService;
pub use session::{RaceStream, RelationalStore};
