//! CLI commands for pmu-ingest.
//!
//! Covers importing scraped payloads, normalizing them, querying both stores
//! and serving the read API.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::identifiers::{date_string_from_date, parse_date_string};
use crate::pipeline::normalize_program;
use crate::service::DataService;
use crate::storage::{RelationalStore, ScrapedDataService};
use crate::types::{Participant, Race};

#[derive(Parser)]
#[command(name = "pmu-ingest")]
#[command(version, about = "PMU race data ingestion and normalization", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the read API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Store a scraped program JSON file
    ImportProgram {
        /// Path to the program JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Program date (ddMMyyyy)
        #[arg(short, long)]
        date: String,
    },

    /// Store a scraped participants JSON file for one race
    ImportParticipants {
        /// Path to the participants JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Program date (ddMMyyyy)
        #[arg(short, long)]
        date: String,

        /// Meeting number
        #[arg(short, long)]
        meeting: u32,

        /// Race number within the meeting
        #[arg(short, long)]
        race: u32,

        /// File holds detailed performances instead of the field
        #[arg(long)]
        detailed: bool,
    },

    /// Print the latest scraped date
    Latest,

    /// Record the latest scraped date
    SetLatest {
        /// Date (ddMMyyyy)
        date: String,
    },

    /// List the stored programs
    Programs,

    /// List the races of a stored program
    Races {
        /// Program date (ddMMyyyy)
        #[arg(short, long)]
        date: String,
    },

    /// Normalize every race of a stored program into the relational store
    Normalize {
        /// Program date (ddMMyyyy)
        #[arg(short, long)]
        date: String,
    },

    /// Show a normalized race and its field
    Race {
        /// Program date (ddMMyyyy)
        #[arg(short, long)]
        date: String,

        /// Meeting number
        #[arg(short, long)]
        meeting: u32,

        /// Race number within the meeting
        #[arg(short, long)]
        race: u32,

        /// Output format (json, table)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Show every run of a horse
    Horse {
        /// Horse name
        name: String,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Stream every normalized race
    AllRaces,

    /// Print row counts of the relational store
    Stats,
}

fn open_documents(config: &AppConfig) -> anyhow::Result<ScrapedDataService> {
    let path = Path::new(&config.storage.documents_path);
    ScrapedDataService::open(path)
        .with_context(|| format!("Failed to open document store {}", path.display()))
}

fn open_data(config: &AppConfig) -> anyhow::Result<DataService> {
    let path = Path::new(&config.storage.relational_path);
    let store = RelationalStore::open(path)
        .with_context(|| format!("Failed to open relational store {}", path.display()))?;
    Ok(DataService::new(store).with_page_size(config.storage.page_size))
}

fn read_json(file: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", file.display()))
}

/// Store a program document.
pub fn run_import_program(file: PathBuf, date: String) -> anyhow::Result<()> {
    parse_date_string(&date)?;
    let config = AppConfig::load()?;
    let documents = open_documents(&config)?;

    let program = read_json(&file)?;
    let id = documents
        .save_program(program, &date)
        .with_context(|| format!("Failed to store program {}", date))?;

    eprintln!("Program {} stored (document {})", date, id);
    Ok(())
}

/// Store a participants or detailed-performance document.
pub fn run_import_participants(
    file: PathBuf,
    date: String,
    meeting: u32,
    race: u32,
    detailed: bool,
) -> anyhow::Result<()> {
    parse_date_string(&date)?;
    let config = AppConfig::load()?;
    let documents = open_documents(&config)?;

    let payload = read_json(&file)?;
    let id = if detailed {
        documents.save_participants_detailed_perf(payload, &date, meeting, race)
    } else {
        documents.save_participants(payload, &date, meeting, race)
    }
    .with_context(|| {
        format!(
            "Failed to store participants for R{}C{} on {}",
            meeting, race, date
        )
    })?;

    eprintln!("Participants stored (document {})", id);
    Ok(())
}

pub fn run_latest() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let documents = open_documents(&config)?;

    match documents.get_latest_scrapping()? {
        Some(date) => println!("{}", date_string_from_date(date)),
        None => eprintln!("No scrape recorded yet"),
    }
    Ok(())
}

pub fn run_set_latest(date: String) -> anyhow::Result<()> {
    let parsed = parse_date_string(&date)?;
    let config = AppConfig::load()?;
    let documents = open_documents(&config)?;

    documents.set_latest_scrapping(parsed)?;
    eprintln!("Latest scrape set to {}", date);
    Ok(())
}

/// List the stored programs by date.
pub fn run_programs() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let documents = open_documents(&config)?;

    let programs = documents.get_all_programs()?;

    println!();
    println!("=== Stored programs ({}) ===", programs.len());
    for program in &programs {
        let meetings = program["reunions"].as_array().map_or(0, Vec::len);
        println!(
            "  {}: {} meetings",
            program["date_string"].as_str().unwrap_or("?"),
            meetings
        );
    }
    println!();
    Ok(())
}

/// List the races of a stored program.
pub fn run_races(date: String) -> anyhow::Result<()> {
    parse_date_string(&date)?;
    let config = AppConfig::load()?;
    let documents = open_documents(&config)?;

    let races = documents.get_races_by_date(&date)?;

    println!();
    println!("=== Program {} ({} races) ===", date, races.len());
    println!("{:<14} {:<20} {:>6} {:<8} {}", "Race", "Discipline", "Length", "Unit", "Name");
    println!("{}", "-".repeat(70));
    for race in &races {
        println!(
            "{:<14} {:<20} {:>6} {:<8} {}",
            race.pmu_id(),
            race.discipline.as_deref().unwrap_or("-"),
            race.length,
            race.length_unit,
            race.name.as_deref().unwrap_or("")
        );
    }
    println!();
    Ok(())
}

/// Normalize a stored program and record it as the latest scrape.
pub fn run_normalize(date: String) -> anyhow::Result<()> {
    let program_date = parse_date_string(&date)?;
    let config = AppConfig::load()?;
    let documents = open_documents(&config)?;
    let data = open_data(&config)?;

    let summary = normalize_program(&documents, &data, program_date)
        .with_context(|| format!("Failed to normalize program {}", date))?;

    if summary.failed == 0 {
        documents.set_latest_scrapping(program_date)?;
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.failed > 0 {
        anyhow::bail!("{} race(s) failed to normalize", summary.failed);
    }
    Ok(())
}

/// Show a normalized race with its field.
pub fn run_race(date: String, meeting: u32, race: u32, format: String) -> anyhow::Result<()> {
    parse_date_string(&date)?;
    let config = AppConfig::load()?;
    let data = open_data(&config)?;

    let found = data
        .get_race(&date, meeting, race)?
        .with_context(|| format!("No normalized race R{}C{} on {}", meeting, race, date))?;
    let field = data.get_race_participants(&found)?;

    match format.as_str() {
        "table" => {
            print_race_header(&found);
            print_participant_table(&field);
        }
        _ => {
            let output = serde_json::json!({
                "race": found,
                "participants": field,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Show every run of a horse.
pub fn run_horse(name: String, format: String) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let data = open_data(&config)?;

    let runs = match data.get_participations_for_horse(&name) {
        Ok(runs) => runs,
        Err(e) if e.is_not_found() => {
            eprintln!("No horse named {}", name);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&runs)?),
        _ => {
            println!();
            println!("=== {} ({} runs) ===", name, runs.len());
            print_participant_table(&runs);
        }
    }
    Ok(())
}

/// Stream every normalized race as JSON lines.
pub fn run_all_races() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let data = open_data(&config)?;

    let mut stream = data.get_all_races()?;
    let mut count = 0usize;
    for race in stream.by_ref() {
        let race = race.context("Failed to read races")?;
        println!("{}", serde_json::to_string(&race)?);
        count += 1;
    }

    tracing::debug!("Race stream drained, session open: {}", stream.is_open());
    eprintln!("{} races", count);
    Ok(())
}

pub fn run_stats() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let data = open_data(&config)?;

    let stats = data.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn print_race_header(race: &Race) {
    println!();
    println!("=== {} {} ===", race.pmu_id, race.name.as_deref().unwrap_or(""));
    println!(
        "Venue: {}  Discipline: {}  Length: {} {}",
        race.venue.as_deref().unwrap_or("-"),
        race.discipline.as_deref().unwrap_or("-"),
        race.length,
        race.length_unit
    );
    if let Some(duration) = race.duration_seconds() {
        println!("Winner time: {:.2}s", duration);
    }
    println!();
}

fn print_participant_table(participants: &[Participant]) {
    println!(
        "{:<14} {:>4} {:>4} {:<24} {:>10}",
        "Race", "Rank", "No", "Horse", "Speed m/s"
    );
    println!("{}", "-".repeat(60));
    for p in participants {
        println!(
            "{:<14} {:>4} {:>4} {:<24} {:>10}",
            p.race_pmu_id,
            p.rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
            p.number.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
            p.horse_name,
            p.speed_mps()
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    println!();
}
