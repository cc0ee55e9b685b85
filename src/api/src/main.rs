//! PMU race data ingestion
//!
//! Stores scraped PMU programs and fields as raw documents, normalizes them
//! into races, horses, drivers and participants with derived speeds, and
//! serves the normalized data over a small read API.

mod cli;
mod config;
mod error;
mod identifiers;
mod payload;
mod pipeline;
mod routes;
mod service;
mod speed;
mod storage;
mod types;

use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::service::DataService;
use crate::storage::RelationalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmu_ingest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::ImportProgram { file, date } => cli::run_import_program(file, date),
        Commands::ImportParticipants {
            file,
            date,
            meeting,
            race,
            detailed,
        } => cli::run_import_participants(file, date, meeting, race, detailed),
        Commands::Latest => cli::run_latest(),
        Commands::SetLatest { date } => cli::run_set_latest(date),
        Commands::Programs => cli::run_programs(),
        Commands::Races { date } => cli::run_races(date),
        Commands::Normalize { date } => cli::run_normalize(date),
        Commands::Race {
            date,
            meeting,
            race,
            format,
        } => cli::run_race(date, meeting, race, format),
        Commands::Horse { name, format } => cli::run_horse(name, format),
        Commands::AllRaces => cli::run_all_races(),
        Commands::Stats => cli::run_stats(),
    }
}

/// Run the read API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    let store = RelationalStore::open(Path::new(&config.storage.relational_path))?;
    tracing::info!("Relational store: {}", store.path().display());
    let state = Arc::new(AppState {
        data: DataService::new(store).with_page_size(config.storage.page_size),
    });

    let app = routes::router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
