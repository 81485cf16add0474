use anyhow::Result;
use artemis_core::Coordinate;
use artemis_core::catalog::read_catalog_csv;
use artemis_core::config::AppConfig;
use artemis_core::database::Database;
use artemis_core::feed::FeedClient;
use artemis_core::models::{MatchCandidate, MobDefinition, SpawnRecord, SyncOptions};
use artemis_core::session::SessionStore;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(
    name = "artemis",
    version = "0.1.0",
    about = "Spawn import, mob matching and session reports for the Artemis hunting tracker",
    long_about = None
)]
struct Cli {
    /// Path to the spawn/mob SQLite database (overrides config)
    #[arg(long, global = true, env = "ARTEMIS_DATABASE")]
    database: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "ARTEMIS_CONFIG")]
    config: Option<PathBuf>,

    /// Path to log file
    #[arg(long, global = true, default_value = "/tmp/artemis-tools.log")]
    log_file: PathBuf,

    /// Verbosity level (repeat for more verbose output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the community spawn feed into the database
    SyncSpawns {
        /// Feed URL (overrides config)
        #[arg(long)]
        url: Option<String>,
        /// Request timeout in seconds (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Delete stored spawns that are no longer in the feed
        #[arg(long, default_value_t = false)]
        prune: bool,
    },

    /// List spawns closest to a position
    Nearest {
        #[arg(long)]
        planet: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Only spawns whose name contains this text
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List catalog mobs whose HP explains observed values
    MatchHp {
        #[arg(long)]
        planet: Option<String>,
        /// Observed HP (repeat for several values)
        #[arg(long = "hp", required = true)]
        hp: Vec<f64>,
        /// Relative tolerance, e.g. 0.2 for +/-20%
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show HP candidates and nearby spawns for one unidentified mob
    Identify {
        #[arg(long)]
        planet: Option<String>,
        #[arg(long)]
        hp: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List spawns whose name contains a fragment
    FindSpawns {
        #[arg(long)]
        planet: Option<String>,
        #[arg(long)]
        name: String,
    },

    /// List catalog mobs whose name contains a fragment
    FindMobs {
        #[arg(long)]
        planet: Option<String>,
        #[arg(long)]
        name: String,
    },

    /// Load the mob catalog from a CSV file (name,hp,maturity,planet)
    ImportMobs {
        #[arg(long)]
        csv_path: PathBuf,
        /// Clear the catalog before importing
        #[arg(long, default_value_t = false)]
        replace: bool,
    },

    /// Summarize a hunting session from the tracker database
    SessionReport {
        /// Tracker database (overrides config)
        #[arg(long, env = "ARTEMIS_SESSIONS_DB")]
        sessions_db: Option<PathBuf>,
        /// Session to report on (default: most recent)
        #[arg(long)]
        session_id: Option<String>,
        /// Also list this many recent sessions
        #[arg(long, default_value_t = 0)]
        recent: usize,
        /// Number of GPS samples to print
        #[arg(long, default_value_t = 3)]
        gps_samples: usize,
    },
}

fn setup_logging(verbose: u8, log_file: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter_level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(filter_level.into());

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(Path::new(".")),
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("artemis.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::Layer::new().with_writer(std::io::stderr).with_ansi(true))
        .with(fmt::Layer::new().with_writer(non_blocking).with_ansi(false));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

fn print_spawn_candidates(candidates: &[MatchCandidate<SpawnRecord>]) {
    if candidates.is_empty() {
        println!("  No spawns with coordinates found");
        return;
    }
    for candidate in candidates {
        let spawn = &candidate.entity;
        let at = spawn.center.map(|c| c.to_string()).unwrap_or_default();
        println!(
            "  - {} at {} - {}m away [{} density]",
            spawn.name,
            at,
            candidate.rounded_score(),
            spawn.density.as_deref().unwrap_or("unknown")
        );
    }
}

fn print_mob_candidates(candidates: &[MatchCandidate<MobDefinition>]) {
    if candidates.is_empty() {
        println!("  No matches found; widen --tolerance or identify manually");
        return;
    }
    for candidate in candidates {
        let mob = &candidate.entity;
        println!(
            "  - {} {} ({} HP, off by {})",
            mob.name,
            mob.maturity.as_deref().unwrap_or(""),
            mob.hp,
            candidate.rounded_score()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = setup_logging(cli.verbose, &cli.log_file)?;

    info!("Starting artemis CLI");

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let db_path = cli.database.clone().unwrap_or_else(|| config.database.path.clone());

    match cli.command {
        Commands::SyncSpawns { url, timeout_secs, prune } => {
            let url = url.unwrap_or_else(|| config.feed.url.clone());
            let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.feed.timeout_secs));

            // Fetch before touching the database so a dead feed changes nothing
            let client = FeedClient::new(url, timeout)?;
            let feed = client.fetch().await?;

            let db = Database::new(&db_path)?;
            let options = SyncOptions { prune_missing: prune };
            let result = db.sync_spawns(&feed, &options)?;

            info!(
                "Spawn sync complete: {} inserted, {} skipped, {} pruned",
                result.inserted, result.skipped, result.pruned
            );
            println!("Inserted: {} spawn records", result.inserted);
            println!("Skipped: {} records (errors)", result.skipped);
            if prune {
                println!("Pruned: {} stale records", result.pruned);
            }
        }
        Commands::Nearest { planet, lon, lat, name, limit } => {
            let db = Database::new(&db_path)?;
            let planet = planet.unwrap_or_else(|| config.matching.planet.clone());
            let origin = Coordinate::new(lon, lat);
            let limit = limit.unwrap_or(config.matching.limit);

            let results = db.nearest_matching(&planet, origin, name.as_deref(), limit)?;
            println!("Top {} spawns near {} on {}:", limit, origin, planet);
            print_spawn_candidates(&results);
        }
        Commands::MatchHp { planet, hp, tolerance, limit } => {
            let db = Database::new(&db_path)?;
            let planet = planet.unwrap_or_else(|| config.matching.planet.clone());
            let tolerance = tolerance.unwrap_or(config.matching.tolerance);
            let limit = limit.unwrap_or(config.matching.limit);

            let mut observed = hp;
            observed.sort_by(|a, b| a.total_cmp(b));
            observed.dedup();

            for value in observed {
                let results = db.match_by_hp(&planet, value, tolerance, limit)?;
                println!(
                    "HP {} (+/-{:.0}% on {}):",
                    value,
                    tolerance * 100.0,
                    planet
                );
                print_mob_candidates(&results);
            }
        }
        Commands::Identify { planet, hp, lon, lat, tolerance, limit } => {
            let db = Database::new(&db_path)?;
            let planet = planet.unwrap_or_else(|| config.matching.planet.clone());
            let tolerance = tolerance.unwrap_or(config.matching.tolerance);
            let limit = limit.unwrap_or(config.matching.limit);
            let origin = Coordinate::new(lon, lat);

            let mobs = db.match_by_hp(&planet, hp, tolerance, limit)?;
            let spawns = db.nearest(&planet, origin, limit)?;

            println!("Catalog mobs matching {} HP:", hp);
            print_mob_candidates(&mobs);
            println!("Spawns near {}:", origin);
            print_spawn_candidates(&spawns);
        }
        Commands::FindSpawns { planet, name } => {
            let db = Database::new(&db_path)?;
            let planet = planet.unwrap_or_else(|| config.matching.planet.clone());

            let spawns = db.spawns_by_name(&planet, &name)?;
            if spawns.is_empty() {
                println!("No '{}' spawns found on {}", name, planet);
            } else {
                println!("Found {} '{}' spawn locations on {}:", spawns.len(), name, planet);
            }
            for spawn in spawns {
                let at = spawn
                    .center
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "(no coordinates)".to_string());
                let seen = spawn
                    .first_seen()
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!(
                    "  - {} at {} [{} density] first seen {}",
                    spawn.name,
                    at,
                    spawn.density.as_deref().unwrap_or("unknown"),
                    seen
                );
            }
        }
        Commands::FindMobs { planet, name } => {
            let db = Database::new(&db_path)?;
            let planet = planet.unwrap_or_else(|| config.matching.planet.clone());

            let mobs = db.mobs_by_name(&planet, &name)?;
            if mobs.is_empty() {
                println!("No '{}' mobs found on {}", name, planet);
            }
            for mob in mobs {
                println!("  {} {}: {} HP", mob.name, mob.maturity.as_deref().unwrap_or(""), mob.hp);
            }
        }
        Commands::ImportMobs { csv_path, replace } => {
            if !csv_path.exists() {
                anyhow::bail!("CSV file not found: {:?}", csv_path);
            }

            info!("Reading mob catalog from {:?}", csv_path);
            let (entries, bad_rows) = read_catalog_csv(&csv_path)?;

            let db = Database::new(&db_path)?;
            let summary = db.insert_mobs(&entries, replace)?;

            println!("Imported: {} mobs", summary.imported);
            println!("Skipped: {} rows", summary.skipped + bad_rows);
        }
        Commands::SessionReport { sessions_db, session_id, recent, gps_samples } => {
            let Some(sessions_path) = sessions_db.or_else(|| config.database.sessions_path.clone()) else {
                anyhow::bail!("No session database given; pass --sessions-db or set database.sessions_path");
            };
            let store = SessionStore::open(&sessions_path)?;

            if recent > 0 {
                let sessions = store.recent_sessions(recent)?;
                println!("Found {} sessions", sessions.len());
                for session in sessions {
                    println!(
                        "  {} ({}): {}s, {} events, loadout {}",
                        session.name,
                        session.id,
                        session.duration_seconds,
                        session.event_count,
                        session.loadout_id.as_deref().unwrap_or("NONE")
                    );
                }
                println!();
            }

            let session_id = match session_id {
                Some(id) => id,
                None => match store.latest_session_id()? {
                    Some(id) => id,
                    None => {
                        println!("No sessions found");
                        return Ok(());
                    }
                },
            };

            let summary = store.summarize(&session_id)?;
            println!("Session: {}", summary.name);
            println!("  ID: {}", summary.session_id);
            println!("  Loadout: {}", summary.loadout_id.as_deref().unwrap_or("NONE"));
            println!("  Duration: {}s", summary.duration_seconds);

            if summary.has_stats {
                println!("Stats:");
                println!("  Kills: {}", summary.kill_count);
                println!("  Loot Value: {:.2} PED", summary.loot_value);
                println!("  Ammo Cost: {:.2} PED", summary.ammo_cost);
                println!("  Profit: {:.2} PED", summary.profit);
            } else {
                println!("No stats recorded for this session");
            }

            println!("Event Breakdown:");
            let mut counts: Vec<_> = summary.event_counts_by_type.iter().collect();
            counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (event_type, count) in counts {
                println!("  {}: {}", event_type, count);
            }
            println!("Total Events: {}", summary.total_events);
            println!("GPS Events: {}", summary.gps_sample_count);

            if summary.gps_sample_count > 0 && gps_samples > 0 {
                for (i, sample) in store.gps_samples(&session_id, gps_samples)?.iter().enumerate() {
                    println!("  GPS {}: lon={}, lat={}", i + 1, sample.lon, sample.lat);
                }
            }

            if let Some(loadout) = summary.loadout {
                println!("Loadout: {}", loadout.name);
                println!("  Use manual cost: {}", loadout.use_manual_cost);
                match loadout.manual_cost_override {
                    Some(cost) => println!("  Manual override: {} PED", cost),
                    None => println!("  Manual override: none"),
                }
                match loadout.total_per_shot {
                    Some(cost) => println!("  Total per shot: {} PED", cost),
                    None => println!("  Total per shot: no cost breakdown"),
                }
            }
        }
    }

    info!("Artemis CLI finished");
    Ok(())
}
