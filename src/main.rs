// src/main.rs
//! Run Tracker - record runs from a GPS source and keep a run history

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use run_tracker::{
    config::TrackerConfig,
    display::{self, TerminalDisplay},
    identity::{DirectoryIdentity, Identity, UsernameDirectory},
    leaderboard,
    location::{self, serial::list_serial_ports, FixSource},
    store::{JsonFileRunStore, RunFilter, RunStore},
    tracker::RunTracker,
    AccuracyTier, RunRecord, TrackerError,
};
use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "run-tracker")]
#[command(about = "Record runs from a GPS source and keep a run history", long_about = None)]
struct Cli {
    /// Use this config file instead of ~/.config/run-tracker/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this run store instead of the configured one
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a run
    Track(TrackArgs),
    /// List runs of a user, newest first
    History {
        /// User id (defaults to the configured user)
        #[arg(long)]
        user: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Total distance per user
    Leaderboard {
        #[arg(long)]
        json: bool,
    },
    /// List available serial ports
    Ports,
    /// Show or save the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration (including --user/--source flags) to disk
    Save(TrackArgs),
}

#[derive(Args, Clone, Default)]
struct TrackArgs {
    /// gpsd, serial, windows or replay
    #[arg(long)]
    source: Option<String>,
    /// JSON file of coordinates to replay (implies --source replay)
    #[arg(long)]
    replay: Option<PathBuf>,
    #[arg(long)]
    gpsd_host: Option<String>,
    #[arg(long)]
    gpsd_port: Option<u16>,
    /// Serial port of an NMEA receiver (implies --source serial)
    #[arg(long)]
    serial_port: Option<String>,
    #[arg(long, default_value_t = 9600)]
    baudrate: u32,
    /// low, balanced, high or best
    #[arg(long)]
    accuracy: Option<AccuracyTier>,
    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    duration: Option<u64>,
    /// Don't ask before stopping
    #[arg(long, short)]
    yes: bool,
    /// User id the run is saved for
    #[arg(long)]
    user: Option<String>,
    /// Display name saved with the run
    #[arg(long)]
    username: Option<String>,
}

impl TrackArgs {
    fn apply(&self, config: &mut TrackerConfig) {
        if let Some(source) = &self.source {
            config.update_source(source);
        }
        if let Some(file) = &self.replay {
            config.update_replay(file.clone());
        }
        if let Some(port) = &self.serial_port {
            config.update_serial(port.clone(), self.baudrate);
        }
        if self.gpsd_host.is_some() || self.gpsd_port.is_some() {
            let host = self
                .gpsd_host
                .clone()
                .or_else(|| config.gpsd_host.clone())
                .unwrap_or_else(|| "localhost".to_string());
            let port = self.gpsd_port.or(config.gpsd_port).unwrap_or(2947);
            config.update_gpsd(host, port);
        }
        if let Some(accuracy) = self.accuracy {
            config.accuracy = accuracy;
        }
        if let Some(user) = &self.user {
            config.update_user(user.clone(), self.username.clone());
        } else if let Some(name) = &self.username {
            config.username = Some(name.clone());
        }
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load_from(path)?,
        None => TrackerConfig::load().unwrap_or_else(|e| {
            warn!("Using default configuration: {}", e);
            TrackerConfig::default()
        }),
    };
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }

    match cli.command {
        Commands::Track(args) => {
            args.apply(&mut config);
            config.validate()?;
            track(config, args).await
        }
        Commands::History { user, json } => {
            let store = open_store(&config).await?;
            let user = user
                .or_else(|| config.user_id.clone())
                .context("No user given and none configured (use --user)")?;
            let runs = leaderboard::history(&store.runs(&RunFilter::All), &user);
            if json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else if runs.is_empty() {
                println!("No recorded runs");
            } else {
                println!("{:<20} {:>10} {:>12} {:>10}", "Date", "Distance", "Duration", "Avg km/h");
                for run in runs {
                    println!(
                        "{:<20} {:>7.2} km {:>12} {:>10.2}",
                        run.date.format("%Y-%m-%d %H:%M"),
                        run.distance_km,
                        run.duration,
                        run.average_speed_kmh
                    );
                }
            }
            Ok(())
        }
        Commands::Leaderboard { json } => {
            let store = open_store(&config).await?;
            let board = leaderboard::leaderboard(&store.runs(&RunFilter::All));
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
            } else if board.is_empty() {
                println!("No recorded runs");
            } else {
                println!("Leaderboard");
                for (rank, entry) in board.iter().enumerate() {
                    println!(
                        "{:>3}. {:<20} {:>8.2} km ({} runs)",
                        rank + 1,
                        entry.username,
                        entry.total_distance_km,
                        entry.runs
                    );
                }
            }
            Ok(())
        }
        Commands::Ports => {
            let ports = list_serial_ports()?;
            if ports.is_empty() {
                println!("No serial ports found.");
            } else {
                println!("Available serial ports:");
                for (name, kind) in ports {
                    println!("  {} - {}", name, kind);
                }
            }
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Save(args) => {
                args.apply(&mut config);
                config.validate()?;
                let path = match &cli.config {
                    Some(path) => {
                        config.save_to(path)?;
                        path.clone()
                    }
                    None => config.save()?,
                };
                println!("Configuration saved to {}", path.display());
                Ok(())
            }
        },
    }
}

async fn open_store(config: &TrackerConfig) -> anyhow::Result<JsonFileRunStore> {
    let path = config.resolved_store_path()?;
    JsonFileRunStore::open(&path)
        .await
        .with_context(|| format!("Failed to open run store {}", path.display()))
}

/// Record one run: start, show progress, stop on request, save
async fn track(config: TrackerConfig, args: TrackArgs) -> anyhow::Result<()> {
    let sampler = location::open_sampler(FixSource::from_config(&config)?, config.fix_max_age_secs)?;
    let store: Arc<dyn RunStore> = Arc::new(open_store(&config).await?);

    let directory = Arc::new(UsernameDirectory::from_runs(&store.runs(&RunFilter::All)));
    let identity = DirectoryIdentity::new(Arc::clone(&directory));
    match &config.user_id {
        Some(id) => {
            if let Some(name) = &config.username {
                directory.register(id.clone(), name.clone());
            }
            identity.sign_in(id.clone());
        }
        None => warn!("No user configured, the run will not be saved (use --user)"),
    }
    let runner = config
        .user_id
        .as_deref()
        .and_then(|id| directory.lookup(id))
        .unwrap_or_else(|| "anonymous".to_string());
    let identity: Arc<dyn Identity> = Arc::new(identity);

    let mut tracker = RunTracker::new(sampler, identity, Arc::clone(&store), config.tracker_settings());
    if let Err(e) = tracker.start().await {
        if matches!(e, TrackerError::PermissionDenied(_)) {
            eprintln!("Location access was denied; cannot record a run.");
        }
        return Err(e.into());
    }

    let display = TerminalDisplay::new(tracker.sampler_name().to_string(), runner);
    let mut deadline = args.duration.map(Duration::from_secs);

    loop {
        let trigger = stop_trigger(deadline.take());
        if display::is_interactive() {
            display.run(tracker.subscribe(), trigger).await?;
        } else {
            trigger.await;
        }

        tracker.request_stop()?;
        if args.yes || confirm("Stop and save this run? [y/N] ").await? {
            break;
        }
        tracker.cancel_stop()?;
        info!("Stop cancelled, still recording");
    }

    let saved = store.stream_runs(RunFilter::All).into_live();
    match tracker.confirm_stop().await {
        Ok(record) => {
            print_record(&record);
            wait_for_save(saved, &record).await;
            Ok(())
        }
        Err(TrackerError::NotAuthenticated) => {
            eprintln!("Not signed in; the run was discarded.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves at the deadline (if any) or on Ctrl+C
async fn stop_trigger(deadline: Option<Duration>) {
    match deadline {
        Some(after) => {
            tokio::select! {
                _ = tokio::time::sleep(after) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Ask on stdin. End of input or Ctrl+C during the prompt count as yes, so an
/// unattended run still stops and saves.
async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("\n{}", prompt);
    std::io::stdout().flush()?;

    // A plain thread, not the blocking pool: a read left pending must not hold
    // up runtime shutdown.
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let answer = std::io::stdin().read_line(&mut line).map(|read| (read, line));
        let _ = tx.send(answer);
    });

    tokio::select! {
        answer = rx => {
            let (read, line) = answer.context("Prompt reader went away")??;
            Ok(answer_confirms(read, &line))
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            Ok(true)
        }
    }
}

fn answer_confirms(bytes_read: usize, line: &str) -> bool {
    if bytes_read == 0 {
        info!("No answer on stdin, stopping");
        return true;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// The write is fire-and-forget for the tracker, but the process should not
/// exit before it had a chance to land
async fn wait_for_save(mut saved: run_tracker::store::RunStream, record: &RunRecord) {
    let landed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(run) = saved.next().await {
            if run == *record {
                return true;
            }
        }
        false
    })
    .await;

    if !matches!(landed, Ok(true)) {
        eprintln!("Warning: the run may not have been saved.");
    }
}

fn print_record(record: &RunRecord) {
    println!();
    println!("Run finished for {}", record.username);
    println!("  Date:      {}", record.date.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Distance:  {:.2} km", record.distance_km);
    println!("  Duration:  {}", record.duration);
    println!("  Avg speed: {:.2} km/h", record.average_speed_kmh);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_confirms() {
        assert!(answer_confirms(2, "y\n"));
        assert!(answer_confirms(4, "YES\n"));
        assert!(!answer_confirms(2, "n\n"));
        assert!(!answer_confirms(1, "\n"));
    }

    #[test]
    fn test_end_of_input_stops() {
        assert!(answer_confirms(0, ""));
    }

    #[test]
    fn test_track_flags_override_config() {
        let cli = Cli::parse_from([
            "run-tracker",
            "track",
            "--user",
            "u1",
            "--username",
            "alice",
            "--serial-port",
            "/dev/ttyUSB0",
            "--accuracy",
            "high",
            "--duration",
            "60",
        ]);
        let Commands::Track(args) = cli.command else {
            panic!("expected track");
        };

        let mut config = TrackerConfig::platform_default();
        args.apply(&mut config);
        assert_eq!(config.source_type, "serial");
        assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.accuracy, AccuracyTier::High);
        assert_eq!(config.user_id.as_deref(), Some("u1"));
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(args.duration, Some(60));
    }
}
