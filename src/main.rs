//! DriveTally - coursework submission tracker for Google Drive
//!
//! Lists the module folders under a Drive folder, works out which students
//! submitted files to each module and writes an Excel report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, Drive access, report writing, etc.)
//!   2 - The run produced warnings and --strict was set

mod analysis;
mod cli;
mod config;
mod drive;
mod error;
mod logsink;
mod models;
mod pipeline;
mod report;

use analysis::ClassRoster;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use drive::client::DriveAuth;
use drive::{collect_listing, DriveClient, FixtureSource, Listing, ListingSource, WalkOptions};
use indicatif::{ProgressBar, ProgressStyle};
use logsink::{ChannelSink, LogLine, LogSink, TracingSink};
use pipeline::student_key::HeuristicKeyStrategy;
use pipeline::{Pipeline, RunStatus};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration; general.verbose decides the log level
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("DriveTally v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    config_source.log();

    match run_tracker(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .drivetally.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the Drive folder, academy name, stop words and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete tracking workflow. Returns the exit code (0 or 2).
async fn run_tracker(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    if config.general.generated_by.trim().is_empty() {
        config.general.generated_by = current_user();
    }

    let strategy = HeuristicKeyStrategy::from_config(&config.resolver)
        .context("Invalid student name settings")?;

    let class_roster = match config.report.roster_file {
        Some(ref path) => {
            let roster = ClassRoster::load(path, &strategy)?;
            info!("Loaded {} students from {}", roster.len(), path.display());
            Some(roster)
        }
        None => None,
    };

    // Step 1: List the folder tree
    let (source, root_id) = build_source(&args, &config)?;

    let progress = (!args.quiet).then(listing_spinner);
    let live_log = LiveLog::new(args.quiet, progress.clone());

    println!("📂 Listing Drive folder: {}", root_id);

    let walk = WalkOptions {
        max_depth: config.drive.max_depth,
        progress: progress.clone(),
    };

    let listing = tokio::select! {
        result = collect_listing(source.as_ref(), &root_id, &walk, live_log.sink()) => result?,
        _ = tokio::signal::ctrl_c() => {
            if let Some(ref pb) = progress {
                pb.abandon_with_message("Cancelled");
            }
            anyhow::bail!("Cancelled while listing Drive folders");
        }
    };

    if let Some(ref path) = args.save_listing {
        drive::fixture::save_listing(&listing, path)?;
        println!("💾 Listing saved to: {}", path.display());
    }

    // Handle --dry-run: show the modules and exit
    if args.dry_run {
        drop(live_log);
        return handle_dry_run(&listing);
    }

    // Step 2: Process the listing
    println!("\n🔬 Tracking submissions...");

    let outcome = Pipeline::new(&config, &strategy)
        .with_class_roster(class_roster.as_ref())
        .run(&listing, Utc::now(), live_log.sink())
        .context("Report assembly failed")?;

    drop(live_log);

    // Step 3: Write the report
    let output = Path::new(&config.general.output);
    let sheets = report::to_sheets(&outcome.report, &config.report);
    report::sink_for(config.general.format)
        .write(&outcome.report, &sheets, output)
        .with_context(|| format!("Failed to save report to {}", output.display()))?;

    // Print summary
    let totals = &outcome.report.totals;
    println!("\n📊 Submission Summary:");
    println!(
        "   Modules: {} ({} with submissions)",
        totals.total_modules, totals.active_modules
    );
    println!("   Students: {}", totals.total_students);
    println!("   Files: {}", totals.total_files);
    if totals.unattributed_files > 0 {
        println!("   Files needing review: {}", totals.unattributed_files);
    }
    for row in &outcome.report.summary {
        println!(
            "   - {}: {}/{} students ({})",
            row.module_name, row.submitted_students, row.roster_size, row.completion_rate
        );
    }
    if !outcome.warnings.is_empty() {
        println!("   Warnings: {}", outcome.warnings.len());
        for warning in &outcome.warnings {
            println!("     ⚠️  {}", warning);
        }
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Report saved to: {}", output.display());

    match outcome.status {
        RunStatus::Completed => Ok(0),
        RunStatus::CompletedWithWarnings(n) => {
            warn!("Run finished with {} warnings", n);
            if args.strict {
                eprintln!("\n⛔ {} warnings and --strict is set. Failing (exit code 2).", n);
                Ok(2)
            } else {
                Ok(0)
            }
        }
    }
}

/// Handle --dry-run: print the modules found, write nothing.
fn handle_dry_run(listing: &Listing) -> Result<i32> {
    println!("\n🔍 Dry run: modules under {}\n", listing.root_id);

    let mut modules: Vec<(&str, usize)> = listing
        .entries
        .iter()
        .filter(|e| e.is_folder && e.parent_id.as_deref() == Some(listing.root_id.as_str()))
        .map(|module| {
            let files = listing
                .entries
                .iter()
                .filter(|e| !e.is_folder && e.parent_id.as_deref() == Some(module.id.as_str()))
                .count();
            (module.name.as_deref().unwrap_or(module.id.as_str()), files)
        })
        .collect();
    modules.sort_by(|a, b| analysis::aggregator::natural_cmp(a.0, b.0));

    if modules.is_empty() {
        println!("   No module folders found.");
    } else {
        for (name, files) in &modules {
            println!("     📁 {} ({} files)", name, files);
        }
        println!("\n   Total: {} modules, {} entries", modules.len(), listing.entries.len());
    }
    if !listing.failures.is_empty() {
        println!("   Folders that could not be listed: {}", listing.failures.len());
    }
    if !listing.unlisted.is_empty() {
        println!("   Folders past the depth limit: {}", listing.unlisted.len());
    }

    println!("\n✅ Dry run complete. No report was written.");
    Ok(0)
}

/// Where the configuration came from. Logged once tracing is set up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Unreadable(String),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults => debug!("No config file found, using defaults"),
            ConfigSource::Unreadable(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Unreadable(format!("{:#}", e)))),
    }
}

/// Pick the listing source: a fixture file or the Drive API.
fn build_source(args: &Args, config: &Config) -> Result<(Box<dyn ListingSource>, String)> {
    if let Some(ref path) = args.fixture {
        info!("Using fixture: {}", path.display());
        let source = FixtureSource::load(path)?;
        let root_id = source.root_id().to_string();
        return Ok((Box::new(source), root_id));
    }

    let root_id = config
        .drive
        .root_folder_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .context("No Drive folder given. Use --folder, DRIVE_FOLDER_ID or drive.root_folder_id")?;

    let auth = DriveAuth::from_config(&config.drive).context(
        "No Drive credentials. Set --access-token (DRIVE_ACCESS_TOKEN) or --api-key (DRIVE_API_KEY)",
    )?;

    let client = DriveClient::new(&config.drive, auth)?;
    Ok((Box::new(client), root_id))
}

fn listing_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} folders {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Progress lines for one run.
///
/// Lines go to a printer thread as `[HH:MM:SS] message`; quiet runs route
/// them to tracing instead. Dropping the log closes the channel and waits
/// for the printer, on error paths too.
struct LiveLog {
    sink: Box<dyn LogSink>,
    printer: Option<JoinHandle<()>>,
}

impl LiveLog {
    fn new(quiet: bool, progress: Option<ProgressBar>) -> Self {
        if quiet {
            return Self {
                sink: Box::new(TracingSink),
                printer: None,
            };
        }
        Self::spawn(progress, |line| eprintln!("{}", line))
    }

    fn spawn<F>(progress: Option<ProgressBar>, print: F) -> Self
    where
        F: Fn(&LogLine) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<LogLine>();
        let printer = std::thread::spawn(move || {
            for line in rx {
                match progress {
                    Some(ref pb) => pb.suspend(|| print(&line)),
                    None => print(&line),
                }
            }
        });

        Self {
            sink: Box::new(ChannelSink::new(tx)),
            printer: Some(printer),
        }
    }

    fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }
}

impl Drop for LiveLog {
    fn drop(&mut self) {
        // Replacing the sink drops the sender, which ends the printer loop
        self.sink = Box::new(TracingSink);
        if let Some(handle) = self.printer.take() {
            if handle.join().is_err() {
                warn!("Log printer thread panicked");
            }
        }
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "drivetally".to_string())
}
