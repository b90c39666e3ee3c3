//! Koyu - Terminology-Preserving Transcript Translation
//!
//! This is the main entry point for the koyu command line tool, which
//! standardizes domain terminology in meeting transcripts and translates
//! them into four target languages while keeping the terminology intact,
//! using an Ollama-compatible generation endpoint.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use koyu::cli::{Args, Commands};
use koyu::config::Config;
use koyu::error::KoyuError;
use koyu::language::{parse_language_list, Language};
use koyu::matcher::TermMatcher;
use koyu::terminology::TermTable;
use koyu::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    info!("Starting koyu terminology-preserving translation");

    // Load configuration
    let config = Config::load_or_default(args.config.as_deref())?;

    // Execute command
    match args.command {
        Commands::Process {
            input,
            languages,
            output_dir,
        } => {
            info!("Processing transcript file: {}", input.display());

            let languages = parse_language_list(&languages)?;
            let workflow = Workflow::new(config)?;
            workflow.check_models().await?;

            let reports = workflow
                .process_file(&input, &languages, output_dir.as_deref())
                .await?;

            println!("\nCompleted Languages:");
            println!(
                "{:<14} {:<10} {:<10} {:<50}",
                "Language", "Pattern", "Detected", "Transcript"
            );
            println!("{}", "-".repeat(84));
            for report in &reports {
                println!(
                    "{:<14} {:<10} {:<10} {:<50}",
                    report.language.code(),
                    report.pattern_occurrences,
                    report.detected_terms,
                    report.transcript_path.display()
                );
            }
        }
        Commands::Batch {
            input_dir,
            languages,
            output_dir,
        } => {
            info!("Processing directory: {}", input_dir.display());

            let languages = parse_language_list(&languages)?;
            let workflow = Workflow::new(config)?;
            workflow.check_models().await?;

            workflow
                .process_directory(&input_dir, &languages, output_dir.as_deref())
                .await?;
        }
        Commands::Detect { input, language } => {
            info!("Running pattern detection on: {}", input.display());

            let language: Language = language.parse()?;
            let table = TermTable::load_dir(&config.terminology.dir)?;
            let matcher = TermMatcher::new(&table, language)?;

            let text = tokio::fs::read_to_string(&input).await?;
            let outcome = matcher.apply(&text);

            println!(
                "Detected {} occurrences for {} in {:.2}s",
                outcome.occurrences.len(),
                language.code(),
                outcome.elapsed.as_secs_f64()
            );
            for (idx, term) in outcome.occurrences.iter().enumerate() {
                println!("{}. {}", idx + 1, term);
            }

            if !outcome.detections.is_empty() {
                println!("\nDistinct Terms:");
                println!("{:<30} {:<8} {:<20}", "Term", "Count", "Category");
                println!("{}", "-".repeat(58));
                for detection in &outcome.detections {
                    println!(
                        "{:<30} {:<8} {:<20}",
                        detection.replacement,
                        detection.count,
                        detection.category.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Terms => {
            let table = TermTable::load_dir(&config.terminology.dir)?;

            println!("\nTerminology Table ({} entries):", table.len());
            println!("{:<28} {:<18} {:<40}", "English", "Category", "Surface Forms");
            println!("{}", "-".repeat(86));
            for entry in table.entries() {
                println!(
                    "{:<28} {:<18} {:<40}",
                    entry.canonical_key().unwrap_or("-"),
                    entry.category.as_deref().unwrap_or("-"),
                    entry.variants_longest_first().join(", ")
                );
            }
        }
        Commands::Init { path } => {
            if path.exists() {
                return Err(KoyuError::Config(format!(
                    "Refusing to overwrite existing file: {}",
                    path.display()
                ))
                .into());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    info!("koyu completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let koyu_dir = std::env::current_dir()?.join(".koyu");
    let log_dir = koyu_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "koyu.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("koyu.log").display()
    );

    Ok(())
}
