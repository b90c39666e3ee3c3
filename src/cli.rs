use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a single transcript file with terminology-preserving translation
    Process {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Target languages (comma-separated)
        #[arg(short, long, default_value = "zh,en,ja,de")]
        languages: String,

        /// Output directory for artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Process all .txt transcripts in a directory
    Batch {
        /// Input directory containing transcript files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Target languages (comma-separated)
        #[arg(short, long, default_value = "zh,en,ja,de")]
        languages: String,

        /// Output directory for artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Run the pattern matcher only and print the detection log
    Detect {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Target language
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// Load the terminology table and print a summary
    Terms,

    /// Write a default configuration file
    Init {
        /// Path for the generated configuration
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,
    },
}
