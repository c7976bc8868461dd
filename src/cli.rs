use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "framegrid")]
#[command(author, version, about = "Detection pipeline orchestration and subject job tracking")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a batch of detection jobs and a subject job over their results
    Run {
        /// Run file (JSON) describing the detection jobs and the subject submission
        #[arg(required = true)]
        jobs: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Convert node manager configuration between JSON and XML
    Nodes {
        /// Input file (.json or .xml)
        #[arg(required = true)]
        input: PathBuf,

        /// Output file (.json or .xml); omit to validate the input only
        output: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
