//! CLI argument parsing for stagequeue

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::task::Stage;

#[derive(Parser, Debug)]
#[command(name = "stagequeue")]
#[command(author, version, about = "Replay a per-stage dispatcher against synthetic tensors", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive one dispatcher through synthetic iterations and print the emission order
    Replay {
        /// Pipeline stage to instantiate
        #[arg(short, long, default_value = "push")]
        stage: Stage,

        /// Training iterations to replay
        #[arg(short, long, default_value = "1")]
        iterations: usize,

        /// Partitions per tensor
        #[arg(short, long, default_value = "1")]
        partitions: usize,

        /// Bytes per partition
        #[arg(short, long, default_value = "1024")]
        len: u64,

        /// Dispatched tasks kept in flight
        #[arg(short, long, default_value = "2")]
        depth: usize,

        /// Seed for the submission shuffle
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tensor count when the config has no schedule
        #[arg(short, long, default_value = "8")]
        tensors: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a config file
    Check {
        /// Config file to validate
        #[arg(required = true)]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
