//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, RunCommand, SelectCommand, ValidateCommand};
use std::ffi::OsString;

/// Minimal CI job runner
#[derive(Debug, Parser, Clone)]
#[command(name = "jobrunner")]
#[command(version)]
#[command(about = "Select a runner, run job steps and publish artifacts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Don't echo step output to the terminal
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a job
    Run(RunCommand),

    /// Validate a job configuration
    Validate(ValidateCommand),

    /// Print the runner class a job would be dispatched to
    Select(SelectCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
