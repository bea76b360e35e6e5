//! Command-line interface for supaman.
//!
//! This module provides the CLI structure for the `supaman` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DispatchCommand, ListCommand, OutputFormat, RunCommand, TailCommand,
};

/// supaman - Mission control for the SupaMan crew
///
/// Shows a live feed of missions stored in a Supabase-compatible backend and
/// dispatches new ones.
#[derive(Debug, Parser)]
#[command(name = "supaman")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the live mission dashboard
    Run(RunCommand),

    /// Print the current missions once
    List(ListCommand),

    /// Dispatch a new mission
    Dispatch(DispatchCommand),

    /// Print missions as they are inserted
    Tail(TailCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Command {
    /// Whether this command talks to the backend.
    #[must_use]
    pub fn needs_backend(&self) -> bool {
        match self {
            Self::Run(run) => !run.offline,
            Self::List(_) | Self::Dispatch(_) | Self::Tail(_) => true,
            Self::Config(_) => false,
        }
    }
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
