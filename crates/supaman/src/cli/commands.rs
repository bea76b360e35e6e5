//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Interactive dashboard arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Append pages instead of clearing the screen
    #[arg(long)]
    pub no_clear: bool,

    /// Use an in-process store instead of the backend
    #[arg(long)]
    pub offline: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Maximum number of missions to show
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Dispatch command arguments.
#[derive(Debug, Args)]
pub struct DispatchCommand {
    /// Mission title
    pub title: String,

    /// Mission details
    #[arg(short, long, default_value = "")]
    pub description: String,
}

/// Tail command arguments.
#[derive(Debug, Args)]
pub struct TailCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (the API key is redacted)
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_dispatch_command_debug() {
        let cmd = DispatchCommand {
            title: "Rescue cat".to_string(),
            description: String::new(),
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("title"));
        assert!(debug_str.contains("Rescue cat"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }

    #[test]
    fn test_output_format_debug() {
        let format = OutputFormat::Json;
        let debug_str = format!("{format:?}");
        assert_eq!(debug_str, "Json");
    }
}
