//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind_address`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Serve the reserved DEMO snapshot alongside stored tags
    #[arg(long)]
    pub demo: bool,
}

/// Tag store commands.
#[derive(Debug, Subcommand)]
pub enum TagsCommand {
    /// List all stored tags
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the snapshot stored under a tag
    Show {
        /// Tag to load
        tag: String,
    },

    /// Store a snapshot file under a tag, replacing any previous one
    Save {
        /// Tag to store under
        tag: String,

        /// JSON file holding the snapshot
        file: PathBuf,
    },

    /// Delete a tag
    Delete {
        /// Tag to delete
        tag: String,
    },
}

/// Report command arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Tag of a stored snapshot
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub tag: Option<String>,

    /// Read the snapshot from a JSON file instead of the store
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Number of sources in the breakdown (overrides `report.top_n`)
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
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
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_tags_command_debug() {
        let cmd = TagsCommand::Show {
            tag: "q1-2024".to_string(),
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
        assert!(debug_str.contains("q1-2024"));
    }

    #[test]
    fn test_serve_command_debug() {
        let cmd = ServeCommand {
            bind: Some("0.0.0.0:3001".to_string()),
            demo: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("demo: true"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
