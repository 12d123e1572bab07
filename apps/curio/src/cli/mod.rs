//! # Curio CLI Module
//!
//! This module implements the CLI interface for Curio.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `status` - Show store row counts
//! - `graphs` - List graphs
//! - `show` - Show the nodes and edges of one graph
//! - `ingest` - Ingest a learner graph document
//! - `curate` - Apply a batch of curator decisions
//! - `vote` - Cast or replace a vote on an edge
//! - `server` - Start the HTTP server

mod commands;

use crate::config::CurioConfig;
use clap::{Parser, Subcommand};
use curio_core::CurioError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Curio - collaborative knowledge-graph curation
///
/// Promotes vetted learner relations into a shared curated graph and keeps
/// edge confidence in step with community votes.
#[derive(Parser, Debug)]
#[command(name = "curio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ./curio.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides config and CURIO_DB)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show store row counts
    Status,

    /// List every graph
    Graphs,

    /// Show the nodes and edges of one graph
    Show {
        /// Graph id
        #[arg(short, long)]
        graph: u64,
    },

    /// Ingest a learner graph document (JSON)
    Ingest {
        /// Path to the document
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Apply a batch of curator decisions (JSON: diff_id, curator, items)
    Curate {
        /// Path to the batch document
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Cast or replace a vote on an edge
    Vote {
        /// Voting user id
        #[arg(short, long)]
        user: String,

        /// Edge id
        #[arg(short, long)]
        edge: u64,

        /// -1, 0 or 1
        #[arg(short, long, allow_hyphen_values = true)]
        value: i64,

        /// Optional comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve the effective configuration: file, then environment, then flags.
pub fn resolve_config(cli: &Cli) -> Result<CurioConfig, CurioError> {
    let mut config = CurioConfig::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.storage.path = database.clone();
    }
    if let Some(backend) = &cli.backend {
        config.storage.backend = backend.parse()?;
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CurioError> {
    let mut config = resolve_config(&cli)?;
    let json = cli.json;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&config, force, json),
        Some(Commands::Status) | None => cmd_status(&config, json),
        Some(Commands::Graphs) => cmd_graphs(&config, json),
        Some(Commands::Show { graph }) => cmd_show(&config, graph, json),
        Some(Commands::Ingest { file }) => cmd_ingest(&config, &file, json),
        Some(Commands::Curate { file }) => cmd_curate(&config, &file, json),
        Some(Commands::Vote {
            user,
            edge,
            value,
            comment,
        }) => cmd_vote(&config, user, edge, value, comment, json),
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "curio", "-D", "/tmp/flag.redb", "-B", "memory", "--json", "status",
        ]);
        let config = resolve_config(&cli).expect("config");
        assert_eq!(config.storage.path, PathBuf::from("/tmp/flag.redb"));
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert!(cli.json);
    }

    #[test]
    fn negative_vote_value_parses() {
        let cli = Cli::parse_from([
            "curio", "vote", "--user", "ana", "--edge", "3", "--value", "-1",
        ]);
        assert!(matches!(
            cli.command,
            Some(Commands::Vote { value: -1, edge: 3, .. })
        ));
    }

    #[test]
    fn unknown_backend_flag_is_rejected() {
        let cli = Cli::parse_from(["curio", "-B", "sled", "status"]);
        assert!(resolve_config(&cli).is_err());
    }
}
