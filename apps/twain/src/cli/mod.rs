//! # Twain CLI Module
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP server
//! - `init` - Create a fresh database
//! - `create-user` - Register a user (use `--staff` for back-office access)
//! - `status` - Record counts (default)
//! - `payments` - Recent payments
//! - `delete-user` - Remove a user, their subscription and sessions
//! - `purge-sessions` - Drop expired logins

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use twain_core::TwainError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Twain - small-business dashboard server
///
/// Marketing site API, customer dashboard, staff back-office and
/// M-Pesa subscription payments over one embedded database.
#[derive(Parser, Debug)]
#[command(name = "twain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database
    #[arg(short = 'D', long, global = true, default_value = "twain.redb")]
    pub database: PathBuf,

    /// Path to a TOML config file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Register a user
    CreateUser {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Grant back-office access
        #[arg(long)]
        staff: bool,
    },

    /// Delete a user with their subscription and sessions
    DeleteUser {
        #[arg(short, long)]
        username: String,
    },

    /// Show record counts
    Status,

    /// List recent payments
    Payments {
        /// Maximum rows to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Remove expired login sessions
    PurgeSessions,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TwainError> {
    let json_mode = cli.json_mode;
    let db = cli.database.as_path();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            cmd_serve(db, cli.config.as_deref(), host, port, json_mode).await
        }
        Some(Commands::Init { force }) => cmd_init(db, force, json_mode),
        Some(Commands::CreateUser {
            username,
            email,
            password,
            staff,
        }) => cmd_create_user(db, &username, &email, &password, staff, json_mode),
        Some(Commands::DeleteUser { username }) => cmd_delete_user(db, &username, json_mode),
        Some(Commands::Payments { limit }) => cmd_payments(db, limit, json_mode),
        Some(Commands::PurgeSessions) => cmd_purge_sessions(db, json_mode),
        Some(Commands::Status) | None => cmd_status(db, json_mode),
    }
}
