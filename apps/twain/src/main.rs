//! # Twain
//!
//! The binary: parses the CLI, sets up logging and dispatches.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   apps/twain (THE BINARY)                │
//! │                                                          │
//! │  ┌───────────┐    ┌───────────┐    ┌─────────────────┐   │
//! │  │   CLI     │    │ HTTP API  │    │ Daraja client   │   │
//! │  │  (clap)   │    │  (axum)   │    │   (reqwest)     │   │
//! │  └─────┬─────┘    └─────┬─────┘    └────────┬────────┘   │
//! │        └────────────────┼───────────────────┘            │
//! │                         ▼                                │
//! │                 ┌───────────────┐                        │
//! │                 │  twain-core   │                        │
//! │                 │  (THE MODEL)  │                        │
//! │                 └───────────────┘                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! twain init
//! twain create-user -u admin -e admin@example.com -p 'long-password' --staff
//! twain --config twain.toml serve --host 0.0.0.0 --port 8080
//! twain status --json-mode
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twain::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // TWAIN_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TWAIN_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "twain=debug,twain_core=debug,tower_http=debug"
    } else {
        "twain=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  ████████╗██╗    ██╗ █████╗ ██╗███╗   ██╗
  ╚══██╔══╝██║    ██║██╔══██╗██║████╗  ██║
     ██║   ██║ █╗ ██║███████║██║██╔██╗ ██║
     ██║   ██║███╗██║██╔══██║██║██║╚██╗██║
     ██║   ╚███╔███╔╝██║  ██║██║██║ ╚████║
     ╚═╝    ╚══╝╚══╝ ╚═╝  ╚═╝╚═╝╚═╝  ╚═══╝

  Business Dashboard Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
