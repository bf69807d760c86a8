//! # Twain Library
//!
//! Library target for the Twain server: the HTTP API, CLI, configuration
//! and the Daraja gateway. Exposed so integration tests can build the
//! router directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod mpesa;
