//! # CLI Commands
//!
//! One `cmd_*` function per subcommand. Each honours `--json-mode` by
//! printing a single pretty JSON document instead of a text table.

use crate::api::{self, AppState};
use crate::config::{AppConfig, MpesaConfig};
use crate::mpesa::DarajaClient;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use twain_core::{NewUser, Store, TwainError, User};

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// What `serve` reports before it starts listening.
fn startup_summary(addr: &str, db_path: &Path, mpesa: Option<&MpesaConfig>) -> serde_json::Value {
    serde_json::json!({
        "address": addr,
        "database": db_path.to_string_lossy(),
        "mpesa": mpesa.map(|m| m.base_url.clone()),
    })
}

/// Start the HTTP server.
pub async fn cmd_serve(
    db_path: &Path,
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    json_mode: bool,
) -> Result<(), TwainError> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let mpesa = config.mpesa()?;
    let store = Store::open(db_path)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    if json_mode {
        print_json(&startup_summary(&addr, db_path, mpesa.as_ref()));
    } else {
        println!("Twain Server Starting...");
        println!();
        println!("Configuration:");
        println!("  Address:  {}", addr);
        println!("  Database: {:?}", db_path);
        println!(
            "  M-Pesa:   {}",
            mpesa
                .as_ref()
                .map_or("disabled".to_string(), |m| format!("{:?} ({})", m.environment, m.base_url))
        );
        println!();
        println!("Press Ctrl+C to stop");
        println!();
    }

    let mut state = AppState::new(store, config);
    if let Some(mpesa) = mpesa {
        let client = DarajaClient::new(mpesa).map_err(|e| TwainError::Payment(e.to_string()))?;
        state = state.with_gateway(Arc::new(client));
    }

    api::run_server(&addr, state).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty database with every table in place.
pub fn cmd_init(db_path: &Path, force: bool, json_mode: bool) -> Result<(), TwainError> {
    if db_path.exists() {
        if !force {
            return Err(TwainError::validation(
                "Database already exists. Use --force to overwrite.",
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| TwainError::Storage(format!("Remove {}: {e}", db_path.display())))?;
    }

    Store::open(db_path)?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "initialized": true,
        }));
    } else {
        println!("Initialized new database at {:?}", db_path);
    }
    Ok(())
}

// =============================================================================
// USER COMMANDS
// =============================================================================

/// Register a user directly, bypassing the public signup (which never grants staff).
pub fn cmd_create_user(
    db_path: &Path,
    username: &str,
    email: &str,
    password: &str,
    staff: bool,
    json_mode: bool,
) -> Result<(), TwainError> {
    let store = Store::open(db_path)?;
    let user = store.create_user(
        NewUser {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
            is_staff: staff,
        },
        Utc::now(),
    )?;

    if json_mode {
        print_json(&serde_json::json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "is_staff": user.is_staff,
        }));
    } else {
        let role = if user.is_staff { "staff" } else { "member" };
        println!("Created {} user '{}' (id {})", role, user.username, user.id);
    }
    Ok(())
}

/// Delete a user together with their subscription and sessions.
pub fn cmd_delete_user(db_path: &Path, username: &str, json_mode: bool) -> Result<(), TwainError> {
    let store = Store::open(db_path)?;
    let user = store
        .user_by_username(username.trim())?
        .ok_or_else(|| TwainError::NotFound {
            kind: "user",
            key: username.trim().to_string(),
        })?;
    store.delete::<User>(user.id)?;

    if json_mode {
        print_json(&serde_json::json!({ "deleted": user.id, "username": user.username }));
    } else {
        println!("Deleted user '{}' (id {})", user.username, user.id);
    }
    Ok(())
}

/// Drop expired login sessions.
pub fn cmd_purge_sessions(db_path: &Path, json_mode: bool) -> Result<(), TwainError> {
    let store = Store::open(db_path)?;
    let purged = store.purge_expired_sessions(Utc::now())?;

    if json_mode {
        print_json(&serde_json::json!({ "purged": purged }));
    } else {
        println!("Purged {} expired session(s)", purged);
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record counts.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), TwainError> {
    let store = Store::open(db_path)?;
    let stats = store.stats()?;

    if json_mode {
        let mut output = serde_json::to_value(&stats)
            .map_err(|e| TwainError::Serialization(e.to_string()))?;
        if let Some(map) = output.as_object_mut() {
            map.insert(
                "database".to_string(),
                serde_json::Value::String(db_path.to_string_lossy().into_owned()),
            );
        }
        print_json(&output);
        return Ok(());
    }

    println!("Twain Status");
    println!("============");
    println!("Database: {:?}", db_path);
    println!();
    println!("Users:          {}", stats.users);
    println!("Messages:       {} ({} unread)", stats.messages, stats.unread_messages);
    println!("Services:       {}", stats.services);
    println!("Testimonials:   {}", stats.testimonials);
    println!("Case studies:   {}", stats.case_studies);
    println!("Clients:        {}", stats.clients);
    println!("Projects:       {}", stats.projects);
    println!("Categories:     {}", stats.categories);
    println!("Articles:       {} ({} attachments)", stats.articles, stats.attachments);
    println!("Tools:          {}", stats.tools);
    println!("Plans:          {}", stats.plans);
    println!(
        "Subscriptions:  {} ({} active)",
        stats.subscriptions, stats.active_subscriptions
    );
    println!(
        "Payments:       {} ({} pending)",
        stats.payments, stats.pending_payments
    );

    Ok(())
}

// =============================================================================
// PAYMENTS COMMAND
// =============================================================================

/// List recent payments, newest first.
pub fn cmd_payments(db_path: &Path, limit: usize, json_mode: bool) -> Result<(), TwainError> {
    let store = Store::open(db_path)?;
    let payments = store.recent_payments(limit)?;

    if json_mode {
        let output = serde_json::to_value(&payments)
            .map_err(|e| TwainError::Serialization(e.to_string()))?;
        print_json(&output);
        return Ok(());
    }

    if payments.is_empty() {
        println!("No payments recorded");
        return Ok(());
    }

    println!(
        "{:<6} {:<6} {:<8} {:<10} {:<14} {:<12} {}",
        "ID", "User", "Plan", "Amount", "Phone", "Receipt", "Status"
    );
    for p in &payments {
        println!(
            "{:<6} {:<6} {:<8} {:<10} {:<14} {:<12} {:?}",
            p.id,
            p.user_id,
            p.plan_id.map_or("-".to_string(), |id| id.to_string()),
            p.amount_kes,
            p.phone_number,
            p.transaction_id.as_deref().unwrap_or("-"),
            p.status
        );
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
