//! # Accounts
//!
//! Users, password hashing, bearer session tokens and one-shot flash flags.
//!
//! ## Sessions
//!
//! A login produces a random 32-byte token, base64url-encoded, which the
//! client sends back as `Authorization: Bearer <token>`. The store only
//! keeps the BLAKE3 digest of the token, so a leaked database cannot be
//! replayed as live sessions.
//!
//! ## Flash flags
//!
//! Signup and login set a [`Flash`] on the new session. The dashboard reads
//! it exactly once (`Store::take_flash`) to greet the user.

use crate::primitives::{
    MAX_EMAIL_LENGTH, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, SESSION_TOKEN_BYTES,
};
use crate::validate::{is_plausible_email, required};
use crate::{Timestamp, TwainError};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

// =============================================================================
// USER
// =============================================================================

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Staff accounts may use the admin back-office.
    pub is_staff: bool,
    pub date_joined: Timestamp,
}

impl User {
    /// Check a candidate password against the stored hash.
    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

/// Signup form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl NewUser {
    /// Validate the signup form. Uniqueness is checked by the store.
    pub fn validate(&self) -> Result<(), TwainError> {
        if self.password != self.confirm_password {
            return Err(TwainError::validation("Passwords do not match"));
        }
        required("Username", &self.username, MAX_USERNAME_LENGTH)?;
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            return Err(TwainError::validation(
                "Username may only contain letters, digits and @/./+/-/_",
            ));
        }
        required("Email", &self.email, MAX_EMAIL_LENGTH)?;
        if !is_plausible_email(&self.email) {
            return Err(TwainError::validation("Enter a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(TwainError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(())
    }

    /// Build the user record, hashing the password.
    pub fn into_user(self, now: Timestamp) -> Result<User, TwainError> {
        self.validate()?;
        let password_hash = hash_password(&self.password)?;
        Ok(User {
            id: 0,
            username: self.username,
            email: self.email.to_lowercase(),
            password_hash,
            is_staff: self.is_staff,
            date_joined: now,
        })
    }
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, TwainError> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| TwainError::Serialization(format!("salt encoding failed: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TwainError::Serialization(format!("password hashing failed: {e}")))
}

/// Well-formed Argon2id hash with default parameters that no password matches.
/// Checked when a login names an unknown user.
pub const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$dHdhaW4tZHVtbXktc2FsdA$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

/// Verify a password against a PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// =============================================================================
// SESSION TOKENS
// =============================================================================

/// Generate a new random bearer token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest under which a token is stored.
pub fn token_digest(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

/// One-shot greeting flag carried by a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flash {
    NewSignup,
    JustLoggedIn,
}

impl Flash {
    /// The greeting shown on the dashboard.
    pub fn message(self, username: &str) -> String {
        match self {
            Self::NewSignup => format!("Account created successfully! Welcome, {username}."),
            Self::JustLoggedIn => format!("Welcome back, {username}!"),
        }
    }
}

/// Server-side record of a live login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token_digest: String,
    pub user_id: u64,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub flash: Option<Flash>,
}

impl AuthSession {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// TESTS
// =============================================================================
