//! Users and bearer sessions.

use super::records::AUTH_SESSIONS;
use super::redb_store::{decode, encode, insert_in, scan};
use super::{Record, Store};
use crate::accounts::{DUMMY_PASSWORD_HASH, generate_token, token_digest, verify_password};
use crate::types::storage_err;
use crate::{AuthSession, Flash, NewUser, Timestamp, TwainError, User};
use chrono::Duration;
use redb::{ReadableDatabase, ReadableTable};

impl Store {
    /// Register a user from a signup form.
    pub fn create_user(&self, form: NewUser, now: Timestamp) -> Result<User, TwainError> {
        let mut user = form.into_user(now)?;
        let txn = self.db.begin_write().map_err(storage_err)?;
        insert_in(&txn, &mut user)?;
        txn.commit().map_err(storage_err)?;
        Ok(user)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>, TwainError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let table = txn.open_table(User::TABLE).map_err(storage_err)?;
        Ok(scan::<User>(&table)?
            .into_iter()
            .find(|u| u.username == username))
    }

    /// The user for a username/password pair, if the pair is valid.
    ///
    /// An unknown username still runs one Argon2 verification.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, TwainError> {
        match self.user_by_username(username)? {
            Some(user) => Ok(Some(user).filter(|user| user.check_password(password))),
            None => {
                let _ = verify_password(password, DUMMY_PASSWORD_HASH);
                Ok(None)
            }
        }
    }

    /// Start a session for `user_id` and return the bearer token.
    pub fn open_session(
        &self,
        user_id: u64,
        flash: Option<Flash>,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<String, TwainError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TwainError::validation("Session lifetime is out of range"))?;
        let token = generate_token();
        let session = AuthSession {
            token_digest: token_digest(&token),
            user_id,
            created_at: now,
            expires_at,
            flash,
        };
        let bytes = encode(&session)?;

        let txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = txn.open_table(AUTH_SESSIONS).map_err(storage_err)?;
            table
                .insert(session.token_digest.as_str(), bytes.as_slice())
                .map_err(storage_err)?;
        }
        txn.commit().map_err(storage_err)?;
        Ok(token)
    }

    /// Look up a live session and its user. Expired sessions are removed.
    pub fn resolve_session(
        &self,
        token: &str,
        now: Timestamp,
    ) -> Result<Option<(AuthSession, User)>, TwainError> {
        let digest = token_digest(token);
        let session: AuthSession = {
            let txn = self.db.begin_read().map_err(storage_err)?;
            let table = txn.open_table(AUTH_SESSIONS).map_err(storage_err)?;
            let found = table.get(digest.as_str()).map_err(storage_err)?;
            match found {
                Some(bytes) => decode(bytes.value())?,
                None => return Ok(None),
            }
        };

        if session.is_expired(now) {
            self.close_session(token)?;
            return Ok(None);
        }

        Ok(self.get::<User>(session.user_id)?.map(|user| (session, user)))
    }

    /// Read and clear the session's flash flag. Returns it at most once.
    pub fn take_flash(&self, token: &str) -> Result<Option<Flash>, TwainError> {
        let digest = token_digest(token);
        let txn = self.db.begin_write().map_err(storage_err)?;
        let flash = {
            let mut table = txn.open_table(AUTH_SESSIONS).map_err(storage_err)?;
            let stored: Option<AuthSession> = match table.get(digest.as_str()).map_err(storage_err)? {
                Some(bytes) => Some(decode(bytes.value())?),
                None => None,
            };
            match stored {
                Some(mut session) => {
                    let flash = session.flash.take();
                    if flash.is_some() {
                        let bytes = encode(&session)?;
                        table
                            .insert(digest.as_str(), bytes.as_slice())
                            .map_err(storage_err)?;
                    }
                    flash
                }
                None => None,
            }
        };
        txn.commit().map_err(storage_err)?;
        Ok(flash)
    }

    /// End a session. Returns whether it existed.
    pub fn close_session(&self, token: &str) -> Result<bool, TwainError> {
        let digest = token_digest(token);
        let txn = self.db.begin_write().map_err(storage_err)?;
        let existed = {
            let mut table = txn.open_table(AUTH_SESSIONS).map_err(storage_err)?;
            table.remove(digest.as_str()).map_err(storage_err)?.is_some()
        };
        txn.commit().map_err(storage_err)?;
        Ok(existed)
    }

    /// Delete every expired session. Returns how many were removed.
    pub fn purge_expired_sessions(&self, now: Timestamp) -> Result<usize, TwainError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        let purged = {
            let mut table = txn.open_table(AUTH_SESSIONS).map_err(storage_err)?;
            let mut expired = Vec::new();
            for entry in table.iter().map_err(storage_err)? {
                let (digest, bytes) = entry.map_err(storage_err)?;
                let session: AuthSession = decode(bytes.value())?;
                if session.is_expired(now) {
                    expired.push(digest.value().to_string());
                }
            }
            for digest in &expired {
                table.remove(digest.as_str()).map_err(storage_err)?;
            }
            expired.len()
        };
        txn.commit().map_err(storage_err)?;
        Ok(purged)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn form(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "longenough".to_string(),
            confirm_password: "longenough".to_string(),
            is_staff: false,
        }
    }

    #[test]
    fn duplicate_username_and_email_conflict() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        store.create_user(form("wanjiru", "w@duka.co.ke"), now).expect("user");

        let err = store
            .create_user(form("wanjiru", "other@duka.co.ke"), now)
            .expect_err("username clash");
        assert_eq!(err.to_string(), "Username already taken");

        let err = store
            .create_user(form("kamau", "W@Duka.co.ke"), now)
            .expect_err("email clash");
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[test]
    fn authenticate_checks_password() {
        let store = Store::in_memory().expect("store");
        store.create_user(form("otieno", "o@duka.co.ke"), Utc::now()).expect("user");
        assert!(store.authenticate("otieno", "longenough").expect("auth").is_some());
        assert!(store.authenticate("otieno", "wrong-password").expect("auth").is_none());
        assert!(store.authenticate("nobody", "longenough").expect("auth").is_none());
    }

    #[test]
    fn flash_is_taken_once() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let user = store.create_user(form("achieng", "a@duka.co.ke"), now).expect("user");
        let token = store
            .open_session(user.id, Some(Flash::NewSignup), now, Duration::hours(1))
            .expect("session");

        assert_eq!(store.take_flash(&token).expect("take"), Some(Flash::NewSignup));
        assert_eq!(store.take_flash(&token).expect("take"), None);
        assert!(store.resolve_session(&token, now).expect("resolve").is_some());
    }

    #[test]
    fn expired_sessions_resolve_to_none_and_are_removed() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let user = store.create_user(form("njeri", "n@duka.co.ke"), now).expect("user");
        let token = store
            .open_session(user.id, None, now, Duration::minutes(5))
            .expect("session");

        let later = now + Duration::minutes(10);
        assert!(store.resolve_session(&token, later).expect("resolve").is_none());
        assert!(!store.close_session(&token).expect("close"));
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let user = store.create_user(form("mwangi", "m@duka.co.ke"), now).expect("user");
        store.open_session(user.id, None, now, Duration::minutes(1)).expect("short");
        let long = store.open_session(user.id, None, now, Duration::days(1)).expect("long");

        let purged = store
            .purge_expired_sessions(now + Duration::hours(1))
            .expect("purge");
        assert_eq!(purged, 1);
        assert!(store.resolve_session(&long, now).expect("resolve").is_some());
    }

    #[test]
    fn oversized_ttl_is_an_error() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let user = store.create_user(form("wafula", "wf@duka.co.ke"), now).expect("user");
        let err = store
            .open_session(user.id, None, now, Duration::hours(10_000_000_000))
            .expect_err("out of range");
        assert!(matches!(err, TwainError::Validation(_)));
    }

    #[test]
    fn logout_ends_session() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let user = store.create_user(form("kiprop", "k@duka.co.ke"), now).expect("user");
        let token = store.open_session(user.id, None, now, Duration::hours(1)).expect("session");
        assert!(store.close_session(&token).expect("close"));
        assert!(store.resolve_session(&token, now).expect("resolve").is_none());
    }
}
