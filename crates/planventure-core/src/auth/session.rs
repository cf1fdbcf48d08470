//! Session state and its persistence.
//!
//! `SessionManager` is the single owner of the authentication state for a
//! run of the application. It is created in the `initializing` state,
//! restored from a [`CredentialStore`] exactly once by
//! [`SessionManager::initialize`], and afterwards changed only by
//! [`SessionManager::login`] and [`SessionManager::logout`]. Every change
//! is published on a `tokio::sync::watch` channel so route gates and views
//! can follow it.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::credentials::{CredentialStore, StoreError};
use crate::models::{AuthPayload, UserProfile};

/// Store key for the access credential
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Store key for the refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Store key for the cached user record (serialized JSON)
pub const USER_KEY: &str = "user";

#[derive(Error, Debug)]
pub enum SessionError {
    /// The server's auth payload carried neither `access_token` nor `token`.
    #[error("No access token received from server")]
    MissingCredential,

    #[error("Failed to persist session: {0}")]
    Store(#[from] StoreError),
}

/// Snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    /// Persisted and restored, never used for renewal.
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
    /// True until the persisted state has been read. Consumers must treat
    /// this as "unknown", not as "logged out".
    pub initializing: bool,
}

impl Session {
    fn initializing() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            user: None,
            initializing: true,
        }
    }

    fn signed_out() -> Self {
        Self {
            initializing: false,
            ..Self::initializing()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Get the bearer token if the session holds one
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<Session>,
    /// Serializes initialize/login/logout so the store and the published
    /// state change together. The last transition to take it wins.
    transition: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(Session::initializing());
        Self {
            store,
            state,
            transition: Mutex::new(()),
        }
    }

    /// Restore the session from the store.
    ///
    /// Only the first call reads the store; later calls return the current
    /// snapshot. Unreadable entries are logged and treated as absent.
    pub fn initialize(&self) -> Session {
        let _guard = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.state.borrow().initializing {
            debug!("Session already initialized");
            return self.current_session();
        }
        self.restore()
    }

    /// Read the persisted entries and publish them. Callers hold the
    /// transition lock.
    fn restore(&self) -> Session {
        let access_token = self.read_entry(ACCESS_TOKEN_KEY);
        let refresh_token = self.read_entry(REFRESH_TOKEN_KEY);
        let user = self
            .read_entry(USER_KEY)
            .and_then(|raw| match serde_json::from_str::<UserProfile>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable cached user record");
                    None
                }
            });

        let session = Session {
            access_token,
            refresh_token,
            user,
            initializing: false,
        };
        debug!(
            authenticated = session.is_authenticated(),
            has_refresh_token = session.refresh_token.is_some(),
            has_user = session.user.is_some(),
            "Session restored"
        );
        self.state.send_replace(session.clone());
        session
    }

    /// Adopt the credentials from a server auth payload.
    ///
    /// The access credential is written to the store before the new state
    /// is published; if that write fails nothing changes. `refresh_token`
    /// and `user` are written only when the payload carries them, and a
    /// failure to write either is logged without blocking the login: the
    /// session keeps whatever value the store still holds for it.
    ///
    /// Logging in before [`initialize`](Self::initialize) restores the
    /// persisted entries first, so none of them is lost.
    pub fn login(&self, payload: &AuthPayload) -> Result<(), SessionError> {
        let token = payload
            .access_credential()
            .ok_or(SessionError::MissingCredential)?;

        let _guard = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        if self.state.borrow().initializing {
            debug!("Login before initialization, restoring stored session first");
            self.restore();
        }

        self.store.set(ACCESS_TOKEN_KEY, token)?;

        let refresh_token = payload
            .refresh_credential()
            .filter(|refresh_token| self.persist_optional(REFRESH_TOKEN_KEY, refresh_token));
        let user = payload.user.as_ref().filter(|user| match serde_json::to_string(user) {
            Ok(user_json) => self.persist_optional(USER_KEY, &user_json),
            Err(e) => {
                warn!(error = %e, "Failed to serialize user record");
                false
            }
        });

        self.state.send_modify(|session| {
            session.access_token = Some(token.to_string());
            if let Some(refresh_token) = refresh_token {
                session.refresh_token = Some(refresh_token.to_string());
            }
            if let Some(user) = user {
                session.user = Some(user.clone());
            }
            session.initializing = false;
        });

        info!(
            user = payload.user.as_ref().map(UserProfile::display_name),
            "Logged in"
        );
        Ok(())
    }

    /// Write an entry that never blocks authentication. Returns whether the
    /// store now holds `value`.
    fn persist_optional(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to persist optional session entry");
                false
            }
        }
    }

    /// Clear the stored credentials and reset to signed out.
    ///
    /// Safe to call repeatedly. Store failures are logged, never returned:
    /// the in-memory session is signed out regardless.
    pub fn logout(&self) {
        let _guard = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to remove stored credential");
            }
        }

        let was_authenticated = self.state.borrow().is_authenticated();
        self.state.send_if_modified(|session| {
            let next = Session::signed_out();
            if *session == next {
                false
            } else {
                *session = next;
                true
            }
        });

        if was_authenticated {
            info!("Logged out");
        } else {
            debug!("Logout requested with no active session");
        }
    }

    pub fn current_session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    /// Subscribe to session changes. The receiver starts at the current
    /// snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    fn read_entry(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored credential");
                None
            }
        }
    }
}
