//! Authentication module for managing the user session and its storage.
//!
//! This module provides:
//! - `SessionManager`: the single owner of authentication state, restored
//!   once at startup and changed only by login/logout
//! - `CredentialStore`: durable key-value storage for the credentials, with
//!   file, OS keychain and in-memory backends

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, FileStore, KeyringStore, MemoryStore, StoreError};
pub use session::{Session, SessionError, SessionManager};
