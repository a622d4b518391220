//! Flat-file credential store
//!
//! One `username:password:limit` record per line. Passwords are kept as
//! SHA-256 digests, limits as `-1` (unlimited) or a remaining count.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
mod password;
mod quota;
mod record;
mod store;

pub use error::{Result, StoreError};
pub use password::PasswordHash;
pub use quota::Quota;
pub use record::Credential;
pub use store::{CredentialStore, UserSummary};
