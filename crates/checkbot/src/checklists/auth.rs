//! External collaborator traits for identity: a black-box credential
//! verifier for the dashboard login, and a directory lookup so the
//! conversation endpoint can resolve the profile behind an incoming
//! user id.

use super::domain::{UserId, UserProfile};
use super::storage::StorageError;

/// Black-box password check. Hashing lives behind the implementation.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, login: &str, password: &str) -> Option<UserProfile>;
}

/// Profile lookup for already-authenticated chat users.
pub trait UserDirectory: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<UserProfile>, StorageError>;
}
