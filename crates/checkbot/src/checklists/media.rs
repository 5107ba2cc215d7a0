//! External collaborator traits for photo persistence. The conversation
//! layer stores only the opaque path a `MediaStore` returns; a fetch
//! failure leaves the photo slot empty, so the question still fails its
//! photo gate.

use super::conversation::events::PhotoRef;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media fetch failed: {0}")]
    Fetch(String),
    #[error("media storage unavailable: {0}")]
    Unavailable(String),
}

/// Turns a transport-specific photo reference into a durable path.
pub trait MediaStore: Send + Sync {
    fn store(&self, photo: &PhotoRef) -> Result<String, MediaError>;
}
