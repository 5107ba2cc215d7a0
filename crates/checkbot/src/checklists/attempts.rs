//! Promotion of a draft into an immutable attempt. Atomicity lives in the
//! repository's `finalize_draft` so a storage adapter can run the copy and
//! the draft deletion in one transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{AttemptId, DraftId};
use super::storage::{AttemptRecord, AttemptRepository, QuestionAnswerRecord, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    /// The draft is gone: already finalized or discarded. Non-retryable.
    #[error("draft no longer exists")]
    DraftMissing,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for FinalizeError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound => Self::DraftMissing,
            other => Self::Storage(other),
        }
    }
}

pub struct AttemptFinalizer<A> {
    repository: Arc<A>,
}

impl<A> Clone for AttemptFinalizer<A> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<A: AttemptRepository> AttemptFinalizer<A> {
    pub fn new(repository: Arc<A>) -> Self {
        Self { repository }
    }

    /// Promote the draft into a finalized attempt. Either every draft
    /// answer becomes an attempt answer and the draft disappears, or
    /// nothing changes and the draft stays available for retry.
    pub fn finalize(
        &self,
        draft: &DraftId,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, FinalizeError> {
        let attempt = self.repository.finalize_draft(draft, now)?;
        info!(draft = %draft.0, attempt = %attempt.id.0, "finalized checklist attempt");
        Ok(attempt)
    }

    pub fn attempt(&self, id: &AttemptId) -> Result<Option<AttemptRecord>, FinalizeError> {
        Ok(self.repository.attempt(id)?)
    }

    pub fn answers(&self, id: &AttemptId) -> Result<Vec<QuestionAnswerRecord>, FinalizeError> {
        Ok(self.repository.answers(id)?)
    }
}
