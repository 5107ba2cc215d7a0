//! Service facade over the draft repository: one active draft per
//! (user, checklist), field-independent answer writes, and the rehydration
//! map the conversation uses to resume after a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::domain::{ChecklistId, DraftId, QuestionId, UserId};
use super::storage::{DraftAnswerRecord, DraftRecord, DraftRepository, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum DraftStoreError {
    #[error("draft no longer exists")]
    DraftMissing,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A draft plus its answers keyed by question, as loaded from storage.
#[derive(Debug, Clone)]
pub struct DraftProgress {
    pub draft: DraftRecord,
    pub answers: HashMap<QuestionId, DraftAnswerRecord>,
}

impl DraftProgress {
    pub fn answer(&self, question: &QuestionId) -> Option<&DraftAnswerRecord> {
        self.answers.get(question)
    }

    pub fn answered_count(&self) -> usize {
        self.answers
            .values()
            .filter(|a| a.response_value.is_some())
            .count()
    }
}

pub struct DraftStore<D> {
    repository: Arc<D>,
}

impl<D> Clone for DraftStore<D> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<D: DraftRepository> DraftStore<D> {
    pub fn new(repository: Arc<D>) -> Self {
        Self { repository }
    }

    /// Return the existing draft for the pair or create a fresh one. The
    /// repository's constraint-backed upsert makes this safe under
    /// concurrent calls for the same pair.
    pub fn open(
        &self,
        user: &UserId,
        checklist: &ChecklistId,
        now: DateTime<Utc>,
    ) -> Result<DraftRecord, DraftStoreError> {
        Ok(self.repository.create_or_get(user, checklist, now)?)
    }

    pub fn progress(&self, draft: &DraftId) -> Result<DraftProgress, DraftStoreError> {
        let record = self
            .repository
            .draft(draft)?
            .ok_or(DraftStoreError::DraftMissing)?;
        let answers = self
            .repository
            .answers(draft)?
            .into_iter()
            .map(|a| (a.question.clone(), a))
            .collect();
        Ok(DraftProgress {
            draft: record,
            answers,
        })
    }

    pub fn set_answer(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        value: String,
        now: DateTime<Utc>,
    ) -> Result<(), DraftStoreError> {
        Ok(self
            .repository
            .upsert_answer_value(draft, question, value, now)?)
    }

    pub fn set_comment(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        comment: String,
        now: DateTime<Utc>,
    ) -> Result<(), DraftStoreError> {
        Ok(self
            .repository
            .upsert_answer_comment(draft, question, comment, now)?)
    }

    pub fn set_photo(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        photo_path: String,
        now: DateTime<Utc>,
    ) -> Result<(), DraftStoreError> {
        Ok(self
            .repository
            .upsert_answer_photo(draft, question, photo_path, now)?)
    }

    pub fn set_department(
        &self,
        draft: &DraftId,
        department: String,
        now: DateTime<Utc>,
    ) -> Result<(), DraftStoreError> {
        Ok(self.repository.set_department(draft, department, now)?)
    }

    /// Delete a draft and its answers without finalizing.
    pub fn discard(&self, draft: &DraftId) -> Result<(), DraftStoreError> {
        Ok(self.repository.delete(draft)?)
    }

    /// Delete drafts untouched for longer than `ttl`. Returns how many were
    /// removed. Operational safeguard only; never runs implicitly.
    pub fn sweep_stale(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, DraftStoreError> {
        let cutoff = now - ttl;
        let stale = self.repository.stale(cutoff)?;
        let mut removed = 0;
        for draft in stale {
            self.repository.delete(&draft.id)?;
            removed += 1;
        }
        if removed > 0 {
            info!(removed, "swept stale drafts");
        }
        Ok(removed)
    }
}
