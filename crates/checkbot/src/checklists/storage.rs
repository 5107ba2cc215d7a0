//! Repository traits through which the relational storage layer is consumed.
//! The concrete engine is an external collaborator; any implementation that
//! preserves the uniqueness and cascade constraints described on the records
//! is acceptable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AttemptId, Checklist, ChecklistId, DraftId, Question, QuestionId, Section, SectionId, TenantId,
    UserId,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// In-progress attempt header. Unique per (user, checklist); exclusively owns
/// its [`DraftAnswerRecord`] rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub id: DraftId,
    pub user: UserId,
    pub checklist: ChecklistId,
    /// Free-text or selected department label chosen for this run.
    pub department: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One partial answer, unique per (draft, question). Fields are upserted
/// independently as the conversation progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAnswerRecord {
    pub draft: DraftId,
    pub question: QuestionId,
    /// Raw string encoding of the answer: "yes"/"no", "1".."10", or free text.
    pub response_value: Option<String>,
    pub comment: Option<String>,
    pub photo_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DraftAnswerRecord {
    pub fn empty(draft: DraftId, question: QuestionId, at: DateTime<Utc>) -> Self {
        Self {
            draft,
            question,
            response_value: None,
            comment: None,
            photo_path: None,
            updated_at: at,
        }
    }
}

/// Finalized, immutable attempt header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub checklist: ChecklistId,
    pub user: UserId,
    pub department: Option<String>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub is_submitted: bool,
}

/// Answer copied verbatim from a draft at finalize time. Read-only after
/// creation; the source of truth for scoring and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswerRecord {
    pub attempt: AttemptId,
    pub question: QuestionId,
    pub response_value: Option<String>,
    pub comment: Option<String>,
    pub photo_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Read/write access to the checklist catalog: checklist headers, sections,
/// questions, and the tenant department directory. Write operations exist
/// only for the admin import flow and the one-time normalization backfill.
pub trait CatalogRepository: Send + Sync {
    fn checklist(&self, id: &ChecklistId) -> Result<Option<Checklist>, StorageError>;
    fn checklists_for_tenant(&self, tenant: &TenantId) -> Result<Vec<Checklist>, StorageError>;
    fn sections(&self, checklist: &ChecklistId) -> Result<Vec<Section>, StorageError>;
    fn questions(&self, checklist: &ChecklistId) -> Result<Vec<Question>, StorageError>;
    fn insert_checklist(&self, checklist: Checklist) -> Result<Checklist, StorageError>;
    fn insert_section(&self, section: Section) -> Result<Section, StorageError>;
    fn insert_question(&self, question: Question) -> Result<Question, StorageError>;
    /// Move a legacy unsectioned question under the given section.
    fn assign_section(
        &self,
        question: &QuestionId,
        section: &SectionId,
    ) -> Result<(), StorageError>;
    /// Persist canonical scoring columns resolved from legacy meta.
    fn update_question_scoring(
        &self,
        question: &QuestionId,
        weight: Option<f64>,
        scale_max: Option<f64>,
    ) -> Result<(), StorageError>;
    /// Known department labels for the tenant, used for the selection keyboard.
    fn departments(&self, tenant: &TenantId) -> Result<Vec<String>, StorageError>;
}

/// Persistent scratch space for in-progress attempts. `create_or_get` must be
/// a constraint-backed upsert on (user, checklist): concurrent calls for the
/// same pair converge on one row. Every write bumps the draft's `updated_at`.
pub trait DraftRepository: Send + Sync {
    fn create_or_get(
        &self,
        user: &UserId,
        checklist: &ChecklistId,
        started_at: DateTime<Utc>,
    ) -> Result<DraftRecord, StorageError>;
    fn draft(&self, id: &DraftId) -> Result<Option<DraftRecord>, StorageError>;
    fn set_department(
        &self,
        draft: &DraftId,
        department: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    /// Upsert only the response value; a stored comment or photo must survive.
    fn upsert_answer_value(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        value: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    fn upsert_answer_comment(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        comment: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    fn upsert_answer_photo(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        photo_path: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    fn answers(&self, draft: &DraftId) -> Result<Vec<DraftAnswerRecord>, StorageError>;
    /// Delete the draft and its answers without finalizing.
    fn delete(&self, draft: &DraftId) -> Result<(), StorageError>;
    /// Drafts whose `updated_at` is older than the cutoff, for the TTL sweep.
    fn stale(&self, older_than: DateTime<Utc>) -> Result<Vec<DraftRecord>, StorageError>;
}

/// Immutable attempt storage. `finalize_draft` is the single atomic
/// promote-and-delete operation: the implementation must copy every draft
/// answer into attempt answers and remove the draft in one transaction, or
/// change nothing. A missing draft yields [`StorageError::NotFound`].
pub trait AttemptRepository: Send + Sync {
    fn finalize_draft(
        &self,
        draft: &DraftId,
        submitted_at: DateTime<Utc>,
    ) -> Result<AttemptRecord, StorageError>;
    fn attempt(&self, id: &AttemptId) -> Result<Option<AttemptRecord>, StorageError>;
    fn answers(&self, attempt: &AttemptId) -> Result<Vec<QuestionAnswerRecord>, StorageError>;
}
