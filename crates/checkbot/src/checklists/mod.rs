//! Checklist audits: catalog, scoring, draft lifecycle, the conversational
//! completion flow, and report assembly.

pub mod attempts;
pub mod auth;
pub mod catalog;
pub mod conversation;
pub mod domain;
pub mod drafts;
pub mod media;
pub mod report;
pub mod router;
pub mod scoring;
pub mod storage;

pub use attempts::{AttemptFinalizer, FinalizeError};
pub use catalog::{CatalogError, CatalogReader, ChecklistOutline};
pub use conversation::{ConversationEngine, InboundEvent, OutboundCommand, SessionState};
pub use domain::{
    AttemptId, Checklist, ChecklistId, DraftId, Question, QuestionId, QuestionKind, Section,
    SectionId, TenantId, UserId, UserProfile,
};
pub use drafts::{DraftProgress, DraftStore, DraftStoreError};
pub use report::{ReportAssembler, ReportData, ReportError, ReportRow};
pub use router::{bot_router, BotState};
pub use scoring::{AttemptTotals, QuestionScore, ScoringEngine};
pub use storage::{
    AttemptRecord, AttemptRepository, CatalogRepository, DraftAnswerRecord, DraftRecord,
    DraftRepository, QuestionAnswerRecord, StorageError,
};
