use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for owning companies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Identifier wrapper for employee accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for checklists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChecklistId(pub String);

/// Identifier wrapper for checklist sections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionId(pub String);

/// Identifier wrapper for questions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub String);

/// Identifier wrapper for in-progress drafts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftId(pub String);

/// Identifier wrapper for finalized attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub String);

/// Checklist header. Sections and questions are owned rows fetched through
/// the catalog repository; deleting a checklist cascades to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: ChecklistId,
    pub tenant: TenantId,
    pub name: String,
    pub is_scored: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Ordered grouping of questions within a checklist. `order` is the unique
/// ordering key within the checklist, ties broken by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub checklist: ChecklistId,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    /// Reserved for section-level gating.
    pub is_required: bool,
}

/// The four supported answer mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    YesNo,
    Scale,
    ShortText,
    LongText,
}

impl QuestionKind {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionKind::YesNo => "yes_no",
            QuestionKind::Scale => "scale",
            QuestionKind::ShortText => "short_text",
            QuestionKind::LongText => "long_text",
        }
    }

    /// Whether the primary answer arrives via buttons rather than free text.
    pub const fn is_button_answered(self) -> bool {
        matches!(self, QuestionKind::YesNo | QuestionKind::Scale)
    }
}

/// A single checklist question. `section` is nullable only for legacy rows;
/// the catalog reader backfills those into a synthesized section on first
/// load. `weight` and `scale_max` are the canonical scoring columns; `meta`
/// is the deprecated legacy grab-bag read once by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub checklist: ChecklistId,
    pub section: Option<SectionId>,
    pub text: String,
    pub kind: QuestionKind,
    pub order: i32,
    pub required: bool,
    pub weight: Option<f64>,
    pub scale_max: Option<f64>,
    pub require_photo: bool,
    pub require_comment: bool,
    pub meta: Option<serde_json::Value>,
}

/// Employee profile as returned by the credential verifier / directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub tenant: TenantId,
    pub login: String,
    pub display_name: String,
    pub position: Option<String>,
}
