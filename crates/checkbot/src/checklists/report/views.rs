use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checklists::domain::{AttemptId, ChecklistId, QuestionId, QuestionKind, UserId};
use crate::checklists::scoring::AttemptTotals;

/// One line of the report: the question in catalog order joined with
/// whatever the attempt recorded for it. Questions added after the attempt
/// completed appear with every answer field empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub section: String,
    pub question_id: QuestionId,
    pub question: String,
    pub kind: QuestionKind,
    pub answer: Option<String>,
    pub comment: Option<String>,
    pub photo_path: Option<String>,
    pub score: Option<f64>,
    pub weight: Option<f64>,
}

/// Transport-agnostic report payload handed to the export renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub attempt: AttemptId,
    pub checklist: ChecklistId,
    pub checklist_name: String,
    pub is_scored: bool,
    pub user: UserId,
    pub department: Option<String>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    /// `None` when no question carried weight, as opposed to a 0% result.
    pub totals: Option<AttemptTotals>,
    /// Soft completion estimate for unscored checklists. Display only.
    pub completion_hint: Option<u8>,
}
