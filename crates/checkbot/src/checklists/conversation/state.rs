//! Session state as a tagged union: one variant per node of the flow, each
//! carrying exactly the fields valid in that node. Serializable so a host
//! can externalize sessions; the in-memory store here is per-process, with
//! drafts providing the durable half of the picture.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::events::PromptRef;
use crate::checklists::domain::{AttemptId, ChecklistId, DraftId, UserId};

/// Sub-modes of the answering node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnswerSubMode {
    /// Waiting for a button press or free text on the active question.
    Answering,
    /// User explicitly chose to type the answer.
    EnteringTextAnswer,
    AddingComment,
    AddingPhoto,
    /// Free text arrived on a text question; waiting for the user to say
    /// whether it was the answer or a comment. Cancel discards `pending`.
    DecidingTextIntent { pending: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    SelectingChecklist,
    SelectingDepartment {
        checklist: ChecklistId,
        draft: DraftId,
    },
    ChoosingMode {
        checklist: ChecklistId,
        draft: DraftId,
    },
    FullPreview {
        checklist: ChecklistId,
        draft: DraftId,
        page: usize,
    },
    AnsweringQuestion {
        checklist: ChecklistId,
        draft: DraftId,
        index: usize,
        sub: AnswerSubMode,
        /// On-screen element currently showing the question, if known.
        prompt: Option<PromptRef>,
    },
    Completed {
        checklist: ChecklistId,
        attempt: AttemptId,
    },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::SelectingChecklist => "selecting_checklist",
            SessionState::SelectingDepartment { .. } => "selecting_department",
            SessionState::ChoosingMode { .. } => "choosing_mode",
            SessionState::FullPreview { .. } => "full_preview",
            SessionState::AnsweringQuestion { .. } => "answering_question",
            SessionState::Completed { .. } => "completed",
        }
    }
}

/// Per-user session cells. The outer map lock is held only long enough to
/// fetch or insert a cell; each turn then runs under that user's own lock,
/// so sessions never block each other.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Arc<Mutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, user: &UserId) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        sessions
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::Idle)))
            .clone()
    }

    /// Current state snapshot, mainly for tests and diagnostics.
    pub fn snapshot(&self, user: &UserId) -> SessionState {
        self.cell(user)
            .lock()
            .expect("session cell poisoned")
            .clone()
    }
}
