use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::checklists::conversation::events::{
    AnswerButton, CallbackToken, InboundEvent, ModeChoice, OutboundCommand, PhotoRef, QuestionNav,
};
use crate::checklists::conversation::ConversationEngine;
use crate::checklists::domain::{
    AttemptId, Checklist, ChecklistId, DraftId, Question, QuestionId, QuestionKind, Section,
    SectionId, TenantId, UserId, UserProfile,
};
use crate::checklists::media::{MediaError, MediaStore};
use crate::checklists::storage::{
    AttemptRecord, AttemptRepository, CatalogRepository, DraftAnswerRecord, DraftRecord,
    DraftRepository, QuestionAnswerRecord, StorageError,
};

#[derive(Default)]
struct StoreInner {
    checklists: HashMap<ChecklistId, Checklist>,
    sections: Vec<Section>,
    questions: Vec<Question>,
    departments: HashMap<TenantId, Vec<String>>,
    drafts: Vec<DraftRecord>,
    draft_answers: Vec<DraftAnswerRecord>,
    attempts: Vec<AttemptRecord>,
    attempt_answers: Vec<QuestionAnswerRecord>,
    draft_seq: u64,
    attempt_seq: u64,
}

/// Single-lock in-memory store implementing all three repositories, so
/// finalize really is atomic and constraint-backed upserts really converge.
#[derive(Default)]
pub(super) struct MemoryStore {
    inner: Mutex<StoreInner>,
    /// When set, every draft write fails as transient.
    pub(super) fail_writes: AtomicBool,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    fn check_writes(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    pub(super) fn remove_checklist(&self, id: &ChecklistId) {
        self.lock().checklists.remove(id);
    }

    pub(super) fn draft_for(&self, user: &UserId, checklist: &ChecklistId) -> Option<DraftRecord> {
        self.lock()
            .drafts
            .iter()
            .find(|d| &d.user == user && &d.checklist == checklist)
            .cloned()
    }

    pub(super) fn attempt_answers(&self, attempt: &AttemptId) -> Vec<QuestionAnswerRecord> {
        self.lock()
            .attempt_answers
            .iter()
            .filter(|a| &a.attempt == attempt)
            .cloned()
            .collect()
    }

    pub(super) fn attempts(&self) -> Vec<AttemptRecord> {
        self.lock().attempts.clone()
    }
}

impl CatalogRepository for MemoryStore {
    fn checklist(&self, id: &ChecklistId) -> Result<Option<Checklist>, StorageError> {
        Ok(self.lock().checklists.get(id).cloned())
    }

    fn checklists_for_tenant(&self, tenant: &TenantId) -> Result<Vec<Checklist>, StorageError> {
        Ok(self
            .lock()
            .checklists
            .values()
            .filter(|c| &c.tenant == tenant)
            .cloned()
            .collect())
    }

    fn sections(&self, checklist: &ChecklistId) -> Result<Vec<Section>, StorageError> {
        Ok(self
            .lock()
            .sections
            .iter()
            .filter(|s| &s.checklist == checklist)
            .cloned()
            .collect())
    }

    fn questions(&self, checklist: &ChecklistId) -> Result<Vec<Question>, StorageError> {
        Ok(self
            .lock()
            .questions
            .iter()
            .filter(|q| &q.checklist == checklist)
            .cloned()
            .collect())
    }

    fn insert_checklist(&self, checklist: Checklist) -> Result<Checklist, StorageError> {
        self.lock()
            .checklists
            .insert(checklist.id.clone(), checklist.clone());
        Ok(checklist)
    }

    fn insert_section(&self, section: Section) -> Result<Section, StorageError> {
        self.lock().sections.push(section.clone());
        Ok(section)
    }

    fn insert_question(&self, question: Question) -> Result<Question, StorageError> {
        self.lock().questions.push(question.clone());
        Ok(question)
    }

    fn assign_section(
        &self,
        question: &QuestionId,
        section: &SectionId,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let found = inner
            .questions
            .iter_mut()
            .find(|q| &q.id == question)
            .ok_or(StorageError::NotFound)?;
        found.section = Some(section.clone());
        Ok(())
    }

    fn update_question_scoring(
        &self,
        question: &QuestionId,
        weight: Option<f64>,
        scale_max: Option<f64>,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let found = inner
            .questions
            .iter_mut()
            .find(|q| &q.id == question)
            .ok_or(StorageError::NotFound)?;
        found.weight = weight;
        found.scale_max = scale_max;
        Ok(())
    }

    fn departments(&self, tenant: &TenantId) -> Result<Vec<String>, StorageError> {
        Ok(self
            .lock()
            .departments
            .get(tenant)
            .cloned()
            .unwrap_or_default())
    }
}

impl DraftRepository for MemoryStore {
    fn create_or_get(
        &self,
        user: &UserId,
        checklist: &ChecklistId,
        started_at: DateTime<Utc>,
    ) -> Result<DraftRecord, StorageError> {
        self.check_writes()?;
        let mut inner = self.lock();
        if let Some(existing) = inner
            .drafts
            .iter()
            .find(|d| &d.user == user && &d.checklist == checklist)
        {
            return Ok(existing.clone());
        }
        inner.draft_seq += 1;
        let record = DraftRecord {
            id: DraftId(format!("d-{:04}", inner.draft_seq)),
            user: user.clone(),
            checklist: checklist.clone(),
            department: None,
            started_at,
            updated_at: started_at,
        };
        inner.drafts.push(record.clone());
        Ok(record)
    }

    fn draft(&self, id: &DraftId) -> Result<Option<DraftRecord>, StorageError> {
        Ok(self.lock().drafts.iter().find(|d| &d.id == id).cloned())
    }

    fn set_department(
        &self,
        draft: &DraftId,
        department: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.check_writes()?;
        let mut inner = self.lock();
        let found = inner
            .drafts
            .iter_mut()
            .find(|d| &d.id == draft)
            .ok_or(StorageError::NotFound)?;
        found.department = Some(department);
        found.updated_at = at;
        Ok(())
    }

    fn upsert_answer_value(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        value: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.upsert(draft, question, at, |answer| {
            answer.response_value = Some(value);
        })
    }

    fn upsert_answer_comment(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        comment: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.upsert(draft, question, at, |answer| {
            answer.comment = Some(comment);
        })
    }

    fn upsert_answer_photo(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        photo_path: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.upsert(draft, question, at, |answer| {
            answer.photo_path = Some(photo_path);
        })
    }

    fn answers(&self, draft: &DraftId) -> Result<Vec<DraftAnswerRecord>, StorageError> {
        Ok(self
            .lock()
            .draft_answers
            .iter()
            .filter(|a| &a.draft == draft)
            .cloned()
            .collect())
    }

    fn delete(&self, draft: &DraftId) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let before = inner.drafts.len();
        inner.drafts.retain(|d| &d.id != draft);
        if inner.drafts.len() == before {
            return Err(StorageError::NotFound);
        }
        inner.draft_answers.retain(|a| &a.draft != draft);
        Ok(())
    }

    fn stale(&self, older_than: DateTime<Utc>) -> Result<Vec<DraftRecord>, StorageError> {
        Ok(self
            .lock()
            .drafts
            .iter()
            .filter(|d| d.updated_at < older_than)
            .cloned()
            .collect())
    }
}

impl MemoryStore {
    fn upsert(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        at: DateTime<Utc>,
        apply: impl FnOnce(&mut DraftAnswerRecord),
    ) -> Result<(), StorageError> {
        self.check_writes()?;
        let mut inner = self.lock();
        if !inner.drafts.iter().any(|d| &d.id == draft) {
            return Err(StorageError::NotFound);
        }
        let position = inner
            .draft_answers
            .iter()
            .position(|a| &a.draft == draft && &a.question == question);
        match position {
            Some(idx) => {
                let answer = &mut inner.draft_answers[idx];
                apply(answer);
                answer.updated_at = at;
            }
            None => {
                let mut answer = DraftAnswerRecord::empty(draft.clone(), question.clone(), at);
                apply(&mut answer);
                inner.draft_answers.push(answer);
            }
        }
        if let Some(record) = inner.drafts.iter_mut().find(|d| &d.id == draft) {
            record.updated_at = at;
        }
        Ok(())
    }
}

impl AttemptRepository for MemoryStore {
    fn finalize_draft(
        &self,
        draft: &DraftId,
        submitted_at: DateTime<Utc>,
    ) -> Result<AttemptRecord, StorageError> {
        self.check_writes()?;
        let mut inner = self.lock();
        let position = inner
            .drafts
            .iter()
            .position(|d| &d.id == draft)
            .ok_or(StorageError::NotFound)?;
        let record = inner.drafts.remove(position);
        inner.attempt_seq += 1;
        let attempt = AttemptRecord {
            id: AttemptId(format!("at-{:04}", inner.attempt_seq)),
            checklist: record.checklist,
            user: record.user,
            department: record.department,
            started_at: record.started_at,
            submitted_at,
            is_submitted: true,
        };
        let copied: Vec<QuestionAnswerRecord> = inner
            .draft_answers
            .iter()
            .filter(|a| &a.draft == draft)
            .map(|a| QuestionAnswerRecord {
                attempt: attempt.id.clone(),
                question: a.question.clone(),
                response_value: a.response_value.clone(),
                comment: a.comment.clone(),
                photo_path: a.photo_path.clone(),
                created_at: submitted_at,
            })
            .collect();
        inner.draft_answers.retain(|a| &a.draft != draft);
        inner.attempt_answers.extend(copied);
        inner.attempts.push(attempt.clone());
        Ok(attempt)
    }

    fn attempt(&self, id: &AttemptId) -> Result<Option<AttemptRecord>, StorageError> {
        Ok(self.lock().attempts.iter().find(|a| &a.id == id).cloned())
    }

    fn answers(&self, attempt: &AttemptId) -> Result<Vec<QuestionAnswerRecord>, StorageError> {
        Ok(self.attempt_answers(attempt))
    }
}

#[derive(Default)]
pub(super) struct MemoryMedia;

impl MediaStore for MemoryMedia {
    fn store(&self, photo: &PhotoRef) -> Result<String, MediaError> {
        Ok(format!("media/{}", photo.0))
    }
}

pub(super) struct FailingMedia;

impl MediaStore for FailingMedia {
    fn store(&self, _photo: &PhotoRef) -> Result<String, MediaError> {
        Err(MediaError::Fetch("simulated download failure".to_string()))
    }
}

pub(super) fn now() -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339("2026-03-02T10:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub(super) fn employee() -> UserProfile {
    UserProfile {
        id: UserId("u-1".to_string()),
        tenant: TenantId("acme".to_string()),
        login: "inspector".to_string(),
        display_name: "Dana Inspector".to_string(),
        position: Some("Shift lead".to_string()),
    }
}

fn base_question(id: &str, checklist: &str, order: i32, kind: QuestionKind) -> Question {
    Question {
        id: QuestionId(id.to_string()),
        checklist: ChecklistId(checklist.to_string()),
        section: Some(SectionId(format!("{checklist}-s1"))),
        text: format!("Question {id}"),
        kind,
        order,
        required: true,
        weight: None,
        scale_max: None,
        require_photo: false,
        require_comment: false,
        meta: None,
    }
}

/// The "Safety Audit" fixture: scored, one yes/no question (weight 4,
/// photo required) and one 1-5 scale question (weight 6).
pub(super) fn seed_safety_audit(store: &MemoryStore) -> ChecklistId {
    let id = ChecklistId("cl-safety".to_string());
    store
        .insert_checklist(Checklist {
            id: id.clone(),
            tenant: TenantId("acme".to_string()),
            name: "Safety Audit".to_string(),
            is_scored: true,
            created_by: UserId("admin".to_string()),
            created_at: now(),
        })
        .expect("seed checklist");
    store
        .insert_section(Section {
            id: SectionId("cl-safety-s1".to_string()),
            checklist: id.clone(),
            title: "Main".to_string(),
            description: None,
            order: 1,
            is_required: false,
        })
        .expect("seed section");

    let mut q1 = base_question("q-ext", "cl-safety", 1, QuestionKind::YesNo);
    q1.text = "Fire extinguisher present?".to_string();
    q1.weight = Some(4.0);
    q1.require_photo = true;
    store.insert_question(q1).expect("seed question");

    let mut q2 = base_question("q-clean", "cl-safety", 2, QuestionKind::Scale);
    q2.text = "Cleanliness rating".to_string();
    q2.weight = Some(6.0);
    q2.scale_max = Some(5.0);
    store.insert_question(q2).expect("seed question");

    store
        .lock()
        .departments
        .insert(TenantId("acme".to_string()), vec!["Bakery".to_string(), "Deli".to_string()]);

    id
}

/// Three-question checklist with a trailing text question, for resume and
/// intent-disambiguation scenarios.
pub(super) fn seed_walkthrough(store: &MemoryStore) -> ChecklistId {
    let id = ChecklistId("cl-walk".to_string());
    store
        .insert_checklist(Checklist {
            id: id.clone(),
            tenant: TenantId("acme".to_string()),
            name: "Morning Walkthrough".to_string(),
            is_scored: false,
            created_by: UserId("admin".to_string()),
            created_at: now(),
        })
        .expect("seed checklist");
    store
        .insert_section(Section {
            id: SectionId("cl-walk-s1".to_string()),
            checklist: id.clone(),
            title: "Floor".to_string(),
            description: None,
            order: 1,
            is_required: false,
        })
        .expect("seed section");

    let q1 = base_question("q-lights", "cl-walk", 1, QuestionKind::YesNo);
    store.insert_question(q1).expect("seed question");

    let mut q2 = base_question("q-stock", "cl-walk", 2, QuestionKind::Scale);
    q2.scale_max = Some(5.0);
    store.insert_question(q2).expect("seed question");

    let mut q3 = base_question("q-notes", "cl-walk", 3, QuestionKind::ShortText);
    q3.require_comment = true;
    store.insert_question(q3).expect("seed question");

    id
}

pub(super) fn engine(store: Arc<MemoryStore>) -> ConversationEngine<MemoryStore, MemoryMedia> {
    ConversationEngine::new(store, Arc::new(MemoryMedia))
}

pub(super) fn text(message: &str) -> InboundEvent {
    InboundEvent::Text {
        text: message.to_string(),
    }
}

pub(super) fn photo(reference: &str) -> InboundEvent {
    InboundEvent::Photo {
        photo: PhotoRef(reference.to_string()),
    }
}

pub(super) fn button(token: &CallbackToken) -> InboundEvent {
    InboundEvent::Button {
        token: token.encode(),
    }
}

/// Drive a fresh session from the menu to the first question of the given
/// checklist.
pub(super) fn begin_run(
    engine: &ConversationEngine<MemoryStore, MemoryMedia>,
    user: &UserProfile,
    checklist: &ChecklistId,
) {
    engine.handle(user, button(&CallbackToken::Checklist(checklist.clone())), now());
    engine.handle(
        user,
        button(&CallbackToken::Department("Bakery".to_string())),
        now(),
    );
    engine.handle(
        user,
        button(&CallbackToken::Mode(ModeChoice::StepByStep)),
        now(),
    );
}

/// Complete the whole safety-audit fixture, returning the attempt id.
pub(super) fn complete_safety_run(
    engine: &ConversationEngine<MemoryStore, MemoryMedia>,
    user: &UserProfile,
    checklist: &ChecklistId,
) -> AttemptId {
    begin_run(engine, user, checklist);
    engine.handle(user, button(&CallbackToken::Answer(AnswerButton::Yes)), now());
    engine.handle(user, photo("file-77"), now());
    engine.handle(user, button(&CallbackToken::Nav(QuestionNav::Next)), now());
    engine.handle(
        user,
        button(&CallbackToken::Answer(AnswerButton::Scale(4))),
        now(),
    );
    engine.handle(user, button(&CallbackToken::Nav(QuestionNav::Next)), now());
    match engine.session(&user.id) {
        crate::checklists::conversation::SessionState::Completed { attempt, .. } => attempt,
        other => panic!("expected completed session, got {other:?}"),
    }
}

/// Concatenated text of every command, for coarse content assertions.
pub(super) fn rendered(commands: &[OutboundCommand]) -> String {
    commands
        .iter()
        .map(|command| match command {
            OutboundCommand::Send { text, .. } => text.clone(),
            OutboundCommand::Edit { text, .. } => text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}
