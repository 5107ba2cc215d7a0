use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use checkbot::checklists::auth::{CredentialVerifier, UserDirectory};
use checkbot::checklists::conversation::PhotoRef;
use checkbot::checklists::domain::{
    AttemptId, Checklist, ChecklistId, DraftId, Question, QuestionId, QuestionKind, Section,
    SectionId, TenantId, UserId, UserProfile,
};
use checkbot::checklists::media::{MediaError, MediaStore};
use checkbot::checklists::storage::{
    AttemptRecord, AttemptRepository, CatalogRepository, DraftAnswerRecord, DraftRecord,
    DraftRepository, QuestionAnswerRecord, StorageError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

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

/// Single-process storage adapter. One mutex guards the whole store, which
/// trivially satisfies the upsert-uniqueness and finalize-atomicity
/// contracts; a relational adapter would map these to constraints and a
/// transaction instead.
#[derive(Default)]
pub(crate) struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    fn upsert_answer(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        at: DateTime<Utc>,
        apply: impl FnOnce(&mut DraftAnswerRecord),
    ) -> Result<(), StorageError> {
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

impl CatalogRepository for InMemoryStore {
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
        let mut inner = self.lock();
        if inner.checklists.contains_key(&checklist.id) {
            return Err(StorageError::Conflict);
        }
        inner
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

impl DraftRepository for InMemoryStore {
    fn create_or_get(
        &self,
        user: &UserId,
        checklist: &ChecklistId,
        started_at: DateTime<Utc>,
    ) -> Result<DraftRecord, StorageError> {
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
        self.upsert_answer(draft, question, at, |a| a.response_value = Some(value))
    }

    fn upsert_answer_comment(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        comment: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.upsert_answer(draft, question, at, |a| a.comment = Some(comment))
    }

    fn upsert_answer_photo(
        &self,
        draft: &DraftId,
        question: &QuestionId,
        photo_path: String,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.upsert_answer(draft, question, at, |a| a.photo_path = Some(photo_path))
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

impl AttemptRepository for InMemoryStore {
    fn finalize_draft(
        &self,
        draft: &DraftId,
        submitted_at: DateTime<Utc>,
    ) -> Result<AttemptRecord, StorageError> {
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
        Ok(self
            .lock()
            .attempt_answers
            .iter()
            .filter(|a| &a.attempt == attempt)
            .cloned()
            .collect())
    }
}

/// Maps transport photo references under the configured media root. A real
/// deployment would download the file from the chat platform here.
pub(crate) struct LocalMediaStore {
    root: String,
}

impl LocalMediaStore {
    pub(crate) fn new(root: String) -> Self {
        Self { root }
    }
}

impl MediaStore for LocalMediaStore {
    fn store(&self, photo: &PhotoRef) -> Result<String, MediaError> {
        if photo.0.trim().is_empty() {
            return Err(MediaError::Fetch("empty photo reference".to_string()));
        }
        Ok(format!("{}/{}", self.root.trim_end_matches('/'), photo.0))
    }
}

/// Demo directory and verifier over a static user table.
pub(crate) struct StaticDirectory {
    users: Vec<(UserProfile, String)>,
}

impl StaticDirectory {
    pub(crate) fn demo() -> Self {
        let tenant = TenantId("acme".to_string());
        Self {
            users: vec![
                (
                    UserProfile {
                        id: UserId("u-1".to_string()),
                        tenant: tenant.clone(),
                        login: "dana".to_string(),
                        display_name: "Dana Inspector".to_string(),
                        position: Some("Shift lead".to_string()),
                    },
                    "audit123".to_string(),
                ),
                (
                    UserProfile {
                        id: UserId("u-2".to_string()),
                        tenant,
                        login: "sasha".to_string(),
                        display_name: "Sasha Keeper".to_string(),
                        position: None,
                    },
                    "letmein".to_string(),
                ),
            ],
        }
    }
}

impl UserDirectory for StaticDirectory {
    fn user(&self, id: &UserId) -> Result<Option<UserProfile>, StorageError> {
        Ok(self
            .users
            .iter()
            .find(|(profile, _)| &profile.id == id)
            .map(|(profile, _)| profile.clone()))
    }
}

impl CredentialVerifier for StaticDirectory {
    fn verify(&self, login: &str, password: &str) -> Option<UserProfile> {
        self.users
            .iter()
            .find(|(profile, secret)| profile.login == login && secret == password)
            .map(|(profile, _)| profile.clone())
    }
}

/// Seed the demo tenant: the scored "Store Safety Audit" (one question still
/// carrying legacy meta, exercised by the load-time normalization) and an
/// unscored walkthrough with legacy unsectioned questions.
pub(crate) fn seed_demo_data(store: &InMemoryStore) {
    let tenant = TenantId("acme".to_string());
    let created_at = Utc::now();

    let safety = ChecklistId("cl-safety".to_string());
    store
        .insert_checklist(Checklist {
            id: safety.clone(),
            tenant: tenant.clone(),
            name: "Store Safety Audit".to_string(),
            is_scored: true,
            created_by: UserId("admin".to_string()),
            created_at,
        })
        .expect("seed checklist");
    store
        .insert_section(Section {
            id: SectionId("s-main".to_string()),
            checklist: safety.clone(),
            title: "Main".to_string(),
            description: Some("Walk the floor front to back.".to_string()),
            order: 1,
            is_required: false,
        })
        .expect("seed section");
    store
        .insert_question(Question {
            id: QuestionId("q-ext".to_string()),
            checklist: safety.clone(),
            section: Some(SectionId("s-main".to_string())),
            text: "Fire extinguisher present and charged?".to_string(),
            kind: QuestionKind::YesNo,
            order: 1,
            required: true,
            weight: Some(4.0),
            scale_max: None,
            require_photo: true,
            require_comment: false,
            meta: None,
        })
        .expect("seed question");
    store
        .insert_question(Question {
            id: QuestionId("q-clean".to_string()),
            checklist: safety,
            section: Some(SectionId("s-main".to_string())),
            text: "Cleanliness rating".to_string(),
            kind: QuestionKind::Scale,
            order: 2,
            required: true,
            weight: None,
            scale_max: None,
            require_photo: false,
            require_comment: false,
            // legacy shape: weight and range live in meta until first load
            meta: Some(serde_json::json!({ "баллы": 6, "range": "1-5" })),
        })
        .expect("seed question");

    let walkthrough = ChecklistId("cl-walkthrough".to_string());
    store
        .insert_checklist(Checklist {
            id: walkthrough.clone(),
            tenant: tenant.clone(),
            name: "Morning Walkthrough".to_string(),
            is_scored: false,
            created_by: UserId("admin".to_string()),
            created_at,
        })
        .expect("seed checklist");
    // legacy unsectioned questions: the catalog reader backfills them
    store
        .insert_question(Question {
            id: QuestionId("q-lights".to_string()),
            checklist: walkthrough.clone(),
            section: None,
            text: "All lights working?".to_string(),
            kind: QuestionKind::YesNo,
            order: 1,
            required: true,
            weight: None,
            scale_max: None,
            require_photo: false,
            require_comment: false,
            meta: None,
        })
        .expect("seed question");
    store
        .insert_question(Question {
            id: QuestionId("q-notes".to_string()),
            checklist: walkthrough,
            section: None,
            text: "Anything to hand over to the next shift?".to_string(),
            kind: QuestionKind::LongText,
            order: 2,
            required: false,
            weight: None,
            scale_max: None,
            require_photo: false,
            require_comment: false,
            meta: None,
        })
        .expect("seed question");

    store.lock().departments.insert(
        tenant,
        vec![
            "Bakery".to_string(),
            "Deli".to_string(),
            "Front end".to_string(),
        ],
    );
}
