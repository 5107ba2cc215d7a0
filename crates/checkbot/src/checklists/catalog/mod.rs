//! Read-side view of a checklist: ordered sections and questions, plus the
//! one-time cleanup passes (section backfill, legacy-meta normalization)
//! that happen at the storage boundary so the rest of the crate only ever
//! sees the canonical model.

pub mod import;
mod normalize;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{Checklist, ChecklistId, Question, QuestionId, Section, SectionId, TenantId};
use super::storage::{CatalogRepository, StorageError};

/// Title of the section synthesized for legacy unsectioned questions.
pub const BACKFILL_SECTION_TITLE: &str = "General";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("checklist not found")]
    ChecklistNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One section with its questions in answer order.
#[derive(Debug, Clone)]
pub struct SectionOutline {
    pub section: Section,
    pub questions: Vec<Question>,
}

/// The full ordered tree for one checklist, used to drive the conversation
/// and the report assembler. Section boundaries are metadata for the
/// step-by-step flat view and pages for the full-preview mode.
#[derive(Debug, Clone)]
pub struct ChecklistOutline {
    pub checklist: Checklist,
    pub sections: Vec<SectionOutline>,
}

impl ChecklistOutline {
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// Flat checklist-order view: section order, then question order within.
    pub fn flat_questions(&self) -> Vec<(&Section, &Question)> {
        self.sections
            .iter()
            .flat_map(|outline| {
                outline
                    .questions
                    .iter()
                    .map(move |question| (&outline.section, question))
            })
            .collect()
    }

    pub fn question_at(&self, index: usize) -> Option<(&Section, &Question)> {
        self.flat_questions().into_iter().nth(index)
    }

    pub fn position_of(&self, question: &QuestionId) -> Option<usize> {
        self.flat_questions()
            .iter()
            .position(|(_, q)| &q.id == question)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section_at(&self, index: usize) -> Option<&SectionOutline> {
        self.sections.get(index)
    }
}

/// Loads checklist outlines, applying the backfill and normalization passes.
pub struct CatalogReader<C> {
    repository: Arc<C>,
}

impl<C> Clone for CatalogReader<C> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<C: CatalogRepository> CatalogReader<C> {
    pub fn new(repository: Arc<C>) -> Self {
        Self { repository }
    }

    pub fn checklists_for_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<Checklist>, CatalogError> {
        let mut checklists = self.repository.checklists_for_tenant(tenant)?;
        checklists.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(checklists)
    }

    pub fn departments(&self, tenant: &TenantId) -> Result<Vec<String>, CatalogError> {
        Ok(self.repository.departments(tenant)?)
    }

    /// Load the ordered tree for a checklist. Legacy unsectioned questions
    /// are assigned to a synthesized "General" section (idempotent: an
    /// existing section with that title is reused), and legacy `meta`
    /// scoring fields are folded into the canonical columns once.
    pub fn load(&self, id: &ChecklistId, now: DateTime<Utc>) -> Result<ChecklistOutline, CatalogError> {
        let checklist = self
            .repository
            .checklist(id)?
            .ok_or(CatalogError::ChecklistNotFound)?;

        let mut sections = self.repository.sections(id)?;
        sections.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.0.cmp(&b.id.0)));

        let mut questions = self.repository.questions(id)?;
        questions.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.0.cmp(&b.id.0)));

        self.backfill_sections(id, &mut sections, &mut questions, now)?;
        self.normalize_scoring(&mut questions)?;

        let outlines = sections
            .into_iter()
            .map(|section| {
                let owned: Vec<Question> = questions
                    .iter()
                    .filter(|q| q.section.as_ref() == Some(&section.id))
                    .cloned()
                    .collect();
                SectionOutline {
                    section,
                    questions: owned,
                }
            })
            .collect();

        Ok(ChecklistOutline {
            checklist,
            sections: outlines,
        })
    }

    fn backfill_sections(
        &self,
        checklist: &ChecklistId,
        sections: &mut Vec<Section>,
        questions: &mut [Question],
        now: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        if questions.iter().all(|q| q.section.is_some()) {
            return Ok(());
        }

        let general = match sections
            .iter()
            .find(|s| s.title == BACKFILL_SECTION_TITLE)
            .cloned()
        {
            Some(existing) => existing,
            None => {
                let next_order = sections.iter().map(|s| s.order).max().unwrap_or(0) + 1;
                let created = self.repository.insert_section(Section {
                    id: SectionId(format!("{}-general-{}", checklist.0, now.timestamp())),
                    checklist: checklist.clone(),
                    title: BACKFILL_SECTION_TITLE.to_string(),
                    description: None,
                    order: next_order,
                    is_required: false,
                })?;
                sections.push(created.clone());
                created
            }
        };

        for question in questions.iter_mut().filter(|q| q.section.is_none()) {
            self.repository.assign_section(&question.id, &general.id)?;
            question.section = Some(general.id.clone());
        }

        Ok(())
    }

    fn normalize_scoring(&self, questions: &mut [Question]) -> Result<(), CatalogError> {
        for question in questions.iter_mut() {
            let canonical = normalize::canonical_scoring(question);
            if canonical.weight == question.weight && canonical.scale_max == question.scale_max {
                continue;
            }
            self.repository.update_question_scoring(
                &question.id,
                canonical.weight,
                canonical.scale_max,
            )?;
            question.weight = canonical.weight;
            question.scale_max = canonical.scale_max;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryCatalog;
    use super::*;
    use crate::checklists::domain::{QuestionKind, UserId};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn checklist(id: &str) -> Checklist {
        Checklist {
            id: ChecklistId(id.to_string()),
            tenant: TenantId("acme".to_string()),
            name: "Store audit".to_string(),
            is_scored: true,
            created_by: UserId("admin".to_string()),
            created_at: now(),
        }
    }

    fn question(id: &str, section: Option<&str>, order: i32) -> Question {
        Question {
            id: QuestionId(id.to_string()),
            checklist: ChecklistId("cl-1".to_string()),
            section: section.map(|s| SectionId(s.to_string())),
            text: format!("Question {id}"),
            kind: QuestionKind::YesNo,
            order,
            required: true,
            weight: None,
            scale_max: None,
            require_photo: false,
            require_comment: false,
            meta: None,
        }
    }

    fn seeded_reader() -> CatalogReader<MemoryCatalog> {
        let repo = MemoryCatalog::default();
        repo.insert_checklist(checklist("cl-1")).expect("seed");
        CatalogReader::new(Arc::new(repo))
    }

    #[test]
    fn backfill_is_idempotent() {
        let reader = seeded_reader();
        reader
            .repository
            .insert_question(question("q-1", None, 1))
            .expect("seed");
        reader
            .repository
            .insert_question(question("q-2", None, 2))
            .expect("seed");

        let first = reader
            .load(&ChecklistId("cl-1".to_string()), now())
            .expect("first load");
        let second = reader
            .load(&ChecklistId("cl-1".to_string()), now())
            .expect("second load");

        assert_eq!(first.section_count(), 1);
        assert_eq!(second.section_count(), 1);
        assert_eq!(second.sections[0].section.title, BACKFILL_SECTION_TITLE);
        assert_eq!(second.question_count(), 2);
    }

    #[test]
    fn flat_view_preserves_section_then_question_order() {
        let reader = seeded_reader();
        // section B is seeded first and ordered first, despite the titles
        for (idx, title) in ["B", "A"].iter().enumerate() {
            reader
                .repository
                .insert_section(Section {
                    id: SectionId(format!("s-{title}")),
                    checklist: ChecklistId("cl-1".to_string()),
                    title: title.to_string(),
                    description: None,
                    order: (idx + 1) as i32,
                    is_required: false,
                })
                .expect("seed");
        }
        reader
            .repository
            .insert_question(question("q-late", Some("s-A"), 1))
            .expect("seed");
        reader
            .repository
            .insert_question(question("q-early", Some("s-B"), 2))
            .expect("seed");

        let outline = reader
            .load(&ChecklistId("cl-1".to_string()), now())
            .expect("load");

        let flat: Vec<&str> = outline
            .flat_questions()
            .iter()
            .map(|(_, q)| q.id.0.as_str())
            .collect();
        // section B has order 1, so its question comes first
        assert_eq!(flat, vec!["q-early", "q-late"]);
        assert_eq!(outline.position_of(&QuestionId("q-late".to_string())), Some(1));
    }

    #[test]
    fn legacy_meta_is_folded_into_canonical_columns() {
        let reader = seeded_reader();
        let mut legacy = question("q-legacy", None, 1);
        legacy.kind = QuestionKind::Scale;
        legacy.meta = Some(json!({ "баллы": "7", "options": [1, 2, 3, 4, 5] }));
        reader.repository.insert_question(legacy).expect("seed");

        let outline = reader
            .load(&ChecklistId("cl-1".to_string()), now())
            .expect("load");

        let (_, q) = outline.question_at(0).expect("question present");
        assert_eq!(q.weight, Some(7.0));
        assert_eq!(q.scale_max, Some(5.0));

        // persisted, not just projected
        let stored = reader
            .repository
            .questions(&ChecklistId("cl-1".to_string()))
            .expect("stored rows");
        assert_eq!(stored[0].weight, Some(7.0));
        assert_eq!(stored[0].scale_max, Some(5.0));
    }
}
