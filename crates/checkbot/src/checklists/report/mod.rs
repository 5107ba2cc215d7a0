//! Joins a finalized attempt with the checklist outline and the scoring
//! engine into a transport-agnostic report structure. Rendering to PDF or
//! Excel is a pure external function over [`ReportData`].

pub mod views;

use std::collections::HashMap;
use std::sync::Arc;

use super::catalog::{CatalogError, CatalogReader};
use super::domain::AttemptId;
use super::scoring::{self, ScoringEngine};
use super::storage::{AttemptRepository, CatalogRepository, StorageError};

pub use views::{ReportData, ReportRow};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("attempt not found")]
    AttemptNotFound,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("report rendering failed: {0}")]
    Failed(String),
}

/// Rendered export pair produced by the (external) document renderer.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub pdf: Vec<u8>,
    pub xlsx: Vec<u8>,
}

/// External collaborator: pure `ReportData -> bytes` document layout.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &ReportData) -> Result<RenderedReport, RenderError>;
}

pub struct ReportAssembler<C, A> {
    catalog: CatalogReader<C>,
    attempts: Arc<A>,
}

impl<C, A> Clone for ReportAssembler<C, A> {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            attempts: self.attempts.clone(),
        }
    }
}

impl<C, A> ReportAssembler<C, A>
where
    C: CatalogRepository,
    A: AttemptRepository,
{
    pub fn new(catalog: CatalogReader<C>, attempts: Arc<A>) -> Self {
        Self { catalog, attempts }
    }

    /// Assemble the report for a finalized attempt. Row order follows the
    /// checklist's section/question order at read time, not submission
    /// order.
    pub fn assemble(&self, attempt_id: &AttemptId) -> Result<ReportData, ReportError> {
        let attempt = self
            .attempts
            .attempt(attempt_id)?
            .ok_or(ReportError::AttemptNotFound)?;

        let outline = self.catalog.load(&attempt.checklist, attempt.submitted_at)?;
        let engine = ScoringEngine::for_checklist(&outline.checklist);

        let answers: HashMap<_, _> = self
            .attempts
            .answers(attempt_id)?
            .into_iter()
            .map(|a| (a.question.clone(), a))
            .collect();

        let mut rows = Vec::with_capacity(outline.question_count());
        for (section, question) in outline.flat_questions() {
            let answer = answers.get(&question.id);
            let raw = answer.and_then(|a| a.response_value.as_deref());
            let scored = engine.score(question, raw);
            rows.push(ReportRow {
                section: section.title.clone(),
                question_id: question.id.clone(),
                question: question.text.clone(),
                kind: question.kind,
                answer: answer.and_then(|a| a.response_value.clone()),
                comment: answer.and_then(|a| a.comment.clone()),
                photo_path: answer.and_then(|a| a.photo_path.clone()),
                score: scored.score,
                weight: scored.max_weight,
            });
        }

        let totals = ScoringEngine::totals(rows.iter().map(|row| scoring::QuestionScore {
            score: row.score,
            max_weight: row.weight,
        }));

        let completion_hint = if outline.checklist.is_scored {
            None
        } else {
            scoring::completion_hint(outline.flat_questions().into_iter().filter_map(
                |(_, question)| {
                    answers
                        .get(&question.id)
                        .and_then(|a| a.response_value.as_deref())
                        .map(|raw| (question, raw))
                },
            ))
        };

        Ok(ReportData {
            attempt: attempt.id,
            checklist: outline.checklist.id.clone(),
            checklist_name: outline.checklist.name.clone(),
            is_scored: outline.checklist.is_scored,
            user: attempt.user,
            department: attempt.department,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
            rows,
            totals,
            completion_hint,
        })
    }
}
