//! CSV checklist-template importer. This is where the legacy alias soup is
//! allowed to live: header names, question-type spellings, weight aliases,
//! and `"lo-hi"` scale ranges are all resolved here, once, and the stored
//! rows carry canonical columns only.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::normalize;
use crate::checklists::domain::{
    Checklist, ChecklistId, Question, QuestionId, QuestionKind, Section, SectionId, TenantId,
    UserId,
};
use crate::checklists::storage::{CatalogRepository, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid checklist CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("row {line}: {reason}")]
    InvalidRow { line: usize, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parameters describing the checklist being created.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub tenant: TenantId,
    pub name: String,
    pub is_scored: bool,
    pub created_by: UserId,
}

static IMPORT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_checklist_id() -> ChecklistId {
    let id = IMPORT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ChecklistId(format!("cl-import-{id:04}"))
}

const SECTION_HEADERS: &[&str] = &["section", "раздел"];
const TEXT_HEADERS: &[&str] = &["question", "text", "вопрос"];
const KIND_HEADERS: &[&str] = &["type", "kind", "тип"];
const SCALE_HEADERS: &[&str] = &["scale_max", "scale", "max", "range", "шкала"];
const REQUIRED_HEADERS: &[&str] = &["required", "mandatory", "обязательный"];
const PHOTO_HEADERS: &[&str] = &["photo", "require_photo", "фото"];
const COMMENT_HEADERS: &[&str] = &["require_comment", "comment_required", "комментарий"];

/// Imports a legacy CSV export into a fresh checklist, returning its id.
pub struct ChecklistCsvImporter<C> {
    repository: Arc<C>,
}

impl<C: CatalogRepository> ChecklistCsvImporter<C> {
    pub fn new(repository: Arc<C>) -> Self {
        Self { repository }
    }

    pub fn from_reader<R: Read>(
        &self,
        reader: R,
        request: ImportRequest,
        now: DateTime<Utc>,
    ) -> Result<ChecklistId, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let columns = Columns::locate(&headers)?;

        let mut rows = Vec::new();
        for (offset, record) in csv_reader.records().enumerate() {
            let record = record?;
            // header is line 1
            let line = offset + 2;
            rows.push(columns.parse_row(&record, line)?);
        }

        let checklist_id = next_checklist_id();
        self.repository.insert_checklist(Checklist {
            id: checklist_id.clone(),
            tenant: request.tenant,
            name: request.name,
            is_scored: request.is_scored,
            created_by: request.created_by,
            created_at: now,
        })?;

        let mut section_ids: Vec<(String, SectionId)> = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let section_id = match section_ids.iter().find(|(title, _)| title == &row.section) {
                Some((_, id)) => id.clone(),
                None => {
                    let id = SectionId(format!("{}-s{}", checklist_id.0, section_ids.len() + 1));
                    self.repository.insert_section(Section {
                        id: id.clone(),
                        checklist: checklist_id.clone(),
                        title: row.section.clone(),
                        description: None,
                        order: (section_ids.len() + 1) as i32,
                        is_required: false,
                    })?;
                    section_ids.push((row.section.clone(), id.clone()));
                    id
                }
            };

            self.repository.insert_question(Question {
                id: QuestionId(format!("{}-q{}", checklist_id.0, index + 1)),
                checklist: checklist_id.clone(),
                section: Some(section_id),
                text: row.text.clone(),
                kind: row.kind,
                order: (index + 1) as i32,
                required: row.required,
                weight: row.weight,
                scale_max: row.scale_max,
                require_photo: row.require_photo,
                require_comment: row.require_comment,
                meta: None,
            })?;
        }

        Ok(checklist_id)
    }
}

struct Columns {
    section: Option<usize>,
    text: usize,
    kind: usize,
    weight: Option<usize>,
    scale: Option<usize>,
    required: Option<usize>,
    photo: Option<usize>,
    comment: Option<usize>,
}

struct ParsedRow {
    section: String,
    text: String,
    kind: QuestionKind,
    weight: Option<f64>,
    scale_max: Option<f64>,
    required: bool,
    require_photo: bool,
    require_comment: bool,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, ImportError> {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
        };

        Ok(Self {
            section: find(SECTION_HEADERS),
            text: find(TEXT_HEADERS).ok_or(ImportError::MissingColumn("question"))?,
            kind: find(KIND_HEADERS).ok_or(ImportError::MissingColumn("type"))?,
            weight: headers.iter().position(|h| {
                normalize::WEIGHT_ALIASES.contains(&h.trim().to_lowercase().as_str())
            }),
            scale: find(SCALE_HEADERS),
            required: find(REQUIRED_HEADERS),
            photo: find(PHOTO_HEADERS),
            comment: find(COMMENT_HEADERS),
        })
    }

    fn parse_row(&self, record: &csv::StringRecord, line: usize) -> Result<ParsedRow, ImportError> {
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

        let text = cell(Some(self.text)).to_string();
        if text.is_empty() {
            return Err(ImportError::InvalidRow {
                line,
                reason: "empty question text".to_string(),
            });
        }

        let kind = parse_kind(cell(Some(self.kind))).ok_or_else(|| ImportError::InvalidRow {
            line,
            reason: format!("unknown question type '{}'", cell(Some(self.kind))),
        })?;

        let section = {
            let raw = cell(self.section);
            if raw.is_empty() {
                super::BACKFILL_SECTION_TITLE.to_string()
            } else {
                raw.to_string()
            }
        };

        let weight = {
            let raw = cell(self.weight);
            if raw.is_empty() {
                None
            } else {
                Some(
                    normalize::parse_number(raw).ok_or_else(|| ImportError::InvalidRow {
                        line,
                        reason: format!("unparseable weight '{raw}'"),
                    })?,
                )
            }
        };

        let scale_max = if kind == QuestionKind::Scale {
            let raw = cell(self.scale);
            if raw.is_empty() {
                None
            } else {
                normalize::parse_number(raw)
                    .or_else(|| normalize::range_upper(raw))
                    .map(Some)
                    .ok_or_else(|| ImportError::InvalidRow {
                        line,
                        reason: format!("unparseable scale '{raw}'"),
                    })?
            }
        } else {
            None
        };

        Ok(ParsedRow {
            section,
            text,
            kind,
            weight,
            scale_max,
            // questions default to required unless the export says otherwise
            required: cell(self.required).is_empty() || truthy(cell(self.required)),
            require_photo: truthy(cell(self.photo)),
            require_comment: truthy(cell(self.comment)),
        })
    }
}

fn parse_kind(raw: &str) -> Option<QuestionKind> {
    match raw.trim().to_lowercase().as_str() {
        "yes/no" | "yesno" | "yes_no" | "bool" | "boolean" | "да/нет" => Some(QuestionKind::YesNo),
        "scale" | "rating" | "numeric" | "оценка" | "шкала" => Some(QuestionKind::Scale),
        "text" | "short" | "short_text" | "строка" => Some(QuestionKind::ShortText),
        "long" | "long_text" | "paragraph" | "текст" => Some(QuestionKind::LongText),
        _ => None,
    }
}

fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "да" | "+" | "x"
    )
}
