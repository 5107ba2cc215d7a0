//! Legacy `meta` resolution. The original deployments stored scoring data in
//! a free-form JSON bag under a zoo of key aliases; this module maps those
//! shapes into the canonical `weight`/`scale_max` columns exactly once, at
//! the catalog load boundary (and in the CSV importer). Steady-state code
//! never reads `meta`.

use serde_json::Value;

use crate::checklists::domain::{Question, QuestionKind};

/// Key aliases under which legacy rows carried a question weight.
pub(crate) const WEIGHT_ALIASES: &[&str] = &[
    "weight",
    "score_weight",
    "points",
    "max_points",
    "max_score",
    "score",
    "weight_value",
    "вес",
    "балл",
    "баллы",
];

/// Keys carrying an explicit scale maximum.
const SCALE_MAX_KEYS: &[&str] = &["scale_max", "max", "max_value", "scale"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CanonicalScoring {
    pub(crate) weight: Option<f64>,
    pub(crate) scale_max: Option<f64>,
}

/// Resolve the canonical scoring columns for a question, preferring values
/// already present in the dedicated columns over anything in `meta`.
pub(crate) fn canonical_scoring(question: &Question) -> CanonicalScoring {
    let meta = question.meta.as_ref();

    let weight = question.weight.or_else(|| resolve_weight(meta));

    let scale_max = match question.kind {
        QuestionKind::Scale => question.scale_max.or_else(|| resolve_scale_max(meta)),
        _ => question.scale_max,
    };

    CanonicalScoring { weight, scale_max }
}

pub(crate) fn resolve_weight(meta: Option<&Value>) -> Option<f64> {
    let object = meta?.as_object()?;
    WEIGHT_ALIASES
        .iter()
        .find_map(|alias| object.get(*alias).and_then(number))
}

/// Scale maximum, resolved in priority order: explicit max keys, an
/// `options` list (maximum numeric value, else cardinality), a
/// `values`/`choices` list's cardinality, a `"lo-hi"` range string.
pub(crate) fn resolve_scale_max(meta: Option<&Value>) -> Option<f64> {
    let object = meta?.as_object()?;

    if let Some(explicit) = SCALE_MAX_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(number))
    {
        return Some(explicit);
    }

    if let Some(options) = object.get("options").and_then(Value::as_array) {
        if !options.is_empty() {
            let numeric_max = options
                .iter()
                .filter_map(number)
                .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |m| m.max(v))));
            return Some(numeric_max.unwrap_or(options.len() as f64));
        }
    }

    for key in ["values", "choices"] {
        if let Some(list) = object.get(key).and_then(Value::as_array) {
            if !list.is_empty() {
                return Some(list.len() as f64);
            }
        }
    }

    if let Some(range) = object.get("range").and_then(Value::as_str) {
        if let Some(upper) = range_upper(range) {
            return Some(upper);
        }
    }

    None
}

/// Accepts JSON numbers and numeric strings (legacy rows mixed both, with
/// the occasional decimal comma).
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Numeric string parse with decimal-comma tolerance.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}

/// Upper bound of a `"lo-hi"` range string.
pub(crate) fn range_upper(raw: &str) -> Option<f64> {
    let (_, hi) = raw.split_once('-')?;
    hi.trim().parse::<f64>().ok()
}
