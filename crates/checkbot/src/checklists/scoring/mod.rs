//! Pure scoring: a question's type, weight, and scale metadata plus a raw
//! answer string in, a numeric score out. Aggregation keeps "no question
//! carried weight" (`None`) distinct from "scored zero" (`Some(0%)`).

use serde::{Deserialize, Serialize};

use super::domain::{Checklist, Question, QuestionKind};

/// Scale maximum applied when a scale question resolves nothing explicit.
pub const DEFAULT_SCALE_MAX: f64 = 10.0;

/// Raw answers treated as an affirmative, case-insensitively.
const YES_VALUES: &[&str] = &["yes", "да", "true", "1"];

/// Per-question scoring result. Both fields are `None` when the score is
/// not applicable (unscored checklist, weightless question, text kinds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub score: Option<f64>,
    pub max_weight: Option<f64>,
}

impl QuestionScore {
    pub const NOT_APPLICABLE: Self = Self {
        score: None,
        max_weight: None,
    };
}

/// Whole-attempt aggregate over the contributing questions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptTotals {
    pub score: f64,
    pub max_weight: f64,
    pub percent: f64,
}

/// Stateless scorer bound to one checklist's scored flag.
#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine {
    scored: bool,
}

impl ScoringEngine {
    pub fn for_checklist(checklist: &Checklist) -> Self {
        Self {
            scored: checklist.is_scored,
        }
    }

    /// Score one question against a raw answer. Unanswered questions score
    /// like an empty string: 0 for the button kinds, still counting their
    /// weight into the maximum.
    pub fn score(&self, question: &Question, raw: Option<&str>) -> QuestionScore {
        if !self.scored {
            return QuestionScore::NOT_APPLICABLE;
        }
        let weight = match question.weight {
            Some(weight) => weight,
            None => return QuestionScore::NOT_APPLICABLE,
        };

        match question.kind {
            QuestionKind::YesNo => {
                let score = if raw.map(normalized_yes).unwrap_or(false) {
                    weight
                } else {
                    0.0
                };
                QuestionScore {
                    score: Some(score),
                    max_weight: Some(weight),
                }
            }
            QuestionKind::Scale => {
                let scale_max = question.scale_max.unwrap_or(DEFAULT_SCALE_MAX);
                let value = raw
                    .and_then(|r| r.trim().replace(',', ".").parse::<f64>().ok())
                    .unwrap_or(0.0);
                QuestionScore {
                    score: Some(weight * (value / scale_max)),
                    max_weight: Some(weight),
                }
            }
            QuestionKind::ShortText | QuestionKind::LongText => QuestionScore::NOT_APPLICABLE,
        }
    }

    /// Aggregate per-question scores into the attempt total. `None` when no
    /// question contributed a weight.
    pub fn totals<I>(scores: I) -> Option<AttemptTotals>
    where
        I: IntoIterator<Item = QuestionScore>,
    {
        let mut score = 0.0;
        let mut max_weight = 0.0;
        let mut any = false;
        for entry in scores {
            if let (Some(s), Some(w)) = (entry.score, entry.max_weight) {
                score += s;
                max_weight += w;
                any = true;
            }
        }
        if !any || max_weight <= 0.0 {
            return None;
        }
        Some(AttemptTotals {
            score,
            max_weight,
            percent: score / max_weight * 100.0,
        })
    }
}

pub fn normalized_yes(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    YES_VALUES.iter().any(|v| *v == lowered)
}

/// Display-only completion estimate for unscored checklists: the yes-ratio
/// of answered yes/no questions blended with the normalized average of
/// answered scale questions. Not part of the scoring contract; callers must
/// treat it as a soft hint.
pub fn completion_hint<'a, I>(answered: I) -> Option<u8>
where
    I: IntoIterator<Item = (&'a Question, &'a str)>,
{
    let mut yes = 0usize;
    let mut yes_no = 0usize;
    let mut scale_sum = 0.0;
    let mut scales = 0usize;

    for (question, raw) in answered {
        match question.kind {
            QuestionKind::YesNo => {
                yes_no += 1;
                if normalized_yes(raw) {
                    yes += 1;
                }
            }
            QuestionKind::Scale => {
                let scale_max = question.scale_max.unwrap_or(DEFAULT_SCALE_MAX);
                if scale_max > 0.0 {
                    let value = raw.trim().replace(',', ".").parse::<f64>().unwrap_or(0.0);
                    scale_sum += (value / scale_max).clamp(0.0, 1.0);
                    scales += 1;
                }
            }
            QuestionKind::ShortText | QuestionKind::LongText => {}
        }
    }

    let mut components = Vec::new();
    if yes_no > 0 {
        components.push(yes as f64 / yes_no as f64);
    }
    if scales > 0 {
        components.push(scale_sum / scales as f64);
    }
    if components.is_empty() {
        return None;
    }
    let blended = components.iter().sum::<f64>() / components.len() as f64;
    Some((blended * 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklists::domain::{ChecklistId, QuestionId, SectionId, TenantId, UserId};
    use chrono::Utc;

    fn checklist(scored: bool) -> Checklist {
        Checklist {
            id: ChecklistId("cl-1".to_string()),
            tenant: TenantId("acme".to_string()),
            name: "Safety Audit".to_string(),
            is_scored: scored,
            created_by: UserId("admin".to_string()),
            created_at: Utc::now(),
        }
    }

    fn question(kind: QuestionKind, weight: Option<f64>, scale_max: Option<f64>) -> Question {
        Question {
            id: QuestionId("q-1".to_string()),
            checklist: ChecklistId("cl-1".to_string()),
            section: Some(SectionId("s-1".to_string())),
            text: "Q".to_string(),
            kind,
            order: 1,
            required: true,
            weight,
            scale_max,
            require_photo: false,
            require_comment: false,
            meta: None,
        }
    }

    #[test]
    fn yes_no_scores_weight_or_zero() {
        let engine = ScoringEngine::for_checklist(&checklist(true));
        let q = question(QuestionKind::YesNo, Some(5.0), None);

        assert_eq!(engine.score(&q, Some("yes")).score, Some(5.0));
        assert_eq!(engine.score(&q, Some("no")).score, Some(0.0));
        assert_eq!(engine.score(&q, Some("Да")).score, Some(5.0));
        assert_eq!(engine.score(&q, Some("TRUE")).score, Some(5.0));
        assert_eq!(engine.score(&q, None).score, Some(0.0));
    }

    #[test]
    fn scale_normalizes_against_scale_max() {
        let engine = ScoringEngine::for_checklist(&checklist(true));
        let q = question(QuestionKind::Scale, Some(10.0), Some(5.0));

        let scored = engine.score(&q, Some("3"));
        assert_eq!(scored.score, Some(6.0));
        assert_eq!(scored.max_weight, Some(10.0));

        // unparseable input degrades to zero rather than erroring
        assert_eq!(engine.score(&q, Some("")).score, Some(0.0));
        assert_eq!(engine.score(&q, Some("loud")).score, Some(0.0));
    }

    #[test]
    fn scale_falls_back_to_default_max() {
        let engine = ScoringEngine::for_checklist(&checklist(true));
        let q = question(QuestionKind::Scale, Some(4.0), None);
        assert_eq!(engine.score(&q, Some("5")).score, Some(2.0));
    }

    #[test]
    fn text_and_unscored_are_not_applicable() {
        let scored = ScoringEngine::for_checklist(&checklist(true));
        let text = question(QuestionKind::LongText, Some(5.0), None);
        assert_eq!(scored.score(&text, Some("fine")), QuestionScore::NOT_APPLICABLE);

        let unscored = ScoringEngine::for_checklist(&checklist(false));
        let q = question(QuestionKind::YesNo, Some(5.0), None);
        assert_eq!(unscored.score(&q, Some("yes")), QuestionScore::NOT_APPLICABLE);

        let weightless = question(QuestionKind::YesNo, None, None);
        assert_eq!(scored.score(&weightless, Some("yes")), QuestionScore::NOT_APPLICABLE);
    }

    #[test]
    fn totals_distinguish_none_from_zero_percent() {
        let entries = vec![
            QuestionScore {
                score: Some(4.0),
                max_weight: Some(4.0),
            },
            QuestionScore {
                score: Some(4.8),
                max_weight: Some(6.0),
            },
            QuestionScore::NOT_APPLICABLE,
        ];
        let totals = ScoringEngine::totals(entries).expect("weighted totals");
        assert!((totals.score - 8.8).abs() < 1e-9);
        assert!((totals.max_weight - 10.0).abs() < 1e-9);
        assert!((totals.percent - 88.0).abs() < 1e-9);

        assert_eq!(
            ScoringEngine::totals(vec![QuestionScore::NOT_APPLICABLE]),
            None
        );

        let zero = ScoringEngine::totals(vec![QuestionScore {
            score: Some(0.0),
            max_weight: Some(5.0),
        }])
        .expect("zero is still a result");
        assert_eq!(zero.percent, 0.0);
    }

    #[test]
    fn completion_hint_blends_yes_ratio_and_scale_average() {
        let yes_no = question(QuestionKind::YesNo, None, None);
        let scale = question(QuestionKind::Scale, None, Some(5.0));

        let hint = completion_hint(vec![
            (&yes_no, "yes"),
            (&yes_no, "no"),
            (&scale, "4"),
        ])
        .expect("hint available");
        // (0.5 + 0.8) / 2
        assert_eq!(hint, 65);

        let text = question(QuestionKind::ShortText, None, None);
        assert_eq!(completion_hint(vec![(&text, "notes")]), None);
    }
}
