//! Message and keyboard construction. Pure functions from loaded state to
//! transport commands; the engine decides when to send vs. edit.

use super::events::{
    AnswerButton, Button, CallbackToken, ExportFormat, Keyboard, ModeChoice, OutboundCommand,
    PageNav, QuestionNav, TextIntent,
};
use crate::checklists::catalog::ChecklistOutline;
use crate::checklists::domain::{AttemptId, Checklist, Question, QuestionKind};
use crate::checklists::drafts::DraftProgress;
use crate::checklists::scoring::{AttemptTotals, DEFAULT_SCALE_MAX};

pub(super) fn checklist_menu(checklists: &[Checklist]) -> OutboundCommand {
    if checklists.is_empty() {
        return OutboundCommand::send("No checklists are assigned to you yet.");
    }
    let mut keyboard = Keyboard::default();
    for checklist in checklists {
        keyboard = keyboard.row(vec![Button::new(
            checklist.name.clone(),
            &CallbackToken::Checklist(checklist.id.clone()),
        )]);
    }
    OutboundCommand::send_with("Pick a checklist to fill in:", keyboard)
}

pub(super) fn department_menu(departments: &[String]) -> OutboundCommand {
    let mut keyboard = Keyboard::default();
    for chunk in departments.chunks(2) {
        keyboard = keyboard.row(
            chunk
                .iter()
                .map(|d| Button::new(d.clone(), &CallbackToken::Department(d.clone())))
                .collect(),
        );
    }
    keyboard = keyboard.row(vec![Button::new("Other…", &CallbackToken::DepartmentOther)]);
    OutboundCommand::send_with(
        "Which department is this run for? Pick one or type your own.",
        keyboard,
    )
}

pub(super) fn mode_menu(checklist_name: &str) -> OutboundCommand {
    let keyboard = Keyboard::default()
        .row(vec![
            Button::new("Preview sections", &CallbackToken::Mode(ModeChoice::Preview)),
            Button::new("Start", &CallbackToken::Mode(ModeChoice::StepByStep)),
        ])
        .row(vec![Button::new(
            "Back to checklists",
            &CallbackToken::Mode(ModeChoice::Back),
        )]);
    OutboundCommand::send_with(
        format!("\"{checklist_name}\" — preview it first, or start answering?"),
        keyboard,
    )
}

pub(super) fn preview_page(outline: &ChecklistOutline, page: usize) -> OutboundCommand {
    let total = outline.section_count();
    let mut text = String::new();
    if let Some(section_outline) = outline.section_at(page) {
        text.push_str(&format!(
            "Section {}/{}: {}\n",
            page + 1,
            total,
            section_outline.section.title
        ));
        if let Some(description) = &section_outline.section.description {
            text.push_str(description);
            text.push('\n');
        }
        for (idx, question) in section_outline.questions.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", idx + 1, question.text));
        }
    }

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(Button::new("◀ Back", &CallbackToken::Page(PageNav::Prev)));
    }
    if page + 1 < total {
        nav.push(Button::new("Next ▶", &CallbackToken::Page(PageNav::Next)));
    }
    let keyboard = Keyboard::default().row(nav).row(vec![Button::new(
        "Done previewing",
        &CallbackToken::Page(PageNav::Done),
    )]);
    OutboundCommand::send_with(text.trim_end().to_string(), keyboard)
}

/// Render the active question with its progress markers and the keyboard
/// appropriate to its kind.
pub(super) fn question_view(
    outline: &ChecklistOutline,
    index: usize,
    progress: &DraftProgress,
) -> (String, Keyboard) {
    let total = outline.question_count();
    let Some((section, question)) = outline.question_at(index) else {
        return ("This checklist has no questions.".to_string(), Keyboard::default());
    };

    let stored = progress.answer(&question.id);

    let mut text = format!(
        "[{}] Question {}/{} — {}\n",
        section.title,
        index + 1,
        total,
        question.text
    );

    let mut requirements = Vec::new();
    if question.require_photo {
        requirements.push("photo required");
    }
    if question.require_comment {
        requirements.push("comment required");
    }
    if !requirements.is_empty() {
        text.push_str(&format!("({})\n", requirements.join(", ")));
    }

    if let Some(answer) = stored.and_then(|a| a.response_value.as_deref()) {
        text.push_str(&format!("Answer: {answer}\n"));
    }
    if stored.map(|a| a.comment.is_some()).unwrap_or(false) {
        text.push_str("Comment: saved\n");
    }
    if stored.map(|a| a.photo_path.is_some()).unwrap_or(false) {
        text.push_str("Photo: attached\n");
    }
    text.push_str(&format!("Answered so far: {}/{}", progress.answered_count(), total));

    (text, question_keyboard(question, index))
}

fn question_keyboard(question: &Question, index: usize) -> Keyboard {
    let mut keyboard = Keyboard::default();

    match question.kind {
        QuestionKind::YesNo => {
            keyboard = keyboard.row(vec![
                Button::new("Yes", &CallbackToken::Answer(AnswerButton::Yes)),
                Button::new("No", &CallbackToken::Answer(AnswerButton::No)),
            ]);
        }
        QuestionKind::Scale => {
            let max = question
                .scale_max
                .unwrap_or(DEFAULT_SCALE_MAX)
                .round()
                .clamp(2.0, 10.0) as u32;
            for chunk in (1..=max).collect::<Vec<_>>().chunks(5) {
                keyboard = keyboard.row(
                    chunk
                        .iter()
                        .map(|v| {
                            Button::new(v.to_string(), &CallbackToken::Answer(AnswerButton::Scale(*v)))
                        })
                        .collect(),
                );
            }
        }
        QuestionKind::ShortText | QuestionKind::LongText => {
            keyboard = keyboard.row(vec![Button::new(
                "Answer as text",
                &CallbackToken::Nav(QuestionNav::EnterText),
            )]);
        }
    }

    keyboard = keyboard.row(vec![
        Button::new("Add comment", &CallbackToken::Nav(QuestionNav::AddComment)),
        Button::new("Add photo", &CallbackToken::Nav(QuestionNav::AddPhoto)),
    ]);

    let mut nav = Vec::new();
    if index > 0 {
        nav.push(Button::new("◀ Previous", &CallbackToken::Nav(QuestionNav::Prev)));
    }
    nav.push(Button::new("Next ▶", &CallbackToken::Nav(QuestionNav::Next)));
    keyboard = keyboard.row(nav);

    keyboard.row(vec![Button::new(
        "Discard run",
        &CallbackToken::Nav(QuestionNav::Discard),
    )])
}

pub(super) fn intent_menu(pending: &str) -> OutboundCommand {
    let preview: String = pending.chars().take(64).collect();
    let keyboard = Keyboard::default()
        .row(vec![
            Button::new("It's my answer", &CallbackToken::Intent(TextIntent::Answer)),
            Button::new("It's a comment", &CallbackToken::Intent(TextIntent::Comment)),
        ])
        .row(vec![Button::new(
            "Discard it",
            &CallbackToken::Intent(TextIntent::Cancel),
        )]);
    OutboundCommand::send_with(
        format!("Is \"{preview}\" your answer to this question, or a comment?"),
        keyboard,
    )
}

pub(super) fn completion_summary(
    attempt: &AttemptId,
    totals: Option<&AttemptTotals>,
    completion_hint: Option<u8>,
    is_scored: bool,
) -> OutboundCommand {
    let mut text = String::from("Checklist complete. Thank you!\n");
    match (is_scored, totals) {
        (true, Some(totals)) => {
            text.push_str(&format!(
                "Score: {:.1} / {:.1} ({:.0}%)",
                totals.score, totals.max_weight, totals.percent
            ));
        }
        (true, None) => {
            text.push_str("No weighted questions, so there is no numeric result.");
        }
        (false, _) => {
            if let Some(hint) = completion_hint {
                text.push_str(&format!("Estimated completion: ~{hint}%"));
            } else {
                text.push_str("All answers recorded.");
            }
        }
    }

    let keyboard = Keyboard::default()
        .row(vec![
            Button::new(
                "Export PDF",
                &CallbackToken::Export(ExportFormat::Pdf, attempt.clone()),
            ),
            Button::new(
                "Export Excel",
                &CallbackToken::Export(ExportFormat::Xlsx, attempt.clone()),
            ),
        ])
        .row(vec![Button::new("New checklist", &CallbackToken::NewRun)]);
    OutboundCommand::send_with(text, keyboard)
}
