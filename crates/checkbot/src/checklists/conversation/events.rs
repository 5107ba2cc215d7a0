//! Transport primitives. Any chat platform that can deliver these three
//! event kinds and honor the two command kinds can host the conversation.

use serde::{Deserialize, Serialize};

use crate::checklists::domain::{AttemptId, ChecklistId};

/// Transport-specific handle to an uploaded photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef(pub String);

/// Opaque handle to the on-screen message that currently renders the active
/// question. Losing it is fine; the machine falls back to a fresh message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRef(pub String);

/// What the transport delivers into the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Text { text: String },
    Photo { photo: PhotoRef },
    Button { token: String },
}

/// One inline button. `token` is an encoded [`CallbackToken`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: &CallbackToken) -> Self {
        Self {
            label: label.into(),
            token: token.encode(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }
}

/// What the state machine asks the transport to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundCommand {
    Send {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        prompt: PromptRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
}

impl OutboundCommand {
    pub fn send(text: impl Into<String>) -> Self {
        Self::Send {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn send_with(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Send {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn edit_with(prompt: PromptRef, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Edit {
            prompt,
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChoice {
    Preview,
    StepByStep,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    Next,
    Prev,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerButton {
    Yes,
    No,
    Scale(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionNav {
    Next,
    Prev,
    AddComment,
    AddPhoto,
    EnterText,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextIntent {
    Answer,
    Comment,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub const fn label(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Xlsx => "Excel",
        }
    }
}

/// Every button the machine ever renders, with a stable string encoding so
/// tokens survive the round trip through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackToken {
    Checklist(ChecklistId),
    Department(String),
    DepartmentOther,
    Mode(ModeChoice),
    Page(PageNav),
    Answer(AnswerButton),
    Nav(QuestionNav),
    Intent(TextIntent),
    Export(ExportFormat, AttemptId),
    NewRun,
}

impl CallbackToken {
    pub fn encode(&self) -> String {
        match self {
            CallbackToken::Checklist(id) => format!("cl:{}", id.0),
            CallbackToken::Department(label) => format!("dept:{label}"),
            CallbackToken::DepartmentOther => "dept_other".to_string(),
            CallbackToken::Mode(ModeChoice::Preview) => "mode:preview".to_string(),
            CallbackToken::Mode(ModeChoice::StepByStep) => "mode:steps".to_string(),
            CallbackToken::Mode(ModeChoice::Back) => "mode:back".to_string(),
            CallbackToken::Page(PageNav::Next) => "page:next".to_string(),
            CallbackToken::Page(PageNav::Prev) => "page:prev".to_string(),
            CallbackToken::Page(PageNav::Done) => "page:done".to_string(),
            CallbackToken::Answer(AnswerButton::Yes) => "ans:yes".to_string(),
            CallbackToken::Answer(AnswerButton::No) => "ans:no".to_string(),
            CallbackToken::Answer(AnswerButton::Scale(value)) => format!("ans:{value}"),
            CallbackToken::Nav(QuestionNav::Next) => "q:next".to_string(),
            CallbackToken::Nav(QuestionNav::Prev) => "q:prev".to_string(),
            CallbackToken::Nav(QuestionNav::AddComment) => "q:comment".to_string(),
            CallbackToken::Nav(QuestionNav::AddPhoto) => "q:photo".to_string(),
            CallbackToken::Nav(QuestionNav::EnterText) => "q:text".to_string(),
            CallbackToken::Nav(QuestionNav::Discard) => "q:discard".to_string(),
            CallbackToken::Intent(TextIntent::Answer) => "intent:answer".to_string(),
            CallbackToken::Intent(TextIntent::Comment) => "intent:comment".to_string(),
            CallbackToken::Intent(TextIntent::Cancel) => "intent:cancel".to_string(),
            CallbackToken::Export(ExportFormat::Pdf, id) => format!("export:pdf:{}", id.0),
            CallbackToken::Export(ExportFormat::Xlsx, id) => format!("export:xlsx:{}", id.0),
            CallbackToken::NewRun => "run:new".to_string(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "dept_other" {
            return Some(CallbackToken::DepartmentOther);
        }
        if raw == "run:new" {
            return Some(CallbackToken::NewRun);
        }

        let (prefix, rest) = raw.split_once(':')?;
        match prefix {
            "cl" => Some(CallbackToken::Checklist(ChecklistId(rest.to_string()))),
            "dept" => Some(CallbackToken::Department(rest.to_string())),
            "mode" => match rest {
                "preview" => Some(CallbackToken::Mode(ModeChoice::Preview)),
                "steps" => Some(CallbackToken::Mode(ModeChoice::StepByStep)),
                "back" => Some(CallbackToken::Mode(ModeChoice::Back)),
                _ => None,
            },
            "page" => match rest {
                "next" => Some(CallbackToken::Page(PageNav::Next)),
                "prev" => Some(CallbackToken::Page(PageNav::Prev)),
                "done" => Some(CallbackToken::Page(PageNav::Done)),
                _ => None,
            },
            "ans" => match rest {
                "yes" => Some(CallbackToken::Answer(AnswerButton::Yes)),
                "no" => Some(CallbackToken::Answer(AnswerButton::No)),
                value => value
                    .parse::<u32>()
                    .ok()
                    .map(|v| CallbackToken::Answer(AnswerButton::Scale(v))),
            },
            "q" => match rest {
                "next" => Some(CallbackToken::Nav(QuestionNav::Next)),
                "prev" => Some(CallbackToken::Nav(QuestionNav::Prev)),
                "comment" => Some(CallbackToken::Nav(QuestionNav::AddComment)),
                "photo" => Some(CallbackToken::Nav(QuestionNav::AddPhoto)),
                "text" => Some(CallbackToken::Nav(QuestionNav::EnterText)),
                "discard" => Some(CallbackToken::Nav(QuestionNav::Discard)),
                _ => None,
            },
            "intent" => match rest {
                "answer" => Some(CallbackToken::Intent(TextIntent::Answer)),
                "comment" => Some(CallbackToken::Intent(TextIntent::Comment)),
                "cancel" => Some(CallbackToken::Intent(TextIntent::Cancel)),
                _ => None,
            },
            "export" => {
                let (format, id) = rest.split_once(':')?;
                let format = match format {
                    "pdf" => ExportFormat::Pdf,
                    "xlsx" => ExportFormat::Xlsx,
                    _ => return None,
                };
                Some(CallbackToken::Export(format, AttemptId(id.to_string())))
            }
            _ => None,
        }
    }
}
