//! The conversation state machine. Each user session is an isolated machine
//! advanced one inbound event at a time; drafts carry the durable progress,
//! so a process restart only loses the cosmetic session position.
//!
//! Failure policy: validation and gate problems answer back into the same
//! state; storage hiccups leave the state untouched and ask the user to
//! retry; a missing checklist/draft/question aborts the run back to
//! checklist selection without killing the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::events::{
    AnswerButton, CallbackToken, InboundEvent, ModeChoice, OutboundCommand, PageNav, PhotoRef,
    PromptRef, QuestionNav, TextIntent,
};
use super::prompts;
use super::state::{AnswerSubMode, SessionState, SessionStore};
use crate::checklists::attempts::{AttemptFinalizer, FinalizeError};
use crate::checklists::catalog::{CatalogError, CatalogReader, ChecklistOutline};
use crate::checklists::domain::{ChecklistId, DraftId, Question, QuestionKind, UserId, UserProfile};
use crate::checklists::drafts::{DraftProgress, DraftStore, DraftStoreError};
use crate::checklists::media::{MediaError, MediaStore};
use crate::checklists::report::{ReportAssembler, ReportError};
use crate::checklists::storage::{
    AttemptRepository, CatalogRepository, DraftRepository, StorageError,
};

const TRANSIENT_NOTICE: &str =
    "Something went wrong while saving. Nothing was lost, so please try that again.";
const PHOTO_FAILED_NOTICE: &str =
    "The photo could not be saved. The question still needs one — please send it again.";

#[derive(Debug)]
enum FlowError {
    /// User-correctable; reported into the current state.
    Validation(String),
    /// Referenced data no longer exists; the run aborts gracefully.
    Gone(String),
    /// Persistence failed; safe to retry the same action.
    Transient(StorageError),
    Media(MediaError),
}

impl From<StorageError> for FlowError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound => {
                FlowError::Gone("That checklist data no longer exists.".to_string())
            }
            other => FlowError::Transient(other),
        }
    }
}

impl From<CatalogError> for FlowError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::ChecklistNotFound => {
                FlowError::Gone("That checklist is no longer available.".to_string())
            }
            CatalogError::Storage(err) => err.into(),
        }
    }
}

impl From<DraftStoreError> for FlowError {
    fn from(value: DraftStoreError) -> Self {
        match value {
            DraftStoreError::DraftMissing => {
                FlowError::Gone("This run was already closed elsewhere.".to_string())
            }
            DraftStoreError::Storage(err) => err.into(),
        }
    }
}

impl From<FinalizeError> for FlowError {
    fn from(value: FinalizeError) -> Self {
        match value {
            FinalizeError::DraftMissing => {
                FlowError::Gone("This run was already submitted.".to_string())
            }
            FinalizeError::Storage(err) => err.into(),
        }
    }
}

impl From<ReportError> for FlowError {
    fn from(value: ReportError) -> Self {
        match value {
            ReportError::AttemptNotFound => {
                FlowError::Gone("That attempt no longer exists.".to_string())
            }
            ReportError::Catalog(err) => err.into(),
            ReportError::Storage(err) => err.into(),
        }
    }
}

struct Step {
    next: SessionState,
    commands: Vec<OutboundCommand>,
}

impl Step {
    fn stay(state: &SessionState, commands: Vec<OutboundCommand>) -> Self {
        Self {
            next: state.clone(),
            commands,
        }
    }
}

pub struct ConversationEngine<S, M> {
    catalog: CatalogReader<S>,
    drafts: DraftStore<S>,
    finalizer: AttemptFinalizer<S>,
    reports: ReportAssembler<S, S>,
    media: Arc<M>,
    sessions: SessionStore,
}

impl<S, M> ConversationEngine<S, M>
where
    S: CatalogRepository + DraftRepository + AttemptRepository,
    M: MediaStore,
{
    pub fn new(storage: Arc<S>, media: Arc<M>) -> Self {
        let catalog = CatalogReader::new(storage.clone());
        Self {
            catalog: catalog.clone(),
            drafts: DraftStore::new(storage.clone()),
            finalizer: AttemptFinalizer::new(storage.clone()),
            reports: ReportAssembler::new(catalog, storage),
            media,
            sessions: SessionStore::new(),
        }
    }

    /// Advance one user's session by one event, returning the commands the
    /// transport should perform. All errors are absorbed into user-visible
    /// notices per the failure policy above.
    pub fn handle(
        &self,
        user: &UserProfile,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Vec<OutboundCommand> {
        let cell = self.sessions.cell(&user.id);
        let mut state = cell.lock().expect("session cell poisoned");
        let current = state.clone();

        match self.step(user, &current, event, now) {
            Ok(step) => {
                if step.next.label() != current.label() {
                    info!(
                        user = %user.id.0,
                        from = current.label(),
                        to = step.next.label(),
                        "conversation transition"
                    );
                }
                *state = step.next;
                step.commands
            }
            Err(FlowError::Validation(message)) => vec![OutboundCommand::send(message)],
            Err(FlowError::Transient(err)) => {
                warn!(user = %user.id.0, error = %err, "storage failure during conversation turn");
                vec![OutboundCommand::send(TRANSIENT_NOTICE)]
            }
            Err(FlowError::Media(err)) => {
                warn!(user = %user.id.0, error = %err, "media fetch failure");
                vec![OutboundCommand::send(PHOTO_FAILED_NOTICE)]
            }
            Err(FlowError::Gone(message)) => {
                warn!(user = %user.id.0, state = current.label(), "aborting run: {message}");
                *state = SessionState::SelectingChecklist;
                let mut commands = vec![OutboundCommand::send(message)];
                if let Ok(step) = self.checklist_menu(user) {
                    commands.extend(step.commands);
                }
                commands
            }
        }
    }

    /// Record which on-screen element currently shows the active question.
    /// Transports call this after rendering; losing the reference simply
    /// means the next update arrives as a fresh message.
    pub fn note_prompt(&self, user: &UserId, prompt: PromptRef) {
        let cell = self.sessions.cell(user);
        let mut state = cell.lock().expect("session cell poisoned");
        if let SessionState::AnsweringQuestion { prompt: slot, .. } = &mut *state {
            *slot = Some(prompt);
        }
    }

    /// Current session snapshot, for diagnostics and tests.
    pub fn session(&self, user: &UserId) -> SessionState {
        self.sessions.snapshot(user)
    }

    fn step(
        &self,
        user: &UserProfile,
        state: &SessionState,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        match state {
            SessionState::Idle | SessionState::SelectingChecklist => {
                self.step_selecting_checklist(user, event, now)
            }
            SessionState::SelectingDepartment { checklist, draft } => {
                self.step_selecting_department(user, state, checklist, draft, event, now)
            }
            SessionState::ChoosingMode { checklist, draft } => {
                self.step_choosing_mode(user, state, checklist, draft, event, now)
            }
            SessionState::FullPreview {
                checklist,
                draft,
                page,
            } => self.step_full_preview(state, checklist, draft, *page, event, now),
            SessionState::AnsweringQuestion {
                checklist,
                draft,
                index,
                sub,
                prompt,
            } => self.step_answering(state, checklist, draft, *index, sub, prompt, event, now),
            SessionState::Completed { .. } => self.step_completed(user, state, event, now),
        }
    }

    fn checklist_menu(&self, user: &UserProfile) -> Result<Step, FlowError> {
        let checklists = self.catalog.checklists_for_tenant(&user.tenant)?;
        Ok(Step {
            next: SessionState::SelectingChecklist,
            commands: vec![prompts::checklist_menu(&checklists)],
        })
    }

    fn step_selecting_checklist(
        &self,
        user: &UserProfile,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        match event {
            InboundEvent::Button { token } => match CallbackToken::parse(&token) {
                Some(CallbackToken::Checklist(id)) => self.start_checklist(user, &id, now),
                _ => self.checklist_menu(user),
            },
            InboundEvent::Text { .. } => self.checklist_menu(user),
            InboundEvent::Photo { .. } => {
                let mut step = self.checklist_menu(user)?;
                step.commands.insert(
                    0,
                    OutboundCommand::send("There is no active question to attach a photo to."),
                );
                Ok(step)
            }
        }
    }

    fn start_checklist(
        &self,
        user: &UserProfile,
        checklist: &ChecklistId,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let outline = self.catalog.load(checklist, now)?;
        if outline.question_count() == 0 {
            return Err(FlowError::Validation(format!(
                "\"{}\" has no questions yet. Pick another checklist.",
                outline.checklist.name
            )));
        }

        let draft = self.drafts.open(&user.id, checklist, now)?;
        let progress = self.drafts.progress(&draft.id)?;

        if progress.answered_count() > 0 {
            // resume an interrupted run at its first unanswered question
            let index = first_unanswered(&outline, &progress);
            let (text, keyboard) = prompts::question_view(&outline, index, &progress);
            return Ok(Step {
                next: SessionState::AnsweringQuestion {
                    checklist: checklist.clone(),
                    draft: draft.id.clone(),
                    index,
                    sub: AnswerSubMode::Answering,
                    prompt: None,
                },
                commands: vec![
                    OutboundCommand::send("Resuming your saved progress."),
                    OutboundCommand::send_with(text, keyboard),
                ],
            });
        }

        if draft.department.is_none() {
            let departments = self.catalog.departments(&user.tenant)?;
            return Ok(Step {
                next: SessionState::SelectingDepartment {
                    checklist: checklist.clone(),
                    draft: draft.id.clone(),
                },
                commands: vec![prompts::department_menu(&departments)],
            });
        }

        Ok(Step {
            next: SessionState::ChoosingMode {
                checklist: checklist.clone(),
                draft: draft.id.clone(),
            },
            commands: vec![prompts::mode_menu(&outline.checklist.name)],
        })
    }

    fn step_selecting_department(
        &self,
        user: &UserProfile,
        state: &SessionState,
        checklist: &ChecklistId,
        draft: &DraftId,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let department = match event {
            InboundEvent::Button { token } => match CallbackToken::parse(&token) {
                Some(CallbackToken::Department(label)) => label,
                Some(CallbackToken::DepartmentOther) => {
                    return Ok(Step::stay(
                        state,
                        vec![OutboundCommand::send("Type your department name.")],
                    ));
                }
                _ => {
                    let departments = self.catalog.departments(&user.tenant)?;
                    return Ok(Step::stay(state, vec![prompts::department_menu(&departments)]));
                }
            },
            InboundEvent::Text { text } => {
                let trimmed = text.trim().to_string();
                if trimmed.is_empty() {
                    return Err(FlowError::Validation(
                        "The department name cannot be empty.".to_string(),
                    ));
                }
                trimmed
            }
            InboundEvent::Photo { .. } => {
                return Ok(Step::stay(
                    state,
                    vec![OutboundCommand::send(
                        "Pick or type a department first; photos come later.",
                    )],
                ));
            }
        };

        self.drafts.set_department(draft, department, now)?;
        let outline = self.catalog.load(checklist, now)?;
        Ok(Step {
            next: SessionState::ChoosingMode {
                checklist: checklist.clone(),
                draft: draft.clone(),
            },
            commands: vec![prompts::mode_menu(&outline.checklist.name)],
        })
    }

    fn step_choosing_mode(
        &self,
        user: &UserProfile,
        state: &SessionState,
        checklist: &ChecklistId,
        draft: &DraftId,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let outline = self.catalog.load(checklist, now)?;
        match event {
            InboundEvent::Button { token } => match CallbackToken::parse(&token) {
                Some(CallbackToken::Mode(ModeChoice::Preview)) => Ok(Step {
                    next: SessionState::FullPreview {
                        checklist: checklist.clone(),
                        draft: draft.clone(),
                        page: 0,
                    },
                    commands: vec![prompts::preview_page(&outline, 0)],
                }),
                Some(CallbackToken::Mode(ModeChoice::StepByStep)) => {
                    let progress = self.drafts.progress(draft)?;
                    let index = first_unanswered(&outline, &progress);
                    let (text, keyboard) = prompts::question_view(&outline, index, &progress);
                    Ok(Step {
                        next: SessionState::AnsweringQuestion {
                            checklist: checklist.clone(),
                            draft: draft.clone(),
                            index,
                            sub: AnswerSubMode::Answering,
                            prompt: None,
                        },
                        commands: vec![OutboundCommand::send_with(text, keyboard)],
                    })
                }
                Some(CallbackToken::Mode(ModeChoice::Back)) => self.checklist_menu(user),
                _ => Ok(Step::stay(
                    state,
                    vec![prompts::mode_menu(&outline.checklist.name)],
                )),
            },
            _ => Ok(Step::stay(
                state,
                vec![prompts::mode_menu(&outline.checklist.name)],
            )),
        }
    }

    fn step_full_preview(
        &self,
        state: &SessionState,
        checklist: &ChecklistId,
        draft: &DraftId,
        page: usize,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let outline = self.catalog.load(checklist, now)?;
        let last = outline.section_count().saturating_sub(1);

        let repage = |page: usize| Step {
            next: SessionState::FullPreview {
                checklist: checklist.clone(),
                draft: draft.clone(),
                page,
            },
            commands: vec![prompts::preview_page(&outline, page)],
        };

        match event {
            InboundEvent::Button { token } => match CallbackToken::parse(&token) {
                Some(CallbackToken::Page(PageNav::Next)) if page < last => Ok(repage(page + 1)),
                Some(CallbackToken::Page(PageNav::Prev)) if page > 0 => Ok(repage(page - 1)),
                Some(CallbackToken::Page(PageNav::Done)) => Ok(Step {
                    next: SessionState::ChoosingMode {
                        checklist: checklist.clone(),
                        draft: draft.clone(),
                    },
                    commands: vec![prompts::mode_menu(&outline.checklist.name)],
                }),
                _ => Ok(Step::stay(state, vec![prompts::preview_page(&outline, page)])),
            },
            _ => Ok(Step::stay(state, vec![prompts::preview_page(&outline, page)])),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step_answering(
        &self,
        state: &SessionState,
        checklist: &ChecklistId,
        draft: &DraftId,
        index: usize,
        sub: &AnswerSubMode,
        prompt: &Option<PromptRef>,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let outline = self.catalog.load(checklist, now)?;
        let question = outline
            .question_at(index)
            .map(|(_, q)| q.clone())
            .ok_or_else(|| {
                FlowError::Gone("The current question was removed from the checklist.".to_string())
            })?;

        match event {
            InboundEvent::Photo { photo } => {
                self.attach_photo(&outline, checklist, draft, index, sub, prompt, &photo, now)
            }
            InboundEvent::Text { text } => {
                self.handle_answer_text(&outline, &question, checklist, draft, index, sub, prompt, text, now)
            }
            InboundEvent::Button { token } => match CallbackToken::parse(&token) {
                Some(CallbackToken::Answer(button)) => {
                    self.save_button_answer(&outline, &question, checklist, draft, index, prompt, button, now)
                }
                Some(CallbackToken::Nav(nav)) => {
                    self.handle_nav(&outline, &question, checklist, draft, index, sub, prompt, nav, now)
                }
                Some(CallbackToken::Intent(intent)) => {
                    self.handle_intent(&outline, &question, checklist, draft, index, sub, prompt, intent, now)
                }
                _ => {
                    let progress = self.drafts.progress(draft)?;
                    Ok(Step::stay(
                        state,
                        self.question_commands(&outline, index, &progress, prompt, Vec::new()),
                    ))
                }
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn attach_photo(
        &self,
        outline: &ChecklistOutline,
        checklist: &ChecklistId,
        draft: &DraftId,
        index: usize,
        sub: &AnswerSubMode,
        prompt: &Option<PromptRef>,
        photo: &PhotoRef,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let (_, question) = outline.question_at(index).ok_or_else(|| {
            FlowError::Gone("The current question was removed from the checklist.".to_string())
        })?;

        let path = self.media.store(photo).map_err(FlowError::Media)?;
        self.drafts.set_photo(draft, &question.id, path, now)?;

        // leaving the photo sub-mode; any other sub-mode is preserved
        let next_sub = match sub {
            AnswerSubMode::AddingPhoto => AnswerSubMode::Answering,
            other => other.clone(),
        };

        let progress = self.drafts.progress(draft)?;
        let mut commands = vec![OutboundCommand::send("Photo attached.")];
        if let AnswerSubMode::DecidingTextIntent { pending } = &next_sub {
            commands.push(prompts::intent_menu(pending));
        } else {
            commands = self.question_commands(outline, index, &progress, prompt, commands);
        }

        Ok(Step {
            next: SessionState::AnsweringQuestion {
                checklist: checklist.clone(),
                draft: draft.clone(),
                index,
                sub: next_sub,
                prompt: prompt.clone(),
            },
            commands,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_answer_text(
        &self,
        outline: &ChecklistOutline,
        question: &Question,
        checklist: &ChecklistId,
        draft: &DraftId,
        index: usize,
        sub: &AnswerSubMode,
        prompt: &Option<PromptRef>,
        text: String,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let trimmed = text.trim().to_string();

        let answering = |sub: AnswerSubMode| SessionState::AnsweringQuestion {
            checklist: checklist.clone(),
            draft: draft.clone(),
            index,
            sub,
            prompt: prompt.clone(),
        };

        match sub {
            AnswerSubMode::Answering => {
                if trimmed.is_empty() {
                    return Err(FlowError::Validation(
                        "That message is empty. Type your answer or comment.".to_string(),
                    ));
                }
                if question.kind.is_button_answered() {
                    // buttons carry the primary answer, so free text is a comment
                    self.drafts.set_comment(draft, &question.id, trimmed, now)?;
                    let progress = self.drafts.progress(draft)?;
                    Ok(Step {
                        next: answering(AnswerSubMode::Answering),
                        commands: self.question_commands(
                            outline,
                            index,
                            &progress,
                            prompt,
                            vec![OutboundCommand::send("Saved as a comment.")],
                        ),
                    })
                } else {
                    Ok(Step {
                        next: answering(AnswerSubMode::DecidingTextIntent { pending: trimmed.clone() }),
                        commands: vec![prompts::intent_menu(&trimmed)],
                    })
                }
            }
            AnswerSubMode::EnteringTextAnswer => {
                if trimmed.is_empty() {
                    return Err(FlowError::Validation(
                        "The answer cannot be empty.".to_string(),
                    ));
                }
                self.drafts.set_answer(draft, &question.id, trimmed, now)?;
                let progress = self.drafts.progress(draft)?;
                Ok(Step {
                    next: answering(AnswerSubMode::Answering),
                    commands: self.question_commands(outline, index, &progress, prompt, Vec::new()),
                })
            }
            AnswerSubMode::AddingComment => {
                if trimmed.is_empty() {
                    return Err(FlowError::Validation(
                        "The comment cannot be empty.".to_string(),
                    ));
                }
                self.drafts.set_comment(draft, &question.id, trimmed, now)?;
                let progress = self.drafts.progress(draft)?;
                Ok(Step {
                    next: answering(AnswerSubMode::Answering),
                    commands: self.question_commands(outline, index, &progress, prompt, Vec::new()),
                })
            }
            AnswerSubMode::AddingPhoto => Ok(Step {
                next: answering(sub.clone()),
                commands: vec![OutboundCommand::send(
                    "Waiting for a photo. Send one, or use the buttons to continue.",
                )],
            }),
            AnswerSubMode::DecidingTextIntent { pending } => Ok(Step {
                next: answering(sub.clone()),
                commands: vec![prompts::intent_menu(pending)],
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn save_button_answer(
        &self,
        outline: &ChecklistOutline,
        question: &Question,
        checklist: &ChecklistId,
        draft: &DraftId,
        index: usize,
        prompt: &Option<PromptRef>,
        button: AnswerButton,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let value = match (question.kind, button) {
            (QuestionKind::YesNo, AnswerButton::Yes) => "yes".to_string(),
            (QuestionKind::YesNo, AnswerButton::No) => "no".to_string(),
            (QuestionKind::Scale, AnswerButton::Scale(v)) => v.to_string(),
            // stale keyboard for a different question kind
            _ => {
                let progress = self.drafts.progress(draft)?;
                return Ok(Step {
                    next: SessionState::AnsweringQuestion {
                        checklist: checklist.clone(),
                        draft: draft.clone(),
                        index,
                        sub: AnswerSubMode::Answering,
                        prompt: prompt.clone(),
                    },
                    commands: self.question_commands(outline, index, &progress, prompt, Vec::new()),
                });
            }
        };

        self.drafts.set_answer(draft, &question.id, value, now)?;
        let progress = self.drafts.progress(draft)?;
        Ok(Step {
            next: SessionState::AnsweringQuestion {
                checklist: checklist.clone(),
                draft: draft.clone(),
                index,
                sub: AnswerSubMode::Answering,
                prompt: prompt.clone(),
            },
            commands: self.question_commands(outline, index, &progress, prompt, Vec::new()),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_nav(
        &self,
        outline: &ChecklistOutline,
        question: &Question,
        checklist: &ChecklistId,
        draft: &DraftId,
        index: usize,
        sub: &AnswerSubMode,
        prompt: &Option<PromptRef>,
        nav: QuestionNav,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let answering = |index: usize, sub: AnswerSubMode| SessionState::AnsweringQuestion {
            checklist: checklist.clone(),
            draft: draft.clone(),
            index,
            sub,
            prompt: prompt.clone(),
        };

        match nav {
            QuestionNav::EnterText => {
                if question.kind.is_button_answered() {
                    return Err(FlowError::Validation(
                        "This question is answered with the buttons above.".to_string(),
                    ));
                }
                Ok(Step {
                    next: answering(index, AnswerSubMode::EnteringTextAnswer),
                    commands: vec![OutboundCommand::send("Send your answer as a message.")],
                })
            }
            QuestionNav::AddComment => Ok(Step {
                next: answering(index, AnswerSubMode::AddingComment),
                commands: vec![OutboundCommand::send("Send your comment as a message.")],
            }),
            QuestionNav::AddPhoto => Ok(Step {
                next: answering(index, AnswerSubMode::AddingPhoto),
                commands: vec![OutboundCommand::send("Send the photo.")],
            }),
            QuestionNav::Prev => {
                if index == 0 {
                    return Err(FlowError::Validation(
                        "You are already at the first question.".to_string(),
                    ));
                }
                let progress = self.drafts.progress(draft)?;
                Ok(Step {
                    next: answering(index - 1, AnswerSubMode::Answering),
                    commands: self.question_commands(outline, index - 1, &progress, prompt, Vec::new()),
                })
            }
            QuestionNav::Next => {
                let progress = self.drafts.progress(draft)?;
                if let Some(reason) = advance_gate(question, &progress) {
                    return Err(FlowError::Validation(reason));
                }
                if index + 1 >= outline.question_count() {
                    return self.complete_run(checklist, draft, now);
                }
                Ok(Step {
                    next: answering(index + 1, AnswerSubMode::Answering),
                    commands: self.question_commands(outline, index + 1, &progress, prompt, Vec::new()),
                })
            }
            QuestionNav::Discard => {
                self.drafts.discard(draft)?;
                info!(draft = %draft.0, "draft discarded by user");
                Ok(Step {
                    next: SessionState::SelectingChecklist,
                    commands: vec![OutboundCommand::send(
                        "Run discarded. Your answers were removed.",
                    )],
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_intent(
        &self,
        outline: &ChecklistOutline,
        question: &Question,
        checklist: &ChecklistId,
        draft: &DraftId,
        index: usize,
        sub: &AnswerSubMode,
        prompt: &Option<PromptRef>,
        intent: TextIntent,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let AnswerSubMode::DecidingTextIntent { pending } = sub else {
            let progress = self.drafts.progress(draft)?;
            return Ok(Step {
                next: SessionState::AnsweringQuestion {
                    checklist: checklist.clone(),
                    draft: draft.clone(),
                    index,
                    sub: sub.clone(),
                    prompt: prompt.clone(),
                },
                commands: self.question_commands(outline, index, &progress, prompt, Vec::new()),
            });
        };

        let mut lead = Vec::new();
        match intent {
            TextIntent::Answer => {
                self.drafts
                    .set_answer(draft, &question.id, pending.clone(), now)?;
            }
            TextIntent::Comment => {
                self.drafts
                    .set_comment(draft, &question.id, pending.clone(), now)?;
            }
            TextIntent::Cancel => {
                lead.push(OutboundCommand::send("Discarded."));
            }
        }

        let progress = self.drafts.progress(draft)?;
        Ok(Step {
            next: SessionState::AnsweringQuestion {
                checklist: checklist.clone(),
                draft: draft.clone(),
                index,
                sub: AnswerSubMode::Answering,
                prompt: prompt.clone(),
            },
            commands: self.question_commands(outline, index, &progress, prompt, lead),
        })
    }

    fn complete_run(
        &self,
        checklist: &ChecklistId,
        draft: &DraftId,
        now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        let attempt = self.finalizer.finalize(draft, now)?;
        let report = self.reports.assemble(&attempt.id)?;
        Ok(Step {
            next: SessionState::Completed {
                checklist: checklist.clone(),
                attempt: attempt.id.clone(),
            },
            commands: vec![prompts::completion_summary(
                &attempt.id,
                report.totals.as_ref(),
                report.completion_hint,
                report.is_scored,
            )],
        })
    }

    fn step_completed(
        &self,
        user: &UserProfile,
        state: &SessionState,
        event: InboundEvent,
        _now: DateTime<Utc>,
    ) -> Result<Step, FlowError> {
        match event {
            InboundEvent::Button { token } => match CallbackToken::parse(&token) {
                Some(CallbackToken::Export(format, attempt)) => {
                    if self.finalizer.attempt(&attempt)?.is_none() {
                        return Err(FlowError::Gone("That attempt no longer exists.".to_string()));
                    }
                    Ok(Step::stay(
                        state,
                        vec![OutboundCommand::send(format!(
                            "{} export for attempt {} is being prepared and will be delivered shortly.",
                            format.label(),
                            attempt.0
                        ))],
                    ))
                }
                Some(CallbackToken::NewRun) => self.checklist_menu(user),
                _ => self.checklist_menu(user),
            },
            _ => self.checklist_menu(user),
        }
    }

    /// Render the active question, editing the existing on-screen prompt
    /// when its reference is known and degrading to a fresh message when it
    /// is not.
    fn question_commands(
        &self,
        outline: &ChecklistOutline,
        index: usize,
        progress: &DraftProgress,
        prompt: &Option<PromptRef>,
        mut lead: Vec<OutboundCommand>,
    ) -> Vec<OutboundCommand> {
        let (text, keyboard) = prompts::question_view(outline, index, progress);
        let command = match prompt {
            Some(reference) => OutboundCommand::edit_with(reference.clone(), text, keyboard),
            None => OutboundCommand::send_with(text, keyboard),
        };
        lead.push(command);
        lead
    }
}

/// First question with no stored answer; if everything is answered the user
/// lands on the last question, one "Next" away from finalizing.
fn first_unanswered(outline: &ChecklistOutline, progress: &DraftProgress) -> usize {
    let flat = outline.flat_questions();
    flat.iter()
        .position(|(_, question)| {
            progress
                .answer(&question.id)
                .and_then(|a| a.response_value.as_deref())
                .is_none()
        })
        .unwrap_or_else(|| flat.len().saturating_sub(1))
}

/// The advance gate. A required question must hold an answer; an answered
/// question must satisfy its comment/photo flags. Unanswered optional
/// questions may be skipped outright.
fn advance_gate(question: &Question, progress: &DraftProgress) -> Option<String> {
    let stored = progress.answer(&question.id);
    let answered = stored
        .and_then(|a| a.response_value.as_deref())
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);

    if !answered {
        if question.required {
            return Some("Answer this question before moving on.".to_string());
        }
        return None;
    }

    if question.require_comment {
        let has_comment = stored
            .and_then(|a| a.comment.as_deref())
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        if !has_comment {
            return Some("This question needs a comment before you can continue.".to_string());
        }
    }

    if question.require_photo && stored.and_then(|a| a.photo_path.as_ref()).is_none() {
        return Some("This question needs a photo before you can continue.".to_string());
    }

    None
}
