//! The conversational completion flow: checklist selection, department
//! selection, preview/step-by-step modes, per-question answer collection
//! with comment/photo sub-modes, and finalization into a scored summary.

pub mod engine;
pub mod events;
mod prompts;
pub mod state;

#[cfg(test)]
mod tests;

pub use engine::ConversationEngine;
pub use events::{
    Button, CallbackToken, ExportFormat, InboundEvent, Keyboard, OutboundCommand, PhotoRef,
    PromptRef,
};
pub use state::{AnswerSubMode, SessionState, SessionStore};
