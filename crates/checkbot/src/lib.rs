//! Core library for the checklist bot: catalog loading, draft lifecycle,
//! conversation state machine, scoring, and report assembly. Storage, the
//! chat transport, media persistence, and document rendering are consumed
//! through traits so the service layer can supply real adapters.

pub mod checklists;
pub mod config;
pub mod error;
pub mod telemetry;
