//! Tutor Core
//!
//! Session orchestration and response-contract handling for the interactive
//! tutor: typed results parsed out of free-form model text, a single-flight
//! guard for primary requests, the mode state machine, and the orchestrator
//! that ties them to a [`tutor_service::TutorService`] backend.

pub mod contract;
pub mod endpoint;
pub mod error;
pub mod guard;
pub mod http_service;
pub mod language;
pub mod llm_client;
pub mod orchestrator;
pub mod prompts;
pub mod session;
pub mod tutor_service;
pub mod types;

pub use error::{Result, TutorError};
pub use orchestrator::{BackOutcome, SessionEvent, SessionOrchestrator, TurnOutcome};
pub use session::{Mode, SessionState};
