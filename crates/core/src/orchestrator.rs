//! Session Orchestrator
//!
//! Turns UI actions into tutoring requests and applies their results to the
//! session. Three rules hold throughout:
//!
//! - At most one primary request (analysis or teaching turn) is in flight,
//!   enforced by a [`ConcurrencyGuard`]. A duplicate submission is dropped
//!   silently.
//! - Every request captures the session epoch at dispatch. A completion whose
//!   epoch no longer matches the live session is discarded, so navigating
//!   away never lets a late reply write into the new session.
//! - Failures never escape: each one becomes a readable tutor message.
//!
//! Diagram requests run on a side channel that the guard does not cover.

use crate::{
    endpoint::{AnalyzeRequest, SchemaRequest, TeachRequest, TeachingEndpoint},
    error::{Result, TutorError},
    guard::{ConcurrencyGuard, GuardPermit},
    language::{HeuristicDetector, LanguageDetector, language_for_file},
    session::{DEFAULT_LANGUAGE, Mode, SessionState},
    tutor_service::TutorService,
    types::{DiagramResult, Message},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Upper bound on a single external call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const DIAGRAM_INTRO: &str = "Here's a visual representation to help you understand:";

/// Notifications for a UI that re-renders on change.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ModeChanged(Option<Mode>),
    MessageAppended(Message),
    EditorUpdated { language: String, code: String },
    BusyChanged(bool),
}

/// What became of a submitted action.
#[derive(Debug)]
pub enum TurnOutcome {
    /// A primary request was already in flight; nothing was dispatched.
    Dropped,
    /// The action does not apply in the current mode, or had nothing to send.
    Ignored,
    /// The reply was applied. Holds the side-channel diagram task, if the
    /// reply asked for one.
    Completed {
        diagram: Option<JoinHandle<TurnOutcome>>,
    },
    /// The request failed and an error message was appended.
    Failed(TutorError),
    /// The session was discarded while the request was in flight.
    Stale,
}

/// Result of asking to leave the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    Returned,
    Cancelled,
}

/// How a teaching turn's student entry reaches the log.
enum TurnEntry {
    /// Log the turn text as typed.
    Text,
    /// The caller already logged it.
    Logged,
    Message(Message),
    /// Opening turn on a new topic.
    Topic(String),
}

/// Drives one tutoring session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct SessionOrchestrator {
    service: Arc<dyn TutorService>,
    detector: Arc<dyn LanguageDetector>,
    state: Arc<Mutex<SessionState>>,
    guard: ConcurrencyGuard,
    events: Option<mpsc::Sender<SessionEvent>>,
    request_timeout: Duration,
}

impl SessionOrchestrator {
    pub fn new(service: Arc<dyn TutorService>) -> Self {
        Self {
            service,
            detector: Arc::new(HeuristicDetector),
            state: Arc::new(Mutex::new(SessionState::new())),
            guard: ConcurrencyGuard::new(),
            events: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// A copy of the current session state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    // --- Mode transitions ---

    /// Enters `mode`, discarding the current session entirely.
    pub async fn select(&self, mode: Mode) {
        let welcome = {
            let mut state = self.state.lock().await;
            *state = state.select(mode);
            self.guard.reset();
            info!(%mode, epoch = state.epoch(), "Mode selected");
            state.message_log().to_vec()
        };
        let mut events = vec![SessionEvent::ModeChanged(Some(mode))];
        events.extend(welcome.into_iter().map(SessionEvent::MessageAppended));
        self.emit(events).await;
    }

    /// Returns to mode selection. `confirm` is consulted only when the
    /// session holds unsaved work; returning `false` cancels the transition.
    pub async fn back(&self, confirm: impl FnOnce() -> bool) -> BackOutcome {
        let needs_confirmation = self.state.lock().await.has_unsaved_work();
        if needs_confirmation && !confirm() {
            debug!("Back navigation cancelled by user");
            return BackOutcome::Cancelled;
        }
        {
            let mut state = self.state.lock().await;
            *state = state.back();
            self.guard.reset();
            info!(epoch = state.epoch(), "Returned to mode selection");
        }
        self.emit(vec![SessionEvent::ModeChanged(None)]).await;
        BackOutcome::Returned
    }

    /// Clears the conversation to start on a new topic in the same mode.
    /// Only the teaching modes have a topic; elsewhere this returns `false`
    /// and leaves the session untouched.
    pub async fn change_topic(&self) -> bool {
        let mode = {
            let mut state = self.state.lock().await;
            if state.mode().and_then(Mode::teaching_endpoint).is_none() {
                debug!(mode = ?state.mode(), "No topic to change in this mode");
                return false;
            }
            *state = state.change_topic();
            self.guard.reset();
            info!(epoch = state.epoch(), "Topic cleared");
            state.mode()
        };
        self.emit(vec![SessionEvent::ModeChanged(mode)]).await;
        true
    }

    // --- Editor ---

    /// Replaces the editor contents.
    pub async fn update_code(&self, code: impl Into<String>) {
        self.state.lock().await.set_pending_code(code.into());
    }

    /// Analysis mode: records an uploaded file and analyses it.
    pub async fn upload_file(&self, file_name: &str, content: String) -> TurnOutcome {
        let Some(permit) = self.acquire() else {
            return TurnOutcome::Dropped;
        };
        let detected = language_for_file(file_name);
        let language = detected.language.to_string();
        let (epoch, events) = {
            let mut state = self.state.lock().await;
            if state.mode() != Some(Mode::Analyzing) {
                return TurnOutcome::Ignored;
            }
            state.set_uploaded_file(file_name.to_string());
            state.set_pending_code(content.clone());
            state.set_active_language(language.clone());
            let message = Message::student_text(format!("Uploaded {}", file_name));
            state.push_message(message.clone());
            let mut events = vec![
                SessionEvent::EditorUpdated {
                    language: language.clone(),
                    code: content.clone(),
                },
                SessionEvent::MessageAppended(message),
            ];
            (mark_busy(&mut state, &mut events), events)
        };
        info!(file_name, language = detected.display_name, "File uploaded");
        self.emit(events).await;
        self.run_analysis(permit, epoch, content, language).await
    }

    /// Analysis mode: logs a resubmission and analyses the editor contents.
    pub async fn resubmit_code(&self) -> TurnOutcome {
        let Some(permit) = self.acquire() else {
            return TurnOutcome::Dropped;
        };
        let (epoch, code, language, events) = {
            let mut state = self.state.lock().await;
            if state.mode() != Some(Mode::Analyzing) {
                return TurnOutcome::Ignored;
            }
            let message = Message::student_text("Resubmitted code");
            state.push_message(message.clone());
            let mut events = vec![SessionEvent::MessageAppended(message)];
            (
                mark_busy(&mut state, &mut events),
                state.pending_code().to_string(),
                state.active_language().to_string(),
                events,
            )
        };
        self.emit(events).await;
        self.run_analysis(permit, epoch, code, language).await
    }

    /// The editor's submit button: resubmission in analysis mode, a code
    /// review turn in the teaching modes. Blank code is ignored.
    pub async fn submit_editor_code(&self) -> TurnOutcome {
        let (mode, code, language) = {
            let state = self.state.lock().await;
            (
                state.mode(),
                state.pending_code().to_string(),
                state.active_language().to_string(),
            )
        };
        if code.trim().is_empty() {
            return TurnOutcome::Ignored;
        }
        match mode {
            Some(Mode::Analyzing) => self.resubmit_code().await,
            Some(_) => {
                let Some(permit) = self.acquire() else {
                    return TurnOutcome::Dropped;
                };
                let entry =
                    TurnEntry::Message(Message::student_code("Here's my implementation:", code.clone()));
                self.run_teaching_turn(permit, review_request(&code, &language), entry)
                    .await
            }
            None => TurnOutcome::Ignored,
        }
    }

    // --- Primary requests ---

    /// Analysis mode: analyses `code`. Appends no student message of its own.
    pub async fn submit_code(&self, code: String, language: String) -> TurnOutcome {
        let Some(permit) = self.acquire() else {
            return TurnOutcome::Dropped;
        };
        let (epoch, events) = {
            let mut state = self.state.lock().await;
            if state.mode() != Some(Mode::Analyzing) {
                return TurnOutcome::Ignored;
            }
            let mut events = Vec::new();
            (mark_busy(&mut state, &mut events), events)
        };
        self.emit(events).await;
        self.run_analysis(permit, epoch, code, language).await
    }

    /// Teaching modes: sets the topic and opens the conversation on it.
    pub async fn submit_topic(&self, topic: &str) -> TurnOutcome {
        let topic = topic.trim();
        if topic.is_empty() {
            return TurnOutcome::Ignored;
        }
        let Some(permit) = self.acquire() else {
            return TurnOutcome::Dropped;
        };
        self.run_teaching_turn(
            permit,
            format!("Teach me {}", topic),
            TurnEntry::Topic(topic.to_string()),
        )
        .await
    }

    /// Sends one teaching turn. Unless `already_logged`, the student's text
    /// is appended to the log first.
    pub async fn submit_teaching_turn(&self, user_text: &str, already_logged: bool) -> TurnOutcome {
        let Some(permit) = self.acquire() else {
            return TurnOutcome::Dropped;
        };
        let entry = if already_logged {
            TurnEntry::Logged
        } else {
            TurnEntry::Text
        };
        self.run_teaching_turn(permit, user_text.to_string(), entry)
            .await
    }

    // --- Side channel ---

    /// Requests a diagram outside the guard. `context` defaults to the topic.
    pub async fn submit_schema_request(
        &self,
        request: &str,
        context: Option<String>,
    ) -> TurnOutcome {
        let (epoch, context) = {
            let state = self.state.lock().await;
            if state.mode().is_none() {
                return TurnOutcome::Ignored;
            }
            let context = context.or_else(|| state.topic().map(str::to_string));
            (state.epoch(), context)
        };
        self.run_schema(epoch, request.to_string(), context).await
    }

    // --- Internals ---

    fn acquire(&self) -> Option<GuardPermit> {
        let permit = self.guard.try_acquire();
        if permit.is_none() {
            debug!("Primary request already in flight; dropping duplicate submission");
        }
        permit
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .unwrap_or_else(|_| Err(TutorError::Timeout(self.request_timeout)))
    }

    /// Dispatches an analysis for the session at `epoch`, which the caller
    /// has already marked busy.
    async fn run_analysis(
        &self,
        permit: GuardPermit,
        epoch: u64,
        code: String,
        language: String,
    ) -> TurnOutcome {
        info!(epoch, %language, bytes = code.len(), "Dispatching analysis");

        let result = self
            .bounded(self.service.analyze(AnalyzeRequest { code, language }))
            .await;

        let mut events = Vec::new();
        let outcome = {
            let mut state = self.state.lock().await;
            if state.epoch() != epoch {
                info!(epoch, live = state.epoch(), "Discarding analysis for a discarded session");
                return TurnOutcome::Stale;
            }
            let (message, outcome) = match result {
                Ok(analysis) => (Message::analysis(analysis), TurnOutcome::Completed { diagram: None }),
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "Analysis failed");
                    (
                        Message::tutor_text(format!("Error analyzing code: {}. Please try again.", e)),
                        TurnOutcome::Failed(e),
                    )
                }
            };
            state.push_message(message.clone());
            state.set_busy(false);
            events.push(SessionEvent::MessageAppended(message));
            events.push(SessionEvent::BusyChanged(false));
            outcome
        };
        permit.release();
        self.emit(events).await;
        outcome
    }

    /// Logs `entry`, builds the request and marks the session busy under one
    /// lock, so the epoch the reply is checked against is the one the request
    /// was built from.
    async fn run_teaching_turn(
        &self,
        permit: GuardPermit,
        user_text: String,
        entry: TurnEntry,
    ) -> TurnOutcome {
        let (epoch, endpoint, request, events) = {
            let mut state = self.state.lock().await;
            let Some(endpoint) = state.mode().and_then(Mode::teaching_endpoint) else {
                return TurnOutcome::Ignored;
            };
            let message = match entry {
                TurnEntry::Logged => None,
                TurnEntry::Text => Some(Message::student_text(user_text.clone())),
                TurnEntry::Message(message) => Some(message),
                TurnEntry::Topic(topic) => {
                    state.set_topic(topic);
                    if state.active_language() == DEFAULT_LANGUAGE {
                        state.set_active_language("python".to_string());
                    }
                    Some(Message::student_text(user_text.clone()))
                }
            };
            let mut events = Vec::new();
            if let Some(message) = message {
                state.push_message(message.clone());
                events.push(SessionEvent::MessageAppended(message));
            }
            let request = TeachRequest {
                message: user_text.clone(),
                conversation_history: state.wire_history().to_vec(),
                context: turn_context(endpoint, &state),
            };
            (mark_busy(&mut state, &mut events), endpoint, request, events)
        };
        self.emit(events).await;
        info!(epoch, ?endpoint, turns = request.conversation_history.len(), "Dispatching teaching turn");

        let result = self.bounded(self.service.teach(endpoint, request)).await;

        let mut events = Vec::new();
        let (outcome, diagram) = {
            let mut state = self.state.lock().await;
            if state.epoch() != epoch {
                info!(epoch, live = state.epoch(), "Discarding teaching reply for a discarded session");
                return TurnOutcome::Stale;
            }
            state.set_busy(false);
            events.push(SessionEvent::BusyChanged(false));
            match result {
                Ok(reply) => {
                    let message = Message::tutor_text(reply.message.clone());
                    state.push_message(message.clone());
                    state.record_exchange(user_text, reply.message.clone());
                    events.push(SessionEvent::MessageAppended(message));

                    // Skeletons go to the editor only, never into the chat log.
                    if let Some(skeleton) = reply.skeleton() {
                        let language = self.detector.detect(skeleton, state.active_language());
                        state.open_skeleton(language.clone(), skeleton.to_string());
                        debug!(%language, "Code skeleton routed to editor");
                        events.push(SessionEvent::EditorUpdated {
                            language,
                            code: skeleton.to_string(),
                        });
                    }

                    let diagram = reply
                        .diagram_request()
                        .map(|req| (req.to_string(), state.topic().map(str::to_string)));
                    (None, diagram)
                }
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "Teaching turn failed");
                    let message = Message::tutor_text(format!("Error: {}. Please try again.", e));
                    state.push_message(message.clone());
                    events.push(SessionEvent::MessageAppended(message));
                    (Some(TurnOutcome::Failed(e)), None)
                }
            }
        };
        permit.release();
        self.emit(events).await;

        if let Some(failed) = outcome {
            return failed;
        }
        let diagram = diagram.map(|(request, context)| {
            debug!(%request, "Spawning side-channel diagram request");
            let this = self.clone();
            tokio::spawn(async move { this.run_schema(epoch, request, context).await })
        });
        TurnOutcome::Completed { diagram }
    }

    async fn run_schema(&self, epoch: u64, request: String, context: Option<String>) -> TurnOutcome {
        let result = self
            .bounded(self.service.schema(SchemaRequest { request, context }))
            .await;

        let (message, outcome) = {
            let mut state = self.state.lock().await;
            if state.epoch() != epoch {
                info!(epoch, live = state.epoch(), "Discarding diagram for a discarded session");
                return TurnOutcome::Stale;
            }
            let (message, outcome) = match result {
                Ok(diagram) => {
                    state.set_current_schema(diagram.clone());
                    (diagram_message(diagram), TurnOutcome::Completed { diagram: None })
                }
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "Diagram generation failed");
                    (
                        Message::tutor_text(format!("Failed to generate diagram: {}", e)),
                        TurnOutcome::Failed(e),
                    )
                }
            };
            state.push_message(message.clone());
            (message, outcome)
        };
        self.emit(vec![SessionEvent::MessageAppended(message)]).await;
        outcome
    }

    async fn emit(&self, events: Vec<SessionEvent>) {
        let Some(tx) = &self.events else {
            return;
        };
        for event in events {
            if tx.send(event).await.is_err() {
                warn!("Failed to publish session event: receiver dropped.");
                break;
            }
        }
    }
}

/// Marks the session busy and returns the epoch its reply must match.
fn mark_busy(state: &mut SessionState, events: &mut Vec<SessionEvent>) -> u64 {
    state.set_busy(true);
    events.push(SessionEvent::BusyChanged(true));
    state.epoch()
}

fn diagram_message(diagram: DiagramResult) -> Message {
    Message::diagram(DIAGRAM_INTRO, diagram)
}

/// Context block sent alongside a teaching turn.
fn turn_context(endpoint: TeachingEndpoint, state: &SessionState) -> Option<String> {
    let topic = state.topic().map(|t| format!("Topic: {}", t));
    match endpoint {
        TeachingEndpoint::Teach => {
            let language = format!("Student's language: {}", state.active_language());
            Some(match topic {
                Some(topic) => format!("{}\n{}", topic, language),
                None => language,
            })
        }
        TeachingEndpoint::Math | TeachingEndpoint::Technical => topic,
    }
}

fn review_request(code: &str, language: &str) -> String {
    format!(
        "I've implemented the code. Please review my solution carefully and provide specific feedback. Here's my implementation:\n\n```{}\n{}\n```\n\nPlease check if it's correct, point out any issues, and guide me if something is wrong.",
        language, code
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_context_by_endpoint() {
        let mut state = SessionState::new().select(Mode::Learning);
        assert_eq!(
            turn_context(TeachingEndpoint::Teach, &state).as_deref(),
            Some("Student's language: javascript")
        );
        assert_eq!(turn_context(TeachingEndpoint::Math, &state), None);

        state.set_topic("Tries".into());
        assert_eq!(
            turn_context(TeachingEndpoint::Teach, &state).as_deref(),
            Some("Topic: Tries\nStudent's language: javascript")
        );
        assert_eq!(
            turn_context(TeachingEndpoint::Technical, &state).as_deref(),
            Some("Topic: Tries")
        );
    }

    #[test]
    fn test_review_request_fences_code() {
        let text = review_request("print(1)", "python");
        assert!(text.contains("```python\nprint(1)\n```"));
    }
}
