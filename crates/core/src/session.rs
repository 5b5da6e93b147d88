//! Session state and the mode state machine.
//!
//! [`SessionState`] is the single mutable aggregate of a tutoring session.
//! Mode transitions never patch it: [`SessionState::select`],
//! [`SessionState::back`] and [`SessionState::change_topic`] build a fresh
//! value with an advanced epoch, which is how late-arriving responses for a
//! discarded session are recognised and dropped.

use crate::endpoint::TeachingEndpoint;
use crate::types::{ConversationTurn, DiagramResult, Message};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language assumed before anything more specific is known.
pub const DEFAULT_LANGUAGE: &str = "javascript";

/// The four mutually exclusive interaction modes. "Unselected" is modelled
/// as the absence of a mode on [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Analyzing,
    Learning,
    MathExploring,
    TechnicalExploring,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::Analyzing,
        Mode::Learning,
        Mode::MathExploring,
        Mode::TechnicalExploring,
    ];

    /// Endpoint for teaching turns, or `None` for analysis mode.
    pub fn teaching_endpoint(self) -> Option<TeachingEndpoint> {
        match self {
            Mode::Analyzing => None,
            Mode::Learning => Some(TeachingEndpoint::Teach),
            Mode::MathExploring => Some(TeachingEndpoint::Math),
            Mode::TechnicalExploring => Some(TeachingEndpoint::Technical),
        }
    }

    /// The tutor message seeded when the mode is entered.
    pub fn welcome(self) -> &'static str {
        match self {
            Mode::Analyzing => {
                "Welcome to Code Analysis! Upload a file to get started. I'll review your code based on production-ready principles like naming conventions, function size, error handling, and more."
            }
            Mode::Learning => {
                "Welcome to Algorithm Learning! Tell me what algorithm you'd like to learn, and I'll guide you through it using intuitive explanations, visual diagrams, and hands-on practice."
            }
            Mode::MathExploring => {
                "Welcome to Math Concepts! Ask me about probability, statistics, or game theory questions. I'll provide intuitive explanations, mathematical breakdowns, visual diagrams, and Python simulations."
            }
            Mode::TechnicalExploring => {
                "Welcome to Technical Concepts! Ask me about system design, databases, networking, operating systems, cloud computing, or any technical concept. I'll explain it clearly with diagrams and real-world examples."
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Analyzing => "analyze",
            Mode::Learning => "learn",
            Mode::MathExploring => "math",
            Mode::TechnicalExploring => "technical",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode '{0}' (expected analyze, learn, math or technical)")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analyze" | "analysis" => Ok(Mode::Analyzing),
            "learn" | "learning" | "algorithms" => Ok(Mode::Learning),
            "math" => Ok(Mode::MathExploring),
            "technical" | "tech" => Ok(Mode::TechnicalExploring),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// The session aggregate. Read through accessors; mutated only by the
/// orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    epoch: u64,
    mode: Option<Mode>,
    message_log: Vec<Message>,
    wire_history: Vec<ConversationTurn>,
    topic: Option<String>,
    active_language: String,
    pending_code: String,
    code_editor_visible: bool,
    busy: bool,
    uploaded_file: Option<String>,
    current_schema: Option<DiagramResult>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::fresh(0, None)
    }
}

impl SessionState {
    /// An unselected session at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(epoch: u64, mode: Option<Mode>) -> Self {
        Self {
            epoch,
            mode,
            message_log: Vec::new(),
            wire_history: Vec::new(),
            topic: None,
            active_language: DEFAULT_LANGUAGE.to_string(),
            pending_code: String::new(),
            code_editor_visible: false,
            busy: false,
            uploaded_file: None,
            current_schema: None,
        }
    }

    // --- Transitions ---

    /// Enters `mode` with a fully reset session seeded with its welcome message.
    pub fn select(&self, mode: Mode) -> Self {
        let mut next = Self::fresh(self.epoch + 1, Some(mode));
        next.message_log.push(Message::tutor_text(mode.welcome()));
        next
    }

    /// Returns to mode selection, discarding everything.
    pub fn back(&self) -> Self {
        Self::fresh(self.epoch + 1, None)
    }

    /// Starts over on a new topic within the same mode. The log is cleared
    /// entirely, without a welcome message; the active language and any
    /// uploaded file are kept.
    pub fn change_topic(&self) -> Self {
        let mut next = Self::fresh(self.epoch + 1, self.mode);
        next.active_language = self.active_language.clone();
        next.uploaded_file = self.uploaded_file.clone();
        next
    }

    /// Whether leaving this session would lose something the user did.
    pub fn has_unsaved_work(&self) -> bool {
        self.message_log.len() > 1
            || !self.pending_code.is_empty()
            || self.topic.is_some()
            || self.uploaded_file.is_some()
    }

    // --- Mutations ---

    pub(crate) fn push_message(&mut self, message: Message) {
        self.message_log.push(message);
    }

    /// Extends the wire history with an accepted exchange.
    pub(crate) fn record_exchange(&mut self, user: String, assistant: String) {
        self.wire_history.push(ConversationTurn::user(user));
        self.wire_history.push(ConversationTurn::assistant(assistant));
    }

    /// Routes a code skeleton to the editor surface.
    pub(crate) fn open_skeleton(&mut self, language: String, code: String) {
        self.active_language = language;
        self.pending_code = code;
        self.code_editor_visible = true;
    }

    pub(crate) fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub(crate) fn set_topic(&mut self, topic: String) {
        self.topic = Some(topic);
    }

    pub(crate) fn set_pending_code(&mut self, code: String) {
        self.pending_code = code;
    }

    pub(crate) fn set_active_language(&mut self, language: String) {
        self.active_language = language;
    }

    pub(crate) fn set_uploaded_file(&mut self, name: String) {
        self.uploaded_file = Some(name);
    }

    pub(crate) fn set_current_schema(&mut self, diagram: DiagramResult) {
        self.current_schema = Some(diagram);
    }

    // --- Accessors ---

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn message_log(&self) -> &[Message] {
        &self.message_log
    }

    pub fn wire_history(&self) -> &[ConversationTurn] {
        &self.wire_history
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn active_language(&self) -> &str {
        &self.active_language
    }

    pub fn pending_code(&self) -> &str {
        &self.pending_code
    }

    pub fn code_editor_visible(&self) -> bool {
        self.code_editor_visible
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn uploaded_file(&self) -> Option<&str> {
        self.uploaded_file.as_deref()
    }

    pub fn current_schema(&self) -> Option<&DiagramResult> {
        self.current_schema.as_ref()
    }
}
