//! Data model for the tutoring session: chat messages, wire-history turns and
//! the typed payloads the model is asked to return.
//!
//! The result types are deliberately forgiving on input. The model is only
//! *asked* for a shape, so every field falls back to its default when it is
//! missing or of the wrong type instead of failing the whole payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use utoipa::ToSchema;

// --- Chat log ---

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Tutor => write!(f, "tutor"),
        }
    }
}

/// How a chat message should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Code,
    Analysis,
    Schema,
}

/// Structured data attached to a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Analysis(AnalysisResult),
    Diagram(DiagramResult),
    /// Code the student submitted from the editor.
    Code(String),
}

/// One entry of the UI message log. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Message {
    pub fn student_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::Student,
            content: content.into(),
            kind: MessageKind::Text,
            payload: None,
        }
    }

    pub fn tutor_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tutor,
            content: content.into(),
            kind: MessageKind::Text,
            payload: None,
        }
    }

    pub fn student_code(content: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            role: Role::Student,
            content: content.into(),
            kind: MessageKind::Code,
            payload: Some(Payload::Code(code.into())),
        }
    }

    pub fn analysis(result: AnalysisResult) -> Self {
        Self {
            role: Role::Tutor,
            content: "Analysis complete! Here are the results:".to_string(),
            kind: MessageKind::Analysis,
            payload: Some(Payload::Analysis(result)),
        }
    }

    pub fn diagram(content: impl Into<String>, result: DiagramResult) -> Self {
        Self {
            role: Role::Tutor,
            content: content.into(),
            kind: MessageKind::Schema,
            payload: Some(Payload::Diagram(result)),
        }
    }
}

// --- Wire history ---

/// Role of a turn as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// Reduced projection of an accepted exchange, replayed to the model as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

// --- Typed results ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

/// A single finding from a code analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Issue {
    #[serde(deserialize_with = "lenient_lowercase")]
    pub severity: Severity,
    #[serde(deserialize_with = "lenient")]
    pub principle: String,
    #[serde(deserialize_with = "lenient")]
    pub line_content: String,
    #[serde(deserialize_with = "lenient")]
    pub explanation: String,
    #[serde(deserialize_with = "lenient")]
    pub impact: String,
    #[serde(deserialize_with = "lenient")]
    pub hint: String,
}

/// Returned by the `analyze` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AnalysisResult {
    /// Quality score, clamped to `0..=100`.
    #[serde(deserialize_with = "lenient_score")]
    pub score: u8,
    #[serde(deserialize_with = "lenient")]
    pub language_detected: String,
    #[serde(deserialize_with = "lenient")]
    pub summary: String,
    #[serde(deserialize_with = "lenient")]
    pub issues: Vec<Issue>,
    #[serde(deserialize_with = "lenient")]
    pub strengths: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    #[default]
    Mermaid,
    Ascii,
}

/// Returned by the `schema` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DiagramResult {
    #[serde(rename = "type", deserialize_with = "lenient_lowercase")]
    pub kind: DiagramKind,
    #[serde(deserialize_with = "lenient")]
    pub diagram: String,
    #[serde(deserialize_with = "lenient")]
    pub explanation: String,
    #[serde(deserialize_with = "lenient")]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TeachingKind {
    #[default]
    Explanation,
    Question,
    Validation,
    Encouragement,
}

/// Returned by the `teach`, `math` and `technical` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TeachingResult {
    #[serde(deserialize_with = "lenient")]
    pub message: String,
    #[serde(rename = "type", deserialize_with = "lenient_lowercase")]
    pub kind: TeachingKind,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub code_skeleton: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub needs_schema: bool,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub schema_request: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
}

impl TeachingResult {
    /// The diagram description to request, if the reply asked for one.
    pub fn diagram_request(&self) -> Option<&str> {
        if !self.needs_schema {
            return None;
        }
        self.schema_request
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The code template to hand to the editor, if any.
    pub fn skeleton(&self) -> Option<&str> {
        self.code_skeleton
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

// --- Lenient field decoding ---

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_lowercase<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = match Value::deserialize(deserializer)? {
        Value::String(s) => Value::String(s.trim().to_lowercase()),
        other => other,
    };
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, 100.0) as u8)
        .unwrap_or_default())
}
