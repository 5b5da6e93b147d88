//! The request/response contracts of the tutoring endpoints.
//!
//! Every endpoint is a JSON POST. Failures are reported with an
//! [`ErrorBody`] and a non-2xx status.

use crate::error::{Result, TutorError};
use crate::types::ConversationTurn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The five endpoints and their fixed collaborator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Analyze,
    Teach,
    Math,
    Technical,
    Schema,
}

/// Teaching-style endpoints; they all return a `TeachingResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeachingEndpoint {
    Teach,
    Math,
    Technical,
}

impl From<TeachingEndpoint> for Endpoint {
    fn from(endpoint: TeachingEndpoint) -> Self {
        match endpoint {
            TeachingEndpoint::Teach => Endpoint::Teach,
            TeachingEndpoint::Math => Endpoint::Math,
            TeachingEndpoint::Technical => Endpoint::Technical,
        }
    }
}

impl Endpoint {
    /// Route segment under `/api`.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Analyze => "analyze",
            Endpoint::Teach => "teach",
            Endpoint::Math => "math",
            Endpoint::Technical => "technical",
            Endpoint::Schema => "schema",
        }
    }

    /// Prompt template name, i.e. the file stem in the prompts directory.
    pub fn prompt_key(self) -> &'static str {
        self.path()
    }

    /// Output token ceiling. Diagrams get less room than prose.
    pub fn max_tokens(self) -> u32 {
        match self {
            Endpoint::Schema => 2000,
            _ => 4000,
        }
    }

    /// The `error` text reported when the model call itself fails.
    pub fn failure_label(self) -> &'static str {
        match self {
            Endpoint::Analyze => "Failed to analyze code",
            Endpoint::Teach => "Failed to generate teaching response",
            Endpoint::Math => "Failed to get math response",
            Endpoint::Technical => "Failed to get technical response",
            Endpoint::Schema => "Failed to generate diagram",
        }
    }
}

/// Client-facing error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Human-readable text combining both fields.
    pub fn describe(&self) -> String {
        match &self.message {
            Some(message) if !message.is_empty() => format!("{}: {}", self.error, message),
            _ => self.error.clone(),
        }
    }
}

fn require(field: &str, message: &str) -> Result<()> {
    if field.trim().is_empty() {
        Err(TutorError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AnalyzeRequest {
    #[schema(example = "def f(): pass")]
    pub code: String,
    #[schema(example = "python")]
    pub language: String,
}

impl AnalyzeRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.code, "Code and language are required")?;
        require(&self.language, "Code and language are required")
    }
}

/// Request body shared by `teach`, `math` and `technical`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TeachRequest {
    #[schema(example = "Teach me Binary Search")]
    pub message: String,
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl TeachRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.message, "Message is required")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SchemaRequest {
    #[schema(example = "flowchart of binary search")]
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl SchemaRequest {
    pub fn validate(&self) -> Result<()> {
        require(&self.request, "Schema request is required")
    }
}
