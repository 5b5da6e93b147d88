//! Tutoring Service
//!
//! This module defines the contract every tutoring backend fulfils (one
//! operation per endpoint) and the implementation that talks to the model
//! directly. Request validation always happens before the credential check,
//! and the credential check always happens before any network call.

use crate::{
    contract::decode_contract,
    endpoint::{AnalyzeRequest, Endpoint, SchemaRequest, TeachRequest, TeachingEndpoint},
    error::{Result, TutorError},
    llm_client::LLMClient,
    prompts::render,
    types::{AnalysisResult, ConversationTurn, DiagramResult, TeachingResult},
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Defines the contract for any service that can answer tutoring requests.
///
/// Implementations may call a model directly or go through the HTTP
/// endpoints; the orchestrator does not care which.
#[async_trait]
pub trait TutorService: Send + Sync {
    /// Reviews a piece of code and scores it.
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResult>;

    /// Produces the next teaching turn on one of the three teaching endpoints.
    async fn teach(
        &self,
        endpoint: TeachingEndpoint,
        request: TeachRequest,
    ) -> Result<TeachingResult>;

    /// Generates a diagram for a free-text request.
    async fn schema(&self, request: SchemaRequest) -> Result<DiagramResult>;
}

/// An implementation of `TutorService` that prompts an LLM and parses its
/// JSON answer.
pub struct LLMTutorService {
    client: Option<Arc<dyn LLMClient>>,
    prompts: HashMap<String, String>,
}

impl LLMTutorService {
    /// Creates a new LLM-backed tutoring service.
    ///
    /// # Arguments
    ///
    /// * `client` - The model client, or `None` when no credential is
    ///   configured. Every request then fails with a configuration error.
    /// * `prompts` - System prompt templates keyed by endpoint name
    ///   (`analyze`, `teach`, `math`, `technical`, `schema`).
    pub fn new(client: Option<Arc<dyn LLMClient>>, prompts: HashMap<String, String>) -> Self {
        if client.is_none() {
            warn!("No model credential configured; every tutoring request will be refused.");
        }
        Self { client, prompts }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&Arc<dyn LLMClient>> {
        self.client
            .as_ref()
            .ok_or_else(|| TutorError::Configuration("API key not configured".to_string()))
    }

    fn prompt(&self, endpoint: Endpoint) -> Result<&str> {
        self.prompts
            .get(endpoint.prompt_key())
            .map(String::as_str)
            .ok_or_else(|| {
                TutorError::Configuration(format!(
                    "Missing prompt template: '{}'",
                    endpoint.prompt_key()
                ))
            })
    }

    async fn call<T>(
        &self,
        endpoint: Endpoint,
        system_prompt: String,
        history: Vec<ConversationTurn>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let client = self.client()?;
        debug!(endpoint = endpoint.path(), turns = history.len(), "Calling model");
        let raw = client
            .complete(system_prompt, history, endpoint.max_tokens())
            .await
            .map_err(|e| TutorError::Transport(format!("{:#}", e)))?;
        decode_contract(&raw).inspect_err(|e| {
            warn!(endpoint = endpoint.path(), error = %e, "Model broke the response contract");
        })
    }
}

/// Appends the per-turn context block to a system prompt.
fn with_context(system_prompt: &str, context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "{}\n\n# Current Context for This Turn\n\n{}",
            system_prompt, context
        ),
        None => system_prompt.to_string(),
    }
}

#[async_trait]
impl TutorService for LLMTutorService {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResult> {
        request.validate()?;
        self.client()?;
        let system_prompt = render(
            self.prompt(Endpoint::Analyze)?,
            &[("language", &request.language)],
        );
        let user = format!(
            "Analyze this {lang} code:\n\n```{lang}\n{code}\n```",
            lang = request.language,
            code = request.code
        );
        let result: AnalysisResult = self
            .call(Endpoint::Analyze, system_prompt, vec![ConversationTurn::user(user)])
            .await?;
        info!(score = result.score, issues = result.issues.len(), "Analysis complete");
        Ok(result)
    }

    async fn teach(
        &self,
        endpoint: TeachingEndpoint,
        request: TeachRequest,
    ) -> Result<TeachingResult> {
        request.validate()?;
        self.client()?;
        let endpoint = Endpoint::from(endpoint);
        let system_prompt = with_context(self.prompt(endpoint)?, request.context.as_deref());

        let mut history = request.conversation_history;
        history.push(ConversationTurn::user(request.message));

        self.call(endpoint, system_prompt, history).await
    }

    async fn schema(&self, request: SchemaRequest) -> Result<DiagramResult> {
        request.validate()?;
        self.client()?;
        let system_prompt = self.prompt(Endpoint::Schema)?.to_string();
        let user = match request.context.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(context) => format!(
                "Create a diagram for: {}\n\nContext: {}",
                request.request, context
            ),
            None => format!("Create a diagram for: {}", request.request),
        };
        self.call(Endpoint::Schema, system_prompt, vec![ConversationTurn::user(user)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLLMClient;
    use crate::types::TurnRole;
    use mockall::predicate::*;

    fn prompts() -> HashMap<String, String> {
        ["analyze", "teach", "math", "technical", "schema"]
            .into_iter()
            .map(|k| (k.to_string(), format!("{} prompt for {{language}}", k)))
            .collect()
    }

    fn service(mock: MockLLMClient) -> LLMTutorService {
        LLMTutorService::new(Some(Arc::new(mock)), prompts())
    }

    #[tokio::test]
    async fn test_analyze_parses_model_json() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .withf(|system, history, max_tokens| {
                system == "analyze prompt for python"
                    && history.len() == 1
                    && history[0].content.contains("```python\ndef f(): pass\n```")
                    && *max_tokens == 4000
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(r#"{"score": 88, "language_detected": "python", "summary": "ok", "issues": [], "strengths": []}"#.to_string())
            });

        let result = service(mock)
            .analyze(AnalyzeRequest {
                code: "def f(): pass".into(),
                language: "python".into(),
            })
            .await
            .unwrap();

        assert_eq!(result.score, 88);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_call() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete().times(0);
        let service = service(mock);

        let err = service
            .analyze(AnalyzeRequest {
                code: String::new(),
                language: "python".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::Validation(_)));

        let err = service
            .schema(SchemaRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, TutorError::Validation("Schema request is required".into()));
    }

    #[tokio::test]
    async fn test_unconfigured_service_refuses_every_endpoint() {
        let service = LLMTutorService::new(None, prompts());
        assert!(!service.is_configured());

        let analyze = service
            .analyze(AnalyzeRequest {
                code: "x".into(),
                language: "python".into(),
            })
            .await;
        let teach = service
            .teach(
                TeachingEndpoint::Technical,
                TeachRequest {
                    message: "What is a CDN?".into(),
                    ..Default::default()
                },
            )
            .await;
        let schema = service
            .schema(SchemaRequest {
                request: "tree".into(),
                context: None,
            })
            .await;

        for err in [analyze.unwrap_err(), teach.unwrap_err(), schema.unwrap_err()] {
            assert_eq!(err, TutorError::Configuration("API key not configured".into()));
        }
    }

    #[tokio::test]
    async fn test_missing_prompt_is_configuration_error() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete().times(0);
        let service = LLMTutorService::new(Some(Arc::new(mock)), HashMap::new());

        let err = service
            .teach(
                TeachingEndpoint::Math,
                TeachRequest {
                    message: "Monty Hall".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, TutorError::Configuration("Missing prompt template: 'math'".into()));
    }

    #[tokio::test]
    async fn test_teach_replays_history_then_new_message() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .withf(|system, history, _| {
                system.starts_with("math prompt")
                    && system.ends_with("Topic: Monty Hall")
                    && history.len() == 3
                    && history[0].role == TurnRole::User
                    && history[1].role == TurnRole::Assistant
                    && history[2].content == "Why switch?"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok("Here you go:\n{\"message\": \"Because 2/3.\", \"needs_schema\": false}".to_string())
            });

        let result = service(mock)
            .teach(
                TeachingEndpoint::Math,
                TeachRequest {
                    message: "Why switch?".into(),
                    conversation_history: vec![
                        ConversationTurn::user("Explain Monty Hall"),
                        ConversationTurn::assistant("Three doors..."),
                    ],
                    context: Some("Topic: Monty Hall".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(result.message, "Because 2/3.");
        assert!(!result.needs_schema);
    }

    #[tokio::test]
    async fn test_schema_uses_smaller_token_ceiling_and_context() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .with(
                eq("schema prompt for {language}".to_string()),
                eq(vec![ConversationTurn::user(
                    "Create a diagram for: flowchart\n\nContext: Binary Search",
                )]),
                eq(2000u32),
            )
            .times(1)
            .returning(|_, _, _| Ok(r#"{"type": "mermaid", "diagram": "graph TD"}"#.to_string()));

        let result = service(mock)
            .schema(SchemaRequest {
                request: "flowchart".into(),
                context: Some("Binary Search".into()),
            })
            .await
            .unwrap();
        assert_eq!(result.diagram, "graph TD");
    }

    #[tokio::test]
    async fn test_transport_and_contract_failures() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));
        let err = service(mock)
            .schema(SchemaRequest {
                request: "tree".into(),
                context: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, TutorError::Transport("connection reset".into()));

        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_, _, _| Ok("Sorry, I can't produce JSON today.".to_string()));
        let err = service(mock)
            .schema(SchemaRequest {
                request: "tree".into(),
                context: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::ContractViolation(_)));
    }

    #[test]
    fn test_with_context_skips_blank() {
        assert_eq!(with_context("base", None), "base");
        assert_eq!(with_context("base", Some("  ")), "base");
        assert!(with_context("base", Some("Topic: Heaps")).ends_with("Topic: Heaps"));
    }
}
