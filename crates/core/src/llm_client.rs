use crate::types::{ConversationTurn, TurnRole};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Model services the tutor can talk to. Both are reached through an
/// OpenAI-compatible chat-completions API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn api_base(self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com/v1/",
            Provider::OpenAI => "https://api.openai.com/v1/",
        }
    }

    /// Model identifier used for every endpoint. Fixed, not user-configurable.
    pub fn model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-20250514",
            Provider::OpenAI => "gpt-4o",
        }
    }

    /// Environment variable holding this provider's credential.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAI),
            other => Err(format!("'{}' is not a supported provider", other)),
        }
    }
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming completion call and returns the raw text
    /// of the first choice.
    async fn complete(
        &self,
        system_prompt: String,
        history: Vec<ConversationTurn>,
        max_tokens: u32,
    ) -> Result<String>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    /// Creates a client pointed at `provider` with its fixed model.
    pub fn for_provider(provider: Provider, api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(provider.api_base());
        Self::new(config, provider.model().to_string())
    }
}

fn to_request_messages(
    system_prompt: String,
    history: Vec<ConversationTurn>,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?
            .into(),
    ];
    for turn in history {
        match turn.role {
            TurnRole::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content)
                    .build()?
                    .into(),
            ),
            TurnRole::Assistant => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content)
                    .build()?
                    .into(),
            ),
        };
    }
    Ok(messages)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        system_prompt: String,
        history: Vec<ConversationTurn>,
        max_tokens: u32,
    ) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_request_messages(system_prompt, history)?)
            .max_completion_tokens(max_tokens)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")
    }
}
