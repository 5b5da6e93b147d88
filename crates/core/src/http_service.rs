//! `TutorService` backed by the tutoring HTTP endpoints.

use crate::{
    contract::decode_contract,
    endpoint::{AnalyzeRequest, Endpoint, ErrorBody, SchemaRequest, TeachRequest, TeachingEndpoint},
    error::{Result, TutorError},
    tutor_service::TutorService,
    types::{AnalysisResult, DiagramResult, TeachingResult},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub struct HttpTutorService {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTutorService {
    /// `base_url` is the server root; endpoints live under `{base_url}/api/`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/api/{}", self.base_url, endpoint.path())
    }

    async fn post<B, T>(&self, endpoint: Endpoint, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Default,
    {
        let url = self.url(endpoint);
        debug!(%url, "POST");
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            decode_contract(&text)
        } else {
            Err(error_from_response(endpoint, status, &text))
        }
    }
}

/// Maps a non-2xx response back onto the error taxonomy.
fn error_from_response(endpoint: Endpoint, status: StatusCode, body: &str) -> TutorError {
    let description = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.describe())
        .unwrap_or_else(|_| {
            format!(
                "{} request failed with status {}",
                endpoint.path(),
                status.as_u16()
            )
        });
    match status {
        StatusCode::BAD_REQUEST => TutorError::Validation(description),
        StatusCode::SERVICE_UNAVAILABLE => TutorError::Configuration(description),
        _ => TutorError::Transport(description),
    }
}

#[async_trait]
impl TutorService for HttpTutorService {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResult> {
        self.post(Endpoint::Analyze, &request).await
    }

    async fn teach(
        &self,
        endpoint: TeachingEndpoint,
        request: TeachRequest,
    ) -> Result<TeachingResult> {
        self.post(endpoint.into(), &request).await
    }

    async fn schema(&self, request: SchemaRequest) -> Result<DiagramResult> {
        self.post(Endpoint::Schema, &request).await
    }
}
