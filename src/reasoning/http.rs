//! HTTP reasoning client.
//!
//! Speaks a messages-style API. Transport-level retries with exponential
//! backoff cover rate limits and server errors; anything else surfaces
//! immediately. The orchestration engine never retries on top of this.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use super::{ReasoningClient, ReasoningRequest, ReasoningResponse, TokenUsage};
use crate::error::{CoachError, Result};

const API_VERSION: &str = "2023-06-01";

pub struct HttpReasoningClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireContent>,
    model: String,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl HttpReasoningClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(240))
            .build()
            .map_err(|e| CoachError::Reasoning {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    async fn send_once(&self, request: &ReasoningRequest) -> Result<ReasoningResponse> {
        let wire = WireRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: vec![WireMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&wire)
            .send()
            .await
            .map_err(|e| CoachError::Reasoning {
                message: format!("request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        match response.status() {
            StatusCode::OK => {
                let body: WireResponse =
                    response.json().await.map_err(|e| CoachError::Reasoning {
                        message: format!("failed to parse response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                Ok(ReasoningResponse {
                    content: body
                        .content
                        .first()
                        .map(|c| c.text.clone())
                        .unwrap_or_default(),
                    usage: TokenUsage {
                        input_tokens: body.usage.input_tokens,
                        output_tokens: body.usage.output_tokens,
                    },
                    model: body.model,
                })
            }
            StatusCode::UNAUTHORIZED => Err(CoachError::config("invalid reasoning API key")),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(CoachError::reasoning(format!("API error {status}: {text}")))
            }
        }
    }

    fn is_retryable(err: &CoachError) -> bool {
        match err {
            CoachError::Reasoning { message, .. } => {
                message.contains("429")
                    || message.contains("500")
                    || message.contains("502")
                    || message.contains("503")
                    || message.contains("529")
                    || message.contains("timed out")
            }
            _ => false,
        }
    }
}

#[async_trait::async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningResponse> {
        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if attempt >= self.max_retries || !Self::is_retryable(&err) {
                        return Err(err);
                    }
                    attempt += 1;
                    sleep(self.retry_delay * 2u32.pow(attempt - 1)).await;
                }
            }
        }
    }
}
