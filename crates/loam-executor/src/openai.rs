use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use loam_core::{LoamError, Result};

use crate::StepExecutor;

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Step executor backed by an OpenAI-compatible chat-completions endpoint.
///
/// Transient HTTP failures are retried with exponential backoff up to
/// `max_retries`; when the budget is exhausted the last error surfaces as a
/// [`LoamError::Execution`] for the agent loop's recovery path to handle.
pub struct OpenAiExecutor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiExecutor {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 500,
            max_retries: 3,
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    async fn call_once(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LoamError::Execution(format!("chat request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(LoamError::Execution(format!("chat HTTP {status}: {detail}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LoamError::Execution(format!("chat parse error: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LoamError::Execution("chat response had no choices".into()))
    }
}

#[async_trait]
impl StepExecutor for OpenAiExecutor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn execute(&self, prompt: &str) -> Result<String> {
        let attempts = self.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.call_once(prompt).await {
                Ok(output) => {
                    debug!(model = %self.model, attempt, "step executed");
                    return Ok(output);
                }
                Err(e) => {
                    if attempt + 1 < attempts {
                        let wait = Duration::from_secs(1 << attempt);
                        warn!(error = %e, attempt, wait_secs = wait.as_secs(), "chat call failed, retrying");
                        tokio::time::sleep(wait).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LoamError::Execution("no attempts were made".into())))
    }
}
