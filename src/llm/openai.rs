use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{ChatflowError, Result, config::AiConfig};

use super::{GenerateRequest, TextGenerator};

/// Client of an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms)).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    fn body(request: &GenerateRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system_prompt }));
        }
        messages.extend(request.messages.iter().map(|m| json!({ "role": m.role, "content": m.content })));

        json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<String> {
        let mut req = self.client.post(&self.endpoint).json(&Self::body(request));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|err| ChatflowError::Provider(err.to_string()))?;
        let status = response.status();
        let value: Value = response.json().await.map_err(|err| ChatflowError::Provider(err.to_string()))?;
        if !status.is_success() {
            let detail = value.pointer("/error/message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(ChatflowError::Provider(format!("provider returned {}: {}", status, detail)));
        }

        value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ChatflowError::Provider("provider returned no content".to_string()))
    }
}
