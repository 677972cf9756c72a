//! Text-generation provider used by `ai-response` nodes.

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use openai::OpenAiGenerator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user` or `assistant`
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<String>;
}
