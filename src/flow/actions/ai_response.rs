use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    common::Vars,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
        consts::AI_RESPONSE_VAR,
        platform::{self, RichMessage},
        template::resolve_template,
    },
    llm::{ChatMessage, GenerateRequest},
    runtime::Context,
    store::data::MessageDirection,
};

use super::delivery::{deliver, record_outbound, resolve_target};

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_context_messages() -> usize {
    10
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AiResponseAction {
    #[serde(default)]
    system_prompt: String,
    /// falls back to the configured default model
    #[serde(default)]
    model: Option<String>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_context_messages")]
    context_messages: usize,
}

impl AiResponseAction {
    /// Conversation history, oldest first. Empty when `contextMessages` is 0.
    fn history(
        &self,
        ctx: &Context,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::new();
        if self.context_messages == 0 {
            return Ok(messages);
        }
        if let Some(id) = ctx.conversation_id() {
            for msg in ctx.store().recent_messages(id, self.context_messages)? {
                let Some(text) = msg.text.filter(|t| !t.is_empty()) else {
                    continue;
                };
                messages.push(match msg.direction {
                    MessageDirection::Inbound => ChatMessage::user(text),
                    MessageDirection::Outbound => ChatMessage::assistant(text),
                });
            }
        }

        if messages.is_empty() {
            if let Some(text) = ctx.inbound().and_then(|i| i.text.clone()) {
                messages.push(ChatMessage::user(text));
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl Action for AiResponseAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "systemPrompt": { "type": "string" },
                "model": { "type": ["string", "null"] },
                "temperature": { "type": "number", "minimum": 0, "maximum": 2 },
                "maxTokens": { "type": "integer", "minimum": 1 },
                "contextMessages": { "type": "integer", "minimum": 0 }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::AiResponse
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let target = resolve_target(ctx)?;
        let request = GenerateRequest {
            model: self.model.clone().filter(|m| !m.is_empty()).unwrap_or_else(|| ctx.config().ai.default_model.clone()),
            system_prompt: resolve_template(ctx.variables(), &self.system_prompt),
            messages: self.history(ctx)?,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut outputs = Vars::new();
        match ctx.generator().generate(&request).await {
            Ok(reply) => {
                let adapted = platform::adapt(&RichMessage::text(reply.clone()), ctx.platform());
                deliver(ctx, nid, target.as_ref(), &adapted).await?;
                outputs.set(AI_RESPONSE_VAR, reply);
            }
            Err(err) => {
                tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "ai generation failed: {}", err);
                record_outbound(ctx, nid, None, Err(err.to_string()))?;
            }
        }
        Ok(ActionOutput::next().with_variables(outputs).with_gateway(target))
    }
}
