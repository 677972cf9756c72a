use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, Suspend, from_params},
    },
    runtime::Context,
    utils,
};

/// Hands the conversation to a human agent. Automation stays off for the
/// conversation until it is released.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct HumanTakeoverAction {
    /// note shown to the agent picking the conversation up
    #[serde(default)]
    note: Option<String>,
}

#[async_trait]
impl Action for HumanTakeoverAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "note": { "type": ["string", "null"] }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::HumanTakeover
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        if let Some(id) = ctx.conversation_id() {
            let conversations = ctx.store().conversations();
            if let Some(mut conversation) = conversations.find(id)? {
                conversation.automation_paused = true;
                conversation.update_time = utils::time::time_millis();
                conversations.update(&conversation)?;
            }
        }
        tracing::info!(session_id = %ctx.session_id(), node_id = %nid, "conversation handed over to a human");
        Ok(ActionOutput::pause(Suspend::HumanTakeover))
    }
}
