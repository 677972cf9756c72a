use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
    },
    runtime::Context,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GoToFlowAction {
    flow_id: String,
    /// continue after this node once the target flow completes
    #[serde(default)]
    return_after: bool,
}

#[async_trait]
impl Action for GoToFlowAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["flowId"],
            "properties": {
                "flowId": { "type": "string", "minLength": 1 },
                "returnAfter": { "type": "boolean" }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::GoToFlow
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        tracing::debug!(session_id = %ctx.session_id(), node_id = %nid, "go to flow {} (return: {})", self.flow_id, self.return_after);
        Ok(ActionOutput::call(self.flow_id.clone(), self.return_after))
    }
}
