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

/// Entry point of a flow. Carries the editor's trigger settings, which are
/// matched by the caller before the engine is invoked.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TriggerAction {
    #[serde(default)]
    settings: serde_json::Value,
}

#[async_trait]
impl Action for TriggerAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({ "type": "object" })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Trigger
    }

    async fn run(
        &self,
        _ctx: &Context,
        _nid: &NodeId,
    ) -> Result<ActionOutput> {
        Ok(ActionOutput::next())
    }
}
