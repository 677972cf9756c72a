use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, Suspend, Wait, from_params},
    },
    runtime::Context,
    store::data::WakeReason,
    utils,
};

use super::delay::schedule_resume;

/// Waits for the contact's next message, optionally giving up after `timeout`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SmartDelayAction {
    #[serde(default)]
    timeout: Option<Wait>,
    /// variable receiving the text of the reply
    #[serde(default)]
    variable: Option<String>,
}

impl SmartDelayAction {
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref().filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl Action for SmartDelayAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        let mut wait = Wait::schema();
        if let Some(types) = wait.get_mut("type") {
            *types = json!(["object", "null"]);
        }
        json!({
            "type": "object",
            "properties": {
                "timeout": wait,
                "variable": { "type": ["string", "null"] }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::SmartDelay
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        if let Some(timeout) = &self.timeout {
            let run_at = timeout.deadline(utils::time::time_millis());
            schedule_resume(ctx, nid, run_at, WakeReason::Timeout)?;
        }
        Ok(ActionOutput::pause(Suspend::Input))
    }
}
