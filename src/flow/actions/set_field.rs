use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
        template::resolve_template,
    },
    runtime::Context,
    store::data::FieldValue,
    utils,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetFieldAction {
    /// slug of the field definition
    field: String,
    #[serde(default)]
    value: Value,
}

impl SetFieldAction {
    fn raw_value(&self) -> String {
        match &self.value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            v => v.to_string(),
        }
    }
}

#[async_trait]
impl Action for SetFieldAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["field"],
            "properties": {
                "field": { "type": "string", "minLength": 1 },
                "value": {}
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::SetField
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let store = ctx.store();
        let Some(def) = store.find_field_definition(ctx.workspace_id(), &self.field)? else {
            tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "unknown custom field {}", self.field);
            return Ok(ActionOutput::next());
        };

        let value = resolve_template(ctx.variables(), &self.raw_value());
        store.field_values().upsert(&FieldValue {
            id: FieldValue::key(ctx.contact_id(), &def.id),
            contact_id: ctx.contact_id().to_string(),
            field_id: def.id,
            value,
            update_time: utils::time::time_millis(),
        })?;
        Ok(ActionOutput::next())
    }
}
