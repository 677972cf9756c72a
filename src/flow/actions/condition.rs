use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
        condition::{self, Logic, Operator},
        consts::{FALSE_HANDLE, TRUE_HANDLE},
    },
    runtime::Context,
    store::data::Contact,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Rule {
    /// `platform`, `is_subscribed`, `tag:<name>`, `variable:<name>` or a custom field slug
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Rule {
    fn expected(&self) -> Option<String> {
        match &self.value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(v) => Some(v.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConditionAction {
    #[serde(default)]
    logic: Logic,
    rules: Vec<Rule>,
}

/// Contact facts a rule can look at, loaded once per node.
struct Facts {
    contact: Option<Contact>,
    tags: Vec<String>,
    fields: HashMap<String, String>,
}

impl Facts {
    fn load(ctx: &Context) -> Result<Self> {
        let store = ctx.store();
        Ok(Self {
            contact: store.contacts().find(ctx.contact_id())?,
            tags: store.contact_tag_names(ctx.contact_id())?,
            fields: store.contact_fields(ctx.workspace_id(), ctx.contact_id())?,
        })
    }

    fn resolve(
        &self,
        ctx: &Context,
        field: &str,
    ) -> Option<String> {
        if field == "platform" {
            return Some(ctx.platform().to_string());
        }
        if field == "is_subscribed" {
            return self.contact.as_ref().map(|c| c.is_subscribed.to_string());
        }
        if let Some(name) = field.strip_prefix("tag:") {
            return Some(self.tags.iter().any(|t| t.eq_ignore_ascii_case(name.trim())).to_string());
        }
        if let Some(name) = field.strip_prefix("variable:") {
            return ctx.variables().get(name.trim()).map(str::to_string);
        }
        self.fields.get(field).cloned()
    }
}

#[async_trait]
impl Action for ConditionAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["rules"],
            "properties": {
                "logic": { "type": "string", "enum": ["and", "or"] },
                "rules": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["field", "operator"],
                        "properties": {
                            "field": { "type": "string" },
                            "operator": {
                                "type": "string",
                                "enum": [
                                    "equals", "not_equals", "contains", "not_contains", "starts_with",
                                    "ends_with", "greater_than", "less_than", "is_set", "is_not_set"
                                ]
                            },
                            "value": {}
                        }
                    }
                }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Condition
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let facts = Facts::load(ctx)?;
        let results = self.rules.iter().map(|rule| {
            let actual = facts.resolve(ctx, &rule.field);
            condition::evaluate(actual.as_deref(), rule.operator, rule.expected().as_deref())
        });

        let passed = condition::combine(self.logic, results);
        tracing::debug!(session_id = %ctx.session_id(), node_id = %nid, "condition {}", passed);
        Ok(ActionOutput::branch(if passed {
            TRUE_HANDLE
        } else {
            FALSE_HANDLE
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ConditionAction;
    use crate::{
        flow::actions::{Action, Signal},
        store::data::{Contact, FieldDefinition, FieldValue},
        testing::Harness,
    };

    async fn run(
        h: &Harness,
        data: serde_json::Value,
    ) -> Signal {
        let action = ConditionAction::create(data).unwrap();
        action.run(&h.context(), &"n1".to_string()).await.unwrap().signal
    }

    #[tokio::test]
    async fn test_builtins_and_logic() {
        let h = Harness::new();
        h.store
            .contacts()
            .update(&Contact {
                id: "c1".into(),
                workspace_id: "w1".into(),
                is_subscribed: false,
                ..Default::default()
            })
            .unwrap();

        let unsubscribed = json!({"rules": [{"field": "is_subscribed", "operator": "equals", "value": true}]});
        assert_eq!(run(&h, unsubscribed).await, Signal::Branch("false".into()));

        let any = json!({
            "logic": "or",
            "rules": [
                {"field": "is_subscribed", "operator": "equals", "value": true},
                {"field": "platform", "operator": "equals", "value": "sms"}
            ]
        });
        assert_eq!(run(&h, any).await, Signal::Branch("true".into()));

        let all = json!({
            "logic": "and",
            "rules": [
                {"field": "platform", "operator": "equals", "value": "sms"},
                {"field": "is_subscribed", "operator": "equals", "value": "true"}
            ]
        });
        assert_eq!(run(&h, all).await, Signal::Branch("false".into()));
    }

    #[tokio::test]
    async fn test_tags_variables_and_fields() {
        let h = Harness::new();
        let tag = h.store.ensure_tag("w1", "VIP").unwrap();
        h.store
            .contact_tags()
            .upsert(&crate::store::data::ContactTag {
                id: crate::store::data::ContactTag::key("c1", &tag.id),
                contact_id: "c1".into(),
                tag_id: tag.id.clone(),
                create_time: 0,
            })
            .unwrap();
        h.store
            .field_definitions()
            .create(&FieldDefinition {
                id: "fd1".into(),
                workspace_id: "w1".into(),
                slug: "age".into(),
                name: "Age".into(),
                field_type: "number".into(),
            })
            .unwrap();
        h.store
            .field_values()
            .upsert(&FieldValue {
                id: FieldValue::key("c1", "fd1"),
                contact_id: "c1".into(),
                field_id: "fd1".into(),
                value: "42".into(),
                update_time: 0,
            })
            .unwrap();

        let data = json!({
            "rules": [
                {"field": "tag:vip", "operator": "equals", "value": true},
                {"field": "tag:churned", "operator": "equals", "value": false},
                {"field": "age", "operator": "greater_than", "value": 18},
                {"field": "variable:missing", "operator": "is_not_set"}
            ]
        });
        assert_eq!(run(&h, data).await, Signal::Branch("true".into()));
    }
}
