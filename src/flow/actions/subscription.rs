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
    utils,
};

fn set_subscribed(
    ctx: &Context,
    nid: &NodeId,
    subscribed: bool,
) -> Result<()> {
    let contacts = ctx.store().contacts();
    let Some(mut contact) = contacts.find(ctx.contact_id())? else {
        tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "contact {} not found", ctx.contact_id());
        return Ok(());
    };
    contact.is_subscribed = subscribed;
    contact.update_time = utils::time::time_millis();
    contacts.update(&contact)?;
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SubscribeAction {}

#[async_trait]
impl Action for SubscribeAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({ "type": "object" })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Subscribe
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        set_subscribed(ctx, nid, true)?;
        Ok(ActionOutput::next())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UnsubscribeAction {}

#[async_trait]
impl Action for UnsubscribeAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({ "type": "object" })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Unsubscribe
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        set_subscribed(ctx, nid, false)?;
        Ok(ActionOutput::next())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{SubscribeAction, UnsubscribeAction};
    use crate::{flow::actions::Action, testing::Harness};

    #[tokio::test]
    async fn test_toggle_subscription() {
        let h = Harness::new();
        let ctx = h.context();
        let nid = "n1".to_string();
        let subscribed = || h.store.contacts().find("c1").unwrap().unwrap().is_subscribed;

        UnsubscribeAction::create(json!({})).unwrap().run(&ctx, &nid).await.unwrap();
        assert!(!subscribed());
        SubscribeAction::create(json!({})).unwrap().run(&ctx, &nid).await.unwrap();
        assert!(subscribed());
    }
}
