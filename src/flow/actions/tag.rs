use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
        template::resolve_template,
    },
    runtime::Context,
    store::data::{ContactTag, Tag},
    utils,
};

fn tag_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["tag"],
        "properties": {
            "tag": { "type": "string", "minLength": 1 }
        }
    })
}

/// Resolve the configured tag name and fetch or create the tag.
fn ensure(
    ctx: &Context,
    tag: &str,
) -> Result<Option<Tag>> {
    let name = resolve_template(ctx.variables(), tag);
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    Ok(Some(ctx.store().ensure_tag(ctx.workspace_id(), name)?))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AddTagAction {
    tag: String,
}

#[async_trait]
impl Action for AddTagAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        tag_schema()
    }

    fn kind(&self) -> NodeKind {
        NodeKind::AddTag
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let Some(tag) = ensure(ctx, &self.tag)? else {
            tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "empty tag name, skipped");
            return Ok(ActionOutput::next());
        };

        ctx.store().contact_tags().upsert(&ContactTag {
            id: ContactTag::key(ctx.contact_id(), &tag.id),
            contact_id: ctx.contact_id().to_string(),
            tag_id: tag.id,
            create_time: utils::time::time_millis(),
        })?;
        Ok(ActionOutput::next())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RemoveTagAction {
    tag: String,
}

#[async_trait]
impl Action for RemoveTagAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        tag_schema()
    }

    fn kind(&self) -> NodeKind {
        NodeKind::RemoveTag
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let Some(tag) = ensure(ctx, &self.tag)? else {
            tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "empty tag name, skipped");
            return Ok(ActionOutput::next());
        };

        ctx.store().contact_tags().delete(&ContactTag::key(ctx.contact_id(), &tag.id))?;
        Ok(ActionOutput::next())
    }
}
