//! Replies to the post comment that fired the flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    ChatflowError, Result,
    events::FlowEvent,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
        consts::{COMMENT_ID_VAR, POST_ID_VAR},
        template::resolve_template,
    },
    runtime::Context,
};

use super::delivery::{record_outbound, resolve_account};

fn reply_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["text"],
        "properties": {
            "text": { "type": "string" }
        }
    })
}

/// Post and comment ids set upstream by the comment processor.
fn comment_ids(ctx: &Context) -> Option<(String, String)> {
    let vars = ctx.variables();
    match (vars.get(POST_ID_VAR), vars.get(COMMENT_ID_VAR)) {
        (Some(post), Some(comment)) if !post.is_empty() && !comment.is_empty() => Some((post.to_string(), comment.to_string())),
        _ => None,
    }
}

fn missing_account(ctx: &Context) -> ChatflowError {
    ChatflowError::Gateway(format!("no gateway account for channel {}", ctx.channel_id()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CommentReplyAction {
    text: String,
}

#[async_trait]
impl Action for CommentReplyAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        reply_schema()
    }

    fn kind(&self) -> NodeKind {
        NodeKind::CommentReply
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let Some((post_id, comment_id)) = comment_ids(ctx) else {
            return Ok(ActionOutput::next());
        };

        let text = resolve_template(ctx.variables(), &self.text);
        let sent = match resolve_account(ctx)? {
            Some(account) => ctx.gateway().reply_to_post(&post_id, &account, &text, &comment_id).await,
            None => Err(missing_account(ctx)),
        };

        // a public reply is not a direct message, only the failure is tracked
        if let Err(err) = sent {
            tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "comment reply on {} failed: {}", post_id, err);
            ctx.emit(
                nid,
                FlowEvent::MessageFailed {
                    error: err.to_string(),
                },
            );
        }
        Ok(ActionOutput::next())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PrivateReplyAction {
    text: String,
}

#[async_trait]
impl Action for PrivateReplyAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        reply_schema()
    }

    fn kind(&self) -> NodeKind {
        NodeKind::PrivateReply
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let Some((post_id, comment_id)) = comment_ids(ctx) else {
            return Ok(ActionOutput::next());
        };

        let text = resolve_template(ctx.variables(), &self.text);
        let sent = match resolve_account(ctx)? {
            Some(account) => ctx.gateway().send_private_reply(&post_id, &comment_id, &account, &text).await,
            None => Err(missing_account(ctx)),
        };

        let outcome = sent.map(|_| None).map_err(|err| {
            tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "private reply to {} failed: {}", comment_id, err);
            err.to_string()
        });
        record_outbound(ctx, nid, Some(text), outcome)?;
        Ok(ActionOutput::next())
    }
}
