use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    common::Vars,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
        consts::QUICK_REPLIES_VAR,
        platform::{self, Button, PlatformKind, QuickReply, RichMessage},
        template::resolve_template,
    },
    runtime::Context,
};

use super::delivery::{deliver, resolve_target};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SendMessageAction {
    messages: Vec<RichMessage>,
}

fn interpolate(
    msg: &RichMessage,
    vars: &Vars,
) -> RichMessage {
    let resolve = |s: &String| resolve_template(vars, s);
    RichMessage {
        text: msg.text.as_ref().map(resolve),
        image_url: msg.image_url.as_ref().map(resolve),
        quick_replies: msg
            .quick_replies
            .iter()
            .map(|q| QuickReply {
                title: resolve(&q.title),
                payload: q.payload.as_ref().map(resolve),
            })
            .collect(),
        buttons: msg
            .buttons
            .iter()
            .map(|b| Button {
                title: resolve(&b.title),
                url: b.url.as_ref().map(resolve),
                payload: b.payload.as_ref().map(resolve),
            })
            .collect(),
    }
}

#[async_trait]
impl Action for SendMessageAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["messages"],
            "properties": {
                "messages": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": { "type": "string" },
                            "imageUrl": { "type": "string" },
                            "quickReplies": {
                                "type": "array",
                                "items": {
                                    "oneOf": [
                                        { "type": "string" },
                                        {
                                            "type": "object",
                                            "required": ["title"],
                                            "properties": {
                                                "title": { "type": "string" },
                                                "payload": { "type": "string" }
                                            }
                                        }
                                    ]
                                }
                            },
                            "buttons": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "required": ["title"],
                                    "properties": {
                                        "title": { "type": "string" },
                                        "url": { "type": "string" },
                                        "payload": { "type": "string" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::SendMessage
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let target = resolve_target(ctx)?;
        let pacing = ctx.config().engine.message_pacing();
        let text_only = PlatformKind::of(ctx.platform()) == PlatformKind::TextOnly;

        let mut outputs = Vars::new();
        for (i, item) in self.messages.iter().enumerate() {
            if i > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }

            let item = interpolate(item, ctx.variables());
            let adapted = platform::adapt(&item, ctx.platform());
            deliver(ctx, nid, target.as_ref(), &adapted).await?;

            // numbered replies are mapped back on resume
            let options = item.options();
            if text_only && !options.is_empty() {
                outputs.set(QUICK_REPLIES_VAR, serde_json::to_string(&options)?);
            }
        }

        Ok(ActionOutput::next().with_variables(outputs).with_gateway(target))
    }
}
