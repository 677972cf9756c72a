//! Outbound delivery shared by the nodes that message a contact.

use crate::{
    Result,
    events::FlowEvent,
    flow::{NodeId, platform::AdaptedMessage},
    runtime::{Context, GatewayTarget},
    store::data::{Message, MessageDirection, MessageStatus},
    utils,
};

/// External account id of the channel, from the context or the store.
pub(crate) fn resolve_account(ctx: &Context) -> Result<Option<String>> {
    if let Some(account) = &ctx.external_account_id {
        return Ok(Some(account.clone()));
    }
    Ok(ctx.store().channels().find(ctx.channel_id())?.and_then(|c| c.external_account_id))
}

/// Gateway ids of the current conversation, resolved lazily.
pub(crate) fn resolve_target(ctx: &Context) -> Result<Option<GatewayTarget>> {
    if let Some(target) = ctx.gateway_target() {
        return Ok(Some(target));
    }

    let account = resolve_account(ctx)?;
    let conversation = match (&ctx.external_conversation_id, ctx.conversation_id()) {
        (Some(external), _) => Some(external.clone()),
        (None, Some(id)) => ctx.store().conversations().find(id)?.and_then(|c| c.external_conversation_id),
        (None, None) => None,
    };

    Ok(match (account, conversation) {
        (Some(account_id), Some(conversation_id)) => Some(GatewayTarget {
            account_id,
            conversation_id,
        }),
        _ => None,
    })
}

/// Persist an outbound message with the delivery outcome and emit the
/// matching event. `Ok` carries the gateway message id, if any.
pub(crate) fn record_outbound(
    ctx: &Context,
    nid: &NodeId,
    text: Option<String>,
    outcome: std::result::Result<Option<String>, String>,
) -> Result<()> {
    let (status, external_id, err) = match &outcome {
        Ok(external_id) => (MessageStatus::Sent, external_id.clone(), None),
        Err(err) => (MessageStatus::Failed, None, Some(err.clone())),
    };
    let message = Message {
        id: utils::longid(),
        workspace_id: ctx.workspace_id().to_string(),
        conversation_id: ctx.conversation_id().map(str::to_string),
        contact_id: ctx.contact_id().to_string(),
        direction: MessageDirection::Outbound,
        text,
        status,
        external_id: external_id.clone(),
        err,
        create_time: utils::time::time_millis(),
    };
    ctx.store().messages().create(&message)?;

    let event = match outcome {
        Ok(_) => FlowEvent::MessageSent {
            message_id: message.id,
            external_id,
        },
        Err(error) => FlowEvent::MessageFailed {
            error,
        },
    };
    ctx.emit(nid, event);
    Ok(())
}

/// Send one adapted message and record the outcome. Returns whether it was sent.
pub(crate) async fn deliver(
    ctx: &Context,
    nid: &NodeId,
    target: Option<&GatewayTarget>,
    msg: &AdaptedMessage,
) -> Result<bool> {
    let outcome = match target {
        Some(target) => ctx
            .gateway()
            .send_message(&target.account_id, &target.conversation_id, &msg.text, msg.attachments.as_ref())
            .await
            .map(Some)
            .map_err(|err| err.to_string()),
        None => Err(format!("no gateway account or conversation for channel {}", ctx.channel_id())),
    };

    if let Err(err) = &outcome {
        tracing::warn!(session_id = %ctx.session_id(), node_id = %nid, "delivery failed: {}", err);
    }
    let sent = outcome.is_ok();
    record_outbound(ctx, nid, Some(msg.text.clone()), outcome)?;
    Ok(sent)
}
