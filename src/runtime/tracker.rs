use std::sync::Arc;

use serde_json::json;

use crate::{
    events::{FlowEvent, Message},
    runtime::Channel,
    store::{Store, data::AnalyticsEvent},
    utils,
};

/// Writes analytics facts and publishes flow events.
///
/// Analytics are write-only from the engine's point of view, so a failed
/// write is logged and otherwise ignored.
pub struct Tracker {
    store: Arc<Store>,
    channel: Arc<Channel>,
}

impl Tracker {
    pub fn new(
        store: Arc<Store>,
        channel: Arc<Channel>,
    ) -> Self {
        Self {
            store,
            channel,
        }
    }

    pub fn track(
        &self,
        workspace_id: &str,
        msg: Message,
    ) {
        if let Some(event_type) = msg.event.analytics_type() {
            let event = AnalyticsEvent {
                id: utils::longid(),
                workspace_id: workspace_id.to_string(),
                flow_id: Some(msg.flow_id.clone()),
                contact_id: Some(msg.contact_id.clone()),
                event_type,
                metadata: Some(metadata(&msg)),
                create_time: msg.timestamp,
            };
            if let Err(err) = self.store.analytics().create(&event) {
                tracing::warn!(session_id = %msg.session_id, "failed to record {} event: {}", event_type.as_ref(), err);
            }
        }

        tracing::trace!(session_id = %msg.session_id, node_id = %msg.node_id, "event {}", msg.event.str());
        self.channel.publish(msg);
    }
}

fn metadata(msg: &Message) -> serde_json::Value {
    match &msg.event {
        FlowEvent::NodeExecuted {
            kind,
        } => json!({ "sessionId": msg.session_id, "nodeId": msg.node_id, "nodeKind": kind }),
        FlowEvent::MessageSent {
            message_id,
            external_id,
        } => json!({ "sessionId": msg.session_id, "nodeId": msg.node_id, "messageId": message_id, "externalId": external_id }),
        FlowEvent::MessageFailed {
            error,
        } => json!({ "sessionId": msg.session_id, "nodeId": msg.node_id, "error": error }),
        _ => json!({ "sessionId": msg.session_id }),
    }
}
