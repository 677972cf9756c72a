use crate::store::data::AnalyticsEventType;

/// Why traversal stopped without completing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseReason {
    /// delay node, resumes at `until` (ms)
    Timer { until: i64 },
    /// smart-delay node, resumes on the next inbound message
    Input,
    /// conversation handed over to a human agent
    HumanTakeover,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    Started,
    NodeExecuted { kind: String },
    MessageSent { message_id: String, external_id: Option<String> },
    MessageFailed { error: String },
    Paused(PauseReason),
    Completed,
    Cancelled { reason: String },
    Expired,
}

impl FlowEvent {
    pub fn str(&self) -> &str {
        match self {
            FlowEvent::Started => "Started",
            FlowEvent::NodeExecuted { .. } => "NodeExecuted",
            FlowEvent::MessageSent { .. } => "MessageSent",
            FlowEvent::MessageFailed { .. } => "MessageFailed",
            FlowEvent::Paused(_) => "Paused",
            FlowEvent::Completed => "Completed",
            FlowEvent::Cancelled { .. } => "Cancelled",
            FlowEvent::Expired => "Expired",
        }
    }

    /// Analytics fact recorded for this event, if any.
    pub fn analytics_type(&self) -> Option<AnalyticsEventType> {
        match self {
            FlowEvent::Started => Some(AnalyticsEventType::FlowStarted),
            FlowEvent::NodeExecuted { .. } => Some(AnalyticsEventType::NodeExecuted),
            FlowEvent::MessageSent { .. } => Some(AnalyticsEventType::MessageSent),
            FlowEvent::MessageFailed { .. } => Some(AnalyticsEventType::MessageFailed),
            FlowEvent::Completed => Some(AnalyticsEventType::FlowCompleted),
            FlowEvent::Paused(_) | FlowEvent::Cancelled { .. } | FlowEvent::Expired => None,
        }
    }
}
