mod ab_split;
mod ai_response;
mod condition;
mod delay;
mod delivery;
mod go_to_flow;
mod http_request;
mod human_takeover;
mod reply;
mod send_message;
mod set_field;
mod smart_delay;
mod subscription;
mod tag;
mod trigger;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{
    Result,
    common::Vars,
    flow::{NodeId, NodeKind},
    runtime::{Context, GatewayTarget},
};

pub use ab_split::{AbSplitAction, SplitPath, pick_path};
pub use ai_response::AiResponseAction;
pub use condition::{ConditionAction, Rule};
pub use delay::{DelayAction, TimeUnit, Wait};
pub use go_to_flow::GoToFlowAction;
pub use http_request::HttpRequestAction;
pub use human_takeover::HumanTakeoverAction;
pub use reply::{CommentReplyAction, PrivateReplyAction};
pub use send_message::SendMessageAction;
pub use set_field::SetFieldAction;
pub use smart_delay::SmartDelayAction;
pub use subscription::{SubscribeAction, UnsubscribeAction};
pub use tag::{AddTagAction, RemoveTagAction};
pub use trigger::TriggerAction;

#[async_trait]
pub trait Action: Send + Sync {
    /// Creates a new instance of the action from the node's data.
    ///
    /// The data is validated against [`Action::schema`] first.
    fn create(params: serde_json::Value) -> Result<Self>
    where
        Self: Sized;

    /// JSON schema of the node's data.
    fn schema() -> serde_json::Value
    where
        Self: Sized;

    fn kind(&self) -> NodeKind;

    /// Executes the node.
    ///
    /// External failures (gateway, http, provider) are resolved inside the
    /// action. An `Err` means the store failed and the traversal must stop.
    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput>;
}

/// Validate `params` against `schema` and deserialize them.
pub(crate) fn from_params<T: DeserializeOwned>(
    params: serde_json::Value,
    schema: &serde_json::Value,
) -> Result<T> {
    jsonschema::validate(schema, &params)?;
    Ok(serde_json::from_value::<T>(params)?)
}

/// Why a node stopped the traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suspend {
    /// a resume job is due at `until` (ms)
    Timer { until: i64 },
    /// resume on the next inbound message
    Input,
    /// a human took the conversation over; the session ends
    HumanTakeover,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// follow the plain edge
    Continue,
    /// follow the edge labelled with this handle
    Branch(String),
    Pause(Suspend),
    /// run another flow, optionally coming back afterwards
    Call { flow_id: String, return_after: bool },
}

/// Output returned by an action's run method
#[derive(Debug, Clone)]
pub struct ActionOutput {
    pub signal: Signal,
    /// variables written by the node
    pub variables: Vars,
    /// gateway ids resolved while running, cached for later nodes
    pub gateway: Option<GatewayTarget>,
}

impl ActionOutput {
    fn with_signal(signal: Signal) -> Self {
        Self {
            signal,
            variables: Vars::new(),
            gateway: None,
        }
    }

    pub fn next() -> Self {
        Self::with_signal(Signal::Continue)
    }

    pub fn branch(handle: impl Into<String>) -> Self {
        Self::with_signal(Signal::Branch(handle.into()))
    }

    pub fn pause(suspend: Suspend) -> Self {
        Self::with_signal(Signal::Pause(suspend))
    }

    pub fn call(
        flow_id: impl Into<String>,
        return_after: bool,
    ) -> Self {
        Self::with_signal(Signal::Call {
            flow_id: flow_id.into(),
            return_after,
        })
    }

    pub fn with_variables(
        mut self,
        variables: Vars,
    ) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_gateway(
        mut self,
        target: Option<GatewayTarget>,
    ) -> Self {
        self.gateway = target;
        self
    }
}
