use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Config,
    common::Vars,
    events::{FlowEvent, Message},
    flow::{NodeId, actions::ActionOutput},
    gateway::MessagingGateway,
    llm::TextGenerator,
    runtime::Tracker,
    store::Store,
    utils,
};

/// Inbound event that fired a trigger or resumes a waiting session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    pub text: Option<String>,
    /// structured payload, e.g. a quick reply or button callback
    pub payload: Option<String>,
    pub sender: Option<String>,
}

impl Inbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Caller supplied input of `start_or_resume`.
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    pub trigger_id: String,
    pub flow_id: String,
    pub channel_id: String,
    pub contact_id: String,
    pub conversation_id: Option<String>,
    pub workspace_id: String,
    pub incoming: Option<Inbound>,
    /// initial session variables
    pub variables: Vars,
}

/// Account and conversation ids a message is delivered to at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTarget {
    pub account_id: String,
    pub conversation_id: String,
}

/// Long lived collaborators shared by every traversal.
pub struct Services {
    pub config: Config,
    pub store: Arc<Store>,
    pub gateway: Arc<dyn MessagingGateway>,
    pub generator: Arc<dyn TextGenerator>,
    pub http: reqwest::Client,
    pub tracker: Tracker,
}

/// Per-invocation execution context.
///
/// A context is never mutated while a node runs. Each step produces the next
/// context through [`Context::apply`].
#[derive(Clone)]
pub struct Context {
    services: Arc<Services>,

    pub(crate) trigger_id: String,
    pub(crate) flow_id: String,
    pub(crate) channel_id: String,
    pub(crate) contact_id: String,
    pub(crate) conversation_id: Option<String>,
    pub(crate) workspace_id: String,
    pub(crate) session_id: String,
    pub(crate) external_account_id: Option<String>,
    pub(crate) external_conversation_id: Option<String>,
    pub(crate) platform: String,
    pub(crate) inbound: Option<Inbound>,
    pub(crate) variables: Vars,
}

impl Context {
    pub fn new(
        services: Arc<Services>,
        trigger: &Trigger,
    ) -> Self {
        Self {
            services,
            trigger_id: trigger.trigger_id.clone(),
            flow_id: trigger.flow_id.clone(),
            channel_id: trigger.channel_id.clone(),
            contact_id: trigger.contact_id.clone(),
            conversation_id: trigger.conversation_id.clone(),
            workspace_id: trigger.workspace_id.clone(),
            session_id: String::new(),
            external_account_id: None,
            external_conversation_id: None,
            platform: String::new(),
            inbound: trigger.incoming.clone(),
            variables: trigger.variables.clone(),
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.services.store
    }

    pub fn config(&self) -> &Config {
        &self.services.config
    }

    pub fn gateway(&self) -> &Arc<dyn MessagingGateway> {
        &self.services.gateway
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.services.generator
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.services.http
    }

    pub fn trigger_id(&self) -> &str {
        &self.trigger_id
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn contact_id(&self) -> &str {
        &self.contact_id
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn inbound(&self) -> Option<&Inbound> {
        self.inbound.as_ref()
    }

    pub fn variables(&self) -> &Vars {
        &self.variables
    }

    /// Gateway ids, when both are already known.
    pub fn gateway_target(&self) -> Option<GatewayTarget> {
        match (&self.external_account_id, &self.external_conversation_id) {
            (Some(account_id), Some(conversation_id)) => Some(GatewayTarget {
                account_id: account_id.clone(),
                conversation_id: conversation_id.clone(),
            }),
            _ => None,
        }
    }

    /// Next context after a node produced `output`.
    pub fn apply(
        &self,
        output: &ActionOutput,
    ) -> Self {
        let mut next = self.clone();
        next.variables.merge(&output.variables);
        if let Some(target) = &output.gateway {
            next.external_account_id = Some(target.account_id.clone());
            next.external_conversation_id = Some(target.conversation_id.clone());
        }
        next
    }

    /// Record `event` for the current session.
    pub fn emit(
        &self,
        nid: &NodeId,
        event: FlowEvent,
    ) {
        let msg = Message {
            session_id: self.session_id.clone(),
            flow_id: self.flow_id.clone(),
            contact_id: self.contact_id.clone(),
            node_id: nid.clone(),
            event,
            timestamp: utils::time::time_millis(),
        };
        self.services.tracker.track(&self.workspace_id, msg);
    }
}
