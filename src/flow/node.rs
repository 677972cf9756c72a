use crate::{
    ChatflowError, Result,
    flow::{
        NodeId,
        actions::{
            AbSplitAction, Action, ActionOutput, AddTagAction, AiResponseAction, CommentReplyAction, ConditionAction, DelayAction, GoToFlowAction,
            HttpRequestAction, HumanTakeoverAction, PrivateReplyAction, RemoveTagAction, SendMessageAction, SetFieldAction, SmartDelayAction,
            SubscribeAction, TriggerAction, UnsubscribeAction,
        },
    },
    model::NodeModel,
    runtime::Context,
};

/// Closed set of node kinds a flow graph may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum NodeKind {
    Trigger,
    SendMessage,
    Condition,
    Delay,
    AddTag,
    RemoveTag,
    #[strum(to_string = "set-field", serialize = "set-custom-field")]
    SetField,
    HttpRequest,
    GoToFlow,
    HumanTakeover,
    Subscribe,
    Unsubscribe,
    CommentReply,
    PrivateReply,
    AbSplit,
    SmartDelay,
    AiResponse,
}

impl NodeKind {
    /// Parse an editor tag. `snake_case` spellings are accepted too.
    pub fn parse(tag: &str) -> Result<Self> {
        tag.trim().to_ascii_lowercase().replace('_', "-").parse().map_err(|_| ChatflowError::Node(format!("unknown node kind '{}'", tag)))
    }
}

macro_rules! node_actions {
    ($($kind:ident($action:ty)),+ $(,)?) => {
        /// Executor of one node, one variant per [`NodeKind`].
        #[derive(Debug)]
        pub enum NodeAction {
            $($kind($action)),+
        }

        impl NodeAction {
            pub fn create(
                kind: NodeKind,
                data: serde_json::Value,
            ) -> Result<Self> {
                match kind {
                    $(NodeKind::$kind => Ok(NodeAction::$kind(<$action as Action>::create(data)?)),)+
                }
            }

            pub fn kind(&self) -> NodeKind {
                match self {
                    $(NodeAction::$kind(action) => action.kind(),)+
                }
            }

            pub async fn run(
                &self,
                ctx: &Context,
                nid: &NodeId,
            ) -> Result<ActionOutput> {
                match self {
                    $(NodeAction::$kind(action) => action.run(ctx, nid).await,)+
                }
            }
        }
    };
}

node_actions! {
    Trigger(TriggerAction),
    SendMessage(SendMessageAction),
    Condition(ConditionAction),
    Delay(DelayAction),
    AddTag(AddTagAction),
    RemoveTag(RemoveTagAction),
    SetField(SetFieldAction),
    HttpRequest(HttpRequestAction),
    GoToFlow(GoToFlowAction),
    HumanTakeover(HumanTakeoverAction),
    Subscribe(SubscribeAction),
    Unsubscribe(UnsubscribeAction),
    CommentReply(CommentReplyAction),
    PrivateReply(PrivateReplyAction),
    AbSplit(AbSplitAction),
    SmartDelay(SmartDelayAction),
    AiResponse(AiResponseAction),
}

#[derive(Debug)]
pub struct FlowNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub action: NodeAction,
}

impl FlowNode {
    pub fn new(model: &NodeModel) -> Result<Self> {
        if model.id.is_empty() {
            return Err(ChatflowError::Node("missing id in node".to_string()));
        }
        let kind = NodeKind::parse(&model.kind)?;
        let data = match &model.data {
            serde_json::Value::Null => serde_json::json!({}),
            data => data.clone(),
        };
        let action = NodeAction::create(kind, data).map_err(|err| ChatflowError::Node(format!("node {}: {}", model.id, err)))?;

        Ok(Self {
            id: model.id.clone(),
            kind,
            action,
        })
    }
}
