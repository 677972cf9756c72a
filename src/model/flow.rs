use serde::{Deserialize, Serialize};

use crate::{
    ChatflowError, Result,
    model::{EdgeModel, NodeModel},
};

/// Lifecycle state of a flow. Only published flows can be started.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// Flow definition as authored by the graph editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowModel {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeModel>,
    #[serde(default)]
    pub edges: Vec<EdgeModel>,
}

impl FlowModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<FlowModel>(s).map_err(|e| ChatflowError::Flow(format!("{}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::FlowModel;

    #[test]
    fn test_from_json_reads_editor_shape() {
        let flow = FlowModel::from_json(
            r#"{
                "id": "f1",
                "workspaceId": "w1",
                "name": "welcome",
                "nodes": [
                    {"id": "t", "type": "trigger"},
                    {"id": "c", "type": "condition", "data": {"logic": "or", "rules": []}}
                ],
                "edges": [
                    {"id": "e1", "source": "t", "target": "c"},
                    {"id": "e2", "source": "c", "target": "t", "sourceHandle": "true"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(flow.nodes.len(), 2);
        assert_eq!(flow.nodes[1].kind, "condition");
        assert_eq!(flow.edges[0].source_handle, None);
        assert_eq!(flow.edges[1].source_handle.as_deref(), Some("true"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(FlowModel::from_json("{").is_err());
    }
}
