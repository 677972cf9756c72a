use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeModel {
    pub id: String,
    /// node kind tag, e.g. `send-message`
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}
