use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, from_params},
    },
    runtime::Context,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SplitPath {
    /// handle of the outgoing edge
    pub name: String,
    #[serde(default)]
    pub weight: f64,
}

/// Weighted choice for a uniform `draw` in `[0, 1)`.
///
/// Falls back to the first path when every weight is zero or the draw lands
/// past the last cumulative bound through rounding.
pub fn pick_path(
    paths: &[SplitPath],
    draw: f64,
) -> Option<&SplitPath> {
    let total: f64 = paths.iter().map(|p| p.weight.max(0.0)).sum();
    if total <= 0.0 {
        return paths.first();
    }

    let target = draw * total;
    let mut acc = 0.0;
    for path in paths {
        acc += path.weight.max(0.0);
        if target < acc {
            return Some(path);
        }
    }
    paths.first()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AbSplitAction {
    paths: Vec<SplitPath>,
}

#[async_trait]
impl Action for AbSplitAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["paths"],
            "properties": {
                "paths": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string" },
                            "weight": { "type": "number", "minimum": 0 }
                        }
                    }
                }
            }
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::AbSplit
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let draw = rand::rng().random::<f64>();
        match pick_path(&self.paths, draw) {
            Some(path) => {
                tracing::debug!(session_id = %ctx.session_id(), node_id = %nid, "split path {}", path.name);
                Ok(ActionOutput::branch(path.name.clone()))
            }
            None => Ok(ActionOutput::next()),
        }
    }
}
