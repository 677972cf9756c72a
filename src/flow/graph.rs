//! Runtime flow representation using a directed graph.

use std::collections::{HashMap, HashSet};

use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use crate::{
    ChatflowError, Result,
    flow::{FlowNode, NodeId, NodeKind, consts::TIMEOUT_HANDLE},
    model::{EdgeModel, FlowModel},
};

/// Immutable graph of one flow version.
///
/// Edges pointing at a node that does not exist are kept aside: selecting one
/// ends the traversal the same way a missing edge does.
pub struct FlowGraph {
    id: String,
    version: i64,
    workspace_id: String,
    graph: DiGraph<FlowNode, EdgeModel>,
    index: HashMap<NodeId, NodeIndex>,
    dangling: HashMap<NodeId, Vec<EdgeModel>>,
    trigger: Option<NodeIndex>,
}

impl FlowGraph {
    pub fn build(
        model: &FlowModel,
        version: i64,
    ) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut trigger = None;

        for node in &model.nodes {
            if index.contains_key(&node.id) {
                return Err(ChatflowError::Flow(format!("duplicate node id '{}' in flow {}", node.id, model.id)));
            }
            let node = FlowNode::new(node)?;
            let is_trigger = node.kind == NodeKind::Trigger;
            let id = node.id.clone();
            let idx = graph.add_node(node);
            if is_trigger && trigger.is_none() {
                trigger = Some(idx);
            }
            index.insert(id, idx);
        }

        let mut seen = HashSet::new();
        let mut dangling: HashMap<NodeId, Vec<EdgeModel>> = HashMap::new();
        for edge in &model.edges {
            if !seen.insert(edge.id.clone()) {
                return Err(ChatflowError::Edge(format!("duplicate edge id '{}' in flow {}", edge.id, model.id)));
            }
            let Some(&from) = index.get(&edge.source) else {
                tracing::debug!("flow {}: edge {} leaves unknown node {}", model.id, edge.id, edge.source);
                continue;
            };
            match index.get(&edge.target) {
                Some(&to) => {
                    graph.add_edge(from, to, edge.clone());
                }
                None => dangling.entry(edge.source.clone()).or_default().push(edge.clone()),
            }
        }

        Ok(Self {
            id: model.id.clone(),
            version,
            workspace_id: model.workspace_id.clone(),
            graph,
            index,
            dangling,
            trigger,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn node(
        &self,
        id: &str,
    ) -> Option<&FlowNode> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn trigger(&self) -> Option<&FlowNode> {
        self.trigger.map(|idx| &self.graph[idx])
    }

    fn outgoing(
        &self,
        id: &str,
    ) -> Vec<&EdgeModel> {
        let mut edges: Vec<&EdgeModel> = match self.index.get(id) {
            Some(idx) => self.graph.edges_directed(*idx, Direction::Outgoing).map(|e| e.weight()).collect(),
            None => Vec::new(),
        };
        if let Some(extra) = self.dangling.get(id) {
            edges.extend(extra.iter());
        }
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        edges
    }

    /// Pick the edge leaving `id`.
    ///
    /// With a `handle` only edges labelled with it match. Without one an
    /// unlabelled edge is preferred, then any edge not labelled `timeout`.
    /// Ties go to the lowest edge id.
    pub fn select_edge(
        &self,
        id: &str,
        handle: Option<&str>,
    ) -> Option<&EdgeModel> {
        let edges = self.outgoing(id);
        match handle {
            Some(handle) => edges.into_iter().find(|e| e.source_handle.as_deref() == Some(handle)),
            None => {
                let unlabelled = edges.iter().copied().find(|e| e.source_handle.as_deref().is_none_or(str::is_empty));
                unlabelled.or_else(|| edges.iter().copied().find(|e| e.source_handle.as_deref() != Some(TIMEOUT_HANDLE)))
            }
        }
    }

    /// Node reached from `id` through the selected edge, if it exists.
    pub fn next(
        &self,
        id: &str,
        handle: Option<&str>,
    ) -> Option<&FlowNode> {
        self.select_edge(id, handle).and_then(|e| self.node(&e.target))
    }

    /// First real node after the trigger.
    pub fn entry(&self) -> Option<&FlowNode> {
        self.trigger().and_then(|t| self.next(&t.id, None))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::FlowGraph;
    use crate::model::FlowModel;

    fn model() -> FlowModel {
        serde_json::from_value(json!({
            "id": "f1",
            "workspaceId": "w1",
            "name": "branching",
            "nodes": [
                {"id": "t", "type": "trigger"},
                {"id": "c", "type": "condition", "data": {"logic": "and", "rules": []}},
                {"id": "yes", "type": "subscribe"},
                {"id": "no", "type": "unsubscribe"}
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "c"},
                {"id": "e3", "source": "c", "target": "no", "sourceHandle": "false"},
                {"id": "e2", "source": "c", "target": "yes", "sourceHandle": "true"},
                {"id": "e4", "source": "yes", "target": "gone"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_entry_follows_trigger() {
        let g = FlowGraph::build(&model(), 1).unwrap();
        assert_eq!(g.trigger().unwrap().id, "t");
        assert_eq!(g.entry().unwrap().id, "c");
    }

    #[test]
    fn test_named_handles() {
        let g = FlowGraph::build(&model(), 1).unwrap();
        assert_eq!(g.next("c", Some("true")).unwrap().id, "yes");
        assert_eq!(g.next("c", Some("false")).unwrap().id, "no");
        assert!(g.next("c", Some("maybe")).is_none());
        // no unlabelled edge: lowest edge id
        assert_eq!(g.select_edge("c", None).unwrap().id, "e2");
    }

    #[test]
    fn test_timeout_edge_needs_its_handle() {
        let m: FlowModel = serde_json::from_value(json!({
            "id": "f2",
            "workspaceId": "w1",
            "name": "waiting",
            "nodes": [
                {"id": "t", "type": "trigger"},
                {"id": "wait", "type": "smart-delay"},
                {"id": "late", "type": "unsubscribe"}
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "wait"},
                {"id": "e2", "source": "wait", "target": "late", "sourceHandle": "timeout"}
            ]
        }))
        .unwrap();
        let g = FlowGraph::build(&m, 1).unwrap();
        assert!(g.select_edge("wait", None).is_none());
        assert_eq!(g.next("wait", Some("timeout")).unwrap().id, "late");
    }

    #[test]
    fn test_missing_target_and_sink() {
        let g = FlowGraph::build(&model(), 1).unwrap();
        assert_eq!(g.select_edge("yes", None).unwrap().target, "gone");
        assert!(g.next("yes", None).is_none());
        assert!(g.next("no", None).is_none());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_nodes() {
        let mut m = model();
        m.nodes.push(m.nodes[0].clone());
        assert!(FlowGraph::build(&m, 1).is_err());

        let mut m = model();
        m.nodes[1].kind = "teleport".into();
        assert!(FlowGraph::build(&m, 1).is_err());
    }

    #[test]
    fn test_without_trigger() {
        let mut m = model();
        m.nodes.remove(0);
        let g = FlowGraph::build(&m, 1).unwrap();
        assert!(g.trigger().is_none());
        assert!(g.entry().is_none());
    }
}
