mod edge;
mod flow;
mod node;

pub use edge::EdgeModel;
pub use flow::{FlowModel, FlowStatus};
pub use node::NodeModel;
