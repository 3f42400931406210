use serde::{Deserialize, Serialize};

use crate::evaluator::Error;
use crate::graph::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeError {
    pub node_id: NodeId,
    pub error: Error,
}

/// Summary of one committed pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_no: u64,
    pub elapsed_secs: f64,

    /// Nodes whose cache was rewritten, in commit order.
    pub evaluated: Vec<NodeId>,
    pub errors: Vec<NodeError>,
    /// Processing function calls. Never more than `evaluated.len()`.
    pub invocations: usize,
}

impl PassReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_for(&self, node_id: &NodeId) -> Option<&Error> {
        self.errors
            .iter()
            .find(|node_error| node_error.node_id == *node_id)
            .map(|node_error| &node_error.error)
    }
}
