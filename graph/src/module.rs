use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{NodeData, PortValues};
use crate::graph::{Graph, Node, NodeId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortMerge {
    /// Value of the first incomer in edge order.
    #[default]
    First,
    /// Every present incomer value, joined with the configured separator.
    Concat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortSource {
    #[default]
    Process,
    /// Served from the node's settled configuration through the module's
    /// snapshot function. Reading it never evaluates the node.
    Snapshot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
    #[serde(default)]
    pub merge: PortMerge,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    pub name: String,
    #[serde(default)]
    pub source: PortSource,
}

impl InputPort {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            merge: PortMerge::First,
        }
    }

    pub fn concat(name: &str) -> Self {
        Self {
            name: name.to_string(),
            merge: PortMerge::Concat,
        }
    }
}

impl OutputPort {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: PortSource::Process,
        }
    }

    pub fn snapshot(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: PortSource::Snapshot,
        }
    }
}

/// Display state a processing function wants written into a node's
/// auxiliary record. Never feeds any node's inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryPatch {
    pub node_id: NodeId,
    pub patch: NodeData,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessOutput {
    pub value: String,
    pub auxiliary: Vec<AuxiliaryPatch>,
}

impl ProcessOutput {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            auxiliary: Vec::new(),
        }
    }

    pub fn with_auxiliary(mut self, node_id: NodeId, patch: NodeData) -> Self {
        self.auxiliary.push(AuxiliaryPatch { node_id, patch });
        self
    }
}

/// Read-only view handed to processing functions.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    pub graph: &'a Graph,
    pub node_id: NodeId,
}

pub trait ProcessFn:
    Fn(&Node, &ProcessContext<'_>, &PortValues) -> anyhow::Result<ProcessOutput>
    + Send
    + Sync
    + 'static
{
}

impl<T> ProcessFn for T where
    T: Fn(&Node, &ProcessContext<'_>, &PortValues) -> anyhow::Result<ProcessOutput>
        + Send
        + Sync
        + 'static
{
}

#[derive(Clone, Default)]
pub enum ProcessLambda {
    #[default]
    None,
    Lambda(Arc<dyn ProcessFn>),
}

impl ProcessLambda {
    pub fn new<F>(lambda: F) -> Self
    where
        F: Fn(&Node, &ProcessContext<'_>, &PortValues) -> anyhow::Result<ProcessOutput>
            + Send
            + Sync
            + 'static,
    {
        Self::Lambda(Arc::new(lambda))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ProcessLambda::None)
    }

    pub fn invoke(
        &self,
        node: &Node,
        ctx: &ProcessContext<'_>,
        inputs: &PortValues,
    ) -> anyhow::Result<ProcessOutput> {
        match self {
            ProcessLambda::None => {
                // registration rejects definitions without a process function
                panic!("Module missing process function");
            }
            ProcessLambda::Lambda(inner) => (inner)(node, ctx, inputs),
        }
    }
}

impl fmt::Debug for ProcessLambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessLambda::None => f.write_str("ProcessLambda::None"),
            ProcessLambda::Lambda(_) => f.write_str("ProcessLambda::Lambda"),
        }
    }
}

pub type SnapshotFn = dyn Fn(&NodeData) -> anyhow::Result<String> + Send + Sync;
pub type TickFn = dyn Fn(&NodeData) -> Option<NodeData> + Send + Sync;

/// Fixed record describing one module type. Shared by every node of that
/// type and immutable once registered.
#[derive(Clone, Default)]
pub struct ModuleDefinition {
    pub type_name: String,
    pub name: String,
    pub description: Option<String>,
    pub inputs: Vec<InputPort>,
    pub outputs: Vec<OutputPort>,
    pub default_data: NodeData,
    pub process: ProcessLambda,
    /// Required when any output port is a [`PortSource::Snapshot`] port.
    pub snapshot: Option<Arc<SnapshotFn>>,
    /// Playback hook, returns the configuration patch for one tick.
    pub on_tick: Option<Arc<TickFn>>,
}

impl ModuleDefinition {
    pub fn input(&self, port: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|input| input.name == port)
    }

    pub fn output(&self, port: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|output| output.name == port)
    }

    pub fn is_snapshot_port(&self, port: &str) -> bool {
        self.output(port)
            .is_some_and(|output| output.source == PortSource::Snapshot)
    }

    /// Checks the record shape, returning the reason it is invalid.
    pub fn check(&self) -> Option<String> {
        if self.type_name.trim().is_empty() {
            return Some("type name is empty".to_string());
        }
        if self.process.is_none() {
            return Some("missing process function".to_string());
        }

        for (idx, input) in self.inputs.iter().enumerate() {
            if input.name.is_empty() {
                return Some("input port with empty name".to_string());
            }
            if self.inputs[..idx].iter().any(|other| other.name == input.name) {
                return Some(format!("duplicate input port '{}'", input.name));
            }
        }
        for (idx, output) in self.outputs.iter().enumerate() {
            if output.name.is_empty() {
                return Some("output port with empty name".to_string());
            }
            if self.outputs[..idx]
                .iter()
                .any(|other| other.name == output.name)
            {
                return Some(format!("duplicate output port '{}'", output.name));
            }
        }

        let has_snapshot_port = self
            .outputs
            .iter()
            .any(|output| output.source == PortSource::Snapshot);
        if has_snapshot_port && self.snapshot.is_none() {
            return Some("snapshot port without a snapshot function".to_string());
        }

        None
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("default_data", &self.default_data)
            .field("process", &self.process)
            .field("snapshot", &self.snapshot.is_some())
            .field("on_tick", &self.on_tick.is_some())
            .finish()
    }
}
