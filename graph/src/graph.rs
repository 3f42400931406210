use common::id_type;
use common::is_debug;
use common::key_index_vec::{KeyIndexKey, KeyIndexVec};
use common::{deserialize, serialize, SerdeFormat};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::data::NodeData;
use crate::module::ModuleDefinition;
use crate::registry::{self, ModuleRegistry};

id_type!(NodeId);

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    #[error("Unknown node {node_id}")]
    UnknownNode { node_id: NodeId },
    #[error("Node {node_id} already exists")]
    DuplicateNode { node_id: NodeId },
    #[error("Node {node_id} has no {direction} port '{port}'")]
    UnknownPort {
        node_id: NodeId,
        port: String,
        direction: PortDirection,
    },
    #[error("Port '{port}' on node {node_id} is not an {expected} port")]
    DirectionMismatch {
        node_id: NodeId,
        port: String,
        expected: PortDirection,
    },
    #[error(transparent)]
    Registry(#[from] registry::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub module_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: NodeData,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node_id: NodeId,
    pub port: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: PortRef,
    pub target: PortRef,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: KeyIndexVec<NodeId, Node>,
    /// Declaration order is significant: it is the order incomers are seen in.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Node {
    /// New node of the given module type, configured with its defaults.
    pub fn from_module(definition: &ModuleDefinition) -> Self {
        Node {
            id: NodeId::unique(),
            module_type: definition.type_name.clone(),
            name: definition.name.clone(),
            data: definition.default_data.clone(),
        }
    }
}

impl PortRef {
    pub fn new(node_id: NodeId, port: &str) -> Self {
        Self {
            node_id,
            port: port.to_string(),
        }
    }
}

impl Graph {
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        assert!(!node.id.is_nil());

        if self.nodes.contains_key(&node.id) {
            return Err(Error::DuplicateNode { node_id: node.id });
        }
        self.nodes.add(node);

        Ok(())
    }

    /// Removes the node and every edge touching it.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Result<Node> {
        let node = self
            .nodes
            .remove_by_key(node_id)
            .ok_or(Error::UnknownNode { node_id: *node_id })?;

        self.edges
            .retain(|edge| edge.source.node_id != *node_id && edge.target.node_id != *node_id);

        Ok(node)
    }

    pub fn by_id(&self, id: &NodeId) -> Option<&Node> {
        assert!(!id.is_nil());
        self.nodes.by_key(id)
    }
    pub fn by_id_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        assert!(!id.is_nil());
        self.nodes.by_key_mut(id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Node> {
        assert!(!name.is_empty());
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Adds the edge `source -> target` after checking both ends against
    /// their module definitions. Connecting an existing edge again is a no-op.
    pub fn connect(
        &mut self,
        registry: &ModuleRegistry,
        source: PortRef,
        target: PortRef,
    ) -> Result<()> {
        self.check_port(registry, &source, PortDirection::Output)?;
        self.check_port(registry, &target, PortDirection::Input)?;

        let edge = Edge { source, target };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }

        Ok(())
    }

    /// Returns whether the edge existed.
    pub fn disconnect(&mut self, source: &PortRef, target: &PortRef) -> bool {
        let before = self.edges.len();
        self.edges
            .retain(|edge| !(edge.source == *source && edge.target == *target));

        self.edges.len() != before
    }

    /// Drops every edge into `target`, returning the removed edges.
    pub fn disconnect_port(&mut self, target: &PortRef) -> Vec<Edge> {
        let (removed, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|edge| edge.target == *target);
        self.edges = kept;

        removed
    }

    // === Port Resolver ===

    /// Sources feeding `(node_id, port)`, in edge declaration order. An
    /// unconnected port yields an empty list.
    pub fn incomers_for(&self, node_id: &NodeId, port: &str) -> Vec<&PortRef> {
        self.edges
            .iter()
            .filter(|edge| edge.target.node_id == *node_id && edge.target.port == port)
            .map(|edge| &edge.source)
            .collect()
    }

    /// Every node that transitively consumes `node_id`'s output, in node
    /// order. The node itself is included only when it sits on a cycle.
    pub fn downstream_closure(&self, node_id: &NodeId) -> Vec<NodeId> {
        assert!(!node_id.is_nil());

        let mut seen = HashSet::new();
        let mut stack = vec![*node_id];

        while let Some(current) = stack.pop() {
            for edge in self.edges.iter() {
                if edge.source.node_id == current && seen.insert(edge.target.node_id) {
                    stack.push(edge.target.node_id);
                }
            }
        }

        self.nodes
            .keys()
            .filter(|id| seen.contains(id))
            .collect()
    }

    fn check_port(
        &self,
        registry: &ModuleRegistry,
        port_ref: &PortRef,
        direction: PortDirection,
    ) -> Result<()> {
        let node = self.by_id(&port_ref.node_id).ok_or(Error::UnknownNode {
            node_id: port_ref.node_id,
        })?;
        let definition = registry.lookup(&node.module_type)?;

        let (expected, opposite) = match direction {
            PortDirection::Input => (
                definition.input(&port_ref.port).is_some(),
                definition.output(&port_ref.port).is_some(),
            ),
            PortDirection::Output => (
                definition.output(&port_ref.port).is_some(),
                definition.input(&port_ref.port).is_some(),
            ),
        };

        match (expected, opposite) {
            (true, _) => Ok(()),
            (false, true) => Err(Error::DirectionMismatch {
                node_id: port_ref.node_id,
                port: port_ref.port.clone(),
                expected: direction,
            }),
            (false, false) => Err(Error::UnknownPort {
                node_id: port_ref.node_id,
                port: port_ref.port.clone(),
                direction,
            }),
        }
    }

    pub fn serialize(&self, format: SerdeFormat) -> common::Result<String> {
        serialize(self, format)
    }
    pub fn deserialize(serialized: &[u8], format: SerdeFormat) -> common::Result<Graph> {
        let graph: Self = deserialize(serialized, format)?;
        graph.validate();
        Ok(graph)
    }

    /// Debug-build consistency check of node ids and edge endpoints.
    pub fn validate(&self) {
        if !is_debug() {
            return;
        }

        for node in self.nodes.iter() {
            assert!(!node.id.is_nil());
            assert!(!node.module_type.is_empty());
        }
        for edge in self.edges.iter() {
            assert!(self.by_id(&edge.source.node_id).is_some());
            assert!(self.by_id(&edge.target.node_id).is_some());
        }
    }

    /// Checks every edge against the registry. Nodes of unknown type are
    /// reported as well.
    pub fn validate_with(&self, registry: &ModuleRegistry) -> Result<()> {
        for node in self.nodes.iter() {
            registry.lookup(&node.module_type)?;
        }
        for edge in self.edges.iter() {
            self.check_port(registry, &edge.source, PortDirection::Output)?;
            self.check_port(registry, &edge.target, PortDirection::Input)?;
        }

        Ok(())
    }
}

impl KeyIndexKey<NodeId> for Node {
    fn key(&self) -> &NodeId {
        &self.id
    }
}

#[cfg(test)]
pub(crate) fn test_graph(registry: &ModuleRegistry) -> anyhow::Result<Graph> {
    // plain text -> caesar(3) -> compare.input_A, plain text -> compare.input_B
    let mut graph = Graph::default();

    let mut plain = Node::from_module(registry.lookup("input")?);
    plain.id = "a0b1c2d3-0000-4000-8000-000000000001".parse()?;
    plain.name = "plain".to_string();
    plain
        .data
        .insert("value".to_string(), serde_json::json!("HELLO"));

    let mut caesar = Node::from_module(registry.lookup("caesar")?);
    caesar.id = "a0b1c2d3-0000-4000-8000-000000000002".parse()?;
    caesar.name = "caesar".to_string();

    let mut compare = Node::from_module(registry.lookup("compare_output")?);
    compare.id = "a0b1c2d3-0000-4000-8000-000000000003".parse()?;
    compare.name = "compare".to_string();

    let (plain_id, caesar_id, compare_id) = (plain.id, caesar.id, compare.id);
    graph.add_node(plain)?;
    graph.add_node(caesar)?;
    graph.add_node(compare)?;

    graph.connect(
        registry,
        PortRef::new(plain_id, "output"),
        PortRef::new(caesar_id, "input"),
    )?;
    graph.connect(
        registry,
        PortRef::new(caesar_id, "output"),
        PortRef::new(compare_id, "input_A"),
    )?;
    graph.connect(
        registry,
        PortRef::new(plain_id, "output"),
        PortRef::new(compare_id, "input_B"),
    )?;

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(graph: &Graph) -> (NodeId, NodeId, NodeId) {
        let plain = graph.by_name("plain").unwrap().id;
        let caesar = graph.by_name("caesar").unwrap().id;
        let compare = graph.by_name("compare").unwrap().id;
        (plain, caesar, compare)
    }

    #[test]
    fn incomers_follow_edge_order() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let graph = test_graph(&registry)?;
        let (plain, caesar, compare) = ids(&graph);

        assert_eq!(
            graph.incomers_for(&compare, "input_A"),
            [&PortRef::new(caesar, "output")]
        );
        assert_eq!(
            graph.incomers_for(&compare, "input_B"),
            [&PortRef::new(plain, "output")]
        );
        assert!(graph.incomers_for(&plain, "input").is_empty());

        Ok(())
    }

    #[test]
    fn downstream_closure_is_transitive_and_ordered() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let graph = test_graph(&registry)?;
        let (plain, caesar, compare) = ids(&graph);

        assert_eq!(graph.downstream_closure(&plain), [caesar, compare]);
        assert_eq!(graph.downstream_closure(&caesar), [compare]);
        assert!(graph.downstream_closure(&compare).is_empty());

        Ok(())
    }

    #[test]
    fn connect_validates_ports() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let mut graph = test_graph(&registry)?;
        let (plain, caesar, compare) = ids(&graph);

        let err = graph
            .connect(
                &registry,
                PortRef::new(plain, "nope"),
                PortRef::new(caesar, "input"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPort {
                direction: PortDirection::Output,
                ..
            }
        ));

        let err = graph
            .connect(
                &registry,
                PortRef::new(caesar, "input"),
                PortRef::new(compare, "input_A"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DirectionMismatch {
                expected: PortDirection::Output,
                ..
            }
        ));

        let err = graph
            .connect(
                &registry,
                PortRef::new(NodeId::unique(), "output"),
                PortRef::new(compare, "input_A"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNode { .. }));

        let edges_before = graph.edges.len();
        graph.connect(
            &registry,
            PortRef::new(plain, "output"),
            PortRef::new(caesar, "input"),
        )?;
        assert_eq!(graph.edges.len(), edges_before);

        Ok(())
    }

    #[test]
    fn unknown_module_type_is_reported() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let mut graph = test_graph(&registry)?;
        graph.add_node(Node {
            id: NodeId::unique(),
            module_type: "vigenere".to_string(),
            name: "vigenere".to_string(),
            data: NodeData::new(),
        })?;

        assert!(matches!(
            graph.validate_with(&registry),
            Err(Error::Registry(registry::Error::UnknownType { .. }))
        ));

        Ok(())
    }

    #[test]
    fn remove_node_drops_incident_edges() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let mut graph = test_graph(&registry)?;
        let (_, caesar, compare) = ids(&graph);

        graph.remove_node(&caesar)?;

        assert!(graph.by_id(&caesar).is_none());
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.incomers_for(&compare, "input_A").is_empty());
        assert!(matches!(
            graph.remove_node(&caesar),
            Err(Error::UnknownNode { .. })
        ));

        Ok(())
    }

    #[test]
    fn disconnect_edges() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let mut graph = test_graph(&registry)?;
        let (plain, caesar, compare) = ids(&graph);

        assert!(graph.disconnect(
            &PortRef::new(caesar, "output"),
            &PortRef::new(compare, "input_A")
        ));
        assert!(!graph.disconnect(
            &PortRef::new(caesar, "output"),
            &PortRef::new(compare, "input_A")
        ));

        let removed = graph.disconnect_port(&PortRef::new(compare, "input_B"));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].source, PortRef::new(plain, "output"));
        assert_eq!(graph.edges.len(), 1);

        Ok(())
    }

    #[test]
    fn roundtrip_serialization() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let graph = test_graph(&registry)?;

        for format in [SerdeFormat::Yaml, SerdeFormat::Json] {
            let serialized = graph.serialize(format)?;
            let deserialized = Graph::deserialize(serialized.as_bytes(), format)?;
            assert_eq!(deserialized, graph);
        }

        Ok(())
    }

    #[test]
    fn loads_yaml_fixture() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;
        let yaml = std::fs::read_to_string("../test_resources/caesar_graph.yml")?;
        let graph = Graph::deserialize(yaml.as_bytes(), SerdeFormat::Yaml)?;

        graph.validate_with(&registry)?;
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);

        Ok(())
    }
}
