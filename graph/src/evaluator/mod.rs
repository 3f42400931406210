use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::data::PortValues;
use crate::graph::{Graph, Node, NodeId, PortRef};
use crate::module::{AuxiliaryPatch, ModuleDefinition, PortMerge, ProcessContext};
use crate::registry::ModuleRegistry;


// === Error Types ===

/// Per-node failure recorded in the node's cache. Never escapes a pass.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    #[error("Unknown module type '{type_name}'")]
    UnknownType { type_name: String },
    #[error("Cycle detected at node {node_id} (depth {depth})")]
    CycleDetected { node_id: NodeId, depth: usize },
    #[error("{type_name}: {message}")]
    Process { type_name: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

// === Node Cache ===

/// What the last pass computed for a node: the inputs it saw and either
/// an output or an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCache {
    pub inputs: PortValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
}

impl NodeCache {
    fn resolved(inputs: PortValues, output: String) -> Self {
        Self {
            inputs,
            output: Some(output),
            error: None,
        }
    }

    fn errored(inputs: PortValues, error: Error) -> Self {
        Self {
            inputs,
            output: None,
            error: Some(error),
        }
    }
}

/// Per-pass state of a node. Nodes missing from the pass map are idle.
///
/// ```text
/// idle -> computing -> resolved | errored
/// ```
#[derive(Debug, Clone)]
enum NodeState {
    /// On the recursion stack. Meeting it again means a live cycle.
    Computing,
    /// Processing succeeded, or the value was seeded from a settled node.
    Resolved(NodeCache),
    Errored(NodeCache),
}

// === Evaluation Context ===

/// Pass-scoped memo. A fresh one is built for every pass so nothing
/// computed in one pass leaks into the next.
#[derive(Debug)]
struct EvalContext<'a> {
    graph: &'a Graph,
    registry: &'a ModuleRegistry,
    max_depth: usize,
    concat_separator: &'a str,

    states: HashMap<NodeId, NodeState>,
    stack: Vec<NodeId>,
    cyclic: HashSet<NodeId>,

    order: Vec<NodeId>,
    auxiliary: Vec<AuxiliaryPatch>,
    invocations: usize,
}

impl<'a> EvalContext<'a> {
    fn seed(&mut self, node_id: NodeId, cache: &NodeCache) {
        let state = match cache.error {
            Some(_) => NodeState::Errored(cache.clone()),
            None => NodeState::Resolved(cache.clone()),
        };
        self.states.insert(node_id, state);
    }

    fn commit(&mut self, node_id: NodeId, state: NodeState) {
        assert!(!matches!(state, NodeState::Computing));
        self.states.insert(node_id, state);
        self.order.push(node_id);
    }

    // === Output Resolver ===

    /// Current output of `node_id` in this pass, evaluating it on first
    /// use. `None` means the node has no usable output: it errored, sits
    /// on a live cycle, or does not exist.
    fn output_of(&mut self, node_id: NodeId) -> Option<String> {
        match self.states.get(&node_id) {
            Some(NodeState::Resolved(cache)) => return cache.output.clone(),
            Some(NodeState::Errored(_)) => return None,
            Some(NodeState::Computing) => {
                self.mark_cycle(node_id);
                return None;
            }
            None => {}
        }

        let graph = self.graph;
        let registry = self.registry;
        let node = graph.by_id(&node_id)?;

        let definition = match registry.lookup(&node.module_type) {
            Ok(definition) => definition,
            Err(_) => {
                let error = Error::UnknownType {
                    type_name: node.module_type.clone(),
                };
                warn!(%node_id, "{error}");
                let cache = NodeCache::errored(PortValues::default(), error);
                self.commit(node_id, NodeState::Errored(cache));
                return None;
            }
        };

        if self.stack.len() >= self.max_depth {
            let error = Error::CycleDetected {
                node_id,
                depth: self.stack.len(),
            };
            warn!(%node_id, max_depth = self.max_depth, "Recursion depth exceeded");
            let cache = NodeCache::errored(PortValues::default(), error);
            self.commit(node_id, NodeState::Errored(cache));
            return None;
        }

        self.states.insert(node_id, NodeState::Computing);
        self.stack.push(node_id);
        let inputs = self.resolve_inputs(node_id, definition);
        let popped = self.stack.pop();
        assert_eq!(popped, Some(node_id));

        if self.cyclic.contains(&node_id) {
            let error = Error::CycleDetected {
                node_id,
                depth: self.stack.len(),
            };
            self.commit(node_id, NodeState::Errored(NodeCache::errored(inputs, error)));
            return None;
        }

        self.invocations += 1;
        let ctx = ProcessContext { graph, node_id };
        match definition.process.invoke(node, &ctx, &inputs) {
            Ok(output) => {
                let value = output.value;
                self.auxiliary.extend(output.auxiliary);
                self.commit(
                    node_id,
                    NodeState::Resolved(NodeCache::resolved(inputs, value.clone())),
                );
                Some(value)
            }
            Err(err) => {
                let error = Error::Process {
                    type_name: definition.type_name.clone(),
                    message: err.to_string(),
                };
                warn!(%node_id, "Node failed: {error}");
                self.commit(node_id, NodeState::Errored(NodeCache::errored(inputs, error)));
                None
            }
        }
    }

    // === Input Resolution ===

    fn resolve_inputs(&mut self, node_id: NodeId, definition: &ModuleDefinition) -> PortValues {
        let graph = self.graph;
        let mut inputs = PortValues::default();

        for port in definition.inputs.iter() {
            let incomers = graph.incomers_for(&node_id, &port.name);

            let value = match port.merge {
                PortMerge::First => match incomers.first() {
                    Some(incomer) => self.incomer_value(incomer),
                    None => None,
                },
                PortMerge::Concat => {
                    let values: Vec<String> = incomers
                        .iter()
                        .filter_map(|incomer| self.incomer_value(incomer))
                        .collect();
                    if values.is_empty() {
                        None
                    } else {
                        Some(values.join(self.concat_separator))
                    }
                }
            };

            inputs.insert(port.name.clone(), value);
        }

        inputs
    }

    fn incomer_value(&mut self, incomer: &PortRef) -> Option<String> {
        let (graph, registry) = (self.graph, self.registry);
        let source = graph.by_id(&incomer.node_id)?;

        if let Ok(definition) = registry.lookup(&source.module_type) {
            if definition.is_snapshot_port(&incomer.port) {
                return settled_snapshot(incomer, definition, source);
            }
        }

        self.output_of(incomer.node_id)
    }

    // === Evaluation Order ===

    /// Sources `node_id` reads through live outputs: the first incomer of a
    /// `First` port, every incomer of a `Concat` port. Snapshot ports are
    /// skipped since reading them never evaluates the source.
    fn live_incomers(&self, node_id: NodeId) -> Vec<NodeId> {
        let (graph, registry) = (self.graph, self.registry);
        let Some(definition) = graph
            .by_id(&node_id)
            .and_then(|node| registry.lookup(&node.module_type).ok())
        else {
            return Vec::new();
        };

        let mut sources = Vec::new();
        for port in definition.inputs.iter() {
            let incomers = graph.incomers_for(&node_id, &port.name);
            let read = match port.merge {
                PortMerge::First => &incomers[..incomers.len().min(1)],
                PortMerge::Concat => &incomers[..],
            };

            for incomer in read {
                let is_live = graph
                    .by_id(&incomer.node_id)
                    .and_then(|source| registry.lookup(&source.module_type).ok())
                    .is_some_and(|source| !source.is_snapshot_port(&incomer.port));
                if is_live {
                    sources.push(incomer.node_id);
                }
            }
        }

        sources
    }

    /// `targets` plus the live upstream they need, sources before their
    /// consumers. Nodes already settled for this pass are not entered.
    /// Walking this order keeps recursion one level deep on acyclic graphs,
    /// so only real cycles reach the depth cap.
    fn upstream_first(&self, targets: &[NodeId]) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<(NodeId, Vec<NodeId>)> = Vec::new();

        for &target in targets {
            if self.states.contains_key(&target) || !visited.insert(target) {
                continue;
            }
            stack.push((target, self.pending_incomers(target)));

            while let Some(top) = stack.last_mut() {
                let current = top.0;
                match top.1.pop() {
                    Some(next) => {
                        if !self.states.contains_key(&next) && visited.insert(next) {
                            stack.push((next, self.pending_incomers(next)));
                        }
                    }
                    None => {
                        stack.pop();
                        order.push(current);
                    }
                }
            }
        }

        order
    }

    // reversed, so popping visits incomers in edge order
    fn pending_incomers(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut incomers = self.live_incomers(node_id);
        incomers.reverse();
        incomers
    }

    fn mark_cycle(&mut self, node_id: NodeId) {
        let start = self
            .stack
            .iter()
            .position(|id| *id == node_id)
            .unwrap_or(0);

        warn!(
            %node_id,
            length = self.stack.len() - start,
            "Cycle detected between live outputs"
        );
        self.cyclic.extend(self.stack[start..].iter().copied());
    }
}

/// Snapshot ports read the source's configuration without evaluating it,
/// so a component can feed a node that later feeds it back.
fn settled_snapshot(
    incomer: &PortRef,
    definition: &ModuleDefinition,
    source: &Node,
) -> Option<String> {
    let snapshot = definition.snapshot.as_ref()?;

    match snapshot(&source.data) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                node_id = %incomer.node_id,
                port = %incomer.port,
                "Snapshot unavailable: {err}"
            );
            None
        }
    }
}

// === Evaluator ===

#[derive(Debug)]
pub struct PassResult {
    /// Nodes computed in this pass, in commit order.
    pub nodes: Vec<(NodeId, NodeCache)>,
    pub auxiliary: Vec<AuxiliaryPatch>,
    pub invocations: usize,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    max_depth: usize,
    concat_separator: String,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Evaluator {
    pub fn new(config: &EngineConfig) -> Self {
        assert!(config.max_depth > 0);

        Self {
            max_depth: config.max_depth,
            concat_separator: config.concat_separator.clone(),
        }
    }

    /// Evaluates every node in the graph.
    pub fn evaluate_all(&self, graph: &Graph, registry: &ModuleRegistry) -> PassResult {
        let targets: Vec<NodeId> = graph.nodes.keys().collect();
        self.run_pass(graph, registry, &targets, &HashMap::new())
    }

    /// Recomputes `targets`. Nodes outside the targets that have a settled
    /// cache are served from it; anything else a target needs is computed
    /// on demand and reported alongside the targets.
    pub fn run_pass(
        &self,
        graph: &Graph,
        registry: &ModuleRegistry,
        targets: &[NodeId],
        settled: &HashMap<NodeId, NodeCache>,
    ) -> PassResult {
        let start = Instant::now();

        let mut ctx = EvalContext {
            graph,
            registry,
            max_depth: self.max_depth,
            concat_separator: &self.concat_separator,
            states: HashMap::with_capacity(graph.nodes.len()),
            stack: Vec::new(),
            cyclic: HashSet::new(),
            order: Vec::new(),
            auxiliary: Vec::new(),
            invocations: 0,
        };

        let target_set: HashSet<NodeId> = targets.iter().copied().collect();
        for (node_id, cache) in settled.iter() {
            if !target_set.contains(node_id) && graph.by_id(node_id).is_some() {
                ctx.seed(*node_id, cache);
            }
        }

        let targets_in_order: Vec<NodeId> = graph
            .nodes
            .keys()
            .filter(|node_id| target_set.contains(node_id))
            .collect();
        for node_id in ctx.upstream_first(&targets_in_order) {
            ctx.output_of(node_id);
        }
        assert!(ctx.stack.is_empty());

        let EvalContext {
            mut states,
            order,
            auxiliary,
            invocations,
            ..
        } = ctx;

        let nodes: Vec<(NodeId, NodeCache)> = order
            .into_iter()
            .filter_map(|node_id| match states.remove(&node_id) {
                Some(NodeState::Resolved(cache)) | Some(NodeState::Errored(cache)) => {
                    Some((node_id, cache))
                }
                Some(NodeState::Computing) | None => None,
            })
            .collect();

        let elapsed_secs = start.elapsed().as_secs_f64();
        debug!(
            targets = targets.len(),
            evaluated = nodes.len(),
            invocations,
            elapsed_secs,
            "Pass finished"
        );

        PassResult {
            nodes,
            auxiliary,
            invocations,
            elapsed_secs,
        }
    }
}
