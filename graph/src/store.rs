use std::sync::Arc;
use std::time::Duration;

use common::id_type;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::data::{merge, NodeData};
use crate::evaluator::{Evaluator, NodeCache};
use crate::graph::{Edge, Error, Graph, Node, NodeId, PortRef, Result};
use crate::pass_report::{NodeError, PassReport};
use crate::registry::ModuleRegistry;

id_type!(SubscriptionId);

pub type SharedStore = Arc<Mutex<NodeStateStore>>;

/// Committed state of one node as seen by subscribers.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub node: &'a Node,
    pub cache: Option<&'a NodeCache>,
    /// Display state stashed by processing functions, kept apart from
    /// the node's configuration.
    pub auxiliary: Option<&'a NodeData>,
}

impl<'a> NodeView<'a> {
    pub fn output(&self) -> Option<&'a str> {
        self.cache.and_then(|cache| cache.output.as_deref())
    }

    pub fn error(&self) -> Option<&'a crate::evaluator::Error> {
        self.cache.and_then(|cache| cache.error.as_ref())
    }
}

pub type Subscriber = Box<dyn FnMut(&NodeView<'_>) + Send>;

struct Subscription {
    id: SubscriptionId,
    node_id: NodeId,
    callback: Subscriber,
}

/// Owns the graph together with each node's last committed cache. Every
/// mutation runs a complete pass before returning.
pub struct NodeStateStore {
    registry: Arc<ModuleRegistry>,
    evaluator: Evaluator,
    playback_interval: Duration,
    graph: Graph,

    caches: HashMap<NodeId, NodeCache>,
    auxiliary: HashMap<NodeId, NodeData>,
    subscriptions: Vec<Subscription>,
    pass_no: u64,
}

impl std::fmt::Debug for NodeStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateStore")
            .field("graph", &self.graph)
            .field("caches", &self.caches)
            .field("auxiliary", &self.auxiliary)
            .field("subscriptions", &self.subscriptions.len())
            .field("pass_no", &self.pass_no)
            .finish()
    }
}

impl NodeStateStore {
    pub fn new(registry: Arc<ModuleRegistry>, config: &EngineConfig) -> Self {
        Self::with_graph(registry, Graph::default(), config)
    }

    /// Wraps an existing graph. Nothing is evaluated until the first
    /// mutation or [`NodeStateStore::evaluate_all`].
    pub fn with_graph(registry: Arc<ModuleRegistry>, graph: Graph, config: &EngineConfig) -> Self {
        Self {
            registry,
            evaluator: Evaluator::new(config),
            playback_interval: config.playback_interval(),
            graph,
            caches: HashMap::new(),
            auxiliary: HashMap::new(),
            subscriptions: Vec::new(),
            pass_no: 0,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Tick period used by [`crate::playback::Playback`].
    pub fn playback_interval(&self) -> Duration {
        self.playback_interval
    }

    pub fn pass_no(&self) -> u64 {
        self.pass_no
    }

    pub fn get(&self, node_id: &NodeId) -> Option<NodeView<'_>> {
        let node = self.graph.by_id(node_id)?;

        Some(NodeView {
            node,
            cache: self.caches.get(node_id),
            auxiliary: self.auxiliary.get(node_id),
        })
    }

    /// Merges `patch` into the node's configuration and re-evaluates the
    /// node with everything downstream of it.
    pub fn set(&mut self, node_id: &NodeId, patch: NodeData) -> Result<PassReport> {
        let node = self
            .graph
            .by_id_mut(node_id)
            .ok_or(Error::UnknownNode { node_id: *node_id })?;
        merge(&mut node.data, patch);

        trace!(%node_id, "Configuration updated");
        Ok(self.run_pass(self.dirty_from(node_id)))
    }

    pub fn add_node(&mut self, node: Node) -> Result<PassReport> {
        let node_id = node.id;
        self.graph.add_node(node)?;

        Ok(self.run_pass(vec![node_id]))
    }

    /// Removes the node with its cache, auxiliary state, edges and
    /// subscriptions, then re-evaluates former consumers.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Result<PassReport> {
        if self.graph.by_id(node_id).is_none() {
            return Err(Error::UnknownNode { node_id: *node_id });
        }

        let mut dirty = self.graph.downstream_closure(node_id);
        dirty.retain(|id| id != node_id);

        self.graph.remove_node(node_id)?;
        self.caches.remove(node_id);
        self.auxiliary.remove(node_id);
        self.subscriptions.retain(|sub| sub.node_id != *node_id);

        Ok(self.run_pass(dirty))
    }

    pub fn connect(&mut self, source: PortRef, target: PortRef) -> Result<PassReport> {
        let target_id = target.node_id;
        self.graph.connect(&self.registry, source, target)?;

        Ok(self.run_pass(self.dirty_from(&target_id)))
    }

    pub fn disconnect(&mut self, source: &PortRef, target: &PortRef) -> Result<PassReport> {
        self.ensure_node(&target.node_id)?;
        if !self.graph.disconnect(source, target) {
            trace!(target = %target.node_id, port = %target.port, "No such edge");
        }

        Ok(self.run_pass(self.dirty_from(&target.node_id)))
    }

    pub fn disconnect_port(&mut self, target: &PortRef) -> Result<(Vec<Edge>, PassReport)> {
        self.ensure_node(&target.node_id)?;
        let removed = self.graph.disconnect_port(target);

        let report = self.run_pass(self.dirty_from(&target.node_id));
        Ok((removed, report))
    }

    pub fn evaluate_all(&mut self) -> PassReport {
        let targets = self.graph.nodes.keys().collect();
        self.run_pass(targets)
    }

    /// Applies one playback step of the node's module. Returns `None` when
    /// the module has no tick behavior or declined to change anything.
    pub fn tick(&mut self, node_id: &NodeId) -> Result<Option<PassReport>> {
        let node = self
            .graph
            .by_id(node_id)
            .ok_or(Error::UnknownNode { node_id: *node_id })?;
        let definition = self.registry.lookup(&node.module_type)?;

        let Some(on_tick) = definition.on_tick.as_ref() else {
            return Ok(None);
        };
        let patch = on_tick(&node.data);
        match patch {
            Some(patch) => self.set(node_id, patch).map(Some),
            None => Ok(None),
        }
    }

    pub fn subscribe(&mut self, node_id: &NodeId, callback: Subscriber) -> SubscriptionId {
        let id = SubscriptionId::unique();
        self.subscriptions.push(Subscription {
            id,
            node_id: *node_id,
            callback,
        });

        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&mut self, id: &SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != *id);

        self.subscriptions.len() != before
    }

    fn ensure_node(&self, node_id: &NodeId) -> Result<()> {
        match self.graph.by_id(node_id) {
            Some(_) => Ok(()),
            None => Err(Error::UnknownNode { node_id: *node_id }),
        }
    }

    fn dirty_from(&self, node_id: &NodeId) -> Vec<NodeId> {
        let mut dirty = vec![*node_id];
        dirty.extend(
            self.graph
                .downstream_closure(node_id)
                .into_iter()
                .filter(|id| id != node_id),
        );

        dirty
    }

    fn run_pass(&mut self, targets: Vec<NodeId>) -> PassReport {
        let result = self
            .evaluator
            .run_pass(&self.graph, &self.registry, &targets, &self.caches);
        self.pass_no += 1;

        let mut report = PassReport {
            pass_no: self.pass_no,
            elapsed_secs: result.elapsed_secs,
            evaluated: Vec::with_capacity(result.nodes.len()),
            errors: Vec::new(),
            invocations: result.invocations,
        };

        for (node_id, cache) in result.nodes {
            if let Some(error) = cache.error.as_ref() {
                report.errors.push(NodeError {
                    node_id,
                    error: error.clone(),
                });
                // display state of a failed node would describe an older pass
                self.auxiliary.remove(&node_id);
            }
            report.evaluated.push(node_id);
            self.caches.insert(node_id, cache);
        }

        let mut touched = report.evaluated.clone();
        for patch in result.auxiliary {
            if self.graph.by_id(&patch.node_id).is_none() {
                warn!(node_id = %patch.node_id, "Auxiliary patch for unknown node dropped");
                continue;
            }
            merge(self.auxiliary.entry(patch.node_id).or_default(), patch.patch);
            if !touched.contains(&patch.node_id) {
                touched.push(patch.node_id);
            }
        }

        self.notify(&touched);

        debug!(
            pass_no = report.pass_no,
            evaluated = report.evaluated.len(),
            errors = report.errors.len(),
            "Pass committed"
        );

        report
    }

    fn notify(&mut self, node_ids: &[NodeId]) {
        let Self {
            graph,
            caches,
            auxiliary,
            subscriptions,
            ..
        } = self;

        for node_id in node_ids {
            let Some(node) = graph.by_id(node_id) else {
                continue;
            };
            let view = NodeView {
                node,
                cache: caches.get(node_id),
                auxiliary: auxiliary.get(node_id),
            };

            subscriptions
                .iter_mut()
                .filter(|sub| sub.node_id == *node_id)
                .for_each(|sub| (sub.callback)(&view));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::data::record;
    use crate::graph::test_graph;

    fn test_store() -> anyhow::Result<NodeStateStore> {
        let registry = Arc::new(ModuleRegistry::with_builtins()?);
        let graph = test_graph(&registry)?;
        Ok(NodeStateStore::with_graph(
            registry,
            graph,
            &EngineConfig::default(),
        ))
    }

    fn id_of(store: &NodeStateStore, name: &str) -> NodeId {
        store.graph().by_name(name).unwrap().id
    }

    #[test]
    fn evaluate_all_commits_every_node() -> anyhow::Result<()> {
        let mut store = test_store()?;
        let report = store.evaluate_all();

        assert_eq!(report.pass_no, 1);
        assert_eq!(report.evaluated.len(), 3);
        assert!(!report.has_errors());

        let caesar = id_of(&store, "caesar");
        let view = store.get(&caesar).unwrap();
        assert_eq!(view.output(), Some("KHOOR"));
        assert_eq!(view.cache.unwrap().inputs.get("input"), Some("HELLO"));

        Ok(())
    }

    #[test]
    fn set_reevaluates_downstream_closure_only() -> anyhow::Result<()> {
        let mut store = test_store()?;
        store.evaluate_all();

        let caesar = id_of(&store, "caesar");
        let compare = id_of(&store, "compare");
        let report = store.set(&caesar, record(json!({ "shift": 1 })))?;

        assert_eq!(report.evaluated, [caesar, compare]);
        assert_eq!(store.get(&caesar).unwrap().output(), Some("IFMMP"));

        let compare_view = store.get(&compare).unwrap();
        assert_eq!(compare_view.cache.unwrap().inputs.get("input_A"), Some("IFMMP"));
        assert_eq!(compare_view.cache.unwrap().inputs.get("input_B"), Some("HELLO"));

        Ok(())
    }

    #[test]
    fn auxiliary_state_is_kept_apart_from_configuration() -> anyhow::Result<()> {
        let mut store = test_store()?;
        store.evaluate_all();

        let compare = id_of(&store, "compare");
        let view = store.get(&compare).unwrap();
        let rows = &view.auxiliary.unwrap()["rows"];

        assert_eq!(rows[0]["a"], "KHOOR");
        assert_eq!(rows[0]["b"], "HELLO");
        assert!(!view.node.data.contains_key("rows"));

        Ok(())
    }

    #[test]
    fn subscribers_receive_committed_updates() -> anyhow::Result<()> {
        let mut store = test_store()?;
        let caesar = id_of(&store, "caesar");

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let subscription = {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            store.subscribe(
                &caesar,
                Box::new(move |view: &NodeView<'_>| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    seen.lock().push(view.output().unwrap_or_default().to_string());
                }),
            )
        };

        store.evaluate_all();
        store.set(&caesar, record(json!({ "shift": 0 })))?;
        assert_eq!(*seen.lock(), ["KHOOR", "HELLO"]);

        assert!(store.unsubscribe(&subscription));
        assert!(!store.unsubscribe(&subscription));
        store.set(&caesar, record(json!({ "shift": 2 })))?;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        Ok(())
    }

    #[test]
    fn remove_node_reevaluates_former_consumers() -> anyhow::Result<()> {
        let mut store = test_store()?;
        store.evaluate_all();

        let caesar = id_of(&store, "caesar");
        let compare = id_of(&store, "compare");
        let report = store.remove_node(&caesar)?;

        assert_eq!(report.evaluated, [compare]);
        assert!(store.get(&caesar).is_none());
        let inputs = &store.get(&compare).unwrap().cache.unwrap().inputs;
        assert_eq!(inputs.get("input_A"), None);
        assert_eq!(inputs.get("input_B"), Some("HELLO"));

        assert!(matches!(
            store.remove_node(&caesar),
            Err(Error::UnknownNode { .. })
        ));

        Ok(())
    }

    #[test]
    fn remove_node_drops_subscriptions_and_auxiliary_state() -> anyhow::Result<()> {
        let mut store = test_store()?;
        let plain = id_of(&store, "plain");
        let compare = id_of(&store, "compare");

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            store.subscribe(
                &compare,
                Box::new(move |_view: &NodeView<'_>| {
                    calls.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        store.evaluate_all();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.get(&compare).unwrap().auxiliary.is_some());

        store.remove_node(&compare)?;
        assert!(store.get(&compare).is_none());
        assert!(!store.auxiliary.contains_key(&compare));
        assert!(!store.caches.contains_key(&compare));
        assert!(store.subscriptions.is_empty());

        store.set(&plain, record(json!({ "value": "WORLD" })))?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[test]
    fn connect_and_disconnect_trigger_passes() -> anyhow::Result<()> {
        let mut store = test_store()?;
        store.evaluate_all();

        let plain = id_of(&store, "plain");
        let caesar = id_of(&store, "caesar");
        let compare = id_of(&store, "compare");

        store.disconnect(
            &PortRef::new(plain, "output"),
            &PortRef::new(caesar, "input"),
        )?;
        assert_eq!(store.get(&caesar).unwrap().output(), Some(""));

        let report = store.connect(
            PortRef::new(plain, "output"),
            PortRef::new(caesar, "input"),
        )?;
        assert_eq!(report.evaluated, [caesar, compare]);
        assert_eq!(store.get(&caesar).unwrap().output(), Some("KHOOR"));

        let (removed, _) = store.disconnect_port(&PortRef::new(compare, "input_B"))?;
        assert_eq!(removed.len(), 1);

        Ok(())
    }

    #[test]
    fn unknown_node_edits_fail() -> anyhow::Result<()> {
        let mut store = test_store()?;
        let missing = NodeId::unique();

        assert!(matches!(
            store.set(&missing, NodeData::new()),
            Err(Error::UnknownNode { .. })
        ));
        assert!(store.tick(&missing).is_err());
        assert_eq!(store.pass_no(), 0);

        Ok(())
    }

    #[test]
    fn tick_advances_input_playback() -> anyhow::Result<()> {
        let mut store = test_store()?;
        let plain = id_of(&store, "plain");
        let caesar = id_of(&store, "caesar");

        store.set(&plain, record(json!({ "is_playing": true })))?;
        assert_eq!(store.get(&plain).unwrap().output(), Some(""));

        let report = store.tick(&plain)?.expect("input nodes tick");
        assert!(report.evaluated.contains(&caesar));
        assert_eq!(store.get(&plain).unwrap().output(), Some("H"));
        assert_eq!(store.get(&caesar).unwrap().output(), Some("K"));

        assert!(store.tick(&caesar)?.is_none());

        Ok(())
    }
}
