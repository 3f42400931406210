use std::path::Path;

use anyhow::Context;
use cipher_graph::config::EngineConfig;
use cipher_graph::graph::Graph;
use cipher_graph::registry::{self, ModuleRegistry};
use cipher_graph::store::NodeStateStore;
use common::log_setup::setup_logging;
use common::SerdeFormat;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(graph_path) = args.next() else {
        anyhow::bail!("usage: cipher_graph <graph.yml|graph.json> [config.yml]");
    };
    let config = match args.next() {
        Some(config_path) => EngineConfig::load(Path::new(&config_path))
            .with_context(|| format!("loading config {config_path}"))?,
        None => EngineConfig::default(),
    };

    setup_logging(&config.log_level, config.log_dir.as_deref())?;

    let registry = registry::init_global(ModuleRegistry::with_builtins()?)?;

    let format = SerdeFormat::from_file_name(&graph_path)?;
    let serialized =
        std::fs::read(&graph_path).with_context(|| format!("reading graph {graph_path}"))?;
    let graph = Graph::deserialize(&serialized, format)?;
    graph.validate_with(&registry)?;
    info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "Graph loaded");

    let mut store = NodeStateStore::with_graph(registry, graph, &config);
    let report = store.evaluate_all();

    for node in store.graph().nodes.iter() {
        let Some(view) = store.get(&node.id) else {
            continue;
        };
        let label = if node.name.is_empty() {
            node.id.to_string()
        } else {
            node.name.clone()
        };

        match (view.output(), view.error()) {
            (_, Some(error)) => println!("{label} [{}]: error: {error}", node.module_type),
            (Some(output), None) => println!("{label} [{}]: {output:?}", node.module_type),
            (None, None) => println!("{label} [{}]: <not evaluated>", node.module_type),
        }
        if let Some(auxiliary) = view.auxiliary {
            println!("  {}", serde_json::to_string(auxiliary)?);
        }
    }

    info!(
        pass_no = report.pass_no,
        evaluated = report.evaluated.len(),
        errors = report.errors.len(),
        elapsed_secs = report.elapsed_secs,
        "Evaluation finished"
    );

    Ok(())
}
