pub mod config;
pub mod data;
pub mod envelope;
pub mod evaluator;
pub mod graph;
pub mod module;
pub mod modules;
pub mod pass_report;
pub mod playback;
pub mod registry;
pub mod store;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::data::{record, NodeData, NodeDataExt, PortValues};
    pub use crate::evaluator::{Evaluator, NodeCache};
    pub use crate::graph::{Edge, Graph, Node, NodeId, PortRef};
    pub use crate::module::{
        InputPort, ModuleDefinition, OutputPort, PortMerge, PortSource, ProcessContext,
        ProcessLambda, ProcessOutput,
    };
    pub use crate::modules::BuiltinModule;
    pub use crate::pass_report::{NodeError, PassReport};
    pub use crate::playback::Playback;
    pub use crate::registry::ModuleRegistry;
    pub use crate::store::{NodeStateStore, NodeView, SharedStore, SubscriptionId};
}
