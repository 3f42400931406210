use std::sync::{Arc, OnceLock};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::module::ModuleDefinition;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    #[error("Module type '{type_name}' is already registered")]
    DuplicateType { type_name: String },
    #[error("Unknown module type '{type_name}'")]
    UnknownType { type_name: String },
    #[error("Invalid definition for module type '{type_name}': {reason}")]
    InvalidDefinition { type_name: String, reason: String },
    #[error("Global module registry is already initialized")]
    GlobalAlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;

static GLOBAL_REGISTRY: OnceLock<Arc<ModuleRegistry>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<ModuleDefinition>>,
}

impl ModuleRegistry {
    /// Registry populated with every built-in module.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::default();
        crate::modules::register_builtins(&mut registry)?;
        debug!(count = registry.len(), "Registered built-in modules");
        Ok(registry)
    }

    pub fn register(&mut self, definition: ModuleDefinition) -> Result<()> {
        if let Some(reason) = definition.check() {
            return Err(Error::InvalidDefinition {
                type_name: definition.type_name,
                reason,
            });
        }

        match self.modules.entry(definition.type_name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateType {
                type_name: definition.type_name,
            }),
            Entry::Vacant(entry) => {
                trace!(type_name = %definition.type_name, "Registered module");
                entry.insert(Arc::new(definition));
                Ok(())
            }
        }
    }

    pub fn lookup(&self, type_name: &str) -> Result<&Arc<ModuleDefinition>> {
        self.modules
            .get(type_name)
            .ok_or_else(|| Error::UnknownType {
                type_name: type_name.to_string(),
            })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.modules.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Installs the process-wide registry. Must happen once, during startup.
pub fn init_global(registry: ModuleRegistry) -> Result<Arc<ModuleRegistry>> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(Arc::clone(&registry))
        .map_err(|_| Error::GlobalAlreadyInitialized)?;

    debug!(count = registry.len(), "Global module registry initialized");
    Ok(registry)
}

pub fn global() -> Option<Arc<ModuleRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{InputPort, OutputPort, ProcessLambda, ProcessOutput};

    fn upper() -> ModuleDefinition {
        ModuleDefinition {
            type_name: "upper".to_string(),
            name: "Upper".to_string(),
            inputs: vec![InputPort::new("input")],
            outputs: vec![OutputPort::new("output")],
            process: ProcessLambda::new(|_node, _ctx, inputs| {
                Ok(ProcessOutput::new(inputs.text("input").to_uppercase()))
            }),
            ..Default::default()
        }
    }

    #[test]
    fn register_and_lookup() -> anyhow::Result<()> {
        let mut registry = ModuleRegistry::default();
        registry.register(upper())?;

        let definition = registry.lookup("upper")?;
        assert_eq!(definition.name, "Upper");
        assert!(registry.contains("upper"));
        assert_eq!(registry.type_names(), ["upper"]);

        Ok(())
    }

    #[test]
    fn duplicate_type_is_rejected() -> anyhow::Result<()> {
        let mut registry = ModuleRegistry::default();
        registry.register(upper())?;

        let err = registry.register(upper()).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateType {
                type_name: "upper".to_string()
            }
        );
        assert_eq!(registry.len(), 1);

        Ok(())
    }

    #[test]
    fn unknown_type_lookup_fails() {
        let registry = ModuleRegistry::default();
        assert!(matches!(
            registry.lookup("missing"),
            Err(Error::UnknownType { type_name }) if type_name == "missing"
        ));
    }

    #[test]
    fn invalid_definition_is_rejected() {
        let mut registry = ModuleRegistry::default();
        let mut definition = upper();
        definition.process = ProcessLambda::None;

        assert!(matches!(
            registry.register(definition),
            Err(Error::InvalidDefinition { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn builtins_register_cleanly() -> anyhow::Result<()> {
        let registry = ModuleRegistry::with_builtins()?;

        assert_eq!(
            registry.type_names(),
            [
                "caesar",
                "compare_output",
                "enigma_plug_board",
                "enigma_scrambler",
                "enigma_scrambler_interface",
                "input",
                "rail_fence_cipher",
                "word_counter",
            ]
        );

        Ok(())
    }

    #[test]
    fn global_registry_installs_once() -> anyhow::Result<()> {
        let installed = init_global(ModuleRegistry::with_builtins()?)?;
        let fetched = global().expect("global registry installed");
        assert!(Arc::ptr_eq(&installed, &fetched));

        assert_eq!(
            init_global(ModuleRegistry::default()).unwrap_err(),
            Error::GlobalAlreadyInitialized
        );

        Ok(())
    }
}
