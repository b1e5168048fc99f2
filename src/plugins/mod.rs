// src/plugins/mod.rs

//! Plugins extend the directive vocabulary with custom, self-contained keys
//! and generation-time side effects.
//!
//! Plugin loading is an explicit registry mapping a stable identifier (the
//! value of a `plugin:` directive) to a constructor. The plugin set is closed
//! and statically linked; an unknown identifier is a parse error at the
//! `plugin` key.

pub mod file2c;

use crate::core::option_tree::{MarkedScalarNode, Node, OptionTree};
use crate::core::parser::ParseError;
use crate::core::project::GenerateError;
use crate::core::resolver::RunContext;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A directive-vocabulary extension. One instance exists per plugin id per
/// project; instances are stateless with respect to the directive tree.
pub trait Plugin: Send + Sync {
    /// Offers an unrecognized mapping key to this plugin. Returns the custom
    /// directive that handles it, or `None` when the key is not this
    /// plugin's.
    fn process_directive(
        &self,
        base_path: &Path,
        key: &str,
        key_node: &MarkedScalarNode,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Option<Box<dyn CustomDirective>>, ParseError>;
}

/// A plugin-supplied directive whose resolution-time effect is "run and write
/// files". Implementations are responsible for their own change detection
/// through the database and for writing through the output writer.
pub trait CustomDirective: fmt::Debug + Send + Sync {
    fn run(&self, run: &RunContext<'_>) -> Result<(), GenerateError>;
}

type PluginFactory = fn() -> Arc<dyn Plugin>;

/// The statically linked plugin registry.
pub struct PluginRegistry {
    factories: Vec<(&'static str, PluginFactory)>,
}

impl PluginRegistry {
    /// The registry with every plugin this build ships with.
    pub fn builtin() -> Self {
        Self {
            factories: vec![("file2c", || Arc::new(file2c::File2CPlugin))],
        }
    }

    /// A registry with no plugins, for callers that want parsing to reject
    /// every `plugin:` directive.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    pub fn create(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.factories
            .iter()
            .find(|(factory_id, _)| *factory_id == id)
            .map(|(_, factory)| factory())
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
