//! The engine — owns the host tree and every piece of component state.
//!
//! DESIGN
//! ======
//! `Engine` is single-threaded and `!Send`: hooks are `Rc` closures that take
//! `&mut Engine`. Its operations are split across modules by concern, each
//! adding an `impl Engine` block:
//!
//! - [`crate::lifecycle`] — instantiate, setup, finalize, unload, containers
//! - [`crate::channels`] — default/restored channel wiring, rebinding
//! - [`crate::bus`] — emit and delivery
//! - [`crate::attributes`] — editable attributes and mutation processing
//! - [`crate::definition`] — definition documents and native constructors
//! - [`crate::log`] — the log sink

use std::collections::HashMap;

use tree::{HostTree, NodeId};

use crate::bus::MessageBus;
use crate::config::EngineConfig;
use crate::definition::ConstructorTable;
use crate::instance::Instance;
use crate::lifecycle::PendingFinalize;
use crate::log::{LogSink, tracing_sink};
use crate::message::Channel;
use crate::observers::{Hook, Observers};
use crate::registry::{ComponentDefinition, ComponentRegistry};

pub struct Engine {
    pub(crate) tree: HostTree,
    pub(crate) registry: ComponentRegistry,
    pub(crate) constructors: ConstructorTable,
    pub(crate) instances: HashMap<NodeId, Instance>,
    pub(crate) bus: MessageBus,
    pub(crate) observers: Observers,
    pub(crate) sink: LogSink,
    pub(crate) default_channels: Vec<Channel>,
    pub(crate) pending: HashMap<u64, PendingFinalize>,
    pub(crate) next_serial: u64,
    /// Emits currently on the stack; listeners that emit nest.
    pub(crate) emit_depth: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Engine over an empty document.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_tree(HostTree::new(), config)
    }

    /// Engine over an existing document.
    #[must_use]
    pub fn with_tree(tree: HostTree, config: EngineConfig) -> Self {
        Self {
            tree,
            registry: ComponentRegistry::new(),
            constructors: ConstructorTable::default(),
            instances: HashMap::new(),
            bus: MessageBus::default(),
            observers: Observers::default(),
            sink: tracing_sink(),
            default_channels: config.default_channels,
            pending: HashMap::new(),
            next_serial: 1,
            emit_depth: 0,
        }
    }

    // --- Accessors ---

    pub fn tree(&self) -> &HostTree {
        &self.tree
    }

    /// Mutable tree access for tooling. Attribute writes to observed editable
    /// attributes are picked up by [`Engine::process_mutations`].
    pub fn tree_mut(&mut self) -> &mut HostTree {
        &mut self.tree
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn instance(&self, node: NodeId) -> Option<&Instance> {
        self.instances.get(&node)
    }

    /// Live instance nodes in creation order.
    pub fn instances(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.instances.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    pub fn default_channels(&self) -> &[Channel] {
        &self.default_channels
    }

    /// Replace the default channel sequence used by later conversions.
    pub fn set_default_channels(&mut self, channels: Vec<Channel>) {
        self.default_channels = channels;
    }

    /// Current `id` attribute of a node.
    pub fn identifier(&self, node: NodeId) -> Option<&str> {
        self.tree.attribute(node, "id")
    }

    /// Attached instance carrying this identifier.
    pub fn find_instance(&self, id: &str) -> Option<NodeId> {
        self.tree
            .element_by_id(id)
            .filter(|node| self.instances.contains_key(node))
    }

    pub(crate) fn display_name(&self, node: NodeId) -> String {
        self.identifier(node).map_or_else(|| node.to_string(), str::to_owned)
    }

    // --- Registration ---

    /// Register (or replace) a component definition.
    pub fn register_component(&mut self, definition: ComponentDefinition) {
        let name = definition.name().to_owned();
        if self.registry.register(definition).is_some() {
            tracing::debug!(component = %name, "component definition replaced");
        } else {
            tracing::debug!(component = %name, "component registered");
        }
    }

    /// Attach a global observer. Observers are never removed.
    pub fn register_hook(&mut self, hook: Hook) {
        self.observers.register(hook);
    }
}
