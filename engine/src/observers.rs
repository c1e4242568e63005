//! Global observer hooks for editors and other tooling.
//!
//! Observers are append-only and run in registration order. They see the
//! engine's effects but get no `&mut Engine`, so they cannot reenter it.

use tree::NodeId;

use crate::behavior::Behavior;
use crate::instance::AttributeMetadata;
use crate::registry::ComponentRegistry;

pub type ConstructorObserver = Box<dyn Fn(NodeId, &Behavior, &AttributeMetadata)>;
pub type LoadObserver = Box<dyn Fn(&ComponentRegistry)>;
pub type ChangeObserver = Box<dyn Fn()>;
pub type RemovalObserver = Box<dyn Fn(NodeId)>;

/// A hook point and the observer to attach to it.
pub enum Hook {
    /// An instance finished `setup`.
    Constructor(ConstructorObserver),
    /// A batch of definition documents finished processing.
    Load(LoadObserver),
    /// An instance's observable state changed.
    Change(ChangeObserver),
    /// An instance was unloaded.
    ElementRemoved(RemovalObserver),
}

impl Hook {
    pub fn constructor(f: impl Fn(NodeId, &Behavior, &AttributeMetadata) + 'static) -> Self {
        Self::Constructor(Box::new(f))
    }

    pub fn load(f: impl Fn(&ComponentRegistry) + 'static) -> Self {
        Self::Load(Box::new(f))
    }

    pub fn change(f: impl Fn() + 'static) -> Self {
        Self::Change(Box::new(f))
    }

    pub fn element_removed(f: impl Fn(NodeId) + 'static) -> Self {
        Self::ElementRemoved(Box::new(f))
    }
}

#[derive(Default)]
pub(crate) struct Observers {
    constructor: Vec<ConstructorObserver>,
    load: Vec<LoadObserver>,
    change: Vec<ChangeObserver>,
    element_removed: Vec<RemovalObserver>,
}

impl Observers {
    pub(crate) fn register(&mut self, hook: Hook) {
        match hook {
            Hook::Constructor(f) => self.constructor.push(f),
            Hook::Load(f) => self.load.push(f),
            Hook::Change(f) => self.change.push(f),
            Hook::ElementRemoved(f) => self.element_removed.push(f),
        }
    }

    pub(crate) fn constructed(&self, node: NodeId, behavior: &Behavior, attributes: &AttributeMetadata) {
        for f in &self.constructor {
            f(node, behavior, attributes);
        }
    }

    pub(crate) fn loaded(&self, registry: &ComponentRegistry) {
        for f in &self.load {
            f(registry);
        }
    }

    pub(crate) fn changed(&self) {
        for f in &self.change {
            f();
        }
    }

    pub(crate) fn removed(&self, node: NodeId) {
        for f in &self.element_removed {
            f(node);
        }
    }
}
