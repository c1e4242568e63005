//! Instance lifecycle — conversion, setup, finalize, unload.
//!
//! DESIGN
//! ======
//! Converting a declaration runs in a fixed order: snapshot the declaration,
//! make sure it has a unique identifier, apply the template, hand the
//! constructor a one-shot [`Finalize`] token. Finalizing wires broadcasts,
//! then subscriptions, then runs the init hook and the completion handler.
//!
//! A constructor may finalize synchronously, keep the token and finalize
//! later, or ignore it. If it returns without finalizing but has called
//! [`Engine::setup`], the engine finalizes on its behalf. Either way the
//! wiring happens exactly once per conversion: the pending entry keyed by
//! the token's serial is removed on completion, and a second attempt fails
//! with [`EngineError::FinalizeAlreadyCompleted`].
//!
//! ERROR HANDLING
//! ==============
//! An unknown tag fails the conversion before anything is touched. A
//! constructor error drops the pending token and its snapshot and is returned
//! to the caller; the partially converted node stays in the tree.

use std::fmt;
use std::rc::Rc;

use tree::{NodeId, Selector, TreeError};

use crate::behavior::{Behavior, InitContext};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::instance::Instance;

/// Runs after an instance is fully wired and initialized.
pub type CompletionHandler = Rc<dyn Fn(&mut Engine, NodeId)>;

/// One-shot permission to finish wiring an instance.
///
/// Handed to the constructor; not `Clone`. Pass it to [`Engine::finalize`]
/// once the instance has been set up.
#[derive(Debug)]
pub struct Finalize {
    instance: NodeId,
    serial: u64,
}

impl Finalize {
    /// The node being converted.
    pub fn instance(&self) -> NodeId {
        self.instance
    }
}

/// How a conversion picks channels and who hears about completion.
#[derive(Clone, Default)]
pub struct ConvertOptions {
    /// Take channels from the default sequence instead of the declaration.
    pub use_defaults: bool,
    pub app_id: Option<String>,
    pub on_complete: Option<CompletionHandler>,
}

impl ConvertOptions {
    /// Fresh instance: channels come from the default sequence.
    #[must_use]
    pub fn defaults() -> Self {
        Self { use_defaults: true, ..Self::default() }
    }

    /// Existing declaration: channels come from its `<broadcast>`/`<listen>` children.
    #[must_use]
    pub fn restore() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn app_id(mut self, app_id: &str) -> Self {
        self.app_id = Some(app_id.to_owned());
        self
    }

    #[must_use]
    pub fn on_complete(mut self, handler: impl Fn(&mut Engine, NodeId) + 'static) -> Self {
        self.on_complete = Some(Rc::new(handler));
        self
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("use_defaults", &self.use_defaults)
            .field("app_id", &self.app_id)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

pub(crate) struct PendingFinalize {
    instance: NodeId,
    /// Detached copy of the declaration taken before conversion.
    snapshot: NodeId,
    use_defaults: bool,
    app_id: Option<String>,
    on_complete: Option<CompletionHandler>,
}

impl Engine {
    // =========================================================================
    // CONVERSION
    // =========================================================================

    /// Turn the declaration at `node` into a live instance of its tag's component.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` for an unregistered tag, `Tree` if `node` is not an
    /// element or the template fails to parse, or whatever the constructor or
    /// an automatic finalize returns.
    pub fn instantiate(&mut self, node: NodeId, options: ConvertOptions) -> Result<(), EngineError> {
        let tag = self.tree.tag(node).ok_or(TreeError::NodeNotFound(node))?.to_owned();
        let definition = self.registry.lookup(&tag)?;

        let snapshot = self.tree.clone_subtree(node)?;
        self.ensure_identifier(node, &tag)?;

        let cached_markup = self.tree.inner_markup(node);
        let cached_text = self.tree.text_content(node);
        if let Some(template) = definition.template_markup() {
            if let Err(err) = self.tree.set_inner_markup(node, template) {
                self.tree.remove(snapshot);
                return Err(err.into());
            }
        }

        // Re-conversion starts the instance over: old registrations and
        // attribute observation belong to the previous behavior.
        self.bus.unsubscribe_owner(node);
        self.tree.unobserve(node);
        let instance = self.instances.entry(node).or_insert_with(|| Instance::new(&tag));
        instance.cached_markup = cached_markup;
        instance.cached_text = cached_text;
        instance.behavior = None;
        instance.editable.clear();
        if instance.description.is_none() {
            instance.description = definition.description_markup().map(str::to_owned);
        }
        if instance.thumbnail.is_none() {
            instance.thumbnail = definition.thumbnail_markup().map(str::to_owned);
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        self.pending.insert(serial, PendingFinalize {
            instance: node,
            snapshot,
            use_defaults: options.use_defaults,
            app_id: options.app_id,
            on_complete: options.on_complete,
        });
        tracing::debug!(instance = %self.display_name(node), component = %tag, "converting");

        let constructor = definition.build();
        if let Err(err) = constructor(self, Finalize { instance: node, serial }) {
            self.discard_pending(serial);
            return Err(err);
        }

        if self.pending.contains_key(&serial) && self.is_set_up(node) {
            self.complete(node, serial)?;
        }
        Ok(())
    }

    /// Keep the declaration's identifier unless it is missing or another live
    /// node already answers to it.
    fn ensure_identifier(&mut self, node: NodeId, tag: &str) -> Result<(), EngineError> {
        let needs_id = match self.tree.attribute(node, "id") {
            None | Some("") => true,
            Some(id) => self.tree.element_by_id(id).is_some_and(|owner| owner != node),
        };
        if needs_id {
            let tree = &self.tree;
            let id = self.registry.next_identifier(tag, |candidate| tree.element_by_id(candidate).is_some());
            self.tree.set_attribute(node, "id", &id)?;
        }
        Ok(())
    }

    /// Convert every descendant of `container` whose tag is registered,
    /// tag by tag in registration order. Returns the converted nodes.
    ///
    /// # Errors
    ///
    /// Stops at the first conversion that fails.
    pub fn convert_container(&mut self, container: NodeId, options: ConvertOptions) -> Result<Vec<NodeId>, EngineError> {
        let mut converted = Vec::new();
        for name in self.registry.names().to_vec() {
            converted.extend(self.convert_in_container(&name, container, options.clone())?);
        }
        Ok(converted)
    }

    /// Convert every descendant of `container` with tag `name`.
    ///
    /// # Errors
    ///
    /// Stops at the first conversion that fails.
    pub fn convert_in_container(
        &mut self,
        name: &str,
        container: NodeId,
        options: ConvertOptions,
    ) -> Result<Vec<NodeId>, EngineError> {
        let matches = self.tree.select_all(container, &Selector::tag(name));
        let mut converted = Vec::with_capacity(matches.len());
        for node in matches {
            // An earlier template may have replaced this node.
            if !self.tree.contains(node) {
                continue;
            }
            self.instantiate(node, options.clone())?;
            converted.push(node);
        }
        Ok(converted)
    }

    // =========================================================================
    // SETUP / FINALIZE
    // =========================================================================

    /// Attach a behavior to a converting instance: validates it, binds its
    /// editable attributes, and notifies constructor observers. Calling it
    /// again replaces the behavior.
    ///
    /// # Errors
    ///
    /// `UnknownInstance` if `node` is not being converted, `Configuration`
    /// for an inconsistent behavior.
    pub fn setup(&mut self, node: NodeId, behavior: Behavior) -> Result<(), EngineError> {
        if !self.instances.contains_key(&node) {
            return Err(EngineError::UnknownInstance(node));
        }
        behavior.validate()?;

        self.tree.unobserve(node);
        if let Some(instance) = self.instances.get_mut(&node) {
            instance.editable.clear();
        }
        let metadata = self.setup_attributes(node, &behavior)?;

        let instance = self.instances.get_mut(&node).ok_or(EngineError::UnknownInstance(node))?;
        instance.attributes = metadata;
        instance.behavior = Some(behavior);

        if let Some(behavior) = instance.behavior.as_ref() {
            self.observers.constructed(node, behavior, &instance.attributes);
        }
        Ok(())
    }

    pub fn is_set_up(&self, node: NodeId) -> bool {
        self.instances.get(&node).is_some_and(Instance::is_set_up)
    }

    /// Whether `node` has a conversion waiting to be finalized.
    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.values().any(|p| p.instance == node)
    }

    /// Finish wiring the instance `token` was issued for.
    ///
    /// # Errors
    ///
    /// `FinalizeAlreadyCompleted` if this token's conversion already finished,
    /// `NotSetUp` if the instance has no behavior yet (the token stays usable),
    /// or an error from wiring or the init hook.
    pub fn finalize(&mut self, token: &Finalize) -> Result<(), EngineError> {
        if !self.pending.contains_key(&token.serial) {
            return Err(EngineError::FinalizeAlreadyCompleted(token.instance));
        }
        if !self.is_set_up(token.instance) {
            return Err(EngineError::NotSetUp(token.instance));
        }
        self.complete(token.instance, token.serial)
    }

    fn complete(&mut self, node: NodeId, serial: u64) -> Result<(), EngineError> {
        let Some(pending) = self.pending.remove(&serial) else {
            return Err(EngineError::FinalizeAlreadyCompleted(node));
        };

        let wired = self
            .wire_broadcasts(node, pending.snapshot, pending.use_defaults)
            .and_then(|()| self.wire_subscriptions(node, pending.snapshot, pending.use_defaults));
        self.tree.remove(pending.snapshot);
        wired?;

        let init = self.instances.get(&node).and_then(Instance::behavior).and_then(|b| b.init.clone());
        if let Some(init) = init {
            let context = InitContext { app_id: pending.app_id };
            init(self, node, &context).map_err(|source| EngineError::Init {
                instance: self.display_name(node),
                source,
            })?;
        }
        tracing::debug!(instance = %self.display_name(node), "instance ready");

        if let Some(on_complete) = pending.on_complete {
            on_complete(self, node);
        }
        Ok(())
    }

    fn discard_pending(&mut self, serial: u64) {
        if let Some(pending) = self.pending.remove(&serial) {
            self.tree.remove(pending.snapshot);
        }
    }

    // =========================================================================
    // UNLOAD
    // =========================================================================

    /// Remove an instance from the page: drop its subscriptions, detach it,
    /// run its unload hook, then notify removal and change observers.
    /// Binding nodes stay in the detached subtree.
    ///
    /// # Errors
    ///
    /// `UnknownInstance` if `node` is not an instance.
    pub fn unload(&mut self, node: NodeId) -> Result<(), EngineError> {
        let instance = self.instances.get(&node).ok_or(EngineError::UnknownInstance(node))?;
        let hook = instance.behavior().and_then(|b| b.on_unload.clone());

        let dropped = self.bus.unsubscribe_owner(node).len();
        self.tree.detach(node);
        self.tree.unobserve(node);
        tracing::debug!(instance = %self.display_name(node), subscriptions = dropped, "unloading");

        if let Some(hook) = hook {
            hook(self, node);
        }

        let serials: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.instance == node)
            .map(|(serial, _)| *serial)
            .collect();
        for serial in serials {
            self.discard_pending(serial);
        }
        self.instances.remove(&node);

        self.observers.removed(node);
        self.observers.changed();
        Ok(())
    }

    /// Unload every live instance, oldest first.
    ///
    /// # Errors
    ///
    /// Stops at the first unload that fails.
    pub fn unload_all(&mut self) -> Result<usize, EngineError> {
        let nodes = self.instances();
        let count = nodes.len();
        for node in nodes {
            if self.instances.contains_key(&node) {
                self.unload(node)?;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
