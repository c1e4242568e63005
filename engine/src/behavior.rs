//! Component behavior: what an instance broadcasts, listens to, and exposes.
//!
//! DESIGN
//! ======
//! A constructor describes its instance with a [`Behavior`] built here and
//! hands it to [`Engine::setup`](crate::Engine::setup). Hooks are `Rc`
//! closures that receive `&mut Engine` so they can emit, rebind channels, or
//! write attributes; the engine clones a hook out of its own state before
//! calling it, so no borrow of the instance is held during the call.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Value};
use tree::NodeId;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::message::{Channel, Message};

// =============================================================================
// HOOK TYPES
// =============================================================================

/// Handles a message arriving on a subscribed channel.
pub type Listener = Rc<dyn Fn(&mut Engine, NodeId, &Message) -> Result<(), ListenerError>>;

/// Runs once after channel wiring completes.
pub type InitHook = Rc<dyn Fn(&mut Engine, NodeId, &InitContext) -> Result<(), ListenerError>>;

/// Runs when the instance is unloaded.
pub type UnloadHook = Rc<dyn Fn(&mut Engine, NodeId)>;

/// Runs after a broadcast or subscription binding changes: `(instance, channel, name)`.
pub type ChannelChangedHook = Rc<dyn Fn(&mut Engine, NodeId, &Channel, &str)>;

/// Observes traffic in or out of an instance: `(instance, channel, data)`.
pub type TrafficHook = Rc<dyn Fn(&mut Engine, NodeId, &str, &Value)>;

/// Replaces how the instance broadcasts: `(instance, broadcast, data, extra)`.
/// Reached through [`Engine::broadcast`]; call [`Engine::emit`] to actually send.
pub type Broadcaster = Rc<dyn Fn(&mut Engine, NodeId, &str, Option<Value>, Option<Value>) -> Result<usize, EngineError>>;

/// Runs after an editable attribute changed on the host: `(instance, new value)`.
pub type PostSet = Rc<dyn Fn(&mut Engine, NodeId, Option<&str>)>;

/// Error returned by listener and init closures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Passed to the init hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitContext {
    /// Application identifier supplied by whoever converted the element.
    pub app_id: Option<String>,
}

// =============================================================================
// EDITABLE ATTRIBUTES
// =============================================================================

/// Declaration of one editable attribute: tooling metadata plus an optional
/// post-set hook.
#[derive(Clone, Default)]
pub struct Editable {
    pub(crate) meta: Map<String, Value>,
    pub(crate) postset: Option<PostSet>,
}

impl Editable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a metadata entry (label, type, range, ...) for editing tools.
    #[must_use]
    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn postset(mut self, hook: impl Fn(&mut Engine, NodeId, Option<&str>) + 'static) -> Self {
        self.postset = Some(Rc::new(hook));
        self
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.meta
    }
}

impl fmt::Debug for Editable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editable")
            .field("meta", &self.meta)
            .field("postset", &self.postset.is_some())
            .finish()
    }
}

// =============================================================================
// BEHAVIOR
// =============================================================================

#[derive(Clone, Default)]
pub struct Behavior {
    pub(crate) broadcasts: Vec<String>,
    pub(crate) default_broadcasts: Vec<String>,
    pub(crate) listeners: Vec<(String, Listener)>,
    pub(crate) default_listener: Option<String>,
    pub(crate) editable: Vec<(String, Editable)>,
    pub(crate) endpoint: bool,
    pub(crate) init: Option<InitHook>,
    pub(crate) on_unload: Option<UnloadHook>,
    pub(crate) on_output_generated: Option<TrafficHook>,
    pub(crate) on_input_received: Option<TrafficHook>,
    pub(crate) on_broadcast_channel_changed: Option<ChannelChangedHook>,
    pub(crate) on_subscription_channel_changed: Option<ChannelChangedHook>,
    pub(crate) broadcaster: Option<Broadcaster>,
}

impl Behavior {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a broadcast. Declaring the same name twice is a no-op.
    #[must_use]
    pub fn broadcast(mut self, name: &str) -> Self {
        if !self.broadcasts.iter().any(|b| b == name) {
            self.broadcasts.push(name.to_owned());
        }
        self
    }

    /// Flag a broadcast to receive a channel from the default sequence.
    /// The name must also be declared with [`Behavior::broadcast`].
    #[must_use]
    pub fn default_broadcast(mut self, name: &str) -> Self {
        if !self.default_broadcasts.iter().any(|b| b == name) {
            self.default_broadcasts.push(name.to_owned());
        }
        self
    }

    #[must_use]
    pub fn listener(
        mut self,
        name: &str,
        handler: impl Fn(&mut Engine, NodeId, &Message) -> Result<(), ListenerError> + 'static,
    ) -> Self {
        self.listeners.push((name.to_owned(), Rc::new(handler)));
        self
    }

    /// Flag the listener that subscribes to the first default channel.
    #[must_use]
    pub fn default_listener(mut self, name: &str) -> Self {
        self.default_listener = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn editable(mut self, name: &str, editable: Editable) -> Self {
        self.editable.retain(|(existing, _)| existing != name);
        self.editable.push((name.to_owned(), editable));
        self
    }

    /// Mark the instance as an endpoint: it never emits.
    #[must_use]
    pub fn endpoint(mut self) -> Self {
        self.endpoint = true;
        self
    }

    #[must_use]
    pub fn on_init(
        mut self,
        hook: impl Fn(&mut Engine, NodeId, &InitContext) -> Result<(), ListenerError> + 'static,
    ) -> Self {
        self.init = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_unload(mut self, hook: impl Fn(&mut Engine, NodeId) + 'static) -> Self {
        self.on_unload = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_output_generated(mut self, hook: impl Fn(&mut Engine, NodeId, &str, &Value) + 'static) -> Self {
        self.on_output_generated = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_input_received(mut self, hook: impl Fn(&mut Engine, NodeId, &str, &Value) + 'static) -> Self {
        self.on_input_received = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_broadcast_channel_changed(
        mut self,
        hook: impl Fn(&mut Engine, NodeId, &Channel, &str) + 'static,
    ) -> Self {
        self.on_broadcast_channel_changed = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_subscription_channel_changed(
        mut self,
        hook: impl Fn(&mut Engine, NodeId, &Channel, &str) + 'static,
    ) -> Self {
        self.on_subscription_channel_changed = Some(Rc::new(hook));
        self
    }

    /// Route [`Engine::broadcast`] for this instance through `hook` instead
    /// of a plain emit.
    #[must_use]
    pub fn broadcast_with(
        mut self,
        hook: impl Fn(&mut Engine, NodeId, &str, Option<Value>, Option<Value>) -> Result<usize, EngineError> + 'static,
    ) -> Self {
        self.broadcaster = Some(Rc::new(hook));
        self
    }

    // --- Accessors ---

    pub fn broadcasts(&self) -> &[String] {
        &self.broadcasts
    }

    pub fn default_broadcasts(&self) -> &[String] {
        &self.default_broadcasts
    }

    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn default_listener_name(&self) -> Option<&str> {
        self.default_listener.as_deref()
    }

    pub fn editable_names(&self) -> Vec<&str> {
        self.editable.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_endpoint(&self) -> bool {
        self.endpoint
    }

    pub(crate) fn listener_handler(&self, name: &str) -> Option<Listener> {
        self.listeners
            .iter()
            .find(|(listener, _)| listener == name)
            .map(|(_, handler)| Rc::clone(handler))
    }

    pub(crate) fn declares_broadcast(&self, name: &str) -> bool {
        self.broadcasts.iter().any(|b| b == name)
    }

    pub(crate) fn declares_listener(&self, name: &str) -> bool {
        self.listeners.iter().any(|(listener, _)| listener == name)
    }

    /// Reject defaults that name undeclared entries and duplicate listeners.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(name) = self.default_broadcasts.iter().find(|d| !self.declares_broadcast(d)) {
            return Err(EngineError::Configuration(format!("default broadcast '{name}' is not declared")));
        }
        if let Some(name) = self.default_listener.as_deref() {
            if !self.declares_listener(name) {
                return Err(EngineError::Configuration(format!("default listener '{name}' is not declared")));
            }
        }
        for (i, (name, _)) in self.listeners.iter().enumerate() {
            if self.listeners[..i].iter().any(|(earlier, _)| earlier == name) {
                return Err(EngineError::Configuration(format!("listener '{name}' is declared twice")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("broadcasts", &self.broadcasts)
            .field("default_broadcasts", &self.default_broadcasts)
            .field("listeners", &self.listener_names())
            .field("default_listener", &self.default_listener)
            .field("editable", &self.editable_names())
            .field("endpoint", &self.endpoint)
            .field("init", &self.init.is_some())
            .field("broadcaster", &self.broadcaster.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "behavior_test.rs"]
mod tests;
