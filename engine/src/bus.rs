//! Message bus — channel registrations, emit, and delivery.
//!
//! DESIGN
//! ======
//! Every subscription is keyed by its `<listen>` binding node, so replacing or
//! removing a binding finds and drops exactly the registration it installed.
//! `emit` snapshots the subscriber list before delivering; a listener that
//! rebinds or unloads another instance mid-delivery cannot invalidate the
//! iteration, and a registration dropped mid-delivery is skipped.
//!
//! Listeners may emit while handling a message, so emits nest. Two instances
//! that feed each other over one channel would nest forever; past
//! [`MAX_EMIT_DEPTH`] nested emits the message is logged and dropped.
//!
//! ERROR HANDLING
//! ==============
//! Listener errors are logged with the listener name and owner identifier and
//! then discarded; delivery to the remaining subscribers continues.

use serde_json::Value;
use tree::{NodeId, Selector};

use crate::behavior::{Listener, TrafficHook};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::message::{Channel, Message, value_text};

/// Emits nested deeper than this are dropped.
pub const MAX_EMIT_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub channel: String,
    /// Instance whose listener runs.
    pub owner: NodeId,
    pub listener: String,
    /// The `<listen>` node that installed this registration.
    pub binding: NodeId,
}

/// Channel registrations in installation order.
#[derive(Debug, Default)]
pub struct MessageBus {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl MessageBus {
    pub fn subscribe(&mut self, binding: NodeId, channel: &str, owner: NodeId, listener: &str) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(Subscription {
            id,
            channel: channel.to_owned(),
            owner,
            listener: listener.to_owned(),
            binding,
        });
        id
    }

    /// Drop the registration installed by a `<listen>` node.
    pub fn unsubscribe_binding(&mut self, binding: NodeId) -> Option<Subscription> {
        let index = self.subscriptions.iter().position(|s| s.binding == binding)?;
        Some(self.subscriptions.remove(index))
    }

    /// Drop every registration owned by an instance.
    pub fn unsubscribe_owner(&mut self, owner: NodeId) -> Vec<Subscription> {
        let (removed, kept) = std::mem::take(&mut self.subscriptions)
            .into_iter()
            .partition(|s| s.owner == owner);
        self.subscriptions = kept;
        removed
    }

    pub fn by_binding(&self, binding: NodeId) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.binding == binding)
    }

    /// Copy of the registrations on `channel`, in installation order.
    pub fn subscribers(&self, channel: &str) -> Vec<Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.channel == channel)
            .cloned()
            .collect()
    }

    pub fn owned_by(&self, owner: NodeId) -> Vec<&Subscription> {
        self.subscriptions.iter().filter(|s| s.owner == owner).collect()
    }

    pub fn is_live(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

// =============================================================================
// EMIT / DELIVER
// =============================================================================

impl Engine {
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Send `data` out of broadcast `name` on whatever channel it is bound to.
    ///
    /// Missing or null `data` becomes the broadcast name. Endpoints, unbound
    /// broadcasts, and broadcasts bound to the sentinel send nothing. Returns
    /// the number of listeners invoked. An emit nested more than
    /// [`MAX_EMIT_DEPTH`] deep inside listeners is dropped and returns 0.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`] if `node` is not an instance.
    pub fn emit(
        &mut self,
        node: NodeId,
        name: &str,
        data: Option<Value>,
        extra: Option<Value>,
    ) -> Result<usize, EngineError> {
        let instance = self.instances.get(&node).ok_or(EngineError::UnknownInstance(node))?;
        if instance.is_endpoint() {
            return Ok(0);
        }
        let on_output = instance.behavior().and_then(|b| b.on_output_generated.clone());

        let binding = self.tree.select_child(node, &Selector::tag("broadcast").with_attr("from", name));
        let channel = Channel::from_attribute(binding.and_then(|b| self.tree.attribute(b, "on")));
        let Channel::Named(channel) = channel else {
            return Ok(0);
        };

        let data = match data {
            None | Some(Value::Null) => Value::String(name.to_owned()),
            Some(value) => value,
        };
        let message = Message {
            channel: channel.clone(),
            data,
            extra: extra.unwrap_or(Value::Null),
            source: node,
            source_id: self.identifier(node).map(str::to_owned),
        };

        self.log(
            Some(node),
            &format!("sends '{}' on {channel} channel", value_text(&message.data)),
            Some(&channel),
            None,
        );

        if self.emit_depth >= MAX_EMIT_DEPTH {
            tracing::warn!(
                instance = %self.display_name(node),
                broadcast = name,
                channel = %channel,
                depth = self.emit_depth,
                "emit nested too deep; message dropped"
            );
            return Ok(0);
        }

        self.emit_depth += 1;
        let mut delivered = 0;
        for subscription in self.bus.subscribers(&channel) {
            if self.deliver(&subscription, &message) {
                delivered += 1;
            }
        }
        self.emit_depth -= 1;

        if let Some(hook) = on_output {
            hook(self, node, &channel, &message.data);
        }
        Ok(delivered)
    }

    /// Broadcast the way the instance wants to: through its
    /// [`Behavior::broadcast_with`](crate::Behavior::broadcast_with) hook
    /// when it has one, otherwise a plain [`Engine::emit`].
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`] if `node` is not an instance, or
    /// whatever the hook returns.
    pub fn broadcast(
        &mut self,
        node: NodeId,
        name: &str,
        data: Option<Value>,
        extra: Option<Value>,
    ) -> Result<usize, EngineError> {
        let instance = self.instances.get(&node).ok_or(EngineError::UnknownInstance(node))?;
        match instance.behavior().and_then(|b| b.broadcaster.clone()) {
            Some(hook) => hook(self, node, name, data, extra),
            None => self.emit(node, name, data, extra),
        }
    }

    /// Invoke one subscriber. Returns whether its listener ran.
    fn deliver(&mut self, subscription: &Subscription, message: &Message) -> bool {
        if !self.bus.is_live(subscription.id) {
            return false;
        }
        // An instance never hears its own messages, matched by identifier.
        if self.identifier(subscription.owner) == message.source_id.as_deref() {
            return false;
        }
        let Some((listener, on_input)) = self.delivery_hooks(subscription) else {
            return false;
        };

        if let Err(err) = listener(self, subscription.owner, message) {
            tracing::warn!(
                listener = %subscription.listener,
                instance = %self.display_name(subscription.owner),
                channel = %message.channel,
                error = %err,
                "listener failed"
            );
        }
        if let Some(hook) = on_input {
            hook(self, subscription.owner, &message.channel, &message.data);
        }
        true
    }

    fn delivery_hooks(&self, subscription: &Subscription) -> Option<(Listener, Option<TrafficHook>)> {
        let behavior = self.instances.get(&subscription.owner)?.behavior()?;
        let listener = behavior.listener_handler(&subscription.listener)?;
        Some((listener, behavior.on_input_received.clone()))
    }
}

#[cfg(test)]
#[path = "bus_test.rs"]
mod tests;
