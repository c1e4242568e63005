//! Channel allocation and binding maintenance.
//!
//! DESIGN
//! ======
//! Channel assignments live in the tree as `<broadcast from=NAME on=CHANNEL>`
//! and `<listen for=NAME on=CHANNEL>` children of the instance, so they are
//! visible in serialized markup and can be restored from a declaration
//! snapshot. At most one binding exists per name; rebinding overwrites it.
//!
//! Fresh instances take channels from the default sequence: each pass works
//! on its own copy, popping one channel per default broadcast and refilling
//! the copy when it runs dry. The default listener always takes the first
//! channel of the sequence.

use tree::{NodeId, Selector};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::message::Channel;

/// Pair each broadcast with its default-sequence channel, in declaration order.
#[must_use]
pub fn default_broadcast_channels(
    broadcasts: &[String],
    defaults: &[String],
    sequence: &[Channel],
) -> Vec<(String, Channel)> {
    let mut left: Vec<Channel> = Vec::new();
    broadcasts
        .iter()
        .map(|name| {
            if !defaults.contains(name) {
                return (name.clone(), Channel::Empty);
            }
            if left.is_empty() {
                left = sequence.iter().rev().cloned().collect();
            }
            (name.clone(), left.pop().unwrap_or_default())
        })
        .collect()
}

/// Pair each listener with its channel: the first default for the default
/// listener, the sentinel for everything else.
#[must_use]
pub fn default_listener_channels(
    listeners: &[&str],
    default_listener: Option<&str>,
    sequence: &[Channel],
) -> Vec<(String, Channel)> {
    listeners
        .iter()
        .map(|name| {
            let channel = if default_listener == Some(*name) {
                sequence.first().cloned().unwrap_or_default()
            } else {
                Channel::Empty
            };
            ((*name).to_owned(), channel)
        })
        .collect()
}

fn broadcast_selector(name: &str) -> Selector {
    Selector::tag("broadcast").with_attr("from", name)
}

fn listen_selector(name: &str) -> Selector {
    Selector::tag("listen").with_attr("for", name)
}

impl Engine {
    // =========================================================================
    // READ
    // =========================================================================

    /// Channel broadcast `name` is bound to, or the sentinel.
    pub fn broadcast_channel(&self, node: NodeId, name: &str) -> Channel {
        let binding = self.tree.select_child(node, &broadcast_selector(name));
        Channel::from_attribute(binding.and_then(|b| self.tree.attribute(b, "on")))
    }

    /// Channel listener `name` is subscribed to, or the sentinel.
    pub fn subscription_channel(&self, node: NodeId, name: &str) -> Channel {
        let binding = self.tree.select_child(node, &listen_selector(name));
        Channel::from_attribute(binding.and_then(|b| self.tree.attribute(b, "on")))
    }

    /// Every declared broadcast with its current channel.
    pub fn broadcast_channels(&self, node: NodeId) -> Vec<(String, Channel)> {
        let Some(instance) = self.instances.get(&node) else {
            return Vec::new();
        };
        instance
            .broadcasts()
            .iter()
            .map(|name| (name.clone(), self.broadcast_channel(node, name)))
            .collect()
    }

    /// Every declared listener with its current channel.
    pub fn subscription_channels(&self, node: NodeId) -> Vec<(String, Channel)> {
        let Some(instance) = self.instances.get(&node) else {
            return Vec::new();
        };
        instance
            .listeners()
            .into_iter()
            .map(|name| (name.to_owned(), self.subscription_channel(node, name)))
            .collect()
    }

    // =========================================================================
    // REBIND
    // =========================================================================

    /// Bind broadcast `name` to `channel`. The sentinel removes the binding.
    ///
    /// # Errors
    ///
    /// `UnknownInstance` if `node` is not an instance, `NotSetUp` before
    /// setup, `Configuration` if the instance does not declare `name`.
    pub fn set_broadcast(&mut self, node: NodeId, name: &str, channel: Channel) -> Result<(), EngineError> {
        let instance = self.instances.get(&node).ok_or(EngineError::UnknownInstance(node))?;
        let behavior = instance.behavior().ok_or(EngineError::NotSetUp(node))?;
        if !behavior.declares_broadcast(name) {
            return Err(EngineError::Configuration(format!("broadcast '{name}' is not declared")));
        }
        let hook = behavior.on_broadcast_channel_changed.clone();

        let existing = self.tree.select_child(node, &broadcast_selector(name));
        match (&channel, existing) {
            (Channel::Named(on), existing) => {
                let binding = match existing {
                    Some(binding) => binding,
                    None => {
                        let binding = self.tree.create_element("broadcast");
                        self.tree.append_child(node, binding)?;
                        binding
                    }
                };
                self.tree.set_attribute(binding, "on", on)?;
                self.tree.set_attribute(binding, "from", name)?;
            }
            (Channel::Empty, Some(binding)) => self.tree.remove(binding),
            (Channel::Empty, None) => {}
        }
        tracing::debug!(instance = %self.display_name(node), broadcast = name, channel = %channel, "broadcast bound");

        if let Some(hook) = hook {
            hook(self, node, &channel, name);
        }
        Ok(())
    }

    /// Subscribe listener `name` to `channel`, replacing any previous
    /// subscription. The sentinel removes the subscription.
    ///
    /// # Errors
    ///
    /// `UnknownInstance` if `node` is not an instance, `NotSetUp` before
    /// setup, `Configuration` if the instance does not declare `name`.
    pub fn set_subscription(&mut self, node: NodeId, name: &str, channel: Channel) -> Result<(), EngineError> {
        let instance = self.instances.get(&node).ok_or(EngineError::UnknownInstance(node))?;
        let behavior = instance.behavior().ok_or(EngineError::NotSetUp(node))?;
        if !behavior.declares_listener(name) {
            return Err(EngineError::Configuration(format!("listener '{name}' is not declared")));
        }
        let hook = behavior.on_subscription_channel_changed.clone();

        match &channel {
            Channel::Named(on) => {
                let binding = match self.tree.select_child(node, &listen_selector(name)) {
                    Some(binding) => {
                        self.bus.unsubscribe_binding(binding);
                        binding
                    }
                    None => {
                        let binding = self.tree.create_element("listen");
                        self.tree.append_child(node, binding)?;
                        binding
                    }
                };
                self.tree.set_attribute(binding, "on", on)?;
                self.tree.set_attribute(binding, "for", name)?;
                self.bus.subscribe(binding, on, node, name);
            }
            Channel::Empty => self.discard_subscription(node, name),
        }
        tracing::debug!(instance = %self.display_name(node), listener = name, channel = %channel, "subscription bound");

        if let Some(hook) = hook {
            hook(self, node, &channel, name);
        }
        self.observers.changed();
        Ok(())
    }

    /// Drop listener `name`'s subscription and its binding node. Runs no hooks.
    ///
    /// # Errors
    ///
    /// `UnknownInstance` if `node` is not an instance.
    pub fn remove_subscription(&mut self, node: NodeId, name: &str) -> Result<(), EngineError> {
        if !self.instances.contains_key(&node) {
            return Err(EngineError::UnknownInstance(node));
        }
        self.discard_subscription(node, name);
        Ok(())
    }

    fn discard_subscription(&mut self, node: NodeId, name: &str) {
        if let Some(binding) = self.tree.select_child(node, &listen_selector(name)) {
            self.bus.unsubscribe_binding(binding);
            self.tree.remove(binding);
        }
    }

    // =========================================================================
    // WIRING
    // =========================================================================

    /// Give every declared broadcast a channel, from the defaults or from the
    /// declaration snapshot.
    pub(crate) fn wire_broadcasts(&mut self, node: NodeId, snapshot: NodeId, use_defaults: bool) -> Result<(), EngineError> {
        let Some(behavior) = self.instances.get(&node).and_then(|i| i.behavior()) else {
            return Err(EngineError::NotSetUp(node));
        };
        let assignments = if use_defaults {
            default_broadcast_channels(behavior.broadcasts(), behavior.default_broadcasts(), &self.default_channels)
        } else {
            behavior
                .broadcasts()
                .iter()
                .map(|name| {
                    let original = self.tree.select_child(snapshot, &broadcast_selector(name));
                    let channel = Channel::from_attribute(original.and_then(|b| self.tree.attribute(b, "on")));
                    (name.clone(), channel)
                })
                .collect()
        };
        for (name, channel) in assignments {
            self.set_broadcast(node, &name, channel)?;
        }
        Ok(())
    }

    /// Subscribe every declared listener, from the defaults or from the
    /// declaration snapshot. Restored `<listen>` entries are consumed.
    pub(crate) fn wire_subscriptions(&mut self, node: NodeId, snapshot: NodeId, use_defaults: bool) -> Result<(), EngineError> {
        let Some(behavior) = self.instances.get(&node).and_then(|i| i.behavior()) else {
            return Err(EngineError::NotSetUp(node));
        };
        let listeners = behavior.listener_names();
        let assignments = if use_defaults {
            default_listener_channels(&listeners, behavior.default_listener_name(), &self.default_channels)
        } else {
            let mut assignments = Vec::with_capacity(listeners.len());
            let mut consumed = Vec::new();
            for name in listeners {
                let original = self
                    .tree
                    .select_child(snapshot, &listen_selector(name))
                    .filter(|l| self.tree.has_attribute(*l, "on"));
                let channel = original.map_or(Channel::Empty, |l| Channel::from_attribute(self.tree.attribute(l, "on")));
                consumed.extend(original);
                assignments.push((name.to_owned(), channel));
            }
            for original in consumed {
                self.tree.remove(original);
            }
            assignments
        };
        for (name, channel) in assignments {
            self.set_subscription(node, &name, channel)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "channels_test.rs"]
mod tests;
