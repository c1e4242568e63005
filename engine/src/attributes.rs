//! Editable attributes — shadowed reads, write-through writes, change feedback.
//!
//! DESIGN
//! ======
//! An editable attribute has two faces. Reads return a shadow value owned by
//! the engine. Writes go to the host attribute only; the shadow catches up
//! when [`Engine::process_mutations`] drains the tree's change records, at
//! which point the post-set hook and the change observers run. Writes made
//! directly on the tree by other tooling take the same path.

use serde_json::Value;
use tree::NodeId;

use crate::behavior::{Behavior, PostSet};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::instance::{AttributeMetadata, EditableSlot};

impl Engine {
    /// Make attribute `name` of `node` editable. The shadow starts at the
    /// current host value. Binding a name again replaces its hook.
    ///
    /// # Errors
    ///
    /// `UnknownInstance` if `node` is not an instance.
    pub fn bind_editable(&mut self, node: NodeId, name: &str, postset: Option<PostSet>) -> Result<(), EngineError> {
        let seed = self.tree.attribute(node, name).map(str::to_owned);
        let instance = self.instances.get_mut(&node).ok_or(EngineError::UnknownInstance(node))?;
        match instance.slot_mut(name) {
            Some(slot) => {
                slot.shadow = seed;
                slot.postset = postset;
            }
            None => instance.editable.push(EditableSlot { name: name.to_owned(), shadow: seed, postset }),
        }
        self.tree.observe_attribute(node, name);
        Ok(())
    }

    /// Shadow value of an editable attribute.
    pub fn editable(&self, node: NodeId, name: &str) -> Option<&str> {
        self.instances.get(&node)?.slot(name)?.shadow.as_deref()
    }

    /// Write an editable attribute through to the host. The shadow is not
    /// touched until the change is processed.
    ///
    /// # Errors
    ///
    /// `UnknownInstance` if `node` is not an instance, `Configuration` if
    /// `name` is not editable on it.
    pub fn set_editable(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), EngineError> {
        let instance = self.instances.get(&node).ok_or(EngineError::UnknownInstance(node))?;
        if instance.slot(name).is_none() {
            return Err(EngineError::Configuration(format!("attribute '{name}' is not editable")));
        }
        self.tree.set_attribute(node, name, value)?;
        Ok(())
    }

    /// Deliver pending attribute changes until none remain. Each change
    /// refreshes the shadow, runs the post-set hook, then the change
    /// observers. Returns the number of changes handled.
    pub fn process_mutations(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let records = self.tree.take_mutations();
            if records.is_empty() {
                return handled;
            }
            for record in records {
                let value = self.tree.attribute(record.node, &record.attribute).map(str::to_owned);
                let Some(slot) = self
                    .instances
                    .get_mut(&record.node)
                    .and_then(|instance| instance.slot_mut(&record.attribute))
                else {
                    continue;
                };
                slot.shadow.clone_from(&value);
                let postset = slot.postset.clone();

                if let Some(postset) = postset {
                    postset(self, record.node, value.as_deref());
                }
                self.observers.changed();
                handled += 1;
            }
        }
    }

    /// Bind each editable attribute a behavior declares and collect the
    /// metadata tooling sees.
    pub(crate) fn setup_attributes(&mut self, node: NodeId, behavior: &Behavior) -> Result<AttributeMetadata, EngineError> {
        let mut metadata = AttributeMetadata::default();
        for (name, editable) in &behavior.editable {
            self.bind_editable(node, name, editable.postset.clone())?;
            metadata.editable_attributes.push(name.clone());
            metadata
                .element_attributes
                .insert(name.clone(), Value::Object(editable.meta.clone()));
        }
        Ok(metadata)
    }
}

#[cfg(test)]
#[path = "attributes_test.rs"]
mod tests;
