//! Per-instance engine state.
//!
//! Channel assignments are not stored here: the `<broadcast>` and `<listen>`
//! binding nodes in the tree are the source of truth, so they survive
//! serialization and content replacement.

use serde::Serialize;
use serde_json::{Map, Value};
use tree::NodeId;

use crate::behavior::{Behavior, PostSet};
use crate::engine::Engine;
use crate::message::Channel;

/// Editable attribute metadata collected at setup, for editing tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeMetadata {
    /// Metadata per editable attribute (everything declared except the post-set hook).
    pub element_attributes: Map<String, Value>,
    /// Editable attribute names in declaration order.
    pub editable_attributes: Vec<String>,
}

pub(crate) struct EditableSlot {
    pub(crate) name: String,
    pub(crate) shadow: Option<String>,
    pub(crate) postset: Option<PostSet>,
}

pub struct Instance {
    pub(crate) tag: String,
    pub(crate) description: Option<String>,
    pub(crate) thumbnail: Option<String>,
    pub(crate) cached_markup: String,
    pub(crate) cached_text: String,
    pub(crate) behavior: Option<Behavior>,
    pub(crate) editable: Vec<EditableSlot>,
    pub(crate) attributes: AttributeMetadata,
}

impl Instance {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            description: None,
            thumbnail: None,
            cached_markup: String::new(),
            cached_text: String::new(),
            behavior: None,
            editable: Vec::new(),
            attributes: AttributeMetadata::default(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Description markup bound from the definition at first conversion.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    /// Inner markup the declaration carried before its template was applied.
    pub fn cached_markup(&self) -> &str {
        &self.cached_markup
    }

    /// Text content the declaration carried before its template was applied.
    pub fn cached_text(&self) -> &str {
        &self.cached_text
    }

    pub fn behavior(&self) -> Option<&Behavior> {
        self.behavior.as_ref()
    }

    /// True once the constructor has called `setup`.
    pub fn is_set_up(&self) -> bool {
        self.behavior.is_some()
    }

    pub fn is_endpoint(&self) -> bool {
        self.behavior.as_ref().is_some_and(Behavior::is_endpoint)
    }

    pub fn broadcasts(&self) -> &[String] {
        self.behavior.as_ref().map_or(&[], Behavior::broadcasts)
    }

    pub fn listeners(&self) -> Vec<&str> {
        self.behavior.as_ref().map_or_else(Vec::new, Behavior::listener_names)
    }

    pub fn attribute_metadata(&self) -> &AttributeMetadata {
        &self.attributes
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut EditableSlot> {
        self.editable.iter_mut().find(|slot| slot.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn slot(&self, name: &str) -> Option<&EditableSlot> {
        self.editable.iter().find(|slot| slot.name.eq_ignore_ascii_case(name))
    }
}

/// Serializable picture of a live instance for tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceDescription {
    pub tag: String,
    pub id: Option<String>,
    pub endpoint: bool,
    pub broadcasts: Vec<(String, Channel)>,
    pub listeners: Vec<(String, Channel)>,
    /// Editable attribute names with their shadow values.
    pub editable: Vec<(String, Option<String>)>,
    pub attributes: AttributeMetadata,
}

impl Engine {
    /// Describe the instance at `node`, or `None` if it is not an instance.
    pub fn describe(&self, node: NodeId) -> Option<InstanceDescription> {
        let instance = self.instances.get(&node)?;
        Some(InstanceDescription {
            tag: instance.tag.clone(),
            id: self.identifier(node).map(str::to_owned),
            endpoint: instance.is_endpoint(),
            broadcasts: self.broadcast_channels(node),
            listeners: self.subscription_channels(node),
            editable: instance
                .editable
                .iter()
                .map(|slot| (slot.name.clone(), slot.shadow.clone()))
                .collect(),
            attributes: instance.attributes.clone(),
        })
    }
}
