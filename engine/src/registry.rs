//! Component registry — definitions keyed by lowercase tag name.
//!
//! DESIGN
//! ======
//! Definitions are shared as `Rc<ComponentDefinition>` and never hold
//! references to live instances. The registry also owns the per-tag counter
//! behind generated identifiers (`counter-1`, `counter-2`, ...).

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::lifecycle::Finalize;

/// Builds an instance: calls [`Engine::setup`] and optionally
/// [`Engine::finalize`] on the node carried by the token.
pub type Constructor = Rc<dyn Fn(&mut Engine, Finalize) -> Result<(), EngineError>>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("component not found: <{0}>")]
    NotFound(String),
}

impl crate::error::ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_COMPONENT_NOT_FOUND",
        }
    }
}

// =============================================================================
// DEFINITION
// =============================================================================

#[derive(Clone)]
pub struct ComponentDefinition {
    name: String,
    constructor: Constructor,
    description: Option<String>,
    thumbnail: Option<String>,
    friends: Vec<String>,
    template: Option<String>,
}

impl ComponentDefinition {
    /// A definition with a no-op constructor.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            constructor: Rc::new(|_: &mut Engine, _: Finalize| Ok(())),
            description: None,
            thumbnail: None,
            friends: Vec::new(),
            template: None,
        }
    }

    #[must_use]
    pub fn constructor(mut self, constructor: impl Fn(&mut Engine, Finalize) -> Result<(), EngineError> + 'static) -> Self {
        self.constructor = Rc::new(constructor);
        self
    }

    #[must_use]
    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructor = constructor;
        self
    }

    #[must_use]
    pub fn description(mut self, markup: &str) -> Self {
        self.description = Some(markup.to_owned());
        self
    }

    #[must_use]
    pub fn thumbnail(mut self, markup: &str) -> Self {
        self.thumbnail = Some(markup.to_owned());
        self
    }

    #[must_use]
    pub fn friends<I, S>(mut self, friends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.friends = friends.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn template(mut self, markup: &str) -> Self {
        self.template = Some(markup.to_owned());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description_markup(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn thumbnail_markup(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn friend_names(&self) -> &[String] {
        &self.friends
    }

    pub fn template_markup(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub(crate) fn build(&self) -> Constructor {
        Rc::clone(&self.constructor)
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("thumbnail", &self.thumbnail)
            .field("friends", &self.friends)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    definitions: HashMap<String, Rc<ComponentDefinition>>,
    order: Vec<String>,
    id_counters: HashMap<String, u64>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `definition`, replacing any previous one with the same name.
    /// Returns the replaced definition.
    pub fn register(&mut self, definition: ComponentDefinition) -> Option<Rc<ComponentDefinition>> {
        let name = definition.name.clone();
        self.id_counters.entry(name.clone()).or_insert(1);
        let previous = self.definitions.insert(name.clone(), Rc::new(definition));
        if previous.is_none() {
            self.order.push(name);
        }
        previous
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no definition has this name.
    pub fn lookup(&self, name: &str) -> Result<Rc<ComponentDefinition>, RegistryError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_ascii_lowercase()))
    }

    pub fn get(&self, name: &str) -> Option<&Rc<ComponentDefinition>> {
        self.definitions.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in first-registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Next `tag-N` identifier for which `taken` is false. The counter only
    /// moves forward, so identifiers are never handed out twice.
    pub fn next_identifier(&mut self, tag: &str, taken: impl Fn(&str) -> bool) -> String {
        let counter = self.id_counters.entry(tag.to_ascii_lowercase()).or_insert(1);
        loop {
            let candidate = format!("{tag}-{counter}");
            *counter += 1;
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
