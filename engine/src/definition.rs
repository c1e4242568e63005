//! Component definition documents.
//!
//! DESIGN
//! ======
//! A definition document holds `<element name=...>` blocks:
//!
//! ```text
//! <element name="counter">
//!   <script type="text/ceci">counter</script>
//!   <description>Counts what it hears.</description>
//!   <thumbnail><img src="counter.png"></thumbnail>
//!   <friends>ticker, logger</friends>
//!   <template><span>0</span></template>
//! </element>
//! ```
//!
//! The trimmed script text names a native constructor previously provided
//! with [`Engine::provide_constructor`]. A block without a script gets a
//! no-op constructor.
//!
//! ERROR HANDLING
//! ==============
//! A bad definition is logged and skipped; the rest of the document still
//! registers and load observers still run. When several documents are loaded
//! together each is parsed on its own, so one that fails to parse is skipped
//! without touching the others. A lone document that fails to parse is
//! returned as an error.

use std::collections::HashMap;
use std::rc::Rc;

use tree::{HostTree, NodeId, Selector, TreeError};

use crate::engine::Engine;
use crate::error::{EngineError, ErrorCode};
use crate::lifecycle::Finalize;
use crate::registry::{ComponentDefinition, Constructor};

/// Native constructors addressable from definition scripts.
pub type ConstructorTable = HashMap<String, Constructor>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("<element> without a name")]
    MissingName,
    #[error("unknown constructor '{key}' in definition of component \"{component}\"")]
    Script { component: String, key: String },
    #[error("definition document {document} failed to parse: {source}")]
    Markup { document: usize, source: TreeError },
}

impl ErrorCode for DefinitionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingName => "E_DEFINITION_NAME",
            Self::Script { .. } => "E_DEFINITION_SCRIPT",
            Self::Markup { .. } => "E_DEFINITION_MARKUP",
        }
    }
}

/// Outcome of processing a batch of definition documents.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Components registered, in document order.
    pub registered: Vec<String>,
    /// Definitions skipped.
    pub failures: Vec<DefinitionError>,
}

impl Engine {
    /// Make `constructor` available to definition scripts under `key`.
    pub fn provide_constructor(
        &mut self,
        key: &str,
        constructor: impl Fn(&mut Engine, Finalize) -> Result<(), EngineError> + 'static,
    ) {
        self.constructors.insert(key.to_owned(), Rc::new(constructor));
    }

    /// Register every `<element>` in `documents`, then run load observers.
    /// `None` only runs the observers.
    ///
    /// # Errors
    ///
    /// `Tree` if the document fails to parse.
    pub fn process_components(&mut self, documents: Option<&str>) -> Result<LoadReport, EngineError> {
        let mut report = LoadReport::default();
        if let Some(document) = documents {
            self.register_document(document, &mut report)?;
        }
        Ok(self.finish_load(report))
    }

    /// Register every `<element>` of each document, each parsed on its own,
    /// then run load observers once. A document that fails to parse is
    /// logged and recorded; the others still register.
    pub fn process_component_documents<S: AsRef<str>>(&mut self, documents: &[S]) -> LoadReport {
        let mut report = LoadReport::default();
        for (index, document) in documents.iter().enumerate() {
            if let Err(source) = self.register_document(document.as_ref(), &mut report) {
                let err = DefinitionError::Markup { document: index, source };
                tracing::warn!(code = err.error_code(), error = %err, "skipping definition document");
                report.failures.push(err);
            }
        }
        self.finish_load(report)
    }

    fn finish_load(&mut self, report: LoadReport) -> LoadReport {
        tracing::info!(
            registered = report.registered.len(),
            failed = report.failures.len(),
            "components processed"
        );
        self.observers.loaded(&self.registry);
        report
    }

    fn register_document(&mut self, document: &str, report: &mut LoadReport) -> Result<(), TreeError> {
        let container = self.tree.create_element("div");
        if let Err(err) = self.tree.append_markup(container, document) {
            self.tree.remove(container);
            return Err(err);
        }
        for element in self.tree.select_all(container, &Selector::tag("element")) {
            match self.process_definition(element) {
                Ok(definition) => {
                    report.registered.push(definition.name().to_owned());
                    self.register_component(definition);
                }
                Err(err) => {
                    tracing::warn!(code = err.error_code(), error = %err, "skipping component definition");
                    report.failures.push(err);
                }
            }
        }
        self.tree.remove(container);
        Ok(())
    }

    /// Read one `<element>` block into a definition.
    ///
    /// # Errors
    ///
    /// `MissingName` without a usable name, `Script` for an unknown constructor key.
    pub fn process_definition(&self, element: NodeId) -> Result<ComponentDefinition, DefinitionError> {
        let name = self
            .tree
            .attribute(element, "name")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(DefinitionError::MissingName)?;
        let mut definition = ComponentDefinition::new(name);

        let script = self
            .tree
            .select_first(element, &Selector::tag("script").with_attr("type", "text/ceci"));
        if let Some(script) = script {
            let key = self.tree.text_content(script);
            let key = key.trim();
            if !key.is_empty() {
                let constructor = self.constructors.get(key).ok_or_else(|| DefinitionError::Script {
                    component: name.to_owned(),
                    key: key.to_owned(),
                })?;
                definition = definition.with_constructor(Rc::clone(constructor));
            }
        }

        if let Some(description) = self.tree.select_first(element, &Selector::tag("description")) {
            definition = definition.description(&self.tree.inner_markup(description));
        }
        if let Some(thumbnail) = self.tree.select_first(element, &Selector::tag("thumbnail")) {
            definition = definition.thumbnail(&self.tree.inner_markup(thumbnail));
        }
        if let Some(friends) = self.tree.select_first(element, &Selector::tag("friends")) {
            definition = definition.friends(split_friends(&self.tree.text_content(friends)));
        }
        if let Some(template) = self.tree.select_first(element, &Selector::tag("template")) {
            definition = definition.template(&self.tree.inner_markup(template));
        }
        Ok(definition)
    }
}

fn split_friends(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `href`s of `<link rel="component" type="text/ceci">` elements under
/// `scope`, in document order.
pub fn component_links(tree: &HostTree, scope: NodeId) -> Vec<String> {
    tree.select_all(scope, &Selector::tag("link").with_attr("rel", "component"))
        .into_iter()
        .filter(|link| tree.attribute(*link, "type") == Some("text/ceci"))
        .filter_map(|link| tree.attribute(link, "href").map(str::to_owned))
        .collect()
}

#[cfg(test)]
#[path = "definition_test.rs"]
mod tests;
