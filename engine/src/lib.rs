//! Component lifecycle and channel routing for markup-declared elements.
//!
//! Page authors declare custom elements in markup; this crate turns each
//! declaration into a live instance, gives its broadcasts and listeners
//! channels (fresh defaults, or whatever the declaration's `<broadcast>` and
//! `<listen>` children say), and routes messages between instances by
//! channel name without either side holding a reference to the other.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`Engine`] — owns the tree, registry, instances, bus, observers |
//! | [`registry`] | [`ComponentDefinition`] and the name-keyed [`ComponentRegistry`] |
//! | [`behavior`] | [`Behavior`] builder and the hook closure types |
//! | [`lifecycle`] | instantiate / setup / finalize / unload, container conversion |
//! | [`channels`] | default channel allocation, restore, rebinding |
//! | [`bus`] | [`MessageBus`] registrations, emit and delivery |
//! | [`attributes`] | editable attributes and mutation processing |
//! | [`definition`] | `<element>` definition documents, native constructor table |
//! | [`instance`] | per-instance state and [`InstanceDescription`] |
//! | [`observers`] | global [`Hook`]s for tooling |
//! | [`message`] | [`Channel`] and [`Message`] |
//! | [`log`] | [`LogRecord`] and the log sink |
//! | [`config`] | [`EngineConfig`] from the environment |
//! | [`error`] | [`EngineError`] and the [`ErrorCode`] trait |

pub mod attributes;
pub mod behavior;
pub mod bus;
pub mod channels;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod log;
pub mod message;
pub mod observers;
pub mod registry;

pub use behavior::{Behavior, Editable, InitContext, ListenerError};
pub use bus::{MessageBus, Subscription};
pub use config::EngineConfig;
pub use definition::{DefinitionError, LoadReport, component_links};
pub use engine::Engine;
pub use error::{EngineError, ErrorCode};
pub use instance::{AttributeMetadata, Instance, InstanceDescription};
pub use lifecycle::{ConvertOptions, Finalize};
pub use log::{LogRecord, Severity};
pub use message::{Channel, Message};
pub use observers::Hook;
pub use registry::{ComponentDefinition, ComponentRegistry, RegistryError};

#[cfg(test)]
#[path = "helpers_test.rs"]
pub(crate) mod test_helpers;
