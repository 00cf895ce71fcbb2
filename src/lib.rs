pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::SchemaConfig;

pub use crate::core::clone::{deep_clone, CloneOptions};
pub use crate::core::engine::{Oatmeal, TraversalOptions};
pub use crate::core::registry::{Direction, TypeRegistry};
pub use crate::domain::model::{AttributeDescriptor, AttributeKind, Literal, ModelCatalog, ModelDefinition, ModelRef};
pub use crate::domain::value::{Deferred, Link, Node, Settlement, Value, COMPUTED_PREFIX, TYPE_TAG};
pub use crate::utils::error::{OatmealError, Result};
