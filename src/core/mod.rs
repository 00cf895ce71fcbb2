pub mod builtins;
pub mod clone;
pub mod context;
pub mod deserializer;
pub mod engine;
pub mod handlers;
pub mod instantiate;
pub mod pipeline;
pub mod registry;
pub mod serializer;

pub use crate::domain::model::{AttributeDescriptor, AttributeKind, ModelCatalog, ModelDefinition, ModelRef};
pub use crate::domain::ports::ModelResolver;
pub use crate::domain::value::{Node, Value};
pub use crate::utils::error::Result;
