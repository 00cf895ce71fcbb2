use crate::domain::model::ModelDefinition;
use std::sync::Arc;

/// Source of named model definitions.
pub trait ModelResolver {
    fn resolve_model(&self, name: &str) -> Option<Arc<ModelDefinition>>;
}

impl<R: ModelResolver + ?Sized> ModelResolver for &R {
    fn resolve_model(&self, name: &str) -> Option<Arc<ModelDefinition>> {
        (**self).resolve_model(name)
    }
}
