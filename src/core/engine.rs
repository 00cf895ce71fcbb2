use crate::core::registry::{Direction, TypeRegistry};
use crate::core::{deserializer, instantiate, pipeline, serializer};
use crate::domain::model::{AttributeDescriptor, ModelCatalog, ModelRef};
use crate::domain::value::Value;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

/// Per-call traversal options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalOptions {
    /// Deepest nested-object level that is still traversed. Deeper object
    /// attributes are emitted as `null`. `None` means unlimited.
    pub depth: Option<usize>,
}

impl TraversalOptions {
    pub fn with_depth(depth: usize) -> Self {
        Self { depth: Some(depth) }
    }
}

/// 序列化引擎
///
/// Owns the type registry and the model catalog, both fixed once built.
/// Each traversal keeps its own ancestor stack and index, so one engine can
/// serve any number of calls, from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct Oatmeal {
    registry: TypeRegistry,
    catalog: ModelCatalog,
}

impl Oatmeal {
    pub fn new(registry: TypeRegistry, catalog: ModelCatalog) -> Self {
        tracing::debug!(
            "Engine ready with {} type(s) and {} model(s)",
            registry.type_names().len(),
            catalog.len()
        );
        Self { registry, catalog }
    }

    /// Built-in types and the given models.
    pub fn with_catalog(catalog: ModelCatalog) -> Self {
        Self::new(TypeRegistry::with_builtins(), catalog)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn serialize(&self, data: &Value, model: impl Into<ModelRef>, options: &TraversalOptions) -> Result<Value> {
        let model = model.into();
        let _span = tracing::debug_span!("serialize", model = %model.name()).entered();
        tracing::debug!("Serializing {} with {:?}", data.type_name(), options);

        serializer::serialize(&self.registry, &self.catalog, data, &model, options)
    }

    pub fn deserialize(&self, raw: &Value, model: impl Into<ModelRef>, options: &TraversalOptions) -> Result<Value> {
        let model = model.into();
        let _span = tracing::debug_span!("deserialize", model = %model.name()).entered();
        tracing::debug!("Deserializing {} with {:?}", raw.type_name(), options);

        deserializer::deserialize(&self.registry, &self.catalog, raw, &model, options)
    }

    pub fn instantiate_value(&self, type_name: &str, data: Value) -> Value {
        instantiate::instantiate_value(&self.registry, type_name, data)
    }

    pub fn validate(&self, value: &Value, attr: &AttributeDescriptor, direction: Direction) -> bool {
        pipeline::validate(&self.registry, value, attr, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ModelDefinition;
    use serde_json::json;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_is_shareable() {
        assert_send_sync::<Oatmeal>();
    }

    #[test]
    fn test_inline_model_round_trip() {
        let engine = Oatmeal::with_catalog(ModelCatalog::new());
        let model = ModelDefinition::new("Reading")
            .attribute("value", AttributeDescriptor::primitive("float"))
            .attribute("ok", AttributeDescriptor::primitive("boolean"));

        let data = Value::from_json(json!({"value": "2.5", "ok": true}));
        let wire = engine.serialize(&data, model.clone(), &TraversalOptions::default()).unwrap();
        assert_eq!(wire.to_json(), json!({"@@type": "Reading", "value": 2.5, "ok": true}));

        let back = engine.deserialize(&wire, model, &TraversalOptions::default()).unwrap();
        assert_eq!(back.to_json(), json!({"value": 2.5, "ok": true}));
    }

    #[test]
    fn test_options_from_json() {
        let options: TraversalOptions = serde_json::from_value(json!({"depth": 2})).unwrap();
        assert_eq!(options, TraversalOptions::with_depth(2));
    }
}
