use crate::core::clone::{deep_clone, CloneOptions};
use crate::core::context::TraversalContext;
use crate::core::engine::TraversalOptions;
use crate::core::instantiate::instantiate_value;
use crate::core::pipeline;
use crate::core::registry::{Direction, TypeRegistry};
use crate::domain::model::{AttributeDescriptor, AttributeKind, ModelDefinition, ModelRef};
use crate::domain::ports::ModelResolver;
use crate::domain::value::{Node, Value, COMPUTED_PREFIX, TYPE_TAG};
use crate::utils::error::Result;
use std::sync::Arc;

/// Converts a live object graph into its wire form.
///
/// The input is deep-cloned first; the caller's graph is never touched.
/// Every object node gets a type tag with its model name, computed
/// attributes are written under `@name`, and parent attributes become links
/// to the nearest ancestor node of the referenced model.
pub fn serialize(
    registry: &TypeRegistry,
    resolver: &dyn ModelResolver,
    data: &Value,
    model: &ModelRef,
    options: &TraversalOptions,
) -> Result<Value> {
    let data = if data.is_primitive() {
        data.clone()
    } else {
        deep_clone(data, &CloneOptions::default())
    };

    let mut serializer = Serializer {
        registry,
        options,
        ctx: TraversalContext::new(resolver),
    };
    let model = serializer.ctx.resolve(model)?;
    let output = serializer.serialize_object(data, model, 0)?;

    tracing::debug!("Serialized {} indexed node(s)", serializer.ctx.indexed_count());
    Ok(output)
}

struct Serializer<'a> {
    registry: &'a TypeRegistry,
    options: &'a TraversalOptions,
    ctx: TraversalContext<'a>,
}

impl Serializer<'_> {
    fn serialize_object(&mut self, data: Value, model: Arc<ModelDefinition>, level: usize) -> Result<Value> {
        let node = match data {
            Value::Object(node) => node,
            // null, links and non-object data are not traversed
            other => return Ok(other),
        };

        self.ctx.enter(node.clone(), Arc::clone(&model));
        self.ctx.record(&model.name, &node);
        node.set(TYPE_TAG, model.name.clone());

        let result = self.serialize_attributes(&node, &model, level);
        self.ctx.leave();
        result?;

        Ok(Value::Object(node))
    }

    fn serialize_attributes(&mut self, node: &Node, model: &ModelDefinition, level: usize) -> Result<()> {
        for (name, attr) in &model.attributes {
            if let Some(compute) = &attr.compute {
                let computed = compute(node);
                node.set(format!("{COMPUTED_PREFIX}{name}"), computed);
                continue;
            }

            let current = node.get(name).unwrap_or(Value::Null);
            let serialized = match &attr.kind {
                AttributeKind::ArrayCollection(nested) => {
                    let nested = self.ctx.resolve(nested)?;
                    self.serialize_collection(current, nested, level)?
                }
                AttributeKind::Object(nested) => {
                    let nested = self.ctx.resolve(nested)?;
                    if self.options.depth.is_some_and(|depth| level > depth) {
                        Value::Null
                    } else {
                        match current {
                            Value::Object(_) | Value::Link(_) => self.serialize_object(current, nested, level + 1)?,
                            _ => Value::Null,
                        }
                    }
                }
                AttributeKind::Parent(nested) => {
                    let nested = self.ctx.resolve(nested)?;
                    match self.ctx.nearest_ancestor(&nested.name) {
                        Some(ancestor) => Value::Link(ancestor.downgrade()),
                        None => Value::Null,
                    }
                }
                AttributeKind::Primitive(_) => self.serialize_value(current, attr),
            };

            node.set(name.clone(), serialized);
        }
        Ok(())
    }

    fn serialize_collection(&mut self, current: Value, nested: Arc<ModelDefinition>, level: usize) -> Result<Value> {
        let items = match current {
            Value::Array(items) => items.borrow().clone(),
            _ => Vec::new(),
        };

        let mut serialized = Vec::with_capacity(items.len());
        for item in items {
            serialized.push(self.serialize_object(item, Arc::clone(&nested), level)?);
        }
        Ok(Value::array(serialized))
    }

    fn serialize_value(&self, value: Value, attr: &AttributeDescriptor) -> Value {
        let direction = Direction::Serialize;
        let value = pipeline::coerce_shape(self.registry, value, attr);

        if value.is_null() || !pipeline::validate(self.registry, &value, attr, direction) {
            return pipeline::fallback_value(self.registry, attr, direction);
        }

        let type_name = attr.type_name();
        let instance = instantiate_value(self.registry, type_name, value);
        let serialized = pipeline::apply_transforms(self.registry, instance, attr, direction);

        if let Value::Object(node) = &serialized {
            node.set(TYPE_TAG, type_name);
        }
        serialized
    }
}
