use crate::core::clone::{deep_clone, CloneOptions};
use crate::core::context::TraversalContext;
use crate::core::engine::TraversalOptions;
use crate::core::pipeline;
use crate::core::registry::{Direction, TypeRegistry};
use crate::domain::model::{AttributeDescriptor, AttributeKind, ModelDefinition, ModelRef};
use crate::domain::ports::ModelResolver;
use crate::domain::value::{Node, Value, COMPUTED_PREFIX, TYPE_TAG};
use crate::utils::error::Result;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Restores native values from a serialized graph.
///
/// Only attributes present on the raw node are visited, in sorted order;
/// a computed key `@name` counts as presence of `name`. Parent attributes
/// collapse to `{ id }` stubs. Object attributes are always restored in
/// full; `options.depth` only bounds serialization.
pub fn deserialize(
    registry: &TypeRegistry,
    resolver: &dyn ModelResolver,
    raw: &Value,
    model: &ModelRef,
    _options: &TraversalOptions,
) -> Result<Value> {
    let data = if raw.is_primitive() {
        raw.clone()
    } else {
        deep_clone(raw, &CloneOptions::default())
    };

    let mut deserializer = Deserializer {
        registry,
        ctx: TraversalContext::new(resolver),
    };
    let model = deserializer.ctx.resolve(model)?;
    deserializer.deserialize_object(data, model)
}

struct Deserializer<'a> {
    registry: &'a TypeRegistry,
    ctx: TraversalContext<'a>,
}

impl Deserializer<'_> {
    fn deserialize_object(&mut self, data: Value, model: Arc<ModelDefinition>) -> Result<Value> {
        let node = match data {
            Value::Object(node) => node,
            other => return Ok(other),
        };

        node.remove(TYPE_TAG);
        if model.is_opaque() {
            return Ok(Value::Object(node));
        }

        for name in present_attributes(&node, &model) {
            let Some(attr) = model.get_attribute(&name) else {
                continue;
            };

            let computed_key = format!("{COMPUTED_PREFIX}{name}");
            if let Some(computed) = node.remove(&computed_key) {
                if let Some(apply) = &attr.apply {
                    apply(&node, computed);
                    continue;
                }
                if !node.contains(&name) {
                    continue;
                }
            }

            let current = node.get(&name);
            let restored = match &attr.kind {
                AttributeKind::ArrayCollection(nested) => {
                    let nested = self.ctx.resolve(nested)?;
                    let items = match current {
                        Some(Value::Array(items)) => items.borrow().clone(),
                        _ => Vec::new(),
                    };

                    let mut restored = Vec::with_capacity(items.len());
                    for item in items {
                        restored.push(self.deserialize_object(item, Arc::clone(&nested))?);
                    }
                    Value::array(restored)
                }
                AttributeKind::Object(nested) => {
                    let nested = self.ctx.resolve(nested)?;
                    match current {
                        Some(value @ Value::Object(_)) => self.deserialize_object(value, nested)?,
                        Some(link @ Value::Link(_)) => link,
                        _ => Value::Null,
                    }
                }
                AttributeKind::Parent(nested) => {
                    self.ctx.resolve(nested)?;
                    match current.and_then(|value| value.as_node()) {
                        Some(parent) => Value::Object(Node::from_pairs([("id", parent.id())])),
                        None => Value::Null,
                    }
                }
                AttributeKind::Primitive(type_name) => {
                    let value = current.unwrap_or_else(|| self.registry.default_value(type_name));
                    self.deserialize_value(value, attr)
                }
            };

            node.set(name, restored);
        }

        Ok(Value::Object(node))
    }

    fn deserialize_value(&self, value: Value, attr: &AttributeDescriptor) -> Value {
        let direction = Direction::Deserialize;
        let value = pipeline::coerce_shape(self.registry, value, attr);

        if value.is_null() || !pipeline::validate(self.registry, &value, attr, direction) {
            return pipeline::fallback_value(self.registry, attr, direction);
        }

        let restored = pipeline::apply_transforms(self.registry, value, attr, direction);
        if let Value::Object(node) = &restored {
            node.remove(TYPE_TAG);
        }
        restored
    }
}

/// Declared attribute names present on the node, plain or computed, sorted.
fn present_attributes(node: &Node, model: &ModelDefinition) -> BTreeSet<String> {
    node.keys()
        .into_iter()
        .filter_map(|key| {
            let name = key.strip_prefix(COMPUTED_PREFIX).unwrap_or(&key);
            model.get_attribute(name).map(|_| name.to_string())
        })
        .collect()
}
