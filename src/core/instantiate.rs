use crate::core::clone::{deep_clone, CloneOptions};
use crate::core::registry::TypeRegistry;
use crate::domain::value::Value;

/// Builds a concrete instance of `type_name` from raw data.
///
/// Primitive data, and data for types whose registered default is primitive,
/// comes back unchanged. Otherwise the registered constructor is used, or the
/// data is deep-cloned when there is none. An object instance always carries
/// an `id` property, `null` when the data had none.
pub fn instantiate_value(registry: &TypeRegistry, type_name: &str, data: Value) -> Value {
    if data.is_primitive() || registry.has_primitive_default(type_name) {
        return data;
    }

    let instance = match registry.constructor(type_name) {
        Some(constructor) => constructor(data),
        None => deep_clone(&data, &CloneOptions::default()),
    };

    if let Value::Object(node) = &instance {
        if !node.contains("id") {
            node.set("id", Value::Null);
        }
    }

    instance
}
