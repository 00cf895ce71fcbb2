//! Validation and transform chains applied to primitive-like attributes.

use crate::core::registry::{Direction, TypeRegistry};
use crate::domain::model::{AttributeDescriptor, Literal};
use crate::domain::value::Value;

/// Runs the type's validator chain. `null` is always valid: it means
/// "absent", which is not the same as "invalid".
pub fn validate(registry: &TypeRegistry, value: &Value, attr: &AttributeDescriptor, direction: Direction) -> bool {
    let validators = registry.validators(attr.type_name(), direction);
    if validators.is_empty() {
        return true;
    }

    validators.iter().all(|validator| validator(value, attr)) || value.is_null()
}

/// The value emitted when an attribute's input is rejected or `null`.
///
/// Nullable attributes fall back to `null`. Otherwise the attribute's own
/// default is used when it validates, else the type's registered default.
pub fn fallback_value(registry: &TypeRegistry, attr: &AttributeDescriptor, direction: Direction) -> Value {
    if attr.nullable {
        return Value::Null;
    }

    match attr.default.as_ref().map(Literal::to_value) {
        Some(declared) if !declared.is_null() && validate(registry, &declared, attr, direction) => declared,
        _ => registry.default_value(attr.type_name()),
    }
}

/// Feeds `value` through the type's transform chain, front to back.
pub fn apply_transforms(
    registry: &TypeRegistry,
    value: Value,
    attr: &AttributeDescriptor,
    direction: Direction,
) -> Value {
    registry
        .transforms(attr.type_name(), direction)
        .iter()
        .fold(value, |value, transform| transform(value, attr))
}

/// Replaces a composite value given to a primitive type with the type's default.
pub fn coerce_shape(registry: &TypeRegistry, value: Value, attr: &AttributeDescriptor) -> Value {
    let type_name = attr.type_name();
    if value.is_composite() && registry.has_primitive_default(type_name) {
        tracing::debug!("Composite value for primitive type \"{}\" replaced by default", type_name);
        return registry.default_value(type_name);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins()
    }

    #[test]
    fn test_null_is_always_valid() {
        let attr = AttributeDescriptor::primitive("integer");
        assert!(validate(&registry(), &Value::Null, &attr, Direction::Serialize));
        assert!(!validate(&registry(), &Value::from("abc"), &attr, Direction::Serialize));
    }

    #[test]
    fn test_types_without_validators_accept_anything() {
        let attr = AttributeDescriptor::primitive("unregistered");
        assert!(validate(&registry(), &Value::array(vec![]), &attr, Direction::Deserialize));
    }

    #[test]
    fn test_chain_is_a_conjunction() {
        let mut registry = registry();
        registry
            .add_serializer_validator("short", |v, _| v.as_str().is_some())
            .add_serializer_validator("short", |v, _| v.as_str().is_some_and(|s| s.len() < 4));

        let attr = AttributeDescriptor::primitive("short");
        assert!(validate(&registry, &Value::from("abc"), &attr, Direction::Serialize));
        assert!(!validate(&registry, &Value::from("abcdef"), &attr, Direction::Serialize));
        assert!(validate(&registry, &Value::from("abcdef"), &attr, Direction::Deserialize));
    }

    #[test]
    fn test_fallback_value() {
        let registry = registry();

        let nullable = AttributeDescriptor::primitive("integer").with_default(5);
        assert!(fallback_value(&registry, &nullable, Direction::Serialize).is_null());

        let declared = AttributeDescriptor::primitive("integer").not_nullable().with_default(5);
        assert_eq!(fallback_value(&registry, &declared, Direction::Serialize), Value::from(5));

        let invalid = AttributeDescriptor::primitive("integer").not_nullable().with_default("five");
        assert_eq!(fallback_value(&registry, &invalid, Direction::Serialize), Value::from(0));

        let missing = AttributeDescriptor::primitive("string").not_nullable();
        assert_eq!(fallback_value(&registry, &missing, Direction::Serialize), Value::from(""));
    }

    #[test]
    fn test_apply_transforms_and_coerce_shape() {
        let registry = registry();
        let attr = AttributeDescriptor::primitive("integer");

        assert_eq!(
            apply_transforms(&registry, Value::from("41"), &attr, Direction::Serialize),
            Value::from(41)
        );
        assert_eq!(
            coerce_shape(&registry, Value::array(vec![Value::from(1)]), &attr),
            Value::from(0)
        );
        assert_eq!(coerce_shape(&registry, Value::from(9), &attr), Value::from(9));
    }
}
