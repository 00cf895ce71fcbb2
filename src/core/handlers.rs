//! Named handlers, so types can be assembled from a schema file.

use crate::core::builtins;
use crate::core::clone::{deep_clone, CloneOptions};
use crate::core::registry::{ConstructorFn, TransformFn, ValidatorFn};
use crate::domain::model::AttributeDescriptor;
use crate::domain::value::Value;
use std::sync::Arc;

pub const TRANSFORM_NAMES: &[&str] = &[
    "trim",
    "lowercase",
    "uppercase",
    "to_string",
    "parse_int",
    "parse_float",
    "parse_bool",
    "datetime",
    "format_datetime",
];

pub const VALIDATOR_NAMES: &[&str] = &[
    "always",
    "is_string",
    "is_number",
    "is_integer",
    "is_email",
    "is_datetime",
    "non_empty",
];

pub const CONSTRUCTOR_NAMES: &[&str] = &["clone", "identity"];

/// Every name the catalog knows, for error messages.
pub const HANDLER_NAMES: &[&str] = &[
    "trim",
    "lowercase",
    "uppercase",
    "to_string",
    "parse_int",
    "parse_float",
    "parse_bool",
    "datetime",
    "format_datetime",
    "always",
    "is_string",
    "is_number",
    "is_integer",
    "is_email",
    "is_datetime",
    "non_empty",
    "clone",
    "identity",
];

fn map_string(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

pub fn transform(name: &str) -> Option<TransformFn> {
    let transform: TransformFn = match name {
        "trim" => Arc::new(|v: Value, _: &AttributeDescriptor| map_string(v, |s| s.trim().to_string())),
        "lowercase" => Arc::new(|v: Value, _: &AttributeDescriptor| map_string(v, str::to_lowercase)),
        "uppercase" => Arc::new(|v: Value, _: &AttributeDescriptor| map_string(v, str::to_uppercase)),
        "to_string" => Arc::new(builtins::to_string),
        "parse_int" => Arc::new(builtins::parse_integer),
        "parse_float" => Arc::new(builtins::parse_float),
        "parse_bool" => Arc::new(builtins::parse_boolean),
        "datetime" => Arc::new(builtins::to_datetime),
        "format_datetime" => Arc::new(builtins::format_datetime),
        _ => return None,
    };
    Some(transform)
}

pub fn validator(name: &str) -> Option<ValidatorFn> {
    let validator: ValidatorFn = match name {
        "always" => Arc::new(builtins::is_boolean),
        "is_string" => Arc::new(builtins::is_string),
        "is_number" => Arc::new(builtins::is_number),
        "is_integer" => Arc::new(builtins::is_integer),
        "is_email" => Arc::new(builtins::is_email),
        "is_datetime" => Arc::new(builtins::is_datetime),
        "non_empty" => Arc::new(|v: &Value, _: &AttributeDescriptor| match v {
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) | Value::Set(items) => !items.borrow().is_empty(),
            Value::Object(node) => !node.is_empty(),
            Value::Null => false,
            _ => true,
        }),
        _ => return None,
    };
    Some(validator)
}

pub fn constructor(name: &str) -> Option<ConstructorFn> {
    let constructor: ConstructorFn = match name {
        "clone" => Arc::new(|data: Value| deep_clone(&data, &CloneOptions::default())),
        "identity" => Arc::new(|data: Value| data),
        _ => return None,
    };
    Some(constructor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_name_resolves() {
        for name in TRANSFORM_NAMES {
            assert!(transform(name).is_some(), "transform {name}");
        }
        for name in VALIDATOR_NAMES {
            assert!(validator(name).is_some(), "validator {name}");
        }
        for name in CONSTRUCTOR_NAMES {
            assert!(constructor(name).is_some(), "constructor {name}");
        }
        assert_eq!(
            HANDLER_NAMES.len(),
            TRANSFORM_NAMES.len() + VALIDATOR_NAMES.len() + CONSTRUCTOR_NAMES.len()
        );
    }

    #[test]
    fn test_string_transforms() {
        let attr = AttributeDescriptor::primitive("slug");
        let trim = transform("trim").unwrap();
        let lower = transform("lowercase").unwrap();

        assert_eq!(lower(trim(Value::from("  Hello "), &attr), &attr), Value::from("hello"));
        assert_eq!(trim(Value::from(3), &attr), Value::from(3));
    }

    #[test]
    fn test_non_empty() {
        let attr = AttributeDescriptor::primitive("slug");
        let non_empty = validator("non_empty").unwrap();
        assert!(non_empty(&Value::from("x"), &attr));
        assert!(!non_empty(&Value::from("  "), &attr));
        assert!(!non_empty(&Value::array(vec![]), &attr));
    }

    #[test]
    fn test_unknown_names() {
        assert!(transform("kebab").is_none());
        assert!(validator("is_kebab").is_none());
        assert!(constructor("new").is_none());
    }
}
