use crate::core::{builtins, handlers};
use crate::domain::model::{AttributeDescriptor, Literal};
use crate::domain::value::Value;
use crate::utils::error::{OatmealError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// `(value, attribute) -> value` step of a serializer or deserializer chain.
pub type TransformFn = Arc<dyn Fn(Value, &AttributeDescriptor) -> Value + Send + Sync>;

/// `(value, attribute) -> bool` step of a validator chain.
pub type ValidatorFn = Arc<dyn Fn(&Value, &AttributeDescriptor) -> bool + Send + Sync>;

/// Builds an instance of a type from raw data.
pub type ConstructorFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Which half of a type's behaviour a traversal uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Serialize,
    Deserialize,
}

/// Per-type behaviour.
#[derive(Clone, Default)]
pub struct TypeDescriptor {
    pub default_value: Option<Literal>,
    pub constructor: Option<ConstructorFn>,
    pub serializers: Vec<TransformFn>,
    pub deserializers: Vec<TransformFn>,
    pub serializer_validators: Vec<ValidatorFn>,
    pub deserializer_validators: Vec<ValidatorFn>,
}

impl TypeDescriptor {
    pub fn transforms(&self, direction: Direction) -> &[TransformFn] {
        match direction {
            Direction::Serialize => &self.serializers,
            Direction::Deserialize => &self.deserializers,
        }
    }

    pub fn validators(&self, direction: Direction) -> &[ValidatorFn] {
        match direction {
            Direction::Serialize => &self.serializer_validators,
            Direction::Deserialize => &self.deserializer_validators,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("default_value", &self.default_value)
            .field("constructor", &self.constructor.is_some())
            .field("serializers", &self.serializers.len())
            .field("deserializers", &self.deserializers.len())
            .field("serializer_validators", &self.serializer_validators.len())
            .field("deserializer_validators", &self.deserializer_validators.len())
            .finish()
    }
}

/// 型別註冊表
///
/// Built once during start-up and then shared read-only by every traversal.
/// Chains only grow: there is no removal.
#[derive(Clone, Default, Debug)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// An empty registry, without the built-in primitive types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with boolean, integer, float, string, datetime and email installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::install(&mut registry);
        registry
    }

    fn entry(&mut self, type_name: &str) -> &mut TypeDescriptor {
        self.types.entry(type_name.to_string()).or_default()
    }

    pub fn set_default_value(&mut self, type_name: &str, value: impl Into<Literal>) -> &mut Self {
        self.entry(type_name).default_value = Some(value.into());
        self
    }

    pub fn set_constructor<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.entry(type_name).constructor = Some(Arc::new(constructor));
        self
    }

    pub fn add_serializer<F>(&mut self, type_name: &str, serializer: F) -> &mut Self
    where
        F: Fn(Value, &AttributeDescriptor) -> Value + Send + Sync + 'static,
    {
        self.entry(type_name).serializers.push(Arc::new(serializer));
        self
    }

    pub fn add_deserializer<F>(&mut self, type_name: &str, deserializer: F) -> &mut Self
    where
        F: Fn(Value, &AttributeDescriptor) -> Value + Send + Sync + 'static,
    {
        self.entry(type_name).deserializers.push(Arc::new(deserializer));
        self
    }

    pub fn add_serializer_validator<F>(&mut self, type_name: &str, validator: F) -> &mut Self
    where
        F: Fn(&Value, &AttributeDescriptor) -> bool + Send + Sync + 'static,
    {
        self.entry(type_name)
            .serializer_validators
            .push(Arc::new(validator));
        self
    }

    pub fn add_deserializer_validator<F>(&mut self, type_name: &str, validator: F) -> &mut Self
    where
        F: Fn(&Value, &AttributeDescriptor) -> bool + Send + Sync + 'static,
    {
        self.entry(type_name)
            .deserializer_validators
            .push(Arc::new(validator));
        self
    }

    /// 以名稱註冊轉換函式，名稱必須存在於 handler 目錄中
    pub fn add_named_transform(
        &mut self,
        type_name: &str,
        direction: Direction,
        handler: &str,
    ) -> Result<&mut Self> {
        let transform = handlers::transform(handler)
            .ok_or_else(|| OatmealError::invalid_handler(type_name, handler))?;

        let descriptor = self.entry(type_name);
        match direction {
            Direction::Serialize => descriptor.serializers.push(transform),
            Direction::Deserialize => descriptor.deserializers.push(transform),
        }
        Ok(self)
    }

    /// 以名稱註冊驗證函式
    pub fn add_named_validator(
        &mut self,
        type_name: &str,
        direction: Direction,
        handler: &str,
    ) -> Result<&mut Self> {
        let validator = handlers::validator(handler)
            .ok_or_else(|| OatmealError::invalid_handler(type_name, handler))?;

        let descriptor = self.entry(type_name);
        match direction {
            Direction::Serialize => descriptor.serializer_validators.push(validator),
            Direction::Deserialize => descriptor.deserializer_validators.push(validator),
        }
        Ok(self)
    }

    /// 以名稱設定建構函式
    pub fn set_named_constructor(&mut self, type_name: &str, handler: &str) -> Result<&mut Self> {
        let constructor = handlers::constructor(handler)
            .ok_or_else(|| OatmealError::invalid_handler(type_name, handler))?;
        self.entry(type_name).constructor = Some(constructor);
        Ok(self)
    }

    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.keys().cloned().collect();
        names.sort();
        names
    }

    /// The registered default, materialised. `Null` when none is set.
    pub fn default_value(&self, type_name: &str) -> Value {
        self.descriptor(type_name)
            .and_then(|d| d.default_value.as_ref())
            .map(Literal::to_value)
            .unwrap_or(Value::Null)
    }

    /// Whether the registered default exists and is primitive.
    pub fn has_primitive_default(&self, type_name: &str) -> bool {
        self.descriptor(type_name)
            .and_then(|d| d.default_value.as_ref())
            .is_some_and(Literal::is_primitive)
    }

    pub fn constructor(&self, type_name: &str) -> Option<&ConstructorFn> {
        self.descriptor(type_name).and_then(|d| d.constructor.as_ref())
    }

    pub fn transforms(&self, type_name: &str, direction: Direction) -> &[TransformFn] {
        self.descriptor(type_name)
            .map(|d| d.transforms(direction))
            .unwrap_or(&[])
    }

    pub fn validators(&self, type_name: &str, direction: Direction) -> &[ValidatorFn] {
        self.descriptor(type_name)
            .map(|d| d.validators(direction))
            .unwrap_or(&[])
    }
}
