use crate::domain::ports::ModelResolver;
use crate::domain::value::{Node, Value};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Getter of a computed attribute.
pub type ComputeFn = Arc<dyn Fn(&Node) -> Value + Send + Sync>;

/// Setter of a computed attribute: feeds a derived value back onto the node.
pub type ApplyFn = Arc<dyn Fn(&Node, Value) + Send + Sync>;

/// Thread-safe seed for default values.
///
/// Registries and models are shared process-wide, while `Value` graphs are
/// per-call, so defaults are kept as literals and materialised on use. Every
/// use of a composite default yields a fresh instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
            Literal::DateTime(dt) => Value::DateTime(*dt),
            Literal::Json(json) => Value::from_json(json.clone()),
        }
    }

    pub fn is_primitive(&self) -> bool {
        match self {
            Literal::Json(json) => !(json.is_object() || json.is_array()),
            _ => true,
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Integer(i as i64)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(dt: DateTime<Utc>) -> Self {
        Literal::DateTime(dt)
    }
}

impl From<serde_json::Value> for Literal {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Literal::Null,
            serde_json::Value::Bool(b) => Literal::Bool(b),
            serde_json::Value::String(s) => Literal::String(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Literal::Integer(i),
                None => Literal::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            other => Literal::Json(other),
        }
    }
}

/// Reference to a nested model, either inline or by registered name.
#[derive(Clone)]
pub enum ModelRef {
    Inline(Arc<ModelDefinition>),
    Named(String),
}

impl ModelRef {
    pub fn name(&self) -> &str {
        match self {
            ModelRef::Inline(model) => &model.name,
            ModelRef::Named(name) => name,
        }
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Inline(model) => write!(f, "Inline({})", model.name),
            ModelRef::Named(name) => write!(f, "Named({})", name),
        }
    }
}

impl From<&str> for ModelRef {
    fn from(name: &str) -> Self {
        ModelRef::Named(name.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(name: String) -> Self {
        ModelRef::Named(name)
    }
}

impl From<ModelDefinition> for ModelRef {
    fn from(model: ModelDefinition) -> Self {
        ModelRef::Inline(Arc::new(model))
    }
}

impl From<Arc<ModelDefinition>> for ModelRef {
    fn from(model: Arc<ModelDefinition>) -> Self {
        ModelRef::Inline(model)
    }
}

pub const OBJECT_TYPE: &str = "object";
pub const ARRAY_COLLECTION_TYPE: &str = "array-collection";
pub const PARENT_TYPE: &str = "parent";

/// 屬性種類：基本型別或指向巢狀模型的三種關係
#[derive(Clone, Debug)]
pub enum AttributeKind {
    Primitive(String),
    Object(ModelRef),
    ArrayCollection(ModelRef),
    Parent(ModelRef),
}

impl AttributeKind {
    /// The type name used for registry lookup and type tags.
    pub fn type_name(&self) -> &str {
        match self {
            AttributeKind::Primitive(name) => name,
            AttributeKind::Object(_) => OBJECT_TYPE,
            AttributeKind::ArrayCollection(_) => ARRAY_COLLECTION_TYPE,
            AttributeKind::Parent(_) => PARENT_TYPE,
        }
    }

    pub fn model(&self) -> Option<&ModelRef> {
        match self {
            AttributeKind::Primitive(_) => None,
            AttributeKind::Object(m) | AttributeKind::ArrayCollection(m) | AttributeKind::Parent(m) => {
                Some(m)
            }
        }
    }
}

#[derive(Clone)]
pub struct AttributeDescriptor {
    pub kind: AttributeKind,
    pub nullable: bool,
    pub default: Option<Literal>,
    pub format: Option<String>,
    pub required: Vec<String>,
    pub compute: Option<ComputeFn>,
    pub apply: Option<ApplyFn>,
}

impl AttributeDescriptor {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            nullable: true,
            default: None,
            format: None,
            required: Vec::new(),
            compute: None,
            apply: None,
        }
    }

    pub fn primitive(type_name: impl Into<String>) -> Self {
        Self::new(AttributeKind::Primitive(type_name.into()))
    }

    pub fn object(model: impl Into<ModelRef>) -> Self {
        Self::new(AttributeKind::Object(model.into()))
    }

    pub fn array_collection(model: impl Into<ModelRef>) -> Self {
        Self::new(AttributeKind::ArrayCollection(model.into()))
    }

    pub fn parent(model: impl Into<ModelRef>) -> Self {
        Self::new(AttributeKind::Parent(model.into()))
    }

    pub fn not_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: impl Into<Literal>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn computed<F>(mut self, compute: F) -> Self
    where
        F: Fn(&Node) -> Value + Send + Sync + 'static,
    {
        self.compute = Some(Arc::new(compute));
        self
    }

    pub fn with_setter<F>(mut self, apply: F) -> Self
    where
        F: Fn(&Node, Value) + Send + Sync + 'static,
    {
        self.apply = Some(Arc::new(apply));
        self
    }

    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("format", &self.format)
            .field("required", &self.required)
            .field("computed", &self.compute.is_some())
            .field("setter", &self.apply.is_some())
            .finish()
    }
}

/// A named schema. Attribute order is declaration order.
#[derive(Clone, Debug)]
pub struct ModelDefinition {
    pub name: String,
    pub attributes: Vec<(String, AttributeDescriptor)>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, descriptor: AttributeDescriptor) -> Self {
        self.attributes.push((name.into(), descriptor));
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    /// Models without attributes pass their data through untouched.
    pub fn is_opaque(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// 已註冊模型的目錄
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: HashMap<String, Arc<ModelDefinition>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model and every inline model nested in it.
    pub fn register(&mut self, model: impl Into<Arc<ModelDefinition>>) -> Arc<ModelDefinition> {
        let model = model.into();
        self.register_nested(&model);
        model
    }

    fn register_nested(&mut self, model: &Arc<ModelDefinition>) {
        if self.models.contains_key(&model.name) {
            return;
        }
        self.models.insert(model.name.clone(), Arc::clone(model));

        for (_, descriptor) in &model.attributes {
            if let Some(ModelRef::Inline(nested)) = descriptor.kind.model() {
                self.register_nested(nested);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDefinition>> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelResolver for ModelCatalog {
    fn resolve_model(&self, name: &str) -> Option<Arc<ModelDefinition>> {
        self.get(name)
    }
}
