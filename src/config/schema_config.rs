use crate::core::engine::TraversalOptions;
use crate::core::handlers;
use crate::core::registry::{Direction, TypeRegistry};
use crate::domain::model::{
    AttributeDescriptor, Literal, ModelCatalog, ModelDefinition, ModelRef, ARRAY_COLLECTION_TYPE, OBJECT_TYPE,
    PARENT_TYPE,
};
use crate::domain::value::{Node, Value};
use crate::utils::error::{OatmealError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub schema: Option<SchemaInfo>,
    #[serde(default)]
    pub options: OptionsConfig,
    #[serde(default)]
    pub types: Vec<TypeConfig>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsConfig {
    pub depth: Option<usize>,
}

/// A user-defined type assembled from named handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeConfig {
    pub name: String,
    pub default: Option<toml::Value>,
    pub constructor: Option<String>,
    #[serde(default)]
    pub serializers: Vec<String>,
    #[serde(default)]
    pub deserializers: Vec<String>,
    #[serde(default)]
    pub serializer_validators: Vec<String>,
    #[serde(default)]
    pub deserializer_validators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    pub r#type: String,
    pub model: Option<String>,
    pub nullable: Option<bool>,
    pub default: Option<toml::Value>,
    pub format: Option<String>,
    #[serde(default)]
    pub require: Vec<String>,
    pub computed: Option<ComputedConfig>,
}

/// A computed attribute that joins other attributes into one string and
/// splits an incoming string back onto them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedConfig {
    pub join: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    " ".to_string()
}

fn is_nested_kind(type_name: &str) -> bool {
    matches!(type_name, OBJECT_TYPE | ARRAY_COLLECTION_TYPE | PARENT_TYPE)
}

fn literal_from_toml(value: &toml::Value) -> Result<Literal> {
    match value {
        toml::Value::Datetime(dt) => Ok(Literal::String(dt.to_string())),
        other => Ok(Literal::from(serde_json::to_value(other)?)),
    }
}

impl SchemaConfig {
    /// 從 TOML 檔案載入 schema
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(OatmealError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析 schema
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| OatmealError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATE_FORMAT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| OatmealError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|model| model.name == name)
    }

    pub fn traversal_options(&self) -> TraversalOptions {
        TraversalOptions {
            depth: self.options.depth,
        }
    }

    /// 驗證 schema 的合理性
    pub fn validate_config(&self) -> Result<()> {
        let builtin_names = TypeRegistry::with_builtins().type_names();
        let known_types: HashSet<&str> = self
            .types
            .iter()
            .map(|t| t.name.as_str())
            .chain(builtin_names.iter().map(String::as_str))
            .collect();

        for type_config in &self.types {
            validation::validate_non_empty_string("types.name", &type_config.name)?;
            validate_handlers(type_config)?;
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            validation::validate_non_empty_string("models.name", &model.name)?;
            if !seen.insert(model.name.as_str()) {
                return Err(OatmealError::ConfigValidationError {
                    field: format!("models.{}", model.name),
                    message: "Model is defined more than once".to_string(),
                });
            }
        }

        for model in &self.models {
            let attribute_names: HashSet<&str> = model.attributes.iter().map(|a| a.name.as_str()).collect();

            for attr in &model.attributes {
                let field = format!("models.{}.attributes.{}", model.name, attr.name);
                validation::validate_non_empty_string(&field, &attr.name)?;

                if is_nested_kind(&attr.r#type) {
                    let nested = validation::validate_required_field(&format!("{field}.model"), &attr.model)?;
                    if self.model(nested).is_none() {
                        return Err(OatmealError::ConfigValidationError {
                            field: format!("{field}.model"),
                            message: format!("Model \"{}\" is not defined in this schema", nested),
                        });
                    }
                } else if !known_types.contains(attr.r#type.as_str()) {
                    return Err(OatmealError::InvalidConfigValueError {
                        field: format!("{field}.type"),
                        value: attr.r#type.clone(),
                        reason: "Unknown type; register it under [[types]]".to_string(),
                    });
                }

                if let Some(computed) = &attr.computed {
                    if computed.join.is_empty() {
                        return Err(OatmealError::MissingConfigError {
                            field: format!("{field}.computed.join"),
                        });
                    }
                    if let Some(missing) = computed.join.iter().find(|name| !attribute_names.contains(name.as_str())) {
                        return Err(OatmealError::InvalidConfigValueError {
                            field: format!("{field}.computed.join"),
                            value: missing.clone(),
                            reason: "Joined attribute is not declared on the model".to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Built-in types plus every `[[types]]` entry.
    pub fn build_registry(&self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::with_builtins();

        for type_config in &self.types {
            let name = type_config.name.as_str();
            if let Some(default) = &type_config.default {
                registry.set_default_value(name, literal_from_toml(default)?);
            }
            if let Some(constructor) = &type_config.constructor {
                registry.set_named_constructor(name, constructor)?;
            }
            for handler in &type_config.serializers {
                registry.add_named_transform(name, Direction::Serialize, handler)?;
            }
            for handler in &type_config.deserializers {
                registry.add_named_transform(name, Direction::Deserialize, handler)?;
            }
            for handler in &type_config.serializer_validators {
                registry.add_named_validator(name, Direction::Serialize, handler)?;
            }
            for handler in &type_config.deserializer_validators {
                registry.add_named_validator(name, Direction::Deserialize, handler)?;
            }
            tracing::debug!("Registered type \"{}\" from schema", name);
        }

        Ok(registry)
    }

    pub fn build_catalog(&self) -> Result<ModelCatalog> {
        let mut catalog = ModelCatalog::new();

        for model in &self.models {
            let mut definition = ModelDefinition::new(model.name.clone());
            for attr in &model.attributes {
                definition = definition.attribute(attr.name.clone(), build_attribute(&model.name, attr)?);
            }
            catalog.register(definition);
        }

        tracing::debug!("Built catalog with {} model(s)", catalog.len());
        Ok(catalog)
    }
}

impl Validate for SchemaConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn validate_handlers(type_config: &TypeConfig) -> Result<()> {
    let name = type_config.name.as_str();

    if let Some(constructor) = &type_config.constructor {
        if handlers::constructor(constructor).is_none() {
            return Err(OatmealError::invalid_handler(name, constructor.as_str()));
        }
    }

    let transforms = type_config.serializers.iter().chain(&type_config.deserializers);
    if let Some(unknown) = transforms.into_iter().find(|h| handlers::transform(h).is_none()) {
        return Err(OatmealError::invalid_handler(name, unknown.as_str()));
    }

    let validators = type_config
        .serializer_validators
        .iter()
        .chain(&type_config.deserializer_validators);
    if let Some(unknown) = validators.into_iter().find(|h| handlers::validator(h).is_none()) {
        return Err(OatmealError::invalid_handler(name, unknown.as_str()));
    }

    Ok(())
}

fn build_attribute(model_name: &str, attr: &AttributeConfig) -> Result<AttributeDescriptor> {
    let mut descriptor = if is_nested_kind(&attr.r#type) {
        let nested = attr.model.clone().ok_or_else(|| OatmealError::MissingConfigError {
            field: format!("models.{}.attributes.{}.model", model_name, attr.name),
        })?;
        let nested = ModelRef::Named(nested);
        match attr.r#type.as_str() {
            OBJECT_TYPE => AttributeDescriptor::object(nested),
            ARRAY_COLLECTION_TYPE => AttributeDescriptor::array_collection(nested),
            _ => AttributeDescriptor::parent(nested),
        }
    } else {
        AttributeDescriptor::primitive(attr.r#type.clone())
    };

    descriptor = descriptor.nullable(attr.nullable.unwrap_or(true));
    if let Some(default) = &attr.default {
        descriptor = descriptor.with_default(literal_from_toml(default)?);
    }
    if let Some(format) = &attr.format {
        descriptor = descriptor.with_format(format.clone());
    }
    if !attr.require.is_empty() {
        descriptor = descriptor.requires(attr.require.clone());
    }
    if let Some(computed) = &attr.computed {
        descriptor = joined(descriptor, computed);
    }

    Ok(descriptor)
}

fn joined(descriptor: AttributeDescriptor, computed: &ComputedConfig) -> AttributeDescriptor {
    let fields = computed.join.clone();
    let separator = computed.separator.clone();
    let descriptor = if descriptor.required.is_empty() {
        descriptor.requires(fields.clone())
    } else {
        descriptor
    };

    let (get_fields, get_separator) = (fields.clone(), separator.clone());
    descriptor
        .computed(move |node: &Node| {
            let parts: Vec<String> = get_fields
                .iter()
                .filter_map(|field| node.get(field))
                .filter(|value| !value.is_null())
                .map(|value| value.to_display_string())
                .collect();
            Value::String(parts.join(&get_separator))
        })
        .with_setter(move |node: &Node, value: Value| {
            if value.is_null() {
                return;
            }
            let text = value.to_display_string();
            let mut parts = text.splitn(fields.len(), separator.as_str());
            for field in &fields {
                node.set(field.clone(), parts.next().unwrap_or_default());
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SCHEMA: &str = r#"
[schema]
name = "people"
version = "1.0"

[options]
depth = 2

[[types]]
name = "slug"
default = ""
serializers = ["trim", "lowercase"]
serializer_validators = ["is_string"]

[[models]]
name = "Profile"

[[models.attributes]]
name = "first_name"
type = "string"

[[models.attributes]]
name = "last_name"
type = "string"

[[models.attributes]]
name = "full_name"
type = "string"
computed = { join = ["first_name", "last_name"] }

[[models.attributes]]
name = "handle"
type = "slug"
nullable = false
default = "anonymous"

[[models]]
name = "User"

[[models.attributes]]
name = "profile"
type = "object"
model = "Profile"
"#;

    #[test]
    fn test_parse_schema() {
        let config = SchemaConfig::from_toml_str(SCHEMA).unwrap();

        assert_eq!(config.schema.as_ref().unwrap().name, "people");
        assert_eq!(config.traversal_options(), TraversalOptions::with_depth(2));
        assert_eq!(config.models.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_registry_and_catalog() {
        let config = SchemaConfig::from_toml_str(SCHEMA).unwrap();
        let registry = config.build_registry().unwrap();
        let catalog = config.build_catalog().unwrap();

        assert!(registry.is_registered("slug"));
        assert_eq!(registry.transforms("slug", Direction::Serialize).len(), 2);
        assert_eq!(catalog.names(), vec!["Profile".to_string(), "User".to_string()]);

        let profile = catalog.get("Profile").unwrap();
        let handle = profile.get_attribute("handle").unwrap();
        assert!(!handle.nullable);
        assert_eq!(handle.default, Some(Literal::String("anonymous".to_string())));

        let full_name = profile.get_attribute("full_name").unwrap();
        assert_eq!(full_name.required, vec!["first_name".to_string(), "last_name".to_string()]);
    }

    #[test]
    fn test_joined_attribute_getter_and_setter() {
        let config = SchemaConfig::from_toml_str(SCHEMA).unwrap();
        let catalog = config.build_catalog().unwrap();
        let profile = catalog.get("Profile").unwrap();
        let full_name = profile.get_attribute("full_name").unwrap();

        let node = Node::from_pairs([("first_name", "Ada"), ("last_name", "Lovelace")]);
        let compute = full_name.compute.as_ref().unwrap();
        assert_eq!(compute(&node), Value::from("Ada Lovelace"));

        let apply = full_name.apply.as_ref().unwrap();
        apply(&node, Value::from("Grace Brewster Hopper"));
        assert_eq!(node.get("first_name"), Some(Value::from("Grace")));
        assert_eq!(node.get("last_name"), Some(Value::from("Brewster Hopper")));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("OATMEAL_TEST_DATE_FORMAT", "DD/MM/YYYY");

        let config = SchemaConfig::from_toml_str(
            r#"
[[models]]
name = "Event"

[[models.attributes]]
name = "at"
type = "datetime"
format = "${OATMEAL_TEST_DATE_FORMAT}"
"#,
        )
        .unwrap();
        assert_eq!(config.models[0].attributes[0].format.as_deref(), Some("DD/MM/YYYY"));

        std::env::remove_var("OATMEAL_TEST_DATE_FORMAT");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let config = SchemaConfig::from_toml_str(
            r#"
[[models]]
name = "Thing"

[[models.attributes]]
name = "size"
type = "bignum"
"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, OatmealError::InvalidConfigValueError { ref value, .. } if value == "bignum"));
    }

    #[test]
    fn test_nested_kind_needs_a_defined_model() {
        let missing_model = SchemaConfig::from_toml_str(
            r#"
[[models]]
name = "Post"

[[models.attributes]]
name = "author"
type = "parent"
"#,
        )
        .unwrap();
        assert!(matches!(
            missing_model.validate(),
            Err(OatmealError::MissingConfigError { .. })
        ));

        let undefined_model = SchemaConfig::from_toml_str(
            r#"
[[models]]
name = "Post"

[[models.attributes]]
name = "author"
type = "parent"
model = "User"
"#,
        )
        .unwrap();
        assert!(matches!(
            undefined_model.validate(),
            Err(OatmealError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_unknown_handler_name() {
        let config = SchemaConfig::from_toml_str(
            r#"
[[types]]
name = "slug"
serializers = ["kebabify"]
"#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(OatmealError::InvalidHandler { .. })));
        assert!(matches!(config.build_registry(), Err(OatmealError::InvalidHandler { .. })));
    }

    #[test]
    fn test_schema_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(SCHEMA.as_bytes()).unwrap();

        let config = SchemaConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.schema.unwrap().name, "people");
    }

    #[test]
    fn test_malformed_toml() {
        let err = SchemaConfig::from_toml_str("[[models]\nname =").unwrap_err();
        assert!(matches!(err, OatmealError::ConfigValidationError { ref field, .. } if field == "toml_parsing"));
    }
}
