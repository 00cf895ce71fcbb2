use crate::domain::model::{ModelDefinition, ModelRef};
use crate::domain::ports::ModelResolver;
use crate::domain::value::{Node, Value};
use crate::utils::error::{OatmealError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A node being traversed together with the model it is traversed against.
#[derive(Clone, Debug)]
pub struct Frame {
    pub node: Node,
    pub model: Arc<ModelDefinition>,
}

/// Call-local bookkeeping of a single serialize or deserialize pass.
///
/// Holds the ancestor stack used by parent resolution, the models loaded by
/// name during the pass, and an index of visited nodes by `(model, id)`.
pub struct TraversalContext<'a> {
    resolver: &'a dyn ModelResolver,
    loaded_models: HashMap<String, Arc<ModelDefinition>>,
    ancestors: Vec<Frame>,
    index: HashMap<(String, String), Node>,
}

impl<'a> TraversalContext<'a> {
    pub fn new(resolver: &'a dyn ModelResolver) -> Self {
        Self {
            resolver,
            loaded_models: HashMap::new(),
            ancestors: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Resolves a model reference.
    ///
    /// Inline definitions are loaded under their name so later named
    /// references to them resolve. Named references look at the models loaded
    /// in this pass first, then at the resolver.
    pub fn resolve(&mut self, model: &ModelRef) -> Result<Arc<ModelDefinition>> {
        match model {
            ModelRef::Inline(definition) => {
                self.loaded_models
                    .insert(definition.name.clone(), Arc::clone(definition));
                Ok(Arc::clone(definition))
            }
            ModelRef::Named(name) => {
                if let Some(loaded) = self.loaded_models.get(name) {
                    return Ok(Arc::clone(loaded));
                }

                let resolved = self.resolver.resolve_model(name).ok_or_else(|| {
                    tracing::warn!("Model not yet defined: \"{}\"", name);
                    OatmealError::unknown_model(name)
                })?;

                tracing::debug!("Loaded model \"{}\"", name);
                self.loaded_models.insert(name.clone(), Arc::clone(&resolved));
                Ok(resolved)
            }
        }
    }

    pub fn enter(&mut self, node: Node, model: Arc<ModelDefinition>) {
        self.ancestors.push(Frame { node, model });
    }

    pub fn leave(&mut self) -> Option<Frame> {
        self.ancestors.pop()
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Most recent frame whose model is named `model_name`. The frame being
    /// traversed counts.
    pub fn nearest_ancestor(&self, model_name: &str) -> Option<Node> {
        self.ancestors
            .iter()
            .rev()
            .find(|frame| frame.model.name == model_name)
            .map(|frame| frame.node.clone())
    }

    fn index_key(model_name: &str, id: &Value) -> (String, String) {
        (model_name.to_string(), id.to_json().to_string())
    }

    pub fn record(&mut self, model_name: &str, node: &Node) {
        let key = Self::index_key(model_name, &node.id());
        self.index.insert(key, node.clone());
    }

    pub fn lookup(&self, model_name: &str, id: &Value) -> Option<Node> {
        self.index.get(&Self::index_key(model_name, id)).cloned()
    }

    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }
}
