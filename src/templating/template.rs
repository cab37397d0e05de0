//! Templates and their execution against watched data.

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tera::Context as TeraContext;

use super::dependencies::{ExecutionState, register_dependency_functions};
use super::error::TemplateError;
use super::functions::FunctionRegistry;
use super::renderer;
use crate::config::ServicesMeta;
use crate::registry::Dependency;
use crate::watcher::Recaller;

/// A template body with the variables it renders with.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    id: String,
    name: String,
    body: String,
    vars: Value,
    meta: ServicesMeta,
}

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteResult {
    pub output: String,
    /// Every dependency the body referenced, in first-use order.
    pub used: Vec<Dependency>,
    /// Keys of referenced dependencies without data yet.
    pub missing: Vec<String>,
}

impl ExecuteResult {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl Template {
    /// Create a template. `vars` must be a JSON object; it becomes the Tera
    /// context.
    pub fn new(name: impl Into<String>, body: impl Into<String>, vars: Value, meta: ServicesMeta) -> Self {
        let name = name.into();
        let body = body.into();

        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hasher.update(vars.to_string().as_bytes());
        let digest = hex::encode(hasher.finalize());
        let id = format!("{}:{}", name, &digest[..16]);

        Self {
            id,
            name,
            body,
            vars,
            meta,
        }
    }

    /// Identity used for change tracking: `<name>:<16 hex chars>` of the
    /// body and variables.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn vars(&self) -> &Value {
        &self.vars
    }

    /// Execute the body, reading catalog data through `recaller`.
    ///
    /// Dependency functions return empty lists for data that is still
    /// loading, which can make a body fail that renders fine once complete.
    /// Such failures are reported as an incomplete result instead of an error.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] when execution fails with all referenced
    /// data present.
    pub fn execute(&self, recaller: &Recaller) -> Result<ExecuteResult, TemplateError> {
        let context = TeraContext::from_value(self.vars.clone()).map_err(|e| TemplateError::Execution {
            template: self.name.clone(),
            message: format!("template variables must be an object: {e}"),
        })?;

        let state = Arc::new(ExecutionState::new(recaller.clone()));
        let mut functions = FunctionRegistry::hcl(self.meta.clone());
        register_dependency_functions(&mut functions, &state);

        let rendered = renderer::render(&self.name, &self.body, &context, &functions);
        let (used, missing) = state.take();

        match rendered {
            Ok(output) => Ok(ExecuteResult {
                output,
                used,
                missing,
            }),
            Err(e) if !missing.is_empty() => {
                tracing::debug!(
                    target: "resolver",
                    "Ignoring error in {} while {} dependencies load: {}",
                    self.name,
                    missing.len(),
                    e
                );
                Ok(ExecuteResult {
                    output: String::new(),
                    used,
                    missing,
                })
            }
            Err(e) => Err(e),
        }
    }
}
