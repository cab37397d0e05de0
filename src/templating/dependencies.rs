//! Template functions that read catalog data.
//!
//! `catalog_services`, `service` and `nodes` turn their arguments into a
//! [`Dependency`], recall it through the pass's [`Recaller`] and return the
//! data as a list. While a dependency is still loading they return an empty
//! list and record it as missing, so one pass discovers every dependency a
//! template needs even before any data arrived.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tera::Value;

use super::functions::FunctionRegistry;
use crate::registry::{CatalogServicesQuery, Dependency, HealthServiceQuery, NodesQuery};
use crate::watcher::Recaller;

/// Dependencies seen during one template execution.
#[derive(Debug)]
pub struct ExecutionState {
    recaller: Recaller,
    used: Mutex<Vec<Dependency>>,
    missing: Mutex<Vec<String>>,
}

impl ExecutionState {
    pub fn new(recaller: Recaller) -> Self {
        Self {
            recaller,
            used: Mutex::new(Vec::new()),
            missing: Mutex::new(Vec::new()),
        }
    }

    /// Recall `dependency`, recording it as used and, without data, as missing.
    pub fn recall(&self, dependency: Dependency) -> tera::Result<Value> {
        let key = dependency.key();
        let value = self.recaller.recall(&dependency);

        {
            let mut used = self.used.lock().unwrap_or_else(PoisonError::into_inner);
            if !used.contains(&dependency) {
                used.push(dependency);
            }
        }

        match value {
            Some(data) => data
                .to_value()
                .map_err(|e| tera::Error::msg(format!("Failed to convert data for {key}: {e}"))),
            None => {
                tracing::trace!(target: "resolver", "{} is still loading", key);
                let mut missing = self.missing.lock().unwrap_or_else(PoisonError::into_inner);
                if !missing.contains(&key) {
                    missing.push(key);
                }
                Ok(Value::Array(Vec::new()))
            }
        }
    }

    /// Used dependencies and missing keys, in first-use order.
    pub fn take(&self) -> (Vec<Dependency>, Vec<String>) {
        let used = std::mem::take(&mut *self.used.lock().unwrap_or_else(PoisonError::into_inner));
        let missing =
            std::mem::take(&mut *self.missing.lock().unwrap_or_else(PoisonError::into_inner));
        (used, missing)
    }
}

/// Add the dependency functions, bound to `state`, to `registry`.
pub fn register_dependency_functions(registry: &mut FunctionRegistry, state: &Arc<ExecutionState>) {
    let catalog_state = Arc::clone(state);
    registry.insert("catalog_services", move |args| {
        let query = CatalogServicesQuery {
            regexp: string_arg(args, "catalog_services", "regexp")?,
            datacenter: string_arg(args, "catalog_services", "datacenter")?,
            namespace: string_arg(args, "catalog_services", "namespace")?,
            node_meta: map_arg(args, "catalog_services", "node_meta")?,
        };
        catalog_state.recall(Dependency::CatalogServices(query))
    });

    let service_state = Arc::clone(state);
    registry.insert("service", move |args| {
        let name = string_arg(args, "service", "name")?;
        if name.is_empty() {
            return Err(tera::Error::msg("service: missing `name` argument"));
        }
        let query = HealthServiceQuery {
            name,
            datacenter: string_arg(args, "service", "datacenter")?,
            namespace: string_arg(args, "service", "namespace")?,
        };
        service_state.recall(Dependency::HealthService(query))
    });

    let nodes_state = Arc::clone(state);
    registry.insert("nodes", move |args| {
        let query = NodesQuery {
            datacenter: string_arg(args, "nodes", "datacenter")?,
        };
        nodes_state.recall(Dependency::CatalogNodes(query))
    });
}

/// Optional string argument; absent and `null` read as empty.
fn string_arg(args: &HashMap<String, Value>, function: &str, name: &str) -> tera::Result<String> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(tera::Error::msg(format!(
            "{function}: `{name}` must be a string, got {other}"
        ))),
    }
}

/// Optional string map argument; absent and `null` read as empty.
fn map_arg(
    args: &HashMap<String, Value>,
    function: &str,
    name: &str,
) -> tera::Result<BTreeMap<String, String>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            tera::Error::msg(format!("{function}: `{name}` must map strings to strings: {e}"))
        }),
    }
}
