//! The per-task tfvars template.
//!
//! A task renders either its custom template file or the built-in body
//! below. Both see the same variables:
//!
//! - `task.name`, `task.description`, `task.services`, `task.services_meta`
//! - `condition` - `null`, or the finalized condition with `regexp`,
//!   `source_includes_var`, `datacenter`, `namespace` and `node_meta`
//!
//! The built-in body renders one `services` entry per instance of each task
//! service. With a condition it also watches the matching catalog services,
//! so a registration change re-renders the task, and prints them as
//! `catalog_services` when `source_includes_var` is set.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::template::Template;
use crate::config::{ConfigError, TaskConfig};

/// Built-in tfvars body.
pub const TFVARS_TEMPLATE: &str = r#"# This file is generated by catalog-sync. Do not edit.
# Task: {{ task.name | single_line }}
{%- if task.description %}
# Description: {{ task.description | single_line }}
{%- endif %}

services = {
{%- for name in task.services %}
{%- for svc in service(name=name) %}
{{ hcl_service(service=svc) | indent(spaces=2) }}
{%- endfor %}
{%- endfor %}
}
{%- if condition %}
{%- set catalog = catalog_services(regexp=condition.regexp, datacenter=condition.datacenter, namespace=condition.namespace, node_meta=condition.node_meta) %}
{%- if condition.source_includes_var %}

{{ services_registration_block(name="catalog_services", services=catalog) }}
{%- endif %}
{%- endif %}
"#;

/// Build the template for a finalized task.
///
/// # Errors
///
/// [`ConfigError::TemplateRead`] when the task's custom template file
/// cannot be read. Relative paths resolve against the working directory.
pub fn task_template(task: &TaskConfig) -> Result<Template, ConfigError> {
    let body = match &task.template {
        Some(path) => std::fs::read_to_string(path).map_err(|source| ConfigError::TemplateRead {
            task: task.name.clone(),
            path: path.clone(),
            source,
        })?,
        None => TFVARS_TEMPLATE.to_string(),
    };

    Ok(Template::new(
        task.name.clone(),
        body,
        task_vars(task),
        task.services_meta.clone().unwrap_or_default(),
    ))
}

/// Template variables for `task`.
pub fn task_vars(task: &TaskConfig) -> Value {
    let services_meta: BTreeMap<&String, BTreeMap<&String, &String>> = task
        .services_meta
        .iter()
        .flatten()
        .map(|(service, meta)| (service, meta.iter().collect()))
        .collect();

    let condition = task.condition.as_ref().map_or(Value::Null, |condition| {
        let c = condition.as_catalog_services();
        json!({
            "regexp": c.regexp().unwrap_or_default(),
            "source_includes_var": c.source_includes_var(),
            "datacenter": c.datacenter(),
            "namespace": c.namespace(),
            "node_meta": c.node_meta(),
        })
    });

    json!({
        "task": {
            "name": task.name,
            "description": task.description,
            "services": task.services(),
            "services_meta": services_meta,
        },
        "condition": condition,
    })
}
