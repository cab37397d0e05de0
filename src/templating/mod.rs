//! HCL templating for sync tasks.
//!
//! Each task renders one Tera template into a tfvars file. Templates call two
//! kinds of functions:
//!
//! - dependency functions (`service`, `catalog_services`, `nodes`) that read
//!   catalog data through the [`Watcher`](crate::watcher::Watcher), and
//! - pure HCL formatting functions (`hcl_service`, `hcl_node`, ...) from the
//!   [`FunctionRegistry`].
//!
//! Both are registered into a fresh Tera instance per render.
//!
//! # Template Context
//!
//! - `task`: `name`, `description`, `services`, `services_meta`
//! - `condition`: the task's catalog-services condition, or `null`
//!
//! # Example
//!
//! ```text
//! services = {
//! {%- for svc in service(name="api") %}
//! {{ hcl_service(service=svc) | indent(spaces=2) }}
//! {%- endfor %}
//! }
//! {{ nodes_block(nodes=nodes(datacenter="dc1")) }}
//! ```
//!
//! Tera functions only take named arguments, and string literals are not
//! unescaped; pass anything with quotes or newlines through the context.
//!
//! # Modules
//!
//! - `functions` - [`FunctionRegistry`] and the HCL formatters
//! - `dependencies` - catalog-reading functions bound to one execution
//! - `template` - [`Template`] identity and execution
//! - `tfvars` - the per-task template and its variables
//! - `renderer` - Tera invocation and error classification
//! - `error` - [`TemplateError`]

mod dependencies;
mod error;
pub mod functions;
mod renderer;
mod template;
mod tfvars;

pub use dependencies::{ExecutionState, register_dependency_functions};
pub use error::TemplateError;
pub use functions::{FunctionRegistry, TemplateFn};
pub use renderer::{format_tera_error, render};
pub use template::{ExecuteResult, Template};
pub use tfvars::{TFVARS_TEMPLATE, task_template, task_vars};
