//! HCL formatting functions available to templates.
//!
//! Every function here is pure: it formats its arguments and nothing else.
//! Unordered input (tags, metadata, services, nodes) is sorted before
//! formatting so identical catalog data always renders to identical bytes.
//!
//! The functions are collected in a [`FunctionRegistry`], built once per
//! render and registered into a fresh Tera instance:
//!
//! | Tera name | Arguments |
//! |---|---|
//! | `join_strings` | `sep`, `values` |
//! | `hcl_service_tags` | `tags` |
//! | `hcl_service` | `service` |
//! | `hcl_node` | `node` |
//! | `services_registration_block` | `name`, `services` |
//! | `nodes_block` | `nodes` |
//! | `subtract` | `a`, `b` |
//!
//! The `indent(spaces=N)` filter shifts multi-line output into a block, and
//! `single_line` folds line breaks into spaces so a value fits in a `#` comment.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tera::{Tera, Value};

use crate::config::ServicesMeta;
use crate::registry::{CatalogServiceEntry, Node, ServiceInstance};

/// A template function: named arguments in, value out.
pub type TemplateFn = Arc<dyn Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync>;

/// Named template functions for one render.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, TemplateFn>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry").field("functions", &self.names().collect::<Vec<_>>()).finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The HCL formatting functions, with `hcl_service` reading user metadata
    /// from `meta`.
    pub fn hcl(meta: ServicesMeta) -> Self {
        let meta = Arc::new(meta);
        let mut registry = Self::new();

        registry.insert("join_strings", |args| {
            let sep: String = optional_arg(args, "join_strings", "sep")?.unwrap_or_default();
            let values: Vec<String> = optional_arg(args, "join_strings", "values")?.unwrap_or_default();
            Ok(Value::String(join_strings(&sep, &values)))
        });
        registry.insert("hcl_service_tags", |args| {
            let tags: Vec<String> = optional_arg(args, "hcl_service_tags", "tags")?.unwrap_or_default();
            Ok(Value::String(hcl_service_tags(&tags)))
        });
        registry.insert("hcl_service", move |args| {
            let service: ServiceInstance = required_arg(args, "hcl_service", "service")?;
            Ok(Value::String(hcl_service(&service, &meta)))
        });
        registry.insert("hcl_node", |args| {
            let node: Node = required_arg(args, "hcl_node", "node")?;
            Ok(Value::String(hcl_node(&node)))
        });
        registry.insert("services_registration_block", |args| {
            let name: String = required_arg(args, "services_registration_block", "name")?;
            let services: Vec<CatalogServiceEntry> =
                required_arg(args, "services_registration_block", "services")?;
            Ok(Value::String(services_registration_block(&name, &services)))
        });
        registry.insert("nodes_block", |args| {
            let nodes: Vec<Node> = required_arg(args, "nodes_block", "nodes")?;
            Ok(Value::String(nodes_block(&nodes)))
        });
        registry.insert("subtract", |args| {
            let a: i64 = required_arg(args, "subtract", "a")?;
            let b: i64 = required_arg(args, "subtract", "b")?;
            subtract(a, b).map(Value::from)
        });

        registry
    }

    /// Add or replace a function.
    pub fn insert<F>(&mut self, name: &'static str, function: F)
    where
        F: Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name, Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFn> {
        self.functions.get(name)
    }

    /// Function names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Call a function directly, outside of any template.
    pub fn call(&self, name: &str, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let function =
            self.get(name).ok_or_else(|| tera::Error::msg(format!("Function `{name}` not found")))?;
        function(args)
    }

    /// Register every function and the `indent` filter into `tera`.
    pub fn register_into(&self, tera: &mut Tera) {
        for (name, function) in &self.functions {
            let function = Arc::clone(function);
            tera.register_function(name, move |args: &HashMap<String, Value>| function(args));
        }
        tera.register_filter("indent", indent_filter);
        tera.register_filter("single_line", single_line_filter);
    }
}

fn required_arg<T: DeserializeOwned>(
    args: &HashMap<String, Value>,
    function: &str,
    name: &str,
) -> tera::Result<T> {
    optional_arg(args, function, name)?
        .ok_or_else(|| tera::Error::msg(format!("{function}: missing `{name}` argument")))
}

fn optional_arg<T: DeserializeOwned>(
    args: &HashMap<String, Value>,
    function: &str,
    name: &str,
) -> tera::Result<Option<T>> {
    let Some(value) = args.get(name) else {
        return Ok(None);
    };
    serde_json::from_value(value.clone()).map(Some).map_err(|e| {
        let entity = value
            .get("id")
            .or_else(|| value.get("node"))
            .or_else(|| value.get("name"))
            .and_then(Value::as_str)
            .map(|key| format!(" for '{key}'"))
            .unwrap_or_default();
        tera::Error::msg(format!("{function}: invalid `{name}` argument{entity}: {e}"))
    })
}

fn indent_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("indent filter requires a string"))?;
    let spaces = match args.get("spaces") {
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| tera::Error::msg("indent filter: `spaces` must be a non-negative integer"))?,
        None => 2,
    };
    Ok(Value::String(indent(text, spaces)))
}

fn single_line_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("single_line filter requires a string"))?;
    Ok(Value::String(single_line(text)))
}

/// `text` with every line break replaced by a space.
pub fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Join the non-empty `values` with `sep`.
pub fn join_strings<S: AsRef<str>>(sep: &str, values: &[S]) -> String {
    values.iter().map(AsRef::as_ref).filter(|v| !v.is_empty()).collect::<Vec<_>>().join(sep)
}

/// Tags as a sorted HCL list: `["a", "b"]`, or `[]` when empty.
pub fn hcl_service_tags<S: AsRef<str>>(tags: &[S]) -> String {
    let mut quoted: Vec<String> = tags.iter().map(|t| hcl_string(t.as_ref())).collect();
    quoted.sort();
    format!("[{}]", quoted.join(", "))
}

/// One service instance as an HCL object entry keyed by [`ServiceInstance::key`].
///
/// User metadata declared for the instance's service name in `meta` is
/// rendered as `user_meta`.
pub fn hcl_service(instance: &ServiceInstance, meta: &ServicesMeta) -> String {
    let namespace = instance.namespace.as_deref().map_or_else(|| "null".to_string(), hcl_string);
    let user_meta = meta.get(&instance.name).map(hcl_map).unwrap_or_else(|| "{}".to_string());

    let service = attributes(&[
        ("id", hcl_string(&instance.id)),
        ("name", hcl_string(&instance.name)),
        ("kind", hcl_string(&instance.kind)),
        ("address", hcl_string(&instance.address)),
        ("port", instance.port.to_string()),
        ("meta", hcl_map(&instance.meta)),
        ("tags", hcl_service_tags(&instance.tags)),
        ("namespace", namespace),
        ("status", hcl_string(&instance.status)),
    ]);
    let node = attributes(&[
        ("node", hcl_string(&instance.node)),
        ("node_id", hcl_string(&instance.node_id)),
        ("node_address", hcl_string(&instance.node_address)),
        ("node_datacenter", hcl_string(&instance.node_datacenter)),
        ("node_tagged_addresses", hcl_map(&instance.node_tagged_addresses)),
        ("node_meta", hcl_map(&instance.node_meta)),
    ]);
    let user = attributes(&[("user_meta", user_meta)]);

    object_entry(&hcl_string(&instance.key()), &[service, node, user].join("\n\n"))
}

/// One node as an HCL object entry keyed by node name.
pub fn hcl_node(node: &Node) -> String {
    let body = attributes(&[
        ("id", hcl_string(&node.id)),
        ("node", hcl_string(&node.node)),
        ("address", hcl_string(&node.address)),
        ("datacenter", hcl_string(&node.datacenter)),
        ("tagged_addresses", hcl_map(&node.tagged_addresses)),
        ("meta", hcl_map(&node.meta)),
    ]);
    object_entry(&hcl_string(&node.node), &body)
}

/// `name = { "svc" = [tags] ... }` sorted by service name.
pub fn services_registration_block(name: &str, services: &[CatalogServiceEntry]) -> String {
    let mut sorted: Vec<&CatalogServiceEntry> = services.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let entries: Vec<(String, String)> =
        sorted.iter().map(|s| (hcl_string(&s.name), hcl_service_tags(&s.tags))).collect();
    let refs: Vec<(&str, String)> = entries.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

    if refs.is_empty() {
        format!("{name} = {{}}")
    } else {
        object_entry(name, &attributes(&refs))
    }
}

/// `nodes = { ... }` with one [`hcl_node`] entry per node, sorted by node name.
pub fn nodes_block(nodes: &[Node]) -> String {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.node.cmp(&b.node));

    if sorted.is_empty() {
        return "nodes = {}".to_string();
    }
    let body = sorted.into_iter().map(hcl_node).collect::<Vec<_>>().join("\n");
    object_entry("nodes", &body)
}

/// Prefix every non-empty line with `spaces` spaces.
pub fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.split('\n')
        .map(|line| if line.is_empty() { String::new() } else { format!("{pad}{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Quote `value` as an HCL string literal.
///
/// Escapes backslashes, quotes and newlines, and doubles the `$`/`%` of
/// template sequences so values are never interpolated.
pub fn hcl_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A string map as an HCL object with sorted, quoted keys.
fn hcl_map(map: &HashMap<String, String>) -> String {
    if map.is_empty() {
        return "{}".to_string();
    }
    let sorted: BTreeMap<&String, &String> = map.iter().collect();
    let entries: Vec<(String, String)> =
        sorted.into_iter().map(|(k, v)| (hcl_string(k), hcl_string(v))).collect();
    let refs: Vec<(&str, String)> = entries.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    format!("{{\n{}\n}}", indent(&attributes(&refs), 2))
}

/// `key = value` lines with the `=` signs aligned.
fn attributes(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(key, value)| format!("{key:<width$} = {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `a - b`, failing instead of wrapping on overflow.
pub fn subtract(a: i64, b: i64) -> tera::Result<i64> {
    a.checked_sub(b)
        .ok_or_else(|| tera::Error::msg(format!("subtract: {a} - {b} overflows")))
}

fn object_entry(key: &str, body: &str) -> String {
    format!("{key} = {{\n{}\n}}", indent(body, 2))
}
