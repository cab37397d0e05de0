//! Sample catalog snapshots and configuration files.

use serde_json::json;

/// A catalog snapshot in the JSON layout read by
/// [`FileRegistry`](crate::registry::FileRegistry).
#[derive(Clone, Debug)]
pub struct CatalogFixture {
    pub content: String,
}

impl CatalogFixture {
    /// Two nodes in `dc1`, one `api` instance on each and a `web` instance
    /// on `node-a`.
    pub fn basic() -> Self {
        Self::from_value(&basic_catalog())
    }

    /// [`basic`](Self::basic) with `api-2` moved to port 9090.
    pub fn api_moved() -> Self {
        let mut value = basic_catalog();
        value["services"][1]["port"] = json!(9090);
        Self::from_value(&value)
    }

    /// A catalog without any registrations.
    pub fn empty() -> Self {
        Self::from_value(&json!({"nodes": [], "services": []}))
    }

    fn from_value(value: &serde_json::Value) -> Self {
        Self {
            content: value.to_string(),
        }
    }
}

fn basic_catalog() -> serde_json::Value {
    json!({
        "nodes": [
            {"id": "n1", "node": "node-a", "address": "10.0.0.1", "datacenter": "dc1", "meta": {"rack": "r1"}},
            {"id": "n2", "node": "node-b", "address": "10.0.0.2", "datacenter": "dc1", "meta": {"rack": "r2"}}
        ],
        "services": [
            {"id": "api-1", "name": "api", "port": 8080, "tags": ["v1"], "node": "node-a", "status": "passing"},
            {"id": "api-2", "name": "api", "port": 8080, "tags": ["v2"], "node": "node-b", "status": "passing"},
            {"id": "web-1", "name": "web", "address": "10.0.1.1", "port": 80, "node": "node-a", "status": "passing"}
        ]
    })
}

/// A configuration file.
#[derive(Clone, Debug)]
pub struct ConfigFixture {
    pub content: String,
}

impl ConfigFixture {
    /// One task over `api` with a catalog-services condition exposing the
    /// matched services. `working_dir` is where tfvars files land.
    pub fn web_lb(working_dir: &str) -> Self {
        Self {
            content: format!(
                r#"
working_dir = "{}"
wait_timeout_secs = 5
poll_interval_secs = 1

[[task]]
name = "web-lb"
description = "load balancer pool"
services = ["api"]

[task.condition]
type = "catalog-services"
source_includes_var = true

[task.services_meta.api]
owner = "team-a"
"#,
                working_dir.replace('\\', "/")
            ),
        }
    }

    /// A condition without services or regexp; fails validation.
    pub fn missing_regexp() -> Self {
        Self {
            content: r#"
[[task]]
name = "broken"

[task.condition]
type = "catalog-services"
"#
            .to_string(),
        }
    }

    /// A task whose name would place its output outside the working directory.
    pub fn escaping_task_name() -> Self {
        Self {
            content: "[[task]]\nname = \"../escaped\"\nservices = [\"api\"]\n".to_string(),
        }
    }

    /// Not valid TOML.
    pub fn invalid_syntax() -> Self {
        Self {
            content: "[[task]\nname = \"web-lb\"\n".to_string(),
        }
    }
}
