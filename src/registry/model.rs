//! Catalog records and dependency queries.
//!
//! A [`Dependency`] is one unit of catalog data a template can reference. Each
//! dependency has a stable string key derived from its query parameters; the
//! watcher caches values under that key.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A catalog node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: String,
    pub node: String,
    pub address: String,
    pub datacenter: String,
    pub tagged_addresses: HashMap<String, String>,
    pub meta: HashMap<String, String>,
}

/// One registered instance of a service, joined with its node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub address: String,
    pub port: u16,
    pub meta: HashMap<String, String>,
    pub tags: Vec<String>,
    pub namespace: Option<String>,
    pub status: String,
    pub node: String,
    pub node_id: String,
    pub node_address: String,
    pub node_datacenter: String,
    pub node_tagged_addresses: HashMap<String, String>,
    pub node_meta: HashMap<String, String>,
}

impl ServiceInstance {
    /// Unique key of the instance across nodes and datacenters.
    pub fn key(&self) -> String {
        format!("{}.{}.{}", self.id, self.node, self.node_datacenter)
    }
}

/// A service name and the union of its instances' tags, as listed by the
/// catalog's service registration endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogServiceEntry {
    pub name: String,
    pub tags: Vec<String>,
}

/// Query for the catalog's registered services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CatalogServicesQuery {
    /// Pattern on service names; empty matches everything.
    pub regexp: String,
    pub datacenter: String,
    pub namespace: String,
    pub node_meta: BTreeMap<String, String>,
}

/// Query for the instances of one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HealthServiceQuery {
    pub name: String,
    pub datacenter: String,
    pub namespace: String,
}

/// Query for the nodes of a datacenter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodesQuery {
    pub datacenter: String,
}

/// Everything a template can depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    CatalogServices(CatalogServicesQuery),
    HealthService(HealthServiceQuery),
    CatalogNodes(NodesQuery),
}

impl Dependency {
    /// Stable identifier derived from the query parameters.
    ///
    /// Empty parameters are left out, node metadata is listed in key order:
    /// `catalog.services(regexp=^api$@dc1|node-meta=rack:r1)`. Separator
    /// characters inside values are backslash-escaped, so distinct queries
    /// never share a key.
    pub fn key(&self) -> String {
        match self {
            Self::CatalogServices(q) => {
                let mut key = String::from("catalog.services(");
                if !q.regexp.is_empty() {
                    key.push_str("regexp=");
                    key.push_str(&escape(&q.regexp));
                }
                push_scope(&mut key, &q.datacenter, &q.namespace);
                if !q.node_meta.is_empty() {
                    let pairs =
                        q.node_meta.iter().map(|(k, v)| format!("{}:{}", escape(k), escape(v))).collect::<Vec<_>>();
                    key.push_str("|node-meta=");
                    key.push_str(&pairs.join(","));
                }
                key.push(')');
                key
            }
            Self::HealthService(q) => {
                let mut key = format!("health.service({}", escape(&q.name));
                push_scope(&mut key, &q.datacenter, &q.namespace);
                key.push(')');
                key
            }
            Self::CatalogNodes(q) => {
                let mut key = String::from("catalog.nodes(");
                push_scope(&mut key, &q.datacenter, "");
                key.push(')');
                key
            }
        }
    }
}

fn push_scope(key: &mut String, datacenter: &str, namespace: &str) {
    if !datacenter.is_empty() {
        key.push('@');
        key.push_str(&escape(datacenter));
    }
    if !namespace.is_empty() {
        key.push_str("|ns=");
        key.push_str(&escape(namespace));
    }
}

/// Backslash-escape the characters `key` uses as separators.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '@' | '|' | ':' | ',' | '=' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// The value delivered for a [`Dependency`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyData {
    CatalogServices(Vec<CatalogServiceEntry>),
    HealthServices(Vec<ServiceInstance>),
    Nodes(Vec<Node>),
}

impl DependencyData {
    /// Template-facing representation of the data.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::CatalogServices(entries) => serde_json::to_value(entries),
            Self::HealthServices(instances) => serde_json::to_value(instances),
            Self::Nodes(nodes) => serde_json::to_value(nodes),
        }
    }

    /// Number of records carried.
    pub fn len(&self) -> usize {
        match self {
            Self::CatalogServices(entries) => entries.len(),
            Self::HealthServices(instances) => instances.len(),
            Self::Nodes(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_services_key() {
        let dep = Dependency::CatalogServices(CatalogServicesQuery {
            regexp: "^api$".to_string(),
            datacenter: "dc1".to_string(),
            namespace: String::new(),
            node_meta: BTreeMap::from([
                ("zone".to_string(), "a".to_string()),
                ("rack".to_string(), "r1".to_string()),
            ]),
        });
        assert_eq!(dep.key(), "catalog.services(regexp=^api$@dc1|node-meta=rack:r1,zone:a)");

        let bare = Dependency::CatalogServices(CatalogServicesQuery::default());
        assert_eq!(bare.key(), "catalog.services()");
    }

    #[test]
    fn test_health_service_and_nodes_keys() {
        let svc = Dependency::HealthService(HealthServiceQuery {
            name: "api".to_string(),
            datacenter: "dc1".to_string(),
            namespace: "team".to_string(),
        });
        assert_eq!(svc.key(), "health.service(api@dc1|ns=team)");

        let nodes = Dependency::CatalogNodes(NodesQuery::default());
        assert_eq!(nodes.key(), "catalog.nodes()");
        assert_eq!(nodes.to_string(), nodes.key());
    }

    #[test]
    fn test_separators_in_values_are_escaped() {
        let in_regexp = Dependency::CatalogServices(CatalogServicesQuery {
            regexp: "^a$@dc1".to_string(),
            ..Default::default()
        });
        let scoped = Dependency::CatalogServices(CatalogServicesQuery {
            regexp: "^a$".to_string(),
            datacenter: "dc1".to_string(),
            ..Default::default()
        });
        assert_ne!(in_regexp.key(), scoped.key());
        assert_eq!(in_regexp.key(), r"catalog.services(regexp=^a$\@dc1)");

        let packed = Dependency::CatalogServices(CatalogServicesQuery {
            node_meta: BTreeMap::from([("rack".to_string(), "r1,zone:a".to_string())]),
            ..Default::default()
        });
        let split = Dependency::CatalogServices(CatalogServicesQuery {
            node_meta: BTreeMap::from([
                ("rack".to_string(), "r1".to_string()),
                ("zone".to_string(), "a".to_string()),
            ]),
            ..Default::default()
        });
        assert_ne!(packed.key(), split.key());

        let ns_in_name = Dependency::HealthService(HealthServiceQuery {
            name: "api|ns=team".to_string(),
            ..Default::default()
        });
        let ns = Dependency::HealthService(HealthServiceQuery {
            name: "api".to_string(),
            namespace: "team".to_string(),
            ..Default::default()
        });
        assert_ne!(ns_in_name.key(), ns.key());

        let alternation = Dependency::CatalogServices(CatalogServicesQuery {
            regexp: "^api$|^web$".to_string(),
            ..Default::default()
        });
        assert_eq!(alternation.key(), r"catalog.services(regexp=^api$\|^web$)");
    }

    #[test]
    fn test_instance_key() {
        let instance = ServiceInstance {
            id: "api-1".to_string(),
            node: "node-a".to_string(),
            node_datacenter: "dc1".to_string(),
            ..Default::default()
        };
        assert_eq!(instance.key(), "api-1.node-a.dc1");
    }
}
