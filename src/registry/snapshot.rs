//! Point-in-time catalog contents and query evaluation.
//!
//! A [`CatalogSnapshot`] is what a registry knows at one moment: its nodes and
//! the service instances registered on them. [`CatalogSnapshot::resolve`]
//! answers a [`Dependency`] against it, applying the datacenter, namespace,
//! node metadata and name filters of the query.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::{
    CatalogServiceEntry, CatalogServicesQuery, Dependency, DependencyData, HealthServiceQuery,
    Node, NodesQuery, ServiceInstance,
};

/// A service registration as stored in a snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRegistration {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub meta: std::collections::HashMap<String, String>,
    pub namespace: Option<String>,
    pub status: String,
    /// Name of the node the instance runs on.
    pub node: String,
}

/// Catalog contents.
///
/// ```json
/// {
///   "nodes": [{ "id": "n1", "node": "node-a", "address": "10.0.0.1", "datacenter": "dc1" }],
///   "services": [{ "id": "api-1", "name": "api", "port": 8080, "node": "node-a", "status": "passing" }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub nodes: Vec<Node>,
    pub services: Vec<ServiceRegistration>,
}

impl CatalogSnapshot {
    /// Parse a JSON snapshot.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid catalog snapshot JSON")
    }

    /// Evaluate a dependency against this snapshot.
    ///
    /// # Errors
    ///
    /// Fails when a catalog-services query carries a pattern that does not compile.
    pub fn resolve(&self, dependency: &Dependency) -> Result<DependencyData> {
        match dependency {
            Dependency::CatalogServices(query) => {
                self.catalog_services(query).map(DependencyData::CatalogServices)
            }
            Dependency::HealthService(query) => {
                Ok(DependencyData::HealthServices(self.health_service(query)))
            }
            Dependency::CatalogNodes(query) => Ok(DependencyData::Nodes(self.nodes(query))),
        }
    }

    fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node == name)
    }

    fn catalog_services(&self, query: &CatalogServicesQuery) -> Result<Vec<CatalogServiceEntry>> {
        let pattern = Regex::new(&query.regexp)
            .with_context(|| format!("Invalid service pattern '{}'", query.regexp))?;

        let mut by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for registration in &self.services {
            let Some(node) = self.node(&registration.node) else {
                continue;
            };
            if !in_scope(node, registration, &query.datacenter, &query.namespace)
                || !has_meta(node, &query.node_meta)
                || !pattern.is_match(&registration.name)
            {
                continue;
            }
            by_name
                .entry(&registration.name)
                .or_default()
                .extend(registration.tags.iter().map(String::as_str));
        }

        Ok(by_name
            .into_iter()
            .map(|(name, tags)| CatalogServiceEntry {
                name: name.to_string(),
                tags: tags.into_iter().map(str::to_string).collect(),
            })
            .collect())
    }

    fn health_service(&self, query: &HealthServiceQuery) -> Vec<ServiceInstance> {
        let mut instances: Vec<ServiceInstance> = self
            .services
            .iter()
            .filter(|r| r.name == query.name)
            .filter_map(|r| self.node(&r.node).map(|node| (r, node)))
            .filter(|(r, node)| in_scope(node, r, &query.datacenter, &query.namespace))
            .map(|(r, node)| ServiceInstance {
                id: r.id.clone(),
                name: r.name.clone(),
                kind: r.kind.clone(),
                address: if r.address.is_empty() { node.address.clone() } else { r.address.clone() },
                port: r.port,
                meta: r.meta.clone(),
                tags: r.tags.clone(),
                namespace: r.namespace.clone(),
                status: r.status.clone(),
                node: node.node.clone(),
                node_id: node.id.clone(),
                node_address: node.address.clone(),
                node_datacenter: node.datacenter.clone(),
                node_tagged_addresses: node.tagged_addresses.clone(),
                node_meta: node.meta.clone(),
            })
            .collect();

        instances.sort_by_key(ServiceInstance::key);
        instances
    }

    fn nodes(&self, query: &NodesQuery) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| query.datacenter.is_empty() || n.datacenter == query.datacenter)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.node.cmp(&b.node));
        nodes
    }
}

fn in_scope(node: &Node, registration: &ServiceRegistration, datacenter: &str, namespace: &str) -> bool {
    let dc_ok = datacenter.is_empty() || node.datacenter == datacenter;
    let ns_ok = namespace.is_empty() || registration.namespace.as_deref() == Some(namespace);
    dc_ok && ns_ok
}

fn has_meta(node: &Node, required: &BTreeMap<String, String>) -> bool {
    required.iter().all(|(k, v)| node.meta.get(k) == Some(v))
}
