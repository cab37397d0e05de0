//! Task conditions.
//!
//! A condition decides which catalog changes are relevant to a task. Only the
//! `catalog-services` kind exists today; it is still modelled as a tagged enum
//! so configuration files carry an explicit `type` and every operation matches
//! exhaustively on the kind.
//!
//! Conditions go through the same lifecycle as the rest of the configuration:
//! they are deserialized as partial values (absent keys stay `None`), merged
//! with higher-precedence partials, finalized with defaults, and validated.
//!
//! ```toml
//! [task.condition]
//! type = "catalog-services"
//! regexp = "^api"
//! source_includes_var = true
//! datacenter = "dc1"
//! node_meta = { rack = "r1" }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::constants::CATALOG_SERVICES_CONDITION_TYPE;

/// The closed set of condition kinds a task can declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConditionConfig {
    /// Triggered by changes to the catalog's list of registered services.
    CatalogServices(CatalogServicesCondition),
}

impl ConditionConfig {
    /// Combine this condition with `other`, values in `other` taking precedence.
    pub fn merge(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::CatalogServices(base), Self::CatalogServices(over)) => {
                Self::CatalogServices(base.merge(over))
            }
        }
    }

    /// Fill unset fields with their defaults.
    ///
    /// `services` are the task's explicitly listed service names, used to infer a
    /// regular expression when none was configured.
    pub fn finalize(&mut self, services: &[String]) {
        match self {
            Self::CatalogServices(condition) => condition.finalize(services),
        }
    }

    /// Check that the finalized condition is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::CatalogServices(condition) => condition.validate(),
        }
    }

    /// Deterministic human readable form, used in logs and `validate` output.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Borrow the catalog-services condition.
    pub fn as_catalog_services(&self) -> &CatalogServicesCondition {
        match self {
            Self::CatalogServices(condition) => condition,
        }
    }
}

impl fmt::Display for ConditionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogServices(condition) => condition.fmt(f),
        }
    }
}

/// Merge two optional conditions, `other` taking precedence.
///
/// An absent side contributes nothing: merging with `None` yields a copy of the
/// present side, and merging two absent conditions stays absent.
pub fn merge_conditions(
    base: Option<&ConditionConfig>,
    other: Option<&ConditionConfig>,
) -> Option<ConditionConfig> {
    match (base, other) {
        (None, None) => None,
        (None, Some(other)) => Some(other.clone()),
        (Some(base), None) => Some(base.clone()),
        (Some(base), Some(other)) => Some(base.merge(other)),
    }
}

/// Finalize an optional condition. Absent conditions are left absent.
pub fn finalize_condition(condition: Option<&mut ConditionConfig>, services: &[String]) {
    if let Some(condition) = condition {
        condition.finalize(services);
    }
}

/// Validate an optional condition. Absent conditions are valid.
pub fn validate_condition(condition: Option<&ConditionConfig>) -> Result<(), ConfigError> {
    condition.map_or(Ok(()), ConditionConfig::validate)
}

/// Configuration of a `catalog-services` condition.
///
/// Every field is optional until [`finalize`](Self::finalize) runs. `regexp` is
/// special: `None` means "not configured" while `Some("")` is a legitimate
/// pattern matching every service, so finalization only infers a pattern when
/// the user said nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogServicesCondition {
    /// Regular expression matched against service names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,

    /// Expose the matched catalog services as a `catalog_services` variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_includes_var: Option<bool>,

    /// Datacenter to query. Empty means the agent's datacenter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,

    /// Namespace to query. Empty means any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Node metadata pairs that must all be present on a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_meta: Option<HashMap<String, String>>,
}

impl CatalogServicesCondition {
    /// Combine with `other`; fields set in `other` overwrite, `node_meta` merges
    /// key by key with `other` winning on conflicts.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();

        if let Some(regexp) = &other.regexp {
            merged.regexp = Some(regexp.clone());
        }
        if let Some(include) = other.source_includes_var {
            merged.source_includes_var = Some(include);
        }
        if let Some(datacenter) = &other.datacenter {
            merged.datacenter = Some(datacenter.clone());
        }
        if let Some(namespace) = &other.namespace {
            merged.namespace = Some(namespace.clone());
        }
        if let Some(node_meta) = &other.node_meta {
            merged
                .node_meta
                .get_or_insert_with(HashMap::new)
                .extend(node_meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        merged
    }

    /// Fill every unset field except `regexp` with its default.
    ///
    /// When `regexp` is unset and `services` is non-empty, the pattern becomes an
    /// exact match on any of them, in order: `["api", "web"]` gives `^api$|^web$`.
    pub fn finalize(&mut self, services: &[String]) {
        if self.regexp.is_none() && !services.is_empty() {
            let pattern = services.iter().map(|s| format!("^{s}$")).collect::<Vec<_>>().join("|");
            self.regexp = Some(pattern);
        }

        self.source_includes_var.get_or_insert(false);
        self.datacenter.get_or_insert_with(String::new);
        self.namespace.get_or_insert_with(String::new);
        self.node_meta.get_or_insert_with(HashMap::new);
    }

    /// Ensure a pattern is set and compiles. Intended to run after finalize.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pattern = self.regexp.as_deref().ok_or(ConfigError::MissingRegexp)?;

        Regex::new(pattern).map_err(|error| ConfigError::InvalidRegexp {
            pattern: pattern.to_string(),
            error,
        })?;

        Ok(())
    }

    /// The configured pattern, if any.
    pub fn regexp(&self) -> Option<&str> {
        self.regexp.as_deref()
    }

    pub fn source_includes_var(&self) -> bool {
        self.source_includes_var.unwrap_or(false)
    }

    pub fn datacenter(&self) -> &str {
        self.datacenter.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }

    /// Node metadata filter in key order.
    pub fn node_meta(&self) -> BTreeMap<String, String> {
        self.node_meta
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Display for CatalogServicesCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node_meta = self
            .node_meta()
            .iter()
            .map(|(k, v)| format!("{k}: {v:?}"))
            .collect::<Vec<_>>()
            .join(", ");

        write!(
            f,
            "{}{{regexp: {:?}, source_includes_var: {}, datacenter: {:?}, namespace: {:?}, node_meta: {{{}}}}}",
            CATALOG_SERVICES_CONDITION_TYPE,
            self.regexp().unwrap_or_default(),
            self.source_includes_var(),
            self.datacenter(),
            self.namespace(),
            node_meta,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn full() -> CatalogServicesCondition {
        CatalogServicesCondition {
            regexp: Some("^api".to_string()),
            source_includes_var: Some(true),
            datacenter: Some("dc1".to_string()),
            namespace: Some("ns1".to_string()),
            node_meta: Some(meta(&[("rack", "r1"), ("zone", "a")])),
        }
    }

    #[test]
    fn test_copy_is_independent() {
        let original = full();
        let mut copy = original.clone();
        copy.node_meta.as_mut().unwrap().insert("rack".to_string(), "r9".to_string());
        copy.regexp = Some("changed".to_string());

        assert_eq!(original.node_meta.as_ref().unwrap()["rack"], "r1");
        assert_eq!(original.regexp(), Some("^api"));
    }

    #[test]
    fn test_merge_overlays_set_fields() {
        let base = full();
        let over = CatalogServicesCondition {
            datacenter: Some("dc2".to_string()),
            node_meta: Some(meta(&[("zone", "b"), ("env", "prod")])),
            ..Default::default()
        };

        let merged = base.merge(&over);

        assert_eq!(merged.regexp(), Some("^api"));
        assert_eq!(merged.source_includes_var, Some(true));
        assert_eq!(merged.datacenter(), "dc2");
        assert_eq!(merged.namespace(), "ns1");
        assert_eq!(merged.node_meta.unwrap(), meta(&[("rack", "r1"), ("zone", "b"), ("env", "prod")]));
    }

    #[test]
    fn test_merge_keeps_empty_string_regexp() {
        let base = full();
        let over = CatalogServicesCondition {
            regexp: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(base.merge(&over).regexp(), Some(""));
    }

    #[test]
    fn test_merge_into_unset_node_meta() {
        let base = CatalogServicesCondition::default();
        let over = CatalogServicesCondition {
            node_meta: Some(meta(&[("rack", "r1")])),
            ..Default::default()
        };

        assert_eq!(base.merge(&over).node_meta, Some(meta(&[("rack", "r1")])));
    }

    #[test]
    fn test_merge_with_absent() {
        let condition = ConditionConfig::CatalogServices(full());

        assert_eq!(merge_conditions(None, None), None);
        assert_eq!(merge_conditions(Some(&condition), None), Some(condition.clone()));
        assert_eq!(merge_conditions(None, Some(&condition)), Some(condition.clone()));

        let copy = condition.clone();
        assert_eq!(merge_conditions(Some(&copy), None), Some(copy));
    }

    #[test]
    fn test_finalize_infers_regexp_from_services() {
        let mut condition = CatalogServicesCondition::default();
        condition.finalize(&names(&["api", "web", "db"]));

        assert_eq!(condition.regexp(), Some("^api$|^web$|^db$"));
        assert_eq!(condition.source_includes_var, Some(false));
        assert_eq!(condition.datacenter, Some(String::new()));
        assert_eq!(condition.namespace, Some(String::new()));
        assert_eq!(condition.node_meta, Some(HashMap::new()));
    }

    #[test]
    fn test_finalize_leaves_regexp_unset_without_services() {
        let mut condition = CatalogServicesCondition::default();
        condition.finalize(&[]);

        assert_eq!(condition.regexp, None);
        assert!(matches!(condition.validate(), Err(ConfigError::MissingRegexp)));
    }

    #[test]
    fn test_finalize_does_not_override_empty_regexp() {
        let mut condition = CatalogServicesCondition {
            regexp: Some(String::new()),
            ..Default::default()
        };
        condition.finalize(&names(&["api"]));

        assert_eq!(condition.regexp(), Some(""));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let services = names(&["api", "web"]);
        let mut once = CatalogServicesCondition {
            datacenter: Some("dc1".to_string()),
            ..Default::default()
        };
        once.finalize(&services);
        let mut twice = once.clone();
        twice.finalize(&services);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_validate() {
        let mut condition = CatalogServicesCondition {
            regexp: Some("(".to_string()),
            ..Default::default()
        };
        condition.finalize(&[]);
        let err = condition.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegexp { .. }));
        assert!(err.to_string().contains("unable to compile"));

        condition.regexp = Some(String::new());
        assert!(condition.validate().is_ok());

        assert!(validate_condition(None).is_ok());
    }

    #[test]
    fn test_describe() {
        let mut condition = ConditionConfig::CatalogServices(CatalogServicesCondition::default());
        condition.finalize(&names(&["api", "web", "db"]));

        assert_eq!(
            condition.describe(),
            r#"catalog-services{regexp: "^api$|^web$|^db$", source_includes_var: false, datacenter: "", namespace: "", node_meta: {}}"#
        );

        let described = ConditionConfig::CatalogServices(full()).describe();
        assert!(described.contains(r#"node_meta: {rack: "r1", zone: "a"}"#));
    }

    #[test]
    fn test_deserialize_partial() {
        let condition: ConditionConfig = toml::from_str(
            r#"
            type = "catalog-services"
            datacenter = "dc1"
            "#,
        )
        .unwrap();

        let ConditionConfig::CatalogServices(inner) = condition;
        assert_eq!(inner.regexp, None);
        assert_eq!(inner.source_includes_var, None);
        assert_eq!(inner.datacenter.as_deref(), Some("dc1"));
        assert_eq!(inner.node_meta, None);
    }

    #[test]
    fn test_deserialize_rejects_unknown_keys() {
        let result: Result<ConditionConfig, _> = toml::from_str(
            r#"
            type = "catalog-services"
            regex = "^api"
            "#,
        );
        assert!(result.is_err());
    }
}
