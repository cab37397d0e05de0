//! Task configuration.
//!
//! A task names the services it renders, an optional condition that widens or
//! narrows what triggers a render, and per-service metadata copied verbatim
//! into the rendered output.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::condition::{ConditionConfig, finalize_condition, merge_conditions, validate_condition};
use super::error::ConfigError;
use crate::utils::path_validation::validate_file_name;

/// User-declared metadata per service name, rendered as `user_meta` in each
/// service block.
pub type ServicesMeta = HashMap<String, HashMap<String, String>>;

/// One automation task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Unique task name; also the name of the task's output directory.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Services whose instances are rendered into the `services` block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,

    /// Metadata to attach to rendered instances, keyed by service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_meta: Option<ServicesMeta>,

    /// Custom Tera template replacing the generated one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionConfig>,
}

impl TaskConfig {
    /// Combine with a later definition of the same task.
    ///
    /// Scalars and the service list are replaced when set in `other`;
    /// `services_meta` merges per service and key; conditions merge field-wise.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();

        if !other.name.is_empty() {
            merged.name = other.name.clone();
        }
        if let Some(description) = &other.description {
            merged.description = Some(description.clone());
        }
        if let Some(services) = &other.services {
            merged.services = Some(services.clone());
        }
        if let Some(template) = &other.template {
            merged.template = Some(template.clone());
        }
        if let Some(other_meta) = &other.services_meta {
            let meta = merged.services_meta.get_or_insert_with(HashMap::new);
            for (service, pairs) in other_meta {
                meta.entry(service.clone())
                    .or_default()
                    .extend(pairs.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        merged.condition = merge_conditions(self.condition.as_ref(), other.condition.as_ref());

        merged
    }

    /// Apply defaults to the task and its condition.
    pub fn finalize(&mut self) {
        let services = self.services.get_or_insert_with(Vec::new);
        finalize_condition(self.condition.as_mut(), services);
        self.services_meta.get_or_insert_with(HashMap::new);
    }

    /// Validate a finalized task.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyTaskName);
        }

        validate_file_name(&self.name).map_err(|e| ConfigError::InvalidTaskName {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;

        if self.services().is_empty() && self.condition.is_none() {
            return Err(ConfigError::NothingToWatch(self.name.clone()));
        }

        validate_condition(self.condition.as_ref()).map_err(|e| e.for_task(&self.name))
    }

    /// Explicit services, empty when unset.
    pub fn services(&self) -> &[String] {
        self.services.as_deref().unwrap_or_default()
    }

    /// Metadata for a single service, if declared.
    pub fn service_meta(&self, service: &str) -> Option<&HashMap<String, String>> {
        self.services_meta.as_ref().and_then(|meta| meta.get(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::condition::CatalogServicesCondition;

    fn task(name: &str, services: &[&str]) -> TaskConfig {
        TaskConfig {
            name: name.to_string(),
            services: Some(services.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_replaces_services_and_merges_meta() {
        let mut base = task("lb", &["api"]);
        base.services_meta = Some(HashMap::from([(
            "api".to_string(),
            HashMap::from([("owner".to_string(), "a".to_string())]),
        )]));

        let mut over = task("lb", &["api", "web"]);
        over.services_meta = Some(HashMap::from([(
            "api".to_string(),
            HashMap::from([("tier".to_string(), "1".to_string())]),
        )]));

        let merged = base.merge(&over);
        assert_eq!(merged.services(), ["api".to_string(), "web".to_string()]);
        let api = merged.service_meta("api").unwrap();
        assert_eq!(api["owner"], "a");
        assert_eq!(api["tier"], "1");
    }

    #[test]
    fn test_finalize_infers_condition_regexp() {
        let mut t = task("lb", &["api", "web"]);
        t.condition = Some(ConditionConfig::CatalogServices(CatalogServicesCondition::default()));
        t.finalize();

        let condition = t.condition.as_ref().unwrap().as_catalog_services();
        assert_eq!(condition.regexp(), Some("^api$|^web$"));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validate_condition_without_pattern() {
        let mut t = task("lb", &[]);
        t.condition = Some(ConditionConfig::CatalogServices(CatalogServicesCondition::default()));
        t.finalize();

        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("lb"));
        assert!(err.to_string().contains("cannot both be unset"));
    }

    #[test]
    fn test_validate_requires_something_to_watch() {
        let mut t = task("idle", &[]);
        t.finalize();
        assert!(matches!(t.validate(), Err(ConfigError::NothingToWatch(_))));

        let mut unnamed = task("", &["api"]);
        unnamed.finalize();
        assert!(matches!(unnamed.validate(), Err(ConfigError::EmptyTaskName)));
    }

    #[test]
    fn test_validate_rejects_names_outside_working_dir() {
        for name in ["../escaped", "..", "/abs", "a/b", "a\\b", "."] {
            let mut t = task(name, &["api"]);
            t.finalize();
            match t.validate() {
                Err(ConfigError::InvalidTaskName { name: rejected, .. }) => {
                    assert_eq!(rejected, name)
                }
                other => panic!("{name}: expected InvalidTaskName, got {other:?}"),
            }
        }

        let mut ok = task("web-lb", &["api"]);
        ok.finalize();
        assert!(ok.validate().is_ok());
    }
}
