//! Resource declarations

use crate::error::{CloudError, Result};
use crate::output::{self, OutputRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Typed resource declaration
///
/// Implementors are plain data: their serialized form is the input object
/// handed to the provisioning engine, with deferred values encoded as
/// described in [`crate::output`].
pub trait Resource: Serialize {
    /// Type token (e.g. "azure-native:containerregistry:Registry")
    fn resource_type(&self) -> &str;

    /// Logical name, unique within the stack
    fn name(&self) -> &str;

    /// Provider that owns this resource type
    fn provider(&self) -> &str;

    /// Managed resource or read-only lookup
    fn mode(&self) -> ResourceMode {
        ResourceMode::Managed
    }

    /// Output attributes that carry secrets
    fn secret_outputs(&self) -> &[&'static str] {
        &[]
    }
}

/// How the engine treats a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    /// Created, updated and destroyed by the engine
    Managed,
    /// Read on every evaluation, never created
    Lookup,
}

impl std::fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceMode::Managed => write!(f, "managed"),
            ResourceMode::Lookup => write!(f, "lookup"),
        }
    }
}

/// Untyped static description of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type token
    pub resource_type: String,

    /// Logical name
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Managed resource or lookup
    pub mode: ResourceMode,

    /// Input object with deferred values
    pub config: serde_json::Value,

    /// Output attributes that carry secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_outputs: Vec<String>,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            mode: ResourceMode::Managed,
            config,
            secret_outputs: Vec::new(),
        }
    }

    /// Serialize a typed declaration
    pub fn from_resource<R: Resource>(resource: &R) -> Result<Self> {
        Ok(Self {
            resource_type: resource.resource_type().to_string(),
            id: resource.name().to_string(),
            provider: resource.provider().to_string(),
            mode: resource.mode(),
            config: serde_json::to_value(resource)?,
            secret_outputs: resource
                .secret_outputs()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }

    pub fn with_mode(mut self, mode: ResourceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Names of the resources this node reads outputs from
    pub fn dependencies(&self) -> BTreeSet<String> {
        output::references(&self.config)
            .into_iter()
            .map(|r| r.resource)
            .filter(|r| r != &self.id)
            .collect()
    }

    /// Every output reference in the inputs
    pub fn references(&self) -> Vec<OutputRef> {
        output::references(&self.config)
    }

    pub fn is_secret_output(&self, attribute: &str) -> bool {
        self.secret_outputs.iter().any(|s| s == attribute)
    }
}

/// Set of declared nodes, indexed by logical name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; logical names must be unique
    pub fn add(&mut self, resource: ResourceConfig) -> Result<()> {
        if self.resources.contains_key(&resource.id) {
            return Err(CloudError::DuplicateResource(resource.id));
        }
        self.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ResourceConfig> {
        self.resources.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Check that every reference points at a declared node and that secret
    /// outputs only appear inside secret-bearing slots
    pub fn validate(&self) -> Result<()> {
        for resource in self.iter() {
            for reference in resource.references() {
                if !self.resources.contains_key(&reference.resource) {
                    return Err(CloudError::UnknownReference {
                        resource: resource.id.clone(),
                        target: reference.resource,
                    });
                }
            }

            for reference in output::plain_references(&resource.config) {
                let leaks = self
                    .get(&reference.resource)
                    .is_some_and(|producer| producer.is_secret_output(&reference.attribute));
                if leaks {
                    return Err(CloudError::InvalidConfig(format!(
                        "secret output '{}' flows into a plain input of '{}'",
                        reference, resource.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, config: serde_json::Value) -> ResourceConfig {
        ResourceConfig::new("test:index:Thing", id, "test", config)
    }

    #[test]
    fn test_dependencies_from_wiring() {
        let app = node(
            "app",
            json!({
                "serverFarmId": {"$output": {"resource": "plan", "attribute": "id"}},
                "image": {"$interpolate": ["DOCKER|", {"$output": {"resource": "image", "attribute": "imageName"}}]},
                "group": "rg"
            }),
        );

        let deps: Vec<_> = app.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["image".to_string(), "plan".to_string()]);
    }

    #[test]
    fn test_duplicate_resource() {
        let mut set = ResourceSet::new();
        set.add(node("rg", json!({}))).unwrap();
        let result = set.add(node("rg", json!({})));
        assert!(matches!(result, Err(CloudError::DuplicateResource(ref id)) if id == "rg"));
    }

    #[test]
    fn test_validate_unknown_reference() {
        let mut set = ResourceSet::new();
        set.add(node(
            "app",
            json!({"plan": {"$output": {"resource": "missing", "attribute": "id"}}}),
        ))
        .unwrap();

        let result = set.validate();
        assert!(matches!(
            result,
            Err(CloudError::UnknownReference { ref target, .. }) if target == "missing"
        ));
    }

    #[test]
    fn test_validate_secret_in_plain_slot() {
        let mut creds = node("creds", json!({})).with_mode(ResourceMode::Lookup);
        creds.secret_outputs = vec!["password".to_string()];

        let mut set = ResourceSet::new();
        set.add(creds).unwrap();
        set.add(node(
            "app",
            json!({"password": {"$output": {"resource": "creds", "attribute": "password"}}}),
        ))
        .unwrap();

        let err = set.validate().unwrap_err();
        assert!(err.to_string().contains("creds.password"));
    }

    #[test]
    fn test_validate_secret_in_secret_slot() {
        let mut creds = node("creds", json!({})).with_mode(ResourceMode::Lookup);
        creds.secret_outputs = vec!["password".to_string()];

        let mut set = ResourceSet::new();
        set.add(creds).unwrap();
        set.add(node(
            "app",
            json!({"password": {"$secret": {"$output": {"resource": "creds", "attribute": "password"}}}}),
        ))
        .unwrap();

        assert!(set.validate().is_ok());
    }
}
