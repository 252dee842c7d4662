//! Stack: the full resource graph declaration

use crate::action::{Action, ActionType, Plan};
use crate::error::{CloudError, Result};
use crate::evaluation::{self, Evaluation};
use crate::graph::DependencyGraph;
use crate::output::{self, Input};
use crate::resource::{Resource, ResourceConfig, ResourceMode, ResourceSet};
use crate::state::{GlobalState, ResourceStatus};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Derived value computed from a state snapshot on every evaluation
///
/// Lookups are nodes of the graph (their inputs may reference other
/// resources) but the engine never creates them.
pub trait Lookup: Send + Sync {
    /// Produce the lookup's outputs
    ///
    /// `inputs` is the lookup's resolved input object.
    fn read(&self, inputs: &Value, state: &GlobalState) -> Result<BTreeMap<String, Value>>;
}

/// A declared stack
pub struct Stack {
    project: String,
    name: String,
    config: BTreeMap<String, String>,
    resources: ResourceSet,
    lookups: BTreeMap<String, Box<dyn Lookup>>,
    exports: BTreeMap<String, Input>,
}

impl Stack {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            config: BTreeMap::new(),
            resources: ResourceSet::new(),
            lookups: BTreeMap::new(),
            exports: BTreeMap::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record an effective configuration value for the manifest
    pub fn set_config(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
    }

    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.config
    }

    /// Declare a managed resource
    pub fn add<R: Resource>(&mut self, resource: &R) -> Result<()> {
        let config = ResourceConfig::from_resource(resource)?.with_mode(ResourceMode::Managed);
        tracing::debug!("Declared {} ({})", config.id, config.resource_type);
        self.resources.add(config)
    }

    /// Declare a lookup
    pub fn add_lookup<L: Resource + Lookup + 'static>(&mut self, lookup: L) -> Result<()> {
        let config = ResourceConfig::from_resource(&lookup)?.with_mode(ResourceMode::Lookup);
        tracing::debug!("Declared lookup {} ({})", config.id, config.resource_type);
        let name = config.id.clone();
        self.resources.add(config)?;
        self.lookups.insert(name, Box::new(lookup));
        Ok(())
    }

    /// Export a stack output
    pub fn export(&mut self, name: impl Into<String>, value: impl Into<Input>) {
        self.exports.insert(name.into(), value.into());
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn exports(&self) -> &BTreeMap<String, Input> {
        &self.exports
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&dyn Lookup> {
        self.lookups.get(name).map(|l| l.as_ref())
    }

    /// Validate wiring and build the dependency graph
    pub fn graph(&self) -> Result<DependencyGraph> {
        self.resources.validate()?;
        for (name, export) in &self.exports {
            let value = serde_json::to_value(export)?;
            for reference in output::references(&value) {
                if self.resources.get(&reference.resource).is_none() {
                    return Err(CloudError::UnknownReference {
                        resource: format!("export {}", name),
                        target: reference.resource,
                    });
                }
            }
            // exports are plain values
            for reference in output::plain_references(&value) {
                let leaks = self
                    .resources
                    .get(&reference.resource)
                    .is_some_and(|producer| producer.is_secret_output(&reference.attribute));
                if leaks {
                    return Err(CloudError::InvalidConfig(format!(
                        "secret output '{}' flows into export '{}'",
                        reference, name
                    )));
                }
            }
        }
        DependencyGraph::from_resources(&self.resources)
    }

    /// Resource names in dependency order
    pub fn order(&self) -> Result<Vec<String>> {
        self.graph()?.resolve_order()
    }

    /// Static description consumed by the provisioning engine
    pub fn manifest(&self) -> Result<Manifest> {
        let graph = self.graph()?;
        let mut resources = Vec::with_capacity(self.resources.len());
        for name in graph.resolve_order()? {
            let resource = self
                .resources
                .get(&name)
                .ok_or_else(|| CloudError::ResourceNotFound(name.clone()))?;
            resources.push(ManifestEntry {
                depends_on: graph.dependencies_of(&name),
                resource: resource.clone(),
            });
        }

        let mut outputs = BTreeMap::new();
        for (name, export) in &self.exports {
            outputs.insert(name.clone(), serde_json::to_value(export)?);
        }

        Ok(Manifest {
            project: self.project.clone(),
            stack: self.name.clone(),
            config: self.config.clone(),
            resources,
            outputs,
        })
    }

    /// Compare the declaration with the inputs recorded in a snapshot
    pub fn preview(&self, state: &GlobalState) -> Result<Plan> {
        let mut actions = Vec::new();

        for name in self.order()? {
            let resource = self
                .resources
                .get(&name)
                .ok_or_else(|| CloudError::ResourceNotFound(name.clone()))?;

            if resource.mode == ResourceMode::Lookup {
                actions.push(Action::new(
                    ActionType::Read,
                    &resource.resource_type,
                    &name,
                    format!("Read {}", name),
                ));
                continue;
            }

            let current = state
                .get_resource(&name)
                .filter(|r| r.status != ResourceStatus::Deleted);

            let action = match current {
                None => Action::new(
                    ActionType::Create,
                    &resource.resource_type,
                    &name,
                    format!("Create {} ({})", name, resource.resource_type),
                ),
                Some(existing) if existing.resource_type != resource.resource_type => {
                    Action::new(
                        ActionType::Update,
                        &resource.resource_type,
                        &name,
                        format!("Update {} (type changed)", name),
                    )
                    .with_detail("previous_type", Value::String(existing.resource_type.clone()))
                }
                Some(existing) if existing.inputs != resource.config => {
                    let changed = changed_keys(&existing.inputs, &resource.config);
                    Action::new(
                        ActionType::Update,
                        &resource.resource_type,
                        &name,
                        format!("Update {}", name),
                    )
                    .with_detail("changed", serde_json::json!(changed))
                }
                Some(_) => Action::new(
                    ActionType::NoOp,
                    &resource.resource_type,
                    &name,
                    format!("{} is up to date", name),
                ),
            };
            actions.push(action);
        }

        for name in self.orphan_order(state)? {
            let Some(orphan) = state.get_resource(&name) else {
                continue;
            };
            tracing::debug!("{} is recorded but no longer declared", name);
            actions.push(Action::new(
                ActionType::Delete,
                &orphan.resource_type,
                &name,
                format!("Delete {} (no longer declared)", name),
            ));
        }

        Ok(Plan::new(actions))
    }

    /// Recorded resources that are no longer declared, dependents first
    ///
    /// Wiring between orphans comes from the inputs recorded in the snapshot.
    fn orphan_order(&self, state: &GlobalState) -> Result<Vec<String>> {
        let orphans: BTreeMap<&String, _> = state
            .resources
            .iter()
            .filter(|(name, r)| {
                r.status != ResourceStatus::Deleted && self.resources.get(name).is_none()
            })
            .collect();

        let mut graph = DependencyGraph::new();
        for (name, orphan) in &orphans {
            graph.add_node(name);
            for reference in output::references(&orphan.inputs) {
                if reference.resource != **name && orphans.contains_key(&reference.resource) {
                    graph.add_dependency(name, &reference.resource);
                }
            }
        }

        let mut order = graph.resolve_order()?;
        order.reverse();
        Ok(order)
    }

    /// Resolve deferred values against a snapshot
    pub fn evaluate(&self, state: &GlobalState) -> Result<Evaluation> {
        evaluation::evaluate(self, state)
    }
}

/// Top-level input keys whose values differ
fn changed_keys(previous: &Value, desired: &Value) -> Vec<String> {
    match (previous.as_object(), desired.as_object()) {
        (Some(old), Some(new)) => {
            let mut keys: Vec<String> = old
                .keys()
                .chain(new.keys())
                .filter(|k| old.get(*k) != new.get(*k))
                .cloned()
                .collect();
            keys.sort();
            keys.dedup();
            keys
        }
        _ => vec!["*".to_string()],
    }
}

/// Static description of a stack in dependency order
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub project: String,
    pub stack: String,
    pub config: BTreeMap<String, String>,
    pub resources: Vec<ManifestEntry>,
    pub outputs: BTreeMap<String, Value>,
}

/// One node of the manifest
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub resource: ResourceConfig,

    /// Inferred from property wiring
    pub depends_on: Vec<String>,
}
