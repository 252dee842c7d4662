//! Resolution of deferred values against a state snapshot

use crate::error::{CloudError, Result};
use crate::output::{self, OutputLookup, OutputRef};
use crate::resource::ResourceMode;
use crate::stack::Stack;
use crate::state::GlobalState;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Outcome for one node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Every input is known; secrets are redacted
    Resolved { inputs: Value },
    /// An upstream output does not exist yet
    Pending { waiting_on: OutputRef },
    /// The node itself could not be evaluated
    Failed { reason: String },
    /// An upstream node failed; this node must not proceed
    Blocked { dependency: String, reason: String },
}

impl NodeStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, NodeStatus::Resolved { .. })
    }
}

/// Evaluation of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeEvaluation {
    pub name: String,
    pub resource_type: String,
    pub mode: ResourceMode,
    #[serde(flatten)]
    pub status: NodeStatus,
}

/// Result of resolving a whole stack
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    /// Nodes in dependency order
    pub nodes: Vec<NodeEvaluation>,

    /// Exports; `None` until every output they read exists
    pub outputs: BTreeMap<String, Option<Value>>,
}

impl Evaluation {
    pub fn node(&self, name: &str) -> Option<&NodeEvaluation> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name).and_then(|v| v.as_ref())
    }

    /// Whether every node resolved
    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_resolved())
    }

    /// Nodes that failed or are blocked by a failure
    pub fn failures(&self) -> Vec<&NodeEvaluation> {
        self.nodes
            .iter()
            .filter(|n| {
                matches!(
                    n.status,
                    NodeStatus::Failed { .. } | NodeStatus::Blocked { .. }
                )
            })
            .collect()
    }
}

/// Snapshot outputs overlaid with lookup results of this evaluation
///
/// Lookup outputs only exist once the lookup was read in this evaluation;
/// values recorded in the snapshot under a lookup's name are never used.
struct Known<'a> {
    state: &'a GlobalState,
    stack: &'a Stack,
    lookups: HashMap<String, BTreeMap<String, Value>>,
}

impl OutputLookup for Known<'_> {
    fn output(&self, reference: &OutputRef) -> Option<&Value> {
        if let Some(outputs) = self.lookups.get(&reference.resource) {
            return outputs.get(&reference.attribute);
        }
        let is_lookup = self
            .stack
            .resources()
            .get(&reference.resource)
            .is_some_and(|r| r.mode == ResourceMode::Lookup);
        if is_lookup {
            None
        } else {
            self.state.output(reference)
        }
    }
}

pub(crate) fn evaluate(stack: &Stack, state: &GlobalState) -> Result<Evaluation> {
    let graph = stack.graph()?;
    let mut known = Known {
        state,
        stack,
        lookups: HashMap::new(),
    };
    // node -> root cause, for every failed or blocked node
    let mut failed: HashMap<String, String> = HashMap::new();
    let mut nodes = Vec::new();

    for name in graph.resolve_order()? {
        let resource = stack
            .resources()
            .get(&name)
            .ok_or_else(|| CloudError::ResourceNotFound(name.clone()))?;

        let blocked_by = graph
            .dependencies_of(&name)
            .into_iter()
            .find_map(|dep| failed.get(&dep).map(|reason| (dep, reason.clone())));

        let status = if let Some((dependency, reason)) = blocked_by {
            tracing::debug!("{} blocked by {}", name, dependency);
            failed.insert(name.clone(), reason.clone());
            NodeStatus::Blocked { dependency, reason }
        } else {
            match output::resolve(&resource.config, &known) {
                Ok(inputs) => match (resource.mode, stack.lookup(&name)) {
                    (ResourceMode::Lookup, Some(lookup)) => {
                        match lookup.read(&inputs, state) {
                            Ok(outputs) => {
                                known.lookups.insert(name.clone(), outputs);
                                NodeStatus::Resolved { inputs }
                            }
                            Err(e) => {
                                let reason = e.to_string();
                                failed.insert(name.clone(), reason.clone());
                                NodeStatus::Failed { reason }
                            }
                        }
                    }
                    _ => NodeStatus::Resolved { inputs },
                },
                Err(CloudError::OutputUnavailable {
                    resource,
                    attribute,
                }) => NodeStatus::Pending {
                    waiting_on: OutputRef::new(resource, attribute),
                },
                Err(e) => {
                    let reason = e.to_string();
                    failed.insert(name.clone(), reason.clone());
                    NodeStatus::Failed { reason }
                }
            }
        };

        nodes.push(NodeEvaluation {
            name: name.clone(),
            resource_type: resource.resource_type.clone(),
            mode: resource.mode,
            status,
        });
    }

    let mut outputs = BTreeMap::new();
    for (name, export) in stack.exports() {
        let value = serde_json::to_value(export)?;
        let upstream_failed = output::references(&value)
            .iter()
            .any(|r| failed.contains_key(&r.resource));
        let resolved = if upstream_failed {
            None
        } else {
            match output::resolve(&value, &known) {
                Ok(resolved) => Some(resolved),
                Err(CloudError::OutputUnavailable { .. }) => None,
                Err(e) => return Err(e),
            }
        };
        outputs.insert(name.clone(), resolved);
    }

    Ok(Evaluation { nodes, outputs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolate;
    use crate::output::{Input, Output, Plain, Secret, SecretInput};
    use crate::resource::Resource;
    use crate::state::{ResourceState, ResourceStatus};
    use serde_json::json;

    #[derive(Serialize)]
    struct Store {
        #[serde(skip)]
        name: String,
    }

    impl Resource for Store {
        fn resource_type(&self) -> &str {
            "test:index:Store"
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn provider(&self) -> &str {
            "test"
        }
    }

    /// Lookup that hands out a key only when the store allows it
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct StoreKey {
        #[serde(skip)]
        name: String,
        store_name: Input,
    }

    impl Resource for StoreKey {
        fn resource_type(&self) -> &str {
            "test:index:getStoreKey"
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn provider(&self) -> &str {
            "test"
        }
        fn mode(&self) -> ResourceMode {
            ResourceMode::Lookup
        }
        fn secret_outputs(&self) -> &[&'static str] {
            &["key"]
        }
    }

    impl crate::stack::Lookup for StoreKey {
        fn read(&self, inputs: &Value, state: &GlobalState) -> Result<BTreeMap<String, Value>> {
            assert_eq!(inputs["storeName"], json!("store-physical"));
            let store = state
                .get_resource("store")
                .ok_or_else(|| CloudError::ResourceNotFound("store".to_string()))?;
            if store.get_attribute::<bool>("keysEnabled") != Some(true) {
                return Err(CloudError::LookupFailed {
                    lookup: self.name.clone(),
                    reason: "keys disabled".to_string(),
                });
            }
            Ok(BTreeMap::from([("key".to_string(), json!("k-123"))]))
        }
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Consumer {
        #[serde(skip)]
        name: String,
        key: SecretInput,
    }

    impl Resource for Consumer {
        fn resource_type(&self) -> &str {
            "test:index:Consumer"
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn provider(&self) -> &str {
            "test"
        }
    }

    fn stack() -> Stack {
        let store_name: Output<Plain> = Output::new("store", "name");
        let key: Output<Secret> = Output::new("store-key", "key");
        let host: Output<Plain> = Output::new("consumer", "host");

        let mut stack = Stack::new("proj", "dev");
        stack
            .add(&Store {
                name: "store".to_string(),
            })
            .unwrap();
        stack
            .add_lookup(StoreKey {
                name: "store-key".to_string(),
                store_name: store_name.into(),
            })
            .unwrap();
        stack
            .add(&Consumer {
                name: "consumer".to_string(),
                key: key.into(),
            })
            .unwrap();
        stack.export("url", interpolate!("https://", host));
        stack
    }

    fn store_state(keys_enabled: bool) -> GlobalState {
        let mut state = GlobalState::new();
        state.set_resource(
            "store",
            ResourceState::new("/id/store", "test:index:Store")
                .with_status(ResourceStatus::Running)
                .with_attribute("name", json!("store-physical"))
                .with_attribute("keysEnabled", json!(keys_enabled)),
        );
        state
    }

    #[test]
    fn test_everything_pending_on_empty_state() {
        let evaluation = stack().evaluate(&GlobalState::new()).unwrap();

        assert!(evaluation.node("store").unwrap().status.is_resolved());
        assert_eq!(
            evaluation.node("store-key").unwrap().status,
            NodeStatus::Pending {
                waiting_on: OutputRef::new("store", "name")
            }
        );
        assert!(matches!(
            evaluation.node("consumer").unwrap().status,
            NodeStatus::Pending { .. }
        ));
        assert_eq!(evaluation.output("url"), None);
    }

    #[test]
    fn test_lookup_outputs_flow_into_secret_slots() {
        let evaluation = stack().evaluate(&store_state(true)).unwrap();

        let consumer = evaluation.node("consumer").unwrap();
        assert_eq!(
            consumer.status,
            NodeStatus::Resolved {
                inputs: json!({"key": crate::output::REDACTED})
            }
        );
    }

    #[test]
    fn test_failed_lookup_blocks_consumers() {
        let mut state = store_state(false);
        state.set_resource(
            "consumer",
            ResourceState::new("/id/consumer", "test:index:Consumer")
                .with_status(ResourceStatus::Running)
                .with_attribute("host", json!("consumer.example.net")),
        );

        let evaluation = stack().evaluate(&state).unwrap();

        assert!(matches!(
            evaluation.node("store-key").unwrap().status,
            NodeStatus::Failed { .. }
        ));
        match &evaluation.node("consumer").unwrap().status {
            NodeStatus::Blocked { dependency, reason } => {
                assert_eq!(dependency, "store-key");
                assert!(reason.contains("keys disabled"));
            }
            other => panic!("expected blocked, got {:?}", other),
        }
        assert_eq!(evaluation.failures().len(), 2);
        assert_eq!(evaluation.output("url"), None);
    }

    #[test]
    fn test_recorded_lookup_values_are_not_reused() {
        let mut state = GlobalState::new();
        state.set_resource(
            "store",
            ResourceState::new("/id/store", "test:index:Store")
                .with_status(ResourceStatus::Creating),
        );
        state.set_resource(
            "store-key",
            ResourceState::new("store-key", "test:index:getStoreKey")
                .with_status(ResourceStatus::Running)
                .with_attribute("key", json!("k-stale")),
        );

        let evaluation = stack().evaluate(&state).unwrap();

        assert!(matches!(
            evaluation.node("store-key").unwrap().status,
            NodeStatus::Pending { .. }
        ));
        assert_eq!(
            evaluation.node("consumer").unwrap().status,
            NodeStatus::Pending {
                waiting_on: OutputRef::new("store-key", "key")
            }
        );
    }

    #[test]
    fn test_export_of_object_output_is_an_error() {
        let mut stack = stack();
        let host: Output<Plain> = Output::new("consumer", "host");
        stack.export("banner", interpolate!("host: ", host));

        let mut state = store_state(true);
        state.set_resource(
            "consumer",
            ResourceState::new("/id/consumer", "test:index:Consumer")
                .with_status(ResourceStatus::Running)
                .with_attribute("host", json!({"primary": "consumer.example.net"})),
        );

        let result = stack.evaluate(&state);
        assert!(matches!(result, Err(CloudError::NotInterpolable { .. })));
    }

    #[test]
    fn test_export_resolves_after_apply() {
        let mut state = store_state(true);
        state.set_resource(
            "consumer",
            ResourceState::new("/id/consumer", "test:index:Consumer")
                .with_status(ResourceStatus::Running)
                .with_attribute("host", json!("consumer.example.net")),
        );

        let evaluation = stack().evaluate(&state).unwrap();
        assert!(evaluation.is_complete());
        assert_eq!(
            evaluation.output("url"),
            Some(&json!("https://consumer.example.net"))
        );
    }
}
