//! State snapshots
//!
//! The provisioning engine owns the state of the stack. It exports a JSON
//! snapshot (by default `.labgen/state.json`) which is read here to preview
//! changes and resolve outputs. Nothing in this crate writes or locks state.

use crate::error::{CloudError, Result};
use crate::output::{OutputLookup, OutputRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".labgen";
const STATE_FILE: &str = "state.json";

/// Snapshot of every node the engine knows about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Nodes indexed by logical name
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an exported snapshot
    pub fn from_json(content: &str) -> Result<Self> {
        let state: GlobalState = serde_json::from_str(content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        Ok(state)
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, name: impl Into<String>, state: ResourceState) {
        self.resources.insert(name.into(), state);
        self.updated_at = Utc::now();
    }

    /// Get a resource by logical name
    pub fn get_resource(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }
}

impl OutputLookup for GlobalState {
    fn output(&self, reference: &OutputRef) -> Option<&serde_json::Value> {
        self.resources
            .get(&reference.resource)
            .filter(|r| r.status.is_applied())
            .and_then(|r| r.attributes.get(&reference.attribute))
    }
}

/// State of a single node as recorded by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-specific resource ID
    pub id: String,

    /// Resource type token
    pub resource_type: String,

    /// Current status
    pub status: ResourceStatus,

    /// Inputs the resource was last applied with
    #[serde(default)]
    pub inputs: serde_json::Value,

    /// Output attributes (loginServer, defaultHostName, etc.)
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Unknown,
            inputs: serde_json::Value::Null,
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is being created
    Creating,
    /// Resource is running/active
    Running,
    /// Resource is stopped
    Stopped,
    /// Resource is being deleted
    Deleting,
    /// Resource has been deleted
    Deleted,
    /// Resource is in error state
    Error,
    /// Status is unknown
    Unknown,
}

impl ResourceStatus {
    /// Whether the engine finished applying the resource
    pub fn is_applied(&self) -> bool {
        matches!(self, ResourceStatus::Running | ResourceStatus::Stopped)
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Running => write!(f, "running"),
            ResourceStatus::Stopped => write!(f, "stopped"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Deleted => write!(f, "deleted"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Where a snapshot comes from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Human readable origin for messages
    fn describe(&self) -> String;

    /// Read the snapshot
    async fn load(&self) -> Result<GlobalState>;
}

/// Reads the snapshot file exported next to the project
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    /// Use `<project_root>/.labgen/state.json`
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            path: project_root.as_ref().join(STATE_DIR).join(STATE_FILE),
        }
    }

    /// Use an explicit snapshot file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for StateManager {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    /// Load the snapshot; a missing file is an empty stack
    async fn load(&self) -> Result<GlobalState> {
        if !self.path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let state = GlobalState::from_json(&content)?;

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }
}

/// Reads a snapshot piped on stdin
pub struct StdinSnapshot;

#[async_trait]
impl SnapshotSource for StdinSnapshot {
    fn describe(&self) -> String {
        "<stdin>".to_string()
    }

    async fn load(&self) -> Result<GlobalState> {
        let mut content = String::new();
        tokio::io::stdin().read_to_string(&mut content).await?;
        if content.trim().is_empty() {
            return Ok(GlobalState::new());
        }
        GlobalState::from_json(&content)
    }
}
