//! lab-gen infrastructure: resource graph core
//!
//! This crate models a declarative resource graph whose nodes are wired
//! together through deferred output references. It produces the static
//! description consumed by the provisioning engine and can preview it
//! against a state snapshot exported by that engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 labgen-infra CLI                 │
//! │        (validate / render / preview / outputs)   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │              labgen-infra-azure                  │
//! │   typed declarations + registry credentials      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │              labgen-infra-cloud                  │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ Output/Input │  │ Stack/Graph  │             │
//! │  └──────────────┘  └──────────────┘             │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ Plan/Action  │  │  Snapshots   │             │
//! │  └──────────────┘  └──────────────┘             │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Applying, destroying and storing state are the engine's job.

pub mod action;
pub mod error;
pub mod evaluation;
pub mod graph;
pub mod output;
pub mod resource;
pub mod stack;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use evaluation::{Evaluation, NodeEvaluation, NodeStatus};
pub use graph::DependencyGraph;
pub use output::{
    Fragment, Input, Output, OutputLookup, OutputRef, Plain, REDACTED, Secret, SecretInput,
};
pub use resource::{Resource, ResourceConfig, ResourceMode, ResourceSet};
pub use stack::{Lookup, Manifest, ManifestEntry, Stack};
pub use state::{
    GlobalState, ResourceState, ResourceStatus, SnapshotSource, StateManager, StdinSnapshot,
};
