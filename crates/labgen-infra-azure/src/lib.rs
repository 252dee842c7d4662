//! Azure resources of the lab-gen deployment
//!
//! Typed declarations for the nodes of the lab-gen stack and the
//! [`declare`] function wiring them into a [`labgen_infra_cloud::Stack`].
//!
//! # Nodes
//!
//! - Resource group, container registry (admin user enabled, Basic SKU)
//! - Registry credentials lookup (secret username and password)
//! - Linux App Service plan (B1), Application Insights component
//! - Docker image built from `appPath` and pushed to the registry
//! - Web app running the image, exporting `endpoint`
//!
//! # Example
//!
//! ```ignore
//! use labgen_infra_config::StackConfig;
//!
//! let config = StackConfig::load("dev")?;
//! let stack = labgen_infra_azure::declare(&config)?;
//! let manifest = stack.manifest()?;
//! ```

pub mod error;
pub mod image;
pub mod registry;
pub mod resources;
pub mod stack;
pub mod webapp;

pub use error::{AzureError, Result};
pub use image::{BuildContext, DockerBuild, Image, ImageRegistry, image_reference};
pub use registry::{Credentials, Registry, RegistryCredentials};
pub use resources::{AppServicePlan, Component, ResourceGroup};
pub use stack::{ENDPOINT, build_context, declare};
pub use webapp::{APP_SETTING_KEYS, NameValuePair, SettingValue, WebApp, app_settings, endpoint};
