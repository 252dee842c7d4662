//! Web app running the image, and its environment

use crate::error::{AzureError, Result};
use crate::image::Image;
use crate::registry::{Registry, RegistryCredentials};
use crate::resources::{Component, PROVIDER};
use labgen_infra_cloud::{Input, Output, Resource, SecretInput, interpolate};
use serde::Serialize;
use std::collections::HashSet;

/// Environment variable names injected into the container
pub const APP_SETTING_KEYS: [&str; 10] = [
    "WEBSITES_ENABLE_APP_SERVICE_STORAGE",
    "DOCKER_REGISTRY_SERVER_URL",
    "DOCKER_REGISTRY_SERVER_USERNAME",
    "DOCKER_REGISTRY_SERVER_PASSWORD",
    "LAB_GEN_PORT",
    "LAB_GEN_HOST",
    "WEBSITES_PORT",
    "APPINSIGHTS_INSTRUMENTATIONKEY",
    "APPLICATIONINSIGHTS_CONNECTION_STRING",
    "ApplicationInsightsAgent_EXTENSION_VERSION",
];

/// Port the application listens on inside the container
pub const APP_PORT: &str = "80";

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Plain(Input),
    Secret(SecretInput),
}

impl SettingValue {
    pub fn is_secret(&self) -> bool {
        matches!(self, SettingValue::Secret(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NameValuePair {
    pub name: String,
    pub value: SettingValue,
}

impl NameValuePair {
    pub fn plain(name: impl Into<String>, value: impl Into<Input>) -> Self {
        Self {
            name: name.into(),
            value: SettingValue::Plain(value.into()),
        }
    }

    pub fn secret(name: impl Into<String>, value: impl Into<SecretInput>) -> Self {
        Self {
            name: name.into(),
            value: SettingValue::Secret(value.into()),
        }
    }
}

/// The app's environment: registry pull settings, ports and telemetry
pub fn app_settings(
    registry: &Registry,
    credentials: &RegistryCredentials,
    insights: &Component,
) -> Vec<NameValuePair> {
    let instrumentation_key = insights.instrumentation_key();
    vec![
        NameValuePair::plain("WEBSITES_ENABLE_APP_SERVICE_STORAGE", "false"),
        NameValuePair::plain(
            "DOCKER_REGISTRY_SERVER_URL",
            interpolate!("https://", registry.login_server()),
        ),
        NameValuePair::secret("DOCKER_REGISTRY_SERVER_USERNAME", credentials.username()),
        NameValuePair::secret("DOCKER_REGISTRY_SERVER_PASSWORD", credentials.password()),
        NameValuePair::plain("LAB_GEN_PORT", APP_PORT),
        NameValuePair::plain("LAB_GEN_HOST", "0.0.0.0"),
        NameValuePair::plain("WEBSITES_PORT", APP_PORT),
        NameValuePair::plain("APPINSIGHTS_INSTRUMENTATIONKEY", &instrumentation_key),
        NameValuePair::plain(
            "APPLICATIONINSIGHTS_CONNECTION_STRING",
            interpolate!("InstrumentationKey=", &instrumentation_key),
        ),
        NameValuePair::plain("ApplicationInsightsAgent_EXTENSION_VERSION", "~2"),
    ]
}

/// Reject empty or repeated setting names
pub fn validate_app_settings(settings: &[NameValuePair]) -> Result<()> {
    let mut seen = HashSet::new();
    for setting in settings {
        if setting.name.trim().is_empty() {
            return Err(AzureError::EmptyAppSettingName);
        }
        if !seen.insert(setting.name.as_str()) {
            return Err(AzureError::DuplicateAppSetting(setting.name.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub app_settings: Vec<NameValuePair>,
    pub always_on: bool,
    pub linux_fx_version: Input,
    pub detailed_error_logging_enabled: bool,
}

/// Linux web app pulling the image from the registry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebApp {
    #[serde(skip)]
    name: String,
    resource_group_name: Input,
    server_farm_id: Input,
    site_config: SiteConfig,
    https_only: bool,
}

impl WebApp {
    pub fn new(
        name: impl Into<String>,
        resource_group_name: impl Into<Input>,
        server_farm_id: impl Into<Input>,
        image: &Image,
        app_settings: Vec<NameValuePair>,
    ) -> Result<Self> {
        validate_app_settings(&app_settings)?;
        Ok(Self {
            name: name.into(),
            resource_group_name: resource_group_name.into(),
            server_farm_id: server_farm_id.into(),
            site_config: SiteConfig {
                app_settings,
                always_on: true,
                linux_fx_version: interpolate!("DOCKER|", image.image_name()),
                detailed_error_logging_enabled: true,
            },
            https_only: true,
        })
    }

    /// Host name assigned by App Service
    pub fn default_host_name(&self) -> Output {
        Output::new(&self.name, "defaultHostName")
    }
}

impl Resource for WebApp {
    fn resource_type(&self) -> &str {
        "azure-native:web:WebApp"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}

/// Public URL of the app
pub fn endpoint(app: &WebApp) -> Input {
    interpolate!("https://", app.default_host_name())
}
