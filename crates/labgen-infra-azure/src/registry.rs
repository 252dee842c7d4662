//! Container registry and its admin credentials

use crate::error::{AzureError, Result};
use crate::resources::PROVIDER;
use labgen_infra_cloud::{
    CloudError, GlobalState, Input, Lookup, Output, REDACTED, Resource, ResourceMode, Secret,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkuName {
    Basic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sku {
    pub name: SkuName,
}

/// Private container registry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(skip)]
    name: String,
    resource_group_name: Input,
    admin_user_enabled: bool,
    sku: Sku,
}

impl Registry {
    /// Basic registry with the admin user enabled
    pub fn new(name: impl Into<String>, resource_group_name: impl Into<Input>) -> Self {
        Self {
            name: name.into(),
            resource_group_name: resource_group_name.into(),
            admin_user_enabled: true,
            sku: Sku {
                name: SkuName::Basic,
            },
        }
    }

    /// Physical (globally unique) registry name
    pub fn registry_name(&self) -> Output {
        Output::new(&self.name, "name")
    }

    /// Host name images are pushed to (e.g. "crlabgen1234.azurecr.io")
    pub fn login_server(&self) -> Output {
        Output::new(&self.name, "loginServer")
    }
}

impl Resource for Registry {
    fn resource_type(&self) -> &str {
        "azure-native:containerregistry:Registry"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}

/// Admin username and password of a registry
///
/// Implements `Debug` manually to redact both values.
pub struct Credentials {
    pub username: SecretString,
    pub password: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &REDACTED)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Raw `listRegistryCredentials` result
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsResponse {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub passwords: Vec<RegistryPassword>,
}

#[derive(Deserialize)]
pub struct RegistryPassword {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl std::fmt::Debug for RegistryPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryPassword")
            .field("name", &self.name)
            .field("value", &self.value.as_ref().map(|_| REDACTED))
            .finish()
    }
}

impl Credentials {
    /// Take the username and the first password of a lookup result
    pub fn from_response(response: CredentialsResponse) -> Result<Self> {
        let username = response
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AzureError::CredentialsUnavailable("no username returned".to_string()))?;
        let password = response
            .passwords
            .into_iter()
            .next()
            .and_then(|p| p.value)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AzureError::CredentialsUnavailable("no password returned".to_string()))?;

        Ok(Self {
            username: SecretString::from(username),
            password: SecretString::from(password),
        })
    }
}

/// Lookup of the registry's admin credentials
///
/// Read again on every evaluation; the values are handed to the image push
/// and the web app and are never stored by this crate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentials {
    #[serde(skip)]
    name: String,
    #[serde(skip)]
    registry: String,
    resource_group_name: Input,
    registry_name: Input,
}

impl RegistryCredentials {
    pub fn new(registry: &Registry, resource_group_name: impl Into<Input>) -> Self {
        Self {
            name: format!("{}-credentials", registry.name),
            registry: registry.name.clone(),
            resource_group_name: resource_group_name.into(),
            registry_name: registry.registry_name().into(),
        }
    }

    pub fn username(&self) -> Output<Secret> {
        Output::new(&self.name, "username")
    }

    pub fn password(&self) -> Output<Secret> {
        Output::new(&self.name, "password")
    }

    fn read_credentials(&self, state: &GlobalState) -> Result<Credentials> {
        let registry = state
            .get_resource(&self.registry)
            .filter(|r| r.status.is_applied())
            .ok_or_else(|| {
                AzureError::CredentialsUnavailable(format!(
                    "registry '{}' has not been created",
                    self.registry
                ))
            })?;

        if registry.get_attribute::<bool>("adminUserEnabled") == Some(false) {
            return Err(AzureError::CredentialsUnavailable(format!(
                "admin user is disabled on registry '{}'",
                self.registry
            )));
        }

        let result = state.get_resource(&self.name).ok_or_else(|| {
            AzureError::CredentialsUnavailable(format!(
                "no credentials reported for registry '{}'",
                self.registry
            ))
        })?;

        let attributes: serde_json::Map<String, Value> = result
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let response: CredentialsResponse = serde_json::from_value(Value::Object(attributes))?;

        tracing::debug!("Read admin credentials of registry {}", self.registry);
        Credentials::from_response(response)
    }
}

impl Resource for RegistryCredentials {
    fn resource_type(&self) -> &str {
        "azure-native:containerregistry:listRegistryCredentials"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn mode(&self) -> ResourceMode {
        ResourceMode::Lookup
    }

    fn secret_outputs(&self) -> &[&'static str] {
        &["username", "password"]
    }
}

impl Lookup for RegistryCredentials {
    fn read(
        &self,
        _inputs: &Value,
        state: &GlobalState,
    ) -> labgen_infra_cloud::Result<BTreeMap<String, Value>> {
        let credentials = self.read_credentials(state).map_err(|e| CloudError::LookupFailed {
            lookup: self.name.clone(),
            reason: match e {
                AzureError::CredentialsUnavailable(reason) => reason,
                other => other.to_string(),
            },
        })?;

        Ok(BTreeMap::from([
            (
                "username".to_string(),
                Value::String(credentials.username.expose_secret().to_string()),
            ),
            (
                "password".to_string(),
                Value::String(credentials.password.expose_secret().to_string()),
            ),
        ]))
    }
}
