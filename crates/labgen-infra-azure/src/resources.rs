//! Resource group, App Service plan and Application Insights component

use labgen_infra_cloud::{Input, Output, Resource};
use serde::Serialize;

/// Provider name for every azure-native resource
pub const PROVIDER: &str = "azure-native";

/// Logical container for every other resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroup {
    #[serde(skip)]
    name: String,
}

impl ResourceGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Physical name assigned by the provider
    pub fn name_output(&self) -> Output {
        Output::new(&self.name, "name")
    }
}

impl Resource for ResourceGroup {
    fn resource_type(&self) -> &str {
        "azure-native:resources:ResourceGroup"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}

/// Pricing tier of an App Service plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuDescription {
    pub name: String,
    pub tier: String,
}

/// Compute tier hosting the web app
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppServicePlan {
    #[serde(skip)]
    name: String,
    resource_group_name: Input,
    kind: String,
    reserved: bool,
    sku: SkuDescription,
}

impl AppServicePlan {
    /// Linux plan on the Basic B1 tier
    pub fn linux_basic(name: impl Into<String>, resource_group_name: impl Into<Input>) -> Self {
        Self {
            name: name.into(),
            resource_group_name: resource_group_name.into(),
            kind: "Linux".to_string(),
            reserved: true,
            sku: SkuDescription {
                name: "B1".to_string(),
                tier: "Basic".to_string(),
            },
        }
    }

    /// ARM resource ID, used as the web app's server farm
    pub fn id(&self) -> Output {
        Output::new(&self.name, "id")
    }
}

impl Resource for AppServicePlan {
    fn resource_type(&self) -> &str {
        "azure-native:web:AppServicePlan"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestionMode {
    ApplicationInsights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    Web,
}

/// Application Insights component collecting the app's telemetry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(skip)]
    name: String,
    resource_group_name: Input,
    kind: String,
    ingestion_mode: IngestionMode,
    application_type: ApplicationType,
}

impl Component {
    /// Web application component ingesting into Application Insights
    pub fn web(name: impl Into<String>, resource_group_name: impl Into<Input>) -> Self {
        Self {
            name: name.into(),
            resource_group_name: resource_group_name.into(),
            kind: "web".to_string(),
            ingestion_mode: IngestionMode::ApplicationInsights,
            application_type: ApplicationType::Web,
        }
    }

    pub fn instrumentation_key(&self) -> Output {
        Output::new(&self.name, "instrumentationKey")
    }
}

impl Resource for Component {
    fn resource_type(&self) -> &str {
        "azure-native:insights:Component"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}
