//! The lab-gen stack: every node wired together

use crate::error::Result;
use crate::image::{BuildContext, Image, ImageRegistry, image_reference};
use crate::registry::{Registry, RegistryCredentials};
use crate::resources::{AppServicePlan, Component, ResourceGroup};
use crate::webapp::{WebApp, app_settings, endpoint};
use labgen_infra_cloud::Stack;
use labgen_infra_config::{APP_PATH, IMAGE_NAME, IMAGE_TAG, PROJECT, StackConfig};

pub const RESOURCE_GROUP: &str = "rg-lab-gen";
pub const REGISTRY: &str = "crlabgen";
pub const IMAGE: &str = "image";

/// Stack output holding the public URL
pub const ENDPOINT: &str = "endpoint";

/// Declare the whole stack for the given configuration
pub fn declare(config: &StackConfig) -> Result<Stack> {
    let app_path = config.app_path();
    let image_name = config.image_name();
    let image_tag = config.image_tag();

    let mut stack = Stack::new(PROJECT, config.stack());
    stack.set_config(format!("{}:{}", PROJECT, APP_PATH), app_path);
    stack.set_config(format!("{}:{}", PROJECT, IMAGE_NAME), image_name);
    stack.set_config(format!("{}:{}", PROJECT, IMAGE_TAG), image_tag);

    let resource_group = ResourceGroup::new(RESOURCE_GROUP);
    stack.add(&resource_group)?;

    let registry = Registry::new(REGISTRY, resource_group.name_output());
    stack.add(&registry)?;

    let credentials = RegistryCredentials::new(&registry, resource_group.name_output());

    let plan = AppServicePlan::linux_basic(
        format!("plan-{}", image_name),
        resource_group.name_output(),
    );
    stack.add(&plan)?;

    let image = Image::new(
        IMAGE,
        image_reference(&registry.login_server(), image_name, image_tag),
        app_path,
        ImageRegistry {
            server: registry.login_server().into(),
            username: credentials.username().into(),
            password: credentials.password().into(),
        },
    );
    stack.add(&image)?;

    let insights = Component::web(format!("ai-{}", image_name), resource_group.name_output());
    stack.add(&insights)?;

    let app = WebApp::new(
        format!("app-{}", image_name),
        resource_group.name_output(),
        plan.id(),
        &image,
        app_settings(&registry, &credentials, &insights),
    )?;
    stack.add(&app)?;

    stack.add_lookup(credentials)?;
    stack.export(ENDPOINT, endpoint(&app));

    stack.graph()?;
    tracing::info!(
        "Declared stack {}/{} with {} nodes",
        PROJECT,
        config.stack(),
        stack.resources().len()
    );
    Ok(stack)
}

/// Build context of the image, resolved against the stack file's directory
pub fn build_context(config: &StackConfig) -> BuildContext {
    BuildContext::new(config.build_context())
}
