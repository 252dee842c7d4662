//! Container image build and push

use crate::error::{AzureError, Result};
use labgen_infra_cloud::{Input, Output, Resource, SecretInput, interpolate};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Target platform of every image build
pub const PLATFORM: &str = "linux/amd64";

#[derive(Debug, Clone, Serialize)]
pub struct DockerBuild {
    pub context: String,
    pub platform: String,
}

/// Push target and its credentials
#[derive(Debug, Clone, Serialize)]
pub struct ImageRegistry {
    pub server: Input,
    pub username: SecretInput,
    pub password: SecretInput,
}

/// Image built from the application directory and pushed to the registry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(skip)]
    name: String,
    image_name: Input,
    build: DockerBuild,
    registry: ImageRegistry,
}

impl Image {
    pub fn new(
        name: impl Into<String>,
        image_name: Input,
        context: impl Into<String>,
        registry: ImageRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            image_name,
            build: DockerBuild {
                context: context.into(),
                platform: PLATFORM.to_string(),
            },
            registry,
        }
    }

    /// Fully qualified reference of the pushed image
    pub fn image_name(&self) -> Output {
        Output::new(&self.name, "imageName")
    }
}

impl Resource for Image {
    fn resource_type(&self) -> &str {
        "docker:index:Image"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        "docker"
    }
}

/// `{loginServer}/{name}:{tag}`
pub fn image_reference(login_server: &Output, name: &str, tag: &str) -> Input {
    interpolate!(login_server, format!("/{}:{}", name, tag))
}

/// Local directory the image is built from
#[derive(Debug, Clone)]
pub struct BuildContext {
    path: PathBuf,
}

impl BuildContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the directory exists
    ///
    /// A missing Dockerfile is only reported; the engine's build fails
    /// with its own message in that case.
    pub fn check(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Err(AzureError::BuildContextNotFound(self.path.clone()));
        }

        if !self.path.is_dir() {
            return Err(AzureError::InvalidBuildContext(self.path.clone()));
        }

        let dockerfile = self.path.join("Dockerfile");
        if dockerfile.exists() {
            tracing::debug!("Found Dockerfile at: {}", dockerfile.display());
            Ok(Some(dockerfile))
        } else {
            tracing::warn!("No Dockerfile in build context {}", self.path.display());
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labgen_infra_cloud::output::resolve;
    use labgen_infra_cloud::{OutputLookup, OutputRef, ResourceConfig, Secret};
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::tempdir;

    struct LoginServer(Value);

    impl OutputLookup for LoginServer {
        fn output(&self, reference: &OutputRef) -> Option<&Value> {
            (reference.resource == "crlabgen" && reference.attribute == "loginServer")
                .then_some(&self.0)
        }
    }

    fn login_server() -> Output {
        Output::new("crlabgen", "loginServer")
    }

    fn push_target() -> ImageRegistry {
        ImageRegistry {
            server: login_server().into(),
            username: Output::<Secret>::new("creds", "username").into(),
            password: Output::<Secret>::new("creds", "password").into(),
        }
    }

    #[test]
    fn test_image_reference() {
        let reference = image_reference(&login_server(), "lab-gen-app", "v2");
        let lookup = LoginServer(json!("crlabgen1a2b.azurecr.io"));
        let resolved = resolve(&serde_json::to_value(&reference).unwrap(), &lookup).unwrap();
        assert_eq!(resolved, json!("crlabgen1a2b.azurecr.io/lab-gen-app:v2"));
    }

    #[test]
    fn test_image_inputs() {
        let image = Image::new(
            "image",
            image_reference(&login_server(), "lab-gen-app", "latest"),
            "./..",
            push_target(),
        );
        let config = ResourceConfig::from_resource(&image).unwrap();

        assert_eq!(config.provider, "docker");
        assert_eq!(config.config["build"], json!({"context": "./..", "platform": "linux/amd64"}));
        assert_eq!(
            config.config["registry"]["password"],
            json!({"$secret": {"$output": {"resource": "creds", "attribute": "password"}}})
        );
        assert_eq!(
            config.dependencies().into_iter().collect::<Vec<_>>(),
            vec!["creds".to_string(), "crlabgen".to_string()]
        );
    }

    #[test]
    fn test_build_context_with_dockerfile() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("Dockerfile"), "FROM python:3.12-slim").unwrap();

        let dockerfile = BuildContext::new(temp_dir.path()).check().unwrap();
        assert_eq!(dockerfile, Some(temp_dir.path().join("Dockerfile")));
    }

    #[test]
    fn test_build_context_without_dockerfile() {
        let temp_dir = tempdir().unwrap();
        assert_eq!(BuildContext::new(temp_dir.path()).check().unwrap(), None);
    }

    #[test]
    fn test_build_context_not_found() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing");

        let result = BuildContext::new(&missing).check();
        assert!(matches!(result, Err(AzureError::BuildContextNotFound(p)) if p == missing));
    }

    #[test]
    fn test_build_context_is_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("app.py");
        fs::write(&file, "print()").unwrap();

        let result = BuildContext::new(&file).check();
        assert!(matches!(result, Err(AzureError::InvalidBuildContext(_))));
    }
}
