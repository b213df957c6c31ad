//! Environment resource lifecycle registry.
//!
//! Subsystems that own resources inside an environment (shares, consumption
//! roles, ...) implement [`EnvironmentResource`] and are handed to the
//! [`EnvironmentResourceManager`] when it is built. The environment service
//! then fans counts, updates and deletions out to every registered handler.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::error::ShareResult;
use crate::models::Environment;

/// Capability set of one resource handler. Every method defaults to a no-op,
/// so a handler only overrides the events it cares about.
#[async_trait]
pub trait EnvironmentResource: Send + Sync {
    /// Human readable name used in logs.
    fn name(&self) -> &str;

    /// Resources this handler owns for `group_uri` in `environment`.
    async fn count_resources(
        &self,
        _environment: &Environment,
        _group_uri: &str,
    ) -> ShareResult<usize> {
        Ok(0)
    }

    async fn delete_env(&self, _environment: &Environment) -> ShareResult<()> {
        Ok(())
    }

    /// Apply an environment update. Returns whether the infrastructure stack
    /// must be redeployed.
    async fn update_env(&self, _environment: &Environment) -> ShareResult<bool> {
        Ok(false)
    }

    async fn count_role_resources(&self, _role_uri: &str) -> ShareResult<usize> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct EnvironmentResourceManager {
    resources: Vec<Arc<dyn EnvironmentResource>>,
}

impl EnvironmentResourceManager {
    pub fn new(resources: Vec<Arc<dyn EnvironmentResource>>) -> Self {
        Self { resources }
    }

    pub fn register(&mut self, resource: Arc<dyn EnvironmentResource>) {
        debug!("Registering environment resource handler {}", resource.name());
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub async fn count_group_resources(
        &self,
        environment: &Environment,
        group_uri: &str,
    ) -> ShareResult<usize> {
        let mut total = 0;
        for resource in &self.resources {
            total += resource.count_resources(environment, group_uri).await?;
        }
        Ok(total)
    }

    /// Whether an update of `environment` requires a stack redeploy: the
    /// resource prefix changed, or any handler asks for one. Every handler
    /// sees the update either way.
    pub async fn deploy_updated_stack(
        &self,
        previous_prefix: &str,
        environment: &Environment,
    ) -> ShareResult<bool> {
        let mut deploy = previous_prefix != environment.resource_prefix;
        for resource in &self.resources {
            deploy |= resource.update_env(environment).await?;
        }
        if deploy {
            info!("Environment {} requires a stack update", environment.environment_uri);
        }
        Ok(deploy)
    }

    pub async fn delete_env(&self, environment: &Environment) -> ShareResult<()> {
        for resource in &self.resources {
            debug!(
                "Deleting {} resources of environment {}",
                resource.name(),
                environment.environment_uri
            );
            resource.delete_env(environment).await?;
        }
        Ok(())
    }

    pub async fn count_consumption_role_resources(&self, role_uri: &str) -> ShareResult<usize> {
        let mut total = 0;
        for resource in &self.resources {
            total += resource.count_role_resources(role_uri).await?;
        }
        Ok(total)
    }
}
