//! Cloud SQL user resource (`gcp/cloudsql/user`)

use crate::client::GcpCredentials;
use crate::cloudsql::CloudSqlOutputs;
use crate::sqladmin::{RestSqlAdmin, SqlAdmin, SqlUser, UserRequest};
use async_trait::async_trait;
use pragma_core::{
    Config, Dependency, DependencySet, Lifecycle, ResolutionContext, ResourceError, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Host pattern reported when the engine does not scope users by host
const ANY_HOST: &str = "%";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSqlUserConfig {
    pub instance: Dependency<CloudSqlOutputs>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub credentials: GcpCredentials,
}

impl Config for CloudSqlUserConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["username"];

    fn validate(&self) -> Result<()> {
        let name = &self.username;
        if name.is_empty() {
            return Err(ResourceError::Validation("username must not be empty".into()));
        }
        // sent as a query parameter on update and delete
        if name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '?' | '&' | '#' | '/'))
        {
            return Err(ResourceError::Validation(format!(
                "username '{name}' must not contain whitespace, '?', '&', '#' or '/'"
            )));
        }
        if self.password.is_empty() {
            return Err(ResourceError::Validation("password must not be empty".into()));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().required("instance", &self.instance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSqlUserOutputs {
    pub username: String,
    pub project_id: String,
    pub instance_name: String,
    pub host: String,
}

pub struct CloudSqlUser {
    name: String,
    config: CloudSqlUserConfig,
    admin: Arc<dyn SqlAdmin>,
}

impl CloudSqlUser {
    pub fn new(name: impl Into<String>, config: CloudSqlUserConfig) -> Result<Self> {
        let admin = RestSqlAdmin::new(config.credentials.clone())?;
        Ok(Self::with_admin(name, config, Arc::new(admin)))
    }

    pub fn with_admin(
        name: impl Into<String>,
        config: CloudSqlUserConfig,
        admin: Arc<dyn SqlAdmin>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            admin,
        }
    }

    fn request(&self) -> UserRequest {
        UserRequest {
            name: self.config.username.clone(),
            password: self.config.password.clone(),
        }
    }

    async fn find(&self, instance: &CloudSqlOutputs) -> Result<Option<SqlUser>> {
        let users = self
            .admin
            .list_users(&instance.project_id, &instance.instance_name)
            .await?;
        Ok(users.into_iter().find(|u| u.name == self.config.username))
    }

    fn build_outputs(&self, instance: &CloudSqlOutputs, user: Option<SqlUser>) -> CloudSqlUserOutputs {
        let host = user
            .and_then(|u| u.host)
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| ANY_HOST.to_string());
        CloudSqlUserOutputs {
            username: self.config.username.clone(),
            project_id: instance.project_id.clone(),
            instance_name: instance.instance_name.clone(),
            host,
        }
    }

    async fn insert(&self, instance: &CloudSqlOutputs) -> Result<()> {
        let username = &self.config.username;
        match self
            .admin
            .insert_user(&instance.project_id, &instance.instance_name, &self.request())
            .await
        {
            Ok(()) => {
                tracing::info!("Created user {} on {}", username, instance.instance_name);
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                tracing::info!(
                    "User {} already exists on {}, adopting it",
                    username,
                    instance.instance_name
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_from(&self, project: &str, instance: &str) -> Result<()> {
        let username = &self.config.username;
        match self.admin.delete_user(project, instance, username).await {
            Ok(()) => {
                tracing::info!("Removed user {} from {}", username, instance);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("User {} already gone from {}", username, instance);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Lifecycle for CloudSqlUser {
    const PROVIDER: &'static str = "gcp";
    const RESOURCE: &'static str = "cloudsql/user";

    type Config = CloudSqlUserConfig;
    type Outputs = CloudSqlUserOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &CloudSqlUserConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<CloudSqlUserOutputs> {
        let instance = ctx.resolved(&self.config.instance)?;
        self.insert(&instance).await?;
        let user = self.find(&instance).await?;
        Ok(self.build_outputs(&instance, user))
    }

    async fn update(
        &self,
        previous: &CloudSqlUserConfig,
        current: Option<&CloudSqlUserOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<CloudSqlUserOutputs> {
        let instance = ctx.resolved(&self.config.instance)?;

        if previous.instance != self.config.instance {
            match current {
                Some(old) => self.remove_from(&old.project_id, &old.instance_name).await?,
                None => tracing::warn!(
                    "User {} moved from {} without recorded outputs; leaving the old user",
                    self.config.username,
                    previous.instance.id()
                ),
            }
            self.insert(&instance).await?;
        } else if previous.password != self.config.password {
            tracing::info!("Rotating password for user {}", self.config.username);
            self.admin
                .update_user(&instance.project_id, &instance.instance_name, &self.request())
                .await?;
        }

        match self.find(&instance).await? {
            Some(user) => Ok(self.build_outputs(&instance, Some(user))),
            None => Err(ResourceError::State(format!(
                "User '{}' not found on {}",
                self.config.username, instance.instance_name
            ))),
        }
    }

    async fn delete(&self, ctx: &ResolutionContext) -> Result<()> {
        if !ctx.is_resolved(self.config.instance.key()) {
            tracing::warn!(
                "Instance {} is gone; treating user {} as deleted",
                self.config.instance.id(),
                self.config.username
            );
            return Ok(());
        }
        let instance = ctx.resolved(&self.config.instance)?;
        self.remove_from(&instance.project_id, &instance.instance_name)
            .await
    }
}
