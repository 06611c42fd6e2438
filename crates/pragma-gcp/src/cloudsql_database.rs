//! Cloud SQL database resource (`gcp/cloudsql/database`)
//!
//! Lives inside a [`CloudSqlInstance`](crate::CloudSqlInstance). Moving it to
//! another instance drops it from the old one and creates it in the new one;
//! the data is not copied.

use crate::client::GcpCredentials;
use crate::cloudsql::CloudSqlOutputs;
use crate::sqladmin::{RestSqlAdmin, SqlAdmin};
use async_trait::async_trait;
use pragma_core::{
    Config, Dependency, DependencySet, Lifecycle, ResolutionContext, ResourceError, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_DATABASE_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSqlDatabaseConfig {
    pub instance: Dependency<CloudSqlOutputs>,
    pub database_name: String,
    #[serde(default)]
    pub credentials: GcpCredentials,
}

impl Config for CloudSqlDatabaseConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["database_name"];

    fn validate(&self) -> Result<()> {
        let name = &self.database_name;
        if name.is_empty() || name.len() > MAX_DATABASE_NAME_LEN {
            return Err(ResourceError::Validation(format!(
                "database_name '{name}' must be 1 to 63 characters"
            )));
        }
        if name.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ResourceError::Validation(format!(
                "database_name '{name}' must not contain whitespace or '/'"
            )));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().required("instance", &self.instance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSqlDatabaseOutputs {
    pub database_name: String,
    pub project_id: String,
    pub instance_name: String,
    pub host: String,
    pub port: u16,
    /// Without credentials
    pub url: String,
}

pub struct CloudSqlDatabase {
    name: String,
    config: CloudSqlDatabaseConfig,
    admin: Arc<dyn SqlAdmin>,
}

impl CloudSqlDatabase {
    pub fn new(name: impl Into<String>, config: CloudSqlDatabaseConfig) -> Result<Self> {
        let admin = RestSqlAdmin::new(config.credentials.clone())?;
        Ok(Self::with_admin(name, config, Arc::new(admin)))
    }

    pub fn with_admin(
        name: impl Into<String>,
        config: CloudSqlDatabaseConfig,
        admin: Arc<dyn SqlAdmin>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            admin,
        }
    }

    fn build_outputs(&self, instance: &CloudSqlOutputs) -> CloudSqlDatabaseOutputs {
        let host = instance.host().to_string();
        let family = instance.family();
        CloudSqlDatabaseOutputs {
            database_name: self.config.database_name.clone(),
            project_id: instance.project_id.clone(),
            instance_name: instance.instance_name.clone(),
            url: format!(
                "{}://{}:{}/{}",
                family.scheme(),
                host,
                family.port(),
                self.config.database_name
            ),
            host,
            port: family.port(),
        }
    }

    async fn insert(&self, instance: &CloudSqlOutputs) -> Result<()> {
        let database = &self.config.database_name;
        match self
            .admin
            .insert_database(&instance.project_id, &instance.instance_name, database)
            .await
        {
            Ok(()) => {
                tracing::info!("Created database {} on {}", database, instance.instance_name);
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                tracing::info!(
                    "Database {} already exists on {}, adopting it",
                    database,
                    instance.instance_name
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_from(&self, project: &str, instance: &str) -> Result<()> {
        let database = &self.config.database_name;
        match self.admin.delete_database(project, instance, database).await {
            Ok(()) => {
                tracing::info!("Dropped database {} from {}", database, instance);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Database {} already gone from {}", database, instance);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Lifecycle for CloudSqlDatabase {
    const PROVIDER: &'static str = "gcp";
    const RESOURCE: &'static str = "cloudsql/database";

    type Config = CloudSqlDatabaseConfig;
    type Outputs = CloudSqlDatabaseOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &CloudSqlDatabaseConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<CloudSqlDatabaseOutputs> {
        let instance = ctx.resolved(&self.config.instance)?;
        self.insert(&instance).await?;
        Ok(self.build_outputs(&instance))
    }

    async fn update(
        &self,
        previous: &CloudSqlDatabaseConfig,
        current: Option<&CloudSqlDatabaseOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<CloudSqlDatabaseOutputs> {
        let instance = ctx.resolved(&self.config.instance)?;
        if previous.instance != self.config.instance {
            match current {
                Some(old) => self.drop_from(&old.project_id, &old.instance_name).await?,
                None => tracing::warn!(
                    "Database {} moved from {} without recorded outputs; leaving the old copy",
                    self.config.database_name,
                    previous.instance.id()
                ),
            }
            self.insert(&instance).await?;
        }
        Ok(self.build_outputs(&instance))
    }

    async fn delete(&self, ctx: &ResolutionContext) -> Result<()> {
        if !ctx.is_resolved(self.config.instance.key()) {
            tracing::warn!(
                "Instance {} is gone; treating database {} as deleted",
                self.config.instance.id(),
                self.config.database_name
            );
            return Ok(());
        }
        let instance = ctx.resolved(&self.config.instance)?;
        self.drop_from(&instance.project_id, &instance.instance_name)
            .await
    }
}
