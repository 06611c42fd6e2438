//! Cloud SQL instance resource (`gcp/cloudsql/database_instance`)

use crate::client::GcpCredentials;
use crate::logging::{LogReader, RestLogReader};
use crate::sqladmin::{
    AuthorizedNetwork, BackupConfiguration, InstanceRequest, InstanceSettings, IpConfiguration,
    RestSqlAdmin, SqlAdmin, SqlInstance,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pragma_core::health::{self, LogStream};
use pragma_core::{
    Config, ConvergencePoller, HealthCheckable, HealthStatus, Lifecycle, LogEntry, LogLevel,
    LogSource, PollSettings, ResolutionContext, ResourceError, Result, Settings, Verdict,
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_POLL: PollSettings = PollSettings::new(10, 90);

const MAX_INSTANCE_NAME_LEN: usize = 98;
const ROOT_PASSWORD_LEN: usize = 24;
const BACKUP_START_TIME: &str = "03:00";

/// Engine family derived from the `database_version` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseFamily {
    Postgres,
    Mysql,
    SqlServer,
}

impl DatabaseFamily {
    pub fn from_version(version: &str) -> Option<Self> {
        if version.starts_with("POSTGRES_") {
            Some(Self::Postgres)
        } else if version.starts_with("MYSQL_") {
            Some(Self::Mysql)
        } else if version.starts_with("SQLSERVER_") {
            Some(Self::SqlServer)
        } else {
            None
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::Mysql => "mysql",
            Self::SqlServer => "sqlserver",
        }
    }

    pub fn port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Mysql => 3306,
            Self::SqlServer => 1433,
        }
    }
}

fn default_version() -> String {
    "POSTGRES_15".to_string()
}

fn default_tier() -> String {
    "db-f1-micro".to_string()
}

fn default_availability() -> String {
    "ZONAL".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSqlConfig {
    pub project_id: String,
    #[serde(default)]
    pub credentials: GcpCredentials,
    pub region: String,
    pub instance_name: String,
    #[serde(default = "default_version")]
    pub database_version: String,
    #[serde(default = "default_tier")]
    pub tier: String,
    #[serde(default = "default_availability")]
    pub availability_type: String,
    #[serde(default = "default_true")]
    pub backup_enabled: bool,
    #[serde(default)]
    pub deletion_protection: bool,
    #[serde(default = "default_true")]
    pub enable_public_ip: bool,
    #[serde(default)]
    pub authorized_networks: Vec<String>,
}

fn validate_instance_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(ResourceError::Validation(format!(
            "instance_name '{name}' {reason}"
        )))
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.len() > MAX_INSTANCE_NAME_LEN {
        return invalid("must be at most 98 characters");
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return invalid("must start with a lowercase letter");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return invalid("may only contain lowercase letters, digits and hyphens");
    }
    if name.ends_with('-') {
        return invalid("must not end with a hyphen");
    }
    Ok(())
}

impl Config for CloudSqlConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] =
        &["project_id", "region", "instance_name", "database_version"];

    fn validate(&self) -> Result<()> {
        validate_instance_name(&self.instance_name)?;
        if DatabaseFamily::from_version(&self.database_version).is_none() {
            return Err(ResourceError::Validation(format!(
                "database_version '{}' must start with POSTGRES_, MYSQL_ or SQLSERVER_",
                self.database_version
            )));
        }
        Ok(())
    }
}

impl CloudSqlConfig {
    pub fn family(&self) -> DatabaseFamily {
        DatabaseFamily::from_version(&self.database_version).unwrap_or(DatabaseFamily::Postgres)
    }

    fn connection_name(&self) -> String {
        format!(
            "{}:{}:{}",
            self.project_id, self.region, self.instance_name
        )
    }

    fn settings(&self) -> InstanceSettings {
        InstanceSettings {
            tier: self.tier.clone(),
            availability_type: self.availability_type.clone(),
            ip_configuration: IpConfiguration {
                ipv4_enabled: self.enable_public_ip,
                authorized_networks: self
                    .authorized_networks
                    .iter()
                    .enumerate()
                    .map(|(i, cidr)| AuthorizedNetwork {
                        name: format!("network-{i}"),
                        value: cidr.clone(),
                    })
                    .collect(),
            },
            deletion_protection_enabled: self.deletion_protection,
            backup_configuration: BackupConfiguration {
                enabled: self.backup_enabled,
                start_time: BACKUP_START_TIME.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSqlOutputs {
    pub project_id: String,
    pub instance_name: String,
    pub database_version: String,
    pub connection_name: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub port: u16,
    /// `scheme://host:port`, preferring the private address
    pub url: Option<String>,
    pub ready: bool,
    pub console_url: String,
    pub logs_url: String,
}

impl CloudSqlOutputs {
    pub fn family(&self) -> DatabaseFamily {
        DatabaseFamily::from_version(&self.database_version).unwrap_or(DatabaseFamily::Postgres)
    }

    /// Address clients connect to: public IP, then private IP, then the connection name
    pub fn host(&self) -> &str {
        self.public_ip
            .as_deref()
            .or(self.private_ip.as_deref())
            .unwrap_or(&self.connection_name)
    }
}

fn generate_root_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ROOT_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn runnable(instance: &SqlInstance) -> Verdict {
    match instance.state.as_str() {
        "RUNNABLE" => Verdict::Ready,
        "FAILED" | "SUSPENDED" => Verdict::Failed(instance.state.clone()),
        _ => Verdict::Pending,
    }
}

pub struct CloudSqlInstance {
    name: String,
    config: CloudSqlConfig,
    admin: Arc<dyn SqlAdmin>,
    logs: Arc<dyn LogReader>,
    poller: ConvergencePoller,
}

impl CloudSqlInstance {
    pub fn new(name: impl Into<String>, config: CloudSqlConfig) -> Result<Self> {
        let admin = RestSqlAdmin::new(config.credentials.clone())?;
        let logs = RestLogReader::new(config.credentials.clone())?;
        Ok(Self::with_clients(
            name,
            config,
            Arc::new(admin),
            Arc::new(logs),
        ))
    }

    pub fn with_clients(
        name: impl Into<String>,
        config: CloudSqlConfig,
        admin: Arc<dyn SqlAdmin>,
        logs: Arc<dyn LogReader>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            admin,
            logs,
            poller: ConvergencePoller::from_settings(DEFAULT_POLL),
        }
    }

    pub fn with_poller(mut self, poller: ConvergencePoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_settings(self, settings: &Settings) -> Self {
        let poller =
            ConvergencePoller::for_resource(settings, Self::PROVIDER, Self::RESOURCE, DEFAULT_POLL);
        self.with_poller(poller)
    }

    fn instance_request(&self) -> InstanceRequest {
        InstanceRequest {
            name: self.config.instance_name.clone(),
            database_version: self.config.database_version.clone(),
            region: self.config.region.clone(),
            settings: self.config.settings(),
            root_password: Some(generate_root_password()),
        }
    }

    fn build_outputs(&self, instance: &SqlInstance) -> CloudSqlOutputs {
        let project = &self.config.project_id;
        let name = &self.config.instance_name;
        let family = self.config.family();

        let public_ip = instance.address("PRIMARY").map(str::to_string);
        let private_ip = instance.address("PRIVATE").map(str::to_string);
        let url = private_ip
            .as_deref()
            .or(public_ip.as_deref())
            .map(|host| format!("{}://{}:{}", family.scheme(), host, family.port()));

        CloudSqlOutputs {
            project_id: project.clone(),
            instance_name: name.clone(),
            database_version: self.config.database_version.clone(),
            connection_name: self.config.connection_name(),
            public_ip,
            private_ip,
            port: family.port(),
            url,
            ready: instance.state == "RUNNABLE",
            console_url: format!(
                "https://console.cloud.google.com/sql/instances/{name}/overview?project={project}"
            ),
            logs_url: format!(
                "https://console.cloud.google.com/logs/query;\
                 query=resource.type%3D%22cloudsql_database%22%0A\
                 resource.labels.database_id%3D%22{project}%3A{name}%22\
                 ?project={project}"
            ),
        }
    }

    fn log_filter(&self, since: Option<DateTime<Utc>>) -> String {
        let mut parts = vec![
            r#"resource.type="cloudsql_database""#.to_string(),
            format!(
                r#"resource.labels.database_id="{}:{}""#,
                self.config.project_id, self.config.instance_name
            ),
        ];
        if let Some(since) = since {
            parts.push(format!(
                r#"timestamp>="{}""#,
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        parts.join(" AND ")
    }

    async fn wait_for_runnable(&self) -> Result<SqlInstance> {
        let admin = self.admin.as_ref();
        let project = self.config.project_id.as_str();
        let instance = self.config.instance_name.as_str();
        self.poller
            .wait_until(
                instance,
                move || async move {
                    admin
                        .get_instance(project, instance)
                        .await
                        .map_err(ResourceError::from)
                },
                runnable,
            )
            .await
    }

    async fn wait_for_deletion(&self) -> Result<()> {
        let admin = self.admin.as_ref();
        let project = self.config.project_id.as_str();
        let instance = self.config.instance_name.as_str();
        self.poller
            .wait_until_gone(instance, move || async move {
                admin
                    .get_instance(project, instance)
                    .await
                    .map_err(ResourceError::from)
            })
            .await
    }
}

#[async_trait]
impl Lifecycle for CloudSqlInstance {
    const PROVIDER: &'static str = "gcp";
    const RESOURCE: &'static str = "cloudsql/database_instance";

    type Config = CloudSqlConfig;
    type Outputs = CloudSqlOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &CloudSqlConfig {
        &self.config
    }

    async fn create(&self, _ctx: &ResolutionContext) -> Result<CloudSqlOutputs> {
        let project = &self.config.project_id;
        let existing = self
            .admin
            .get_instance(project, &self.config.instance_name)
            .await?;

        if existing.is_none() {
            match self
                .admin
                .insert_instance(project, &self.instance_request())
                .await
            {
                Ok(()) => tracing::info!("Requested Cloud SQL instance {}", self.config.instance_name),
                Err(e) if e.is_already_exists() => {
                    tracing::warn!(
                        "Cloud SQL instance {} appeared concurrently, adopting it",
                        self.config.instance_name
                    );
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            tracing::info!(
                "Cloud SQL instance {} already exists, adopting it",
                self.config.instance_name
            );
        }

        let instance = self.wait_for_runnable().await?;
        Ok(self.build_outputs(&instance))
    }

    async fn update(
        &self,
        previous: &CloudSqlConfig,
        _current: Option<&CloudSqlOutputs>,
        _ctx: &ResolutionContext,
    ) -> Result<CloudSqlOutputs> {
        let settings = self.config.settings();
        if previous.settings() != settings {
            tracing::info!("Patching Cloud SQL instance {}", self.config.instance_name);
            self.admin
                .patch_instance(
                    &self.config.project_id,
                    &self.config.instance_name,
                    &settings,
                )
                .await?;
        }
        let instance = self.wait_for_runnable().await?;
        Ok(self.build_outputs(&instance))
    }

    async fn delete(&self, _ctx: &ResolutionContext) -> Result<()> {
        match self
            .admin
            .delete_instance(&self.config.project_id, &self.config.instance_name)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "Cloud SQL instance {} already deleted",
                    self.config.instance_name
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        self.wait_for_deletion().await
    }
}

#[async_trait]
impl HealthCheckable for CloudSqlInstance {
    async fn health(&self, _ctx: &ResolutionContext) -> Result<HealthStatus> {
        let instance = self
            .admin
            .get_instance(&self.config.project_id, &self.config.instance_name)
            .await?;
        let Some(instance) = instance else {
            return Ok(HealthStatus::unhealthy("Instance not found"));
        };

        Ok(match instance.state.as_str() {
            "RUNNABLE" => HealthStatus::healthy("Instance is running")
                .with_detail("tier", self.config.tier.clone()),
            state @ ("PENDING_CREATE" | "MAINTENANCE") => HealthStatus::degraded(format!(
                "Instance is {}",
                state.to_lowercase().replace('_', " ")
            )),
            state => HealthStatus::unhealthy(format!("Instance state: {state}")),
        })
    }
}

#[async_trait]
impl LogSource for CloudSqlInstance {
    async fn logs(
        &self,
        _ctx: &ResolutionContext,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> Result<LogStream> {
        let filter = self.log_filter(since);
        let mut entries = self
            .logs
            .list_entries(&self.config.project_id, &filter, tail)
            .await?;
        // listed newest first
        entries.reverse();

        let entries = entries
            .into_iter()
            .map(|entry| {
                let level = entry
                    .severity
                    .as_deref()
                    .map(LogLevel::from_severity)
                    .unwrap_or(LogLevel::Info);
                let mut log = LogEntry::new(
                    entry.timestamp.unwrap_or_else(Utc::now),
                    level,
                    entry.message(),
                );
                if let Some(log_name) = entry.log_name {
                    log = log.with_metadata("log_name", log_name);
                }
                log
            })
            .collect();

        Ok(health::from_entries(entries))
    }
}
