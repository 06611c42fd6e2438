//! Cloud SQL Admin control plane (sqladmin.googleapis.com)

use crate::client::{GcpCredentials, RestClient};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

const SQLADMIN_API: &str = "https://sqladmin.googleapis.com/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMapping {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub ip_address: String,
}

/// Instance as reported by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlInstance {
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub connection_name: String,
    #[serde(default)]
    pub ip_addresses: Vec<IpMapping>,
}

impl SqlInstance {
    /// First address of the given type (`PRIMARY`, `PRIVATE`)
    pub fn address(&self, kind: &str) -> Option<&str> {
        self.ip_addresses
            .iter()
            .find(|ip| ip.kind == kind)
            .map(|ip| ip.ip_address.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedNetwork {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfiguration {
    pub ipv4_enabled: bool,
    pub authorized_networks: Vec<AuthorizedNetwork>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfiguration {
    pub enabled: bool,
    pub start_time: String,
}

/// Mutable part of an instance; sent whole on insert and on patch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    pub tier: String,
    pub availability_type: String,
    pub ip_configuration: IpConfiguration,
    pub deletion_protection_enabled: bool,
    pub backup_configuration: BackupConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    pub name: String,
    pub database_version: String,
    pub region: String,
    pub settings: InstanceSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_password: Option<String>,
}

/// Database user as listed by the API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqlUser {
    pub name: String,
    /// `%` (any host) when the engine does not scope users by host
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    items: Vec<SqlUser>,
}

/// Body of a user insert or password update
#[derive(Clone, PartialEq, Serialize)]
pub struct UserRequest {
    pub name: String,
    pub password: String,
}

impl fmt::Debug for UserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRequest")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait SqlAdmin: Send + Sync {
    /// `None` when the instance does not exist
    async fn get_instance(&self, project: &str, instance: &str) -> Result<Option<SqlInstance>>;

    async fn insert_instance(&self, project: &str, request: &InstanceRequest) -> Result<()>;

    async fn patch_instance(
        &self,
        project: &str,
        instance: &str,
        settings: &InstanceSettings,
    ) -> Result<()>;

    async fn delete_instance(&self, project: &str, instance: &str) -> Result<()>;

    async fn insert_database(&self, project: &str, instance: &str, database: &str) -> Result<()>;

    async fn delete_database(&self, project: &str, instance: &str, database: &str) -> Result<()>;

    /// Empty when the instance does not exist
    async fn list_users(&self, project: &str, instance: &str) -> Result<Vec<SqlUser>>;

    async fn insert_user(&self, project: &str, instance: &str, user: &UserRequest) -> Result<()>;

    async fn update_user(&self, project: &str, instance: &str, user: &UserRequest) -> Result<()>;

    async fn delete_user(&self, project: &str, instance: &str, name: &str) -> Result<()>;
}

pub struct RestSqlAdmin {
    client: RestClient,
}

impl RestSqlAdmin {
    pub fn new(credentials: GcpCredentials) -> Result<Self> {
        Self::with_base_url(SQLADMIN_API, credentials)
    }

    pub fn with_base_url(base_url: &str, credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            client: RestClient::new(base_url, credentials)?,
        })
    }
}

fn instance_path(project: &str, instance: &str) -> String {
    format!("projects/{project}/instances/{instance}")
}

fn users_path(project: &str, instance: &str) -> String {
    format!("{}/users", instance_path(project, instance))
}

#[async_trait]
impl SqlAdmin for RestSqlAdmin {
    async fn get_instance(&self, project: &str, instance: &str) -> Result<Option<SqlInstance>> {
        self.client.get(&instance_path(project, instance)).await
    }

    async fn insert_instance(&self, project: &str, request: &InstanceRequest) -> Result<()> {
        self.client
            .post(&format!("projects/{project}/instances"), request)
            .await?;
        Ok(())
    }

    async fn patch_instance(
        &self,
        project: &str,
        instance: &str,
        settings: &InstanceSettings,
    ) -> Result<()> {
        let body = serde_json::json!({ "settings": settings });
        self.client
            .patch(&instance_path(project, instance), &body)
            .await?;
        Ok(())
    }

    async fn delete_instance(&self, project: &str, instance: &str) -> Result<()> {
        self.client.delete(&instance_path(project, instance)).await
    }

    async fn insert_database(&self, project: &str, instance: &str, database: &str) -> Result<()> {
        let body = serde_json::json!({
            "name": database,
            "project": project,
            "instance": instance,
        });
        self.client
            .post(&format!("{}/databases", instance_path(project, instance)), &body)
            .await?;
        Ok(())
    }

    async fn delete_database(&self, project: &str, instance: &str, database: &str) -> Result<()> {
        self.client
            .delete(&format!(
                "{}/databases/{database}",
                instance_path(project, instance)
            ))
            .await
    }

    async fn list_users(&self, project: &str, instance: &str) -> Result<Vec<SqlUser>> {
        let list: Option<UserList> = self.client.get(&users_path(project, instance)).await?;
        Ok(list.map(|l| l.items).unwrap_or_default())
    }

    async fn insert_user(&self, project: &str, instance: &str, user: &UserRequest) -> Result<()> {
        self.client.post(&users_path(project, instance), user).await?;
        Ok(())
    }

    async fn update_user(&self, project: &str, instance: &str, user: &UserRequest) -> Result<()> {
        let path = format!("{}?name={}", users_path(project, instance), user.name);
        self.client.put(&path, user).await?;
        Ok(())
    }

    async fn delete_user(&self, project: &str, instance: &str, name: &str) -> Result<()> {
        self.client
            .delete(&format!("{}?name={name}", users_path(project, instance)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_addresses() {
        let instance: SqlInstance = serde_json::from_str(
            r#"{
                "name": "db",
                "state": "RUNNABLE",
                "connectionName": "p:r:db",
                "ipAddresses": [
                    {"type": "PRIVATE", "ipAddress": "10.0.0.3"},
                    {"type": "PRIMARY", "ipAddress": "34.1.2.3"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(instance.address("PRIMARY"), Some("34.1.2.3"));
        assert_eq!(instance.address("PRIVATE"), Some("10.0.0.3"));
        assert_eq!(instance.address("OUTGOING"), None);
    }

    #[test]
    fn test_request_omits_missing_password() {
        let request = InstanceRequest {
            name: "db".into(),
            database_version: "POSTGRES_15".into(),
            region: "europe-west4".into(),
            settings: InstanceSettings {
                tier: "db-f1-micro".into(),
                availability_type: "ZONAL".into(),
                ip_configuration: IpConfiguration {
                    ipv4_enabled: true,
                    authorized_networks: vec![],
                },
                deletion_protection_enabled: false,
                backup_configuration: BackupConfiguration {
                    enabled: true,
                    start_time: "03:00".into(),
                },
            },
            root_password: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("rootPassword").is_none());
        assert_eq!(value["settings"]["ipConfiguration"]["ipv4Enabled"], true);
        assert_eq!(value["databaseVersion"], "POSTGRES_15");
    }

    #[test]
    fn test_user_password_not_in_debug() {
        let user = UserRequest {
            name: "app".into(),
            password: "hunter22".into(),
        };
        assert!(!format!("{user:?}").contains("hunter22"));
        let body = serde_json::to_value(&user).unwrap();
        assert_eq!(body["password"], "hunter22");
    }

    #[test]
    fn test_user_list_tolerates_missing_items() {
        let list: UserList = serde_json::from_str(r#"{"kind": "sql#usersList"}"#).unwrap();
        assert!(list.items.is_empty());

        let list: UserList = serde_json::from_str(
            r#"{"items": [{"name": "postgres"}, {"name": "app", "host": "%"}]}"#,
        )
        .unwrap();
        assert_eq!(list.items[1].host.as_deref(), Some("%"));
    }
}
