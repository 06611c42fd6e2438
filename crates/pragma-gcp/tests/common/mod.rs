#![allow(dead_code)]

use async_trait::async_trait;
use pragma_gcp::container::{Cluster, ClusterManager, ClusterRequest, MasterAuth, ReleaseChannel};
use pragma_gcp::logging::{CloudLogEntry, LogReader};
use pragma_gcp::sqladmin::{
    InstanceRequest, InstanceSettings, IpMapping, SqlAdmin, SqlInstance, SqlUser, UserRequest,
};
use pragma_core::{ProviderHarness, ResourceKey};
use pragma_gcp::{CloudSqlOutputs, GcpError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Next observed status; the last one repeats forever. `None` means absent.
#[derive(Default)]
struct Script(Mutex<VecDeque<Option<String>>>);

impl Script {
    fn set(&self, statuses: &[Option<&str>]) {
        *self.0.lock().unwrap() = statuses.iter().map(|s| s.map(String::from)).collect();
    }

    fn next(&self) -> Option<String> {
        let mut script = self.0.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().flatten()
        } else {
            script.front().cloned().flatten()
        }
    }
}

#[derive(Default)]
pub struct FakeClusters {
    pub creates: AtomicU32,
    pub gets: AtomicU32,
    pub channel_updates: AtomicU32,
    pub deletes: AtomicU32,
    pub create_conflict: Mutex<bool>,
    pub delete_missing: Mutex<bool>,
    pub last_request: Mutex<Option<ClusterRequest>>,
    pub last_channel: Mutex<Option<ReleaseChannel>>,
    script: Script,
}

impl FakeClusters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, statuses: &[Option<&str>]) {
        self.script.set(statuses);
    }

    pub fn writes(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
            + self.channel_updates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterManager for FakeClusters {
    async fn create_cluster(&self, _parent: &str, cluster: &ClusterRequest) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(cluster.clone());
        if *self.create_conflict.lock().unwrap() {
            return Err(GcpError::AlreadyExists(cluster.name.clone()));
        }
        Ok(())
    }

    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.next().map(|status| Cluster {
            name: name.rsplit('/').next().unwrap_or(name).to_string(),
            endpoint: "34.90.0.1".into(),
            status,
            status_message: None,
            location: "europe-west4".into(),
            master_auth: MasterAuth {
                cluster_ca_certificate: "LS0tLS1CRUdJTg==".into(),
            },
        }))
    }

    async fn set_release_channel(&self, _name: &str, channel: ReleaseChannel) -> Result<()> {
        self.channel_updates.fetch_add(1, Ordering::SeqCst);
        *self.last_channel.lock().unwrap() = Some(channel);
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if *self.delete_missing.lock().unwrap() {
            return Err(GcpError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSqlAdmin {
    pub inserts: AtomicU32,
    pub gets: AtomicU32,
    pub patches: AtomicU32,
    pub deletes: AtomicU32,
    pub delete_missing: Mutex<bool>,
    pub last_insert: Mutex<Option<InstanceRequest>>,
    pub last_patch: Mutex<Option<InstanceSettings>>,
    /// `project/instance/name` of every database that exists
    pub databases: Mutex<Vec<String>>,
    /// `(project/instance, user)` of every user that exists
    pub users: Mutex<Vec<(String, UserRequest)>>,
    pub user_updates: AtomicU32,
    script: Script,
}

impl FakeSqlAdmin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, statuses: &[Option<&str>]) {
        self.script.set(statuses);
    }

    pub fn writes(&self) -> u32 {
        self.inserts.load(Ordering::SeqCst)
            + self.patches.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlAdmin for FakeSqlAdmin {
    async fn get_instance(&self, project: &str, instance: &str) -> Result<Option<SqlInstance>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.next().map(|state| SqlInstance {
            name: instance.to_string(),
            state,
            connection_name: format!("{project}:europe-west4:{instance}"),
            ip_addresses: vec![IpMapping {
                kind: "PRIMARY".into(),
                ip_address: "34.1.2.3".into(),
            }],
        }))
    }

    async fn insert_instance(&self, _project: &str, request: &InstanceRequest) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        *self.last_insert.lock().unwrap() = Some(request.clone());
        Ok(())
    }

    async fn patch_instance(
        &self,
        _project: &str,
        _instance: &str,
        settings: &InstanceSettings,
    ) -> Result<()> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        *self.last_patch.lock().unwrap() = Some(settings.clone());
        Ok(())
    }

    async fn delete_instance(&self, _project: &str, instance: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if *self.delete_missing.lock().unwrap() {
            return Err(GcpError::NotFound(instance.to_string()));
        }
        Ok(())
    }

    async fn insert_database(&self, project: &str, instance: &str, database: &str) -> Result<()> {
        let id = format!("{project}/{instance}/{database}");
        let mut databases = self.databases.lock().unwrap();
        if databases.contains(&id) {
            return Err(GcpError::AlreadyExists(id));
        }
        databases.push(id);
        Ok(())
    }

    async fn delete_database(&self, project: &str, instance: &str, database: &str) -> Result<()> {
        let id = format!("{project}/{instance}/{database}");
        let mut databases = self.databases.lock().unwrap();
        let before = databases.len();
        databases.retain(|d| *d != id);
        if databases.len() == before {
            return Err(GcpError::NotFound(id));
        }
        Ok(())
    }

    async fn list_users(&self, project: &str, instance: &str) -> Result<Vec<SqlUser>> {
        let scope = format!("{project}/{instance}");
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == scope)
            .map(|(_, user)| SqlUser {
                name: user.name.clone(),
                host: None,
            })
            .collect())
    }

    async fn insert_user(&self, project: &str, instance: &str, user: &UserRequest) -> Result<()> {
        let scope = format!("{project}/{instance}");
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|(s, u)| *s == scope && u.name == user.name) {
            return Err(GcpError::AlreadyExists(user.name.clone()));
        }
        users.push((scope, user.clone()));
        Ok(())
    }

    async fn update_user(&self, project: &str, instance: &str, user: &UserRequest) -> Result<()> {
        self.user_updates.fetch_add(1, Ordering::SeqCst);
        let scope = format!("{project}/{instance}");
        let mut users = self.users.lock().unwrap();
        match users
            .iter_mut()
            .find(|(s, u)| *s == scope && u.name == user.name)
        {
            Some((_, existing)) => {
                existing.password = user.password.clone();
                Ok(())
            }
            None => Err(GcpError::NotFound(user.name.clone())),
        }
    }

    async fn delete_user(&self, project: &str, instance: &str, name: &str) -> Result<()> {
        let scope = format!("{project}/{instance}");
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|(s, u)| !(*s == scope && u.name == name));
        if users.len() == before {
            return Err(GcpError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLogs {
    pub entries: Mutex<Vec<CloudLogEntry>>,
    pub last_filter: Mutex<Option<String>>,
}

impl FakeLogs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl LogReader for FakeLogs {
    async fn list_entries(
        &self,
        _project: &str,
        filter: &str,
        limit: usize,
    ) -> Result<Vec<CloudLogEntry>> {
        *self.last_filter.lock().unwrap() = Some(filter.to_string());
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Outputs of a RUNNABLE Postgres instance named `instance` in `proj`
pub fn instance_outputs(instance: &str) -> CloudSqlOutputs {
    CloudSqlOutputs {
        project_id: "proj".into(),
        instance_name: instance.into(),
        database_version: "POSTGRES_15".into(),
        connection_name: format!("proj:europe-west4:{instance}"),
        public_ip: Some("34.1.2.3".into()),
        private_ip: None,
        port: 5432,
        url: Some("postgresql://34.1.2.3:5432".into()),
        ready: true,
        console_url: String::new(),
        logs_url: String::new(),
    }
}

/// Harness with `gcp/cloudsql/database_instance/<instance>` published
pub async fn harness_with_instances(instances: &[&str]) -> ProviderHarness {
    let harness = ProviderHarness::new();
    for instance in instances {
        let key = ResourceKey::parse(&format!("gcp/cloudsql/database_instance/{instance}")).unwrap();
        harness.seed(&key, &instance_outputs(instance)).await.unwrap();
    }
    harness
}
