//! Persisted resource state
//!
//! [`StateManager`] keeps `<state_dir>/state.json`, which records the last
//! applied config and outputs of every resource. Both it and the in-memory
//! [`MemoryStore`] act as the [`OutputsSource`] dependencies resolve against.

use crate::dependency::OutputsSource;
use crate::error::{ResourceError, Result};
use crate::lifecycle::LifecycleState;
use crate::resource::ResourceKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

const STATE_VERSION: u32 = 1;
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";

/// Everything recorded in the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by `provider/resource/name`
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records belonging to one provider
    pub fn provider_resources(&self, provider: &str) -> Vec<&ResourceRecord> {
        self.resources
            .values()
            .filter(|r| r.key.provider == provider)
            .collect()
    }

    pub fn set(&mut self, record: ResourceRecord) {
        self.resources.insert(record.key.id(), record);
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self, key: &ResourceKey) -> Option<ResourceRecord> {
        let result = self.resources.remove(&key.id());
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceRecord> {
        self.resources.get(&key.id())
    }
}

/// Last known state of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub key: ResourceKey,

    pub state: LifecycleState,

    /// Config as last applied
    pub config: serde_json::Value,

    /// Outputs of the last successful create or update
    pub outputs: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(key: ResourceKey, config: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            key,
            state: LifecycleState::Uncreated,
            config,
            outputs: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }

    pub fn with_outputs(mut self, outputs: serde_json::Value) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn outputs_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.outputs
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Reads and writes the state file
pub struct StateManager {
    state_dir: PathBuf,
    write: Mutex<()>,
}

impl StateManager {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            write: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &pragma_config::Settings) -> Self {
        Self::new(&settings.state_dir)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(ResourceError::State(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Write the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Load, insert or replace one record, save
    pub async fn record(&self, record: ResourceRecord) -> Result<()> {
        let _guard = self.write.lock().await;
        let mut state = self.load().await?;
        let record = match state.get(&record.key) {
            Some(existing) => ResourceRecord {
                created_at: existing.created_at,
                updated_at: Utc::now(),
                ..record
            },
            None => record,
        };
        state.set(record);
        self.save(&state).await
    }

    /// Load, drop one record, save
    pub async fn forget(&self, key: &ResourceKey) -> Result<()> {
        let _guard = self.write.lock().await;
        let mut state = self.load().await?;
        if state.remove(key).is_some() {
            self.save(&state).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl OutputsSource for StateManager {
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<serde_json::Value>> {
        let state = self.load().await?;
        Ok(state
            .get(key)
            .filter(|r| r.state == LifecycleState::Ready)
            .and_then(|r| r.outputs.clone()))
    }
}

/// Outputs held in memory, for tests and single-process orchestration
#[derive(Default)]
pub struct MemoryStore {
    outputs: RwLock<BTreeMap<ResourceKey, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put<T: Serialize>(&self, key: &ResourceKey, outputs: &T) -> Result<()> {
        let value = serde_json::to_value(outputs)?;
        self.outputs.write().await.insert(key.clone(), value);
        Ok(())
    }

    pub async fn remove(&self, key: &ResourceKey) {
        self.outputs.write().await.remove(key);
    }

    pub async fn contains(&self, key: &ResourceKey) -> bool {
        self.outputs.read().await.contains_key(key)
    }
}

#[async_trait]
impl OutputsSource for MemoryStore {
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<serde_json::Value>> {
        Ok(self.outputs.read().await.get(key).cloned())
    }
}
