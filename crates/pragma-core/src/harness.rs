//! Test harness for provider authors
//!
//! Runs lifecycle operations through a real [`ResourceDriver`] backed by an
//! in-memory outputs store. Upstream outputs are seeded by hand; outputs of
//! successful creates and updates are published so later invocations can
//! depend on them.

use crate::action::{Action, Plan};
use crate::dependency::{DependencySet, OutputsSource, ResolutionContext};
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::health::{HealthStatus, LogStream};
use crate::lifecycle::{HealthCheckable, Lifecycle, LifecycleState, LogSource, ResourceDriver};
use crate::resource::ResourceKey;
use crate::state::MemoryStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one harness call, with the driver for state assertions
pub struct Invocation<R: Lifecycle, T> {
    pub result: Result<T>,
    pub driver: ResourceDriver<R>,
}

impl<R: Lifecycle, T> Invocation<R, T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn state(&self) -> LifecycleState {
        self.driver.state()
    }
}

#[derive(Default, Clone)]
pub struct ProviderHarness {
    store: Arc<MemoryStore>,
}

impl ProviderHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    pub fn source(&self) -> Arc<dyn OutputsSource> {
        self.store.clone()
    }

    /// Fresh resolution context over the seeded outputs
    pub fn context(&self) -> ResolutionContext {
        ResolutionContext::new(self.source())
    }

    /// Publish outputs for an upstream resource
    pub async fn seed<T: Serialize>(&self, key: &ResourceKey, outputs: &T) -> Result<()> {
        self.store.put(key, outputs).await
    }

    async fn publish<R: Lifecycle>(&self, driver: &ResourceDriver<R>) -> Result<()> {
        match driver.outputs() {
            Some(outputs) => self.store.put(&driver.key(), outputs).await,
            None => {
                self.store.remove(&driver.key()).await;
                Ok(())
            }
        }
    }

    pub async fn create<R: Lifecycle>(&self, resource: R) -> Invocation<R, R::Outputs> {
        let mut driver = ResourceDriver::new(resource, self.source());
        let mut result = driver.create().await;
        if result.is_ok() {
            if let Err(e) = self.publish(&driver).await {
                result = Err(e);
            }
        }
        Invocation { result, driver }
    }

    /// Update a READY resource from `previous` to the resource's config
    pub async fn update<R: Lifecycle>(
        &self,
        resource: R,
        previous: &R::Config,
        outputs: Option<R::Outputs>,
    ) -> Invocation<R, R::Outputs> {
        let mut driver =
            ResourceDriver::restore(resource, self.source(), LifecycleState::Ready, outputs);
        let mut result = driver.update(previous).await;
        if result.is_ok() {
            if let Err(e) = self.publish(&driver).await {
                result = Err(e);
            }
        }
        Invocation { result, driver }
    }

    pub async fn delete<R: Lifecycle>(
        &self,
        resource: R,
        outputs: Option<R::Outputs>,
    ) -> Invocation<R, ()> {
        let state = if outputs.is_some() {
            LifecycleState::Ready
        } else {
            LifecycleState::Uncreated
        };
        let mut driver = ResourceDriver::restore(resource, self.source(), state, outputs);
        let mut result = driver.delete().await;
        if result.is_ok() {
            if let Err(e) = self.publish(&driver).await {
                result = Err(e);
            }
        }
        Invocation { result, driver }
    }

    pub async fn health<R: HealthCheckable>(&self, resource: R) -> Result<HealthStatus> {
        ResourceDriver::new(resource, self.source()).health().await
    }

    pub async fn logs<R: LogSource>(
        &self,
        resource: R,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> Result<LogStream> {
        ResourceDriver::new(resource, self.source())
            .logs(since, tail)
            .await
    }

    /// Plan a single resource against its previous config
    pub fn plan<R: Lifecycle>(
        &self,
        resource: R,
        previous: Option<&R::Config>,
        outputs: Option<R::Outputs>,
    ) -> Result<Action> {
        let state = if previous.is_some() {
            LifecycleState::Ready
        } else {
            LifecycleState::Uncreated
        };
        ResourceDriver::restore(resource, self.source(), state, outputs).plan(previous)
    }

    /// Order resources so each comes after everything it depends on
    pub fn order(&self, resources: &[(ResourceKey, DependencySet)]) -> Result<Vec<ResourceKey>> {
        let mut graph = DependencyGraph::new();
        for (key, deps) in resources {
            graph.add(key.clone(), deps);
        }
        graph.order()
    }

    /// Assemble a plan from per-resource actions in dependency order
    pub fn ordered_plan(
        &self,
        resources: &[(ResourceKey, DependencySet)],
        mut actions: Vec<Action>,
    ) -> Result<Plan> {
        let order = self.order(resources)?;
        actions.sort_by_key(|a| {
            order
                .iter()
                .position(|k| *k == a.key)
                .unwrap_or(usize::MAX)
        });
        Ok(Plan::new(actions))
    }
}
