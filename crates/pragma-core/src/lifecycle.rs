//! Resource lifecycle contract and the driver that enforces it
//!
//! ```text
//! UNCREATED --create--> CONVERGING --ready--> READY
//!                           |                  |
//!                           +--fail/timeout--> FAILED
//! READY/FAILED --update(diff)--> CONVERGING
//! READY --update(no diff)--> READY            (no external calls)
//! any --delete--> DELETING --> UNCREATED
//! ```

use crate::action::{Action, ActionType};
use crate::dependency::{OutputsSource, ResolutionContext};
use crate::diff::ConfigDiff;
use crate::error::{ResourceError, Result};
use crate::guard;
use crate::health::{HealthStatus, LogStream};
use crate::resource::{Config, Outputs, ResourceKey};
use crate::spec::Compile;
use crate::state::ResourceRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Uncreated,
    Converging,
    Ready,
    Failed,
    Deleting,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Uncreated => write!(f, "UNCREATED"),
            LifecycleState::Converging => write!(f, "CONVERGING"),
            LifecycleState::Ready => write!(f, "READY"),
            LifecycleState::Failed => write!(f, "FAILED"),
            LifecycleState::Deleting => write!(f, "DELETING"),
        }
    }
}

/// A managed resource.
///
/// Implementations receive a [`ResolutionContext`] whose dependencies are
/// already resolved for the current pass; they read from it and never fetch.
/// `create` must be idempotent: an already-existing resource is adopted.
/// `delete` must tolerate a resource that is already gone.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    const PROVIDER: &'static str;
    const RESOURCE: &'static str;

    type Config: Config;
    type Outputs: Outputs;

    fn name(&self) -> &str;

    fn config(&self) -> &Self::Config;

    fn key(&self) -> ResourceKey {
        ResourceKey::new(Self::PROVIDER, Self::RESOURCE, self.name())
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<Self::Outputs>;

    /// Apply the current config over `previous`. `current` holds the outputs
    /// of the last successful pass, when there was one.
    async fn update(
        &self,
        previous: &Self::Config,
        current: Option<&Self::Outputs>,
        ctx: &ResolutionContext,
    ) -> Result<Self::Outputs>;

    async fn delete(&self, ctx: &ResolutionContext) -> Result<()>;
}

#[async_trait]
pub trait HealthCheckable: Lifecycle {
    async fn health(&self, ctx: &ResolutionContext) -> Result<HealthStatus>;
}

#[async_trait]
pub trait LogSource: Lifecycle {
    async fn logs(
        &self,
        ctx: &ResolutionContext,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> Result<LogStream>;
}

/// Runs lifecycle operations for one resource and tracks its state.
///
/// Every operation starts a fresh [`ResolutionContext`], resolves all declared
/// dependency slots, then hands the context to the resource.
pub struct ResourceDriver<R: Lifecycle> {
    resource: R,
    source: Arc<dyn OutputsSource>,
    state: LifecycleState,
    outputs: Option<R::Outputs>,
}

impl<R: Lifecycle> ResourceDriver<R> {
    pub fn new(resource: R, source: Arc<dyn OutputsSource>) -> Self {
        Self::restore(resource, source, LifecycleState::Uncreated, None)
    }

    /// Resume from a previously recorded state
    pub fn restore(
        resource: R,
        source: Arc<dyn OutputsSource>,
        state: LifecycleState,
        outputs: Option<R::Outputs>,
    ) -> Self {
        Self {
            resource,
            source,
            state,
            outputs,
        }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn outputs(&self) -> Option<&R::Outputs> {
        self.outputs.as_ref()
    }

    pub fn key(&self) -> ResourceKey {
        self.resource.key()
    }

    fn transition(&mut self, to: LifecycleState) {
        if self.state != to {
            tracing::info!("{}: {} -> {}", self.resource.key(), self.state, to);
            self.state = to;
        }
    }

    fn reject(&self, operation: &str) -> ResourceError {
        ResourceError::InvalidTransition {
            operation: operation.to_string(),
            state: self.state.to_string(),
        }
    }

    async fn context(&self) -> Result<ResolutionContext> {
        let mut ctx = ResolutionContext::new(self.source.clone());
        ctx.resolve_all(&self.resource.config().dependencies())
            .await?;
        Ok(ctx)
    }

    async fn attempt_create(&self) -> Result<R::Outputs> {
        let ctx = self.context().await?;
        self.resource.create(&ctx).await
    }

    async fn attempt_update(&self, previous: &R::Config) -> Result<R::Outputs> {
        let ctx = self.context().await?;
        self.resource
            .update(previous, self.outputs.as_ref(), &ctx)
            .await
    }

    /// Deletes only see the dependencies that still exist
    async fn attempt_delete(&self) -> Result<()> {
        let mut ctx = ResolutionContext::new(self.source.clone());
        ctx.resolve_available(&self.resource.config().dependencies())
            .await?;
        self.resource.delete(&ctx).await
    }

    fn settle(&mut self, result: Result<R::Outputs>) -> Result<R::Outputs> {
        match result {
            Ok(outputs) => {
                self.outputs = Some(outputs.clone());
                self.transition(LifecycleState::Ready);
                Ok(outputs)
            }
            Err(e) => {
                tracing::error!("{} failed: {}", self.resource.key(), e);
                self.transition(LifecycleState::Failed);
                Err(e)
            }
        }
    }

    pub async fn create(&mut self) -> Result<R::Outputs> {
        if self.state == LifecycleState::Deleting {
            return Err(self.reject("create"));
        }
        self.resource.config().validate()?;

        self.transition(LifecycleState::Converging);
        let result = self.attempt_create().await;
        self.settle(result)
    }

    /// Update from `previous` to the resource's current config.
    ///
    /// Immutable fields are checked first. When nothing differs and the
    /// resource is READY, the recorded outputs are returned without any
    /// external call.
    pub async fn update(&mut self, previous: &R::Config) -> Result<R::Outputs> {
        if matches!(
            self.state,
            LifecycleState::Uncreated | LifecycleState::Deleting
        ) {
            return Err(self.reject("update"));
        }
        let current = self.resource.config();
        current.validate()?;
        guard::check_immutable(previous, current)?;

        let diff = ConfigDiff::between(previous, current)?;
        if diff.is_empty() && self.state == LifecycleState::Ready {
            if let Some(outputs) = &self.outputs {
                tracing::debug!("{}: no changes", self.resource.key());
                return Ok(outputs.clone());
            }
        }
        if !diff.is_empty() {
            tracing::debug!(
                "{}: changed {}",
                self.resource.key(),
                diff.changed().collect::<Vec<_>>().join(", ")
            );
        }

        self.transition(LifecycleState::Converging);
        let result = self.attempt_update(previous).await;
        self.settle(result)
    }

    pub async fn delete(&mut self) -> Result<()> {
        self.transition(LifecycleState::Deleting);
        let result = self.attempt_delete().await;

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} already gone", self.resource.key());
            }
            Err(e) => {
                tracing::error!("{} delete failed: {}", self.resource.key(), e);
                self.transition(LifecycleState::Failed);
                return Err(e);
            }
        }
        self.outputs = None;
        self.transition(LifecycleState::Uncreated);
        Ok(())
    }

    /// What `create` or `update(previous)` would do, without external calls
    pub fn plan(&self, previous: Option<&R::Config>) -> Result<Action> {
        let key = self.resource.key();
        let current = self.resource.config();
        current.validate()?;

        let previous = match (self.state, previous) {
            (LifecycleState::Uncreated, _) | (_, None) => {
                return Ok(Action::new(key, ActionType::Create, Vec::new()));
            }
            (_, Some(previous)) => previous,
        };

        guard::check_immutable(previous, current)?;
        let diff = ConfigDiff::between(previous, current)?;
        let action_type = if diff.is_empty() && self.state == LifecycleState::Ready {
            ActionType::NoOp
        } else {
            ActionType::Update
        };
        Ok(Action::new(
            key,
            action_type,
            diff.changed().map(String::from).collect(),
        ))
    }

    pub async fn health(&self) -> Result<HealthStatus>
    where
        R: HealthCheckable,
    {
        let ctx = self.context().await?;
        self.resource.health(&ctx).await
    }

    pub async fn logs(&self, since: Option<DateTime<Utc>>, tail: usize) -> Result<LogStream>
    where
        R: LogSource,
    {
        let ctx = self.context().await?;
        self.resource.logs(&ctx, since, tail).await
    }

    /// Compile the runtime spec against freshly resolved dependencies
    pub async fn compile(&self) -> Result<R::Spec>
    where
        R: Compile,
    {
        let ctx = self.context().await?;
        self.resource.build_spec(&ctx)
    }

    /// Snapshot suitable for the state file
    pub fn to_record(&self) -> Result<ResourceRecord> {
        let config = serde_json::to_value(self.resource.config())?;
        let outputs = self
            .outputs
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let mut record = ResourceRecord::new(self.resource.key(), config).with_state(self.state);
        record.outputs = outputs;
        Ok(record)
    }
}
