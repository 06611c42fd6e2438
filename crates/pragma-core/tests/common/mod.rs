use async_trait::async_trait;
use pragma_core::{
    Compile, Config, ConvergencePoller, Dependency, DependencySet, ExternalError, Lifecycle,
    ResolutionContext, ResourceError, Result, Verdict,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Control plane double: scripted statuses, counted calls
#[derive(Default)]
pub struct FakeCloud {
    pub creates: AtomicU32,
    pub updates: AtomicU32,
    pub deletes: AtomicU32,
    pub gets: AtomicU32,
    pub delete_missing: Mutex<bool>,
    script: Mutex<VecDeque<Option<String>>>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, statuses: &[Option<&str>]) {
        *self.script.lock().unwrap() = statuses.iter().map(|s| s.map(String::from)).collect();
    }

    pub fn total_calls(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.gets.load(Ordering::SeqCst)
    }

    fn next_status(&self) -> Option<String> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().flatten()
        } else {
            script.front().cloned().flatten()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentOutputs {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub zone: String,
    pub size: u32,
    pub parent: Option<Dependency<ParentOutputs>>,
}

impl Config for WidgetConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["zone"];

    fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(ResourceError::Validation("size must be positive".into()));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().optional("parent", self.parent.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetOutputs {
    pub status: String,
    pub size: u32,
    pub parent_endpoint: Option<String>,
}

pub struct Widget {
    pub name: String,
    pub config: WidgetConfig,
    pub cloud: Arc<FakeCloud>,
    pub poller: ConvergencePoller,
}

impl Widget {
    pub fn new(name: &str, config: WidgetConfig, cloud: Arc<FakeCloud>) -> Self {
        Self {
            name: name.to_string(),
            config,
            cloud,
            poller: ConvergencePoller::new(Duration::from_secs(5), 10),
        }
    }

    async fn wait_ready(&self, ctx: &ResolutionContext) -> Result<WidgetOutputs> {
        let status = self
            .poller
            .wait_until(
                &self.name,
                || {
                    self.cloud.gets.fetch_add(1, Ordering::SeqCst);
                    let status = self.cloud.next_status();
                    async move { Ok(status) }
                },
                |status: &String| match status.as_str() {
                    "RUNNING" => Verdict::Ready,
                    "ERROR" => Verdict::Failed(status.clone()),
                    _ => Verdict::Pending,
                },
            )
            .await?;
        let parent = ctx.resolved_optional(self.config.parent.as_ref())?;
        Ok(WidgetOutputs {
            status,
            size: self.config.size,
            parent_endpoint: parent.map(|p| p.endpoint),
        })
    }
}

#[async_trait]
impl Lifecycle for Widget {
    const PROVIDER: &'static str = "test";
    const RESOURCE: &'static str = "widget";

    type Config = WidgetConfig;
    type Outputs = WidgetOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &WidgetConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<WidgetOutputs> {
        self.cloud.creates.fetch_add(1, Ordering::SeqCst);
        self.wait_ready(ctx).await
    }

    async fn update(
        &self,
        _previous: &WidgetConfig,
        _current: Option<&WidgetOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<WidgetOutputs> {
        self.cloud.updates.fetch_add(1, Ordering::SeqCst);
        self.wait_ready(ctx).await
    }

    async fn delete(&self, _ctx: &ResolutionContext) -> Result<()> {
        self.cloud.deletes.fetch_add(1, Ordering::SeqCst);
        if *self.cloud.delete_missing.lock().unwrap() {
            return Err(ExternalError::not_found("no such widget").into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetSpec {
    pub size: u32,
    pub parent_endpoint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct WidgetRuntime {
    pub label: String,
}

impl Compile for Widget {
    type Spec = WidgetSpec;
    type Runtime = WidgetRuntime;

    fn build_spec(&self, ctx: &ResolutionContext) -> Result<WidgetSpec> {
        let parent = ctx.resolved_optional(self.config.parent.as_ref())?;
        Ok(WidgetSpec {
            size: self.config.size,
            parent_endpoint: parent.map(|p| p.endpoint),
        })
    }

    fn from_spec(spec: &WidgetSpec) -> Result<WidgetRuntime> {
        Ok(WidgetRuntime {
            label: format!(
                "{}@{}",
                spec.size,
                spec.parent_endpoint.as_deref().unwrap_or("standalone")
            ),
        })
    }
}

pub fn config(parent: Option<&str>) -> WidgetConfig {
    WidgetConfig {
        zone: "eu-1".into(),
        size: 2,
        parent: parent.map(|id| Dependency::parse(id).unwrap()),
    }
}
