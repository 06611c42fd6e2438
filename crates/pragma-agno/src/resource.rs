//! Spec-only resources
//!
//! Most agno resources own nothing outside the orchestrator. Creating one
//! compiles its spec from the config and the already resolved dependency
//! specs; deleting one is a no-op. [`Definition`] describes such a config and
//! [`SpecResource`] turns it into a full lifecycle resource.

use async_trait::async_trait;
use pragma_core::{CarriesSpec, Compile, Config, Lifecycle, ResolutionContext, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Definition: Config {
    const RESOURCE: &'static str;

    type Spec: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync + 'static;
    type Runtime;

    /// Compile from dependencies already resolved in `ctx`
    fn build_spec(&self, name: &str, ctx: &ResolutionContext) -> Result<Self::Spec>;

    fn runtime(spec: &Self::Spec) -> Result<Self::Runtime>;
}

/// Outputs of a spec-only resource: the compiled spec and nothing else
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecOutputs<S> {
    pub spec: S,
}

impl<S> CarriesSpec for SpecOutputs<S> {
    type Spec = S;

    fn spec(&self) -> &S {
        &self.spec
    }
}

pub struct SpecResource<C> {
    name: String,
    config: C,
}

impl<C: Definition> SpecResource<C> {
    pub fn new(name: impl Into<String>, config: C) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn outputs(&self, ctx: &ResolutionContext) -> Result<SpecOutputs<C::Spec>> {
        let spec = self.config.build_spec(&self.name, ctx)?;
        tracing::debug!("Compiled spec for agno/{}/{}", C::RESOURCE, self.name);
        Ok(SpecOutputs { spec })
    }
}

#[async_trait]
impl<C: Definition> Lifecycle for SpecResource<C> {
    const PROVIDER: &'static str = "agno";
    const RESOURCE: &'static str = C::RESOURCE;

    type Config = C;
    type Outputs = SpecOutputs<C::Spec>;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &C {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<Self::Outputs> {
        self.outputs(ctx)
    }

    async fn update(
        &self,
        _previous: &C,
        _current: Option<&Self::Outputs>,
        ctx: &ResolutionContext,
    ) -> Result<Self::Outputs> {
        self.outputs(ctx)
    }

    async fn delete(&self, _ctx: &ResolutionContext) -> Result<()> {
        Ok(())
    }
}

impl<C: Definition> Compile for SpecResource<C> {
    type Spec = C::Spec;
    type Runtime = C::Runtime;

    fn build_spec(&self, ctx: &ResolutionContext) -> Result<C::Spec> {
        self.config.build_spec(&self.name, ctx)
    }

    fn from_spec(spec: &C::Spec) -> Result<C::Runtime> {
        C::runtime(spec)
    }
}
