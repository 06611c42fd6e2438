//! Runtime specs
//!
//! A spec is the fully resolved, serializable description of a resource that
//! a separate runtime process can rebuild without the control plane. Specs
//! never hold a [`Dependency`](crate::Dependency); nested resources appear as
//! their own already compiled specs.

use crate::dependency::ResolutionContext;
use crate::error::{ResourceError, Result};
use crate::lifecycle::Lifecycle;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

pub trait Compile: Lifecycle {
    type Spec: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Runtime object rebuilt from a spec
    type Runtime;

    /// Compile from dependencies already resolved in `ctx`. Fails with
    /// `UnresolvedDependency` naming the first id that is missing.
    fn build_spec(&self, ctx: &ResolutionContext) -> Result<Self::Spec>;

    fn from_spec(spec: &Self::Spec) -> Result<Self::Runtime>;
}

/// Outputs that embed a compiled spec, so dependents can nest it
pub trait CarriesSpec {
    type Spec;

    fn spec(&self) -> &Self::Spec;
}

pub fn encode<S: Serialize>(spec: &S) -> Result<String> {
    serde_json::to_string(spec).map_err(|e| ResourceError::Spec(format!("cannot encode spec: {e}")))
}

pub fn decode<S: DeserializeOwned>(json: &str) -> Result<S> {
    serde_json::from_str(json).map_err(|e| ResourceError::Spec(format!("cannot decode spec: {e}")))
}
