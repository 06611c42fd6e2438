//! Typed dependencies between resources and their per-pass resolution
//!
//! A [`Dependency`] is only a reference: it names another resource and the
//! outputs type expected from it. Resolution happens through a
//! [`ResolutionContext`], which lives for exactly one lifecycle pass of one
//! resource and caches each lookup so a dependency is fetched at most once.

use crate::error::{ResourceError, Result};
use crate::resource::{Outputs, ResourceKey};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Reference to another resource whose outputs are of type `O`
pub struct Dependency<O> {
    key: ResourceKey,
    _outputs: PhantomData<fn() -> O>,
}

impl<O> Dependency<O> {
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            _outputs: PhantomData,
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        Ok(Self::new(ResourceKey::parse(id)?))
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn id(&self) -> String {
        self.key.id()
    }

    /// Classify how a single optional slot changed between two configs
    pub fn change(previous: Option<&Self>, current: Option<&Self>) -> DependencyChange {
        DependencyChange::between(previous.map(|d| &d.key), current.map(|d| &d.key))
    }

    /// Whether a list slot changed: a different length, or a different set of ids
    pub fn list_changed(previous: &[Self], current: &[Self]) -> bool {
        let prev: Vec<&ResourceKey> = previous.iter().map(|d| &d.key).collect();
        let curr: Vec<&ResourceKey> = current.iter().map(|d| &d.key).collect();
        keys_differ(&prev, &curr)
    }
}

impl<O> Clone for Dependency<O> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<O> PartialEq for Dependency<O> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<O> Eq for Dependency<O> {}

impl<O> fmt::Debug for Dependency<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency({})", self.key)
    }
}

impl<O> Serialize for Dependency<O> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key.id())
    }
}

impl<'de, O> Deserialize<'de> for Dependency<O> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        ResourceKey::parse(&id)
            .map(Self::new)
            .map_err(serde::de::Error::custom)
    }
}

/// How a dependency slot moved between the previous and current config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyChange {
    Unchanged,
    Added,
    Removed,
    Replaced,
}

impl DependencyChange {
    pub fn between(previous: Option<&ResourceKey>, current: Option<&ResourceKey>) -> Self {
        match (previous, current) {
            (None, None) => DependencyChange::Unchanged,
            (None, Some(_)) => DependencyChange::Added,
            (Some(_), None) => DependencyChange::Removed,
            (Some(a), Some(b)) if a == b => DependencyChange::Unchanged,
            (Some(_), Some(_)) => DependencyChange::Replaced,
        }
    }

    pub fn is_changed(self) -> bool {
        self != DependencyChange::Unchanged
    }
}

/// Order is ignored. Reordering a list slot alone is not a change, and
/// resources that recompile keep the order of the current config.
fn keys_differ(previous: &[&ResourceKey], current: &[&ResourceKey]) -> bool {
    if previous.len() != current.len() {
        return true;
    }
    let prev: BTreeSet<&ResourceKey> = previous.iter().copied().collect();
    let curr: BTreeSet<&ResourceKey> = current.iter().copied().collect();
    prev != curr
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Single(Option<ResourceKey>),
    List(Vec<ResourceKey>),
}

/// The dependency slots a config declares, by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    slots: Vec<(&'static str, Slot)>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required<O>(mut self, field: &'static str, dep: &Dependency<O>) -> Self {
        self.slots.push((field, Slot::Single(Some(dep.key.clone()))));
        self
    }

    pub fn optional<O>(mut self, field: &'static str, dep: Option<&Dependency<O>>) -> Self {
        self.slots
            .push((field, Slot::Single(dep.map(|d| d.key.clone()))));
        self
    }

    pub fn list<O>(mut self, field: &'static str, deps: &[Dependency<O>]) -> Self {
        self.slots.push((
            field,
            Slot::List(deps.iter().map(|d| d.key.clone()).collect()),
        ));
        self
    }

    /// Field names of all declared slots, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|(field, _)| *field)
    }

    /// Every referenced key, in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.slots.iter().flat_map(|(_, slot)| match slot {
            Slot::Single(key) => key.iter().collect::<Vec<_>>(),
            Slot::List(keys) => keys.iter().collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }

    fn slot(&self, field: &str) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, slot)| slot)
    }

    /// Names of the slots whose referenced ids differ between `previous` and `self`.
    ///
    /// Single slots follow [`DependencyChange`]; list slots change when their
    /// length or their set of ids differs.
    pub fn changed_since(&self, previous: &DependencySet) -> Vec<&'static str> {
        let mut changed = Vec::new();
        for (field, slot) in &self.slots {
            let differs = match (previous.slot(field), slot) {
                (Some(Slot::Single(a)), Slot::Single(b)) => {
                    DependencyChange::between(a.as_ref(), b.as_ref()).is_changed()
                }
                (Some(Slot::List(a)), Slot::List(b)) => {
                    let a: Vec<_> = a.iter().collect();
                    let b: Vec<_> = b.iter().collect();
                    keys_differ(&a, &b)
                }
                (None, Slot::Single(None)) => false,
                (None, Slot::List(b)) if b.is_empty() => false,
                _ => true,
            };
            if differs {
                changed.push(*field);
            }
        }
        changed
    }
}

/// Where a resolution context fetches the outputs of other resources
#[async_trait]
pub trait OutputsSource: Send + Sync {
    /// Current outputs of `key`, or `None` when the resource does not exist
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<serde_json::Value>>;
}

/// Per-pass cache of resolved dependency outputs.
///
/// Construct one per lifecycle operation. It is never shared across
/// resources or passes, so outputs that change between passes are always
/// fetched fresh.
pub struct ResolutionContext {
    source: Arc<dyn OutputsSource>,
    resolved: HashMap<ResourceKey, serde_json::Value>,
    lookups: usize,
}

impl ResolutionContext {
    pub fn new(source: Arc<dyn OutputsSource>) -> Self {
        Self {
            source,
            resolved: HashMap::new(),
            lookups: 0,
        }
    }

    /// Context with no backing resources. Every lookup fails.
    pub fn detached() -> Self {
        Self::new(Arc::new(EmptySource))
    }

    async fn resolve_key(&mut self, key: &ResourceKey) -> Result<()> {
        if self.resolved.contains_key(key) {
            return Ok(());
        }
        self.lookups += 1;
        tracing::debug!("Resolving dependency {}", key);
        match self.source.fetch(key).await? {
            Some(outputs) => {
                self.resolved.insert(key.clone(), outputs);
                Ok(())
            }
            None => Err(ResourceError::DependencyNotFound { id: key.id() }),
        }
    }

    /// Resolve one dependency, fetching it if this pass has not seen it yet
    pub async fn resolve<O: Outputs>(&mut self, dep: &Dependency<O>) -> Result<O> {
        self.resolve_key(&dep.key).await?;
        self.resolved(dep)
    }

    /// Resolve every slot of a dependency set
    pub async fn resolve_all(&mut self, deps: &DependencySet) -> Result<()> {
        for key in deps.keys() {
            self.resolve_key(key).await?;
        }
        Ok(())
    }

    /// Resolve the slots whose resources still exist and skip the rest.
    ///
    /// Used for deletes: an upstream resource that is already gone must not
    /// keep a dependent from being deleted. Missing keys stay unresolved, so
    /// [`resolved`](Self::resolved) reports them as `UnresolvedDependency`.
    pub async fn resolve_available(&mut self, deps: &DependencySet) -> Result<()> {
        for key in deps.keys() {
            match self.resolve_key(key).await {
                Ok(()) => {}
                Err(ResourceError::DependencyNotFound { id }) => {
                    tracing::debug!("Dependency {} is gone, leaving it unresolved", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Outputs of a dependency already resolved in this pass. Never fetches.
    pub fn resolved<O: Outputs>(&self, dep: &Dependency<O>) -> Result<O> {
        let value = self
            .resolved
            .get(&dep.key)
            .ok_or_else(|| ResourceError::UnresolvedDependency { id: dep.id() })?;
        decode(&dep.key, value)
    }

    pub fn resolved_optional<O: Outputs>(&self, dep: Option<&Dependency<O>>) -> Result<Option<O>> {
        dep.map(|d| self.resolved(d)).transpose()
    }

    pub fn resolved_list<O: Outputs>(&self, deps: &[Dependency<O>]) -> Result<Vec<O>> {
        deps.iter().map(|d| self.resolved(d)).collect()
    }

    pub fn is_resolved(&self, key: &ResourceKey) -> bool {
        self.resolved.contains_key(key)
    }

    /// Number of fetches made against the source in this pass
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

fn decode<O: DeserializeOwned>(key: &ResourceKey, value: &serde_json::Value) -> Result<O> {
    O::deserialize(value).map_err(|e| {
        ResourceError::Spec(format!("outputs of {key} do not match the expected type: {e}"))
    })
}

struct EmptySource;

#[async_trait]
impl OutputsSource for EmptySource {
    async fn fetch(&self, _key: &ResourceKey) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
}
