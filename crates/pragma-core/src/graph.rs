//! Ordering of resources by their dependencies

use crate::dependency::DependencySet;
use crate::error::{ResourceError, Result};
use crate::resource::ResourceKey;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<ResourceKey, BTreeSet<ResourceKey>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: ResourceKey, deps: &DependencySet) {
        let targets = deps.keys().cloned().collect();
        self.edges.insert(key, targets);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Keys ordered so every resource comes after its dependencies.
    ///
    /// Dependencies that were never added are treated as external and left
    /// out. A cycle is an error whose path names every member.
    pub fn order(&self) -> Result<Vec<ResourceKey>> {
        let mut marks: BTreeMap<&ResourceKey, Mark> = BTreeMap::new();
        let mut order = Vec::with_capacity(self.edges.len());
        let mut path = Vec::new();

        for key in self.edges.keys() {
            self.visit(key, &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        key: &'a ResourceKey,
        marks: &mut BTreeMap<&'a ResourceKey, Mark>,
        path: &mut Vec<&'a ResourceKey>,
        order: &mut Vec<ResourceKey>,
    ) -> Result<()> {
        match marks.get(key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|k| *k == key).unwrap_or(0);
                let cycle: Vec<String> = path[start..]
                    .iter()
                    .chain(std::iter::once(&key))
                    .map(|k| k.id())
                    .collect();
                return Err(ResourceError::DependencyCycle {
                    path: cycle.join(" -> "),
                });
            }
            None => {}
        }

        let Some(targets) = self.edges.get(key) else {
            return Ok(());
        };

        marks.insert(key, Mark::Visiting);
        path.push(key);
        for target in targets {
            self.visit(target, marks, path, order)?;
        }
        path.pop();
        marks.insert(key, Mark::Done);
        order.push(key.clone());
        Ok(())
    }
}
