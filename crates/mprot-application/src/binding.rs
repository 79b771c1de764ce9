//! Binding graph: which instance satisfies which requirement of whom
//!
//! Edges are kept in insertion order so that fault propagation visits
//! dependents deterministically.

use mprot_types::InstanceId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One edge: `provider` currently satisfies `dependent`'s requirement on `capability`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Binding {
    pub dependent: InstanceId,
    pub capability: String,
    pub provider: InstanceId,
}

/// All requirement bindings of an application
#[derive(Clone, Debug, Default)]
pub struct BindingGraph {
    edges: Vec<Binding>,
}

impl BindingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edges(&self) -> &[Binding] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Providers bound to `dependent`'s requirement on `capability`
    pub fn providers_of(&self, dependent: &InstanceId, capability: &str) -> Vec<&InstanceId> {
        self.edges
            .iter()
            .filter(|b| &b.dependent == dependent && b.capability == capability)
            .map(|b| &b.provider)
            .collect()
    }

    /// Requirement map of `dependent`: capability → satisfying instances
    pub fn bindings_of(&self, dependent: &InstanceId) -> BTreeMap<String, Vec<InstanceId>> {
        let mut map: BTreeMap<String, Vec<InstanceId>> = BTreeMap::new();
        for b in self.edges.iter().filter(|b| &b.dependent == dependent) {
            map.entry(b.capability.clone())
                .or_default()
                .push(b.provider.clone());
        }
        map
    }

    /// Instances with at least one requirement bound to `provider`
    pub fn dependents_of(&self, provider: &InstanceId) -> BTreeSet<InstanceId> {
        self.edges
            .iter()
            .filter(|b| &b.provider == provider)
            .map(|b| b.dependent.clone())
            .collect()
    }

    /// Edges served by `provider`, in insertion order
    pub fn provided_by(&self, provider: &InstanceId) -> Vec<&Binding> {
        self.edges
            .iter()
            .filter(|b| &b.provider == provider)
            .collect()
    }

    /// Number of requirement bindings `provider` serves for `capability`
    pub fn load(&self, provider: &InstanceId, capability: &str) -> usize {
        self.edges
            .iter()
            .filter(|b| &b.provider == provider && b.capability == capability)
            .count()
    }

    pub fn contains(
        &self,
        dependent: &InstanceId,
        capability: &str,
        provider: &InstanceId,
    ) -> bool {
        self.edges.iter().any(|b| {
            &b.dependent == dependent && b.capability == capability && &b.provider == provider
        })
    }

    pub(crate) fn add(&mut self, binding: Binding) {
        if !self.contains(&binding.dependent, &binding.capability, &binding.provider) {
            self.edges.push(binding);
        }
    }

    /// Remove one edge; returns whether it existed
    pub(crate) fn remove(
        &mut self,
        dependent: &InstanceId,
        capability: &str,
        provider: &InstanceId,
    ) -> bool {
        let before = self.edges.len();
        self.edges.retain(|b| {
            !(&b.dependent == dependent && b.capability == capability && &b.provider == provider)
        });
        before != self.edges.len()
    }

    /// Drop every requirement binding of `dependent`
    pub(crate) fn release_dependent(&mut self, dependent: &InstanceId) {
        self.edges.retain(|b| &b.dependent != dependent);
    }

    /// Replace `dependent`'s bindings with `plan` (capability → providers)
    pub(crate) fn rebind_dependent(
        &mut self,
        dependent: &InstanceId,
        plan: Vec<(String, Vec<InstanceId>)>,
    ) {
        self.release_dependent(dependent);
        for (capability, providers) in plan {
            for provider in providers {
                self.add(Binding {
                    dependent: dependent.clone(),
                    capability: capability.clone(),
                    provider,
                });
            }
        }
    }
}
