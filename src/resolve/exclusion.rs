//! Exclusion merging and validation.

use std::collections::HashSet;

use serde::{Serialize, Serializer};
use tracing::debug;

use super::{ResolveError, Site};
use crate::environment::Environment;
use crate::registry::ModuleRegistry;

/// Insertion-ordered set of excluded module ids.
///
/// Serializes as a plain list in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    ids: Vec<String>,
    index: HashSet<String>,
}

impl Serialize for ExclusionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.ids)
    }
}

impl ExclusionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id; returns `false` if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if !self.index.insert(id.clone()) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Whether `id` is excluded.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Excluded ids in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Number of excluded ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add every id of `other`.
    pub fn extend_from(&mut self, other: &ExclusionSet) {
        for id in other.iter() {
            self.insert(id);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Builds and checks the exclusions of a site.
#[derive(Debug, Clone)]
pub struct ExclusionResolver {
    property_key: String,
}

impl ExclusionResolver {
    /// Create a resolver reading the environment list from `property_key`.
    pub fn new(property_key: impl Into<String>) -> Self {
        Self {
            property_key: property_key.into(),
        }
    }

    /// Merge exclusions by name, by type, and from the environment list,
    /// in that order.
    pub fn resolve<'a, N, T, E>(&self, names: N, types: T, environment_list: E) -> ExclusionSet
    where
        N: IntoIterator<Item = &'a str>,
        T: IntoIterator<Item = &'a str>,
        E: IntoIterator<Item = String>,
    {
        let mut set: ExclusionSet = names.into_iter().chain(types).collect();
        for id in environment_list {
            set.insert(id);
        }
        set
    }

    /// Exclusions declared by `site` plus those configured in `environment`.
    pub fn resolve_for(&self, site: &Site, environment: &dyn Environment) -> ExclusionSet {
        let set = self.resolve(
            site.excluded_names().iter().map(String::as_str),
            site.excluded_types().iter().map(String::as_str),
            environment.list_property(&self.property_key),
        );
        if !set.is_empty() {
            debug!(site = %site, excluded = set.len(), "resolved exclusions");
        }
        set
    }

    /// Reject exclusions naming a real module that was never a candidate.
    ///
    /// Ids the registry cannot resolve are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidExclusions`] naming every offending id.
    pub fn validate(
        &self,
        candidates: &[String],
        exclusions: &ExclusionSet,
        registry: &dyn ModuleRegistry,
    ) -> Result<(), ResolveError> {
        let known: HashSet<&str> = candidates.iter().map(String::as_str).collect();
        let invalid: Vec<String> = exclusions
            .iter()
            .filter(|id| registry.is_resolvable(id) && !known.contains(id))
            .map(ToOwned::to_owned)
            .collect();
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::InvalidExclusions { ids: invalid })
        }
    }
}

/// Remove every excluded id, keeping the order of the rest.
pub fn subtract(candidates: Vec<String>, exclusions: &ExclusionSet) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|id| !exclusions.contains(id))
        .collect()
}
