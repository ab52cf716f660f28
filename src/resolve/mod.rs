//! Module auto-activation and ordering.
//!
//! A resolution run works in two phases. Each [`Site`] first resolves its
//! own [`Entry`] through the [`ImportSelector`](selector::ImportSelector):
//! candidates are de-duplicated, exclusions are validated and subtracted,
//! and the condition filter pipeline prunes what the environment does not
//! support. Every entry is then handed to the
//! [`ImportCoordinator`](coordinator::ImportCoordinator), which unions the
//! entries, applies all exclusions across sites, and sorts the survivors
//! with the [`PrioritySorter`](sorter::PrioritySorter).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod conditions;
pub mod coordinator;
pub mod event;
pub mod exclusion;
pub mod filter;
pub mod metadata;
pub mod selector;
pub mod sorter;

pub use coordinator::{Import, ImportCoordinator};
pub use event::{ImportEvent, ImportListener, LoggingListener};
pub use exclusion::{ExclusionResolver, ExclusionSet};
pub use filter::{ConditionFilter, FilterOutcome, FilterPipeline, Rejection};
pub use metadata::{MetadataLoader, MetadataSource, MetadataStore, ModuleMetadata};
pub use selector::{ImportSelector, PropertyKeys, Resolution, Resolver, SiteReport};
pub use sorter::PrioritySorter;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal resolution failures.
///
/// Every variant aborts the run before any ordering is exposed; partial
/// activation is never returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Resolvable modules were excluded without ever being candidates.
    #[error(
        "the following modules could not be excluded because they are not auto-activation candidates: {}",
        ids.join(", ")
    )]
    InvalidExclusions {
        /// Every offending id, in exclusion order.
        ids: Vec<String>,
    },

    /// The before/after constraints among these modules cannot be satisfied.
    #[error("cyclic ordering constraints between modules: {}", ids.join(", "))]
    CyclicOrdering {
        /// Modules left unplaced when no constraint-free module remained.
        ids: Vec<String>,
    },

    /// Auto-activation is enabled but the registry offered no candidates.
    #[error("no auto-activation candidates found in the module registry")]
    NoCandidates,

    /// A condition filter failed while evaluating candidates.
    #[error("condition filter '{filter}' failed: {message}")]
    Filter {
        /// Name of the failing filter.
        filter: String,
        /// Failure detail reported by the filter.
        message: String,
    },

    /// A condition filter answered for the wrong number of candidates.
    #[error("condition filter '{filter}' returned {actual} results for {expected} candidates")]
    FilterArity {
        /// Name of the misbehaving filter.
        filter: String,
        /// Number of candidate slots passed in.
        expected: usize,
        /// Number of answers returned.
        actual: usize,
    },

    /// Required module metadata could not be read or parsed.
    #[error("module metadata from {source_name} is unusable: {message}")]
    Metadata {
        /// Human-readable origin of the metadata.
        source_name: String,
        /// Read or parse failure detail.
        message: String,
    },

    /// A typed environment property held an unconvertible value.
    #[error("property '{key}' has invalid value '{value}'")]
    InvalidProperty {
        /// Property key.
        key: String,
        /// Raw value that failed conversion.
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

/// An independent caller contributing its own accepted and excluded modules.
///
/// A site carries the exclusions it declares itself. Exclusions by type use
/// the Rust type name, so a host can exclude a module type without
/// spelling out its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Site {
    name: String,
    #[serde(default)]
    exclude: BTreeSet<String>,
    #[serde(default)]
    exclude_types: BTreeSet<String>,
}

impl Site {
    /// Create a site with no declared exclusions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exclude: BTreeSet::new(),
            exclude_types: BTreeSet::new(),
        }
    }

    /// Exclude a module by id.
    #[must_use]
    pub fn exclude(mut self, id: impl Into<String>) -> Self {
        self.exclude.insert(id.into());
        self
    }

    /// Exclude a module by its type name string.
    #[must_use]
    pub fn exclude_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.exclude_types.insert(type_name.into());
        self
    }

    /// Exclude the module implemented by `T`.
    #[must_use]
    pub fn exclude_type<T: ?Sized>(self) -> Self {
        self.exclude_type_name(std::any::type_name::<T>())
    }

    /// Site name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids excluded by name.
    pub fn excluded_names(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    /// Ids excluded by type.
    pub fn excluded_types(&self) -> &BTreeSet<String> {
        &self.exclude_types
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Outcome of resolving one site: accepted modules plus the exclusions that
/// must also apply to every other site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entry {
    configurations: Vec<String>,
    exclusions: ExclusionSet,
}

impl Entry {
    /// Build an entry from accepted ids and exclusions.
    pub fn new(configurations: Vec<String>, exclusions: ExclusionSet) -> Self {
        Self {
            configurations,
            exclusions,
        }
    }

    /// An entry that contributes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Accepted module ids in resolution order.
    pub fn configurations(&self) -> &[String] {
        &self.configurations
    }

    /// Exclusions declared by the site.
    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Whether the entry contributes neither modules nor exclusions.
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty() && self.exclusions.is_empty()
    }
}

/// Remove duplicates, keeping the first occurrence of each id.
pub fn dedup_preserving_order<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
