//! Deferred, cross-site import coordination.
//!
//! Sites register entries one at a time; nothing is decided until
//! [`ImportCoordinator::select_imports`] runs, so an exclusion declared by a
//! late site still removes a module accepted by an earlier one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use super::exclusion::ExclusionSet;
use super::metadata::MetadataStore;
use super::sorter::PrioritySorter;
use super::{dedup_preserving_order, Entry, ResolveError, Site};

/// One activated module and the site that first contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    /// Owning site name.
    pub site: String,
    /// Module id.
    pub id: String,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    first_site_of: HashMap<String, Site>,
    entries: Vec<Entry>,
    selected: Option<Vec<Import>>,
}

/// Collects site entries and produces the final activation order.
///
/// Registration is guarded by a [`Mutex`], so sites may register from
/// several threads; selection must happen after every registration.
#[derive(Debug)]
pub struct ImportCoordinator {
    metadata: Arc<MetadataStore>,
    sorter: PrioritySorter,
    state: Mutex<CoordinatorState>,
}

impl ImportCoordinator {
    /// Create a coordinator sorting with `metadata`.
    pub fn new(metadata: Arc<MetadataStore>) -> Self {
        Self {
            metadata,
            sorter: PrioritySorter::new(),
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// Register a site's entry. The first site to contribute an id owns it.
    pub fn process(&self, site: &Site, entry: Entry) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for id in entry.configurations() {
            state
                .first_site_of
                .entry(id.clone())
                .or_insert_with(|| site.clone());
        }
        debug!(
            site = %site,
            configurations = entry.configurations().len(),
            exclusions = entry.exclusions().len(),
            "registered auto-activation entry"
        );
        state.entries.push(entry);
        state.selected = None;
    }

    /// Number of registered entries.
    pub fn entry_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Union every entry, drop all exclusions, and sort.
    ///
    /// The result is cached until another entry is registered.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::CyclicOrdering`] when the accepted modules
    /// cannot be ordered.
    pub fn select_imports(&self) -> Result<Vec<Import>, ResolveError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(selected) = &state.selected {
            return Ok(selected.clone());
        }
        if state.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_exclusions = ExclusionSet::new();
        for entry in &state.entries {
            all_exclusions.extend_from(entry.exclusions());
        }
        let processed: Vec<String> = dedup_preserving_order(
            state
                .entries
                .iter()
                .flat_map(|entry| entry.configurations().iter().cloned()),
        )
        .into_iter()
        .filter(|id| !all_exclusions.contains(id))
        .collect();

        let ordered = self.sorter.sort(processed, &self.metadata)?;
        let imports: Vec<Import> = ordered
            .into_iter()
            .filter_map(|id| {
                state.first_site_of.get(&id).map(|site| Import {
                    site: site.name().to_owned(),
                    id,
                })
            })
            .collect();

        info!(
            sites = state.entries.len(),
            activated = imports.len(),
            excluded = all_exclusions.len(),
            "auto-activation order selected"
        );
        state.selected = Some(imports.clone());
        Ok(imports)
    }
}
