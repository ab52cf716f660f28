//! Per-site selection and the resolution driver.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::coordinator::{Import, ImportCoordinator};
use super::event::{ImportEvent, ImportListener};
use super::exclusion::{subtract, ExclusionResolver, ExclusionSet};
use super::filter::{FilterPipeline, Rejection};
use super::metadata::MetadataLoader;
use super::{dedup_preserving_order, Entry, ResolveError, Site};
use crate::environment::Environment;
use crate::registry::ModuleRegistry;

/// Environment keys the resolver consults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyKeys {
    /// Boolean switch for auto-activation as a whole.
    pub enabled: String,
    /// Comma-separated list of excluded module ids.
    pub exclude: String,
    /// Prefix for per-module `<prefix>.<name>.enabled` toggles.
    pub module_prefix: String,
    /// Environment-wide default for per-module toggles.
    pub enabled_by_default: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            enabled: "autoactivate.enabled".to_owned(),
            exclude: "autoactivate.exclude".to_owned(),
            module_prefix: "autoactivate.module".to_owned(),
            enabled_by_default: "autoactivate.modules.enabled-by-default".to_owned(),
        }
    }
}

/// One site's resolution with its filter diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    /// Site name.
    pub site: String,
    /// Accepted modules and declared exclusions.
    pub entry: Entry,
    /// Candidates removed by condition filters.
    pub rejected: Vec<Rejection>,
}

// ---------------------------------------------------------------------------
// ImportSelector
// ---------------------------------------------------------------------------

/// Resolves the entry of a single site.
pub struct ImportSelector {
    registry: Arc<dyn ModuleRegistry>,
    environment: Arc<dyn Environment>,
    metadata: Arc<MetadataLoader>,
    filters: FilterPipeline,
    listeners: Vec<Arc<dyn ImportListener>>,
    exclusions: ExclusionResolver,
    keys: PropertyKeys,
}

impl std::fmt::Debug for ImportSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportSelector")
            .field("environment", &self.environment.identity())
            .field("filters", &self.filters)
            .field("listeners", &self.listeners.len())
            .field("keys", &self.keys)
            .finish()
    }
}

impl ImportSelector {
    /// Create a selector with no filters or listeners and default keys.
    pub fn new(
        registry: Arc<dyn ModuleRegistry>,
        environment: Arc<dyn Environment>,
        metadata: Arc<MetadataLoader>,
    ) -> Self {
        let keys = PropertyKeys::default();
        Self {
            registry,
            environment,
            metadata,
            filters: FilterPipeline::new(),
            listeners: Vec::new(),
            exclusions: ExclusionResolver::new(keys.exclude.clone()),
            keys,
        }
    }

    /// Replace the condition filter pipeline.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterPipeline) -> Self {
        self.filters = filters;
        self
    }

    /// Register an event listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ImportListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Use custom environment keys.
    #[must_use]
    pub fn with_keys(mut self, keys: PropertyKeys) -> Self {
        self.exclusions = ExclusionResolver::new(keys.exclude.clone());
        self.keys = keys;
        self
    }

    /// Environment the selector evaluates against.
    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    /// Registry the selector draws candidates from.
    pub fn registry(&self) -> &Arc<dyn ModuleRegistry> {
        &self.registry
    }

    /// Metadata loader shared with the coordinator.
    pub fn metadata(&self) -> &Arc<MetadataLoader> {
        &self.metadata
    }

    /// Whether auto-activation is switched on in the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidProperty`] if the switch is not a
    /// boolean.
    pub fn is_enabled(&self) -> Result<bool, ResolveError> {
        Ok(self
            .environment
            .bool_property(&self.keys.enabled)?
            .unwrap_or(true))
    }

    /// Resolve the entry for `site`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoCandidates`] for an empty registry,
    /// [`ResolveError::InvalidExclusions`] for exclusions of real modules
    /// that are not candidates, and any filter or metadata failure.
    pub fn select(&self, site: &Site) -> Result<SiteReport, ResolveError> {
        if !self.is_enabled()? {
            info!(site = %site, key = %self.keys.enabled, "auto-activation disabled");
            return Ok(SiteReport {
                site: site.name().to_owned(),
                entry: Entry::empty(),
                rejected: Vec::new(),
            });
        }

        let loaded = self.registry.load_candidates();
        if loaded.is_empty() {
            return Err(ResolveError::NoCandidates);
        }
        let loaded_count = loaded.len();
        let candidates = dedup_preserving_order(loaded);
        if candidates.len() < loaded_count {
            debug!(
                site = %site,
                duplicates = loaded_count.saturating_sub(candidates.len()),
                "dropped duplicate candidates"
            );
        }

        let exclusions = self.exclusions.resolve_for(site, self.environment.as_ref());
        self.exclusions
            .validate(&candidates, &exclusions, self.registry.as_ref())?;
        let remaining = subtract(candidates, &exclusions);

        let metadata = self.metadata.load(self.environment.as_ref())?;
        let outcome = self.filters.filter(remaining, &metadata)?;

        let entry = Entry::new(outcome.accepted, exclusions);
        self.fire_event(site, &entry);
        Ok(SiteReport {
            site: site.name().to_owned(),
            entry,
            rejected: outcome.rejected,
        })
    }

    /// Whether the condition filters would reject `id`.
    ///
    /// # Errors
    ///
    /// Propagates filter and metadata failures.
    pub fn should_exclude(&self, id: &str) -> Result<bool, ResolveError> {
        let metadata = self.metadata.load(self.environment.as_ref())?;
        let outcome = self.filters.filter(vec![id.to_owned()], &metadata)?;
        Ok(outcome.accepted.is_empty())
    }

    fn fire_event(&self, site: &Site, entry: &Entry) {
        if self.listeners.is_empty() {
            return;
        }
        let event = ImportEvent {
            site: site.name().to_owned(),
            configurations: entry.configurations().to_vec(),
            exclusions: entry.exclusions().clone(),
            timestamp: chrono::Utc::now(),
        };
        for listener in &self.listeners {
            listener.on_import_event(&event);
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Final outcome of a resolution run.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Activated modules in activation order.
    pub imports: Vec<Import>,
    /// Per-site entries and filter diagnostics, in site order.
    pub sites: Vec<SiteReport>,
}

impl Resolution {
    /// Activated module ids in order.
    pub fn ids(&self) -> Vec<&str> {
        self.imports.iter().map(|import| import.id.as_str()).collect()
    }

    /// Union of every site's exclusions, each id counted once.
    pub fn exclusions(&self) -> ExclusionSet {
        let mut all = ExclusionSet::new();
        for report in &self.sites {
            all.extend_from(report.entry.exclusions());
        }
        all
    }
}

/// Runs a full two-phase resolution over a list of sites.
#[derive(Debug)]
pub struct Resolver {
    selector: ImportSelector,
}

impl Resolver {
    /// Create a resolver around a configured selector.
    pub fn new(selector: ImportSelector) -> Self {
        Self { selector }
    }

    /// The underlying per-site selector.
    pub fn selector(&self) -> &ImportSelector {
        &self.selector
    }

    /// Resolve every site, then coordinate and sort the union.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ResolveError`]; no partial result is
    /// produced.
    pub fn resolve(&self, sites: &[Site]) -> Result<Resolution, ResolveError> {
        let metadata = self
            .selector
            .metadata()
            .load(self.selector.environment().as_ref())?;
        let coordinator = ImportCoordinator::new(metadata);

        let mut reports = Vec::with_capacity(sites.len());
        for site in sites {
            let report = self.selector.select(site)?;
            coordinator.process(site, report.entry.clone());
            reports.push(report);
        }

        let imports = coordinator.select_imports()?;
        Ok(Resolution {
            imports,
            sites: reports,
        })
    }
}
