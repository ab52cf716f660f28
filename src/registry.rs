//! Module registry: the catalog of auto-activation candidates.
//!
//! The registry is an opaque collaborator. It hands the resolver an ordered
//! candidate list (duplicates allowed) and answers whether a module id is
//! backed by something the host could actually load.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// Source of candidate modules.
pub trait ModuleRegistry: Send + Sync {
    /// Candidate ids in discovery order. May contain duplicates.
    fn load_candidates(&self) -> Vec<String>;

    /// Whether `id` names a module that exists in this deployment, whether
    /// or not it is a candidate.
    fn is_resolvable(&self, id: &str) -> bool;
}

impl<R: ModuleRegistry + ?Sized> ModuleRegistry for std::sync::Arc<R> {
    fn load_candidates(&self) -> Vec<String> {
        (**self).load_candidates()
    }

    fn is_resolvable(&self, id: &str) -> bool {
        (**self).is_resolvable(id)
    }
}

/// Registry assembled from discovered ids and declarative import lists.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    candidates: Vec<String>,
    available: BTreeSet<String>,
}

impl StaticRegistry {
    /// Create a registry from discovered candidate ids.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            available: BTreeSet::new(),
        }
    }

    /// Declare modules that exist but are not candidates.
    #[must_use]
    pub fn with_available<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Append candidates parsed from an import list.
    #[must_use]
    pub fn with_imports(mut self, contents: &str) -> Self {
        self.candidates.extend(parse_import_list(contents));
        self
    }

    /// Append candidates from an import list file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn with_import_file(self, path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read import list {}", path.display()))?;
        let registry = self.with_imports(&contents);
        debug!(
            path = %path.display(),
            total = registry.candidates.len(),
            "loaded import list"
        );
        Ok(registry)
    }
}

impl ModuleRegistry for StaticRegistry {
    fn load_candidates(&self) -> Vec<String> {
        self.candidates.clone()
    }

    fn is_resolvable(&self, id: &str) -> bool {
        self.available.contains(id) || self.candidates.iter().any(|c| c == id)
    }
}

/// Parse an import list: one id per line, `#` starts a comment.
pub fn parse_import_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
