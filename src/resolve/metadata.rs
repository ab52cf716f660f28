//! Precomputed module metadata.
//!
//! Ordering and condition facts are read from a properties-style index so
//! that no module has to be constructed to decide whether or where it
//! activates:
//!
//! ```text
//! # <module id>.<Attribute>=<value>
//! app.web.ServerModule.Priority=-10
//! app.web.ServerModule.After=app.core.CoreModule
//! app.web.ServerModule.ConditionalOnProperty=server.enabled=true
//! ```
//!
//! Keys are split at the last `.`, so module ids may themselves contain dots.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::ResolveError;
use crate::environment::{parse_bool, split_list, Environment, EnvironmentId};

/// Priority assigned to modules that declare none.
pub const NEUTRAL_PRIORITY: i32 = 0;

/// Ordering facts for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMetadata {
    /// Explicit numeric priority; lower activates earlier.
    pub priority: i32,
    /// Modules this one must precede.
    pub before: BTreeSet<String>,
    /// Modules this one must follow.
    pub after: BTreeSet<String>,
    /// Precede every module that is not itself `before_all`.
    pub before_all: bool,
    /// Follow every module that is not itself `after_all`.
    pub after_all: bool,
}

/// Read-only index of module metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    modules: HashMap<String, ModuleMetadata>,
    attributes: HashMap<String, BTreeMap<String, String>>,
}

impl MetadataStore {
    /// A store where every module has neutral defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a properties-style index.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Metadata`] for lines without `=`, keys
    /// without an attribute part, or values of the wrong type for a known
    /// attribute.
    pub fn parse(contents: &str) -> Result<Self, ResolveError> {
        let mut store = Self::default();
        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let line_no = index.saturating_add(1);
            let (key, value) = line.split_once('=').ok_or_else(|| malformed(line_no, line))?;
            let (id, attribute) = key
                .trim()
                .rsplit_once('.')
                .filter(|(id, attr)| !id.is_empty() && !attr.is_empty())
                .ok_or_else(|| malformed(line_no, line))?;
            store.insert(id, attribute, value.trim())?;
        }
        debug!(modules = store.attributes.len(), "parsed module metadata");
        Ok(store)
    }

    /// Record one attribute for a module.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Metadata`] when a known attribute has a
    /// value of the wrong type.
    pub fn insert(&mut self, id: &str, attribute: &str, value: &str) -> Result<(), ResolveError> {
        let entry = self.modules.entry(id.to_owned()).or_default();
        match attribute {
            "Priority" => {
                entry.priority = value.parse().map_err(|_| ResolveError::Metadata {
                    source_name: format!("{id}.{attribute}"),
                    message: format!("priority '{value}' is not an integer"),
                })?;
            }
            "Before" => entry.before.extend(split_list(value)),
            "After" => entry.after.extend(split_list(value)),
            "BeforeAll" => entry.before_all = metadata_bool(id, attribute, value)?,
            "AfterAll" => entry.after_all = metadata_bool(id, attribute, value)?,
            _ => {}
        }
        self.attributes
            .entry(id.to_owned())
            .or_default()
            .insert(attribute.to_owned(), value.to_owned());
        Ok(())
    }

    /// Metadata for `id`, or neutral defaults when the index has none.
    pub fn get(&self, id: &str) -> ModuleMetadata {
        self.modules.get(id).cloned().unwrap_or_default()
    }

    /// Raw attribute value recorded for `id`.
    pub fn attribute(&self, id: &str, name: &str) -> Option<&str> {
        self.attributes
            .get(id)
            .and_then(|attrs| attrs.get(name))
            .map(String::as_str)
    }

    /// All attributes recorded for `id`.
    pub fn attributes(&self, id: &str) -> Option<&BTreeMap<String, String>> {
        self.attributes.get(id)
    }

    /// Whether the index mentions `id` at all.
    pub fn contains(&self, id: &str) -> bool {
        self.attributes.contains_key(id)
    }

    /// Number of indexed modules.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

fn malformed(line_no: usize, line: &str) -> ResolveError {
    ResolveError::Metadata {
        source_name: format!("line {line_no}"),
        message: format!("expected '<id>.<Attribute>=<value>', got '{line}'"),
    }
}

fn metadata_bool(id: &str, attribute: &str, value: &str) -> Result<bool, ResolveError> {
    parse_bool(&format!("{id}.{attribute}"), value).map_err(|_| ResolveError::Metadata {
        source_name: format!("{id}.{attribute}"),
        message: format!("'{value}' is not a boolean"),
    })
}

// ---------------------------------------------------------------------------
// MetadataLoader
// ---------------------------------------------------------------------------

/// Where the metadata index comes from.
#[derive(Debug, Clone)]
pub enum MetadataSource {
    /// No index; every module gets neutral defaults.
    None,
    /// Index text already in memory.
    Inline(String),
    /// Index file on disk.
    File(PathBuf),
    /// Store built by the host; never reloaded.
    Prebuilt(Arc<MetadataStore>),
}

impl MetadataSource {
    fn describe(&self) -> String {
        match self {
            Self::None => "<none>".to_owned(),
            Self::Inline(_) => "<inline>".to_owned(),
            Self::File(path) => path.display().to_string(),
            Self::Prebuilt(_) => "<prebuilt>".to_owned(),
        }
    }

    fn read(&self) -> Result<Option<String>, ResolveError> {
        match self {
            Self::None | Self::Prebuilt(_) => Ok(None),
            Self::Inline(text) => Ok(Some(text.clone())),
            Self::File(path) => std::fs::read_to_string(path).map(Some).map_err(|e| {
                ResolveError::Metadata {
                    source_name: self.describe(),
                    message: e.to_string(),
                }
            }),
        }
    }
}

/// Loads the metadata index once per environment and caches it.
///
/// The cache is keyed by [`EnvironmentId`]; asking for metadata under a
/// different environment reloads the index.
#[derive(Debug)]
pub struct MetadataLoader {
    source: MetadataSource,
    required: bool,
    cached: Mutex<Option<(EnvironmentId, Arc<MetadataStore>)>>,
}

impl MetadataLoader {
    /// Create a loader. When `required` is set, an unreadable or malformed
    /// source is fatal instead of falling back to defaults.
    pub fn new(source: MetadataSource, required: bool) -> Self {
        Self {
            source,
            required,
            cached: Mutex::new(None),
        }
    }

    /// A loader backed by an already-built store.
    pub fn from_store(store: MetadataStore) -> Self {
        Self::new(MetadataSource::Prebuilt(Arc::new(store)), false)
    }

    /// Metadata for the given environment, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Metadata`] only when the source is required
    /// and cannot be read or parsed.
    pub fn load(&self, environment: &dyn Environment) -> Result<Arc<MetadataStore>, ResolveError> {
        if let MetadataSource::Prebuilt(store) = &self.source {
            return Ok(Arc::clone(store));
        }

        let identity = environment.identity();
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_id, store)) = cached.as_ref() {
            if *cached_id == identity {
                return Ok(Arc::clone(store));
            }
        }

        let store = Arc::new(self.read_store()?);
        *cached = Some((identity, Arc::clone(&store)));
        Ok(store)
    }

    fn read_store(&self) -> Result<MetadataStore, ResolveError> {
        let parsed = self.source.read().and_then(|text| match text {
            Some(text) => MetadataStore::parse(&text),
            None if self.required && matches!(self.source, MetadataSource::None) => {
                Err(ResolveError::Metadata {
                    source_name: self.source.describe(),
                    message: "no metadata source configured".to_owned(),
                })
            }
            None => Ok(MetadataStore::empty()),
        });
        match parsed {
            Ok(store) => {
                debug!(
                    source = %self.source.describe(),
                    modules = store.len(),
                    "module metadata loaded"
                );
                Ok(store)
            }
            Err(e) if self.required => Err(e),
            Err(e) => {
                warn!(
                    source = %self.source.describe(),
                    error = %e,
                    "module metadata unavailable, using neutral defaults"
                );
                Ok(MetadataStore::empty())
            }
        }
    }
}
