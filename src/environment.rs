//! Environment property lookup.
//!
//! The resolver never loads properties itself; hosts supply an
//! [`Environment`] that answers key lookups. Each environment carries an
//! [`EnvironmentId`] so caches derived from it can be invalidated when the
//! host swaps in a different environment.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::resolve::ResolveError;

static NEXT_ENVIRONMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of an environment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(u64);

impl EnvironmentId {
    /// Allocate a fresh identity, distinct from every previous one.
    pub fn fresh() -> Self {
        Self(NEXT_ENVIRONMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}", self.0)
    }
}

/// Key/value property source consulted by filters and exclusion lookup.
pub trait Environment: Send + Sync {
    /// Raw property value, if set.
    fn property(&self, key: &str) -> Option<String>;

    /// Identity used to scope caches derived from this environment.
    fn identity(&self) -> EnvironmentId;

    /// Property parsed as a boolean (`true`/`false`, case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidProperty`] when the value is set but
    /// is not a boolean.
    fn bool_property(&self, key: &str) -> Result<Option<bool>, ResolveError> {
        self.property(key)
            .map(|value| parse_bool(key, &value))
            .transpose()
    }

    /// Property parsed as a comma-separated list; blank entries are dropped.
    fn list_property(&self, key: &str) -> Vec<String> {
        self.property(key)
            .map(|value| split_list(&value))
            .unwrap_or_default()
    }
}

impl<E: Environment + ?Sized> Environment for Arc<E> {
    fn property(&self, key: &str) -> Option<String> {
        (**self).property(key)
    }

    fn identity(&self) -> EnvironmentId {
        (**self).identity()
    }
}

/// Parse a boolean property value.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidProperty`] for anything other than
/// `true` or `false`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ResolveError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ResolveError::InvalidProperty {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

/// Split a comma-separated list, trimming entries and skipping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// MapEnvironment
// ---------------------------------------------------------------------------

/// Immutable in-memory environment.
#[derive(Debug, Clone)]
pub struct MapEnvironment {
    id: EnvironmentId,
    properties: BTreeMap<String, String>,
}

impl MapEnvironment {
    /// Create an environment from key/value pairs.
    pub fn new<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            id: EnvironmentId::fresh(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// An environment with no properties.
    pub fn empty() -> Self {
        Self::new(std::iter::empty::<(String, String)>())
    }

    /// Return a new environment with one extra property and a new identity.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self.id = EnvironmentId::fresh();
        self
    }

    /// Number of properties held.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no properties are held.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl Environment for MapEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn identity(&self) -> EnvironmentId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// SystemEnvironment
// ---------------------------------------------------------------------------

/// Process environment variables with relaxed key mapping.
///
/// `autoactivate.exclude` is looked up verbatim first, then as
/// `AUTOACTIVATE_EXCLUDE` (dots and dashes become underscores, upper-cased).
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    id: EnvironmentId,
}

impl SystemEnvironment {
    /// Snapshot identity for the current process environment.
    pub fn new() -> Self {
        Self {
            id: EnvironmentId::fresh(),
        }
    }

    /// Variable name a property key maps to.
    pub fn variable_name(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl Default for SystemEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SystemEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        if key.is_empty() || key.contains(['=', '\0']) {
            return None;
        }
        std::env::var(key)
            .ok()
            .or_else(|| std::env::var(Self::variable_name(key)).ok())
    }

    fn identity(&self) -> EnvironmentId {
        self.id
    }
}

// ---------------------------------------------------------------------------
// LayeredEnvironment
// ---------------------------------------------------------------------------

/// Ordered stack of environments; the first layer holding a key wins.
pub struct LayeredEnvironment {
    id: EnvironmentId,
    layers: Vec<Box<dyn Environment>>,
}

impl fmt::Debug for LayeredEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredEnvironment")
            .field("id", &self.id)
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl LayeredEnvironment {
    /// Create an environment with no layers.
    pub fn new() -> Self {
        Self {
            id: EnvironmentId::fresh(),
            layers: Vec::new(),
        }
    }

    /// Append a lower-precedence layer.
    #[must_use]
    pub fn layer(mut self, environment: impl Environment + 'static) -> Self {
        self.layers.push(Box::new(environment));
        self.id = EnvironmentId::fresh();
        self
    }
}

impl Default for LayeredEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for LayeredEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.property(key))
    }

    fn identity(&self) -> EnvironmentId {
        self.id
    }
}
