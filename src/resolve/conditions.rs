//! Built-in condition filters.
//!
//! Each filter reads one metadata attribute and checks it against the
//! registry or the environment. Modules without the attribute pass.

use std::sync::Arc;

use tracing::trace;

use super::filter::{ConditionFilter, FilterError};
use super::metadata::MetadataStore;
use crate::environment::{parse_bool, split_list, Environment};
use crate::registry::ModuleRegistry;

/// Attribute listing modules that must be resolvable.
pub const ON_MODULE_ATTRIBUTE: &str = "ConditionalOnModule";
/// Attribute listing `key` or `key=value` property conditions, `;`-separated.
pub const ON_PROPERTY_ATTRIBUTE: &str = "ConditionalOnProperty";
/// Attribute naming the toggle consulted by [`OnEnabledFilter`].
pub const ON_ENABLED_ATTRIBUTE: &str = "ConditionalOnEnabled";
/// Attribute giving a module's own enabled default.
pub const ENABLED_BY_DEFAULT_ATTRIBUTE: &str = "EnabledByDefault";

// ---------------------------------------------------------------------------
// OnModuleFilter
// ---------------------------------------------------------------------------

/// Requires every module named in `ConditionalOnModule` to be resolvable.
pub struct OnModuleFilter {
    registry: Arc<dyn ModuleRegistry>,
}

impl OnModuleFilter {
    /// Create the filter over a registry.
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self { registry }
    }
}

impl ConditionFilter for OnModuleFilter {
    fn name(&self) -> &str {
        "on-module"
    }

    fn matches(
        &self,
        candidates: &[Option<&str>],
        metadata: &MetadataStore,
    ) -> Result<Vec<bool>, FilterError> {
        Ok(candidates
            .iter()
            .map(|slot| {
                let Some(id) = slot else { return true };
                let Some(required) = metadata.attribute(id, ON_MODULE_ATTRIBUTE) else {
                    return true;
                };
                let missing: Vec<String> = split_list(required)
                    .into_iter()
                    .filter(|dep| !self.registry.is_resolvable(dep))
                    .collect();
                if !missing.is_empty() {
                    trace!(module = id, ?missing, "required modules not resolvable");
                }
                missing.is_empty()
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// OnPropertyFilter
// ---------------------------------------------------------------------------

/// Requires environment properties named in `ConditionalOnProperty`.
///
/// `key` matches when the property is set to anything but `false`;
/// `key=value` matches when the property equals `value`, ignoring case.
pub struct OnPropertyFilter {
    environment: Arc<dyn Environment>,
}

impl OnPropertyFilter {
    /// Create the filter over an environment.
    pub fn new(environment: Arc<dyn Environment>) -> Self {
        Self { environment }
    }

    fn condition_holds(&self, condition: &str) -> bool {
        match condition.split_once('=') {
            Some((key, expected)) => self
                .environment
                .property(key.trim())
                .is_some_and(|actual| actual.trim().eq_ignore_ascii_case(expected.trim())),
            None => self
                .environment
                .property(condition)
                .is_some_and(|actual| !actual.trim().eq_ignore_ascii_case("false")),
        }
    }
}

impl ConditionFilter for OnPropertyFilter {
    fn name(&self) -> &str {
        "on-property"
    }

    fn matches(
        &self,
        candidates: &[Option<&str>],
        metadata: &MetadataStore,
    ) -> Result<Vec<bool>, FilterError> {
        Ok(candidates
            .iter()
            .map(|slot| {
                let Some(id) = slot else { return true };
                metadata
                    .attribute(id, ON_PROPERTY_ATTRIBUTE)
                    .map_or(true, |conditions| {
                        conditions
                            .split(';')
                            .map(str::trim)
                            .filter(|c| !c.is_empty())
                            .all(|c| self.condition_holds(c))
                    })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// OnEnabledFilter
// ---------------------------------------------------------------------------

/// Per-module enablement toggles.
///
/// For a module declaring `ConditionalOnEnabled=<name>` the outcome is the
/// first of: `<prefix>.<name>.enabled`, the environment-wide default key,
/// the module's `EnabledByDefault` attribute, and finally `true`.
pub struct OnEnabledFilter {
    environment: Arc<dyn Environment>,
    prefix: String,
    default_key: String,
}

impl OnEnabledFilter {
    /// Create the filter with the property prefix and default key.
    pub fn new(
        environment: Arc<dyn Environment>,
        prefix: impl Into<String>,
        default_key: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            prefix: prefix.into(),
            default_key: default_key.into(),
        }
    }

    /// Property key toggling the named module.
    pub fn toggle_key(&self, name: &str) -> String {
        format!("{}.{}.enabled", self.prefix, name.to_ascii_lowercase())
    }

    fn is_enabled(&self, id: &str, name: &str, metadata: &MetadataStore) -> Result<bool, FilterError> {
        let key = self.toggle_key(name);
        if let Some(enabled) = self
            .environment
            .bool_property(&key)
            .map_err(|e| FilterError::new(e.to_string()))?
        {
            return Ok(enabled);
        }
        if let Some(enabled) = self
            .environment
            .bool_property(&self.default_key)
            .map_err(|e| FilterError::new(e.to_string()))?
        {
            return Ok(enabled);
        }
        match metadata.attribute(id, ENABLED_BY_DEFAULT_ATTRIBUTE) {
            Some(value) => parse_bool(ENABLED_BY_DEFAULT_ATTRIBUTE, value)
                .map_err(|e| FilterError::new(format!("{id}: {e}"))),
            None => Ok(true),
        }
    }
}

impl ConditionFilter for OnEnabledFilter {
    fn name(&self) -> &str {
        "on-enabled"
    }

    fn matches(
        &self,
        candidates: &[Option<&str>],
        metadata: &MetadataStore,
    ) -> Result<Vec<bool>, FilterError> {
        candidates
            .iter()
            .map(|slot| match slot {
                Some(id) => match metadata.attribute(id, ON_ENABLED_ATTRIBUTE) {
                    Some(name) => self.is_enabled(id, name.trim(), metadata),
                    None => Ok(true),
                },
                None => Ok(true),
            })
            .collect()
    }
}
