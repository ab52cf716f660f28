//! Configuration loading.
//!
//! Loads resolver configuration from `./autoactivate.toml` (or
//! `$AUTOACTIVATE_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults. Every section uses `#[serde(default)]`, so
//! a minimal or empty file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::environment::{
    parse_bool, Environment, LayeredEnvironment, MapEnvironment, SystemEnvironment,
};
use crate::registry::{ModuleRegistry, StaticRegistry};
use crate::resolve::conditions::{OnEnabledFilter, OnModuleFilter, OnPropertyFilter};
use crate::resolve::{
    FilterPipeline, ImportSelector, LoggingListener, MetadataLoader, MetadataSource, PropertyKeys,
    Resolver, Site,
};

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "autoactivate.toml";

// ── Top-level config ────────────────────────────────────────────

/// Top-level resolver configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Log output settings.
    pub logging: LoggingConfig,
    /// Environment keys consulted during resolution.
    pub keys: PropertyKeys,
    /// Module metadata index.
    pub metadata: MetadataConfig,
    /// Candidate catalog.
    pub registry: RegistryConfig,
    /// Static environment properties, lowest precedence.
    pub environment: BTreeMap<String, String>,
    /// Request sites, resolved in order.
    #[serde(rename = "site")]
    pub sites: Vec<Site>,
}

impl ResolverConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `explicit`, else `$AUTOACTIVATE_CONFIG_PATH`, else
    /// `./autoactivate.toml`. A missing default file yields defaults; a
    /// missing explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (avoids `set_var` in tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let (path, must_exist) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match env("AUTOACTIVATE_CONFIG_PATH") {
                Some(p) => (PathBuf::from(p), true),
                None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
            },
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let mut config = Self::from_toml(&contents)?;
                config.rebase(path.parent().unwrap_or_else(|| Path::new(".")));
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !must_exist => {
                tracing::info!("no config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to read config file {}: {e}",
                    path.display()
                ))
            }
        };
        config.apply_overrides(env);
        Ok(config)
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or mistyped fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Resolve relative file paths against the config file's directory.
    fn rebase(&mut self, base: &Path) {
        let paths = self
            .metadata
            .path
            .iter_mut()
            .chain(self.logging.dir.iter_mut())
            .chain(self.registry.imports.iter_mut());
        for path in paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Apply environment variable overrides (env > config > defaults).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("AUTOACTIVATE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("AUTOACTIVATE_METADATA_PATH") {
            self.metadata.path = Some(PathBuf::from(v));
        }
        if let Some(v) = env("AUTOACTIVATE_METADATA_REQUIRED") {
            match parse_bool("AUTOACTIVATE_METADATA_REQUIRED", &v) {
                Ok(required) => self.metadata.required = required,
                Err(_) => tracing::warn!(
                    var = "AUTOACTIVATE_METADATA_REQUIRED",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Sites to resolve; a single `default` site when none are configured.
    pub fn effective_sites(&self) -> Vec<Site> {
        if self.sites.is_empty() {
            vec![Site::new("default")]
        } else {
            self.sites.clone()
        }
    }

    /// Build the registry described by `[registry]`.
    ///
    /// # Errors
    ///
    /// Returns an error if an import list file cannot be read.
    pub fn build_registry(&self) -> Result<StaticRegistry> {
        let mut registry = StaticRegistry::new(self.registry.candidates.iter().cloned())
            .with_available(self.registry.available.iter().cloned());
        for path in &self.registry.imports {
            registry = registry.with_import_file(path)?;
        }
        Ok(registry)
    }

    /// Environment layered as: `overrides`, process env, `[environment]`.
    pub fn build_environment(&self, overrides: &[(String, String)]) -> LayeredEnvironment {
        LayeredEnvironment::new()
            .layer(MapEnvironment::new(overrides.iter().cloned()))
            .layer(SystemEnvironment::new())
            .layer(MapEnvironment::new(self.environment.clone()))
    }

    /// Metadata loader described by `[metadata]`.
    pub fn build_metadata_loader(&self) -> MetadataLoader {
        let source = match &self.metadata.path {
            Some(path) => MetadataSource::File(path.clone()),
            None => MetadataSource::None,
        };
        MetadataLoader::new(source, self.metadata.required)
    }

    /// Wire a resolver with the built-in filters and the logging listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be built.
    pub fn build_resolver(&self, overrides: &[(String, String)]) -> Result<Resolver> {
        let registry: Arc<dyn ModuleRegistry> = Arc::new(self.build_registry()?);
        let environment: Arc<dyn Environment> = Arc::new(self.build_environment(overrides));
        let filters = FilterPipeline::new()
            .with(OnModuleFilter::new(Arc::clone(&registry)))
            .with(OnPropertyFilter::new(Arc::clone(&environment)))
            .with(OnEnabledFilter::new(
                Arc::clone(&environment),
                self.keys.module_prefix.clone(),
                self.keys.enabled_by_default.clone(),
            ));
        let selector = ImportSelector::new(
            registry,
            environment,
            Arc::new(self.build_metadata_loader()),
        )
        .with_filters(filters)
        .with_keys(self.keys.clone())
        .with_listener(Arc::new(LoggingListener));
        Ok(Resolver::new(selector))
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for JSON log files, relative to the config file; stderr
    /// only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
        }
    }
}

// ── Metadata config ─────────────────────────────────────────────

/// Module metadata index settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Path to the properties-style index.
    pub path: Option<PathBuf>,
    /// Fail instead of falling back to defaults when the index is unusable.
    pub required: bool,
}

// ── Registry config ─────────────────────────────────────────────

/// Candidate catalog settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Import list files, one module id per line.
    pub imports: Vec<PathBuf>,
    /// Candidate ids listed inline, ahead of import files.
    pub candidates: Vec<String>,
    /// Modules present in the deployment that are not candidates.
    pub available: Vec<String>,
}
