//! Import events for diagnostics.
//!
//! Listeners observe what a site activated and excluded. They receive shared
//! references only and cannot change the outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::exclusion::ExclusionSet;

/// What one site activated and excluded.
#[derive(Debug, Clone, Serialize)]
pub struct ImportEvent {
    /// Site that produced the entry.
    pub site: String,
    /// Modules accepted by the site, in resolution order.
    pub configurations: Vec<String>,
    /// Exclusions declared for the site.
    pub exclusions: ExclusionSet,
    /// When the site finished resolving.
    pub timestamp: DateTime<Utc>,
}

/// Receives [`ImportEvent`]s.
pub trait ImportListener: Send + Sync {
    /// Called once per site resolution.
    fn on_import_event(&self, event: &ImportEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl ImportListener for LoggingListener {
    fn on_import_event(&self, event: &ImportEvent) {
        info!(
            site = %event.site,
            activated = event.configurations.len(),
            excluded = event.exclusions.len(),
            "auto-activation entry resolved"
        );
    }
}
