//! Condition filter pipeline.
//!
//! Filters prune candidates in bulk using only metadata and environment
//! facts. Each filter sees the whole slot array in original order; slots
//! removed by an earlier filter are passed as `None` and are not
//! reconsidered.

use std::time::Instant;

use serde::Serialize;
use tracing::trace;

use super::metadata::MetadataStore;
use super::ResolveError;

/// Failure reported by a condition filter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct FilterError(pub String);

impl FilterError {
    /// Wrap any displayable failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A bulk activation condition.
pub trait ConditionFilter: Send + Sync {
    /// Name used in diagnostics and errors.
    fn name(&self) -> &str;

    /// Answer one bool per slot, in slot order.
    ///
    /// Removed slots are `None` and must be answered with `true`. The call
    /// must not have side effects visible outside of it.
    ///
    /// # Errors
    ///
    /// Any error aborts the resolution run.
    fn matches(
        &self,
        candidates: &[Option<&str>],
        metadata: &MetadataStore,
    ) -> Result<Vec<bool>, FilterError>;
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Rejected module id.
    pub id: String,
    /// Filter that rejected it.
    pub filter: String,
}

/// Result of running the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    /// Surviving ids, original relative order preserved.
    pub accepted: Vec<String>,
    /// One record per removed id, in slot order.
    pub rejected: Vec<Rejection>,
}

impl FilterOutcome {
    /// Whether any candidate was removed.
    pub fn filtered_any(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Ordered list of condition filters.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn ConditionFilter>>,
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

impl FilterPipeline {
    /// Create an empty pipeline; every candidate passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; filters run in registration order.
    #[must_use]
    pub fn with(mut self, filter: impl ConditionFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Append a boxed filter.
    pub fn push(&mut self, filter: Box<dyn ConditionFilter>) {
        self.filters.push(filter);
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filters are registered.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter over `candidates`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Filter`] when a filter fails and
    /// [`ResolveError::FilterArity`] when it answers for the wrong number
    /// of slots.
    pub fn filter(
        &self,
        candidates: Vec<String>,
        metadata: &MetadataStore,
    ) -> Result<FilterOutcome, ResolveError> {
        let started = Instant::now();
        let mut removed_by: Vec<Option<usize>> = vec![None; candidates.len()];
        let mut skipped = false;

        for (filter_index, filter) in self.filters.iter().enumerate() {
            let slots: Vec<Option<&str>> = candidates
                .iter()
                .zip(&removed_by)
                .map(|(id, removed)| removed.is_none().then_some(id.as_str()))
                .collect();

            let answers =
                filter
                    .matches(&slots, metadata)
                    .map_err(|e| ResolveError::Filter {
                        filter: filter.name().to_owned(),
                        message: e.to_string(),
                    })?;
            if answers.len() != slots.len() {
                return Err(ResolveError::FilterArity {
                    filter: filter.name().to_owned(),
                    expected: slots.len(),
                    actual: answers.len(),
                });
            }

            for ((removed, slot), matched) in removed_by.iter_mut().zip(&slots).zip(answers) {
                if !matched && slot.is_some() {
                    *removed = Some(filter_index);
                    skipped = true;
                }
            }
        }

        if !skipped {
            return Ok(FilterOutcome {
                accepted: candidates,
                rejected: Vec::new(),
            });
        }

        let total = candidates.len();
        let mut outcome = FilterOutcome::default();
        for (id, removed) in candidates.into_iter().zip(removed_by) {
            match removed.and_then(|index| self.filters.get(index)) {
                Some(filter) => outcome.rejected.push(Rejection {
                    id,
                    filter: filter.name().to_owned(),
                }),
                None => outcome.accepted.push(id),
            }
        }

        trace!(
            filtered = total.saturating_sub(outcome.accepted.len()),
            elapsed_ms = started.elapsed().as_millis(),
            "filtered auto-activation candidates"
        );
        Ok(outcome)
    }
}

/// Filter from a closure evaluated per live candidate.
///
/// Convenient for host-specific conditions that need no bulk lookups.
pub struct PredicateFilter<F> {
    name: String,
    predicate: F,
}

impl<F> PredicateFilter<F>
where
    F: Fn(&str, &MetadataStore) -> Result<bool, FilterError> + Send + Sync,
{
    /// Create a named predicate filter.
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> ConditionFilter for PredicateFilter<F>
where
    F: Fn(&str, &MetadataStore) -> Result<bool, FilterError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(
        &self,
        candidates: &[Option<&str>],
        metadata: &MetadataStore,
    ) -> Result<Vec<bool>, FilterError> {
        candidates
            .iter()
            .map(|slot| match slot {
                Some(id) => (self.predicate)(*id, metadata),
                None => Ok(true),
            })
            .collect()
    }
}
