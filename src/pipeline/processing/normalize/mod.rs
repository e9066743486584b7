use std::sync::Arc;

use serde_json::Value;

use crate::domain::NormalizedRow;

pub mod detect;
pub mod dispatch;
pub mod handlers;
pub mod registry;

pub use dispatch::Diagnostics;
pub use registry::FormatRegistry;

/// Resolves human-readable dimension labels for `(data source, dimension)`
/// pairs. Supplied by the surrounding system through [`IngestContext`].
pub trait DimensionNameLookup: Send + Sync {
    fn dimension_name(&self, data_source_id: &str, dimension_ref: &str) -> Option<String>;
}

/// Opaque per-ingestion context passed to handlers and the enricher.
///
/// Handlers may read the data-source identity but must not depend on it for
/// correctness.
#[derive(Clone, Default)]
pub struct IngestContext {
    pub data_source_id: Option<String>,
    pub dimension_names: Option<Arc<dyn DimensionNameLookup>>,
}

/// A registered source format: recognition plus record transformation.
///
/// Handlers are registered once at startup and shared immutably across
/// ingestions, so implementations must be stateless.
pub trait FormatHandler: Send + Sync + std::fmt::Debug {
    /// Stable registry identifier, e.g. `intercom_mrt`.
    fn tag(&self) -> &'static str;

    /// Business-context label written into `metadata.source_type`.
    fn source_type(&self) -> &'static str;

    /// Higher wins when several recognizers accept the same payload;
    /// registration order breaks ties.
    fn priority(&self) -> i32 {
        0
    }

    /// Shape-only inspection of a single record; must be pure and fast.
    /// Recognition decisions are made from one record's structure.
    fn recognize(&self, record: &Value) -> bool;

    /// Transform one raw record into zero or more normalized rows.
    ///
    /// Records the handler cannot shape are skipped by returning an empty
    /// vec after counting the drop in `diagnostics`. An `Err` is reserved
    /// for unexpected failures; the dispatcher isolates it to the one
    /// record.
    fn transform(
        &self,
        record: &Value,
        record_index: usize,
        context: &IngestContext,
        diagnostics: &mut Diagnostics,
    ) -> anyhow::Result<Vec<NormalizedRow>>;
}
