use crate::domain::NormalizedRow;
use crate::pipeline::processing::normalize::IngestContext;

/// Decoration pass attaching human-readable dimension labels to normalized
/// rows.
///
/// Pure pass-through when the context supplies no lookup. A miss for an
/// individual row is not an error: `dimension_name` stays absent and
/// renderers fall back to `dimension_ref`.
pub fn enrich_dimension_names(rows: &mut [NormalizedRow], context: &IngestContext) {
    let Some(lookup) = context.dimension_names.as_deref() else {
        return;
    };
    let data_source_id = context.data_source_id.as_deref().unwrap_or_default();
    for row in rows {
        if row.dimension_name.is_none() {
            row.dimension_name = lookup.dimension_name(data_source_id, &row.dimension_ref);
        }
    }
}
