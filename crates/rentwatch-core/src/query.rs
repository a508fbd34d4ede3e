//! Read queries: filter, pagination and projection.

use crate::filter::Filter;

/// Parameters for [`ListingsStore::read`](crate::ListingsStore::read).
///
/// Matching rows are paged offset-first, then capped by the limit, then
/// projected. A limit or offset of zero counts as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadQuery {
    /// Row filter. `None` selects every row.
    pub filter: Option<Filter>,
    /// Columns to return. Unknown names are dropped.
    pub columns: Option<Vec<String>>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Number of matching rows to skip.
    pub offset: Option<usize>,
}

impl ReadQuery {
    /// Select every row and column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the projection.
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    pub(crate) fn effective_limit(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => limit,
            _ => usize::MAX,
        }
    }
}
