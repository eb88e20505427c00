use crate::database::core::{PreparedStatement, StoreResult};

/// A statement compiled through a [`MappingStore`](super::MappingStore).
///
/// Holds the statement the delegate compiled for the mapped SQL; every call
/// goes straight to it.
pub struct MappedStatement<'a> {
    inner: Box<dyn PreparedStatement + 'a>,
}

impl<'a> MappedStatement<'a> {
    pub(super) fn new(inner: Box<dyn PreparedStatement + 'a>) -> Self {
        Self { inner }
    }
}

impl PreparedStatement for MappedStatement<'_> {
    fn bind_text(&mut self, index: usize, value: &str) -> StoreResult<()> {
        self.inner.bind_text(index, value)
    }

    fn bind_long(&mut self, index: usize, value: i64) -> StoreResult<()> {
        self.inner.bind_long(index, value)
    }

    fn bind_double(&mut self, index: usize, value: f64) -> StoreResult<()> {
        self.inner.bind_double(index, value)
    }

    fn bind_null(&mut self, index: usize) -> StoreResult<()> {
        self.inner.bind_null(index)
    }

    fn bind_blob(&mut self, index: usize, value: &[u8]) -> StoreResult<()> {
        self.inner.bind_blob(index, value)
    }

    fn clear_bindings(&mut self) -> StoreResult<()> {
        self.inner.clear_bindings()
    }

    fn execute(&mut self) -> StoreResult<()> {
        self.inner.execute()
    }

    fn execute_insert(&mut self) -> StoreResult<i64> {
        self.inner.execute_insert()
    }

    fn execute_update_delete(&mut self) -> StoreResult<usize> {
        self.inner.execute_update_delete()
    }

    fn simple_query_for_long(&mut self) -> StoreResult<i64> {
        self.inner.simple_query_for_long()
    }

    fn simple_query_for_string(&mut self) -> StoreResult<Option<String>> {
        self.inner.simple_query_for_string()
    }

    fn parameter_count(&self) -> usize {
        self.inner.parameter_count()
    }

    /// The mapped SQL
    fn sql(&self) -> &str {
        self.inner.sql()
    }

    fn close(self: Box<Self>) -> StoreResult<()> {
        self.inner.close()
    }
}
