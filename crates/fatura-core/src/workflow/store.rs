//! In-memory, append-only invoice collection.

use tracing::debug;

use crate::models::{ExtractedRecord, Invoice, TextSource};

/// Invoices created during a session, in creation order.
///
/// Ids are sequential and 1-based; invoices are never removed, so an id is
/// also the position in the collection plus one.
#[derive(Debug, Default)]
pub struct InvoiceStore {
    invoices: Vec<Invoice>,
    current: Option<u64>,
}

impl InvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new pending invoice and make it the current one.
    pub fn create(
        &mut self,
        raw_extraction: String,
        structured_data: Option<ExtractedRecord>,
        source: TextSource,
    ) -> &Invoice {
        let id = self.invoices.len() as u64 + 1;
        debug!(id, ?source, structured = structured_data.is_some(), "Creating invoice");

        self.invoices
            .push(Invoice::new(id, raw_extraction, structured_data, source));
        self.current = Some(id);
        &self.invoices[self.invoices.len() - 1]
    }

    pub fn get(&self, id: u64) -> Option<&Invoice> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.invoices.get(index)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut Invoice> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.invoices.get_mut(index)
    }

    /// Most recently created invoice.
    pub fn current(&self) -> Option<&Invoice> {
        self.current.and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.iter()
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }
}
