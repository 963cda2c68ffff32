//! Field extraction - applies structured fields to an invoice record.
//!
//! Current implementation: manual field ingestion through the CLI/API
//! caller. Automated extraction slots in here: an OCR or LLM backend that
//! produces an `InvoicePatch` (plus a confidence score for the audit
//! event) can be called wherever the patch is built today, with no change
//! to the application path below.

use thiserror::Error;
use tracing::info;

use crate::models::{EventDraft, Invoice, InvoicePatch};
use crate::repository::{DieselError, InvoiceRepository};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("invoice {0} not found")]
    NotFound(String),

    #[error("extraction patch contains no fields")]
    EmptyPatch,

    #[error(transparent)]
    Db(#[from] DieselError),
}

pub struct ExtractionService {
    invoices: InvoiceRepository,
}

impl ExtractionService {
    pub fn new(invoices: InvoiceRepository) -> Self {
        Self { invoices }
    }

    /// Apply `patch` to the invoice and advance its status to EXTRACTED.
    ///
    /// Only fields present in the patch are written, so partial updates
    /// never clobber previously captured values. The applied-field map is
    /// persisted as the invoice's raw extraction payload for auditability
    /// and re-processing.
    pub async fn extract(
        &self,
        invoice_id: &str,
        patch: &InvoicePatch,
        actor: &str,
        source: &str,
        confidence: Option<f64>,
        request_id: Option<&str>,
    ) -> Result<Invoice, ExtractionError> {
        if patch.is_empty() {
            return Err(ExtractionError::EmptyPatch);
        }

        let mut invoice = self
            .invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| ExtractionError::NotFound(invoice_id.to_string()))?;

        let applied = patch.apply(&mut invoice);
        let field_names: Vec<String> = applied
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        invoice.extracted = Some(applied);
        invoice.status = crate::models::InvoiceStatus::Extracted;

        let mut event = EventDraft::new("INVOICE_EXTRACTED", "invoice", &invoice.id)
            .tenant(&invoice.tenant_id)
            .actor(actor)
            .source(source)
            .notes(format!("fields: {}", field_names.join(", ")));
        if let Some(confidence) = confidence {
            event = event.confidence(confidence);
        }
        if let Some(request_id) = request_id {
            event = event.request_id(request_id);
        }

        self.invoices.save_extraction(&invoice, &event).await?;

        info!(
            invoice_id = %invoice.id,
            fields = ?field_names,
            source = source,
            "fields extracted"
        );

        Ok(invoice)
    }
}
