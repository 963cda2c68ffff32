//! Invoice creation from an uploaded file.

use thiserror::Error;
use tracing::info;

use crate::models::{EventDraft, Invoice};
use crate::repository::{DieselError, InvoiceRepository, TenantRepository};
use crate::storage::{FileStore, StorageError};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DieselError),
}

pub struct UploadService {
    invoices: InvoiceRepository,
    tenants: TenantRepository,
    store: FileStore,
}

impl UploadService {
    pub fn new(invoices: InvoiceRepository, tenants: TenantRepository, store: FileStore) -> Self {
        Self {
            invoices,
            tenants,
            store,
        }
    }

    /// Persist the uploaded bytes to disk and create a NEW invoice, in one
    /// transaction with its audit event. Only the file path enters the
    /// database.
    pub async fn upload(
        &self,
        tenant_id: &str,
        content: &[u8],
        original_filename: &str,
        actor: &str,
        request_id: Option<&str>,
    ) -> Result<Invoice, UploadError> {
        let tenant = self
            .tenants
            .get(tenant_id)
            .await?
            .ok_or_else(|| UploadError::TenantNotFound(tenant_id.to_string()))?;

        let stored = self.store.save(content, original_filename)?;

        let invoice = Invoice::from_upload(
            tenant.id.clone(),
            stored.path.clone(),
            original_filename.to_string(),
        );

        let mut event = EventDraft::new("INVOICE_UPLOADED", "invoice", &invoice.id)
            .tenant(&tenant.id)
            .actor(actor)
            .source("manual")
            .metadata(serde_json::json!({
                "filename": original_filename,
                "content_hash": stored.content_hash,
                "size": stored.size,
            }));
        if let Some(request_id) = request_id {
            event = event.request_id(request_id);
        }

        self.invoices.create(&invoice, &event).await?;

        info!(
            invoice_id = %invoice.id,
            tenant = %tenant.name,
            filename = original_filename,
            "invoice uploaded"
        );

        Ok(invoice)
    }
}
