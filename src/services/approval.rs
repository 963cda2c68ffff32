//! Approval decision processing.
//!
//! The only code path that sets the APPROVED/REJECTED terminal statuses.
//! No payment or external side effect is triggered here.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::models::{Approval, Decision, EventDraft, InvoiceStatus};
use crate::repository::{DieselError, InvoiceRepository};

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("invoice {0} not found")]
    NotFound(String),

    /// The caller attempted a decision on an invoice that is not awaiting
    /// one. Reported as a conflict; the invoice is left untouched.
    #[error("invoice {invoice_id} status '{status}' is not eligible for approval; expected VALIDATED or APPROVAL_PENDING")]
    IneligibleStatus {
        invoice_id: String,
        status: &'static str,
    },

    #[error(transparent)]
    Db(#[from] DieselError),
}

pub struct ApprovalService {
    invoices: InvoiceRepository,
}

impl ApprovalService {
    pub fn new(invoices: InvoiceRepository) -> Self {
        Self { invoices }
    }

    /// Record a human decision and advance the invoice to APPROVED or
    /// REJECTED, in one transaction with its audit event.
    pub async fn decide(
        &self,
        invoice_id: &str,
        decision: Decision,
        decided_by: &str,
        notes: Option<String>,
        request_id: Option<&str>,
    ) -> Result<Approval, ApprovalError> {
        let invoice = self
            .invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(invoice_id.to_string()))?;

        if !invoice.status.is_decidable() {
            return Err(ApprovalError::IneligibleStatus {
                invoice_id: invoice.id,
                status: invoice.status.as_str(),
            });
        }

        let approval = Approval {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: invoice.tenant_id.clone(),
            invoice_id: invoice.id.clone(),
            decision,
            decided_by: decided_by.to_string(),
            decided_at: Utc::now(),
            notes,
        };

        let (status, event_type) = match decision {
            Decision::Approve => (InvoiceStatus::Approved, "INVOICE_APPROVED"),
            Decision::Reject => (InvoiceStatus::Rejected, "INVOICE_REJECTED"),
        };

        let mut event = EventDraft::new(event_type, "invoice", &invoice.id)
            .tenant(&invoice.tenant_id)
            .actor(decided_by);
        if let Some(notes) = &approval.notes {
            event = event.notes(notes.clone());
        }
        if let Some(request_id) = request_id {
            event = event.request_id(request_id);
        }

        self.invoices
            .record_decision(&approval, status, &event)
            .await?;

        info!(
            invoice_id = %approval.invoice_id,
            status = status.as_str(),
            decided_by = %approval.decided_by,
            "decision recorded"
        );

        Ok(approval)
    }
}
