//! Payment recording - the only path to the PAID terminal status.
//!
//! Records that a payment happened elsewhere; no payment is executed.

use bigdecimal::BigDecimal;
use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::models::{EventDraft, InvoiceStatus, Payment};
use crate::repository::{DieselError, InvoiceRepository};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invoice {0} not found")]
    NotFound(String),

    #[error("invoice {invoice_id} status '{status}' is not payable; expected APPROVED")]
    IneligibleStatus {
        invoice_id: String,
        status: &'static str,
    },

    #[error(transparent)]
    Db(#[from] DieselError),
}

pub struct PaymentService {
    invoices: InvoiceRepository,
}

impl PaymentService {
    pub fn new(invoices: InvoiceRepository) -> Self {
        Self { invoices }
    }

    /// Record a payment against an APPROVED invoice and advance it to
    /// PAID, in one transaction with its audit event.
    pub async fn record(
        &self,
        invoice_id: &str,
        paid_amount: BigDecimal,
        paid_currency: String,
        method: String,
        reference: String,
        recorded_by: Option<String>,
    ) -> Result<Payment, PaymentError> {
        let invoice = self
            .invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(invoice_id.to_string()))?;

        if invoice.status != InvoiceStatus::Approved {
            return Err(PaymentError::IneligibleStatus {
                invoice_id: invoice.id,
                status: invoice.status.as_str(),
            });
        }

        let payment = Payment {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: invoice.tenant_id.clone(),
            invoice_id: invoice.id.clone(),
            paid_amount,
            paid_currency,
            paid_at: Utc::now(),
            method,
            reference,
            recorded_by,
        };

        let event = EventDraft::new("PAYMENT_RECORDED", "invoice", &invoice.id)
            .tenant(&invoice.tenant_id)
            .actor(payment.recorded_by.as_deref().unwrap_or("system"))
            .notes(format!(
                "{} {} via {}",
                payment.paid_amount, payment.paid_currency, payment.method
            ));

        self.invoices.record_payment(&payment, &event).await?;

        info!(
            invoice_id = %payment.invoice_id,
            amount = %payment.paid_amount,
            currency = %payment.paid_currency,
            "payment recorded"
        );

        Ok(payment)
    }
}
