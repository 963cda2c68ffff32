//! Invoice persistence, including the transactional state-changing
//! operations of the lifecycle.
//!
//! Every mutation here writes its audit event on the same connection inside
//! one transaction: a crash can never separate a business write from its
//! audit row.

use std::path::PathBuf;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::records::{
    ApprovalRecord, InvoiceRecord, NewApproval, NewInvoice, NewPayment,
};
use super::util::to_diesel_error;
use super::{audit, exception, parse_date_opt, parse_datetime};
use crate::models::{
    Approval, EventDraft, Invoice, InvoiceException, InvoiceSource, InvoiceStatus, Payment,
};
use crate::schema::{approvals, invoices, payments};

/// Insert one invoice row on the given connection.
pub async fn insert(
    conn: &mut AsyncSqliteConnection,
    invoice: &Invoice,
) -> Result<(), DieselError> {
    let invoice_date = invoice.invoice_date.map(|d| d.to_string());
    let due_date = invoice.due_date.map(|d| d.to_string());
    let amount = invoice.amount.as_ref().map(|a| a.to_string());
    let extracted = match &invoice.extracted {
        Some(value) => Some(serde_json::to_string(value).map_err(to_diesel_error)?),
        None => None,
    };
    let file_path = invoice.file_path.as_ref().map(|p| p.display().to_string());
    let created_at = invoice.created_at.to_rfc3339();
    let updated_at = invoice.updated_at.to_rfc3339();

    let record = NewInvoice {
        id: &invoice.id,
        tenant_id: &invoice.tenant_id,
        vendor: invoice.vendor.as_deref(),
        invoice_number: invoice.invoice_number.as_deref(),
        invoice_date: invoice_date.as_deref(),
        due_date: due_date.as_deref(),
        amount: amount.as_deref(),
        currency: invoice.currency.as_deref(),
        status: invoice.status.as_str(),
        extracted: extracted.as_deref(),
        file_path: file_path.as_deref(),
        original_filename: invoice.original_filename.as_deref(),
        source: invoice.source.as_str(),
        source_message_id: invoice.source_message_id.as_deref(),
        created_at: &created_at,
        updated_at: &updated_at,
    };

    diesel::insert_into(invoices::table)
        .values(&record)
        .execute(conn)
        .await?;

    Ok(())
}

/// Update an invoice's status, touching `updated_at`.
pub async fn update_status(
    conn: &mut AsyncSqliteConnection,
    invoice_id: &str,
    status: InvoiceStatus,
) -> Result<(), DieselError> {
    let updated_at = Utc::now().to_rfc3339();

    diesel::update(invoices::table.find(invoice_id))
        .set((
            invoices::status.eq(status.as_str()),
            invoices::updated_at.eq(&updated_at),
        ))
        .execute(conn)
        .await?;

    Ok(())
}

pub(crate) fn record_to_invoice(record: InvoiceRecord) -> Result<Invoice, DieselError> {
    let status = InvoiceStatus::parse(&record.status)
        .ok_or_else(|| to_diesel_error(format!("unknown invoice status '{}'", record.status)))?;
    let source = InvoiceSource::parse(&record.source)
        .ok_or_else(|| to_diesel_error(format!("unknown invoice source '{}'", record.source)))?;
    let amount = record
        .amount
        .as_deref()
        .map(BigDecimal::from_str)
        .transpose()
        .map_err(to_diesel_error)?;

    Ok(Invoice {
        status,
        source,
        amount,
        invoice_date: parse_date_opt(record.invoice_date),
        due_date: parse_date_opt(record.due_date),
        extracted: record
            .extracted
            .as_deref()
            .and_then(|e| serde_json::from_str(e).ok()),
        file_path: record.file_path.map(PathBuf::from),
        created_at: parse_datetime(&record.created_at),
        updated_at: parse_datetime(&record.updated_at),
        id: record.id,
        tenant_id: record.tenant_id,
        vendor: record.vendor,
        invoice_number: record.invoice_number,
        currency: record.currency,
        original_filename: record.original_filename,
        source_message_id: record.source_message_id,
    })
}

fn record_to_approval(record: ApprovalRecord) -> Result<Approval, DieselError> {
    let decision = crate::models::Decision::parse(&record.decision)
        .ok_or_else(|| to_diesel_error(format!("unknown decision '{}'", record.decision)))?;

    Ok(Approval {
        decision,
        decided_at: parse_datetime(&record.decided_at),
        id: record.id,
        tenant_id: record.tenant_id,
        invoice_id: record.invoice_id,
        decided_by: record.decided_by,
        notes: record.notes,
    })
}

#[derive(Clone)]
pub struct InvoiceRepository {
    pool: AsyncSqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new invoice together with its audit event.
    pub async fn create(&self, invoice: &Invoice, event: &EventDraft) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let invoice = invoice.clone();
        let event = event.clone();

        conn.transaction(|conn| {
            Box::pin(async move {
                insert(conn, &invoice).await?;
                audit::append(conn, &event).await?;
                Ok(())
            })
        })
        .await
    }

    /// Get an invoice by id.
    pub async fn get(&self, id: &str) -> Result<Option<Invoice>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<InvoiceRecord> = invoices::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;

        record.map(record_to_invoice).transpose()
    }

    /// Browse invoices, optionally filtered by tenant and status.
    pub async fn list(
        &self,
        tenant_id: Option<&str>,
        status: Option<InvoiceStatus>,
        limit: u32,
    ) -> Result<Vec<Invoice>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = invoices::table
            .order(invoices::created_at.desc())
            .limit(limit as i64)
            .into_boxed();

        if let Some(tid) = tenant_id {
            query = query.filter(invoices::tenant_id.eq(tid));
        }
        if let Some(st) = status {
            query = query.filter(invoices::status.eq(st.as_str()));
        }

        let records: Vec<InvoiceRecord> = query.load(&mut conn).await?;
        records.into_iter().map(record_to_invoice).collect()
    }

    /// Point-in-time duplicate probe: another invoice of the same tenant
    /// with the same vendor and invoice number but a different id.
    ///
    /// Deliberately not a serializable constraint; two truly concurrent
    /// creations can both pass.
    pub async fn find_duplicate(
        &self,
        tenant_id: &str,
        vendor: &str,
        invoice_number: &str,
        exclude_id: &str,
    ) -> Result<Option<String>, DieselError> {
        let mut conn = self.pool.get().await?;

        let id: Option<String> = invoices::table
            .select(invoices::id)
            .filter(invoices::tenant_id.eq(tenant_id))
            .filter(invoices::vendor.eq(vendor))
            .filter(invoices::invoice_number.eq(invoice_number))
            .filter(invoices::id.ne(exclude_id))
            .first(&mut conn)
            .await
            .optional()?;

        Ok(id)
    }

    /// Persist the result of applying an extraction patch: the updated
    /// field values, the raw extraction payload, the EXTRACTED status, and
    /// the audit event, in one transaction.
    pub async fn save_extraction(
        &self,
        invoice: &Invoice,
        event: &EventDraft,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let invoice = invoice.clone();
        let event = event.clone();

        conn.transaction(|conn| {
            Box::pin(async move {
                let invoice_date = invoice.invoice_date.map(|d| d.to_string());
                let due_date = invoice.due_date.map(|d| d.to_string());
                let amount = invoice.amount.as_ref().map(|a| a.to_string());
                let extracted = match &invoice.extracted {
                    Some(value) => {
                        Some(serde_json::to_string(value).map_err(to_diesel_error)?)
                    }
                    None => None,
                };
                let updated_at = Utc::now().to_rfc3339();

                diesel::update(invoices::table.find(&invoice.id))
                    .set((
                        invoices::vendor.eq(invoice.vendor.as_deref()),
                        invoices::invoice_number.eq(invoice.invoice_number.as_deref()),
                        invoices::invoice_date.eq(invoice_date.as_deref()),
                        invoices::due_date.eq(due_date.as_deref()),
                        invoices::amount.eq(amount.as_deref()),
                        invoices::currency.eq(invoice.currency.as_deref()),
                        invoices::extracted.eq(extracted.as_deref()),
                        invoices::status.eq(InvoiceStatus::Extracted.as_str()),
                        invoices::updated_at.eq(&updated_at),
                    ))
                    .execute(conn)
                    .await?;

                audit::append(conn, &event).await?;
                Ok(())
            })
        })
        .await
    }

    /// Persist a validation outcome: the exception rows, the derived
    /// status, and the audit event, in one transaction.
    pub async fn store_validation(
        &self,
        invoice_id: &str,
        exceptions: &[InvoiceException],
        status: InvoiceStatus,
        event: &EventDraft,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let invoice_id = invoice_id.to_string();
        let exceptions = exceptions.to_vec();
        let event = event.clone();

        conn.transaction(|conn| {
            Box::pin(async move {
                for exc in &exceptions {
                    exception::insert(conn, exc).await?;
                }
                update_status(conn, &invoice_id, status).await?;
                audit::append(conn, &event).await?;
                Ok(())
            })
        })
        .await
    }

    /// Persist a human decision: the approval row, the terminal status,
    /// and the audit event, in one transaction.
    pub async fn record_decision(
        &self,
        approval: &Approval,
        status: InvoiceStatus,
        event: &EventDraft,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let approval = approval.clone();
        let event = event.clone();

        conn.transaction(|conn| {
            Box::pin(async move {
                let decided_at = approval.decided_at.to_rfc3339();
                let record = NewApproval {
                    id: &approval.id,
                    tenant_id: &approval.tenant_id,
                    invoice_id: &approval.invoice_id,
                    decision: approval.decision.as_str(),
                    decided_by: &approval.decided_by,
                    decided_at: &decided_at,
                    notes: approval.notes.as_deref(),
                };

                diesel::insert_into(approvals::table)
                    .values(&record)
                    .execute(conn)
                    .await?;

                update_status(conn, &approval.invoice_id, status).await?;
                audit::append(conn, &event).await?;
                Ok(())
            })
        })
        .await
    }

    /// Persist a payment: the payment row, the PAID status, and the audit
    /// event, in one transaction.
    pub async fn record_payment(
        &self,
        payment: &Payment,
        event: &EventDraft,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let payment = payment.clone();
        let event = event.clone();

        conn.transaction(|conn| {
            Box::pin(async move {
                let paid_amount = payment.paid_amount.to_string();
                let paid_at = payment.paid_at.to_rfc3339();
                let record = NewPayment {
                    id: &payment.id,
                    tenant_id: &payment.tenant_id,
                    invoice_id: &payment.invoice_id,
                    paid_amount: &paid_amount,
                    paid_currency: &payment.paid_currency,
                    paid_at: &paid_at,
                    method: &payment.method,
                    reference: &payment.reference,
                    recorded_by: payment.recorded_by.as_deref(),
                };

                diesel::insert_into(payments::table)
                    .values(&record)
                    .execute(conn)
                    .await?;

                update_status(conn, &payment.invoice_id, InvoiceStatus::Paid).await?;
                audit::append(conn, &event).await?;
                Ok(())
            })
        })
        .await
    }

    /// All decisions recorded for an invoice, oldest first.
    pub async fn list_approvals(&self, invoice_id: &str) -> Result<Vec<Approval>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<ApprovalRecord> = approvals::table
            .filter(approvals::invoice_id.eq(invoice_id))
            .order(approvals::decided_at.asc())
            .load(&mut conn)
            .await?;

        records.into_iter().map(record_to_approval).collect()
    }
}
