//! Invoice exception persistence.
//!
//! Exception rows are written by the validation transaction and only ever
//! touched again to record resolution.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::records::{ExceptionRecord, NewException};
use super::util::to_diesel_error;
use super::{audit, parse_datetime, parse_datetime_opt};
use crate::models::{
    EventDraft, ExceptionCode, ExceptionStatus, InvoiceException, Severity,
};
use crate::schema::invoice_exceptions;

/// Insert one exception row on the given connection.
///
/// Called from inside the validation/ingestion transactions.
pub async fn insert(
    conn: &mut AsyncSqliteConnection,
    exception: &InvoiceException,
) -> Result<(), DieselError> {
    let created_at = exception.created_at.to_rfc3339();
    let resolved_at = exception.resolved_at.map(|ts| ts.to_rfc3339());

    let record = NewException {
        id: &exception.id,
        tenant_id: &exception.tenant_id,
        invoice_id: &exception.invoice_id,
        code: exception.code.as_str(),
        message: &exception.message,
        severity: exception.severity.as_str(),
        status: exception.status.as_str(),
        created_at: &created_at,
        resolved_at: resolved_at.as_deref(),
        resolved_by: exception.resolved_by.as_deref(),
    };

    diesel::insert_into(invoice_exceptions::table)
        .values(&record)
        .execute(conn)
        .await?;

    Ok(())
}

pub(crate) fn record_to_exception(
    record: ExceptionRecord,
) -> Result<InvoiceException, DieselError> {
    let code = ExceptionCode::parse(&record.code)
        .ok_or_else(|| to_diesel_error(format!("unknown exception code '{}'", record.code)))?;
    let severity = Severity::parse(&record.severity)
        .ok_or_else(|| to_diesel_error(format!("unknown severity '{}'", record.severity)))?;
    let status = ExceptionStatus::parse(&record.status)
        .ok_or_else(|| to_diesel_error(format!("unknown exception status '{}'", record.status)))?;

    Ok(InvoiceException {
        code,
        severity,
        status,
        created_at: parse_datetime(&record.created_at),
        resolved_at: parse_datetime_opt(record.resolved_at),
        id: record.id,
        tenant_id: record.tenant_id,
        invoice_id: record.invoice_id,
        message: record.message,
        resolved_by: record.resolved_by,
    })
}

#[derive(Clone)]
pub struct ExceptionRepository {
    pool: AsyncSqlitePool,
}

impl ExceptionRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// All exceptions for an invoice, oldest first.
    pub async fn list_for_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Vec<InvoiceException>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<ExceptionRecord> = invoice_exceptions::table
            .filter(invoice_exceptions::invoice_id.eq(invoice_id))
            .order(invoice_exceptions::created_at.asc())
            .load(&mut conn)
            .await?;

        records.into_iter().map(record_to_exception).collect()
    }

    /// Mark an open exception resolved.
    ///
    /// Idempotent: resolving an already-resolved exception returns it
    /// unchanged. Returns None when the exception does not exist.
    pub async fn resolve(
        &self,
        exception_id: &str,
        resolved_by: &str,
    ) -> Result<Option<InvoiceException>, DieselError> {
        let mut conn = self.pool.get().await?;
        let exception_id = exception_id.to_string();
        let resolved_by = resolved_by.to_string();

        conn.transaction(|conn| {
            Box::pin(async move {
                let record: Option<ExceptionRecord> = invoice_exceptions::table
                    .find(&exception_id)
                    .first(conn)
                    .await
                    .optional()?;

                let Some(record) = record else {
                    return Ok(None);
                };

                let existing = record_to_exception(record)?;
                if existing.status == ExceptionStatus::Resolved {
                    return Ok(Some(existing));
                }

                let now = Utc::now();
                let now_str = now.to_rfc3339();
                diesel::update(invoice_exceptions::table.find(&exception_id))
                    .set((
                        invoice_exceptions::status.eq(ExceptionStatus::Resolved.as_str()),
                        invoice_exceptions::resolved_at.eq(&now_str),
                        invoice_exceptions::resolved_by.eq(&resolved_by),
                    ))
                    .execute(conn)
                    .await?;

                audit::append(
                    conn,
                    &EventDraft::new("EXCEPTION_RESOLVED", "invoice_exception", &existing.id)
                        .tenant(&existing.tenant_id)
                        .actor(&resolved_by)
                        .notes(format!("code {}", existing.code.as_str())),
                )
                .await?;

                Ok(Some(InvoiceException {
                    status: ExceptionStatus::Resolved,
                    resolved_at: Some(now),
                    resolved_by: Some(resolved_by),
                    ..existing
                }))
            })
        })
        .await
    }
}
