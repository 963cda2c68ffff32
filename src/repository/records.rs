//! Diesel ORM models for database tables.
//!
//! These models provide compile-time type checking for database operations.
//! Domain conversions live with the repositories that load them.

use diesel::prelude::*;

use crate::schema;

/// Tenant record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::tenants)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub inbound_alias: String,
    pub allowed_currencies: String,
    pub created_at: String,
}

/// New tenant for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::tenants)]
pub struct NewTenant<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub inbound_alias: &'a str,
    pub allowed_currencies: &'a str,
    pub created_at: &'a str,
}

/// Invoice record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::invoices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InvoiceRecord {
    pub id: String,
    pub tenant_id: String,
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub status: String,
    pub extracted: Option<String>,
    pub file_path: Option<String>,
    pub original_filename: Option<String>,
    pub source: String,
    pub source_message_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New invoice for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::invoices)]
pub struct NewInvoice<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub vendor: Option<&'a str>,
    pub invoice_number: Option<&'a str>,
    pub invoice_date: Option<&'a str>,
    pub due_date: Option<&'a str>,
    pub amount: Option<&'a str>,
    pub currency: Option<&'a str>,
    pub status: &'a str,
    pub extracted: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub original_filename: Option<&'a str>,
    pub source: &'a str,
    pub source_message_id: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Invoice exception record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::invoice_exceptions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExceptionRecord {
    pub id: String,
    pub tenant_id: String,
    pub invoice_id: String,
    pub code: String,
    pub message: String,
    pub severity: String,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
}

/// New invoice exception for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::invoice_exceptions)]
pub struct NewException<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub invoice_id: &'a str,
    pub code: &'a str,
    pub message: &'a str,
    pub severity: &'a str,
    pub status: &'a str,
    pub created_at: &'a str,
    pub resolved_at: Option<&'a str>,
    pub resolved_by: Option<&'a str>,
}

/// Approval record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::approvals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ApprovalRecord {
    pub id: String,
    pub tenant_id: String,
    pub invoice_id: String,
    pub decision: String,
    pub decided_by: String,
    pub decided_at: String,
    pub notes: Option<String>,
}

/// New approval for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::approvals)]
pub struct NewApproval<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub invoice_id: &'a str,
    pub decision: &'a str,
    pub decided_by: &'a str,
    pub decided_at: &'a str,
    pub notes: Option<&'a str>,
}

/// Payment record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::payments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PaymentRecord {
    pub id: String,
    pub tenant_id: String,
    pub invoice_id: String,
    pub paid_amount: String,
    pub paid_currency: String,
    pub paid_at: String,
    pub method: String,
    pub reference: String,
    pub recorded_by: Option<String>,
}

/// New payment for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::payments)]
pub struct NewPayment<'a> {
    pub id: &'a str,
    pub tenant_id: &'a str,
    pub invoice_id: &'a str,
    pub paid_amount: &'a str,
    pub paid_currency: &'a str,
    pub paid_at: &'a str,
    pub method: &'a str,
    pub reference: &'a str,
    pub recorded_by: Option<&'a str>,
}

/// Audit event record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::audit_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuditEventRecord {
    pub id: String,
    pub tenant_id: Option<String>,
    pub timestamp: String,
    pub request_id: Option<String>,
    pub actor: String,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub notes: Option<String>,
    pub metadata: Option<String>,
}

/// New audit event for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::audit_events)]
pub struct NewAuditEvent<'a> {
    pub id: &'a str,
    pub tenant_id: Option<&'a str>,
    pub timestamp: &'a str,
    pub request_id: Option<&'a str>,
    pub actor: &'a str,
    pub event_type: &'a str,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub source: Option<&'a str>,
    pub confidence: Option<f64>,
    pub notes: Option<&'a str>,
    pub metadata: Option<&'a str>,
}

/// Ingestion run record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::ingestion_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IngestionRunRecord {
    pub id: String,
    pub tenant_id: Option<String>,
    pub provider: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub emails_seen: i32,
    pub emails_processed: i32,
    pub invoices_created: i32,
    pub failures_count: i32,
    pub retries_count: i32,
    pub status: String,
    pub last_error: Option<String>,
}

/// New ingestion run for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::ingestion_runs)]
pub struct NewIngestionRun<'a> {
    pub id: &'a str,
    pub tenant_id: Option<&'a str>,
    pub provider: &'a str,
    pub started_at: &'a str,
    pub finished_at: Option<&'a str>,
    pub emails_seen: i32,
    pub emails_processed: i32,
    pub invoices_created: i32,
    pub failures_count: i32,
    pub retries_count: i32,
    pub status: &'a str,
    pub last_error: Option<&'a str>,
}
