//! Data models for the invoice back-office.

mod approval;
mod audit;
mod exception;
mod ingestion;
mod invoice;
mod payment;
mod tenant;

pub use approval::{Approval, Decision};
pub use audit::{AuditEvent, EventDraft};
pub use exception::{ExceptionCode, ExceptionStatus, InvoiceException, Severity};
pub use ingestion::{derive_run_status, IngestionRun, RunStatus};
pub use invoice::{parse_amount, Invoice, InvoicePatch, InvoiceSource, InvoiceStatus};
pub use payment::Payment;
pub use tenant::Tenant;
