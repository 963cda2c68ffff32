//! Invoice model and lifecycle statuses.
//!
//! An invoice moves through a linear lifecycle. Terminal statuses are only
//! written by the approval processor and payment recording; every other
//! transition is driven by extraction and validation.

use std::path::PathBuf;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum digits after the decimal point for monetary amounts.
pub const AMOUNT_SCALE: i64 = 4;

/// Maximum total digits for monetary amounts.
pub const AMOUNT_PRECISION: u64 = 18;

/// Lifecycle status of an invoice.
///
/// Progression:
///     NEW → EXTRACTED → VALIDATED | APPROVAL_PENDING → APPROVED | REJECTED → PAID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    New,
    Extracted,
    Validated,
    ApprovalPending,
    Approved,
    Rejected,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Extracted => "EXTRACTED",
            Self::Validated => "VALIDATED",
            Self::ApprovalPending => "APPROVAL_PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "EXTRACTED" => Some(Self::Extracted),
            "VALIDATED" => Some(Self::Validated),
            "APPROVAL_PENDING" => Some(Self::ApprovalPending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "PAID" => Some(Self::Paid),
            _ => None,
        }
    }

    /// No further automatic transition leaves these statuses.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Paid)
    }

    /// Statuses from which a human decision may be recorded.
    pub fn is_decidable(&self) -> bool {
        matches!(self, Self::Validated | Self::ApprovalPending)
    }
}

/// Channel through which an invoice entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceSource {
    Upload,
    Email,
}

impl InvoiceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "UPLOAD",
            Self::Email => "EMAIL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPLOAD" => Some(Self::Upload),
            "EMAIL" => Some(Self::Email),
            _ => None,
        }
    }
}

/// An invoice moving through the processing pipeline.
///
/// The file binary lives on disk; only `file_path` is recorded here.
/// `source_message_id` correlates an email-ingested invoice back to the
/// originating mailbox message. It is stored but not enforced unique, so a
/// message redelivered after a crash can create a second invoice; the
/// duplicate-invoice rule surfaces that for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub tenant_id: String,
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub status: InvoiceStatus,
    /// Raw payload of the last extraction, kept for re-processing.
    pub extracted: Option<serde_json::Value>,
    pub file_path: Option<PathBuf>,
    pub original_filename: Option<String>,
    pub source: InvoiceSource,
    pub source_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a NEW invoice for an uploaded file.
    pub fn from_upload(
        tenant_id: String,
        file_path: PathBuf,
        original_filename: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            vendor: None,
            invoice_number: None,
            invoice_date: None,
            due_date: None,
            amount: None,
            currency: None,
            status: InvoiceStatus::New,
            extracted: None,
            file_path: Some(file_path),
            original_filename: Some(original_filename),
            source: InvoiceSource::Upload,
            source_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a NEW invoice for an email attachment.
    pub fn from_email(
        tenant_id: String,
        file_path: PathBuf,
        original_filename: String,
        source_message_id: String,
    ) -> Self {
        let mut invoice = Self::from_upload(tenant_id, file_path, original_filename);
        invoice.source = InvoiceSource::Email;
        invoice.source_message_id = Some(source_message_id);
        invoice
    }
}

/// Partial update of extracted invoice fields.
///
/// Every field is optional; `apply` writes only the fields that are present,
/// so a partial re-extraction never clobbers previously captured values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoicePatch {
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
}

impl InvoicePatch {
    pub fn is_empty(&self) -> bool {
        self.vendor.is_none()
            && self.invoice_number.is_none()
            && self.invoice_date.is_none()
            && self.due_date.is_none()
            && self.amount.is_none()
            && self.currency.is_none()
    }

    /// Merge this patch into `invoice` and return the applied-field map
    /// that gets persisted as the invoice's `extracted` payload.
    pub fn apply(&self, invoice: &mut Invoice) -> serde_json::Value {
        let mut applied = serde_json::Map::new();

        if let Some(vendor) = &self.vendor {
            invoice.vendor = Some(vendor.clone());
            applied.insert("vendor".into(), vendor.clone().into());
        }
        if let Some(number) = &self.invoice_number {
            invoice.invoice_number = Some(number.clone());
            applied.insert("invoice_number".into(), number.clone().into());
        }
        if let Some(date) = self.invoice_date {
            invoice.invoice_date = Some(date);
            applied.insert("invoice_date".into(), date.to_string().into());
        }
        if let Some(date) = self.due_date {
            invoice.due_date = Some(date);
            applied.insert("due_date".into(), date.to_string().into());
        }
        if let Some(amount) = &self.amount {
            invoice.amount = Some(amount.clone());
            applied.insert("amount".into(), amount.to_string().into());
        }
        if let Some(currency) = &self.currency {
            invoice.currency = Some(currency.clone());
            applied.insert("currency".into(), currency.clone().into());
        }

        serde_json::Value::Object(applied)
    }
}

/// Error parsing a monetary amount.
#[derive(Debug, Error)]
pub enum AmountError {
    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("amount exceeds {AMOUNT_PRECISION} digits or scale {AMOUNT_SCALE}")]
    OutOfBounds,
}

/// Parse a monetary amount with bounded precision.
pub fn parse_amount(s: &str) -> Result<BigDecimal, AmountError> {
    let amount =
        BigDecimal::from_str(s.trim()).map_err(|_| AmountError::NotANumber(s.to_string()))?;
    let (_, scale) = amount.as_bigint_and_exponent();
    if scale > AMOUNT_SCALE || amount.digits() > AMOUNT_PRECISION {
        return Err(AmountError::OutOfBounds);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            InvoiceStatus::New,
            InvoiceStatus::Extracted,
            InvoiceStatus::Validated,
            InvoiceStatus::ApprovalPending,
            InvoiceStatus::Approved,
            InvoiceStatus::Rejected,
            InvoiceStatus::Paid,
        ] {
            assert_eq!(InvoiceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InvoiceStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(InvoiceStatus::Approved.is_terminal());
        assert!(InvoiceStatus::Rejected.is_terminal());
        assert!(InvoiceStatus::Paid.is_terminal());
        assert!(!InvoiceStatus::ApprovalPending.is_terminal());
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut invoice = Invoice::from_upload(
            "t1".into(),
            PathBuf::from("/tmp/inv.pdf"),
            "inv.pdf".into(),
        );
        invoice.vendor = Some("Acme".into());

        let patch = InvoicePatch {
            invoice_number: Some("INV-1".into()),
            ..Default::default()
        };
        let applied = patch.apply(&mut invoice);

        assert_eq!(invoice.vendor.as_deref(), Some("Acme"));
        assert_eq!(invoice.invoice_number.as_deref(), Some("INV-1"));
        assert_eq!(applied["invoice_number"], "INV-1");
        assert!(applied.get("vendor").is_none());
    }

    #[test]
    fn test_parse_amount_bounds() {
        assert!(parse_amount("199.99").is_ok());
        assert!(parse_amount("-5").is_ok());
        assert!(parse_amount("1.23456").is_err());
        assert!(parse_amount("nope").is_err());
    }
}
