//! Validation exceptions.
//!
//! An exception here is recorded domain data, not an error signal: one row
//! per rule violation, owned by its invoice and immutable once created
//! except for the resolution fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exception vocabulary across both rule profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionCode {
    MissingField,
    MissingVendor,
    MissingNumber,
    MissingDate,
    MissingAmount,
    MissingFile,
    InvalidAmount,
    InvalidCurrency,
    DuplicateInvoice,
}

impl ExceptionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "MISSING_FIELD",
            Self::MissingVendor => "MISSING_VENDOR",
            Self::MissingNumber => "MISSING_NUMBER",
            Self::MissingDate => "MISSING_DATE",
            Self::MissingAmount => "MISSING_AMOUNT",
            Self::MissingFile => "MISSING_FILE",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InvalidCurrency => "INVALID_CURRENCY",
            Self::DuplicateInvoice => "DUPLICATE_INVOICE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MISSING_FIELD" => Some(Self::MissingField),
            "MISSING_VENDOR" => Some(Self::MissingVendor),
            "MISSING_NUMBER" => Some(Self::MissingNumber),
            "MISSING_DATE" => Some(Self::MissingDate),
            "MISSING_AMOUNT" => Some(Self::MissingAmount),
            "MISSING_FILE" => Some(Self::MissingFile),
            "INVALID_AMOUNT" => Some(Self::InvalidAmount),
            "INVALID_CURRENCY" => Some(Self::InvalidCurrency),
            "DUPLICATE_INVOICE" => Some(Self::DuplicateInvoice),
            _ => None,
        }
    }
}

/// How serious a violation is. WARNING-level exceptions never block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ERROR" => Some(Self::Error),
            "WARNING" => Some(Self::Warning),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionStatus {
    Open,
    Resolved,
}

impl ExceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Resolved => "RESOLVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "RESOLVED" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// A recorded validation-rule violation on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceException {
    pub id: String,
    pub tenant_id: String,
    pub invoice_id: String,
    pub code: ExceptionCode,
    pub message: String,
    pub severity: Severity,
    pub status: ExceptionStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl InvoiceException {
    pub fn is_open(&self) -> bool {
        self.status == ExceptionStatus::Open
    }
}
