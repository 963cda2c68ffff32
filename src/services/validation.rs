//! Validation rule engine and status derivation.
//!
//! Rules are small, independent, side-effect-free functions run in a fixed
//! order; their results are concatenated, never deduplicated, so running
//! the engine twice over the same invoice always yields the same exception
//! set.
//!
//! Adding a new rule:
//!   1. Write a `check_<name>(&Invoice, &RuleContext) -> Vec<ExceptionDraft>`
//!      function.
//!   2. Register it in `RULES`.
//!   3. If it should force human review, add its code to `BLOCKING_CODES`.
//! Nothing else changes.

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::{
    EventDraft, ExceptionCode, ExceptionStatus, Invoice, InvoiceException, InvoiceStatus,
    Severity, Tenant,
};
use crate::repository::{DieselError, InvoiceRepository, TenantRepository};

/// Which exception vocabulary the rule set emits.
///
/// `Consolidated` flags every absent required field as MISSING_FIELD and
/// matches currencies case-insensitively; `PerField` uses one code per
/// field, matches currencies exactly, and additionally warns on a missing
/// file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleProfile {
    Consolidated,
    #[default]
    PerField,
}

/// A rule violation before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDraft {
    pub code: ExceptionCode,
    pub message: String,
    pub severity: Severity,
}

impl ExceptionDraft {
    fn error(code: ExceptionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(code: ExceptionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Everything the rules inspect besides the invoice itself.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub allowed_currencies: Vec<String>,
    pub profile: RuleProfile,
    /// Point-in-time duplicate probe result, looked up before the engine
    /// runs so the rules themselves stay synchronous and pure.
    pub duplicate_of: Option<String>,
}

/// Exception codes that force human review before approval.
pub const BLOCKING_CODES: &[ExceptionCode] = &[
    ExceptionCode::MissingField,
    ExceptionCode::MissingVendor,
    ExceptionCode::MissingNumber,
    ExceptionCode::MissingDate,
    ExceptionCode::MissingAmount,
    ExceptionCode::DuplicateInvoice,
    ExceptionCode::InvalidAmount,
    ExceptionCode::InvalidCurrency,
];

pub fn is_blocking(code: ExceptionCode) -> bool {
    BLOCKING_CODES.contains(&code)
}

type Rule = fn(&Invoice, &RuleContext) -> Vec<ExceptionDraft>;

/// Fixed evaluation order.
const RULES: &[Rule] = &[
    check_required_fields,
    check_amount,
    check_currency,
    check_duplicate,
    check_file,
];

/// Run every rule against `invoice` and concatenate the violations.
pub fn validate(invoice: &Invoice, ctx: &RuleContext) -> Vec<ExceptionDraft> {
    RULES.iter().flat_map(|rule| rule(invoice, ctx)).collect()
}

/// Map a validation outcome to the invoice's next lifecycle status.
///
/// Total over every exception list: VALIDATED exactly when no draft
/// carries a blocking code, APPROVAL_PENDING otherwise.
pub fn derive_status(drafts: &[ExceptionDraft]) -> InvoiceStatus {
    if drafts.iter().any(|d| is_blocking(d.code)) {
        InvoiceStatus::ApprovalPending
    } else {
        InvoiceStatus::Validated
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn check_required_fields(invoice: &Invoice, ctx: &RuleContext) -> Vec<ExceptionDraft> {
    let mut drafts = Vec::new();

    match ctx.profile {
        RuleProfile::Consolidated => {
            let mut missing: Vec<&str> = Vec::new();
            if blank(&invoice.vendor) {
                missing.push("vendor");
            }
            if blank(&invoice.invoice_number) {
                missing.push("invoice_number");
            }
            if invoice.invoice_date.is_none() {
                missing.push("invoice_date");
            }
            if invoice.amount.is_none() {
                missing.push("amount");
            }
            if blank(&invoice.currency) {
                missing.push("currency");
            }
            for field in missing {
                drafts.push(ExceptionDraft::error(
                    ExceptionCode::MissingField,
                    format!("Required field '{field}' is missing or blank."),
                ));
            }
        }
        RuleProfile::PerField => {
            if blank(&invoice.vendor) {
                drafts.push(ExceptionDraft::error(
                    ExceptionCode::MissingVendor,
                    "Vendor name is required",
                ));
            }
            if blank(&invoice.invoice_number) {
                drafts.push(ExceptionDraft::error(
                    ExceptionCode::MissingNumber,
                    "Invoice number is required",
                ));
            }
            if invoice.invoice_date.is_none() {
                drafts.push(ExceptionDraft::error(
                    ExceptionCode::MissingDate,
                    "Invoice date is required",
                ));
            }
            if invoice.amount.is_none() {
                drafts.push(ExceptionDraft::error(
                    ExceptionCode::MissingAmount,
                    "Invoice amount is required",
                ));
            }
        }
    }

    drafts
}

fn check_amount(invoice: &Invoice, _ctx: &RuleContext) -> Vec<ExceptionDraft> {
    match &invoice.amount {
        Some(amount) if *amount <= BigDecimal::zero() => vec![ExceptionDraft::error(
            ExceptionCode::InvalidAmount,
            format!("Amount must be > 0; received {amount}."),
        )],
        _ => Vec::new(),
    }
}

fn check_currency(invoice: &Invoice, ctx: &RuleContext) -> Vec<ExceptionDraft> {
    let Some(currency) = invoice.currency.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Vec::new();
    };

    let permitted = match ctx.profile {
        RuleProfile::Consolidated => ctx
            .allowed_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(currency)),
        RuleProfile::PerField => ctx.allowed_currencies.iter().any(|c| c == currency),
    };

    if permitted {
        Vec::new()
    } else {
        vec![ExceptionDraft::error(
            ExceptionCode::InvalidCurrency,
            format!(
                "Currency '{}' is not permitted. Allowed: {}.",
                currency,
                ctx.allowed_currencies.join(", ")
            ),
        )]
    }
}

fn check_duplicate(invoice: &Invoice, ctx: &RuleContext) -> Vec<ExceptionDraft> {
    if blank(&invoice.vendor) || blank(&invoice.invoice_number) {
        return Vec::new();
    }
    match &ctx.duplicate_of {
        Some(duplicate_id) => vec![ExceptionDraft::error(
            ExceptionCode::DuplicateInvoice,
            format!(
                "Invoice number '{}' for vendor '{}' already exists (id={duplicate_id}).",
                invoice.invoice_number.as_deref().unwrap_or_default(),
                invoice.vendor.as_deref().unwrap_or_default(),
            ),
        )],
        None => Vec::new(),
    }
}

fn check_file(invoice: &Invoice, ctx: &RuleContext) -> Vec<ExceptionDraft> {
    if ctx.profile != RuleProfile::PerField {
        return Vec::new();
    }
    if invoice.file_path.is_none() {
        vec![ExceptionDraft::warning(
            ExceptionCode::MissingFile,
            "No file attached to invoice",
        )]
    } else {
        Vec::new()
    }
}

/// Build the rule context for an invoice: the tenant's currency allow-list
/// (falling back to the process-wide default) plus the duplicate probe.
pub async fn build_context(
    invoices: &InvoiceRepository,
    invoice: &Invoice,
    tenant: Option<&Tenant>,
    default_currencies: &[String],
    profile: RuleProfile,
) -> Result<RuleContext, DieselError> {
    let allowed_currencies = tenant
        .and_then(|t| t.allowed_currency_list())
        .unwrap_or_else(|| default_currencies.to_vec());

    let duplicate_of = match (invoice.vendor.as_deref(), invoice.invoice_number.as_deref()) {
        (Some(vendor), Some(number)) if !vendor.trim().is_empty() && !number.trim().is_empty() => {
            invoices
                .find_duplicate(&invoice.tenant_id, vendor, number, &invoice.id)
                .await?
        }
        _ => None,
    };

    Ok(RuleContext {
        allowed_currencies,
        profile,
        duplicate_of,
    })
}

/// Materialize drafts into exception rows for an invoice.
pub fn drafts_to_exceptions(invoice: &Invoice, drafts: &[ExceptionDraft]) -> Vec<InvoiceException> {
    let now = Utc::now();
    drafts
        .iter()
        .map(|draft| InvoiceException {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: invoice.tenant_id.clone(),
            invoice_id: invoice.id.clone(),
            code: draft.code,
            message: draft.message.clone(),
            severity: draft.severity,
            status: ExceptionStatus::Open,
            created_at: now,
            resolved_at: None,
            resolved_by: None,
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invoice {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] DieselError),
}

/// Outcome of validating one invoice.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub status: InvoiceStatus,
    pub exceptions: Vec<InvoiceException>,
}

/// Rule engine configuration shared by the API-facing validation path and
/// the ingestion worker.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub default_currencies: Vec<String>,
    pub profile: RuleProfile,
}

/// Orchestrates a validation pass: probe, run the engine, then persist the
/// exceptions, the derived status, and the audit event in one transaction.
pub struct ValidationService {
    invoices: InvoiceRepository,
    tenants: TenantRepository,
    config: ValidationConfig,
}

impl ValidationService {
    pub fn new(
        invoices: InvoiceRepository,
        tenants: TenantRepository,
        config: ValidationConfig,
    ) -> Self {
        Self {
            invoices,
            tenants,
            config,
        }
    }

    pub async fn validate_invoice(
        &self,
        invoice_id: &str,
        actor: &str,
        request_id: Option<&str>,
    ) -> Result<ValidationOutcome, ValidationError> {
        let invoice = self
            .invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| ValidationError::NotFound(invoice_id.to_string()))?;
        let tenant = self.tenants.get(&invoice.tenant_id).await?;

        let ctx = build_context(
            &self.invoices,
            &invoice,
            tenant.as_ref(),
            &self.config.default_currencies,
            self.config.profile,
        )
        .await?;

        let drafts = validate(&invoice, &ctx);
        let status = derive_status(&drafts);
        let exceptions = drafts_to_exceptions(&invoice, &drafts);

        let mut event = EventDraft::new("INVOICE_VALIDATED", "invoice", &invoice.id)
            .tenant(&invoice.tenant_id)
            .actor(actor)
            .notes(format!(
                "{} exception(s), status {}",
                exceptions.len(),
                status.as_str()
            ));
        if let Some(request_id) = request_id {
            event = event.request_id(request_id);
        }

        self.invoices
            .store_validation(&invoice.id, &exceptions, status, &event)
            .await?;

        info!(
            invoice_id = %invoice.id,
            exceptions = exceptions.len(),
            status = status.as_str(),
            "invoice validated"
        );

        Ok(ValidationOutcome { status, exceptions })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::str::FromStr;

    use super::*;

    fn ctx(profile: RuleProfile) -> RuleContext {
        RuleContext {
            allowed_currencies: vec!["AED".into(), "USD".into(), "EUR".into(), "GBP".into()],
            profile,
            duplicate_of: None,
        }
    }

    fn complete_invoice() -> Invoice {
        let mut invoice = Invoice::from_upload(
            "t1".into(),
            PathBuf::from("/tmp/inv.pdf"),
            "inv.pdf".into(),
        );
        invoice.vendor = Some("Acme".into());
        invoice.invoice_number = Some("INV-1".into());
        invoice.invoice_date = chrono::NaiveDate::from_ymd_opt(2026, 1, 5);
        invoice.amount = Some(BigDecimal::from_str("199.99").unwrap());
        invoice.currency = Some("USD".into());
        invoice
    }

    #[test]
    fn test_clean_invoice_validates() {
        let invoice = complete_invoice();
        let drafts = validate(&invoice, &ctx(RuleProfile::PerField));
        assert!(drafts.is_empty());
        assert_eq!(derive_status(&drafts), InvoiceStatus::Validated);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let mut invoice = complete_invoice();
        invoice.amount = Some(BigDecimal::from(-3));
        invoice.currency = Some("XXX".into());

        let context = ctx(RuleProfile::PerField);
        let first = validate(&invoice, &context);
        let second = validate(&invoice, &context);

        let codes = |drafts: &[ExceptionDraft]| {
            drafts.iter().map(|d| d.code).collect::<Vec<_>>()
        };
        assert_eq!(codes(&first), codes(&second));
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_per_field_missing_codes() {
        let mut invoice = complete_invoice();
        invoice.vendor = Some("   ".into());
        invoice.invoice_number = None;
        invoice.invoice_date = None;
        invoice.amount = None;

        let drafts = validate(&invoice, &ctx(RuleProfile::PerField));
        let codes: Vec<_> = drafts.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                ExceptionCode::MissingVendor,
                ExceptionCode::MissingNumber,
                ExceptionCode::MissingDate,
                ExceptionCode::MissingAmount,
            ]
        );
        assert_eq!(derive_status(&drafts), InvoiceStatus::ApprovalPending);
    }

    #[test]
    fn test_consolidated_missing_codes() {
        let mut invoice = complete_invoice();
        invoice.vendor = None;
        invoice.currency = None;

        let drafts = validate(&invoice, &ctx(RuleProfile::Consolidated));
        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(|d| d.code == ExceptionCode::MissingField));
        assert!(drafts[0].message.contains("vendor"));
        assert!(drafts[1].message.contains("currency"));
    }

    #[test]
    fn test_amount_must_be_positive() {
        let mut invoice = complete_invoice();
        invoice.amount = Some(BigDecimal::zero());

        let drafts = validate(&invoice, &ctx(RuleProfile::PerField));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].code, ExceptionCode::InvalidAmount);
    }

    #[test]
    fn test_currency_case_sensitivity_per_profile() {
        let mut invoice = complete_invoice();
        invoice.currency = Some("usd".into());

        // Consolidated matches case-insensitively.
        assert!(validate(&invoice, &ctx(RuleProfile::Consolidated)).is_empty());

        // PerField requires an exact match.
        let drafts = validate(&invoice, &ctx(RuleProfile::PerField));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].code, ExceptionCode::InvalidCurrency);
    }

    #[test]
    fn test_duplicate_requires_probe_hit_and_identifiers() {
        let mut context = ctx(RuleProfile::PerField);
        context.duplicate_of = Some("other-id".into());

        let invoice = complete_invoice();
        let drafts = validate(&invoice, &context);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].code, ExceptionCode::DuplicateInvoice);
        assert!(drafts[0].message.contains("other-id"));

        // Blank identifiers suppress the duplicate rule even with a probe hit.
        let mut blank_invoice = complete_invoice();
        blank_invoice.vendor = None;
        let drafts = validate(&blank_invoice, &context);
        assert!(drafts.iter().all(|d| d.code != ExceptionCode::DuplicateInvoice));
    }

    #[test]
    fn test_missing_file_warns_but_does_not_block() {
        let mut invoice = complete_invoice();
        invoice.file_path = None;

        let drafts = validate(&invoice, &ctx(RuleProfile::PerField));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].code, ExceptionCode::MissingFile);
        assert_eq!(drafts[0].severity, Severity::Warning);
        assert_eq!(derive_status(&drafts), InvoiceStatus::Validated);

        // No file rule in the consolidated profile.
        assert!(validate(&invoice, &ctx(RuleProfile::Consolidated)).is_empty());
    }

    #[test]
    fn test_blocking_set_covers_every_error_code() {
        for code in [
            ExceptionCode::MissingField,
            ExceptionCode::MissingVendor,
            ExceptionCode::MissingNumber,
            ExceptionCode::MissingDate,
            ExceptionCode::MissingAmount,
            ExceptionCode::DuplicateInvoice,
            ExceptionCode::InvalidAmount,
            ExceptionCode::InvalidCurrency,
        ] {
            assert!(is_blocking(code), "{} should block", code.as_str());
        }
        assert!(!is_blocking(ExceptionCode::MissingFile));
    }

    #[test]
    fn test_derive_status_total_on_empty() {
        assert_eq!(derive_status(&[]), InvoiceStatus::Validated);
    }
}
