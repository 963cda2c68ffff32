//! End-to-end lifecycle tests against a temporary SQLite database.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tempfile::TempDir;

use invoicebox::models::{
    Decision, ExceptionCode, Invoice, InvoicePatch, InvoiceStatus, Tenant,
};
use invoicebox::repository::{
    migrations, AsyncSqlitePool, AuditRepository, ExceptionRepository, InvoiceRepository,
    TenantRepository,
};
use invoicebox::services::{
    ApprovalError, ApprovalService, ExtractionService, PaymentError, PaymentService, RuleProfile,
    UploadService, ValidationConfig, ValidationService,
};
use invoicebox::storage::FileStore;

struct TestEnv {
    _dir: TempDir,
    pool: AsyncSqlitePool,
    tenant: Tenant,
}

impl TestEnv {
    fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    fn uploads(&self) -> UploadService {
        UploadService::new(
            self.invoices(),
            TenantRepository::new(self.pool.clone()),
            FileStore::new(self._dir.path().join("uploads")),
        )
    }

    fn validation(&self) -> ValidationService {
        ValidationService::new(
            self.invoices(),
            TenantRepository::new(self.pool.clone()),
            ValidationConfig {
                default_currencies: vec!["AED".into(), "USD".into(), "EUR".into(), "GBP".into()],
                profile: RuleProfile::PerField,
            },
        )
    }

    async fn upload_invoice(&self) -> Invoice {
        self.uploads()
            .upload(&self.tenant.id, b"%PDF-1.4 test", "inv.pdf", "tester", None)
            .await
            .unwrap()
    }

    /// Upload plus a complete extraction, leaving the invoice EXTRACTED.
    async fn extracted_invoice(&self, vendor: &str, number: &str) -> Invoice {
        let invoice = self.upload_invoice().await;
        let patch = InvoicePatch {
            vendor: Some(vendor.into()),
            invoice_number: Some(number.into()),
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 5),
            due_date: None,
            amount: Some(BigDecimal::from_str("199.99").unwrap()),
            currency: Some("USD".into()),
        };
        ExtractionService::new(self.invoices())
            .extract(&invoice.id, &patch, "tester", "manual", None, None)
            .await
            .unwrap()
    }
}

async fn setup() -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let database_url = dir.path().join("test.db").display().to_string();
    migrations::run_migrations(&database_url).await.unwrap();

    let pool = AsyncSqlitePool::new(&database_url);
    let tenant = Tenant::new("Acme Corp", "acme");
    TenantRepository::new(pool.clone())
        .insert(&tenant)
        .await
        .unwrap();

    TestEnv {
        _dir: dir,
        pool,
        tenant,
    }
}

#[tokio::test]
async fn full_lifecycle_upload_to_paid() {
    let env = setup().await;

    let invoice = env.upload_invoice().await;
    assert_eq!(invoice.status, InvoiceStatus::New);

    let invoice = env.extracted_invoice("Acme", "INV-1").await;
    assert_eq!(invoice.status, InvoiceStatus::Extracted);
    assert_eq!(invoice.vendor.as_deref(), Some("Acme"));

    let outcome = env
        .validation()
        .validate_invoice(&invoice.id, "tester", None)
        .await
        .unwrap();
    assert_eq!(outcome.status, InvoiceStatus::Validated);
    assert!(outcome.exceptions.is_empty());

    let approval = ApprovalService::new(env.invoices())
        .decide(&invoice.id, Decision::Approve, "alice", None, None)
        .await
        .unwrap();
    assert_eq!(approval.decision, Decision::Approve);

    let payment = PaymentService::new(env.invoices())
        .record(
            &invoice.id,
            BigDecimal::from_str("199.99").unwrap(),
            "USD".into(),
            "wire".into(),
            "PAY-7".into(),
            Some("alice".into()),
        )
        .await
        .unwrap();
    assert_eq!(payment.invoice_id, invoice.id);

    let stored = env.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Paid);
    assert!(stored.updated_at >= stored.created_at);

    // Every mutation left an audit event on the invoice.
    let events = AuditRepository::new(env.pool.clone())
        .list_for_entity(&invoice.id)
        .await
        .unwrap();
    let event_types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    for expected in [
        "INVOICE_UPLOADED",
        "INVOICE_EXTRACTED",
        "INVOICE_VALIDATED",
        "INVOICE_APPROVED",
        "PAYMENT_RECORDED",
    ] {
        assert!(
            event_types.contains(&expected),
            "missing audit event {expected}, got {event_types:?}"
        );
    }
}

#[tokio::test]
async fn validation_persists_exceptions_and_blocks() {
    let env = setup().await;
    let invoice = env.upload_invoice().await;

    // No fields extracted: every required-field rule fires.
    let outcome = env
        .validation()
        .validate_invoice(&invoice.id, "tester", None)
        .await
        .unwrap();
    assert_eq!(outcome.status, InvoiceStatus::ApprovalPending);
    assert_eq!(outcome.exceptions.len(), 4);

    let stored = ExceptionRepository::new(env.pool.clone())
        .list_for_invoice(&invoice.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 4);
    assert!(stored.iter().all(|e| e.is_open()));

    let invoice = env.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::ApprovalPending);
}

#[tokio::test]
async fn approval_rejected_for_ineligible_status() {
    let env = setup().await;
    let invoice = env.upload_invoice().await;
    assert_eq!(invoice.status, InvoiceStatus::New);

    let err = ApprovalService::new(env.invoices())
        .decide(&invoice.id, Decision::Approve, "alice", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::IneligibleStatus { .. }));

    // The invoice was left untouched.
    let stored = env.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::New);
    assert!(env
        .invoices()
        .list_approvals(&invoice.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn rejection_is_terminal_and_audited() {
    let env = setup().await;
    let invoice = env.extracted_invoice("Acme", "INV-2").await;

    env.validation()
        .validate_invoice(&invoice.id, "tester", None)
        .await
        .unwrap();

    ApprovalService::new(env.invoices())
        .decide(
            &invoice.id,
            Decision::Reject,
            "bob",
            Some("price mismatch".into()),
            None,
        )
        .await
        .unwrap();

    let stored = env.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Rejected);

    let events = AuditRepository::new(env.pool.clone())
        .list_for_entity(&invoice.id)
        .await
        .unwrap();
    assert!(events.iter().any(|e| e.event_type == "INVOICE_REJECTED"));
}

#[tokio::test]
async fn duplicate_detection_flags_second_invoice_only() {
    let env = setup().await;

    let first = env.extracted_invoice("Acme", "INV-1").await;
    let outcome = env
        .validation()
        .validate_invoice(&first.id, "tester", None)
        .await
        .unwrap();
    assert_eq!(outcome.status, InvoiceStatus::Validated);

    // Re-validating the same invoice never flags it as its own duplicate.
    let outcome = env
        .validation()
        .validate_invoice(&first.id, "tester", None)
        .await
        .unwrap();
    assert!(outcome
        .exceptions
        .iter()
        .all(|e| e.code != ExceptionCode::DuplicateInvoice));

    let second = env.extracted_invoice("Acme", "INV-1").await;
    let outcome = env
        .validation()
        .validate_invoice(&second.id, "tester", None)
        .await
        .unwrap();
    assert_eq!(outcome.status, InvoiceStatus::ApprovalPending);
    let duplicate: Vec<_> = outcome
        .exceptions
        .iter()
        .filter(|e| e.code == ExceptionCode::DuplicateInvoice)
        .collect();
    assert_eq!(duplicate.len(), 1);
    assert!(duplicate[0].message.contains(&first.id));
}

#[tokio::test]
async fn exception_resolution_is_recorded() {
    let env = setup().await;
    let invoice = env.upload_invoice().await;

    let outcome = env
        .validation()
        .validate_invoice(&invoice.id, "tester", None)
        .await
        .unwrap();
    let target = &outcome.exceptions[0];

    let repo = ExceptionRepository::new(env.pool.clone());
    let resolved = repo.resolve(&target.id, "carol").await.unwrap().unwrap();
    assert!(!resolved.is_open());
    assert_eq!(resolved.resolved_by.as_deref(), Some("carol"));

    // Resolving again is a no-op.
    let again = repo.resolve(&target.id, "dave").await.unwrap().unwrap();
    assert_eq!(again.resolved_by.as_deref(), Some("carol"));

    let events = AuditRepository::new(env.pool.clone())
        .list_for_entity(&target.id)
        .await
        .unwrap();
    assert!(events.iter().any(|e| e.event_type == "EXCEPTION_RESOLVED"));
}

#[tokio::test]
async fn payment_requires_approved_status() {
    let env = setup().await;
    let invoice = env.upload_invoice().await;

    let err = PaymentService::new(env.invoices())
        .record(
            &invoice.id,
            BigDecimal::from_str("10").unwrap(),
            "USD".into(),
            String::new(),
            String::new(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::IneligibleStatus { .. }));

    let stored = env.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::New);
}
