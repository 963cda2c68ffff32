//! Command implementations.

use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use tokio::sync::watch;

use super::DecisionArg;
use crate::config::Settings;
use crate::ingest::{run_scheduled, IngestionWorker, MailhogProvider};
use crate::models::{parse_amount, Decision, InvoicePatch, InvoiceStatus, Tenant};
use crate::repository::{
    migrations, AsyncSqlitePool, AuditRepository, ExceptionRepository, IngestionRunRepository,
    InvoiceRepository, TenantRepository,
};
use crate::services::{
    ApprovalService, ExtractionService, PaymentService, UploadService, ValidationService,
};
use crate::storage::FileStore;

fn pool(settings: &Settings) -> AsyncSqlitePool {
    AsyncSqlitePool::new(&settings.database_url)
}

pub async fn init(settings: &Settings) -> anyhow::Result<()> {
    let db_path = Path::new(&settings.database_url);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    migrations::run_migrations(&settings.database_url).await?;
    println!("Database ready at {}", settings.database_url);
    Ok(())
}

pub async fn tenant_add(
    settings: &Settings,
    name: &str,
    alias: &str,
    currencies: Option<String>,
) -> anyhow::Result<()> {
    let repo = TenantRepository::new(pool(settings));
    let mut tenant = Tenant::new(name, alias);
    if let Some(currencies) = currencies {
        tenant.allowed_currencies = currencies;
    }
    repo.insert(&tenant).await?;
    println!("Created tenant {} ({})", tenant.name, tenant.id);
    Ok(())
}

pub async fn tenant_list(settings: &Settings) -> anyhow::Result<()> {
    let repo = TenantRepository::new(pool(settings));
    for tenant in repo.list().await? {
        println!(
            "{}  {}  alias={}  currencies={}",
            tenant.id,
            tenant.name,
            tenant.inbound_alias,
            if tenant.allowed_currencies.is_empty() {
                "(default)"
            } else {
                &tenant.allowed_currencies
            }
        );
    }
    Ok(())
}

pub async fn upload(
    settings: &Settings,
    tenant_id: &str,
    file: &Path,
    actor: &str,
) -> anyhow::Result<()> {
    let pool = pool(settings);
    let service = UploadService::new(
        InvoiceRepository::new(pool.clone()),
        TenantRepository::new(pool),
        FileStore::new(&settings.uploads_dir),
    );

    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown");

    let invoice = service
        .upload(tenant_id, &content, filename, actor, None)
        .await?;
    println!("Created invoice {} ({})", invoice.id, invoice.status.as_str());
    Ok(())
}

/// Field values collected from the command line.
pub struct ExtractArgs {
    pub vendor: Option<String>,
    pub number: Option<String>,
    pub date: Option<NaiveDate>,
    pub due: Option<NaiveDate>,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

pub async fn extract(
    settings: &Settings,
    invoice_id: &str,
    args: ExtractArgs,
    source: &str,
    confidence: Option<f64>,
    actor: &str,
) -> anyhow::Result<()> {
    let patch = InvoicePatch {
        vendor: args.vendor,
        invoice_number: args.number,
        invoice_date: args.date,
        due_date: args.due,
        amount: args.amount.as_deref().map(parse_amount).transpose()?,
        currency: args.currency,
    };

    let service = ExtractionService::new(InvoiceRepository::new(pool(settings)));
    let invoice = service
        .extract(invoice_id, &patch, actor, source, confidence, None)
        .await?;
    println!("Invoice {} -> {}", invoice.id, invoice.status.as_str());
    Ok(())
}

pub async fn validate(settings: &Settings, invoice_id: &str, actor: &str) -> anyhow::Result<()> {
    let pool = pool(settings);
    let service = ValidationService::new(
        InvoiceRepository::new(pool.clone()),
        TenantRepository::new(pool),
        settings.validation_config(),
    );

    let outcome = service.validate_invoice(invoice_id, actor, None).await?;
    println!(
        "Invoice {} -> {} ({} exception(s))",
        invoice_id,
        outcome.status.as_str(),
        outcome.exceptions.len()
    );
    for exc in &outcome.exceptions {
        println!(
            "  [{}] {}  {}  {}",
            exc.severity.as_str(),
            exc.code.as_str(),
            exc.id,
            exc.message
        );
    }
    Ok(())
}

pub async fn decide(
    settings: &Settings,
    invoice_id: &str,
    decision: DecisionArg,
    decided_by: &str,
    notes: Option<String>,
) -> anyhow::Result<()> {
    let decision = match decision {
        DecisionArg::Approve => Decision::Approve,
        DecisionArg::Reject => Decision::Reject,
    };

    let service = ApprovalService::new(InvoiceRepository::new(pool(settings)));
    let approval = service
        .decide(invoice_id, decision, decided_by, notes, None)
        .await?;
    println!(
        "Invoice {} {} by {}",
        approval.invoice_id,
        match decision {
            Decision::Approve => "APPROVED",
            Decision::Reject => "REJECTED",
        },
        approval.decided_by
    );
    Ok(())
}

pub async fn pay(
    settings: &Settings,
    invoice_id: &str,
    amount: &str,
    currency: String,
    method: String,
    reference: String,
    recorded_by: Option<String>,
) -> anyhow::Result<()> {
    let service = PaymentService::new(InvoiceRepository::new(pool(settings)));
    let payment = service
        .record(
            invoice_id,
            parse_amount(amount)?,
            currency,
            method,
            reference,
            recorded_by,
        )
        .await?;
    println!(
        "Recorded payment {} {} on invoice {}",
        payment.paid_amount, payment.paid_currency, payment.invoice_id
    );
    Ok(())
}

pub async fn resolve(settings: &Settings, exception_id: &str, by: &str) -> anyhow::Result<()> {
    let repo = ExceptionRepository::new(pool(settings));
    match repo.resolve(exception_id, by).await? {
        Some(exc) => println!("Exception {} -> {}", exc.id, exc.status.as_str()),
        None => bail!("exception {exception_id} not found"),
    }
    Ok(())
}

pub async fn show(settings: &Settings, invoice_id: &str) -> anyhow::Result<()> {
    let pool = pool(settings);
    let invoices = InvoiceRepository::new(pool.clone());
    let exceptions = ExceptionRepository::new(pool);

    let Some(invoice) = invoices.get(invoice_id).await? else {
        bail!("invoice {invoice_id} not found");
    };

    println!("Invoice {}", invoice.id);
    println!("  tenant:   {}", invoice.tenant_id);
    println!("  status:   {}", invoice.status.as_str());
    println!("  source:   {}", invoice.source.as_str());
    println!("  vendor:   {}", invoice.vendor.as_deref().unwrap_or("-"));
    println!(
        "  number:   {}",
        invoice.invoice_number.as_deref().unwrap_or("-")
    );
    println!(
        "  amount:   {} {}",
        invoice
            .amount
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".into()),
        invoice.currency.as_deref().unwrap_or("")
    );
    if let Some(path) = &invoice.file_path {
        println!("  file:     {}", path.display());
    }

    let exceptions = exceptions.list_for_invoice(&invoice.id).await?;
    if !exceptions.is_empty() {
        println!("  exceptions:");
        for exc in exceptions {
            println!(
                "    [{}] {} {} ({})  {}",
                exc.severity.as_str(),
                exc.code.as_str(),
                exc.id,
                exc.status.as_str(),
                exc.message
            );
        }
    }

    let approvals = invoices.list_approvals(&invoice.id).await?;
    for approval in approvals {
        println!(
            "  decision: {} by {} at {}",
            approval.decision.as_str(),
            approval.decided_by,
            approval.decided_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn list(
    settings: &Settings,
    tenant: Option<&str>,
    status: Option<&str>,
    limit: u32,
) -> anyhow::Result<()> {
    let status = match status {
        Some(s) => Some(
            InvoiceStatus::parse(s).with_context(|| format!("unknown invoice status '{s}'"))?,
        ),
        None => None,
    };

    let repo = InvoiceRepository::new(pool(settings));
    for invoice in repo.list(tenant, status, limit).await? {
        println!(
            "{}  {:16}  {}  {}",
            invoice.id,
            invoice.status.as_str(),
            invoice.vendor.as_deref().unwrap_or("-"),
            invoice.original_filename.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn ingest(settings: &Settings, watch_mode: bool) -> anyhow::Result<()> {
    let provider = MailhogProvider::new(&settings.mailbox.api_url, settings.fetch_timeout())?;
    let worker = IngestionWorker::new(
        provider,
        pool(settings),
        FileStore::new(&settings.uploads_dir),
        settings.validation_config(),
    );

    if watch_mode {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = tokio::spawn(run_scheduled(worker, settings.poll_interval(), shutdown_rx));

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(true);
        poller.await?;
    } else {
        let run = worker.run_cycle().await?;
        println!(
            "Run {}: {}  seen={} processed={} invoices={} failures={}",
            run.id,
            run.status.as_str(),
            run.emails_seen,
            run.emails_processed,
            run.invoices_created,
            run.failures_count
        );
        if let Some(err) = &run.last_error {
            println!("  last error: {err}");
        }
    }
    Ok(())
}

pub async fn audit_trail(settings: &Settings, entity_id: &str) -> anyhow::Result<()> {
    let repo = AuditRepository::new(pool(settings));
    for event in repo.list_for_entity(entity_id).await? {
        println!(
            "{}  {:20}  {}/{}  by {}{}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.actor,
            event
                .notes
                .as_deref()
                .map(|n| format!("  ({n})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

pub async fn runs(settings: &Settings, limit: u32) -> anyhow::Result<()> {
    let repo = IngestionRunRepository::new(pool(settings));
    for run in repo.list_recent(limit).await? {
        println!(
            "{}  {}  {:7}  seen={} processed={} invoices={} failures={} retries={}",
            run.started_at.to_rfc3339(),
            run.id,
            run.status.as_str(),
            run.emails_seen,
            run.emails_processed,
            run.invoices_created,
            run.failures_count,
            run.retries_count
        );
    }
    Ok(())
}
