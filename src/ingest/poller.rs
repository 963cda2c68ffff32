//! The mailbox poll cycle.
//!
//! One cycle fetches every pending message, processes each in isolation,
//! and records an `IngestionRun` with the cycle's counters. A message is
//! deleted from the mailbox only after it was fully processed, so failed
//! messages are redelivered on the next poll (at-least-once). All writes
//! for a single message happen in one transaction.

use std::time::Duration;

use diesel_async::AsyncConnection;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::attachments::{
    alias_local_part, extract_attachments, resolve_to_address, AttachmentError,
};
use super::provider::{MailMessage, MailboxProvider, ProviderError};
use crate::models::{
    EventDraft, IngestionRun, Invoice, InvoiceException, InvoiceStatus, Tenant,
};
use crate::repository::{
    audit, exception, invoice, AsyncSqlitePool, DieselError, IngestionRunRepository,
    InvoiceRepository, TenantRepository,
};
use crate::services::validation::{
    build_context, derive_status, drafts_to_exceptions, validate, ValidationConfig,
};
use crate::storage::{FileStore, StorageError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DieselError),
}

/// How processing one message ended, short of an error.
enum MessageOutcome {
    /// Steps completed; the message may be deleted. Zero invoices is a
    /// legitimate no-attachment message.
    Processed { invoices: u32 },
    /// The recipient alias maps to no tenant. Counted as a failure and the
    /// message is left in the mailbox for the next poll.
    UnknownTenant(String),
}

/// Polls a mailbox and creates invoices from attachments.
pub struct IngestionWorker<P: MailboxProvider> {
    provider: P,
    pool: AsyncSqlitePool,
    invoices: InvoiceRepository,
    tenants: TenantRepository,
    runs: IngestionRunRepository,
    store: FileStore,
    validation: ValidationConfig,
}

impl<P: MailboxProvider> IngestionWorker<P> {
    pub fn new(
        provider: P,
        pool: AsyncSqlitePool,
        store: FileStore,
        validation: ValidationConfig,
    ) -> Self {
        Self {
            provider,
            invoices: InvoiceRepository::new(pool.clone()),
            tenants: TenantRepository::new(pool.clone()),
            runs: IngestionRunRepository::new(pool.clone()),
            pool,
            store,
            validation,
        }
    }

    /// Run one poll cycle and persist its run record.
    ///
    /// A fetch failure aborts the cycle: the run is recorded as FAIL with
    /// the error, and no message is touched. Per-message failures only
    /// bump counters; the cycle continues.
    pub async fn run_cycle(&self) -> Result<IngestionRun, DieselError> {
        let mut run = IngestionRun::begin(self.provider.label());

        let messages = match self.provider.fetch_messages().await {
            Ok(messages) => messages,
            Err(err) => {
                error!("mailbox fetch failed: {err}");
                run.finish(Some(err.to_string()));
                self.runs.insert(&run).await?;
                return Ok(run);
            }
        };
        run.emails_seen = messages.len() as u32;

        for message in &messages {
            match self.process_message(message, &mut run).await {
                Ok(MessageOutcome::Processed { invoices }) => {
                    run.emails_processed += 1;
                    run.invoices_created += invoices;
                    if let Err(err) = self.provider.delete_message(&message.id).await {
                        warn!("failed to delete message {}: {err}", message.id);
                    }
                }
                Ok(MessageOutcome::UnknownTenant(address)) => {
                    warn!("no tenant for inbound address: {address}");
                    run.failures_count += 1;
                }
                Err(err) => {
                    error!("error processing message {}: {err}", message.id);
                    run.failures_count += 1;
                    run.retries_count += 1;
                }
            }
        }

        run.finish(None);
        self.runs.insert(&run).await?;

        info!(
            seen = run.emails_seen,
            processed = run.emails_processed,
            invoices = run.invoices_created,
            failures = run.failures_count,
            status = run.status.as_str(),
            "ingestion run complete"
        );
        Ok(run)
    }

    async fn process_message(
        &self,
        message: &MailMessage,
        run: &mut IngestionRun,
    ) -> Result<MessageOutcome, IngestError> {
        let address = resolve_to_address(message);
        let Some(tenant) = self
            .tenants
            .find_by_alias(alias_local_part(&address))
            .await?
        else {
            return Ok(MessageOutcome::UnknownTenant(address));
        };
        run.tenant_id = Some(tenant.id.clone());

        let attachments = extract_attachments(message)?;
        if attachments.is_empty() {
            return Ok(MessageOutcome::Processed { invoices: 0 });
        }

        // Store files and evaluate rules first; the duplicate probe is a
        // point-in-time read and belongs outside the write transaction.
        let mut prepared = Vec::with_capacity(attachments.len());
        for attachment in &attachments {
            prepared.push(
                self.prepare_invoice(&tenant, &message.id, &attachment.filename, &attachment.content, &address)
                    .await?,
            );
        }

        let created = prepared.len() as u32;
        let mut conn = self.pool.get().await?;
        conn.transaction(|conn| {
            Box::pin(async move {
                for (inv, exceptions, status, event) in &prepared {
                    invoice::insert(conn, inv).await?;
                    for exc in exceptions {
                        exception::insert(conn, exc).await?;
                    }
                    invoice::update_status(conn, &inv.id, *status).await?;
                    audit::append(conn, event).await?;
                }
                Ok::<_, DieselError>(())
            })
        })
        .await?;

        Ok(MessageOutcome::Processed { invoices: created })
    }

    async fn prepare_invoice(
        &self,
        tenant: &Tenant,
        message_id: &str,
        filename: &str,
        content: &[u8],
        recipient: &str,
    ) -> Result<(Invoice, Vec<InvoiceException>, InvoiceStatus, EventDraft), IngestError> {
        let stored = self.store.save(content, filename)?;
        let invoice = Invoice::from_email(
            tenant.id.clone(),
            stored.path,
            filename.to_string(),
            message_id.to_string(),
        );

        let ctx = build_context(
            &self.invoices,
            &invoice,
            Some(tenant),
            &self.validation.default_currencies,
            self.validation.profile,
        )
        .await?;
        let drafts = validate(&invoice, &ctx);
        let status = derive_status(&drafts);
        let exceptions = drafts_to_exceptions(&invoice, &drafts);

        let event = EventDraft::new("EMAIL_RECEIVED", "invoice", &invoice.id)
            .tenant(&tenant.id)
            .metadata(serde_json::json!({
                "filename": filename,
                "recipient": recipient,
                "message_id": message_id,
                "content_hash": stored.content_hash,
            }));

        Ok((invoice, exceptions, status, event))
    }
}

/// Drive the worker on a fixed interval until shutdown.
///
/// Cycles are serialized: a cycle that overruns the interval delays the
/// next tick rather than overlapping it.
pub async fn run_scheduled<P: MailboxProvider>(
    worker: IngestionWorker<P>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("mailbox poller scheduled every {}s", interval.as_secs());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = worker.run_cycle().await {
                    error!("ingestion cycle failed: {err}");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mailbox poller stopped");
                    break;
                }
            }
        }
    }
}
