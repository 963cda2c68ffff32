//! Ingestion run ledger persistence.
//!
//! A run is persisted once, at the end of its cycle; it is never updated
//! afterwards.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{IngestionRunRecord, NewIngestionRun};
use super::util::to_diesel_error;
use super::{parse_datetime, parse_datetime_opt};
use crate::models::{IngestionRun, RunStatus};
use crate::schema::ingestion_runs;

fn record_to_run(record: IngestionRunRecord) -> Result<IngestionRun, DieselError> {
    let status = RunStatus::parse(&record.status)
        .ok_or_else(|| to_diesel_error(format!("unknown run status '{}'", record.status)))?;

    Ok(IngestionRun {
        status,
        started_at: parse_datetime(&record.started_at),
        finished_at: parse_datetime_opt(record.finished_at),
        emails_seen: record.emails_seen as u32,
        emails_processed: record.emails_processed as u32,
        invoices_created: record.invoices_created as u32,
        failures_count: record.failures_count as u32,
        retries_count: record.retries_count as u32,
        id: record.id,
        tenant_id: record.tenant_id,
        provider: record.provider,
        last_error: record.last_error,
    })
}

#[derive(Clone)]
pub struct IngestionRunRepository {
    pool: AsyncSqlitePool,
}

impl IngestionRunRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a finished run.
    pub async fn insert(&self, run: &IngestionRun) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let started_at = run.started_at.to_rfc3339();
        let finished_at = run.finished_at.map(|ts| ts.to_rfc3339());
        let record = NewIngestionRun {
            id: &run.id,
            tenant_id: run.tenant_id.as_deref(),
            provider: &run.provider,
            started_at: &started_at,
            finished_at: finished_at.as_deref(),
            emails_seen: run.emails_seen as i32,
            emails_processed: run.emails_processed as i32,
            invoices_created: run.invoices_created as i32,
            failures_count: run.failures_count as i32,
            retries_count: run.retries_count as i32,
            status: run.status.as_str(),
            last_error: run.last_error.as_deref(),
        };

        diesel::insert_into(ingestion_runs::table)
            .values(&record)
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Get a run by id.
    pub async fn get(&self, id: &str) -> Result<Option<IngestionRun>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<IngestionRunRecord> = ingestion_runs::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;

        record.map(record_to_run).transpose()
    }

    /// Most recent runs, newest first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<IngestionRun>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<IngestionRunRecord> = ingestion_runs::table
            .order(ingestion_runs::started_at.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .await?;

        records.into_iter().map(record_to_run).collect()
    }
}
