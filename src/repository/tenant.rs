//! Tenant persistence.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::parse_datetime;
use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{NewTenant, TenantRecord};
use crate::models::Tenant;
use crate::schema::tenants;

fn record_to_tenant(record: TenantRecord) -> Tenant {
    Tenant {
        created_at: parse_datetime(&record.created_at),
        id: record.id,
        name: record.name,
        inbound_alias: record.inbound_alias,
        allowed_currencies: record.allowed_currencies,
    }
}

#[derive(Clone)]
pub struct TenantRepository {
    pool: AsyncSqlitePool,
}

impl TenantRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a tenant.
    pub async fn insert(&self, tenant: &Tenant) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let created_at = tenant.created_at.to_rfc3339();
        let record = NewTenant {
            id: &tenant.id,
            name: &tenant.name,
            inbound_alias: &tenant.inbound_alias,
            allowed_currencies: &tenant.allowed_currencies,
            created_at: &created_at,
        };

        diesel::insert_into(tenants::table)
            .values(&record)
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Get a tenant by id.
    pub async fn get(&self, id: &str) -> Result<Option<Tenant>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<TenantRecord> = tenants::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(record_to_tenant))
    }

    /// Look a tenant up by its inbound email alias (exact match).
    pub async fn find_by_alias(&self, alias: &str) -> Result<Option<Tenant>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<TenantRecord> = tenants::table
            .filter(tenants::inbound_alias.eq(alias))
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(record_to_tenant))
    }

    /// All tenants, by name.
    pub async fn list(&self) -> Result<Vec<Tenant>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<TenantRecord> = tenants::table
            .order(tenants::name.asc())
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(record_to_tenant).collect())
    }
}
