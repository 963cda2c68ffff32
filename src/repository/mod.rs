//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! over SQLite, via diesel-async's SyncConnectionWrapper.
//!
//! Multi-statement business operations (a mutation plus its audit event)
//! are wrapped in a single transaction by the repository method or worker
//! that performs them; `audit::append` takes the open connection so the
//! event commits or rolls back together with the mutation it describes.

pub mod audit;
pub mod exception;
pub mod ingestion;
pub mod invoice;
pub mod migrations;
pub mod pool;
pub mod records;
pub mod tenant;
pub mod util;

pub use audit::AuditRepository;
pub use exception::ExceptionRepository;
pub use ingestion::IngestionRunRepository;
pub use invoice::InvoiceRepository;
pub use pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
pub use tenant::TenantRepository;

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Parse an optional calendar date stored as `YYYY-MM-DD` text.
pub fn parse_date_opt(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_fallback() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
        let ts = parse_datetime("2026-01-05T10:30:00+00:00");
        assert_eq!(ts.to_rfc3339(), "2026-01-05T10:30:00+00:00");
    }

    #[test]
    fn test_parse_date_opt() {
        assert_eq!(
            parse_date_opt(Some("2026-01-05".into())),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
        assert_eq!(parse_date_opt(Some("05/01/2026".into())), None);
        assert_eq!(parse_date_opt(None), None);
    }
}
