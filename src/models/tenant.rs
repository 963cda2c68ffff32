//! Tenants - the owning organisation for invoices and their configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    /// Local part matched against inbound email recipients.
    pub inbound_alias: String,
    /// Comma-separated currency allow-list; blank falls back to the
    /// process-wide default.
    pub allowed_currencies: String,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, inbound_alias: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            inbound_alias: inbound_alias.into(),
            allowed_currencies: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Parse the configured allow-list; None when the tenant has no
    /// override of its own.
    pub fn allowed_currency_list(&self) -> Option<Vec<String>> {
        if self.allowed_currencies.trim().is_empty() {
            return None;
        }
        Some(
            self.allowed_currencies
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_list_parsing() {
        let mut tenant = Tenant::new("Acme", "acme");
        assert_eq!(tenant.allowed_currency_list(), None);

        tenant.allowed_currencies = "USD, EUR ,GBP".into();
        assert_eq!(
            tenant.allowed_currency_list(),
            Some(vec!["USD".into(), "EUR".into(), "GBP".into()])
        );
    }
}
