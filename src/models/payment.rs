//! Payment records. Recording a payment is the only path to the PAID status.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub tenant_id: String,
    pub invoice_id: String,
    pub paid_amount: BigDecimal,
    pub paid_currency: String,
    pub paid_at: DateTime<Utc>,
    pub method: String,
    pub reference: String,
    pub recorded_by: Option<String>,
}
