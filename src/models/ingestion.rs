//! Ingestion run ledger - one record per mailbox poll cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Partial,
    Fail,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Fail => "FAIL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "PARTIAL" => Some(Self::Partial),
            "FAIL" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Derive the terminal status of a run from its counters.
///
/// SUCCESS when nothing failed; PARTIAL when some messages failed but at
/// least one invoice was still created; FAIL otherwise.
pub fn derive_run_status(failures_count: u32, invoices_created: u32) -> RunStatus {
    if failures_count == 0 {
        RunStatus::Success
    } else if invoices_created > 0 {
        RunStatus::Partial
    } else {
        RunStatus::Fail
    }
}

/// Throughput and failure metrics for one poll cycle.
///
/// Constructed at cycle start, counters accumulated in memory as messages
/// are processed, persisted once when the cycle finishes (also on abort).
/// Never revisited afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: String,
    /// Last tenant the cycle resolved; None until a message maps to one.
    pub tenant_id: Option<String>,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub emails_seen: u32,
    pub emails_processed: u32,
    pub invoices_created: u32,
    pub failures_count: u32,
    pub retries_count: u32,
    pub status: RunStatus,
    pub last_error: Option<String>,
}

impl IngestionRun {
    /// Start a new run for the given provider label.
    pub fn begin(provider: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: None,
            provider: provider.into(),
            started_at: Utc::now(),
            finished_at: None,
            emails_seen: 0,
            emails_processed: 0,
            invoices_created: 0,
            failures_count: 0,
            retries_count: 0,
            status: RunStatus::Success,
            last_error: None,
        }
    }

    /// Close the run: derive its status from the counters and stamp the
    /// finish time. A fetch-level abort passes its error instead.
    pub fn finish(&mut self, fetch_error: Option<String>) {
        self.finished_at = Some(Utc::now());
        match fetch_error {
            Some(err) => {
                self.status = RunStatus::Fail;
                self.last_error = Some(err);
            }
            None => {
                self.status = derive_run_status(self.failures_count, self.invoices_created);
                if self.failures_count > 0 {
                    self.last_error =
                        Some(format!("{} message(s) failed to process", self.failures_count));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_derivation() {
        assert_eq!(derive_run_status(0, 0), RunStatus::Success);
        assert_eq!(derive_run_status(0, 5), RunStatus::Success);
        assert_eq!(derive_run_status(2, 1), RunStatus::Partial);
        assert_eq!(derive_run_status(1, 0), RunStatus::Fail);
    }

    #[test]
    fn test_finish_with_fetch_error() {
        let mut run = IngestionRun::begin("MAILHOG");
        run.finish(Some("connect timed out".into()));
        assert_eq!(run.status, RunStatus::Fail);
        assert_eq!(run.last_error.as_deref(), Some("connect timed out"));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_finish_summarises_failures() {
        let mut run = IngestionRun::begin("MAILHOG");
        run.failures_count = 2;
        run.invoices_created = 1;
        run.finish(None);
        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.last_error.as_deref(), Some("2 message(s) failed to process"));
    }
}
