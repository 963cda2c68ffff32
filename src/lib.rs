//! invoicebox - invoice back-office processing.
//!
//! Invoices enter through file upload or the email-ingestion worker, get
//! their fields extracted, pass through a rule-based validation engine that
//! derives their lifecycle status, wait for a human decision, and end in
//! payment recording. Every state change lands in an append-only audit
//! trail in the same transaction as the change itself.

pub mod cli;
pub mod config;
pub mod ingest;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;
pub mod storage;
