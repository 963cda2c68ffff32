//! Email ingestion: mailbox polling, defensive message parsing, and
//! invoice creation from attachments.

pub mod attachments;
pub mod poller;
pub mod provider;

pub use attachments::{alias_local_part, extract_attachments, resolve_to_address, Attachment};
pub use poller::{run_scheduled, IngestError, IngestionWorker};
pub use provider::{
    MailMessage, MailboxProvider, MailhogProvider, MessageContent, MimeBody, MimePart,
    ProviderError, RawMessage, Recipient,
};
