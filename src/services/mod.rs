//! Service layer for the invoice back-office business logic.
//!
//! Domain logic separated from interface concerns. Services can be driven
//! by the CLI, an HTTP layer, or the ingestion worker.

pub mod approval;
pub mod extraction;
pub mod payment;
pub mod upload;
pub mod validation;

pub use approval::{ApprovalError, ApprovalService};
pub use extraction::{ExtractionError, ExtractionService};
pub use payment::{PaymentError, PaymentService};
pub use upload::{UploadError, UploadService};
pub use validation::{
    build_context, derive_status, drafts_to_exceptions, is_blocking, validate, ExceptionDraft,
    RuleContext, RuleProfile, ValidationConfig, ValidationError, ValidationOutcome,
    ValidationService, BLOCKING_CODES,
};
