//! Loan re-application workflow: draft state, persistence, prefill,
//! validation progress, and the submission pipeline.

pub mod backend;
pub mod draft;
pub mod events;
pub mod prefill;
pub mod router;
pub mod service;
pub mod store;
pub mod submission;
pub mod validation;

#[cfg(test)]
mod tests;

pub use backend::{
    AgentSummary, BackendError, HttpLendingBackend, LatestApplication, LendingBackend,
    ProgressSink, StatusSnapshot, SubmissionReceipt, SubmissionRequest,
};
pub use draft::{
    AgentChoice, ApplicationDraft, IncomeSource, MaritalStatus, PreviousUploads, Reference,
    StoredDocument, UploadSet, UploadedFile,
};
pub use events::{EventError, PortalEvent, PortalEventPublisher};
pub use prefill::{DocumentError, MAX_PROFILE_PHOTO_BYTES};
pub use router::reloan_router;
pub use service::{DraftView, ReloanService, ReloanServiceError};
pub use store::{draft_key, loan_type_key, DraftEnvelope, DraftStore, FileDraftStore, StoreError, DRAFT_SCHEMA_VERSION};
pub use submission::{SubmissionFailure, SubmissionState};
pub use validation::{
    compute_progress, missing_fields, ProgressSnapshot, ProgressTracker, Section, SectionStatus,
    REQUIRED_REFERENCES,
};
