//! Outbound portal notifications.
//!
//! The service reports milestones through [`PortalEventPublisher`];
//! deployments decide where they go (a push channel to the browser, a
//! log sink in development). Publishing is advisory and failures never
//! interrupt the pipeline.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PortalEvent {
    #[serde(rename_all = "camelCase")]
    ProgressChanged {
        borrowers_id: String,
        missing_count: usize,
        ready: bool,
    },
    #[serde(rename_all = "camelCase")]
    UploadProgress { borrowers_id: String, percent: u8 },
    #[serde(rename_all = "camelCase")]
    ApplicationSubmitted {
        borrowers_id: String,
        application_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ApplicationUpdated {
        borrowers_id: String,
        application_id: String,
        status: String,
    },
    #[serde(rename_all = "camelCase")]
    DraftCleared { borrowers_id: String },
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

pub trait PortalEventPublisher: Send + Sync {
    fn publish(&self, event: PortalEvent) -> Result<(), EventError>;
}
