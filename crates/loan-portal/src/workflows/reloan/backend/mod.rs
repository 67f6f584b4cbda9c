//! Boundary to the lending institution's core system.
//!
//! The portal never owns borrower records; it reads the latest
//! application, outstanding balance and agent roster from the backend
//! and pushes completed submissions to it. [`LendingBackend`] is the
//! seam, [`HttpLendingBackend`] the production implementation.

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::workflows::reloan::draft::{self, Reference, StoredDocument, UploadedFile};

pub use http::HttpLendingBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("lending backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("lending backend returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("lending backend response did not include an application id")]
    MissingApplicationId,
}

impl BackendError {
    /// Backend-authored rejection text, when there is any to show.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            BackendError::Http { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Receives cumulative upload percentages while a submission streams.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

/// Everything the portal asks of the core system.
#[async_trait]
pub trait LendingBackend: Send + Sync {
    /// Latest application on file for the borrower, if any.
    async fn latest_application(
        &self,
        borrowers_id: &str,
    ) -> Result<Option<LatestApplication>, BackendError>;

    /// Outstanding balance on the borrower's current loan, in pesos.
    async fn borrower_balance(&self, borrowers_id: &str) -> Result<f64, BackendError>;

    async fn agent_names(&self) -> Result<Vec<AgentSummary>, BackendError>;

    /// Fetch a previously uploaded file back into memory.
    async fn download(&self, location: &str) -> Result<UploadedFile, BackendError>;

    /// Stream the finished application as multipart form data,
    /// reporting cumulative progress through `progress`.
    async fn submit_application(
        &self,
        request: SubmissionRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmissionReceipt, BackendError>;

    async fn application_status(
        &self,
        application_id: &str,
    ) -> Result<StatusSnapshot, BackendError>;
}

/// Assembled multipart payload, ready to post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionRequest {
    /// Path under the backend base url, chosen by loan type.
    pub path: String,
    pub fields: Vec<(String, String)>,
    pub documents: Vec<UploadedFile>,
    pub profile_photo: Option<UploadedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub application_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent_id: String,
    pub name: String,
}

/// The borrower's most recent application as the backend records it.
/// Every field is optional in practice; absent or malformed values fall
/// back to defaults so one bad field never loses the whole record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatestApplication {
    pub full_name: String,
    #[serde(with = "draft::date_value")]
    pub birth_date: Option<NaiveDate>,
    pub contact_number: String,
    pub email_address: String,
    pub marital_status: String,
    pub spouse_name: String,
    pub spouse_contact_number: String,
    pub home_address: String,
    pub income_source: String,
    pub employer_name: String,
    pub occupation: String,
    pub business_name: String,
    pub business_type: String,
    #[serde(with = "draft::money_value")]
    pub monthly_income: f64,
    pub app_references: Vec<Reference>,
    /// Raw agent id. Historical records carry plain ids, embedded
    /// objects or stringified junk, so extraction is best effort.
    #[serde(deserialize_with = "deserialize_agent")]
    pub agent: Option<String>,
    pub collateral_type: String,
    pub collateral_description: String,
    pub proof_of_ownership: String,
    #[serde(with = "draft::amount_value")]
    pub estimated_value: u64,
    pub loan_purpose: String,
    pub profile_pic_url: String,
    pub documents: Vec<StoredDocument>,
}

pub(crate) fn deserialize_agent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(id)) => Some(id),
        Some(Value::Object(map)) => map
            .get("agentId")
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}
