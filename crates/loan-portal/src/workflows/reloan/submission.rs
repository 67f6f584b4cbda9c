//! Submission lifecycle and payload assembly.
//!
//! [`SubmissionState`] is the single machine the UI polls: idle,
//! validating, uploading with a percentage, waiting on the backend,
//! then a terminal success or failure. [`build_submission_request`]
//! flattens a complete draft and its quote into the multipart fields
//! the backend expects.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ConsentConfig;
use crate::workflows::loans::{AmountOutOfRange, LoanQuote, LoanType};
use crate::workflows::reloan::backend::{LendingBackend, SubmissionRequest};
use crate::workflows::reloan::draft::{ApplicationDraft, IncomeSource, UploadSet};
use crate::workflows::reloan::events::{PortalEvent, PortalEventPublisher};

/// Shown when the backend rejects a submission without a usable reason.
pub const GENERIC_SUBMIT_ERROR: &str =
    "We could not submit your application. Please try again.";

pub const STATUS_POLL_ATTEMPTS: u32 = 15;
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Backend statuses worth announcing to the borrower.
const ACCEPTED_STATUSES: [&str; 2] = ["Accepted", "Disbursed"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SubmissionState {
    Idle,
    Validating,
    Uploading {
        percent: u8,
    },
    AwaitingServer,
    #[serde(rename_all = "camelCase")]
    Succeeded {
        application_id: String,
    },
    Failed {
        failure: SubmissionFailure,
    },
}

impl SubmissionState {
    /// A submission is underway; a second one must not start.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionState::Validating
                | SubmissionState::Uploading { .. }
                | SubmissionState::AwaitingServer
        )
    }

    pub const fn label(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Validating => "validating",
            SubmissionState::Uploading { .. } => "uploading",
            SubmissionState::AwaitingServer => "awaiting server",
            SubmissionState::Succeeded { .. } => "succeeded",
            SubmissionState::Failed { .. } => "failed",
        }
    }
}

impl Default for SubmissionState {
    fn default() -> Self {
        SubmissionState::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubmissionFailure {
    /// The draft is incomplete; nothing left the portal.
    MissingFields { fields: Vec<String> },
    /// The requested amount fell outside the product window.
    AmountOutOfRange {
        requested: u64,
        min: u64,
        max: u64,
        message: String,
    },
    /// The backend refused or the transfer broke.
    Remote { message: String },
}

impl From<AmountOutOfRange> for SubmissionFailure {
    fn from(err: AmountOutOfRange) -> Self {
        SubmissionFailure::AmountOutOfRange {
            requested: err.requested,
            min: err.min,
            max: err.max,
            message: err.to_string(),
        }
    }
}

/// Flatten a validated draft, its quote and the consent stamp into the
/// multipart payload for the backend.
pub fn build_submission_request(
    borrowers_id: &str,
    draft: &ApplicationDraft,
    loan_type: LoanType,
    uploads: &UploadSet,
    quote: &LoanQuote,
    consent: &ConsentConfig,
    accepted_at: DateTime<Utc>,
) -> SubmissionRequest {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut push = |name: &str, value: String| fields.push((name.to_string(), value));

    push("borrowersId", borrowers_id.to_string());
    push("loanType", loan_type.label().to_string());

    push("fullName", draft.full_name.trim().to_string());
    if let Some(date) = draft.birth_date {
        push("birthDate", date.format("%Y-%m-%d").to_string());
    }
    push("contactNumber", draft.contact_number.trim().to_string());
    push("emailAddress", draft.email_address.trim().to_string());
    if let Some(status) = draft.marital_status {
        push("maritalStatus", status.label().to_string());
    }
    if draft.is_married() {
        push("spouseName", draft.spouse_name.trim().to_string());
        push(
            "spouseContactNumber",
            draft.spouse_contact_number.trim().to_string(),
        );
    }
    push("homeAddress", draft.home_address.trim().to_string());

    if let Some(source) = draft.income_source {
        push("incomeSource", source.label().to_string());
        match source {
            IncomeSource::Employment => {
                push("employerName", draft.employer_name.trim().to_string());
                push("occupation", draft.occupation.trim().to_string());
            }
            IncomeSource::Business => {
                push("businessName", draft.business_name.trim().to_string());
                push("businessType", draft.business_type.trim().to_string());
            }
            IncomeSource::Pension | IncomeSource::Remittance => {}
        }
    }
    push("monthlyIncome", format!("{:.2}", draft.monthly_income));

    for (index, reference) in draft.references.iter().enumerate() {
        push(
            &format!("appReferences[{index}][name]"),
            reference.name.trim().to_string(),
        );
        push(
            &format!("appReferences[{index}][contactNumber]"),
            reference.contact_number.trim().to_string(),
        );
        push(
            &format!("appReferences[{index}][relation]"),
            reference.relation.trim().to_string(),
        );
    }

    if let Some(agent) = &draft.agent {
        push("agentId", agent.as_field().to_string());
    }

    if loan_type.requires_collateral() {
        push("collateralType", draft.collateral_type.trim().to_string());
        push(
            "collateralDescription",
            draft.collateral_description.trim().to_string(),
        );
        push(
            "proofOfOwnership",
            draft.proof_of_ownership.trim().to_string(),
        );
        push("estimatedValue", draft.estimated_value.to_string());
    }

    push("loanPurpose", draft.loan_purpose.trim().to_string());
    push("loanAmount", quote.requested_amount.to_string());
    push("previousBalance", quote.previous_balance.to_string());
    push(
        "balanceDecision",
        quote.balance_decision.as_field().to_string(),
    );
    if let Some(months) = quote.option.months {
        push("loanTermMonths", months.to_string());
    }
    push("interestRate", quote.option.interest_rate.to_string());
    push("interestAmount", format!("{:.2}", quote.interest_amount));
    if let Some(total_interest) = quote.total_interest {
        push("totalInterest", format!("{total_interest:.2}"));
    }
    if let Some(total_payable) = quote.total_payable {
        push("totalPayable", format!("{total_payable:.2}"));
    }
    push("monthlyDue", format!("{:.2}", quote.monthly_due));
    push("serviceFee", format!("{:.2}", quote.service_fee));
    push("netProceeds", format!("{:.2}", quote.net_proceeds));

    push("companyName", consent.company_name.clone());
    push("termsVersion", consent.terms_version.clone());
    push("privacyVersion", consent.privacy_version.clone());
    push("consentAcceptedAt", accepted_at.to_rfc3339());

    SubmissionRequest {
        path: format!("loan-applications/{}", loan_type.submission_segment()),
        fields,
        documents: uploads.documents.clone(),
        profile_photo: uploads.profile_photo.clone(),
    }
}

/// Poll the backend until the new application reaches a status worth
/// announcing, then publish it. Gives up quietly after `attempts`.
pub async fn watch_application_status<B, E>(
    backend: Arc<B>,
    events: Arc<E>,
    borrowers_id: String,
    application_id: String,
    attempts: u32,
    interval: Duration,
) where
    B: LendingBackend + ?Sized,
    E: PortalEventPublisher + ?Sized,
{
    for _ in 0..attempts {
        tokio::time::sleep(interval).await;
        match backend.application_status(&application_id).await {
            Ok(snapshot) => {
                if ACCEPTED_STATUSES.contains(&snapshot.status.as_str()) {
                    let event = PortalEvent::ApplicationUpdated {
                        borrowers_id: borrowers_id.clone(),
                        application_id: application_id.clone(),
                        status: snapshot.status,
                    };
                    if let Err(err) = events.publish(event) {
                        warn!(%err, "portal event dropped");
                    }
                    return;
                }
            }
            Err(err) => {
                debug!(%err, %application_id, "status poll failed");
            }
        }
    }
}
