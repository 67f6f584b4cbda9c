//! Prefill from the borrower's previous application.
//!
//! Returning borrowers start from what the backend already knows:
//! identity, income and references seed a fresh draft, while the stored
//! 2x2 photo and supporting documents become a reuse pool the borrower
//! can pull files from without re-uploading. Loan amount and balance
//! decision always start empty; those belong to the new application.

use crate::workflows::reloan::backend::{BackendError, LatestApplication, LendingBackend};
use crate::workflows::reloan::draft::{
    AgentChoice, ApplicationDraft, IncomeSource, MaritalStatus, PreviousUploads, StoredDocument,
    UploadedFile,
};
use thiserror::Error;

/// Hard cap on 2x2 photo payloads, uploaded or reused.
pub const MAX_PROFILE_PHOTO_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("no profile photo is available from the previous application")]
    NoPreviousPhoto,
    #[error("no stored document at position {0}")]
    NoSuchDocument(usize),
    #[error("profile photo must be an image, got {0}")]
    NotAnImage(String),
    #[error("profile photo is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Draft seed plus the reuse pool, both derived from one backend record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefillBundle {
    pub draft: ApplicationDraft,
    pub previous: PreviousUploads,
}

impl PrefillBundle {
    pub fn from_latest(latest: LatestApplication) -> Self {
        let previous = PreviousUploads {
            profile_photo_url: Some(latest.profile_pic_url)
                .filter(|url| !url.trim().is_empty()),
            documents: latest
                .documents
                .into_iter()
                .filter(|document| !document.path.trim().is_empty())
                .collect(),
        };

        let draft = ApplicationDraft {
            full_name: latest.full_name,
            birth_date: latest.birth_date,
            contact_number: latest.contact_number,
            email_address: latest.email_address,
            marital_status: MaritalStatus::from_label(&latest.marital_status),
            spouse_name: latest.spouse_name,
            spouse_contact_number: latest.spouse_contact_number,
            home_address: latest.home_address,
            income_source: IncomeSource::from_label(&latest.income_source),
            employer_name: latest.employer_name,
            occupation: latest.occupation,
            business_name: latest.business_name,
            business_type: latest.business_type,
            monthly_income: latest.monthly_income,
            references: latest.app_references,
            agent: latest.agent.as_deref().and_then(AgentChoice::parse),
            collateral_type: latest.collateral_type,
            collateral_description: latest.collateral_description,
            proof_of_ownership: latest.proof_of_ownership,
            estimated_value: latest.estimated_value,
            loan_purpose: latest.loan_purpose,
            loan_amount: 0,
            balance_decision: None,
        };

        Self { draft, previous }
    }
}

/// Look up the borrower's latest application, mapped for the portal.
pub async fn fetch_prefill<B>(
    backend: &B,
    borrowers_id: &str,
) -> Result<Option<PrefillBundle>, BackendError>
where
    B: LendingBackend + ?Sized,
{
    match backend.latest_application(borrowers_id).await? {
        Some(latest) => Ok(Some(PrefillBundle::from_latest(latest))),
        None => Ok(None),
    }
}

/// Gate every inbound 2x2 photo, fresh upload or reused download.
pub fn accept_profile_photo(file: UploadedFile) -> Result<UploadedFile, DocumentError> {
    let is_image = file
        .content_type
        .parse::<mime::Mime>()
        .map(|parsed| parsed.type_() == mime::IMAGE)
        .unwrap_or(false);
    if !is_image {
        return Err(DocumentError::NotAnImage(file.content_type));
    }
    if file.bytes.len() > MAX_PROFILE_PHOTO_BYTES {
        return Err(DocumentError::TooLarge {
            size: file.bytes.len(),
            limit: MAX_PROFILE_PHOTO_BYTES,
        });
    }
    Ok(file)
}

/// Fetch the previous 2x2 photo back into memory, subject to the same
/// checks as a fresh upload.
pub async fn fetch_previous_profile<B>(
    backend: &B,
    previous: &PreviousUploads,
) -> Result<UploadedFile, DocumentError>
where
    B: LendingBackend + ?Sized,
{
    let url = previous
        .profile_photo_url
        .as_deref()
        .ok_or(DocumentError::NoPreviousPhoto)?;
    let file = backend.download(url).await?;
    accept_profile_photo(file)
}

/// Fetch one stored document, preferring the recorded name and type
/// over whatever the download reports.
pub async fn fetch_previous_document<B>(
    backend: &B,
    document: &StoredDocument,
) -> Result<UploadedFile, DocumentError>
where
    B: LendingBackend + ?Sized,
{
    let mut file = backend.download(&document.path).await?;
    if !document.file_name.trim().is_empty() {
        file.file_name = document.file_name.clone();
    }
    if !document.mime_type.trim().is_empty() {
        file.content_type = document.mime_type.clone();
    }
    Ok(file)
}
