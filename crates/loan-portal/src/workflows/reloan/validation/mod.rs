//! Completeness checklist over a draft and its staged uploads.
//!
//! [`missing_fields`] walks the form top to bottom and returns
//! display-ready labels, one per unmet requirement, in the order the
//! sections appear on screen. [`compute_progress`] buckets those labels
//! per section for the sidebar, and [`ProgressTracker`] suppresses
//! republication when nothing changed.

mod fields;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::workflows::loans::LoanType;
use crate::workflows::reloan::draft::{ApplicationDraft, IncomeSource, UploadSet};

use fields::{is_valid_contact_number, is_valid_email, is_valid_person_name};

/// Character references required on every application.
pub const REQUIRED_REFERENCES: usize = 3;

/// Form sections in on-screen order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    BasicInfo,
    Income,
    References,
    Collateral,
    Photo2x2,
    Documents,
    Agent,
    LoanDetails,
}

impl Section {
    pub const fn ordered() -> [Section; 8] {
        [
            Section::BasicInfo,
            Section::Income,
            Section::References,
            Section::Collateral,
            Section::Photo2x2,
            Section::Documents,
            Section::Agent,
            Section::LoanDetails,
        ]
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Section::BasicInfo => "Basic Information",
            Section::Income => "Source of Income",
            Section::References => "Character References",
            Section::Collateral => "Collateral",
            Section::Photo2x2 => "2x2 Picture",
            Section::Documents => "Supporting Documents",
            Section::Agent => "Agent",
            Section::LoanDetails => "Loan Details",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStatus {
    pub done: bool,
    pub missing_count: usize,
    pub missing_details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub sections: BTreeMap<Section, SectionStatus>,
    pub missing_fields: Vec<String>,
    pub ready: bool,
}

/// Labels for every unmet requirement, ordered by form section.
pub fn missing_fields(
    draft: &ApplicationDraft,
    uploads: &UploadSet,
    loan_type: LoanType,
) -> Vec<String> {
    let mut missing = Vec::new();

    if !is_valid_person_name(&draft.full_name) {
        missing.push("Full Name".to_string());
    }
    if draft.birth_date.is_none() {
        missing.push("Date of Birth".to_string());
    }
    if !is_valid_contact_number(&draft.contact_number) {
        missing.push("Contact Number".to_string());
    }
    if !is_valid_email(&draft.email_address) {
        missing.push("Email Address".to_string());
    }
    if draft.marital_status.is_none() {
        missing.push("Marital Status".to_string());
    }
    if draft.is_married() {
        if !is_valid_person_name(&draft.spouse_name) {
            missing.push("Spouse Name".to_string());
        }
        if !is_valid_contact_number(&draft.spouse_contact_number) {
            missing.push("Spouse Contact Number".to_string());
        }
    }
    if draft.home_address.trim().is_empty() {
        missing.push("Home Address".to_string());
    }

    match draft.income_source {
        None => missing.push("Income Source".to_string()),
        Some(IncomeSource::Employment) => {
            if draft.employer_name.trim().is_empty() {
                missing.push("Employer Name".to_string());
            }
            if draft.occupation.trim().is_empty() {
                missing.push("Occupation".to_string());
            }
        }
        Some(IncomeSource::Business) => {
            if draft.business_name.trim().is_empty() {
                missing.push("Business Name".to_string());
            }
            if draft.business_type.trim().is_empty() {
                missing.push("Business Type".to_string());
            }
        }
        Some(_) => {}
    }
    if draft.monthly_income <= 0.0 {
        missing.push("Monthly Income".to_string());
    }

    for slot in 0..REQUIRED_REFERENCES {
        let number = slot + 1;
        let reference = draft.references.get(slot);
        if reference.map_or(true, |entry| entry.name.trim().is_empty()) {
            missing.push(format!("Reference {number} Name"));
        }
        if reference.map_or(true, |entry| !is_valid_contact_number(&entry.contact_number)) {
            missing.push(format!("Reference {number} Contact Number"));
        }
        if reference.map_or(true, |entry| entry.relation.trim().is_empty()) {
            missing.push(format!("Reference {number} Relation"));
        }
    }

    if loan_type.requires_collateral() {
        if draft.collateral_type.trim().is_empty() {
            missing.push("Collateral Type".to_string());
        }
        if draft.collateral_description.trim().is_empty() {
            missing.push("Collateral Description".to_string());
        }
        if draft.proof_of_ownership.trim().is_empty() {
            missing.push("Proof of Ownership".to_string());
        }
        if draft.estimated_value == 0 {
            missing.push("Estimated Value".to_string());
        }
    }

    if uploads.profile_photo.is_none() {
        missing.push("2x2 Picture".to_string());
    }

    let attached = uploads.documents.len();
    let required = loan_type.required_document_count();
    if attached != required {
        missing.push(format!(
            "Supporting Documents ({attached} of {required} files)"
        ));
    }

    if draft.agent.is_none() {
        missing.push("Agent".to_string());
    }

    if draft.loan_purpose.trim().is_empty() {
        missing.push("Loan Purpose".to_string());
    }
    if draft.loan_amount == 0 {
        missing.push("Loan Amount".to_string());
    }

    missing
}

/// Per-section rollup of [`missing_fields`].
pub fn compute_progress(
    draft: &ApplicationDraft,
    uploads: &UploadSet,
    loan_type: LoanType,
) -> ProgressSnapshot {
    let missing = missing_fields(draft, uploads, loan_type);

    let mut sections: BTreeMap<Section, SectionStatus> = Section::ordered()
        .into_iter()
        .map(|section| (section, SectionStatus::default()))
        .collect();
    for label in &missing {
        let status = sections.entry(section_for_label(label)).or_default();
        status.missing_count += 1;
        status.missing_details.push(label.clone());
    }
    for status in sections.values_mut() {
        status.done = status.missing_count == 0;
    }

    ProgressSnapshot {
        sections,
        ready: missing.is_empty(),
        missing_fields: missing,
    }
}

fn section_for_label(label: &str) -> Section {
    if label.starts_with("Reference ") {
        return Section::References;
    }
    if label.starts_with("Supporting Documents") {
        return Section::Documents;
    }
    match label {
        "Full Name" | "Date of Birth" | "Contact Number" | "Email Address" | "Marital Status"
        | "Spouse Name" | "Spouse Contact Number" | "Home Address" => Section::BasicInfo,
        "Income Source" | "Employer Name" | "Occupation" | "Business Name" | "Business Type"
        | "Monthly Income" => Section::Income,
        "Collateral Type" | "Collateral Description" | "Proof of Ownership"
        | "Estimated Value" => Section::Collateral,
        "2x2 Picture" => Section::Photo2x2,
        "Agent" => Section::Agent,
        _ => Section::LoanDetails,
    }
}

/// Remembers the last published snapshot so identical recomputations
/// stay quiet.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: Option<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn update(&mut self, snapshot: ProgressSnapshot) -> Option<ProgressSnapshot> {
        if self.last.as_ref() == Some(&snapshot) {
            return None;
        }
        self.last = Some(snapshot.clone());
        Some(snapshot)
    }

    pub fn current(&self) -> Option<&ProgressSnapshot> {
        self.last.as_ref()
    }
}
