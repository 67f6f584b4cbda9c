use super::common::*;

use crate::workflows::loans::LoanType;
use crate::workflows::reloan::draft::{ApplicationDraft, IncomeSource, MaritalStatus, UploadSet};
use crate::workflows::reloan::validation::{
    compute_progress, missing_fields, ProgressTracker, Section,
};

#[test]
fn complete_application_has_nothing_missing() {
    let missing = missing_fields(
        &complete_draft(),
        &ready_uploads(),
        LoanType::RegularWithoutCollateral,
    );
    assert_eq!(missing, Vec::<String>::new());

    let progress = compute_progress(
        &complete_draft(),
        &ready_uploads(),
        LoanType::RegularWithoutCollateral,
    );
    assert!(progress.ready);
    assert!(progress.sections.values().all(|status| status.done));
}

#[test]
fn empty_form_lists_labels_in_section_order() {
    let missing = missing_fields(
        &ApplicationDraft::default(),
        &UploadSet::default(),
        LoanType::RegularWithoutCollateral,
    );

    let expected = [
        "Full Name",
        "Date of Birth",
        "Contact Number",
        "Email Address",
        "Marital Status",
        "Home Address",
        "Income Source",
        "Monthly Income",
        "Reference 1 Name",
        "Reference 1 Contact Number",
        "Reference 1 Relation",
        "Reference 2 Name",
        "Reference 2 Contact Number",
        "Reference 2 Relation",
        "Reference 3 Name",
        "Reference 3 Contact Number",
        "Reference 3 Relation",
        "2x2 Picture",
        "Supporting Documents (0 of 4 files)",
        "Agent",
        "Loan Purpose",
        "Loan Amount",
    ];
    assert_eq!(missing, expected);
}

#[test]
fn marriage_requires_spouse_details() {
    let mut draft = complete_draft();
    draft.marital_status = Some(MaritalStatus::Married);

    let missing = missing_fields(&draft, &ready_uploads(), LoanType::RegularWithoutCollateral);
    assert_eq!(missing, ["Spouse Name", "Spouse Contact Number"]);

    draft.spouse_name = "Jose Santos".to_string();
    draft.spouse_contact_number = "09179876543".to_string();
    let missing = missing_fields(&draft, &ready_uploads(), LoanType::RegularWithoutCollateral);
    assert!(missing.is_empty());
}

#[test]
fn income_details_follow_the_selected_source() {
    let mut draft = complete_draft();
    draft.income_source = Some(IncomeSource::Business);

    let missing = missing_fields(&draft, &ready_uploads(), LoanType::RegularWithoutCollateral);
    assert_eq!(missing, ["Business Name", "Business Type"]);

    draft.income_source = Some(IncomeSource::Pension);
    draft.employer_name.clear();
    draft.occupation.clear();
    let missing = missing_fields(&draft, &ready_uploads(), LoanType::RegularWithoutCollateral);
    assert!(missing.is_empty(), "pension income needs no detail fields");
}

#[test]
fn malformed_formats_are_flagged_not_just_blanks() {
    let mut draft = complete_draft();
    draft.full_name = "Cher".to_string();
    draft.contact_number = "08171234567".to_string();
    draft.email_address = "maria@example".to_string();
    draft.references[1].contact_number = "12345".to_string();

    let missing = missing_fields(&draft, &ready_uploads(), LoanType::RegularWithoutCollateral);
    assert_eq!(
        missing,
        [
            "Full Name",
            "Contact Number",
            "Email Address",
            "Reference 2 Contact Number",
        ]
    );
}

#[test]
fn collateral_products_require_collateral_and_six_documents() {
    let draft = complete_draft();
    let missing = missing_fields(&draft, &ready_uploads(), LoanType::RegularWithCollateral);

    assert_eq!(
        missing,
        [
            "Collateral Type",
            "Collateral Description",
            "Proof of Ownership",
            "Estimated Value",
            "Supporting Documents (4 of 6 files)",
        ]
    );
}

#[test]
fn excess_documents_are_flagged_too() {
    let mut uploads = ready_uploads();
    uploads.documents.push(pdf_file("extra.pdf"));

    let missing = missing_fields(
        &complete_draft(),
        &uploads,
        LoanType::RegularWithoutCollateral,
    );
    assert_eq!(missing, ["Supporting Documents (5 of 4 files)"]);
}

#[test]
fn progress_buckets_labels_into_their_sections() {
    let mut draft = complete_draft();
    draft.contact_number.clear();
    draft.loan_amount = 0;
    let mut uploads = ready_uploads();
    uploads.profile_photo = None;

    let progress = compute_progress(&draft, &uploads, LoanType::RegularWithoutCollateral);

    assert!(!progress.ready);
    let basic = &progress.sections[&Section::BasicInfo];
    assert!(!basic.done);
    assert_eq!(basic.missing_count, 1);
    assert_eq!(basic.missing_details, ["Contact Number"]);

    assert!(!progress.sections[&Section::Photo2x2].done);
    assert!(!progress.sections[&Section::LoanDetails].done);
    assert!(progress.sections[&Section::Income].done);
    assert!(progress.sections[&Section::Collateral].done);
}

#[test]
fn tracker_reports_a_snapshot_only_when_it_changes() {
    let mut tracker = ProgressTracker::default();
    let first = compute_progress(
        &ApplicationDraft::default(),
        &UploadSet::default(),
        LoanType::RegularWithoutCollateral,
    );

    assert!(tracker.update(first.clone()).is_some());
    assert!(tracker.update(first).is_none());

    let changed = compute_progress(
        &complete_draft(),
        &ready_uploads(),
        LoanType::RegularWithoutCollateral,
    );
    let update = tracker.update(changed).expect("snapshot changed");
    assert!(update.ready);
    assert_eq!(tracker.current().map(|snapshot| snapshot.ready), Some(true));
}
