use std::sync::Arc;
use std::time::Duration;

use super::common::*;

use crate::workflows::reloan::backend::BackendError;
use crate::workflows::reloan::events::PortalEvent;
use crate::workflows::reloan::service::{ReloanService, ReloanServiceError};
use crate::workflows::reloan::store::DraftStore;
use crate::workflows::reloan::submission::{
    watch_application_status, SubmissionFailure, SubmissionState, GENERIC_SUBMIT_ERROR,
};

fn stage_complete_application(
    service: &ReloanService<MemoryDraftStore, StubBackend, CollectingEvents>,
) {
    service.save(BORROWER, complete_draft(), None);
    let uploads = ready_uploads();
    service
        .attach_profile_photo(BORROWER, uploads.profile_photo.expect("fixture photo"))
        .expect("photo passes the gate");
    service.attach_documents(BORROWER, uploads.documents);
}

#[tokio::test]
async fn incomplete_drafts_fail_locally_without_a_network_call() {
    let (service, _, backend, _) = build_service();

    let state = service.submit(BORROWER).await.expect("pipeline runs");
    match &state {
        SubmissionState::Failed {
            failure: SubmissionFailure::MissingFields { fields },
        } => {
            assert!(fields.contains(&"Full Name".to_string()));
            assert!(fields.contains(&"2x2 Picture".to_string()));
        }
        other => panic!("expected a local failure, got {other:?}"),
    }

    assert!(backend.recorded_submissions().is_empty());
    assert_eq!(service.submission_state(BORROWER), state);
}

#[tokio::test]
async fn out_of_range_amounts_fail_before_upload() {
    let (service, _, backend, _) = build_service();
    stage_complete_application(&service);

    let mut draft = complete_draft();
    draft.loan_amount = 5_000;
    service.save(BORROWER, draft, None);

    let state = service.submit(BORROWER).await.expect("pipeline runs");
    match state {
        SubmissionState::Failed {
            failure: SubmissionFailure::AmountOutOfRange { min, max, .. },
        } => {
            assert_eq!((min, max), (10_000, 50_000));
        }
        other => panic!("expected a range failure, got {other:?}"),
    }
    assert!(backend.recorded_submissions().is_empty());
}

#[tokio::test]
async fn successful_submission_clears_saved_state_and_notifies() {
    let (service, store, backend, events) = build_service();
    stage_complete_application(&service);

    let state = service.submit(BORROWER).await.expect("pipeline runs");
    assert_eq!(
        state,
        SubmissionState::Succeeded {
            application_id: "APP-2024-77".to_string()
        }
    );

    assert!(store.load_draft(BORROWER).expect("store readable").is_none());
    assert!(store
        .load_loan_type(BORROWER)
        .expect("store readable")
        .is_none());

    let submissions = backend.recorded_submissions();
    assert_eq!(submissions.len(), 1);
    let request = &submissions[0];
    assert_eq!(request.path, "loan-applications/reloan/without-collateral");
    assert_eq!(request.documents.len(), 4);
    assert!(request.profile_photo.is_some());
    assert!(request
        .fields
        .iter()
        .any(|(name, value)| name == "loanAmount" && value == "20000"));

    let events = events.events();
    assert!(events.iter().any(|event| matches!(
        event,
        PortalEvent::UploadProgress { percent: 100, .. }
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        PortalEvent::ApplicationSubmitted { application_id, .. }
            if application_id == "APP-2024-77"
    )));
}

#[tokio::test]
async fn remote_failures_surface_the_backend_message_and_keep_the_draft() {
    let (service, store, backend, _) = build_service();
    stage_complete_application(&service);
    *backend.submit_failure.lock().expect("failure mutex poisoned") = Some(BackendError::Http {
        status: 500,
        message: "DB unavailable".to_string(),
    });

    let state = service.submit(BORROWER).await.expect("pipeline runs");
    assert_eq!(
        state,
        SubmissionState::Failed {
            failure: SubmissionFailure::Remote {
                message: "DB unavailable".to_string()
            }
        }
    );

    // The saved draft survives a remote rejection for a later retry.
    assert!(store.load_draft(BORROWER).expect("store readable").is_some());
}

#[tokio::test]
async fn remote_failures_without_a_message_use_the_fallback_text() {
    let (service, _, backend, _) = build_service();
    stage_complete_application(&service);
    *backend.submit_failure.lock().expect("failure mutex poisoned") = Some(BackendError::Http {
        status: 502,
        message: "   ".to_string(),
    });

    let state = service.submit(BORROWER).await.expect("pipeline runs");
    assert_eq!(
        state,
        SubmissionState::Failed {
            failure: SubmissionFailure::Remote {
                message: GENERIC_SUBMIT_ERROR.to_string()
            }
        }
    );
}

#[tokio::test]
async fn concurrent_submits_are_rejected_while_one_is_in_flight() {
    let store = Arc::new(MemoryDraftStore::default());
    let backend = Arc::new(SlowBackend);
    let events = Arc::new(CollectingEvents::default());
    let service = Arc::new(ReloanService::new(
        store,
        backend,
        events,
        consent_config(),
    ));

    service.save(BORROWER, complete_draft(), None);
    let uploads = ready_uploads();
    service
        .attach_profile_photo(BORROWER, uploads.profile_photo.expect("fixture photo"))
        .expect("photo passes the gate");
    service.attach_documents(BORROWER, uploads.documents);

    let racing = Arc::clone(&service);
    let first = tokio::spawn(async move { racing.submit(BORROWER).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    match service.submit(BORROWER).await {
        Err(ReloanServiceError::SubmissionInFlight) => {}
        other => panic!("expected the in-flight guard, got {other:?}"),
    }

    let state = first
        .await
        .expect("task joins")
        .expect("first submit completes");
    assert_eq!(
        state,
        SubmissionState::Succeeded {
            application_id: "APP-SLOW-1".to_string()
        }
    );
}

#[tokio::test]
async fn status_watch_publishes_accepted_transitions() {
    let backend = Arc::new(StubBackend::with_history());
    *backend.statuses.lock().expect("status mutex poisoned") = vec![
        "Pending".to_string(),
        "Pending".to_string(),
        "Accepted".to_string(),
    ];
    let events = Arc::new(CollectingEvents::default());

    watch_application_status(
        Arc::clone(&backend),
        Arc::clone(&events),
        BORROWER.to_string(),
        "APP-2024-77".to_string(),
        5,
        Duration::from_millis(1),
    )
    .await;

    let events = events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        PortalEvent::ApplicationUpdated {
            borrowers_id: BORROWER.to_string(),
            application_id: "APP-2024-77".to_string(),
            status: "Accepted".to_string(),
        }
    );
}

#[tokio::test]
async fn status_watch_gives_up_quietly_after_the_attempt_budget() {
    let backend = Arc::new(StubBackend::with_history());
    let events = Arc::new(CollectingEvents::default());

    // The stub keeps answering "Pending", so the budget runs out.
    watch_application_status(
        Arc::clone(&backend),
        Arc::clone(&events),
        BORROWER.to_string(),
        "APP-2024-77".to_string(),
        3,
        Duration::from_millis(1),
    )
    .await;

    assert!(events.events().is_empty());
}
