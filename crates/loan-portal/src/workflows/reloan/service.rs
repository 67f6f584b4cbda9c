//! Orchestration for the re-application workflow.
//!
//! One [`ReloanService`] owns the per-borrower sessions: staged
//! uploads, the reuse pool, the cached balance, progress tracking and
//! the submission state machine. Draft text lives in the
//! [`DraftStore`]; everything binary stays in memory for the session.
//! Store and event failures degrade to warnings, only backend and
//! document problems surface to callers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::ConsentConfig;
use crate::workflows::loans::{quote, BalanceDecision, LoanType};
use crate::workflows::reloan::backend::{
    AgentSummary, BackendError, LendingBackend, ProgressSink,
};
use crate::workflows::reloan::draft::{ApplicationDraft, PreviousUploads, UploadSet, UploadedFile};
use crate::workflows::reloan::events::{PortalEvent, PortalEventPublisher};
use crate::workflows::reloan::prefill::{
    accept_profile_photo, fetch_prefill, fetch_previous_document, fetch_previous_profile,
    DocumentError,
};
use crate::workflows::reloan::store::{DraftEnvelope, DraftStore};
use crate::workflows::reloan::submission::{
    build_submission_request, watch_application_status, SubmissionFailure, SubmissionState,
    GENERIC_SUBMIT_ERROR, STATUS_POLL_ATTEMPTS, STATUS_POLL_INTERVAL,
};
use crate::workflows::reloan::validation::{compute_progress, missing_fields, ProgressSnapshot, ProgressTracker};

#[derive(Debug, Error)]
pub enum ReloanServiceError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("a submission is already in progress")]
    SubmissionInFlight,
}

/// Everything the form needs to render, in one payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub draft: ApplicationDraft,
    pub loan_type: LoanType,
    pub previous_uploads: PreviousUploads,
    pub progress: ProgressSnapshot,
}

/// Session-scoped state for one borrower.
#[derive(Debug, Default)]
struct BorrowerSession {
    uploads: UploadSet,
    previous: PreviousUploads,
    previous_balance: u64,
    tracker: ProgressTracker,
    submission: SubmissionState,
}

pub struct ReloanService<S, B, E> {
    store: Arc<S>,
    backend: Arc<B>,
    events: Arc<E>,
    consent: ConsentConfig,
    sessions: Arc<Mutex<HashMap<String, BorrowerSession>>>,
}

impl<S, B, E> ReloanService<S, B, E>
where
    S: DraftStore,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    pub fn new(store: Arc<S>, backend: Arc<B>, events: Arc<E>, consent: ConsentConfig) -> Self {
        Self {
            store,
            backend,
            events,
            consent,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current draft, loan type, reuse pool and progress for the form.
    pub fn load(&self, borrowers_id: &str) -> DraftView {
        let (draft, loan_type) = self.load_draft_parts(borrowers_id);
        let (uploads, previous) = self.with_session(borrowers_id, |session| {
            (session.uploads.clone(), session.previous.clone())
        });
        let progress = compute_progress(&draft, &uploads, loan_type);
        DraftView {
            draft,
            loan_type,
            previous_uploads: previous,
            progress,
        }
    }

    /// Persist an edited draft. Storage trouble is logged, never fatal:
    /// the in-flight copy keeps working and the next save retries.
    pub fn save(
        &self,
        borrowers_id: &str,
        draft: ApplicationDraft,
        loan_type: Option<LoanType>,
    ) -> DraftView {
        if let Err(err) = self
            .store
            .save_draft(borrowers_id, &DraftEnvelope::current(draft.clone()))
        {
            warn!(%err, "draft not persisted");
        }
        if let Some(loan_type) = loan_type {
            if let Err(err) = self.store.save_loan_type(borrowers_id, loan_type) {
                warn!(%err, "loan type not persisted");
            }
        }

        let effective = loan_type.unwrap_or_else(|| self.stored_loan_type(borrowers_id));
        let progress = self.refresh_progress(borrowers_id, &draft, effective);
        let previous = self.with_session(borrowers_id, |session| session.previous.clone());
        DraftView {
            draft,
            loan_type: effective,
            previous_uploads: previous,
            progress,
        }
    }

    /// Drop the saved draft, the remembered loan type and the session.
    pub fn clear(&self, borrowers_id: &str) {
        if let Err(err) = self.store.clear_draft(borrowers_id) {
            warn!(%err, "draft not cleared");
        }
        if let Err(err) = self.store.clear_loan_type(borrowers_id) {
            warn!(%err, "loan type not cleared");
        }
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .remove(borrowers_id);
        self.emit(PortalEvent::DraftCleared {
            borrowers_id: borrowers_id.to_string(),
        });
    }

    /// Seed the form from the borrower's previous application. Saved
    /// work overlays the seed, and the outstanding balance is cached
    /// for quoting. `None` when the backend has no application on file.
    pub async fn prefill(
        &self,
        borrowers_id: &str,
    ) -> Result<Option<DraftView>, ReloanServiceError> {
        let bundle = match fetch_prefill(self.backend.as_ref(), borrowers_id).await? {
            Some(bundle) => bundle,
            None => return Ok(None),
        };

        let balance = match self.backend.borrower_balance(borrowers_id).await {
            Ok(balance) => Some(balance.max(0.0).round() as u64),
            Err(err) => {
                debug!(%err, "balance unavailable during prefill");
                None
            }
        };

        let (saved, loan_type) = self.load_draft_parts(borrowers_id);
        let mut draft = bundle.draft;
        draft.hydrate_from(saved);

        self.with_session(borrowers_id, |session| {
            session.previous = bundle.previous.clone();
            if let Some(balance) = balance {
                session.previous_balance = balance;
            }
        });

        if let Err(err) = self
            .store
            .save_draft(borrowers_id, &DraftEnvelope::current(draft.clone()))
        {
            warn!(%err, "prefilled draft not persisted");
        }

        let progress = self.refresh_progress(borrowers_id, &draft, loan_type);
        Ok(Some(DraftView {
            draft,
            loan_type,
            previous_uploads: bundle.previous,
            progress,
        }))
    }

    /// Re-read the outstanding balance and refresh the cached figure.
    pub async fn refresh_balance(&self, borrowers_id: &str) -> Result<f64, ReloanServiceError> {
        let balance = self.backend.borrower_balance(borrowers_id).await?;
        let rounded = balance.max(0.0).round() as u64;
        self.with_session(borrowers_id, |session| {
            session.previous_balance = rounded;
        });
        Ok(balance)
    }

    pub async fn agents(&self) -> Result<Vec<AgentSummary>, ReloanServiceError> {
        Ok(self.backend.agent_names().await?)
    }

    /// Stage a freshly uploaded 2x2 photo.
    pub fn attach_profile_photo(
        &self,
        borrowers_id: &str,
        file: UploadedFile,
    ) -> Result<ProgressSnapshot, ReloanServiceError> {
        let accepted = accept_profile_photo(file)?;
        self.with_session(borrowers_id, |session| {
            session.uploads.profile_photo = Some(accepted);
        });
        Ok(self.progress(borrowers_id))
    }

    /// Stage freshly uploaded supporting documents, in arrival order.
    pub fn attach_documents(
        &self,
        borrowers_id: &str,
        files: Vec<UploadedFile>,
    ) -> ProgressSnapshot {
        self.with_session(borrowers_id, |session| {
            session.uploads.documents.extend(files);
        });
        self.progress(borrowers_id)
    }

    pub fn remove_document(
        &self,
        borrowers_id: &str,
        index: usize,
    ) -> Result<ProgressSnapshot, ReloanServiceError> {
        let removed = self.with_session(borrowers_id, |session| {
            if index < session.uploads.documents.len() {
                session.uploads.documents.remove(index);
                true
            } else {
                false
            }
        });
        if !removed {
            return Err(DocumentError::NoSuchDocument(index).into());
        }
        Ok(self.progress(borrowers_id))
    }

    /// Pull the previous 2x2 photo into the staged uploads. The pool
    /// entry is consumed on success.
    pub async fn reuse_previous_photo(
        &self,
        borrowers_id: &str,
    ) -> Result<ProgressSnapshot, ReloanServiceError> {
        let previous = self.with_session(borrowers_id, |session| session.previous.clone());
        let file = fetch_previous_profile(self.backend.as_ref(), &previous).await?;
        self.with_session(borrowers_id, |session| {
            session.uploads.profile_photo = Some(file);
            session.previous.profile_photo_url = None;
        });
        Ok(self.progress(borrowers_id))
    }

    /// Pull one stored document into the staged uploads, consuming its
    /// pool entry.
    pub async fn reuse_previous_document(
        &self,
        borrowers_id: &str,
        index: usize,
    ) -> Result<ProgressSnapshot, ReloanServiceError> {
        let document = self
            .with_session(borrowers_id, |session| {
                session.previous.documents.get(index).cloned()
            })
            .ok_or(DocumentError::NoSuchDocument(index))?;
        let file = fetch_previous_document(self.backend.as_ref(), &document).await?;
        self.with_session(borrowers_id, |session| {
            session.uploads.documents.push(file);
            if let Some(position) = session
                .previous
                .documents
                .iter()
                .position(|entry| *entry == document)
            {
                session.previous.documents.remove(position);
            }
        });
        Ok(self.progress(borrowers_id))
    }

    /// Recompute progress against the saved draft and staged uploads,
    /// announcing the change if there is one.
    pub fn progress(&self, borrowers_id: &str) -> ProgressSnapshot {
        let (draft, loan_type) = self.load_draft_parts(borrowers_id);
        self.refresh_progress(borrowers_id, &draft, loan_type)
    }

    pub fn submission_state(&self, borrowers_id: &str) -> SubmissionState {
        self.with_session(borrowers_id, |session| session.submission.clone())
    }

    /// Run the whole submission pipeline. Local failures keep the draft
    /// and report what is wrong; only a success clears stored state.
    pub async fn submit(&self, borrowers_id: &str) -> Result<SubmissionState, ReloanServiceError> {
        let started = self.with_session(borrowers_id, |session| {
            if session.submission.is_in_flight() {
                false
            } else {
                session.submission = SubmissionState::Validating;
                true
            }
        });
        if !started {
            return Err(ReloanServiceError::SubmissionInFlight);
        }

        let (draft, loan_type) = self.load_draft_parts(borrowers_id);
        let (uploads, previous_balance) = self.with_session(borrowers_id, |session| {
            (session.uploads.clone(), session.previous_balance)
        });

        let missing = missing_fields(&draft, &uploads, loan_type);
        if !missing.is_empty() {
            return Ok(self.fail_submission(
                borrowers_id,
                SubmissionFailure::MissingFields { fields: missing },
            ));
        }

        let decision = draft
            .balance_decision
            .unwrap_or(BalanceDecision::DeductFromProceeds);
        let quote = match quote(loan_type, draft.loan_amount, previous_balance, decision) {
            Ok(quote) => quote,
            Err(err) => return Ok(self.fail_submission(borrowers_id, err.into())),
        };

        self.set_submission(borrowers_id, SubmissionState::Uploading { percent: 0 });
        let request = build_submission_request(
            borrowers_id,
            &draft,
            loan_type,
            &uploads,
            &quote,
            &self.consent,
            Utc::now(),
        );
        let sink: Arc<dyn ProgressSink> = Arc::new(PipelineProgress {
            events: Arc::clone(&self.events),
            sessions: Arc::clone(&self.sessions),
            borrowers_id: borrowers_id.to_string(),
        });

        match self.backend.submit_application(request, sink).await {
            Ok(receipt) => {
                if let Err(err) = self.store.clear_draft(borrowers_id) {
                    warn!(%err, "submitted draft not cleared");
                }
                if let Err(err) = self.store.clear_loan_type(borrowers_id) {
                    warn!(%err, "submitted loan type not cleared");
                }
                self.emit(PortalEvent::ApplicationSubmitted {
                    borrowers_id: borrowers_id.to_string(),
                    application_id: receipt.application_id.clone(),
                });
                let state = SubmissionState::Succeeded {
                    application_id: receipt.application_id.clone(),
                };
                self.set_submission(borrowers_id, state.clone());
                self.spawn_status_watch(borrowers_id.to_string(), receipt.application_id);
                Ok(state)
            }
            Err(err) => {
                let message = match err.remote_message() {
                    Some(message) => message.to_string(),
                    None => {
                        error!(%err, "submission failed");
                        GENERIC_SUBMIT_ERROR.to_string()
                    }
                };
                Ok(self.fail_submission(borrowers_id, SubmissionFailure::Remote { message }))
            }
        }
    }

    fn with_session<T>(&self, borrowers_id: &str, action: impl FnOnce(&mut BorrowerSession) -> T) -> T {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.entry(borrowers_id.to_string()).or_default();
        action(session)
    }

    /// Saved draft and loan type, with stale or unreadable payloads
    /// degraded to defaults.
    fn load_draft_parts(&self, borrowers_id: &str) -> (ApplicationDraft, LoanType) {
        let mut draft = ApplicationDraft::default();
        match self.store.load_draft(borrowers_id) {
            Ok(Some(envelope)) if envelope.is_current() => draft.hydrate_from(envelope.draft),
            Ok(Some(envelope)) => {
                warn!(
                    schema_version = envelope.schema_version,
                    "discarding saved draft from an older schema"
                );
            }
            Ok(None) => {}
            Err(err) => warn!(%err, "saved draft unreadable"),
        }
        (draft, self.stored_loan_type(borrowers_id))
    }

    fn stored_loan_type(&self, borrowers_id: &str) -> LoanType {
        match self.store.load_loan_type(borrowers_id) {
            Ok(Some(loan_type)) => loan_type,
            Ok(None) => LoanType::default(),
            Err(err) => {
                warn!(%err, "saved loan type unreadable");
                LoanType::default()
            }
        }
    }

    fn refresh_progress(
        &self,
        borrowers_id: &str,
        draft: &ApplicationDraft,
        loan_type: LoanType,
    ) -> ProgressSnapshot {
        let (snapshot, changed) = self.with_session(borrowers_id, |session| {
            let snapshot = compute_progress(draft, &session.uploads, loan_type);
            let changed = session.tracker.update(snapshot.clone());
            (snapshot, changed)
        });
        if let Some(update) = changed {
            self.emit(PortalEvent::ProgressChanged {
                borrowers_id: borrowers_id.to_string(),
                missing_count: update.missing_fields.len(),
                ready: update.ready,
            });
        }
        snapshot
    }

    fn set_submission(&self, borrowers_id: &str, state: SubmissionState) {
        self.with_session(borrowers_id, |session| session.submission = state);
    }

    fn fail_submission(&self, borrowers_id: &str, failure: SubmissionFailure) -> SubmissionState {
        let state = SubmissionState::Failed { failure };
        self.set_submission(borrowers_id, state.clone());
        state
    }

    fn spawn_status_watch(&self, borrowers_id: String, application_id: String) {
        tokio::spawn(watch_application_status(
            Arc::clone(&self.backend),
            Arc::clone(&self.events),
            borrowers_id,
            application_id,
            STATUS_POLL_ATTEMPTS,
            STATUS_POLL_INTERVAL,
        ));
    }

    fn emit(&self, event: PortalEvent) {
        if let Err(err) = self.events.publish(event) {
            warn!(%err, "portal event dropped");
        }
    }
}

/// Mirrors upload percentages into the submission state and out to the
/// event publisher while the transfer streams.
struct PipelineProgress<E> {
    events: Arc<E>,
    sessions: Arc<Mutex<HashMap<String, BorrowerSession>>>,
    borrowers_id: String,
}

impl<E> ProgressSink for PipelineProgress<E>
where
    E: PortalEventPublisher,
{
    fn report(&self, percent: u8) {
        let state = if percent >= 100 {
            SubmissionState::AwaitingServer
        } else {
            SubmissionState::Uploading { percent }
        };
        {
            let mut sessions = self.sessions.lock().expect("session mutex poisoned");
            if let Some(session) = sessions.get_mut(&self.borrowers_id) {
                session.submission = state;
            }
        }
        if let Err(err) = self.events.publish(PortalEvent::UploadProgress {
            borrowers_id: self.borrowers_id.clone(),
            percent,
        }) {
            warn!(%err, "portal event dropped");
        }
    }
}
