use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::ConsentConfig;
use crate::workflows::loans::{BalanceDecision, LoanType};
use crate::workflows::reloan::backend::{
    AgentSummary, BackendError, LatestApplication, LendingBackend, ProgressSink, StatusSnapshot,
    SubmissionReceipt, SubmissionRequest,
};
use crate::workflows::reloan::draft::{
    AgentChoice, ApplicationDraft, IncomeSource, MaritalStatus, Reference, StoredDocument,
    UploadSet, UploadedFile,
};
use crate::workflows::reloan::events::{EventError, PortalEvent, PortalEventPublisher};
use crate::workflows::reloan::router::reloan_router;
use crate::workflows::reloan::service::ReloanService;
use crate::workflows::reloan::store::{DraftEnvelope, DraftStore, StoreError};

pub(super) const BORROWER: &str = "b-1001";

pub(super) const PREVIOUS_PHOTO_URL: &str = "uploads/photos/prev-2x2.png";
pub(super) const PREVIOUS_DOC_PATH: &str = "uploads/docs/prev-payslip.pdf";

pub(super) fn consent_config() -> ConsentConfig {
    ConsentConfig {
        company_name: "Provident Lending Corporation".to_string(),
        terms_version: "2024-06".to_string(),
        privacy_version: "2024-06".to_string(),
    }
}

/// A draft that passes every check for a regular loan without
/// collateral.
pub(super) fn complete_draft() -> ApplicationDraft {
    ApplicationDraft {
        full_name: "Maria Clara Santos".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1992, 3, 14),
        contact_number: "09171234567".to_string(),
        email_address: "maria.santos@example.com".to_string(),
        marital_status: Some(MaritalStatus::Single),
        home_address: "12 Rizal Ave, Iloilo City".to_string(),
        income_source: Some(IncomeSource::Employment),
        employer_name: "Iloilo Fisheries Inc".to_string(),
        occupation: "Accountant".to_string(),
        monthly_income: 45_000.0,
        references: vec![
            Reference {
                name: "Lina Uy".to_string(),
                contact_number: "09170001111".to_string(),
                relation: "Cousin".to_string(),
            },
            Reference {
                name: "Ramon Torres".to_string(),
                contact_number: "09170002222".to_string(),
                relation: "Neighbor".to_string(),
            },
            Reference {
                name: "Cora Velasquez".to_string(),
                contact_number: "09170003333".to_string(),
                relation: "Coworker".to_string(),
            },
        ],
        agent: Some(AgentChoice::NoAgent),
        loan_purpose: "Working capital".to_string(),
        loan_amount: 20_000,
        balance_decision: Some(BalanceDecision::DeductFromProceeds),
        ..ApplicationDraft::default()
    }
}

pub(super) fn image_file(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![137, 80, 78, 71, 13, 10, 26, 10],
    }
}

pub(super) fn pdf_file(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.4 test".to_vec(),
    }
}

/// Photo plus the four documents a regular unsecured loan needs.
pub(super) fn ready_uploads() -> UploadSet {
    UploadSet {
        profile_photo: Some(image_file("2x2.png")),
        documents: vec![
            pdf_file("valid-id.pdf"),
            pdf_file("payslip-1.pdf"),
            pdf_file("payslip-2.pdf"),
            pdf_file("proof-of-billing.pdf"),
        ],
    }
}

pub(super) fn stub_latest() -> LatestApplication {
    LatestApplication {
        full_name: "Maria Clara Santos".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1992, 3, 14),
        contact_number: "09171234567".to_string(),
        email_address: "maria.santos@example.com".to_string(),
        marital_status: "Single".to_string(),
        home_address: "12 Rizal Ave, Iloilo City".to_string(),
        income_source: "Employment".to_string(),
        employer_name: "Iloilo Fisheries Inc".to_string(),
        occupation: "Accountant".to_string(),
        monthly_income: 45_000.0,
        app_references: complete_draft().references,
        agent: Some("AGT-012".to_string()),
        loan_purpose: "Sari-sari store expansion".to_string(),
        profile_pic_url: PREVIOUS_PHOTO_URL.to_string(),
        documents: vec![
            StoredDocument {
                file_name: "prev-payslip.pdf".to_string(),
                path: PREVIOUS_DOC_PATH.to_string(),
                mime_type: "application/pdf".to_string(),
            },
            StoredDocument {
                file_name: "prev-id.png".to_string(),
                path: "uploads/docs/prev-id.png".to_string(),
                mime_type: "image/png".to_string(),
            },
        ],
        ..LatestApplication::default()
    }
}

#[derive(Default)]
pub(super) struct MemoryDraftStore {
    drafts: Mutex<HashMap<String, DraftEnvelope>>,
    loan_types: Mutex<HashMap<String, LoanType>>,
}

impl DraftStore for MemoryDraftStore {
    fn load_draft(&self, borrowers_id: &str) -> Result<Option<DraftEnvelope>, StoreError> {
        let guard = self.drafts.lock().expect("draft store mutex poisoned");
        Ok(guard.get(borrowers_id).cloned())
    }

    fn save_draft(&self, borrowers_id: &str, envelope: &DraftEnvelope) -> Result<(), StoreError> {
        let mut guard = self.drafts.lock().expect("draft store mutex poisoned");
        guard.insert(borrowers_id.to_string(), envelope.clone());
        Ok(())
    }

    fn clear_draft(&self, borrowers_id: &str) -> Result<(), StoreError> {
        let mut guard = self.drafts.lock().expect("draft store mutex poisoned");
        guard.remove(borrowers_id);
        Ok(())
    }

    fn load_loan_type(&self, borrowers_id: &str) -> Result<Option<LoanType>, StoreError> {
        let guard = self.loan_types.lock().expect("draft store mutex poisoned");
        Ok(guard.get(borrowers_id).copied())
    }

    fn save_loan_type(&self, borrowers_id: &str, loan_type: LoanType) -> Result<(), StoreError> {
        let mut guard = self.loan_types.lock().expect("draft store mutex poisoned");
        guard.insert(borrowers_id.to_string(), loan_type);
        Ok(())
    }

    fn clear_loan_type(&self, borrowers_id: &str) -> Result<(), StoreError> {
        let mut guard = self.loan_types.lock().expect("draft store mutex poisoned");
        guard.remove(borrowers_id);
        Ok(())
    }
}

/// Canned lending backend with a previous application on file and the
/// stored files downloadable.
pub(super) struct StubBackend {
    pub(super) latest: Mutex<Option<LatestApplication>>,
    pub(super) balance: Mutex<f64>,
    pub(super) agents: Vec<AgentSummary>,
    pub(super) downloads: Mutex<HashMap<String, UploadedFile>>,
    pub(super) submissions: Mutex<Vec<SubmissionRequest>>,
    pub(super) submit_failure: Mutex<Option<BackendError>>,
    pub(super) statuses: Mutex<Vec<String>>,
}

impl StubBackend {
    pub(super) fn with_history() -> Self {
        let mut downloads = HashMap::new();
        downloads.insert(PREVIOUS_PHOTO_URL.to_string(), image_file("prev-2x2.png"));
        downloads.insert(PREVIOUS_DOC_PATH.to_string(), pdf_file("prev-payslip.pdf"));
        downloads.insert(
            "uploads/docs/prev-id.png".to_string(),
            image_file("prev-id.png"),
        );

        Self {
            latest: Mutex::new(Some(stub_latest())),
            balance: Mutex::new(5_000.0),
            agents: vec![
                AgentSummary {
                    agent_id: "AGT-012".to_string(),
                    name: "Ramon Cruz".to_string(),
                },
                AgentSummary {
                    agent_id: "AGT-044".to_string(),
                    name: "Nora Villar".to_string(),
                },
            ],
            downloads: Mutex::new(downloads),
            submissions: Mutex::new(Vec::new()),
            submit_failure: Mutex::new(None),
            statuses: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn recorded_submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions
            .lock()
            .expect("submission mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl LendingBackend for StubBackend {
    async fn latest_application(
        &self,
        _borrowers_id: &str,
    ) -> Result<Option<LatestApplication>, BackendError> {
        Ok(self.latest.lock().expect("latest mutex poisoned").clone())
    }

    async fn borrower_balance(&self, _borrowers_id: &str) -> Result<f64, BackendError> {
        Ok(*self.balance.lock().expect("balance mutex poisoned"))
    }

    async fn agent_names(&self) -> Result<Vec<AgentSummary>, BackendError> {
        Ok(self.agents.clone())
    }

    async fn download(&self, location: &str) -> Result<UploadedFile, BackendError> {
        self.downloads
            .lock()
            .expect("download mutex poisoned")
            .get(location)
            .cloned()
            .ok_or(BackendError::Http {
                status: 404,
                message: format!("no stored file at {location}"),
            })
    }

    async fn submit_application(
        &self,
        request: SubmissionRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmissionReceipt, BackendError> {
        if let Some(err) = self
            .submit_failure
            .lock()
            .expect("failure mutex poisoned")
            .take()
        {
            return Err(err);
        }
        progress.report(50);
        progress.report(100);
        self.submissions
            .lock()
            .expect("submission mutex poisoned")
            .push(request);
        Ok(SubmissionReceipt {
            application_id: "APP-2024-77".to_string(),
        })
    }

    async fn application_status(
        &self,
        _application_id: &str,
    ) -> Result<StatusSnapshot, BackendError> {
        let mut statuses = self.statuses.lock().expect("status mutex poisoned");
        let status = if statuses.is_empty() {
            "Pending".to_string()
        } else {
            statuses.remove(0)
        };
        Ok(StatusSnapshot { status })
    }
}

/// Backend for a borrower with no application on file.
pub(super) struct EmptyBackend;

#[async_trait]
impl LendingBackend for EmptyBackend {
    async fn latest_application(
        &self,
        _borrowers_id: &str,
    ) -> Result<Option<LatestApplication>, BackendError> {
        Ok(None)
    }

    async fn borrower_balance(&self, _borrowers_id: &str) -> Result<f64, BackendError> {
        Ok(0.0)
    }

    async fn agent_names(&self) -> Result<Vec<AgentSummary>, BackendError> {
        Ok(Vec::new())
    }

    async fn download(&self, location: &str) -> Result<UploadedFile, BackendError> {
        Err(BackendError::Http {
            status: 404,
            message: format!("no stored file at {location}"),
        })
    }

    async fn submit_application(
        &self,
        _request: SubmissionRequest,
        _progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmissionReceipt, BackendError> {
        Err(BackendError::Http {
            status: 503,
            message: "lending core offline".to_string(),
        })
    }

    async fn application_status(
        &self,
        _application_id: &str,
    ) -> Result<StatusSnapshot, BackendError> {
        Ok(StatusSnapshot {
            status: "Pending".to_string(),
        })
    }
}

/// Backend whose submission stalls long enough to observe the in-flight
/// guard.
pub(super) struct SlowBackend;

#[async_trait]
impl LendingBackend for SlowBackend {
    async fn latest_application(
        &self,
        _borrowers_id: &str,
    ) -> Result<Option<LatestApplication>, BackendError> {
        Ok(None)
    }

    async fn borrower_balance(&self, _borrowers_id: &str) -> Result<f64, BackendError> {
        Ok(0.0)
    }

    async fn agent_names(&self) -> Result<Vec<AgentSummary>, BackendError> {
        Ok(Vec::new())
    }

    async fn download(&self, location: &str) -> Result<UploadedFile, BackendError> {
        Err(BackendError::Http {
            status: 404,
            message: format!("no stored file at {location}"),
        })
    }

    async fn submit_application(
        &self,
        _request: SubmissionRequest,
        _progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmissionReceipt, BackendError> {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        Ok(SubmissionReceipt {
            application_id: "APP-SLOW-1".to_string(),
        })
    }

    async fn application_status(
        &self,
        _application_id: &str,
    ) -> Result<StatusSnapshot, BackendError> {
        Ok(StatusSnapshot {
            status: "Pending".to_string(),
        })
    }
}

#[derive(Default)]
pub(super) struct CollectingEvents {
    events: Mutex<Vec<PortalEvent>>,
}

impl CollectingEvents {
    pub(super) fn events(&self) -> Vec<PortalEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl PortalEventPublisher for CollectingEvents {
    fn publish(&self, event: PortalEvent) -> Result<(), EventError> {
        self.events.lock().expect("event mutex poisoned").push(event);
        Ok(())
    }
}

pub(super) fn build_service() -> (
    ReloanService<MemoryDraftStore, StubBackend, CollectingEvents>,
    Arc<MemoryDraftStore>,
    Arc<StubBackend>,
    Arc<CollectingEvents>,
) {
    let store = Arc::new(MemoryDraftStore::default());
    let backend = Arc::new(StubBackend::with_history());
    let events = Arc::new(CollectingEvents::default());
    let service = ReloanService::new(
        store.clone(),
        backend.clone(),
        events.clone(),
        consent_config(),
    );
    (service, store, backend, events)
}

pub(super) fn portal_router(
    service: ReloanService<MemoryDraftStore, StubBackend, CollectingEvents>,
) -> axum::Router {
    reloan_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
