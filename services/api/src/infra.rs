use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use loan_portal::workflows::loans::LoanType;
use loan_portal::workflows::reloan::{
    AgentSummary, BackendError, DraftEnvelope, DraftStore, EventError, LatestApplication,
    LendingBackend, PortalEvent, PortalEventPublisher, ProgressSink, Reference, StatusSnapshot,
    StoreError, StoredDocument, SubmissionReceipt, SubmissionRequest, UploadedFile,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Event sink for the served binary: milestones land in the service
/// log. A push channel to the browser would slot in here instead.
pub(crate) struct LogEventPublisher;

impl PortalEventPublisher for LogEventPublisher {
    fn publish(&self, event: PortalEvent) -> Result<(), EventError> {
        match &event {
            PortalEvent::ProgressChanged {
                borrowers_id,
                missing_count,
                ready,
            } => info!(%borrowers_id, missing_count, ready, "application progress changed"),
            PortalEvent::UploadProgress {
                borrowers_id,
                percent,
            } => info!(%borrowers_id, percent, "submission upload progress"),
            PortalEvent::ApplicationSubmitted {
                borrowers_id,
                application_id,
            } => info!(%borrowers_id, %application_id, "application submitted"),
            PortalEvent::ApplicationUpdated {
                borrowers_id,
                application_id,
                status,
            } => info!(%borrowers_id, %application_id, %status, "application status changed"),
            PortalEvent::DraftCleared { borrowers_id } => {
                info!(%borrowers_id, "saved draft cleared")
            }
        }
        Ok(())
    }
}

/// Draft storage for demo runs; the served binary uses the file store.
#[derive(Default)]
pub(crate) struct InMemoryDraftStore {
    drafts: Mutex<HashMap<String, DraftEnvelope>>,
    loan_types: Mutex<HashMap<String, LoanType>>,
}

impl DraftStore for InMemoryDraftStore {
    fn load_draft(&self, borrowers_id: &str) -> Result<Option<DraftEnvelope>, StoreError> {
        let guard = self.drafts.lock().expect("draft mutex poisoned");
        Ok(guard.get(borrowers_id).cloned())
    }

    fn save_draft(&self, borrowers_id: &str, envelope: &DraftEnvelope) -> Result<(), StoreError> {
        let mut guard = self.drafts.lock().expect("draft mutex poisoned");
        guard.insert(borrowers_id.to_string(), envelope.clone());
        Ok(())
    }

    fn clear_draft(&self, borrowers_id: &str) -> Result<(), StoreError> {
        let mut guard = self.drafts.lock().expect("draft mutex poisoned");
        guard.remove(borrowers_id);
        Ok(())
    }

    fn load_loan_type(&self, borrowers_id: &str) -> Result<Option<LoanType>, StoreError> {
        let guard = self.loan_types.lock().expect("loan type mutex poisoned");
        Ok(guard.get(borrowers_id).copied())
    }

    fn save_loan_type(&self, borrowers_id: &str, loan_type: LoanType) -> Result<(), StoreError> {
        let mut guard = self.loan_types.lock().expect("loan type mutex poisoned");
        guard.insert(borrowers_id.to_string(), loan_type);
        Ok(())
    }

    fn clear_loan_type(&self, borrowers_id: &str) -> Result<(), StoreError> {
        let mut guard = self.loan_types.lock().expect("loan type mutex poisoned");
        guard.remove(borrowers_id);
        Ok(())
    }
}

/// Collects portal events so the demo can print them afterwards.
#[derive(Default)]
pub(crate) struct DemoEventLog {
    events: Mutex<Vec<PortalEvent>>,
}

impl DemoEventLog {
    pub(crate) fn events(&self) -> Vec<PortalEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl PortalEventPublisher for DemoEventLog {
    fn publish(&self, event: PortalEvent) -> Result<(), EventError> {
        let mut guard = self.events.lock().expect("event mutex poisoned");
        guard.push(event);
        Ok(())
    }
}

pub(crate) fn demo_png(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
    }
}

pub(crate) fn demo_pdf(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.4 demo".to_vec(),
    }
}

/// Lending backend double with one borrower on file, so the demo runs
/// without the institution's core system.
pub(crate) struct DemoBackend {
    downloads: HashMap<String, UploadedFile>,
    submissions: Mutex<Vec<SubmissionRequest>>,
}

impl DemoBackend {
    pub(crate) fn with_sample_borrower() -> Self {
        let mut downloads = HashMap::new();
        downloads.insert(
            "uploads/photos/demo-2x2.png".to_string(),
            demo_png("demo-2x2.png"),
        );
        downloads.insert(
            "uploads/docs/demo-payslip.pdf".to_string(),
            demo_pdf("demo-payslip.pdf"),
        );
        downloads.insert(
            "uploads/docs/demo-valid-id.pdf".to_string(),
            demo_pdf("demo-valid-id.pdf"),
        );
        Self {
            downloads,
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn recorded_submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions
            .lock()
            .expect("submission mutex poisoned")
            .clone()
    }

    fn sample_application() -> LatestApplication {
        LatestApplication {
            full_name: "Amparo Villanueva".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 7, 23),
            contact_number: "09175550101".to_string(),
            email_address: "amparo.v@example.ph".to_string(),
            marital_status: "Single".to_string(),
            home_address: "44 Burgos St, Naga City".to_string(),
            income_source: "Employment".to_string(),
            employer_name: "Bicol Transit Cooperative".to_string(),
            occupation: "Dispatcher".to_string(),
            monthly_income: 32_000.0,
            app_references: vec![
                Reference {
                    name: "Lourdes Ramos".to_string(),
                    contact_number: "09175550102".to_string(),
                    relation: "Aunt".to_string(),
                },
                Reference {
                    name: "Benjie Soriano".to_string(),
                    contact_number: "09175550103".to_string(),
                    relation: "Coworker".to_string(),
                },
                Reference {
                    name: "Pilar Custodio".to_string(),
                    contact_number: "09175550104".to_string(),
                    relation: "Neighbor".to_string(),
                },
            ],
            agent: Some("AGT-021".to_string()),
            loan_purpose: "Motorcycle downpayment".to_string(),
            profile_pic_url: "uploads/photos/demo-2x2.png".to_string(),
            documents: vec![
                StoredDocument {
                    file_name: "demo-payslip.pdf".to_string(),
                    path: "uploads/docs/demo-payslip.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                },
                StoredDocument {
                    file_name: "demo-valid-id.pdf".to_string(),
                    path: "uploads/docs/demo-valid-id.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                },
            ],
            ..LatestApplication::default()
        }
    }
}

#[async_trait]
impl LendingBackend for DemoBackend {
    async fn latest_application(
        &self,
        _borrowers_id: &str,
    ) -> Result<Option<LatestApplication>, BackendError> {
        Ok(Some(Self::sample_application()))
    }

    async fn borrower_balance(&self, _borrowers_id: &str) -> Result<f64, BackendError> {
        Ok(2_500.0)
    }

    async fn agent_names(&self) -> Result<Vec<AgentSummary>, BackendError> {
        Ok(vec![AgentSummary {
            agent_id: "AGT-021".to_string(),
            name: "Teresa Gallardo".to_string(),
        }])
    }

    async fn download(&self, location: &str) -> Result<UploadedFile, BackendError> {
        self.downloads
            .get(location)
            .cloned()
            .ok_or_else(|| BackendError::Http {
                status: 404,
                message: format!("no stored file at {location}"),
            })
    }

    async fn submit_application(
        &self,
        request: SubmissionRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmissionReceipt, BackendError> {
        progress.report(50);
        progress.report(100);
        let mut guard = self.submissions.lock().expect("submission mutex poisoned");
        guard.push(request);
        Ok(SubmissionReceipt {
            application_id: "APP-DEMO-1".to_string(),
        })
    }

    async fn application_status(
        &self,
        _application_id: &str,
    ) -> Result<StatusSnapshot, BackendError> {
        Ok(StatusSnapshot {
            status: "Accepted".to_string(),
        })
    }
}
