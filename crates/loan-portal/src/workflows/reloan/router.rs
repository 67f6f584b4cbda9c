//! HTTP surface for the re-application workflow.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::workflows::loans::{quote, BalanceDecision, LoanType};
use crate::workflows::reloan::backend::{BackendError, LendingBackend};
use crate::workflows::reloan::draft::{ApplicationDraft, UploadedFile};
use crate::workflows::reloan::events::PortalEventPublisher;
use crate::workflows::reloan::prefill::DocumentError;
use crate::workflows::reloan::service::{ReloanService, ReloanServiceError};
use crate::workflows::reloan::store::DraftStore;
use crate::workflows::reloan::submission::{SubmissionFailure, SubmissionState};

/// Multipart uploads top out well under this; the limit exists so a
/// runaway body cannot balloon memory.
const MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

pub fn reloan_router<S, B, E>(service: Arc<ReloanService<S, B, E>>) -> Router
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/reloan/:borrowers_id/draft",
            get(load_draft_handler::<S, B, E>)
                .put(save_draft_handler::<S, B, E>)
                .delete(clear_draft_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/prefill",
            post(prefill_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/progress",
            get(progress_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/balance",
            get(balance_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/uploads/photo",
            post(upload_photo_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/uploads/documents",
            post(upload_documents_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/uploads/documents/:index",
            axum::routing::delete(remove_document_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/reuse/photo",
            post(reuse_photo_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/reuse/documents/:index",
            post(reuse_document_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/submit",
            post(submit_handler::<S, B, E>),
        )
        .route(
            "/api/v1/reloan/:borrowers_id/submission",
            get(submission_handler::<S, B, E>),
        )
        .route("/api/v1/agents", get(agents_handler::<S, B, E>))
        .route("/api/v1/loans/simulate", post(simulate_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveDraftRequest {
    draft: ApplicationDraft,
    #[serde(default)]
    loan_type: Option<LoanType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimulateRequest {
    loan_type: LoanType,
    amount: u64,
    #[serde(default)]
    previous_balance: u64,
    #[serde(default)]
    balance_decision: Option<BalanceDecision>,
}

pub(crate) async fn load_draft_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    Json(service.load(&borrowers_id)).into_response()
}

pub(crate) async fn save_draft_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
    Json(request): Json<SaveDraftRequest>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    Json(service.save(&borrowers_id, request.draft, request.loan_type)).into_response()
}

pub(crate) async fn clear_draft_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    service.clear(&borrowers_id);
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn prefill_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    match service.prefill(&borrowers_id).await {
        Ok(Some(view)) => Json(view).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "no previous application on file for this borrower",
        ),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn progress_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    Json(service.progress(&borrowers_id)).into_response()
}

pub(crate) async fn balance_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    match service.refresh_balance(&borrowers_id).await {
        Ok(balance) => Json(json!({ "balance": balance })).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn upload_photo_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
    mut multipart: Multipart,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    let file = match next_upload(&mut multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "expected one file field"),
        Err(response) => return response,
    };
    match service.attach_profile_photo(&borrowers_id, file) {
        Ok(progress) => Json(progress).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn upload_documents_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
    mut multipart: Multipart,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    let files = match collect_uploads(&mut multipart).await {
        Ok(files) => files,
        Err(response) => return response,
    };
    if files.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "expected at least one file field");
    }
    Json(service.attach_documents(&borrowers_id, files)).into_response()
}

pub(crate) async fn remove_document_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path((borrowers_id, index)): Path<(String, usize)>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    match service.remove_document(&borrowers_id, index) {
        Ok(progress) => Json(progress).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn reuse_photo_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    match service.reuse_previous_photo(&borrowers_id).await {
        Ok(progress) => Json(progress).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn reuse_document_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path((borrowers_id, index)): Path<(String, usize)>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    match service.reuse_previous_document(&borrowers_id, index).await {
        Ok(progress) => Json(progress).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn submit_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    match service.submit(&borrowers_id).await {
        Ok(SubmissionState::Succeeded { application_id }) => {
            let submission = SubmissionState::Succeeded {
                application_id: application_id.clone(),
            };
            Json(json!({ "applicationId": application_id, "submission": submission }))
                .into_response()
        }
        Ok(SubmissionState::Failed { failure }) => failed_submission_response(failure),
        Ok(state) => Json(json!({ "submission": state })).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn submission_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
    Path(borrowers_id): Path<String>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    Json(service.submission_state(&borrowers_id)).into_response()
}

pub(crate) async fn agents_handler<S, B, E>(
    State(service): State<Arc<ReloanService<S, B, E>>>,
) -> Response
where
    S: DraftStore + 'static,
    B: LendingBackend + 'static,
    E: PortalEventPublisher + 'static,
{
    match service.agents().await {
        Ok(agents) => Json(json!({ "agents": agents })).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn simulate_handler(Json(request): Json<SimulateRequest>) -> Response {
    let decision = request
        .balance_decision
        .unwrap_or(BalanceDecision::DeductFromProceeds);
    match quote(
        request.loan_type,
        request.amount,
        request.previous_balance,
        decision,
    ) {
        Ok(quote) => Json(quote).into_response(),
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": err.to_string(),
                "minimum": err.min,
                "maximum": err.max,
            })),
        )
            .into_response(),
    }
}

/// Pull the next file field out of a multipart body, skipping plain
/// text fields. Content type falls back to a guess from the file name.
async fn next_upload(multipart: &mut Multipart) -> Result<Option<UploadedFile>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(err) => return Err(error_response(StatusCode::BAD_REQUEST, &err.to_string())),
        };
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let declared_type = field.content_type().map(str::to_string);
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return Err(error_response(StatusCode::BAD_REQUEST, &err.to_string())),
        };
        let content_type = declared_type.unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        return Ok(Some(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
}

async fn collect_uploads(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, Response> {
    let mut files = Vec::new();
    while let Some(file) = next_upload(multipart).await? {
        files.push(file);
    }
    Ok(files)
}

fn failed_submission_response(failure: SubmissionFailure) -> Response {
    match failure {
        SubmissionFailure::MissingFields { fields } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "the application is incomplete",
                "missingFields": fields,
            })),
        )
            .into_response(),
        SubmissionFailure::AmountOutOfRange {
            message, min, max, ..
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": message, "minimum": min, "maximum": max })),
        )
            .into_response(),
        SubmissionFailure::Remote { message } => {
            error_response(StatusCode::BAD_GATEWAY, &message)
        }
    }
}

fn service_error_response(err: ReloanServiceError) -> Response {
    match err {
        ReloanServiceError::Backend(err) => backend_error_response(err),
        ReloanServiceError::Document(err) => document_error_response(err),
        ReloanServiceError::SubmissionInFlight => error_response(
            StatusCode::CONFLICT,
            "a submission is already in progress",
        ),
    }
}

fn document_error_response(err: DocumentError) -> Response {
    match err {
        DocumentError::NoPreviousPhoto | DocumentError::NoSuchDocument(_) => {
            error_response(StatusCode::NOT_FOUND, &err.to_string())
        }
        DocumentError::NotAnImage(_) | DocumentError::TooLarge { .. } => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
        }
        DocumentError::Backend(err) => backend_error_response(err),
    }
}

fn backend_error_response(err: BackendError) -> Response {
    error_response(StatusCode::BAD_GATEWAY, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
