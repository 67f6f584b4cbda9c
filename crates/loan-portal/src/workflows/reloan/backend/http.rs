//! HTTP implementation of [`LendingBackend`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::workflows::reloan::backend::{
    AgentSummary, BackendError, LatestApplication, LendingBackend, ProgressSink, StatusSnapshot,
    SubmissionReceipt, SubmissionRequest,
};
use crate::workflows::reloan::draft::UploadedFile;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub struct HttpLendingBackend {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpLendingBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, BackendError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .authorized(self.client.get(self.endpoint(path)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }
}

impl fmt::Debug for HttpLendingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLendingBackend")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BorrowerEnvelope {
    #[serde(default)]
    latest_application: Option<LatestApplication>,
}

#[derive(Debug, Deserialize)]
struct BalanceEnvelope {
    #[serde(default)]
    balance: f64,
}

#[derive(Debug, Deserialize)]
struct AgentsEnvelope {
    #[serde(default)]
    agents: Vec<AgentSummary>,
}

#[async_trait]
impl LendingBackend for HttpLendingBackend {
    async fn latest_application(
        &self,
        borrowers_id: &str,
    ) -> Result<Option<LatestApplication>, BackendError> {
        let envelope: BorrowerEnvelope = self.get_json(&format!("borrowers/{borrowers_id}")).await?;
        Ok(envelope.latest_application)
    }

    async fn borrower_balance(&self, borrowers_id: &str) -> Result<f64, BackendError> {
        let envelope: BalanceEnvelope = self
            .get_json(&format!("borrowers/{borrowers_id}/balance"))
            .await?;
        Ok(envelope.balance)
    }

    async fn agent_names(&self) -> Result<Vec<AgentSummary>, BackendError> {
        let envelope: AgentsEnvelope = self.get_json("agents/names").await?;
        Ok(envelope.agents)
    }

    async fn download(&self, location: &str) -> Result<UploadedFile, BackendError> {
        let url = if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            self.endpoint(location)
        };

        let response = self.authorized(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let file_name = remote_file_name(location);
        let content_type = header_type.unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        let bytes = response.bytes().await?.to_vec();

        Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        })
    }

    async fn submit_application(
        &self,
        request: SubmissionRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SubmissionReceipt, BackendError> {
        let total = request
            .documents
            .iter()
            .map(|file| file.bytes.len() as u64)
            .sum::<u64>()
            + request
                .profile_photo
                .as_ref()
                .map(|file| file.bytes.len() as u64)
                .unwrap_or(0);
        let transfer = TransferProgress::shared(total, progress);
        transfer.begin();

        let mut form = Form::new();
        for (name, value) in request.fields {
            form = form.text(name, value);
        }
        for document in request.documents {
            form = form.part("documents", streaming_part(document, Arc::clone(&transfer))?);
        }
        if let Some(photo) = request.profile_photo {
            form = form.part("profilePic", streaming_part(photo, Arc::clone(&transfer))?);
        }

        let response = self
            .authorized(self.client.post(self.endpoint(&request.path)))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        transfer.finish();

        let value: Value = response.json().await?;
        let application_id =
            extract_application_id(&value).ok_or(BackendError::MissingApplicationId)?;
        Ok(SubmissionReceipt { application_id })
    }

    async fn application_status(
        &self,
        application_id: &str,
    ) -> Result<StatusSnapshot, BackendError> {
        let value: Value = self
            .get_json(&format!("loan-applications/{application_id}"))
            .await?;
        let status = value
            .get("status")
            .or_else(|| value.pointer("/application/status"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(StatusSnapshot { status })
    }
}

/// Shared byte counter across all parts of one submission. Percentages
/// are cumulative over the whole payload and deduplicated, so the sink
/// sees each value at most once.
struct TransferProgress {
    total: u64,
    sent: AtomicU64,
    last_percent: AtomicU64,
    observer: Arc<dyn ProgressSink>,
}

impl TransferProgress {
    fn shared(total: u64, observer: Arc<dyn ProgressSink>) -> Arc<Self> {
        Arc::new(Self {
            total,
            sent: AtomicU64::new(0),
            last_percent: AtomicU64::new(u64::MAX),
            observer,
        })
    }

    fn begin(&self) {
        self.publish(0);
    }

    fn finish(&self) {
        self.publish(100);
    }

    fn record(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let percent = if self.total == 0 {
            100
        } else {
            (sent.saturating_mul(100) / self.total).min(100)
        };
        self.publish(percent);
    }

    fn publish(&self, percent: u64) {
        if self.last_percent.swap(percent, Ordering::Relaxed) != percent {
            self.observer.report(percent as u8);
        }
    }
}

/// Wrap an in-memory file as a chunked stream so progress ticks while
/// the transport drains it.
fn streaming_part(
    file: UploadedFile,
    transfer: Arc<TransferProgress>,
) -> Result<Part, BackendError> {
    let length = file.bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = file
        .bytes
        .chunks(UPLOAD_CHUNK_BYTES)
        .map(|chunk| chunk.to_vec())
        .collect();
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        transfer.record(chunk.len() as u64);
        Ok::<Vec<u8>, std::io::Error>(chunk)
    }));

    let part = Part::stream_with_length(Body::wrap_stream(stream), length)
        .file_name(file.file_name)
        .mime_str(&file.content_type)?;
    Ok(part)
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    BackendError::Http { status, message }
}

fn extract_application_id(value: &Value) -> Option<String> {
    let candidates = [
        value.pointer("/application/applicationId"),
        value.get("applicationId"),
    ];
    for candidate in candidates.into_iter().flatten() {
        match candidate {
            Value::String(id) if !id.trim().is_empty() => return Some(id.trim().to_string()),
            Value::Number(number) => return Some(number.to_string()),
            _ => {}
        }
    }
    None
}

fn remote_file_name(location: &str) -> String {
    location
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "download.bin".to_string())
}
