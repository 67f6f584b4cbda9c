//! Persisted draft mirror.
//!
//! Drafts survive portal restarts under the same keys the browser form
//! uses, so a borrower resumes exactly where they left off. Payloads are
//! wrapped in a versioned envelope; anything written by an older schema
//! is discarded by the caller rather than migrated.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflows::loans::LoanType;
use crate::workflows::reloan::draft::ApplicationDraft;

/// Bump when [`ApplicationDraft`] changes shape incompatibly.
pub const DRAFT_SCHEMA_VERSION: u32 = 2;

pub fn draft_key(borrowers_id: &str) -> String {
    format!("reloanApplicationFormData_{borrowers_id}")
}

pub fn loan_type_key(borrowers_id: &str) -> String {
    format!("reloanSelectedLoanType_{borrowers_id}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io failure: {0}")]
    Io(#[from] io::Error),
    #[error("stored payload is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Versioned wrapper around a saved draft. Legacy payloads without a
/// version deserialize as version zero and read as stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEnvelope {
    #[serde(default)]
    pub schema_version: u32,
    pub draft: ApplicationDraft,
}

impl DraftEnvelope {
    pub fn current(draft: ApplicationDraft) -> Self {
        Self {
            schema_version: DRAFT_SCHEMA_VERSION,
            draft,
        }
    }

    pub fn is_current(&self) -> bool {
        self.schema_version == DRAFT_SCHEMA_VERSION
    }
}

/// Key-value persistence for drafts and the remembered loan type.
pub trait DraftStore: Send + Sync {
    fn load_draft(&self, borrowers_id: &str) -> Result<Option<DraftEnvelope>, StoreError>;
    fn save_draft(&self, borrowers_id: &str, envelope: &DraftEnvelope) -> Result<(), StoreError>;
    fn clear_draft(&self, borrowers_id: &str) -> Result<(), StoreError>;
    fn load_loan_type(&self, borrowers_id: &str) -> Result<Option<LoanType>, StoreError>;
    fn save_loan_type(&self, borrowers_id: &str, loan_type: LoanType) -> Result<(), StoreError>;
    fn clear_loan_type(&self, borrowers_id: &str) -> Result<(), StoreError>;
}

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    root: PathBuf,
}

impl FileDraftStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitized(key)))
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.entry_path(key), bytes)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keys become file names; anything outside alphanumerics, `-` and `_`
/// is replaced so a crafted borrower id cannot escape the data dir.
fn sanitized(key: &str) -> String {
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

impl DraftStore for FileDraftStore {
    fn load_draft(&self, borrowers_id: &str) -> Result<Option<DraftEnvelope>, StoreError> {
        match self.read(&draft_key(borrowers_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save_draft(&self, borrowers_id: &str, envelope: &DraftEnvelope) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(envelope)?;
        self.write(&draft_key(borrowers_id), &bytes)
    }

    fn clear_draft(&self, borrowers_id: &str) -> Result<(), StoreError> {
        self.remove(&draft_key(borrowers_id))
    }

    fn load_loan_type(&self, borrowers_id: &str) -> Result<Option<LoanType>, StoreError> {
        match self.read(&loan_type_key(borrowers_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save_loan_type(&self, borrowers_id: &str, loan_type: LoanType) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&loan_type)?;
        self.write(&loan_type_key(borrowers_id), &bytes)
    }

    fn clear_loan_type(&self, borrowers_id: &str) -> Result<(), StoreError> {
        self.remove(&loan_type_key(borrowers_id))
    }
}
