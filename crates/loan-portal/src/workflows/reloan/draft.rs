use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::loans::BalanceDecision;

/// Civil status options offered by the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaritalStatus {
    Single,
    Married,
    Widowed,
    Separated,
}

impl MaritalStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "Single",
            MaritalStatus::Married => "Married",
            MaritalStatus::Widowed => "Widowed",
            MaritalStatus::Separated => "Separated",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" => Some(Self::Single),
            "married" => Some(Self::Married),
            "widowed" => Some(Self::Widowed),
            "separated" => Some(Self::Separated),
            _ => None,
        }
    }
}

/// Primary income source declared by the borrower. Employment and
/// business each unlock their own detail fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomeSource {
    Employment,
    Business,
    Pension,
    Remittance,
}

impl IncomeSource {
    pub const fn label(&self) -> &'static str {
        match self {
            IncomeSource::Employment => "Employment",
            IncomeSource::Business => "Business",
            IncomeSource::Pension => "Pension",
            IncomeSource::Remittance => "Remittance",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employment" | "employed" => Some(Self::Employment),
            "business" | "self-employed" => Some(Self::Business),
            "pension" => Some(Self::Pension),
            "remittance" => Some(Self::Remittance),
            _ => None,
        }
    }
}

/// Character reference slot. The form carries exactly three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    pub name: String,
    pub contact_number: String,
    pub relation: String,
}

/// Agent attribution, decided once when raw input crosses into the
/// domain. Upstream payloads carry plain ids, embedded objects, or
/// stringification artifacts; everything unusable collapses to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentChoice {
    NoAgent,
    Selected(String),
}

impl AgentChoice {
    pub const NO_AGENT: &'static str = "none";

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.eq_ignore_ascii_case(Self::NO_AGENT) {
            return Some(Self::NoAgent);
        }
        if trimmed == "[object Object]"
            || trimmed.eq_ignore_ascii_case("undefined")
            || trimmed.eq_ignore_ascii_case("null")
        {
            return None;
        }
        Some(Self::Selected(trimmed.to_string()))
    }

    /// Wire value sent to the backend (`"none"` or the agent id).
    pub fn as_field(&self) -> &str {
        match self {
            AgentChoice::NoAgent => Self::NO_AGENT,
            AgentChoice::Selected(id) => id,
        }
    }
}

/// Working copy of the re-application form, one per borrower.
///
/// Serialized camelCase both in the persisted mirror and over HTTP, with
/// lenient readers: blank or malformed stored values fall back to the
/// field default instead of failing the whole draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationDraft {
    pub full_name: String,
    #[serde(with = "date_value")]
    pub birth_date: Option<NaiveDate>,
    pub contact_number: String,
    pub email_address: String,
    #[serde(with = "marital_value")]
    pub marital_status: Option<MaritalStatus>,
    pub spouse_name: String,
    pub spouse_contact_number: String,
    pub home_address: String,
    #[serde(with = "income_value")]
    pub income_source: Option<IncomeSource>,
    pub employer_name: String,
    pub occupation: String,
    pub business_name: String,
    pub business_type: String,
    #[serde(with = "money_value")]
    pub monthly_income: f64,
    pub references: Vec<Reference>,
    #[serde(with = "agent_value")]
    pub agent: Option<AgentChoice>,
    pub collateral_type: String,
    pub collateral_description: String,
    pub proof_of_ownership: String,
    #[serde(with = "amount_value")]
    pub estimated_value: u64,
    pub loan_purpose: String,
    #[serde(with = "amount_value")]
    pub loan_amount: u64,
    #[serde(with = "decision_value")]
    pub balance_decision: Option<BalanceDecision>,
}

impl ApplicationDraft {
    pub fn is_married(&self) -> bool {
        matches!(self.marital_status, Some(MaritalStatus::Married))
    }

    /// Additive hydration from a saved draft: only present, non-empty
    /// values overwrite what is already on the form.
    pub fn hydrate_from(&mut self, saved: ApplicationDraft) {
        merge_text(&mut self.full_name, saved.full_name);
        if saved.birth_date.is_some() {
            self.birth_date = saved.birth_date;
        }
        merge_text(&mut self.contact_number, saved.contact_number);
        merge_text(&mut self.email_address, saved.email_address);
        if saved.marital_status.is_some() {
            self.marital_status = saved.marital_status;
        }
        merge_text(&mut self.spouse_name, saved.spouse_name);
        merge_text(&mut self.spouse_contact_number, saved.spouse_contact_number);
        merge_text(&mut self.home_address, saved.home_address);
        if saved.income_source.is_some() {
            self.income_source = saved.income_source;
        }
        merge_text(&mut self.employer_name, saved.employer_name);
        merge_text(&mut self.occupation, saved.occupation);
        merge_text(&mut self.business_name, saved.business_name);
        merge_text(&mut self.business_type, saved.business_type);
        if saved.monthly_income > 0.0 {
            self.monthly_income = saved.monthly_income;
        }
        if !saved.references.is_empty() {
            self.references = saved.references;
        }
        if saved.agent.is_some() {
            self.agent = saved.agent;
        }
        merge_text(&mut self.collateral_type, saved.collateral_type);
        merge_text(&mut self.collateral_description, saved.collateral_description);
        merge_text(&mut self.proof_of_ownership, saved.proof_of_ownership);
        if saved.estimated_value > 0 {
            self.estimated_value = saved.estimated_value;
        }
        merge_text(&mut self.loan_purpose, saved.loan_purpose);
        if saved.loan_amount > 0 {
            self.loan_amount = saved.loan_amount;
        }
        if saved.balance_decision.is_some() {
            self.balance_decision = saved.balance_decision;
        }
    }
}

fn merge_text(slot: &mut String, incoming: String) {
    if !incoming.trim().is_empty() {
        *slot = incoming;
    }
}

/// One file held in memory for the current session.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Files staged for the next submission: at most one 2x2 photo plus an
/// ordered document list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSet {
    pub profile_photo: Option<UploadedFile>,
    pub documents: Vec<UploadedFile>,
}

/// Metadata for a document kept by the backend from a previous
/// application, offered for reuse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredDocument {
    pub file_name: String,
    pub path: String,
    pub mime_type: String,
}

/// Reusable uploads captured during prefill. Entries disappear from the
/// pool once fetched into the active [`UploadSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviousUploads {
    pub profile_photo_url: Option<String>,
    pub documents: Vec<StoredDocument>,
}

pub(crate) mod date_value {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()))
    }
}

mod marital_value {
    use super::MaritalStatus;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Option<MaritalStatus>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.map(|status| status.label()).unwrap_or(""))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<MaritalStatus>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(MaritalStatus::from_label))
    }
}

mod income_value {
    use super::IncomeSource;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Option<IncomeSource>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.map(|source| source.label()).unwrap_or(""))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<IncomeSource>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(IncomeSource::from_label))
    }
}

mod agent_value {
    use super::AgentChoice;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Option<AgentChoice>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(choice) => serializer.serialize_str(choice.as_field()),
            None => serializer.serialize_str(""),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<AgentChoice>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(AgentChoice::parse))
    }
}

mod decision_value {
    use crate::workflows::loans::BalanceDecision;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(
        value: &Option<BalanceDecision>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.map(|decision| decision.as_field()).unwrap_or(""))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<BalanceDecision>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(BalanceDecision::from_field))
    }
}

/// Whole-peso amounts; tolerates number or string inputs and clamps
/// negatives to zero.
pub(crate) mod amount_value {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub(crate) fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(*value)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::Number(number)) => number
                .as_f64()
                .map(|value| value.max(0.0).round() as u64)
                .unwrap_or(0),
            Some(Value::String(text)) => text
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .map(|value| value.max(0.0).round() as u64)
                .unwrap_or(0),
            _ => 0,
        })
    }
}

pub(crate) mod money_value {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub(crate) fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(*value)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::Number(number)) => number.as_f64().map(|value| value.max(0.0)).unwrap_or(0.0),
            Some(Value::String(text)) => text
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .map(|value| value.max(0.0))
                .unwrap_or(0.0),
            _ => 0.0,
        })
    }
}
