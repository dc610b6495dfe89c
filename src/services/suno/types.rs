use serde::{Deserialize, Serialize};

/// The service needs a callback URL even when results are polled.
pub const CALLBACK_PLACEHOLDER: &str = "https://example.com/callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "V4")]
    V4,
    #[serde(rename = "V4_5")]
    V45,
    #[serde(rename = "V4_5PLUS")]
    V45Plus,
    #[default]
    #[serde(rename = "V4_5ALL")]
    V45All,
    #[serde(rename = "V5")]
    V5,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::V4 => "V4",
            Model::V45 => "V4_5",
            Model::V45Plus => "V4_5PLUS",
            Model::V45All => "V4_5ALL",
            Model::V5 => "V5",
        }
    }

    /// Maps the editor's model combo index; anything unknown falls back to the default.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Model::V4,
            1 => Model::V45,
            2 => Model::V45Plus,
            3 => Model::V45All,
            4 => Model::V5,
            _ => Model::default(),
        }
    }
}

/// Body for `generate` and `generate/upload-cover`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub custom_mode: bool,
    pub instrumental: bool,
    pub model: Model,
    pub call_back_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub style: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub negative_tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal_gender: Option<String>,
    pub style_weight: f64,
    pub weirdness_constraint: f64,
    pub audio_weight: f64,
}

/// Body for `generate/add-vocals`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVocalsRequest {
    pub upload_url: String,
    pub prompt: String,
    pub title: String,
    pub negative_tags: String,
    pub style: String,
    pub call_back_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal_gender: Option<String>,
    pub style_weight: f64,
    pub weirdness_constraint: f64,
    pub audio_weight: f64,
    pub model: Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitRequest {
    Generate(GenerateRequest),
    UploadCover(GenerateRequest),
    AddVocals(AddVocalsRequest),
}

impl SubmitRequest {
    pub fn path(&self) -> &'static str {
        match self {
            SubmitRequest::Generate(_) => "/api/v1/generate",
            SubmitRequest::UploadCover(_) => "/api/v1/generate/upload-cover",
            SubmitRequest::AddVocals(_) => "/api/v1/generate/add-vocals",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            SubmitRequest::Generate(body) | SubmitRequest::UploadCover(body) => serde_json::to_value(body),
            SubmitRequest::AddVocals(body) => serde_json::to_value(body),
        };
        value.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Pending,
    Succeeded,
    Failed,
}

/// One poll of `record-info`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: String,
    pub error_message: Option<String>,
    pub audio_urls: Vec<String>,
}

impl TaskStatus {
    /// `SUCCESS` (any case) is terminal success; anything mentioning fail/error is
    /// terminal failure; everything else, including an empty status, is still running.
    pub fn phase(&self) -> TaskPhase {
        let status = self.status.trim();
        if status.eq_ignore_ascii_case("SUCCESS") {
            return TaskPhase::Succeeded;
        }
        let lower = status.to_ascii_lowercase();
        if lower.contains("fail") || lower.contains("error") {
            return TaskPhase::Failed;
        }
        TaskPhase::Pending
    }

    /// Service message when present, otherwise the raw status token.
    pub fn failure_message(&self) -> String {
        match &self.error_message {
            Some(msg) if !msg.is_empty() => msg.clone(),
            _ => self.status.clone(),
        }
    }
}
