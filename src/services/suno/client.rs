use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::{multipart, Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::types::{SubmitRequest, TaskStatus};

pub const DEFAULT_BASE_URL: &str = "https://api.sunoapi.org";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No API key")]
    MissingCredentials,
    #[error("HTTP {status} {body}")]
    Http { status: u16, body: String },
    #[error("service returned code {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("No {0} in response")]
    MissingField(&'static str),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// The four remote operations a job needs, plus the quota check.
///
/// Every failure comes back as a [`ClientError`] carrying the human-readable reason.
pub trait GenerationClient: Send + Sync + 'static {
    fn api_key(&self) -> String;
    fn set_api_key(&self, key: &str);

    fn has_credentials(&self) -> bool {
        !self.api_key().is_empty()
    }

    /// Ok when the key is accepted and the account can generate.
    fn check_quota(&self) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Returns the remote task id.
    fn submit(&self, request: &SubmitRequest) -> impl Future<Output = Result<String, ClientError>> + Send;

    fn poll_status(&self, task_id: &str) -> impl Future<Output = Result<TaskStatus, ClientError>> + Send;

    /// Uploads an audio file and returns the URL the service can read it from.
    fn upload(&self, bytes: Vec<u8>, file_name: &str) -> impl Future<Output = Result<String, ClientError>> + Send;

    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ClientError>> + Send;
}

pub struct SunoClient {
    client: Client,
    base_url: String,
    upload_base_url: String,
    api_key: RwLock<String>,
}

impl SunoClient {
    pub fn new(base_url: &str, upload_base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            upload_base_url: upload_base_url.trim_end_matches('/').to_string(),
            api_key: RwLock::new(String::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let key = self.api_key();
        if key.is_empty() {
            return Err(ClientError::MissingCredentials);
        }
        Ok(builder.bearer_auth(key))
    }

    /// Sends, rejects HTTP >= 400 with a short body excerpt, and checks the envelope `code`.
    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: excerpt(&text),
            });
        }

        let body: Value = serde_json::from_str(&text)?;
        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            if code != 200 {
                let msg = body
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(ClientError::Api { code, msg });
            }
        }
        Ok(body)
    }
}

impl GenerationClient for SunoClient {
    fn api_key(&self) -> String {
        self.api_key
            .read()
            .map(|key| key.clone())
            .unwrap_or_default()
    }

    fn set_api_key(&self, key: &str) {
        if let Ok(mut slot) = self.api_key.write() {
            *slot = key.trim().to_string();
        }
    }

    async fn check_quota(&self) -> Result<(), ClientError> {
        let builder = self.authorized(self.client.get(self.url("/api/v1/generate/credit")))?;
        let body = self.send_json(builder).await?;
        if body.get("data").is_none() && body.get("code").is_none() {
            return Err(ClientError::MissingField("data"));
        }
        Ok(())
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<String, ClientError> {
        let builder = self.authorized(self.client.post(self.url(request.path())))?;
        let body = self.send_json(builder.json(&request.to_json())).await?;
        match find_str(&body, "taskId") {
            Some(id) if !id.is_empty() => {
                debug!("Submitted {} -> task {}", request.path(), id);
                Ok(id.to_string())
            }
            _ => Err(ClientError::MissingField("taskId")),
        }
    }

    async fn poll_status(&self, task_id: &str) -> Result<TaskStatus, ClientError> {
        let builder = self
            .authorized(self.client.get(self.url("/api/v1/generate/record-info")))?
            .query(&[("taskId", task_id)]);
        let body = self.send_json(builder).await?;
        Ok(parse_record_info(&body, task_id))
    }

    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, ClientError> {
        let name = if file_name.is_empty() { "audio.wav" } else { file_name };
        let part = multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part("file", part);

        let url = format!("{}/api/file-stream-upload", self.upload_base_url);
        let builder = self.authorized(self.client.post(url))?;
        let body = self.send_json(builder.multipart(form)).await?;

        find_str(&body, "fileUrl")
            .or_else(|| find_str(&body, "downloadUrl"))
            .map(str::to_string)
            .ok_or(ClientError::MissingField("fileUrl"))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Depth-first search for the first string value stored under `key`.
pub fn find_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(Value::as_str) {
                return Some(found);
            }
            map.values().find_map(|v| find_str(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_str(v, key)),
        _ => None,
    }
}

fn collect_str(value: &Value, key: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                match v.as_str() {
                    Some(s) if k == key && !s.is_empty() => out.push(s.to_string()),
                    _ => collect_str(v, key, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_str(v, key, out)),
        _ => {}
    }
}

/// Pulls status, error message and every `audioUrl` out of a `record-info` body.
pub fn parse_record_info(body: &Value, task_id: &str) -> TaskStatus {
    let mut audio_urls = Vec::new();
    collect_str(body, "audioUrl", &mut audio_urls);

    TaskStatus {
        task_id: find_str(body, "taskId").unwrap_or(task_id).to_string(),
        status: find_str(body, "status").unwrap_or_default().to_string(),
        error_message: find_str(body, "errorMessage")
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        audio_urls,
    }
}
