//! Language model inference
//!
//! Builds the provenance prompt from mesh metadata plus web context, sends it
//! to one of the configured backends and digs the JSON answer out of the
//! model's free-text reply.

use crate::extractors::MeshMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Default bound on one model call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model inference errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM call failed: could not start '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("LLM call failed: process exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("LLM call failed: network error: {0}")]
    Network(String),

    #[error("LLM call failed: API error {0}: {1}")]
    Api(u16, String),

    #[error("LLM call timed out after {0} seconds")]
    Timeout(u64),

    #[error("LLM response contained no JSON object")]
    NoJson,

    #[error("LLM response JSON is invalid: {0}")]
    InvalidJson(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM backend not configured: {0}")]
    NotConfigured(String),
}

/// Fields inferred by the model
///
/// Anything beyond the three expected keys is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub creator: Option<String>,
    pub filename: Option<String>,
    pub filetype: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prediction {
    /// Build from the model's JSON object
    ///
    /// Non-string scalars are stringified; `null` and empty strings become `None`.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let mut take = |key: &str| match object.remove(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Null) | Some(Value::String(_)) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let creator = take("creator");
        let filename = take("filename");
        let filetype = take("filetype");

        Self {
            creator,
            filename,
            filetype,
            extra: object,
        }
    }
}

/// A text-completion backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Send a prompt, return the raw completion text
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Prompt asking for creator, original filename and file type
pub fn build_prompt(metadata_json: &str, web_context: &str) -> String {
    format!(
        "\nUse the following web results to help answer:\n\n{web_context}\n\n\
         Then, using this metadata:\n\n{metadata_json}\n\n\
         Predict:\n- Creator\n- Original filename\n- File type\n\n\
         Return JSON with: creator, filename, filetype.\n"
    )
}

/// Slice the first `{` through the last `}` and parse it as a JSON object
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, LlmError> {
    let start = text.find('{').ok_or(LlmError::NoJson)?;
    let end = text.rfind('}').ok_or(LlmError::NoJson)?;
    if end < start {
        return Err(LlmError::NoJson);
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(LlmError::InvalidJson("expected a JSON object".to_string())),
        Err(e) => Err(LlmError::InvalidJson(e.to_string())),
    }
}

/// Run inference for one mesh
pub async fn infer(
    backend: &dyn LlmBackend,
    metadata: &MeshMetadata,
    web_context: &str,
) -> Result<Prediction, LlmError> {
    let metadata_json = serde_json::to_string_pretty(metadata)
        .map_err(|e| LlmError::InvalidJson(e.to_string()))?;
    let prompt = build_prompt(&metadata_json, web_context);

    tracing::debug!(
        backend = backend.name(),
        prompt_len = prompt.len(),
        "Sending inference prompt"
    );

    let started = std::time::Instant::now();
    let response = backend.complete(&prompt).await?;
    if response.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let prediction = Prediction::from_object(extract_json_object(&response)?);
    tracing::info!(
        backend = backend.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        creator = ?prediction.creator,
        filetype = ?prediction.filetype,
        "Inference complete"
    );
    Ok(prediction)
}

/// Bound a backend call, mapping expiry to [`LlmError::Timeout`]
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| LlmError::Timeout(limit.as_secs()))?
}

fn http_client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .user_agent(concat!("morg-ai/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LlmError::Network(e.to_string()))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Api(status.as_u16(), body))
}

/// Stands in when the configured backend lacks credentials
///
/// Every call fails until settings are supplied and the analyzer is rebuilt.
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured(self.reason.clone()))
    }
}

// ============================================================================
// Ollama subprocess
// ============================================================================

/// Runs `ollama run <model>` with the prompt on stdin
pub struct OllamaCliBackend {
    program: String,
    model: String,
    timeout: Duration,
}

impl OllamaCliBackend {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: "ollama".to_string(),
            model: model.into(),
            timeout,
        }
    }

    /// Override the executable (tests, non-PATH installs)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, prompt: &str) -> Result<String, LlmError> {
        let spawn_err = |e: std::io::Error| LlmError::Spawn {
            command: format!("{} run {}", self.program, self.model),
            message: e.to_string(),
        };

        let mut child = tokio::process::Command::new(&self.program)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await.map_err(spawn_err)?;
            // closing stdin ends the prompt
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if !output.status.success() {
            return Err(LlmError::ProcessFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl LlmBackend for OllamaCliBackend {
    fn name(&self) -> &'static str {
        "ollama_cli"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        with_timeout(self.timeout, self.run(prompt)).await
    }
}

// ============================================================================
// Ollama HTTP daemon
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

/// Talks to a running Ollama daemon over `/api/generate`
pub struct OllamaHttpBackend {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaHttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            http_client: http_client()?,
            base_url: base_url.into(),
            model: model.into(),
            timeout,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .json(&OllamaGenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let body: OllamaGenerateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidJson(e.to_string()))?;
        Ok(body.response)
    }
}

#[async_trait]
impl LlmBackend for OllamaHttpBackend {
    fn name(&self) -> &'static str {
        "ollama_http"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        with_timeout(self.timeout, self.generate(prompt)).await
    }
}

// ============================================================================
// Gemini
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContentOut<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContentOut<'a> {
    parts: Vec<GeminiPartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: GeminiContent,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Google Gemini `generateContent`
pub struct GeminiBackend {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            http_client: http_client()?,
            base_url: DEFAULT_GEMINI_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Endpoint without the key (safe to log)
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GeminiRequest {
            contents: vec![GeminiContentOut {
                parts: vec![GeminiPartOut { text: prompt }],
            }],
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let body: GeminiResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidJson(e.to_string()))?;
        Ok(body.text())
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        with_timeout(self.timeout, self.generate(prompt)).await
    }
}
