//! Web search enrichment
//!
//! Issues one keyword query derived from the uploaded filename to the
//! configured search provider and folds the hits into prompt text.
//! Enrichment never fails a request: errors become part of the text.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("morg-ai/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

const DUCKDUCKGO_BASE_URL: &str = "https://html.duckduckgo.com/html/";
const GOOGLE_CSE_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";
const VERTEX_BASE_URL: &str = "https://discoveryengine.googleapis.com/v1";

/// Sites where printable models are usually published
pub const SITE_FILTER: &str = "site:patreon.com OR site:thingiverse.com OR site:printables.com";

/// Google Custom Search caps `num` at 10
const GOOGLE_MAX_NUM: usize = 10;

/// Search client errors
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Search provider not configured: {0}")]
    NotConfigured(String),
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: Option<String>,
}

/// A web search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Run one query, returning at most `max_results` hits
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Turn an uploaded filename into a search query
///
/// `dragon_bust-v2.stl` → `dragon bust v2 site:patreon.com OR ...`
pub fn build_query(filename: &str) -> String {
    let stem = std::path::Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());

    let keywords = stem
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    format!("{} {}", keywords, SITE_FILTER)
}

/// Search for `filename` and format hits as `"{title}: {snippet}"` lines
///
/// Failures are reported inline as `(Web enrichment failed: ...)`.
pub async fn enrich(provider: &dyn SearchProvider, filename: &str, max_results: usize) -> String {
    let query = build_query(filename);
    tracing::debug!(provider = provider.name(), query = %query, "Running web enrichment");

    match provider.search(&query, max_results).await {
        Ok(hits) => {
            tracing::info!(
                provider = provider.name(),
                hits = hits.len(),
                "Web enrichment complete"
            );
            hits.iter()
                .take(max_results)
                .map(|h| format!("{}: {}", h.title, h.snippet))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "Web enrichment failed");
            format!("(Web enrichment failed: {})", e)
        }
    }
}

fn http_client() -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| SearchError::NetworkError(e.to_string()))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::ApiError(status.as_u16(), body))
}

// ============================================================================
// Disabled
// ============================================================================

/// Provider used when enrichment is turned off
pub struct DisabledProvider;

#[async_trait]
impl SearchProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        Ok(Vec::new())
    }
}

// ============================================================================
// DuckDuckGo
// ============================================================================

/// Parse a DuckDuckGo HTML results page
///
/// Each organic result is a `div.result` holding an `a.result__a` title link
/// and a `.result__snippet` body. Ads (`result--ad`) are skipped.
pub fn parse_ddg_html(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        if hits.len() >= max_results {
            break;
        }
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = result.select(&title_sel).next() else {
            continue;
        };
        let title = collapse_text(link.text());
        if title.is_empty() {
            continue;
        }
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_text(s.text()))
            .unwrap_or_default();

        hits.push(SearchHit {
            title,
            snippet,
            url: link.value().attr("href").and_then(resolve_ddg_href),
        });
    }
    hits
}

fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwrap `//duckduckgo.com/l/?uddg=<target>` redirect links
fn resolve_ddg_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let url = reqwest::Url::parse(&absolute).ok()?;
    if url.path().starts_with("/l/") {
        if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
            return Some(target.into_owned());
        }
    }
    Some(absolute)
}

/// DuckDuckGo HTML web search (no key required)
pub struct DuckDuckGoProvider {
    http_client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoProvider {
    pub fn new() -> Result<Self, SearchError> {
        Ok(Self {
            http_client: http_client()?,
            base_url: DUCKDUCKGO_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .http_client
            .post(&self.base_url)
            .form(&[("q", query), ("kl", "wt-wt")])
            .send()
            .await
            .map_err(|e| SearchError::NetworkError(e.to_string()))?;

        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        Ok(parse_ddg_html(&body, max_results))
    }
}

// ============================================================================
// Google Custom Search
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct GoogleResponse {
    /// Absent when the query has no results
    #[serde(default)]
    pub items: Vec<GoogleItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl GoogleResponse {
    pub fn into_hits(self, max_results: usize) -> Vec<SearchHit> {
        self.items
            .into_iter()
            .take(max_results)
            .map(|item| SearchHit {
                title: item.title,
                snippet: item.snippet.replace('\n', " "),
                url: item.link,
            })
            .collect()
    }
}

/// Google Custom Search JSON API
pub struct GoogleCustomSearchProvider {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    engine_id: String,
}

impl GoogleCustomSearchProvider {
    pub fn new(api_key: String, engine_id: String) -> Result<Self, SearchError> {
        Ok(Self {
            http_client: http_client()?,
            base_url: GOOGLE_CSE_BASE_URL.to_string(),
            api_key,
            engine_id,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchProvider for GoogleCustomSearchProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let num = max_results.clamp(1, GOOGLE_MAX_NUM).to_string();
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::NetworkError(e.to_string()))?;

        let parsed: GoogleResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        Ok(parsed.into_hits(max_results))
    }
}

// ============================================================================
// Vertex AI Search
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VertexSearchRequest<'a> {
    query: &'a str,
    page_size: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct VertexResponse {
    #[serde(default)]
    pub results: Vec<VertexResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VertexResult {
    #[serde(default)]
    pub document: VertexDocument,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexDocument {
    #[serde(default)]
    pub derived_struct_data: VertexDerivedData,
}

#[derive(Debug, Default, Deserialize)]
pub struct VertexDerivedData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub snippets: Vec<VertexSnippet>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VertexSnippet {
    #[serde(default)]
    pub snippet: String,
}

impl VertexResponse {
    pub fn into_hits(self, max_results: usize) -> Vec<SearchHit> {
        self.results
            .into_iter()
            .take(max_results)
            .map(|r| {
                let data = r.document.derived_struct_data;
                let snippet = data
                    .snippets
                    .into_iter()
                    .map(|s| s.snippet)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                SearchHit {
                    title: data.title,
                    snippet,
                    url: data.link,
                }
            })
            .collect()
    }
}

/// Vertex AI Search (Discovery Engine) over a website data store
pub struct VertexSearchProvider {
    http_client: reqwest::Client,
    base_url: String,
    project_id: String,
    location: String,
    data_store_id: String,
    access_token: String,
}

impl VertexSearchProvider {
    pub fn new(
        project_id: String,
        location: String,
        data_store_id: String,
        access_token: String,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            http_client: http_client()?,
            base_url: VERTEX_BASE_URL.to_string(),
            project_id,
            location,
            data_store_id,
            access_token,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full `:search` endpoint for the configured data store
    pub fn endpoint(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/collections/default_collection/dataStores/{}/servingConfigs/default_search:search",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.location,
            self.data_store_id
        )
    }
}

#[async_trait]
impl SearchProvider for VertexSearchProvider {
    fn name(&self) -> &'static str {
        "vertex"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .json(&VertexSearchRequest {
                query,
                page_size: max_results.max(1),
            })
            .send()
            .await
            .map_err(|e| SearchError::NetworkError(e.to_string()))?;

        let parsed: VertexResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        Ok(parsed.into_hits(max_results))
    }
}
