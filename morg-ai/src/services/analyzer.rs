//! Upload analysis pipeline: extract → enrich → infer

use crate::extractors::{self, MeshError, MeshMetadata};
use crate::services::llm::{self, LlmBackend, LlmError, Prediction};
use crate::services::web_search::{self, SearchProvider};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Analysis task failed: {0}")]
    Task(String),
}

/// Everything learned about one uploaded file
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: MeshMetadata,
    pub web_context: String,
    pub prediction: Prediction,
}

/// Runs the analysis steps against the configured search and model backends
pub struct Analyzer {
    search: Arc<dyn SearchProvider>,
    llm: Arc<dyn LlmBackend>,
    enrich_with_web: bool,
    max_results: usize,
}

impl Analyzer {
    pub fn new(search: Arc<dyn SearchProvider>, llm: Arc<dyn LlmBackend>) -> Self {
        Self {
            search,
            llm,
            enrich_with_web: true,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_with_web = enabled;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn enrich_with_web(&self) -> bool {
        self.enrich_with_web
    }

    pub fn search_provider_name(&self) -> &'static str {
        self.search.name()
    }

    pub fn llm_backend_name(&self) -> &'static str {
        self.llm.name()
    }

    /// Analyze using the configured enrichment setting
    pub async fn analyze(&self, path: &Path) -> Result<AnalysisReport, AnalysisError> {
        self.analyze_with(path, self.enrich_with_web).await
    }

    /// Analyze, overriding whether web enrichment runs for this file
    pub async fn analyze_with(
        &self,
        path: &Path,
        enrich: bool,
    ) -> Result<AnalysisReport, AnalysisError> {
        let owned: PathBuf = path.to_path_buf();
        let metadata = tokio::task::spawn_blocking(move || extractors::extract_metadata(&owned))
            .await
            .map_err(|e| AnalysisError::Task(e.to_string()))??;

        let web_context = if enrich {
            web_search::enrich(self.search.as_ref(), &metadata.filename, self.max_results).await
        } else {
            String::new()
        };

        let prediction = llm::infer(self.llm.as_ref(), &metadata, &web_context).await?;

        tracing::info!(
            file = %metadata.filename,
            triangles = metadata.num_triangles,
            enriched = enrich,
            "Analysis complete"
        );

        Ok(AnalysisReport {
            metadata,
            web_context,
            prediction,
        })
    }
}
