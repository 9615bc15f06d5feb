//! Configuration resolution for morg-ai
//!
//! API keys resolve Database → ENV → TOML. The analyzer (search provider plus
//! model backend) is assembled from the bootstrap TOML and those keys.

use crate::services::llm::{
    self, GeminiBackend, LlmBackend, OllamaCliBackend, OllamaHttpBackend, UnavailableBackend,
};
use crate::services::web_search::{
    DisabledProvider, DuckDuckGoProvider, GoogleCustomSearchProvider, SearchProvider,
    VertexSearchProvider,
};
use crate::services::Analyzer;
use morg_common::config::{LlmBackendKind, SearchProviderKind, TomlConfig};
use morg_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable consulted for a secret: `google_api_key` → `MORG_GOOGLE_API_KEY`
pub fn env_var_name(key: &str) -> String {
    format!("MORG_{}", key.to_ascii_uppercase())
}

/// Listen address from a bare IP (v4 or v6, brackets optional) and port
pub fn listen_addr(bind: &str, port: u16) -> Result<SocketAddr> {
    let host = bind.trim().trim_start_matches('[').trim_end_matches(']');
    let ip: IpAddr = host
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;
    Ok(SocketAddr::new(ip, port))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve one secret from the three tiers
///
/// **Priority:** Database → ENV → TOML. Returns `None` when no tier holds a
/// valid value.
pub async fn resolve_secret(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    key: &str,
) -> Result<Option<String>> {
    let db_value = crate::db::settings::get_setting::<String>(db, key)
        .await?
        .filter(|v| is_valid_key(v));
    let env_value = std::env::var(env_var_name(key))
        .ok()
        .filter(|v| is_valid_key(v));
    let toml_value = toml_config.secret(key).filter(|v| is_valid_key(v)).cloned();

    let sources: Vec<&str> = [
        db_value.as_ref().map(|_| "database"),
        env_value.as_ref().map(|_| "environment"),
        toml_value.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            key,
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = db_value.or(env_value).or(toml_value);
    match sources.first() {
        Some(source) => info!("{} loaded from {}", key, source),
        None => debug!("{} not configured", key),
    }
    Ok(resolved)
}

/// Copy settings into the TOML file (best-effort)
///
/// A failed write only logs a warning; the database stays authoritative.
pub async fn sync_settings_to_toml(settings: HashMap<String, String>, toml_path: &Path) -> Result<()> {
    let mut config = if toml_path.exists() {
        morg_common::config::load_toml_config(toml_path)?
    } else {
        TomlConfig::default()
    };

    for (key, value) in settings {
        if !config.set_secret(&key, value) {
            debug!("Skipping non-secret setting '{}' during TOML sync", key);
        }
    }

    match morg_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
        }
    }
    Ok(())
}

/// Build the configured search provider
///
/// Built even when `[search] enrich` is off, since uploads may opt back in.
/// Missing credentials degrade to [`DisabledProvider`] with a warning so the
/// service still starts; keys can then be supplied at runtime.
pub async fn build_search_provider(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Arc<dyn SearchProvider>> {
    let search = &toml_config.search;

    let provider: Arc<dyn SearchProvider> = match search.provider {
        SearchProviderKind::Disabled => Arc::new(DisabledProvider),
        SearchProviderKind::DuckDuckGo => {
            Arc::new(DuckDuckGoProvider::new().map_err(|e| Error::Config(e.to_string()))?)
        }
        SearchProviderKind::Google => {
            let api_key = resolve_secret(db, toml_config, "google_api_key").await?;
            let engine_id = resolve_secret(db, toml_config, "google_cse_id").await?;
            match (api_key, engine_id) {
                (Some(api_key), Some(engine_id)) => Arc::new(
                    GoogleCustomSearchProvider::new(api_key, engine_id)
                        .map_err(|e| Error::Config(e.to_string()))?,
                ),
                _ => {
                    warn!(
                        "Google search needs google_api_key and google_cse_id \
                         (settings API, {} / {}, or TOML). Web enrichment disabled.",
                        env_var_name("google_api_key"),
                        env_var_name("google_cse_id")
                    );
                    Arc::new(DisabledProvider)
                }
            }
        }
        SearchProviderKind::Vertex => {
            let token = resolve_secret(db, toml_config, "vertex_access_token").await?;
            match (
                search.vertex_project_id.clone(),
                search.vertex_data_store_id.clone(),
                token,
            ) {
                (Some(project), Some(data_store), Some(token)) => Arc::new(
                    VertexSearchProvider::new(
                        project,
                        search.vertex_location.clone(),
                        data_store,
                        token,
                    )
                    .map_err(|e| Error::Config(e.to_string()))?,
                ),
                _ => {
                    warn!(
                        "Vertex search needs [search] vertex_project_id, vertex_data_store_id \
                         and a vertex_access_token. Web enrichment disabled."
                    );
                    Arc::new(DisabledProvider)
                }
            }
        }
    };

    info!(provider = provider.name(), "Search provider selected");
    Ok(provider)
}

/// Build the configured model backend
///
/// Gemini without an API key yields an [`UnavailableBackend`] whose calls fail
/// with a configuration error.
pub async fn build_llm_backend(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Arc<dyn LlmBackend>> {
    let cfg = &toml_config.llm;
    let timeout = Duration::from_secs(cfg.timeout_secs.max(1));

    let backend: Arc<dyn LlmBackend> = match cfg.backend {
        LlmBackendKind::OllamaCli => Arc::new(OllamaCliBackend::new(cfg.model.clone(), timeout)),
        LlmBackendKind::OllamaHttp => {
            let base_url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| llm::DEFAULT_OLLAMA_URL.to_string());
            Arc::new(
                OllamaHttpBackend::new(base_url, cfg.model.clone(), timeout)
                    .map_err(|e| Error::Config(e.to_string()))?,
            )
        }
        LlmBackendKind::Gemini => match resolve_secret(db, toml_config, "gemini_api_key").await? {
            Some(api_key) => {
                let mut backend = GeminiBackend::new(cfg.model.clone(), api_key, timeout)
                    .map_err(|e| Error::Config(e.to_string()))?;
                if let Some(base_url) = &cfg.base_url {
                    backend = backend.with_base_url(base_url.clone());
                }
                Arc::new(backend)
            }
            None => {
                warn!(
                    "Gemini backend selected but gemini_api_key is not configured \
                     (settings API, {}, or TOML)",
                    env_var_name("gemini_api_key")
                );
                Arc::new(UnavailableBackend::new("gemini_api_key is not set"))
            }
        },
    };

    info!(
        backend = backend.name(),
        model = %cfg.model,
        timeout_secs = timeout.as_secs(),
        "Model backend selected"
    );
    Ok(backend)
}

/// Assemble the analysis pipeline from configuration
pub async fn build_analyzer(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<Analyzer> {
    let search = build_search_provider(db, toml_config).await?;
    let llm = build_llm_backend(db, toml_config).await?;

    let analyzer = Analyzer::new(search, llm)
        .with_enrichment(toml_config.search.enrich)
        .with_max_results(toml_config.search.max_results);
    info!(
        search = analyzer.search_provider_name(),
        llm = analyzer.llm_backend_name(),
        enrich = analyzer.enrich_with_web(),
        "Analyzer ready"
    );
    Ok(analyzer)
}
