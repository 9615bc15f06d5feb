//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a per-module TOML file. Root folder
//! resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MORG_ROOT_FOLDER`, then `MORG_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! Missing or unreadable TOML files never abort startup; they log a warning
//! and fall through to the next tier.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the SQLite database file inside the root folder
pub const DATABASE_FILE_NAME: &str = "morg.db";

/// Name of the uploads directory inside the root folder
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// Built-in defaults used when no other configuration source applies
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("morg"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\morg"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("morg"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/morg"))
        } else {
            dirs::data_local_dir()
                .map(|d| d.join("morg"))
                .unwrap_or_else(|| PathBuf::from("./morg_data"))
        };

        Self {
            root_folder,
            log_level: default_log_level(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Search provider used for web enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    #[default]
    DuckDuckGo,
    Google,
    Vertex,
    Disabled,
}

/// Web enrichment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchProviderKind,

    /// Maximum number of snippets folded into the prompt
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Run enrichment at all (uploads may still opt out per request)
    #[serde(default = "default_true")]
    pub enrich: bool,

    /// Vertex AI Search project
    #[serde(default)]
    pub vertex_project_id: Option<String>,

    /// Vertex AI Search location
    #[serde(default = "default_vertex_location")]
    pub vertex_location: String,

    /// Vertex AI Search data store
    #[serde(default)]
    pub vertex_data_store_id: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::default(),
            max_results: default_max_results(),
            enrich: true,
            vertex_project_id: None,
            vertex_location: default_vertex_location(),
            vertex_data_store_id: None,
        }
    }
}

/// Language model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackendKind {
    /// `ollama run <model>` subprocess
    #[default]
    OllamaCli,
    /// Ollama daemon HTTP API
    OllamaHttp,
    /// Google Gemini generateContent API
    Gemini,
}

/// Language model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: LlmBackendKind,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Base URL for HTTP backends (Ollama daemon or Gemini endpoint)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackendKind::default(),
            model: default_llm_model(),
            base_url: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Bootstrap configuration loaded from TOML
///
/// Secret fields are the lowest-priority source; database settings and
/// environment variables override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    // scalar keys must serialize before the tables below
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cse_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            logging: LoggingConfig::default(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            google_api_key: None,
            google_cse_id: None,
            vertex_access_token: None,
            gemini_api_key: None,
        }
    }
}

impl TomlConfig {
    /// Look up a secret field by its settings key
    pub fn secret(&self, key: &str) -> Option<&String> {
        match key {
            "google_api_key" => self.google_api_key.as_ref(),
            "google_cse_id" => self.google_cse_id.as_ref(),
            "vertex_access_token" => self.vertex_access_token.as_ref(),
            "gemini_api_key" => self.gemini_api_key.as_ref(),
            _ => None,
        }
    }

    /// Set a secret field by its settings key; returns false for unknown keys
    pub fn set_secret(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "google_api_key" => &mut self.google_api_key,
            "google_cse_id" => &mut self.google_cse_id,
            "vertex_access_token" => &mut self.vertex_access_token,
            "gemini_api_key" => &mut self.gemini_api_key,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    5050
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

fn default_max_results() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_vertex_location() -> String {
    "global".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

/// Default per-module config path: `<config_dir>/morg/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("morg").join(format!("{}.toml", module_name)))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load config from an explicit path or the module default, falling back to
/// built-in defaults when no file is present
pub fn load_or_default(explicit: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path(module_name) {
            Some(p) if p.exists() => p,
            _ => {
                debug!("No config file for {}, using defaults", module_name);
                return Ok(TomlConfig::default());
            }
        },
    };

    load_toml_config(&path)
}

/// Write TOML config atomically (temp file + rename)
///
/// On Unix the file is restricted to mode 0600 since it may hold API keys.
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = target.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&temp_path, target)?;
    Ok(())
}

/// Resolves the root folder from CLI, environment, TOML and defaults
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_path: None,
        }
    }

    /// Highest-priority override from the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Explicit TOML file instead of the module default
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in ["MORG_ROOT_FOLDER", "MORG_ROOT"] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        let config_path = self
            .config_path
            .clone()
            .or_else(|| default_config_path(&self.module_name));
        if let Some(path) = config_path {
            if path.exists() {
                match load_toml_config(&path) {
                    Ok(config) => {
                        if let Some(root) = config.root_folder {
                            return root;
                        }
                    }
                    Err(e) => warn!("Ignoring unreadable config {}: {}", path.display(), e),
                }
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout and derives paths inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.root_folder.join(UPLOADS_DIR_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Create root and uploads directories (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }
}
