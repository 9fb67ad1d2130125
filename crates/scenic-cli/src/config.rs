//! Reads/writes `~/.scenic/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted user configuration stored in `~/.scenic/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the OpenAI-compatible model server.
    #[serde(default = "default_llm_url")]
    pub llm_url: String,

    /// Model name passed in each chat completion request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Retrieval strategy name; validated against the known set at startup.
    #[serde(default = "default_mode")]
    pub retrieval_mode: String,

    /// How many benchmark samples run concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-call budget for the answer-synthesis oracle, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_mode() -> String {
    "full_unified".to_string()
}
fn default_concurrency() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_url: default_llm_url(),
            model: default_model(),
            retrieval_mode: default_mode(),
            concurrency: default_concurrency(),
            oracle_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Return the path to `~/.scenic/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".scenic").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SCENIC_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SCENIC_LLM_URL` | `llm_url` |
/// | `SCENIC_MODEL` | `model` |
/// | `SCENIC_MODE` | `retrieval_mode` |
/// | `SCENIC_CONCURRENCY` | `concurrency` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SCENIC_LLM_URL") {
        cfg.llm_url = v;
    }
    if let Ok(v) = std::env::var("SCENIC_MODEL") {
        cfg.model = v;
    }
    if let Ok(v) = std::env::var("SCENIC_MODE") {
        cfg.retrieval_mode = v;
    }
    if let Ok(v) = std::env::var("SCENIC_CONCURRENCY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.concurrency = n;
    }
}

/// Save the config to disk, creating `~/.scenic/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
