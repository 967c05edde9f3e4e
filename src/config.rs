//! Runtime configuration.
//!
//! Everything comes from the process environment, optionally seeded from a
//! dotenv file (`VOCAB_ENV_FILE`, default `.env`). The Mistral API key is the
//! only required value.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const API_KEY_VAR: &str = "MISTRAL_API_KEY";

const DEFAULT_ENV_FILE: &str = ".env";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";
const DEFAULT_CHAT_MODEL: &str = "mistral-large-latest";
const DEFAULT_API_BASE: &str = "https://api.mistral.ai/v1";
const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Settings resolved once at startup and shared read-only with the handlers.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub bind_addr: String,
    pub api_base: String,
    pub ocr_model: String,
    pub chat_model: String,
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let env_file = env::var("VOCAB_ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
        let api_key = load_api_key(Path::new(&env_file))?;

        let max_upload_bytes = upload_limit_bytes(env::var("VOCAB_MAX_UPLOAD_MB").ok().as_deref())?;

        let config = Self {
            api_key,
            bind_addr: var_or("VOCAB_BIND_ADDR", DEFAULT_BIND_ADDR),
            api_base: var_or("MISTRAL_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            ocr_model: var_or("MISTRAL_OCR_MODEL", DEFAULT_OCR_MODEL),
            chat_model: var_or("MISTRAL_CHAT_MODEL", DEFAULT_CHAT_MODEL),
            scratch_dir: env::var("VOCAB_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            max_upload_bytes,
        };

        info!(
            "Config: bind={} ocr_model={} chat_model={} scratch_dir={}",
            config.bind_addr,
            config.ocr_model,
            config.chat_model,
            config.scratch_dir.display()
        );
        Ok(config)
    }
}

/// Load the dotenv file at `path` and return the Mistral API key.
pub fn load_api_key(path: &Path) -> Result<String> {
    load_env_var(path, API_KEY_VAR)
}

/// Load the dotenv file at `path` into the process environment and read `name`.
///
/// A missing file is fine (the variable may already be exported); a file that
/// exists but cannot be parsed is not. Unset or blank values are an error.
pub fn load_env_var(path: &Path, name: &str) -> Result<String> {
    match dotenvy::from_path(path) {
        Ok(()) => debug!("Loaded env file {}", path.display()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Env file {} not found, using process environment", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load env file {}", path.display()))
        }
    }

    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => anyhow::bail!("{} not set (checked {} and the process environment)", name, path.display()),
    }
}

/// Request body limit in bytes from a megabyte count (default when unset).
fn upload_limit_bytes(raw_mb: Option<&str>) -> Result<usize> {
    let mb = match raw_mb {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("VOCAB_MAX_UPLOAD_MB is not a number: {raw}"))?,
        None => DEFAULT_MAX_UPLOAD_MB,
    };
    mb.checked_mul(1024 * 1024)
        .with_context(|| format!("VOCAB_MAX_UPLOAD_MB is too large: {mb}"))
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
