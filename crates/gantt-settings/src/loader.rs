//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{ApiKey, RelaySettings};

/// Load settings from an optional file, then apply env var overrides.
pub fn load_settings(path: Option<&Path>) -> Result<RelaySettings> {
    match path {
        Some(path) => load_settings_from_path(path),
        None => {
            let mut settings = RelaySettings::default();
            apply_env_overrides(&mut settings);
            Ok(settings)
        }
    }
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Read the provider API key from `OPENAI_API_KEY`.
pub fn api_key_from_env() -> Result<ApiKey> {
    read_env_string("OPENAI_API_KEY")
        .map(|key| ApiKey(SecretString::from(key)))
        .ok_or(SettingsError::MissingEnv("OPENAI_API_KEY"))
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("GANTT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("GANTT_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("GANTT_STATIC_DIR") {
        settings.server.static_dir = v;
    }
    if let Some(v) = read_env_string("FRONTEND_ORIGIN") {
        settings.server.frontend_origin = v;
    }

    // ── LLM ─────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("OPENAI_BASE_URL") {
        settings.llm.base_url = v;
    }
    if let Some(v) = read_env_string("GANTT_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = read_env_string("GANTT_REASONING_EFFORT") {
        settings.llm.reasoning_effort = (v != "none").then_some(v);
    }
    if let Some(v) = read_env_u64("GANTT_LLM_TIMEOUT_MS", 1000, 600_000) {
        settings.llm.timeout_ms = v;
    }

    // ── Orchestrator ────────────────────────────────────────────────
    if let Some(v) = read_env_u64("GANTT_MAX_TURNS", 1, 50) {
        settings.orchestrator.max_turns = v as u32;
    }
    if let Some(v) = read_env_u64("GANTT_MAX_HISTORY_PAIRS", 1, 1000) {
        settings.orchestrator.max_history_pairs = v as usize;
    }
    if let Some(v) = read_env_string("GANTT_ARGUMENT_VALIDATION") {
        match serde_json::from_value(Value::String(v.to_lowercase())) {
            Ok(mode) => settings.orchestrator.argument_validation = mode,
            Err(_) => tracing::warn!(key = "GANTT_ARGUMENT_VALIDATION", value = %v, "invalid validation mode, ignoring"),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("GANTT_LOG_FORMAT") {
        match serde_json::from_value(Value::String(v.to_lowercase())) {
            Ok(format) => settings.logging.format = format,
            Err(_) => tracing::warn!(key = "GANTT_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}
