//! # gantt-settings
//!
//! Layered configuration for the Gantt relay.
//!
//! Settings are resolved from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: JSON, deep-merged over defaults (optional)
//! 3. **Environment variables**: `GANTT_*`, `OPENAI_BASE_URL`, `FRONTEND_ORIGIN`
//!
//! The provider API key never lives in the file; it is read from
//! `OPENAI_API_KEY` by [`api_key_from_env`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{api_key_from_env, deep_merge, load_settings, load_settings_from_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_deployment() {
        let settings = RelaySettings::default();
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.server.frontend_origin, "http://localhost:3000");
        assert_eq!(settings.server.static_dir, "../frontend/dist");
        assert_eq!(settings.llm.model, "gpt-5-nano");
        assert_eq!(settings.llm.reasoning_effort.as_deref(), Some("low"));
        assert_eq!(settings.llm.timeout_ms, 30_000);
        assert_eq!(settings.orchestrator.max_turns, 3);
        assert_eq!(settings.orchestrator.max_history_pairs, 20);
        assert_eq!(settings.orchestrator.argument_validation, ArgumentValidation::Warn);
        assert!(settings.orchestrator.notify_on_gateway_failure);
    }

    #[test]
    fn deep_merge_re_exported() {
        let merged = deep_merge(serde_json::json!({"x": 1}), serde_json::json!({"y": 2}));
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }
}
