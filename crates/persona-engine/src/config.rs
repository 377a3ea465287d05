use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OUT_DIR: &str = "persona-gen-out";

const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 300.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_base: String,
    /// Requested image model; `None` picks the registry default.
    pub model: Option<String>,
    pub request_timeout_s: f64,
    pub out_dir: PathBuf,
    pub events_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: None,
            request_timeout_s: DEFAULT_REQUEST_TIMEOUT_S,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            events_path: None,
        }
    }
}

impl EngineConfig {
    /// Reads `GEMINI_API_BASE`, `PERSONA_GEN_MODEL` and
    /// `PERSONA_GEN_REQUEST_TIMEOUT`. Credentials are resolved per call
    /// instead.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let defaults = Self::default();
        Self {
            api_base: value("GEMINI_API_BASE")
                .map(|raw| raw.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            model: value("PERSONA_GEN_MODEL"),
            request_timeout_s: value("PERSONA_GEN_REQUEST_TIMEOUT")
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|seconds| seconds.is_finite())
                .map(|seconds| seconds.clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S))
                .unwrap_or(defaults.request_timeout_s),
            ..defaults
        }
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_events_path(mut self, events_path: Option<PathBuf>) -> Self {
        self.events_path = events_path;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if model.is_some() {
            self.model = model;
        }
        self
    }

    pub fn resolved_events_path(&self) -> PathBuf {
        self.events_path
            .clone()
            .unwrap_or_else(|| self.out_dir.join("events.jsonl"))
    }
}
