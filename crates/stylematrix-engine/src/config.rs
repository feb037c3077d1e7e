use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_REQUEST_TIMEOUT_S: f64 = 300.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 600.0;

/// Everything a session needs from its environment, set once at startup.
///
/// The core never reads ambient storage: callers build this explicitly or via
/// [`SessionConfig::from_env`] and hand it to the controller and the client.
#[derive(Clone, PartialEq)]
pub struct SessionConfig {
    pub credential: Option<String>,
    pub theme_index: usize,
    pub model: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential: None,
            theme_index: 0,
            model: DEFAULT_IMAGE_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            credential: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            theme_index: defaults.theme_index,
            model: non_empty_env("STYLEMATRIX_IMAGE_MODEL").unwrap_or(defaults.model),
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            request_timeout: request_timeout_from(
                non_empty_env("STYLEMATRIX_REQUEST_TIMEOUT").as_deref(),
            ),
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        let credential = credential.into();
        let trimmed = credential.trim();
        self.credential = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_theme(mut self, theme_index: usize) -> Self {
        self.theme_index = theme_index;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_request_timeout_secs(mut self, seconds: f64) -> Self {
        self.request_timeout = Duration::from_secs_f64(clamp_timeout(seconds));
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field(
                "credential",
                &self.credential.as_ref().map(|_| "<redacted>"),
            )
            .field("theme_index", &self.theme_index)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn request_timeout_from(raw: Option<&str>) -> Duration {
    let seconds = raw
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S);
    Duration::from_secs_f64(clamp_timeout(seconds))
}

fn clamp_timeout(seconds: f64) -> f64 {
    if !seconds.is_finite() {
        return DEFAULT_REQUEST_TIMEOUT_S;
    }
    seconds.clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
