/// Base URL used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Path of the chat endpoint relative to the base URL.
pub const CHAT_PATH: &str = "/api/chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    base_url: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl AdapterConfig {
    /// Builds a config, trimming whitespace and one trailing slash.
    ///
    /// A blank value falls back to [`DEFAULT_BASE_URL`].
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
        }
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the chat endpoint URL.
    pub fn chat_url(&self) -> String {
        format!("{}{CHAT_PATH}", self.base_url)
    }
}

/// Trims the URL and strips one trailing slash. Blank input yields the default.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_BASE_URL.to_string();
    }

    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}
