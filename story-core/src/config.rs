//! Engine and provider configuration.

use crate::retry::RetryPolicy;
use crate::scene::Genre;
use std::time::Duration;

/// Configuration for a `StoryEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Step horizon of every story this engine starts. Always at least 1.
    pub max_scenes: u32,

    /// Retry policy applied to every generator call.
    pub retry: RetryPolicy,

    /// Genre used when none is requested and the analysis suggests nothing known.
    pub default_genre: Genre,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_scenes: 10,
            retry: RetryPolicy::default(),
            default_genre: Genre::Adventure,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step horizon. Zero is raised to 1.
    pub fn with_max_scenes(mut self, max_scenes: u32) -> Self {
        self.max_scenes = max_scenes.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_genre(mut self, genre: Genre) -> Self {
        self.default_genre = genre;
        self
    }
}

/// Sampling settings for one kind of chat request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Configuration for the GRS AI backed generators.
#[derive(Debug, Clone)]
pub struct GrsConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub draw_model: String,
    pub analysis: Sampling,
    pub opening: Sampling,
    pub continuation: Sampling,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl GrsConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.grsai.com";
    pub const DEFAULT_CHAT_MODEL: &'static str = "gemini-2.5-flash-lite";
    pub const DEFAULT_DRAW_MODEL: &'static str = "nano-banana-fast";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            chat_model: Self::DEFAULT_CHAT_MODEL.to_string(),
            draw_model: Self::DEFAULT_DRAW_MODEL.to_string(),
            analysis: Sampling {
                temperature: 0.7,
                max_tokens: 2000,
            },
            opening: Sampling {
                temperature: 0.7,
                max_tokens: 800,
            },
            continuation: Sampling {
                temperature: 0.75,
                max_tokens: 1500,
            },
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Read `GRS_AI_API_KEY` (required) and the optional `GRS_AI_BASE_URL`,
    /// `GRS_AI_CHAT_MODEL` and `GRS_AI_DRAW_MODEL` overrides.
    pub fn from_env() -> Result<Self, grsai::Error> {
        let api_key = std::env::var("GRS_AI_API_KEY").map_err(|_| grsai::Error::NoApiKey)?;
        if api_key.trim().is_empty() {
            return Err(grsai::Error::NoApiKey);
        }

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("GRS_AI_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Ok(model) = std::env::var("GRS_AI_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Ok(model) = std::env::var("GRS_AI_DRAW_MODEL") {
            config.draw_model = model;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_draw_model(mut self, model: impl Into<String>) -> Self {
        self.draw_model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the API client this configuration describes.
    pub fn client(&self) -> grsai::GrsAi {
        grsai::GrsAi::with_timeout(self.api_key.clone(), self.request_timeout)
            .with_base_url(self.base_url.clone())
            .with_chat_model(self.chat_model.clone())
            .with_draw_model(self.draw_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_scenes, 10);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.backoff, Duration::from_secs(1));
        assert_eq!(config.default_genre, Genre::Adventure);
    }

    #[test]
    fn test_zero_max_scenes() {
        assert_eq!(EngineConfig::new().with_max_scenes(0).max_scenes, 1);
    }

    #[test]
    fn test_grs_client_uses_config() {
        let client = GrsConfig::new("key")
            .with_base_url("http://localhost:9000/")
            .client();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }
}
