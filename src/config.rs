//! Configuration for the gallery client and retry behavior

use serde::{Deserialize, Serialize};
use log::debug;
use std::path::Path;

/// Default sampling temperature applied when no options are supplied
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default nucleus sampling value applied when no options are supplied
pub const DEFAULT_TOP_P: f32 = 1.0;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENV_API_BASE: &str = "GALLERY_API_BASE";
pub const ENV_API_KEY: &str = "GALLERY_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "GALLERY_TIMEOUT_SECS";

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig
{   /// Total attempts, including the first call
    pub max_attempts: usize
  , /// Backoff multiplier for retries
    pub backoff_multiplier: f32
  , /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64
}

impl Default for RetryConfig
{   fn default() -> Self
    {   RetryConfig
        {   max_attempts: 3
          , backoff_multiplier: 2.0
          , initial_backoff_ms: 100
        }
    }
}

/// Gallery endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryConfig
{   /// API base URL, without the trailing `/chat/completions`
    pub api_base: String
  , /// Bearer token, if the deployment requires one
    #[serde(default)]
    pub api_key: Option<String>
  , /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64
  , #[serde(default)]
    pub retry: RetryConfig
}

fn default_timeout_secs() -> u64
{   DEFAULT_TIMEOUT_SECS
}

impl GalleryConfig
{   pub fn new(api_base: impl Into<String>) -> Self
    {   GalleryConfig
        {   api_base: api_base.into()
          , api_key: None
          , timeout_secs: DEFAULT_TIMEOUT_SECS
          , retry: RetryConfig::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self
    {   self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self
    {   self.timeout_secs = secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self
    {   self.retry = retry;
        self
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(json: &str) -> crate::Result<Self>
    {   let config: GalleryConfig = serde_json::from_str(json)
          .map_err(|e| crate::Error::InvalidConfiguration(
            e.to_string()
          ))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self>
    {   let path = path.as_ref();
        debug!("Loading gallery config from {}", path.display());
        let raw = std::fs::read_to_string(path)
          .map_err(|e| crate::Error::InvalidConfiguration(
            format!("{}: {}", path.display(), e)
          ))?;
        Self::from_json_str(&raw)
    }

    /// Build configuration from `GALLERY_*` environment variables
    pub fn from_env() -> crate::Result<Self>
    {   let api_base = std::env::var(ENV_API_BASE)
          .map_err(|_| crate::Error::InvalidConfiguration(
            format!("{} not set", ENV_API_BASE)
          ))?;
        let mut config = GalleryConfig::new(api_base);
        config.api_key = std::env::var(ENV_API_KEY).ok();
        if let Ok(raw) = std::env::var(ENV_TIMEOUT_SECS)
        {   config.timeout_secs = raw.parse()
              .map_err(|_| crate::Error::InvalidConfiguration(
                format!("{} is not a number: {}", ENV_TIMEOUT_SECS, raw)
              ))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()>
    {   if self.api_base.trim().is_empty()
        {   return Err(crate::Error::InvalidConfiguration(
              "api_base must not be empty".to_string()
            ));
        }
        if self.retry.max_attempts == 0
        {   return Err(crate::Error::InvalidConfiguration(
              "retry.max_attempts must be at least 1".to_string()
            ));
        }
        Ok(())
    }
}
