use thiserror::Error as ThisError;

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gallery chat operations
/// Implements Clone so retry loops can keep the last failure
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error
{   /// A required argument was missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String)
  , /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String)
  , /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(String)
  , /// Gallery API returned a non-success status
    #[error("API error ({status}): {message}")]
    ApiError
    {   status: u16
      , message: String
    }
  , /// Failed to parse a gallery payload
    #[error("Parse error: {0}")]
    ParseError(String)
  , /// Rate limit exceeded
    #[error("API rate limit exceeded")]
    RateLimitExceeded
  , /// Timeout error
    #[error("Request timed out")]
    Timeout
  , /// Generic error
    #[error("Error: {0}")]
    Other(String)
}

impl Error
{   /// Whether a retry policy may re-run the failed call
    pub fn is_retryable(&self) -> bool
    {   match self
        {   Error::HttpError(_)
          | Error::RateLimitExceeded
          | Error::Timeout => true
          , Error::ApiError { status, .. } => *status >= 500
          , _ => false
        }
    }
}

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   if e.is_timeout()
        {   Error::Timeout
        } else if e.is_decode()
        {   Error::ParseError(e.to_string())
        } else
        {   Error::HttpError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::ParseError(e.to_string())
    }
}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
