use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::StreamExt;
use log::{debug, trace, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::GalleryConfig;
use crate::error::{Error, Result};

// ===== Message Types =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryChatMessage
{   pub role: String
  , pub content: String
}

impl GalleryChatMessage
{   pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self
    {   GalleryChatMessage
        {   role: role.into()
          , content: content.into()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryChatReq
{   pub messages: Vec<GalleryChatMessage>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>
  , #[serde(rename = "n", skip_serializing_if = "Option::is_none")]
    pub answer_num: Option<u32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub with_prompt: Option<bool>
  , #[serde(rename = "stream")]
    pub is_stream: bool
}

impl GalleryChatReq
{   /// Request carrying a single user message and no options
    pub fn from_text(content: impl Into<String>, is_stream: bool) -> Self
    {   GalleryChatReq
        {   messages: vec![GalleryChatMessage::new("user", content)]
          , is_stream
          , ..GalleryChatReq::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryUsage
{   #[serde(default)]
    pub prompt_tokens: u64
  , #[serde(default)]
    pub completion_tokens: u64
  , #[serde(default)]
    pub total_tokens: u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice
{   #[serde(default)]
    pub index: u32
  , pub message: GalleryChatMessage
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryChatResp
{   pub id: String
  , #[serde(default)]
    pub created: Option<i64>
  , #[serde(default)]
    pub choices: Vec<Choice>
  , #[serde(default)]
    pub usage: Option<GalleryUsage>
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta
{   #[serde(default)]
    pub role: Option<String>
  , #[serde(default)]
    pub content: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice
{   #[serde(default)]
    pub index: u32
  , #[serde(default)]
    pub delta: ChunkDelta
  , #[serde(default)]
    pub finish_reason: Option<String>
}

/// One server-sent event of a streaming answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryChatChunk
{   #[serde(default)]
    pub id: Option<String>
  , #[serde(default)]
    pub created: Option<i64>
  , #[serde(default)]
    pub choices: Vec<ChunkChoice>
  , #[serde(default)]
    pub usage: Option<GalleryUsage>
}

// ===== Streaming Callback =====

/// Receives incremental chunks while a streaming call is in flight
pub trait StreamCallback: Send + Sync
{   fn on_message(&self, chunk: &GalleryChatChunk);

    fn on_complete(&self) {}

    fn on_error(&self, _error: &Error) {}
}

/// Default callback; traces every chunk
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingStreamCallback;

impl StreamCallback for LoggingStreamCallback
{   fn on_message(&self, chunk: &GalleryChatChunk)
    {   trace!("Gallery stream chunk: {:?}", chunk);
    }

    fn on_complete(&self)
    {   debug!("Gallery stream complete");
    }

    fn on_error(&self, error: &Error)
    {   error!("Gallery stream failed: {}", error);
    }
}

// ===== Gallery Client =====

/// Vendor client surface consumed by the chat adapter.
///
/// `Ok(None)` means the service answered without a completion.
#[async_trait]
pub trait GalleryApi: Send + Sync
{   async fn create_chat_text(
      &self
    , content: &str
    ) -> Result<Option<GalleryChatResp>>;

    async fn create_chat(
      &self
    , request: &GalleryChatReq
    ) -> Result<Option<GalleryChatResp>>;

    async fn create_stream_chat_text(
      &self
    , content: &str
    , callback: &dyn StreamCallback
    ) -> Result<Option<GalleryChatResp>>;

    async fn create_stream_chat(
      &self
    , request: &GalleryChatReq
    , callback: &dyn StreamCallback
    ) -> Result<Option<GalleryChatResp>>;
}

/// `GalleryApi` over HTTP
pub struct HttpGalleryClient
{   endpoint: String
  , api_key: Option<String>
  , http_client: reqwest::Client
}

impl std::fmt::Debug for HttpGalleryClient
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {   f.debug_struct("HttpGalleryClient")
          .field("endpoint", &self.endpoint)
          .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
          .finish()
    }
}

impl HttpGalleryClient
{   pub fn new(config: &GalleryConfig) -> Result<Self>
    {   config.validate()?;
        debug!("Creating HttpGalleryClient for {}", config.api_base);
        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(config.timeout_secs))
          .build()
          .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            Error::InvalidConfiguration(e.to_string())
          })?;
        Ok(HttpGalleryClient
        {   endpoint: format!(
              "{}/chat/completions",
              config.api_base.trim_end_matches('/')
            )
          , api_key: config.api_key.clone()
          , http_client
        })
    }

    pub fn endpoint(&self) -> &str
    {   &self.endpoint
    }

    /// Send the request; `None` when the service answered 204
    async fn post(
      &self
    , request: &GalleryChatReq
    ) -> Result<Option<reqwest::Response>>
    {   trace!("Gallery request: {:?}", request);

        let mut builder = self.http_client
          .post(&self.endpoint)
          .header("Content-Type", "application/json")
          .json(request);
        if let Some(key) = &self.api_key
        {   builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
          error!("HTTP error: {}", e);
          Error::from(e)
        })?;

        let status = response.status();
        trace!("Gallery response status: {}", status);

        if status == reqwest::StatusCode::NO_CONTENT
        {   return Ok(None);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {   warn!("Gallery rate limit hit");
            return Err(Error::RateLimitExceeded);
        }
        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Gallery API error {}: {}", status, error_text);
            return Err(Error::ApiError
            {   status: status.as_u16()
              , message: error_text
            });
        }
        Ok(Some(response))
    }

    async fn read_completion(
      &self
    , request: &GalleryChatReq
    ) -> Result<Option<GalleryChatResp>>
    {   let Some(response) = self.post(request).await?
        else
        {   return Ok(None);
        };
        let body = response.bytes().await.map_err(|e| {
          error!("Failed to read response body: {}", e);
          Error::from(e)
        })?;
        if body.iter().all(u8::is_ascii_whitespace)
        {   debug!("Gallery returned an empty body");
            return Ok(None);
        }
        let chat_response: GalleryChatResp
          = serde_json::from_slice(&body).map_err(|e| {
            error!("Parse error: {}", e);
            Error::ParseError(e.to_string())
          })?;
        debug!(
          "Gallery response {} with {} choice(s)",
          chat_response.id, chat_response.choices.len()
        );
        Ok(Some(chat_response))
    }

    async fn read_stream(
      &self
    , request: &GalleryChatReq
    , callback: &dyn StreamCallback
    ) -> Result<Option<GalleryChatResp>>
    {   let Some(response) = self.post(request).await?
        else
        {   return Ok(None);
        };

        let mut events = response.bytes_stream().eventsource();
        let mut accumulator = StreamAccumulator::default();

        while let Some(event) = events.next().await
        {   let event = event.map_err(|e| match e
            {   EventStreamError::Transport(e) => Error::from(e)
              , other => {
                  error!("Malformed event stream: {}", other);
                  Error::ParseError(other.to_string())
                }
            })?;
            if handle_event(&event, &mut accumulator, callback)?
            {   break;
            }
        }

        Ok(accumulator.finish())
    }

    async fn stream_with_callback(
      &self
    , request: &GalleryChatReq
    , callback: &dyn StreamCallback
    ) -> Result<Option<GalleryChatResp>>
    {   match self.read_stream(request, callback).await
        {   Ok(response) => {
              callback.on_complete();
              Ok(response)
            }
          , Err(e) => {
              callback.on_error(&e);
              Err(e)
            }
        }
    }
}

/// Feed one SSE event; returns true once the terminator was seen
fn handle_event(
  event: &Event
, accumulator: &mut StreamAccumulator
, callback: &dyn StreamCallback
) -> Result<bool>
{   let data = event.data.trim();
    if data.is_empty()
    {   return Ok(false);
    }
    if data == "[DONE]"
    {   return Ok(true);
    }
    let chunk: GalleryChatChunk = serde_json::from_str(data)
      .map_err(|e| {
        error!("Failed to parse stream chunk: {}", e);
        Error::ParseError(e.to_string())
      })?;
    callback.on_message(&chunk);
    accumulator.push(chunk);
    Ok(false)
}

#[async_trait]
impl GalleryApi for HttpGalleryClient
{   async fn create_chat_text(
      &self
    , content: &str
    ) -> Result<Option<GalleryChatResp>>
    {   self.read_completion(&GalleryChatReq::from_text(content, false))
          .await
    }

    async fn create_chat(
      &self
    , request: &GalleryChatReq
    ) -> Result<Option<GalleryChatResp>>
    {   self.read_completion(request).await
    }

    async fn create_stream_chat_text(
      &self
    , content: &str
    , callback: &dyn StreamCallback
    ) -> Result<Option<GalleryChatResp>>
    {   let request = GalleryChatReq::from_text(content, true);
        self.stream_with_callback(&request, callback).await
    }

    async fn create_stream_chat(
      &self
    , request: &GalleryChatReq
    , callback: &dyn StreamCallback
    ) -> Result<Option<GalleryChatResp>>
    {   self.stream_with_callback(request, callback).await
    }
}

// ===== Stream Accumulation =====

#[derive(Debug, Default)]
struct ChoiceState
{   role: Option<String>
  , content: String
  , finish_reason: Option<String>
}

/// Folds stream chunks into one complete response
#[derive(Debug, Default)]
pub(crate) struct StreamAccumulator
{   id: Option<String>
  , created: Option<i64>
  , choices: BTreeMap<u32, ChoiceState>
  , usage: Option<GalleryUsage>
  , chunks: usize
}

impl StreamAccumulator
{   pub(crate) fn push(&mut self, chunk: GalleryChatChunk)
    {   self.chunks += 1;
        if self.id.is_none()
        {   self.id = chunk.id;
        }
        if self.created.is_none()
        {   self.created = chunk.created;
        }
        if chunk.usage.is_some()
        {   self.usage = chunk.usage;
        }
        for choice in chunk.choices
        {   let state = self.choices.entry(choice.index).or_default();
            if let Some(role) = choice.delta.role
            {   state.role = Some(role);
            }
            if let Some(content) = choice.delta.content
            {   state.content.push_str(&content);
            }
            if choice.finish_reason.is_some()
            {   state.finish_reason = choice.finish_reason;
            }
        }
    }

    pub(crate) fn finish(self) -> Option<GalleryChatResp>
    {   if self.chunks == 0
        {   return None;
        }
        let choices = self.choices
          .into_iter()
          .map(|(index, state)| Choice
          {   index
            , message: GalleryChatMessage
              {   role: state.role
                    .unwrap_or_else(|| "assistant".to_string())
                , content: state.content
              }
            , finish_reason: state.finish_reason
          })
          .collect();
        Some(GalleryChatResp
        {   id: self.id.unwrap_or_default()
          , created: self.created
          , choices
          , usage: self.usage
        })
    }
}
