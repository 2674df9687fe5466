use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, trace, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GalleryConfig;
use crate::error::{Error, Result};
use crate::failover::{execute_with_retry, RetryPolicy, RetryStrategy};
use crate::options::{default_chat_options, GalleryChatOptions};
use crate::providers::gallery::{
  Choice, GalleryApi, GalleryChatMessage, GalleryChatReq, GalleryChatResp,
  HttpGalleryClient, LoggingStreamCallback, StreamCallback,
};
use crate::request::{
  ChatClient, ChatResponse, ChatResponseMetadata, Generation,
  GenerationMetadata, MessageType, Prompt, StreamingChatClient, Usage,
};

/// Object kind recorded on every generation
pub const CHAT_COMPLETION: &str = "chat.completion";

/// Chat model backed by the Pangu gallery API
pub struct GalleryChatClient
{   /// Options applied to every request unless the prompt overrides them
    default_options: GalleryChatOptions
  , gallery_client: Arc<dyn GalleryApi>
  , stream_callback: Arc<dyn StreamCallback>
  , retry_policy: Arc<dyn RetryStrategy>
}

impl std::fmt::Debug for GalleryChatClient
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {   f.debug_struct("GalleryChatClient")
          .field("default_options", &self.default_options)
          .field("max_attempts", &self.retry_policy.max_attempts())
          .finish_non_exhaustive()
    }
}

impl GalleryChatClient
{   /// Adapter with the default callback, options and retry policy
    pub fn new(gallery_client: Arc<dyn GalleryApi>) -> Self
    {   GalleryChatClient
        {   default_options: default_chat_options()
          , gallery_client
          , stream_callback: Arc::new(LoggingStreamCallback)
          , retry_policy: Arc::new(RetryPolicy::default())
        }
    }

    pub fn builder() -> GalleryChatClientBuilder
    {   GalleryChatClientBuilder::default()
    }

    /// Adapter over `HttpGalleryClient`, retrying per `config.retry`
    pub fn from_config(config: &GalleryConfig) -> Result<Self>
    {   let http = HttpGalleryClient::new(config)?;
        GalleryChatClient::builder()
          .gallery_client(Arc::new(http))
          .retry_policy(Arc::new(RetryPolicy::from(&config.retry)))
          .build()
    }

    pub fn default_options(&self) -> &GalleryChatOptions
    {   &self.default_options
    }

    /// Build the structured request for a multi-instruction prompt
    pub fn create_request(
      &self
    , prompt: &Prompt
    , stream: bool
    ) -> Result<GalleryChatReq>
    {   let runtime = runtime_options(prompt)?;
        Ok(self.build_request(prompt, runtime.as_ref(), stream))
    }

    fn build_request(
      &self
    , prompt: &Prompt
    , runtime: Option<&GalleryChatOptions>
    , stream: bool
    ) -> GalleryChatReq
    {   let messages: Vec<GalleryChatMessage> = prompt.instructions()
          .iter()
          .filter_map(|m| {
            to_role(m.message_type)
              .map(|role| GalleryChatMessage::new(role, m.content.clone()))
          })
          .collect();

        let merged
          = GalleryChatOptions::merge(runtime, &self.default_options);
        trace!("Merged gallery options: {:?}", merged);

        GalleryChatReq
        {   messages
          , temperature: merged.temperature.map(f64::from)
          , top_p: merged.top_p.map(f64::from)
          , max_tokens: merged.max_tokens
          , answer_num: merged.answer_num
          , presence_penalty: merged.presence_penalty
          , user: merged.user
          , with_prompt: merged.with_prompt
          , is_stream: stream
        }
    }

    /// Reject empty prompts and non-chat options before any vendor call
    fn check_prompt(prompt: &Prompt) -> Result<Option<GalleryChatOptions>>
    {   if prompt.instructions().is_empty()
        {   return Err(Error::InvalidArgument(
              "At least one text is required!".to_string()
            ));
        }
        runtime_options(prompt)
    }
}

#[async_trait]
impl ChatClient for GalleryChatClient
{   async fn call(&self, prompt: &Prompt) -> Result<ChatResponse>
    {   let runtime = Self::check_prompt(prompt)?;
        let runtime = runtime.as_ref();
        let this = self;

        let response = execute_with_retry(
          self.retry_policy.as_ref()
        , || async move {
            match prompt.instructions()
            {   [only] => {
                  debug!("Single instruction, sending raw text");
                  this.gallery_client
                    .create_chat_text(&only.content)
                    .await
                }
              , _ => {
                  let request = this.build_request(prompt, runtime, false);
                  this.gallery_client.create_chat(&request).await
                }
            }
          }
        ).await?;

        match response
        {   Some(resp) => Ok(to_chat_response(&resp))
          , None => {
              warn!("No chat completion returned for prompt: {:?}", prompt);
              Ok(ChatResponse::empty())
            }
        }
    }
}

#[async_trait]
impl StreamingChatClient for GalleryChatClient
{   async fn stream(
      &self
    , prompt: &Prompt
    ) -> Result<BoxStream<'static, ChatResponse>>
    {   let runtime = Self::check_prompt(prompt)?;
        let runtime = runtime.as_ref();
        let this = self;

        let response = execute_with_retry(
          self.retry_policy.as_ref()
        , || async move {
            let callback = this.stream_callback.as_ref();
            match prompt.instructions()
            {   [only] => {
                  this.gallery_client
                    .create_stream_chat_text(&only.content, callback)
                    .await
                }
              , _ => {
                  let request = this.build_request(prompt, runtime, true);
                  this.gallery_client
                    .create_stream_chat(&request, callback)
                    .await
                }
            }
          }
        ).await?;

        match response
        {   Some(resp) => {
              let converted = to_chat_response(&resp);
              Ok(stream::once(async move { converted }).boxed())
            }
          , None => {
              warn!("No chat completion returned for prompt: {:?}", prompt);
              Ok(stream::empty().boxed())
            }
        }
    }
}

#[derive(Default)]
pub struct GalleryChatClientBuilder
{   gallery_client: Option<Arc<dyn GalleryApi>>
  , stream_callback: Option<Arc<dyn StreamCallback>>
  , default_options: Option<GalleryChatOptions>
  , retry_policy: Option<Arc<dyn RetryStrategy>>
}

impl GalleryChatClientBuilder
{   pub fn gallery_client(mut self, client: Arc<dyn GalleryApi>) -> Self
    {   self.gallery_client = Some(client);
        self
    }

    pub fn stream_callback(mut self, callback: Arc<dyn StreamCallback>) -> Self
    {   self.stream_callback = Some(callback);
        self
    }

    pub fn default_options(mut self, options: GalleryChatOptions) -> Self
    {   self.default_options = Some(options);
        self
    }

    pub fn retry_policy(mut self, policy: Arc<dyn RetryStrategy>) -> Self
    {   self.retry_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<GalleryChatClient>
    {   let gallery_client = self.gallery_client
          .ok_or_else(|| Error::InvalidArgument(
            "GalleryClient must not be null".to_string()
          ))?;
        Ok(GalleryChatClient
        {   default_options: self.default_options
              .unwrap_or_else(default_chat_options)
          , gallery_client
          , stream_callback: self.stream_callback
              .unwrap_or_else(|| Arc::new(LoggingStreamCallback))
          , retry_policy: self.retry_policy
              .unwrap_or_else(|| Arc::new(RetryPolicy::default()))
        })
    }
}

fn runtime_options(prompt: &Prompt) -> Result<Option<GalleryChatOptions>>
{   prompt.options()
      .map(|options| options.to_gallery_options())
      .transpose()
}

/// Gallery role for a message type; `None` for types the API does not take
fn to_role(message_type: MessageType) -> Option<&'static str>
{   match message_type
    {   MessageType::User => Some("user")
      , MessageType::Assistant => Some("assistant")
      , MessageType::System => Some("system")
      , MessageType::Function => None
    }
}

fn extract_usage(resp: &GalleryChatResp) -> Usage
{   resp.usage
      .map(|u| Usage
      {   prompt_tokens: u.prompt_tokens
        , generation_tokens: u.completion_tokens
        , total_tokens: u.total_tokens
      })
      .unwrap_or_default()
}

fn choice_info(resp: &GalleryChatResp, choice: &Choice) -> HashMap<String, Value>
{   let mut info = HashMap::new();
    info.insert("id".to_string(), Value::from(resp.id.clone()));
    info.insert("index".to_string(), Value::from(choice.index));
    info.insert("role".to_string(), Value::from(choice.message.role.clone()));
    if let Some(reason) = &choice.finish_reason
    {   info.insert("finishReason".to_string(), Value::from(reason.clone()));
    }
    if let Some(created) = resp.created
    {   info.insert("created".to_string(), Value::from(created));
    }
    info
}

fn to_chat_response(resp: &GalleryChatResp) -> ChatResponse
{   let usage = extract_usage(resp);
    let generations = resp.choices
      .iter()
      .map(|choice| {
        Generation::new(
          choice.message.content.clone(),
          choice_info(resp, choice)
        )
        .with_metadata(GenerationMetadata
        {   kind: CHAT_COMPLETION.to_string()
          , usage
        })
      })
      .collect();

    ChatResponse::new(generations, ChatResponseMetadata
    {   id: Some(resp.id.clone())
      , usage
    })
}
