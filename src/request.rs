//! Provider-neutral chat prompt and response types

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::options::PromptOptions;

/// Kind of chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType
{   User
  , Assistant
  , System
  , /// Tool/function output; not forwarded to the gallery API
    Function
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message
{   pub message_type: MessageType
  , pub content: String
}

impl Message
{   pub fn new(message_type: MessageType, content: impl Into<String>) -> Self
    {   Message
        {   message_type
          , content: content.into()
        }
    }

    pub fn user(content: impl Into<String>) -> Self
    {   Self::new(MessageType::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   Self::new(MessageType::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self
    {   Self::new(MessageType::System, content)
    }

    pub fn function(content: impl Into<String>) -> Self
    {   Self::new(MessageType::Function, content)
    }
}

/// Ordered instructions plus optional per-call options
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt
{   instructions: Vec<Message>
  , options: Option<PromptOptions>
}

impl Prompt
{   pub fn new(instructions: Vec<Message>) -> Self
    {   Prompt
        {   instructions
          , options: None
        }
    }

    pub fn with_options(mut self, options: impl Into<PromptOptions>) -> Self
    {   self.options = Some(options.into());
        self
    }

    pub fn instructions(&self) -> &[Message]
    {   &self.instructions
    }

    pub fn options(&self) -> Option<&PromptOptions>
    {   self.options.as_ref()
    }
}

impl From<&str> for Prompt
{   fn from(text: &str) -> Self
    {   Prompt::new(vec![Message::user(text)])
    }
}

/// Token accounting reported by the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage
{   pub prompt_tokens: u64
  , pub generation_tokens: u64
  , pub total_tokens: u64
}

/// Metadata attached to one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata
{   /// Object kind, e.g. `chat.completion`
    pub kind: String
  , pub usage: Usage
}

/// One response candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation
{   pub text: String
  , /// Provider fields describing the choice this came from
    pub info: HashMap<String, Value>
  , pub metadata: Option<GenerationMetadata>
}

impl Generation
{   pub fn new(text: impl Into<String>, info: HashMap<String, Value>) -> Self
    {   Generation
        {   text: text.into()
          , info
          , metadata: None
        }
    }

    pub fn with_metadata(mut self, metadata: GenerationMetadata) -> Self
    {   self.metadata = Some(metadata);
        self
    }
}

/// Response-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponseMetadata
{   pub id: Option<String>
  , pub usage: Usage
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse
{   pub generations: Vec<Generation>
  , pub metadata: ChatResponseMetadata
}

impl ChatResponse
{   pub fn new(
      generations: Vec<Generation>
    , metadata: ChatResponseMetadata
    ) -> Self
    {   ChatResponse
        {   generations
          , metadata
        }
    }

    /// Response with no generations
    pub fn empty() -> Self
    {   Self::default()
    }

    pub fn is_empty(&self) -> bool
    {   self.generations.is_empty()
    }

    /// First generation, if any
    pub fn result(&self) -> Option<&Generation>
    {   self.generations.first()
    }
}

/// Blocking-style chat model
#[async_trait]
pub trait ChatClient: Send + Sync
{   async fn call(&self, prompt: &Prompt) -> crate::Result<ChatResponse>;
}

/// Chat model that delivers responses as a stream
#[async_trait]
pub trait StreamingChatClient: Send + Sync
{   async fn stream(
      &self
    , prompt: &Prompt
    ) -> crate::Result<BoxStream<'static, ChatResponse>>;
}
