//! Generation options and their merge rules

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_TEMPERATURE, DEFAULT_TOP_P};

/// Portable chat options understood by every chat model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions
{   pub temperature: Option<f32>
  , pub top_p: Option<f32>
  , pub top_k: Option<u32>
}

/// Options for embedding models; not valid on a chat prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingOptions
{   pub model: Option<String>
}

/// Options recognized by the gallery chat API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryChatOptions
{   #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>
  , /// Number of candidate answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_num: Option<u32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>
  , /// Echo the prompt back in the answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_prompt: Option<bool>
}

impl GalleryChatOptions
{   pub fn builder() -> GalleryChatOptionsBuilder
    {   GalleryChatOptionsBuilder::default()
    }

    /// Field-wise override: every field set on `runtime` wins,
    /// every unset field falls back to `defaults`
    pub fn merge(runtime: Option<&Self>, defaults: &Self) -> Self
    {   let Some(runtime) = runtime
        else
        {   return defaults.clone();
        };
        GalleryChatOptions
        {   temperature: runtime.temperature.or(defaults.temperature)
          , top_p: runtime.top_p.or(defaults.top_p)
          , max_tokens: runtime.max_tokens.or(defaults.max_tokens)
          , answer_num: runtime.answer_num.or(defaults.answer_num)
          , presence_penalty: runtime.presence_penalty
              .or(defaults.presence_penalty)
          , user: runtime.user.clone().or_else(|| defaults.user.clone())
          , with_prompt: runtime.with_prompt.or(defaults.with_prompt)
        }
    }
}

impl From<&ChatOptions> for GalleryChatOptions
{   fn from(options: &ChatOptions) -> Self
    {   GalleryChatOptions
        {   temperature: options.temperature
          , top_p: options.top_p
          , ..GalleryChatOptions::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GalleryChatOptionsBuilder
{   options: GalleryChatOptions
}

impl GalleryChatOptionsBuilder
{   pub fn temperature(mut self, temperature: f32) -> Self
    {   self.options.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self
    {   self.options.top_p = Some(top_p);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self
    {   self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn answer_num(mut self, answer_num: u32) -> Self
    {   self.options.answer_num = Some(answer_num);
        self
    }

    pub fn presence_penalty(mut self, presence_penalty: f64) -> Self
    {   self.options.presence_penalty = Some(presence_penalty);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self
    {   self.options.user = Some(user.into());
        self
    }

    pub fn with_prompt(mut self, with_prompt: bool) -> Self
    {   self.options.with_prompt = Some(with_prompt);
        self
    }

    pub fn build(self) -> GalleryChatOptions
    {   self.options
    }
}

/// Options a prompt may carry
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOptions
{   Chat(ChatOptions)
  , Gallery(GalleryChatOptions)
  , Embedding(EmbeddingOptions)
}

impl PromptOptions
{   pub fn type_name(&self) -> &'static str
    {   match self
        {   PromptOptions::Chat(_) => "ChatOptions"
          , PromptOptions::Gallery(_) => "GalleryChatOptions"
          , PromptOptions::Embedding(_) => "EmbeddingOptions"
        }
    }

    /// Resolve into gallery chat options, rejecting non-chat variants
    pub fn to_gallery_options(&self) -> crate::Result<GalleryChatOptions>
    {   match self
        {   PromptOptions::Chat(options) => Ok(options.into())
          , PromptOptions::Gallery(options) => Ok(options.clone())
          , other => Err(crate::Error::InvalidArgument(format!(
              "Prompt options are not of type ChatOptions: {}",
              other.type_name()
            )))
        }
    }
}

impl From<ChatOptions> for PromptOptions
{   fn from(options: ChatOptions) -> Self
    {   PromptOptions::Chat(options)
    }
}

impl From<GalleryChatOptions> for PromptOptions
{   fn from(options: GalleryChatOptions) -> Self
    {   PromptOptions::Gallery(options)
    }
}

impl From<EmbeddingOptions> for PromptOptions
{   fn from(options: EmbeddingOptions) -> Self
    {   PromptOptions::Embedding(options)
    }
}

/// Options used when the adapter is built without explicit defaults
pub fn default_chat_options() -> GalleryChatOptions
{   GalleryChatOptions::builder()
      .temperature(DEFAULT_TEMPERATURE)
      .top_p(DEFAULT_TOP_P)
      .build()
}
