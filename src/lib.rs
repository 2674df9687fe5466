//! Chat adapter for the Huawei Pangu gallery API.
//!
//! Turns a provider-neutral [`Prompt`] into a gallery chat request, runs it
//! under a retry policy and maps the answer back into a [`ChatResponse`].
//!
//! ```no_run
//! use gallery_chat::{ChatClient, GalleryChatClient, GalleryConfig, Message, Prompt};
//!
//! # async fn example() -> gallery_chat::Result<()> {
//! let config = GalleryConfig::from_env()?;
//! let client = GalleryChatClient::from_config(&config)?;
//!
//! let prompt = Prompt::new(vec![
//!   Message::system("Answer in one sentence."),
//!   Message::user("What is the capital of France?"),
//! ]);
//! let response = client.call(&prompt).await?;
//! if let Some(generation) = response.result() {
//!   println!("{}", generation.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod options;
pub mod providers;
pub mod request;
pub mod failover;
pub mod client;

pub use client::{GalleryChatClient, GalleryChatClientBuilder};
pub use config::{GalleryConfig, RetryConfig};
pub use error::{Error, Result};
pub use failover::{RetryPolicy, RetryStrategy};
pub use options::{ChatOptions, EmbeddingOptions, GalleryChatOptions, PromptOptions};
pub use providers::{GalleryApi, HttpGalleryClient, LoggingStreamCallback, StreamCallback};
pub use request::{
  ChatClient, ChatResponse, Generation, Message, MessageType, Prompt,
  StreamingChatClient,
};
