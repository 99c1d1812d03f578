//! bedrock-preview library
//!
//! Sends a prompt to an AWS Bedrock Titan text model and classifies the links
//! in the generated text as embeddable video or image media.
//!
//! ```no_run
//! use bedrock_preview::config;
//! use bedrock_preview::generation::{self, BedrockClient};
//! use bedrock_preview::media;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = config::load_config(None)?;
//! let client = BedrockClient::from_config(&cfg)?;
//! let result = generation::generate(&client, "Recommend a nature documentary", &cfg.model.generation()).await?;
//! if let Some(text) = result.text() {
//!     let links = media::classify(text);
//!     println!("{} video(s), {} image(s)", links.video_links.len(), links.image_links.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod generation;
pub mod logging;
pub mod media;
