//! # pythia-brain
//!
//! The generative backend behind Pythia's folder actions.
//!
//! - [`Brain`] is what the dispatcher talks to: generate, refactor, visualize.
//!   It never fails; a failed call comes back as an error line of text that
//!   is written into the file for the user to see.
//! - [`AnthropicClient`] sends single-turn requests to the Messages API and
//!   retries rate-limited requests with linear backoff ([`RetryPolicy`]).
//! - [`prompts`] holds the persona table and prompt templates.

mod auth;
mod brain;
mod client;
pub mod prompts;
mod retry;
mod types;

pub use auth::get_api_key;
pub use brain::{AnthropicBrain, Brain, Completer, PromptBrain, ERROR_PREFIX};
pub use client::AnthropicClient;
pub use retry::RetryPolicy;
pub use types::*;
