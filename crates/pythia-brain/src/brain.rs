//! The `Brain` seam used by the dispatcher

use async_trait::async_trait;
use pythia_core::Result;
use tracing::{error, info};

use crate::client::AnthropicClient;
use crate::prompts;

/// Prefix of the text written into a file when generation fails.
pub const ERROR_PREFIX: &str = "# Error generating content:";

/// Generative backend as seen by the dispatcher.
///
/// Implementations never fail: a permanent error is returned as text
/// starting with [`ERROR_PREFIX`] so the user sees it in the file.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Content for a new file named `filename`, grounded on `context`.
    async fn generate(&self, filename: &str, extension: &str, context: &str) -> String;

    /// Full rewrite of `content` following `instruction`.
    async fn refactor(
        &self,
        filename: &str,
        extension: &str,
        content: &str,
        instruction: &str,
    ) -> String;

    /// Mermaid diagram of `code`, read from `target_filename`.
    async fn visualize(&self, target_filename: &str, code: &str) -> String;
}

/// Single-prompt text completion.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl Completer for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        AnthropicClient::complete(self, prompt)
            .await
            .map(|completion| completion.text)
    }
}

/// [`Brain`] that renders the prompt templates and sends them to a
/// [`Completer`].
#[derive(Debug, Clone)]
pub struct PromptBrain<C: Completer> {
    completer: C,
}

/// The production brain.
pub type AnthropicBrain = PromptBrain<AnthropicClient>;

impl<C: Completer> PromptBrain<C> {
    pub fn new(completer: C) -> Self {
        Self { completer }
    }

    pub fn completer(&self) -> &C {
        &self.completer
    }

    async fn run(&self, task: &str, filename: &str, prompt: String) -> String {
        info!("Brain {} for {}", task, filename);
        match self.completer.complete(&prompt).await {
            Ok(text) => prompts::clean_text(&text),
            Err(e) => {
                error!("Brain {} failed for {}: {}", task, filename, e);
                format!("{} {}", ERROR_PREFIX, e)
            }
        }
    }
}

#[async_trait]
impl<C: Completer> Brain for PromptBrain<C> {
    async fn generate(&self, filename: &str, extension: &str, context: &str) -> String {
        let prompt = prompts::generate_prompt(filename, extension, context);
        self.run("generating", filename, prompt).await
    }

    async fn refactor(
        &self,
        filename: &str,
        extension: &str,
        content: &str,
        instruction: &str,
    ) -> String {
        let prompt = prompts::refactor_prompt(filename, extension, content, instruction);
        self.run("refactoring", filename, prompt).await
    }

    async fn visualize(&self, target_filename: &str, code: &str) -> String {
        let prompt = prompts::visualize_prompt(target_filename, code);
        self.run("visualizing", target_filename, prompt).await
    }
}
