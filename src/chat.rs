use std::time::Duration;

use anyhow::{Context, Result};
use ollama_rs::Ollama;
use ollama_rs::generation::completion::request::GenerationRequest;
use tokio::time::timeout;
use tracing::instrument;

/// Discord rejects messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Sent instead of a completion when the endpoint fails or times out.
pub const FALLBACK_REPLY: &str =
    "Sorry, I can't think straight right now. Please try again in a bit.";

pub struct ChatClient {
    ollama: Ollama,
    model: String,
}

impl ChatClient {
    pub fn new(host: &str, port: u16, model: String) -> Self {
        Self {
            ollama: Ollama::new(host.to_string(), port),
            model,
        }
    }

    /// One-turn completion: the user's text plus the fixed persona, clipped to
    /// the platform message limit.
    #[instrument(level = "trace", skip_all)]
    pub async fn reply(&self, author: &str, prompt: &str) -> Result<String> {
        let result = timeout(
            Duration::from_mins(2),
            self.ollama.generate(
                GenerationRequest::new(
                    self.model.clone(),
                    format!("Author: {author}\nMessage: {prompt}"),
                )
                .system(include_str!("../persona.txt")),
            ),
        )
        .await
        .context("LLM request timed out")?
        .context("LLM generation failed")?;

        Ok(truncate_reply(result.response, MESSAGE_LIMIT))
    }
}

/// Clip a reply to the platform message limit without splitting a character.
fn truncate_reply(text: String, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text;
    }
    text.chars()
        .take(limit.saturating_sub(1))
        .chain(std::iter::once('…'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_replies_pass_through_untouched() {
        assert_eq!(truncate_reply("hello".to_string(), 2000), "hello");
    }

    #[test]
    fn long_replies_are_clipped_to_the_limit() {
        let clipped = truncate_reply("a".repeat(3000), 2000);
        assert_eq!(clipped.chars().count(), 2000);
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn clipping_respects_multibyte_characters() {
        let clipped = truncate_reply("ä".repeat(10), 5);
        assert_eq!(clipped.chars().count(), 5);
        assert!(clipped.ends_with('…'));
    }
}
