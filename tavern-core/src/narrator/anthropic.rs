//! Anthropic-backed narrator.

use super::{
    Generated, GeneratorUsage, Narrator, NarratorError, OpeningProposal, SkillOutcomeProposal,
    TurnProposal,
};
use async_trait::async_trait;
use claude::{extract_json, Claude, Request, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Output token ceiling for proposal bundles. Generous enough for a long
/// combat narrative plus a full event list.
const MAX_TOKENS: usize = 2048;

/// Narrator backed by the Anthropic messages API.
pub struct ClaudeNarrator {
    client: Claude,
}

impl ClaudeNarrator {
    pub fn new(client: Claude) -> Self {
        ClaudeNarrator { client }
    }

    /// Build a narrator from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, NarratorError> {
        Ok(ClaudeNarrator {
            client: Claude::from_env()?,
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Response, NarratorError> {
        let request = Request::new(user)
            .with_system(system)
            .with_max_tokens(MAX_TOKENS);
        let response = self.client.complete(request).await?;
        debug!(
            input = response.usage.input_tokens,
            output = response.usage.output_tokens,
            "generator call complete"
        );
        Ok(response)
    }

    fn parse<T: DeserializeOwned>(response: &Response) -> Result<T, NarratorError> {
        let json = extract_json(&response.text);
        serde_json::from_str(json).map_err(|e| NarratorError::Malformed(e.to_string()))
    }

    fn usage_of(response: &Response) -> Option<GeneratorUsage> {
        Some(GeneratorUsage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            model: response.model.clone(),
        })
    }
}

#[async_trait]
impl Narrator for ClaudeNarrator {
    async fn propose_turn(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Generated<TurnProposal>, NarratorError> {
        let response = self.complete(system, user).await?;
        Ok(Generated {
            value: Self::parse(&response)?,
            usage: Self::usage_of(&response),
        })
    }

    async fn propose_opening(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Generated<OpeningProposal>, NarratorError> {
        let response = self.complete(system, user).await?;
        Ok(Generated {
            value: Self::parse(&response)?,
            usage: Self::usage_of(&response),
        })
    }

    async fn propose_skill_outcome(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Generated<SkillOutcomeProposal>, NarratorError> {
        let response = self.complete(system, user).await?;
        Ok(Generated {
            value: Self::parse(&response)?,
            usage: Self::usage_of(&response),
        })
    }

    async fn narrate(&self, system: &str, user: &str) -> Result<Generated<String>, NarratorError> {
        let response = self.complete(system, user).await?;
        Ok(Generated {
            usage: Self::usage_of(&response),
            value: response.text,
        })
    }
}
