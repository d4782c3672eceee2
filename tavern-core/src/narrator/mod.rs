//! The narrative generator seam.
//!
//! Everything the engine knows about the generator lives behind the
//! [`Narrator`] trait: it takes prompts and returns structured proposal
//! bundles, and nothing it returns touches game state until the
//! dispatcher has validated it. The production implementation talks to
//! the Anthropic API; tests script a mock.

mod anthropic;
pub mod prompts;

pub use anthropic::ClaudeNarrator;

use crate::events::GameEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the generator boundary.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("generator API error: {0}")]
    Api(#[from] claude::Error),
    #[error("malformed generator reply: {0}")]
    Malformed(String),
}

/// Token accounting for one generator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
}

impl GeneratorUsage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A generator reply plus its usage, when the backend reports one.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub value: T,
    pub usage: Option<GeneratorUsage>,
}

impl<T> Generated<T> {
    /// Wrap a value with no usage attached; mocks use this.
    pub fn bare(value: T) -> Self {
        Generated { value, usage: None }
    }
}

// ==== Proposal bundle wire types ====
//
// Field names mirror what the generator is prompted to emit. Everything
// defaults: a generator that omits a section must not fail the turn.

/// The full structured response for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnProposal {
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub events: Vec<GameEvent>,
    #[serde(default)]
    pub new_npcs: Vec<NpcIntro>,
    #[serde(default)]
    pub quest_updates: Vec<QuestUpdate>,
    #[serde(default)]
    pub location_change: Option<LocationChange>,
    #[serde(default)]
    pub skill_checks: Vec<SkillCheckRequest>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default)]
    pub enemies: Vec<EnemyProposal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NpcIntro {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "personalityTraits", default)]
    pub personality: String,
    #[serde(rename = "currentLocation", default)]
    pub location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestUpdate {
    #[serde(rename = "questTitle", default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationChange {
    #[serde(rename = "newLocation", default)]
    pub new_location: String,
    #[serde(rename = "locationType", default)]
    pub location_type: String,
    #[serde(default)]
    pub description: String,
}

/// A proposed attribute-vs-difficulty check. The generator never resolves
/// these itself; the dice stay on our side of the boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillCheckRequest {
    #[serde(default)]
    pub attribute: String,
    #[serde(default)]
    pub difficulty: i32,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnemyProposal {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hp: i32,
    #[serde(rename = "maxHP", default)]
    pub max_hp: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attack: i32,
}

/// The opening-scene response: narrative plus first action options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpeningProposal {
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

/// Consequences of an already-rolled skill check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillOutcomeProposal {
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub events: Vec<GameEvent>,
}

/// An external narrative generator.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Propose a full turn bundle for the given prompts.
    async fn propose_turn(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Generated<TurnProposal>, NarratorError>;

    /// Propose an opening scene for a new game.
    async fn propose_opening(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Generated<OpeningProposal>, NarratorError>;

    /// Narrate the consequences of a skill check whose result is known.
    async fn propose_skill_outcome(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Generated<SkillOutcomeProposal>, NarratorError>;

    /// Free-form text completion, used for memory summaries.
    async fn narrate(&self, system: &str, user: &str) -> Result<Generated<String>, NarratorError>;
}
