//! Turn-resolution engine for the Infinite Tavern, an AI-narrated RPG.
//!
//! The narrative generator is untrusted: it proposes, the engine
//! disposes. Every turn the orchestrator collects the generator's
//! proposal bundle, validates each proposal against the rules (dice,
//! skill checks, combat adjudication, leveling), applies what survives,
//! and persists the session as a whole document.
//!
//! Module map:
//! - [`dice`]: dice-notation parsing and rolling
//! - [`world`]: persisted state (session, player, items, roster)
//! - [`checks`]: d20 skill-check resolution
//! - [`leveling`]: XP thresholds and level-up cascade
//! - [`combat`]: attack adjudication, roster sync, victory XP
//! - [`events`]: the validating dispatcher for generator proposals
//! - [`narrator`]: the generator seam (trait, prompts, Anthropic client)
//! - [`store`]: whole-document session persistence
//! - [`session`]: the turn orchestrator and public game API
//! - [`testing`]: scriptable narrator and harness for tests

pub mod checks;
pub mod combat;
pub mod dice;
pub mod events;
pub mod leveling;
pub mod narrator;
pub mod session;
pub mod store;
pub mod testing;
pub mod world;

pub use checks::SkillCheckResult;
pub use dice::{DiceError, DiceExpression};
pub use events::GameEvent;
pub use narrator::{ClaudeNarrator, Narrator, NarratorError, TurnProposal};
pub use session::{Game, GameError, NewGameConfig, NewGameOutcome, TurnOutcome};
pub use store::{FileStore, MemoryStore, SessionStore, StoreError};
pub use world::{GameSession, PlayerCharacter, SessionId};
