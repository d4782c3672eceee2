//! Test support: a scriptable narrator and a ready-made engine harness.
//!
//! Unit and integration tests drive the engine with [`MockNarrator`],
//! queueing proposal bundles that the orchestrator will consume in order.
//! An empty queue yields an empty bundle, so a test only scripts what it
//! cares about.

use crate::narrator::{
    Generated, Narrator, NarratorError, OpeningProposal, SkillOutcomeProposal, TurnProposal,
};
use crate::session::{Game, NewGameConfig, NewGameOutcome};
use crate::store::MemoryStore;
use crate::world::SessionId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct Scripts {
    turns: Mutex<VecDeque<TurnProposal>>,
    openings: Mutex<VecDeque<OpeningProposal>>,
    outcomes: Mutex<VecDeque<SkillOutcomeProposal>>,
    summaries: Mutex<VecDeque<String>>,
    fail_all: AtomicBool,
}

/// A narrator that replays scripted responses.
#[derive(Clone, Default)]
pub struct MockNarrator {
    scripts: Arc<Scripts>,
}

impl MockNarrator {
    pub fn new() -> Self {
        MockNarrator::default()
    }

    /// Every call fails, for exercising fallback paths.
    pub fn failing() -> Self {
        let mock = MockNarrator::new();
        mock.scripts.fail_all.store(true, Ordering::SeqCst);
        mock
    }

    pub fn push_turn(&self, proposal: TurnProposal) {
        lock(&self.scripts.turns).push_back(proposal);
    }

    pub fn push_opening(&self, proposal: OpeningProposal) {
        lock(&self.scripts.openings).push_back(proposal);
    }

    pub fn push_outcome(&self, proposal: SkillOutcomeProposal) {
        lock(&self.scripts.outcomes).push_back(proposal);
    }

    pub fn push_summary(&self, summary: impl Into<String>) {
        lock(&self.scripts.summaries).push_back(summary.into());
    }

    fn check_failure(&self) -> Result<(), NarratorError> {
        if self.scripts.fail_all.load(Ordering::SeqCst) {
            Err(NarratorError::Malformed("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn propose_turn(
        &self,
        _system: &str,
        _user: &str,
    ) -> Result<Generated<TurnProposal>, NarratorError> {
        self.check_failure()?;
        let proposal = lock(&self.scripts.turns).pop_front().unwrap_or_default();
        Ok(Generated::bare(proposal))
    }

    async fn propose_opening(
        &self,
        _system: &str,
        _user: &str,
    ) -> Result<Generated<OpeningProposal>, NarratorError> {
        self.check_failure()?;
        let proposal = lock(&self.scripts.openings).pop_front().unwrap_or_default();
        Ok(Generated::bare(proposal))
    }

    async fn propose_skill_outcome(
        &self,
        _system: &str,
        _user: &str,
    ) -> Result<Generated<SkillOutcomeProposal>, NarratorError> {
        self.check_failure()?;
        match lock(&self.scripts.outcomes).pop_front() {
            Some(proposal) => Ok(Generated::bare(proposal)),
            None => Err(NarratorError::Malformed(
                "no scripted skill outcome".to_string(),
            )),
        }
    }

    async fn narrate(&self, _system: &str, _user: &str) -> Result<Generated<String>, NarratorError> {
        self.check_failure()?;
        let summary = lock(&self.scripts.summaries)
            .pop_front()
            .unwrap_or_else(|| "A quiet stretch of adventure passes.".to_string());
        Ok(Generated::bare(summary))
    }
}

/// A [`Game`] wired to a mock narrator and an in-memory store.
pub struct TestHarness {
    pub game: Game,
    pub narrator: MockNarrator,
}

impl TestHarness {
    pub fn new() -> Self {
        let narrator = MockNarrator::new();
        let game = Game::new(Box::new(narrator.clone()), Box::new(MemoryStore::new()));
        TestHarness { game, narrator }
    }

    /// Start a default-campaign warrior game and return its id.
    pub async fn start_warrior(&self, name: &str) -> (SessionId, NewGameOutcome) {
        let outcome = self
            .game
            .new_game(NewGameConfig {
                character_name: name.to_string(),
                race: "Dwarf".to_string(),
                class: "Warrior".to_string(),
                language: "English".to_string(),
                use_default_campaign: true,
            })
            .await
            .expect("new game should succeed");
        (outcome.session_id, outcome)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        TestHarness::new()
    }
}
