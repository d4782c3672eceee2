//! Game orchestration.
//!
//! [`Game`] owns the narrator and the session store and drives the whole
//! turn pipeline: load the session, gather context, ask the generator for
//! a proposal bundle, push every proposal through the validating
//! dispatcher, resolve skill checks, and write the session back. One
//! in-process mutex per session serializes concurrent turns; the store
//! only ever sees whole-document writes.

use crate::checks::{self, SkillCheckResult};
use crate::combat;
use crate::dice::{self, DiceError};
use crate::events;
use crate::leveling;
use crate::narrator::{prompts, Narrator, TurnProposal};
use crate::store::{SessionStore, StoreError};
use crate::world::{
    AbilityScores, CharacterClass, Enemy, GameSession, Item, ItemType, LocationType, MemoryEntry,
    MemoryKind, Npc, PlayerCharacter, Quest, QuestStatus, SessionId, TokenUsageEntry,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// Pricing used for the informational cost estimate, dollars per token.
const INPUT_TOKEN_COST: f64 = 0.15 / 1_000_000.0;
const OUTPUT_TOKEN_COST: f64 = 0.60 / 1_000_000.0;

/// Errors surfaced by the game API.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("game session {0} not found")]
    SessionNotFound(SessionId),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error(transparent)]
    Dice(#[from] DiceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters for starting a new game.
#[derive(Debug, Clone)]
pub struct NewGameConfig {
    pub character_name: String,
    pub race: String,
    pub class: String,
    pub language: String,
    /// Skip opening-scene generation and use the canned tavern opening.
    pub use_default_campaign: bool,
}

/// Player snapshot returned by the API surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlayerStats {
    pub name: String,
    pub race: String,
    pub class: String,
    pub level: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub abilities: AbilityScores,
    pub defense: i32,
    pub experience: u32,
    pub experience_to_next_level: u32,
    pub gold: i32,
    pub inventory: Vec<Item>,
}

impl PlayerStats {
    fn of(player: &PlayerCharacter) -> Self {
        PlayerStats {
            name: player.name.clone(),
            race: player.race.clone(),
            class: player.class.clone(),
            level: player.level,
            hp: player.hp,
            max_hp: player.max_hp,
            abilities: player.abilities.clone(),
            defense: player.defense(),
            experience: player.experience,
            experience_to_next_level: leveling::xp_to_next_level(player.level),
            gold: player.gold,
            inventory: player.inventory.clone(),
        }
    }
}

/// Result of starting a new game.
#[derive(Debug, Clone)]
pub struct NewGameOutcome {
    pub session_id: SessionId,
    pub narrative: String,
    pub player: PlayerStats,
    pub suggested_actions: Vec<String>,
}

/// Result of one processed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub narrative: String,
    pub player: PlayerStats,
    pub leveled_up: bool,
    pub current_location: String,
    pub location_type: LocationType,
    pub applied_events: Vec<String>,
    pub skill_checks: Vec<SkillCheckResult>,
    pub suggested_actions: Vec<String>,
    pub in_combat: bool,
    pub game_over: bool,
    pub enemies: Vec<Enemy>,
}

// ==== Token usage reporting ====

#[derive(Debug, Clone, serde::Serialize)]
pub struct UsageByType {
    pub call_type: String,
    pub count: usize,
    pub total_tokens: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UsageByTurn {
    pub turn_number: u32,
    pub total_tokens: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub call_types: Vec<String>,
}

/// Aggregated token accounting for one session. Informational only.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenUsageStats {
    pub session_id: SessionId,
    pub total_tokens: u32,
    pub total_input_tokens: u32,
    pub total_output_tokens: u32,
    pub by_type: Vec<UsageByType>,
    pub by_turn: Vec<UsageByTurn>,
    pub estimated_cost: f64,
}

/// The game engine: narrator + store + per-session turn serialization.
pub struct Game {
    narrator: Box<dyn Narrator>,
    store: Box<dyn SessionStore>,
    locks: StdMutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl Game {
    pub fn new(narrator: Box<dyn Narrator>, store: Box<dyn SessionStore>) -> Self {
        Game {
            narrator,
            store,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// One mutex per session id; turns on the same session queue behind it.
    fn lock_for(&self, id: SessionId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }

    // ==== New game ====

    pub async fn new_game(&self, config: NewGameConfig) -> Result<NewGameOutcome, GameError> {
        let player = roll_new_character(&config)?;

        let (narrative, suggested_actions, opening_usage) = if config.use_default_campaign {
            (
                prompts::default_opening_narrative(
                    &player.name,
                    &player.race,
                    &player.class,
                    &config.language,
                ),
                prompts::default_suggested_actions(&config.language),
                None,
            )
        } else {
            let system = prompts::opening_system_prompt(&config.language);
            let user = prompts::build_opening_prompt(&player);
            match self.narrator.propose_opening(&system, &user).await {
                Ok(generated) => (
                    generated.value.narrative,
                    generated.value.suggested_actions,
                    generated.usage,
                ),
                Err(e) => {
                    error!(error = %e, "opening generation failed, using fallback");
                    (
                        prompts::default_opening_narrative(
                            &player.name,
                            &player.race,
                            &player.class,
                            &config.language,
                        ),
                        prompts::default_suggested_actions(&config.language),
                        None,
                    )
                }
            }
        };

        let founding_memory = MemoryEntry::new(
            format!(
                "{}, a {} {}, enters the mystical Infinite Tavern for the first time.",
                player.name, player.race, player.class
            ),
            MemoryKind::Event,
            10,
        );

        let mut session = GameSession {
            id: SessionId::new(),
            current_location: "The Infinite Tavern".to_string(),
            location_type: LocationType::Tavern,
            world_time: "Evening".to_string(),
            language: config.language.clone(),
            turn_number: 0,
            created_at: Utc::now(),
            in_combat: false,
            game_over: false,
            combat_xp_awarded: false,
            player: Some(player),
            npcs: vec![Npc {
                name: "Garrick the Tavern Keeper".to_string(),
                personality: "Friendly, wise, knows many secrets".to_string(),
                relationship: "Welcoming".to_string(),
                location: "The Infinite Tavern".to_string(),
                alive: true,
            }],
            enemies: Vec::new(),
            quests: Vec::new(),
            memories: vec![founding_memory],
            token_usage: Vec::new(),
        };

        if let Some(usage) = opening_usage {
            record_usage(&mut session, &usage, "OpeningStory");
        }

        self.store.create(&session).await?;
        info!(id = %session.id, character = %config.character_name, "created new game");

        // Player was moved into the session; the invariant holds by
        // construction, so this cannot be None.
        let stats = session.player.as_ref().map(PlayerStats::of);
        let stats = stats.ok_or_else(|| GameError::InvalidState("player missing".to_string()))?;

        Ok(NewGameOutcome {
            session_id: session.id,
            narrative,
            player: stats,
            suggested_actions,
        })
    }

    // ==== Turn processing ====

    pub async fn process_turn(&self, id: SessionId, action: &str) -> Result<TurnOutcome, GameError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self
            .store
            .load(id)
            .await?
            .ok_or(GameError::SessionNotFound(id))?;
        if session.game_over {
            return Err(GameError::InvalidState(
                "Game is over. Please start a new game.".to_string(),
            ));
        }
        let player_name = match &session.player {
            Some(p) => p.name.clone(),
            None => {
                return Err(GameError::InvalidState(format!(
                    "player character not found for session {id}"
                )))
            }
        };

        // Ask the generator for this turn's proposal bundle; a failed or
        // malformed reply degrades to an empty bundle rather than an error.
        let call_type = if session.in_combat { "Combat" } else { "Turn" };
        let system = if session.in_combat {
            prompts::combat_system_prompt(&session.language)
        } else {
            prompts::system_prompt(&session.language)
        };
        let player_snapshot = session
            .player
            .clone()
            .ok_or_else(|| GameError::InvalidState("player missing".to_string()))?;
        let user = prompts::build_turn_prompt(&session, &player_snapshot, action);

        let proposal = match self.narrator.propose_turn(&system, &user).await {
            Ok(generated) => {
                if let Some(usage) = generated.usage {
                    record_usage(&mut session, &usage, call_type);
                }
                generated.value
            }
            Err(e) => {
                error!(error = %e, "turn generation failed, using fallback");
                TurnProposal {
                    narrative: prompts::fallback_turn_narrative(&session.language).to_string(),
                    suggested_actions: prompts::default_suggested_actions(&session.language),
                    ..TurnProposal::default()
                }
            }
        };

        let level_before = player_snapshot.level;
        let mut log = Vec::new();
        let mut rng = rand::thread_rng();

        events::apply_events(&mut session, &proposal.events, &mut rng, &mut log);

        if let Some(change) = &proposal.location_change {
            session.current_location = change.new_location.clone();
            if let Some(kind) = LocationType::from_name(&change.location_type) {
                session.location_type = kind;
            }
            log.push(format!("Moved to {}", change.new_location));
        }

        for intro in &proposal.new_npcs {
            session.npcs.push(Npc {
                name: intro.name.clone(),
                personality: intro.personality.clone(),
                relationship: "Neutral".to_string(),
                location: intro.location.clone(),
                alive: true,
            });
            log.push(format!("Met new NPC: {}", intro.name));
        }

        combat::sync_roster(&mut session, &proposal.enemies, &mut log);

        for update in &proposal.quest_updates {
            apply_quest_update(&mut session.quests, &update.title, &update.status, &mut log);
        }

        // Resolve proposed skill checks, then ask the generator to narrate
        // each already-known outcome. The dice are rolled exactly once,
        // here, and never by the generator.
        let mut check_results = Vec::new();
        let mut check_narratives = Vec::new();
        for request in &proposal.skill_checks {
            let player = session
                .player
                .clone()
                .ok_or_else(|| GameError::InvalidState("player missing".to_string()))?;
            let result = checks::resolve_check_with_rng(
                &player,
                &request.attribute,
                request.difficulty,
                &request.purpose,
                &mut rng,
            );
            let verdict = if result.success { "succeeded" } else { "failed" };
            log.push(format!("Skill check ({}): {verdict}!", request.attribute));

            let outcome_system = prompts::skill_check_outcome_system_prompt(&session.language);
            let outcome_user = prompts::build_skill_outcome_prompt(action, &result);
            match self
                .narrator
                .propose_skill_outcome(&outcome_system, &outcome_user)
                .await
            {
                Ok(generated) => {
                    if let Some(usage) = generated.usage {
                        record_usage(&mut session, &usage, "SkillCheck");
                    }
                    check_narratives.push(generated.value.narrative);
                    events::apply_events(&mut session, &generated.value.events, &mut rng, &mut log);
                }
                Err(e) => {
                    warn!(error = %e, "skill outcome generation failed, using fallback");
                    check_narratives.push(prompts::fallback_skill_outcome(&result));
                }
            }
            check_results.push(result);
        }

        // Death from any of the above is terminal.
        if session.player.as_ref().map(|p| p.hp) == Some(0) {
            session.game_over = true;
            session.in_combat = false;
        }

        session.turn_number += 1;
        session.memories.push(MemoryEntry::new(
            format!(
                "Turn {}: Player action: {action}. {}",
                session.turn_number, proposal.narrative
            ),
            MemoryKind::Event,
            5,
        ));

        if session.turn_number % 10 == 0 {
            self.generate_summary(&mut session).await;
        }

        self.store.store(&session).await?;
        info!(id = %session.id, turn = session.turn_number, player = %player_name, "processed turn");

        let mut narrative = proposal.narrative;
        if !check_narratives.is_empty() {
            narrative.push_str("\n\n");
            narrative.push_str(&check_narratives.join("\n\n"));
        }

        let player = session
            .player
            .as_ref()
            .ok_or_else(|| GameError::InvalidState("player missing".to_string()))?;
        Ok(TurnOutcome {
            narrative,
            leveled_up: player.level > level_before,
            player: PlayerStats::of(player),
            current_location: session.current_location.clone(),
            location_type: session.location_type,
            applied_events: log,
            skill_checks: check_results,
            suggested_actions: proposal.suggested_actions,
            in_combat: session.in_combat,
            game_over: session.game_over,
            enemies: session.enemies.clone(),
        })
    }

    /// Every tenth turn, condense recent event memories into a summary
    /// entry. Failures are logged and swallowed; summaries are a luxury.
    async fn generate_summary(&self, session: &mut GameSession) {
        let Some(user) = prompts::build_summary_prompt(session) else {
            return;
        };
        let system = prompts::summary_system_prompt(&session.language);
        match self.narrator.narrate(&system, &user).await {
            Ok(generated) => {
                if let Some(usage) = generated.usage {
                    record_usage(session, &usage, "Summary");
                }
                session
                    .memories
                    .push(MemoryEntry::new(generated.value, MemoryKind::Summary, 10));
                info!(id = %session.id, turn = session.turn_number, "generated summary");
            }
            Err(e) => {
                error!(id = %session.id, error = %e, "summary generation failed");
            }
        }
    }

    // ==== Equipment ====

    /// Toggle an item's equipped flag and return the refreshed stats.
    pub async fn equip_item(&self, id: SessionId, item_name: &str) -> Result<PlayerStats, GameError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self
            .store
            .load(id)
            .await?
            .ok_or(GameError::SessionNotFound(id))?;
        let player = session
            .player
            .as_mut()
            .ok_or_else(|| GameError::InvalidState("player missing".to_string()))?;

        let item = player
            .find_item_mut(item_name)
            .ok_or_else(|| GameError::ItemNotFound(item_name.to_string()))?;
        if !item.item_type.is_equippable() {
            return Err(GameError::InvalidState(format!(
                "{} cannot be equipped",
                item.name
            )));
        }
        item.equipped = !item.equipped;

        let stats = PlayerStats::of(player);
        self.store.store(&session).await?;
        Ok(stats)
    }

    /// Fetch the current session document.
    pub async fn session_state(&self, id: SessionId) -> Result<GameSession, GameError> {
        self.store
            .load(id)
            .await?
            .ok_or(GameError::SessionNotFound(id))
    }

    // ==== Accounting ====

    pub async fn token_usage_stats(&self, id: SessionId) -> Result<TokenUsageStats, GameError> {
        let session = self
            .store
            .load(id)
            .await?
            .ok_or(GameError::SessionNotFound(id))?;

        let history = &session.token_usage;
        let total_input: u32 = history.iter().map(|t| t.input_tokens).sum();
        let total_output: u32 = history.iter().map(|t| t.output_tokens).sum();

        let mut by_type: Vec<UsageByType> = Vec::new();
        for entry in history {
            match by_type.iter_mut().find(|t| t.call_type == entry.call_type) {
                Some(bucket) => {
                    bucket.count += 1;
                    bucket.total_tokens += entry.total_tokens;
                    bucket.input_tokens += entry.input_tokens;
                    bucket.output_tokens += entry.output_tokens;
                }
                None => by_type.push(UsageByType {
                    call_type: entry.call_type.clone(),
                    count: 1,
                    total_tokens: entry.total_tokens,
                    input_tokens: entry.input_tokens,
                    output_tokens: entry.output_tokens,
                }),
            }
        }

        let mut by_turn: Vec<UsageByTurn> = Vec::new();
        for entry in history {
            match by_turn.iter_mut().find(|t| t.turn_number == entry.turn_number) {
                Some(bucket) => {
                    bucket.total_tokens += entry.total_tokens;
                    bucket.input_tokens += entry.input_tokens;
                    bucket.output_tokens += entry.output_tokens;
                    bucket.call_types.push(entry.call_type.clone());
                }
                None => by_turn.push(UsageByTurn {
                    turn_number: entry.turn_number,
                    total_tokens: entry.total_tokens,
                    input_tokens: entry.input_tokens,
                    output_tokens: entry.output_tokens,
                    call_types: vec![entry.call_type.clone()],
                }),
            }
        }
        by_turn.sort_by_key(|t| t.turn_number);

        Ok(TokenUsageStats {
            session_id: id,
            total_tokens: total_input + total_output,
            total_input_tokens: total_input,
            total_output_tokens: total_output,
            by_type,
            by_turn,
            estimated_cost: total_input as f64 * INPUT_TOKEN_COST
                + total_output as f64 * OUTPUT_TOKEN_COST,
        })
    }

    /// Remove a session and its turn lock.
    pub async fn delete_game(&self, id: SessionId) -> Result<(), GameError> {
        self.store.delete(id).await?;
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        Ok(())
    }
}

// ==== Character creation ====

/// 2d6-plus-class-bonus stat rows, keyed by the closed class enum with an
/// explicit default row for free-form class strings.
fn stat_bonuses(class: CharacterClass) -> [i32; 6] {
    // [str, dex, con, int, wis, cha]
    match class {
        CharacterClass::Warrior => [3, 1, 3, 0, 1, 0],
        CharacterClass::Wizard => [0, 1, 0, 3, 2, 1],
        CharacterClass::Rogue => [1, 3, 1, 2, 0, 2],
        CharacterClass::Cleric => [1, 0, 2, 1, 3, 2],
        CharacterClass::Ranger => [2, 3, 2, 1, 2, 0],
        CharacterClass::Other => [1, 1, 1, 1, 1, 1],
    }
}

fn roll_new_character(config: &NewGameConfig) -> Result<PlayerCharacter, GameError> {
    let class = CharacterClass::from_name(&config.class);
    let [str_b, dex_b, con_b, int_b, wis_b, cha_b] = stat_bonuses(class);
    let max_hp = class.base_max_hp();

    let weapon_name = match class {
        CharacterClass::Warrior => "Iron Sword",
        CharacterClass::Wizard => "Wooden Staff",
        _ => "Iron Dagger",
    };
    let mut weapon = Item::new(weapon_name, ItemType::Weapon);
    weapon.description = "Your starting weapon".to_string();
    weapon.equipped = true;
    weapon.bonuses.insert("Strength".to_string(), 2);

    let mut potion = Item::new("Health Potion", ItemType::Potion);
    potion.description = "Restores 10 HP".to_string();
    potion.quantity = 2;

    Ok(PlayerCharacter {
        name: config.character_name.clone(),
        race: config.race.clone(),
        class: config.class.clone(),
        level: 1,
        experience: 0,
        hp: max_hp,
        max_hp,
        abilities: AbilityScores {
            strength: dice::roll("2d6")? + str_b,
            dexterity: dice::roll("2d6")? + dex_b,
            constitution: dice::roll("2d6")? + con_b,
            intelligence: dice::roll("2d6")? + int_b,
            wisdom: dice::roll("2d6")? + wis_b,
            charisma: dice::roll("2d6")? + cha_b,
        },
        gold: 10,
        inventory: vec![weapon, potion],
    })
}

fn apply_quest_update(quests: &mut [Quest], title: &str, status: &str, log: &mut Vec<String>) {
    let Some(parsed) = QuestStatus::from_name(status) else {
        return;
    };
    if let Some(quest) = quests.iter_mut().find(|q| q.title == title) {
        quest.status = parsed;
        log.push(format!("Quest '{}' is now {}", quest.title, parsed.name()));
    }
}

fn record_usage(session: &mut GameSession, usage: &crate::narrator::GeneratorUsage, call_type: &str) {
    session.token_usage.push(TokenUsageEntry {
        timestamp: Utc::now(),
        turn_number: session.turn_number,
        call_type: call_type.to_string(),
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens(),
        model_name: usage.model.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_bonus_rows_cover_every_class() {
        assert_eq!(stat_bonuses(CharacterClass::Warrior), [3, 1, 3, 0, 1, 0]);
        assert_eq!(stat_bonuses(CharacterClass::Ranger), [2, 3, 2, 1, 2, 0]);
        assert_eq!(stat_bonuses(CharacterClass::Other), [1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_rolled_character_kit_and_ranges() {
        let config = NewGameConfig {
            character_name: "Bruni".to_string(),
            race: "Dwarf".to_string(),
            class: "Warrior".to_string(),
            language: "English".to_string(),
            use_default_campaign: true,
        };
        for _ in 0..20 {
            let player = roll_new_character(&config).unwrap();
            assert_eq!(player.level, 1);
            assert_eq!(player.hp, 12);
            assert_eq!(player.max_hp, 12);
            assert_eq!(player.gold, 10);
            // 2d6 + 3 for a warrior's strength.
            assert!((5..=15).contains(&player.abilities.strength));
            assert!((2..=12).contains(&player.abilities.intelligence));

            let weapon = player.find_item("Iron Sword").unwrap();
            assert!(weapon.equipped);
            assert_eq!(weapon.bonus("strength"), 2);
            assert_eq!(player.find_item("Health Potion").unwrap().quantity, 2);
        }
    }

    #[test]
    fn test_unlisted_class_gets_default_row_and_dagger() {
        let config = NewGameConfig {
            character_name: "Nix".to_string(),
            race: "Human".to_string(),
            class: "Beastmaster".to_string(),
            language: "English".to_string(),
            use_default_campaign: true,
        };
        let player = roll_new_character(&config).unwrap();
        assert_eq!(player.max_hp, 8);
        assert!(player.find_item("Iron Dagger").is_some());
    }

    #[test]
    fn test_quest_update_by_exact_title() {
        let mut quests = vec![Quest {
            title: "Clear the cellar".to_string(),
            description: "Rats, probably".to_string(),
            status: QuestStatus::Active,
        }];
        let mut log = Vec::new();

        apply_quest_update(&mut quests, "Clear the cellar", "Completed", &mut log);
        assert_eq!(quests[0].status, QuestStatus::Completed);
        assert_eq!(log, vec!["Quest 'Clear the cellar' is now Completed".to_string()]);

        // Unknown status strings and unknown titles are ignored.
        apply_quest_update(&mut quests, "Clear the cellar", "Paused", &mut log);
        apply_quest_update(&mut quests, "No such quest", "Failed", &mut log);
        assert_eq!(log.len(), 1);
    }
}
