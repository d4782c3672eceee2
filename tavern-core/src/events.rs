//! Event dispatch.
//!
//! The narrative generator never mutates game state directly. It emits a
//! list of typed event proposals; this module is the single gate through
//! which they become state changes. Each handler validates its proposal
//! against the session before applying it, and appends human-readable
//! lines to the turn's applied-event log.

use crate::combat;
use crate::leveling;
use crate::world::{GameSession, Item, ItemType};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// A single state-change proposal from the generator.
///
/// Everything is optional on the wire; generators routinely omit fields,
/// so every one defaults rather than failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub amount: i32,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub attacker: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub bonuses: HashMap<String, i32>,
    #[serde(default)]
    pub is_unique: bool,
}

/// Recognized event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Damage,
    Heal,
    ItemFound,
    ItemLost,
    GoldFound,
    GoldSpent,
    XpGained,
}

impl EventKind {
    fn parse(kind: &str) -> Option<EventKind> {
        match kind.to_lowercase().as_str() {
            "damage" => Some(EventKind::Damage),
            "heal" => Some(EventKind::Heal),
            "item_found" => Some(EventKind::ItemFound),
            "item_lost" => Some(EventKind::ItemLost),
            "gold_found" => Some(EventKind::GoldFound),
            "gold_spent" => Some(EventKind::GoldSpent),
            "xp_gained" => Some(EventKind::XpGained),
            _ => None,
        }
    }
}

/// Generator prefixes that leak into item names and must be stripped.
const ITEM_NAME_PREFIXES: &[&str] = &["found:", "item:", "знайдено:", "предмет:"];

/// Apply one event to the session.
///
/// Unrecognized kinds are logged and ignored; a confused generator must
/// never fail the turn.
pub fn apply_event<R: Rng>(
    session: &mut GameSession,
    event: &GameEvent,
    rng: &mut R,
    log: &mut Vec<String>,
) {
    let Some(kind) = EventKind::parse(&event.kind) else {
        warn!(kind = %event.kind, "unknown event type");
        return;
    };

    match kind {
        EventKind::Damage => handle_damage(session, event, rng, log),
        EventKind::Heal => handle_heal(session, event, log),
        EventKind::ItemFound => handle_item_found(session, event, log),
        EventKind::ItemLost => handle_item_lost(session, event, log),
        EventKind::GoldFound => handle_gold_found(session, event, log),
        EventKind::GoldSpent => handle_gold_spent(session, event, log),
        EventKind::XpGained => handle_xp_gained(session, event, log),
    }
}

/// Apply a batch in proposal order. Later events observe the effects of
/// earlier ones, including the combat-XP suppression flag.
pub fn apply_events<R: Rng>(
    session: &mut GameSession,
    events: &[GameEvent],
    rng: &mut R,
    log: &mut Vec<String>,
) {
    for event in events {
        apply_event(session, event, rng, log);
    }
}

fn handle_damage<R: Rng>(
    session: &mut GameSession,
    event: &GameEvent,
    rng: &mut R,
    log: &mut Vec<String>,
) {
    if event.target.eq_ignore_ascii_case("player") {
        combat::apply_damage_to_player(
            session,
            event.attacker.as_deref(),
            event.amount,
            &event.reason,
            rng,
            log,
        );
        return;
    }

    if combat::apply_damage_to_enemy(session, &event.target, event.amount, &event.reason, rng, log)
    {
        return;
    }

    // Not the player, not a living enemy: harming an NPC just kills them.
    let reason = event.reason.clone();
    if let Some(npc) = session.find_living_npc_mut(&event.target) {
        npc.alive = false;
        let name = npc.name.clone();
        log.push(format!("{name} was defeated: {reason}"));
    }
}

fn handle_heal(session: &mut GameSession, event: &GameEvent, log: &mut Vec<String>) {
    if !event.target.eq_ignore_ascii_case("player") {
        return;
    }
    let Some(player) = session.player.as_mut() else {
        return;
    };
    let amount = event.amount.max(0);
    player.hp = (player.hp + amount).min(player.max_hp);
    log.push(format!("Player healed {amount} HP: {}", event.reason));
}

/// Strip leaked generator prefixes from a proposed item name.
///
/// Prefixes are matched case-insensitively by character count so the
/// Cyrillic variants strip correctly.
pub fn sanitize_item_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();
    for prefix in ITEM_NAME_PREFIXES {
        if lowered.starts_with(prefix) {
            let skip = prefix.chars().count();
            return trimmed.chars().skip(skip).collect::<String>().trim().to_string();
        }
    }
    trimmed.to_string()
}

fn handle_item_found(session: &mut GameSession, event: &GameEvent, log: &mut Vec<String>) {
    let Some(player) = session.player.as_mut() else {
        return;
    };

    let name = sanitize_item_name(&event.reason);
    if name.is_empty() {
        return;
    }
    let quantity = if event.amount > 0 { event.amount } else { 1 };

    if let Some(existing) = player.find_item_mut(&name) {
        // A unique item the player already owns is a generator
        // hallucination; discard the grant entirely.
        if event.is_unique {
            return;
        }
        existing.quantity += quantity;
    } else {
        let item_type = event
            .item_type
            .as_deref()
            .map(ItemType::from_name)
            .unwrap_or(ItemType::Miscellaneous);
        let mut item = Item::new(name.clone(), item_type);
        item.description = "Found during adventure".to_string();
        item.quantity = quantity;
        item.bonuses = event.bonuses.clone();
        player.inventory.push(item);
    }

    log.push(format!("Found: {name} x{quantity}"));
}

fn handle_item_lost(session: &mut GameSession, event: &GameEvent, log: &mut Vec<String>) {
    let Some(player) = session.player.as_mut() else {
        return;
    };

    let name = sanitize_item_name(&event.reason);
    let (canonical, removed, remaining) = {
        let Some(item) = player.find_item_mut(&name) else {
            return;
        };
        let removed = if event.amount > 0 {
            event.amount
        } else {
            item.quantity
        };
        item.quantity -= removed;
        (item.name.clone(), removed, item.quantity)
    };

    if remaining <= 0 {
        player
            .inventory
            .retain(|i| !i.name.eq_ignore_ascii_case(&canonical));
    }

    log.push(format!("Lost: {canonical} x{removed}"));
}

fn handle_gold_found(session: &mut GameSession, event: &GameEvent, log: &mut Vec<String>) {
    if let Some(player) = session.player.as_mut() {
        let amount = event.amount.max(0);
        player.gold += amount;
        log.push(format!("Found {amount} gold: {}", event.reason));
    }
}

fn handle_gold_spent(session: &mut GameSession, event: &GameEvent, log: &mut Vec<String>) {
    if let Some(player) = session.player.as_mut() {
        let amount = event.amount.max(0);
        player.gold = (player.gold - amount).max(0);
        log.push(format!("Spent {amount} gold: {}", event.reason));
    }
}

fn handle_xp_gained(session: &mut GameSession, event: &GameEvent, log: &mut Vec<String>) {
    // A combat kill already paid out this turn; the generator's own XP
    // event for the same kill would double-count. The flag is one-shot:
    // it suppresses exactly the next xp_gained, then clears.
    if session.combat_xp_awarded {
        session.combat_xp_awarded = false;
        return;
    }

    let Some(player) = session.player.as_mut() else {
        return;
    };
    let amount = event.amount.max(0) as u32;
    log.push(format!("Gained {amount} XP: {}", event.reason));
    log.extend(leveling::apply_experience(player, amount));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{create_sample_warrior, LocationType, Npc, SessionId};
    use chrono::Utc;

    fn session() -> GameSession {
        let mut player = create_sample_warrior("Test Hero");
        let mut potion = Item::new("Health Potion", ItemType::Potion);
        potion.quantity = 2;
        player.inventory.push(potion);
        GameSession {
            id: SessionId::new(),
            current_location: "The Infinite Tavern".to_string(),
            location_type: LocationType::Tavern,
            world_time: "Evening".to_string(),
            language: "English".to_string(),
            turn_number: 0,
            created_at: Utc::now(),
            in_combat: false,
            game_over: false,
            combat_xp_awarded: false,
            player: Some(player),
            npcs: Vec::new(),
            enemies: Vec::new(),
            quests: Vec::new(),
            memories: Vec::new(),
            token_usage: Vec::new(),
        }
    }

    fn event(kind: &str) -> GameEvent {
        GameEvent {
            kind: kind.to_string(),
            ..GameEvent::default()
        }
    }

    #[test]
    fn test_unknown_event_type_is_ignored() {
        let mut s = session();
        let mut log = Vec::new();
        apply_event(&mut s, &event("teleport"), &mut rand::thread_rng(), &mut log);
        assert!(log.is_empty());
    }

    #[test]
    fn test_heal_caps_at_max_hp() {
        let mut s = session();
        s.player.as_mut().unwrap().hp = 8;
        let mut e = event("HEAL");
        e.target = "Player".to_string();
        e.amount = 10;
        e.reason = "Health Potion".to_string();
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);

        assert_eq!(s.player.as_ref().unwrap().hp, 12);
        assert_eq!(log, vec!["Player healed 10 HP: Health Potion".to_string()]);
    }

    #[test]
    fn test_damage_to_npc_marks_dead_without_roll() {
        let mut s = session();
        s.npcs.push(Npc {
            name: "Garrick the Tavern Keeper".to_string(),
            personality: "Gruff but kind".to_string(),
            relationship: "Neutral".to_string(),
            location: "The Infinite Tavern".to_string(),
            alive: true,
        });
        let mut e = event("damage");
        e.target = "garrick the tavern keeper".to_string();
        e.amount = 1;
        e.reason = "A brawl breaks out".to_string();
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);

        assert!(!s.npcs[0].alive);
        assert_eq!(
            log,
            vec!["Garrick the Tavern Keeper was defeated: A brawl breaks out".to_string()]
        );
    }

    #[test]
    fn test_sanitize_item_name_strips_prefixes() {
        assert_eq!(sanitize_item_name("Found: Rusty Key"), "Rusty Key");
        assert_eq!(sanitize_item_name("ITEM: Torch"), "Torch");
        assert_eq!(sanitize_item_name("Знайдено: Смолоскип"), "Смолоскип");
        assert_eq!(sanitize_item_name("  Plain Rope  "), "Plain Rope");
    }

    #[test]
    fn test_item_found_stacks_by_name() {
        let mut s = session();
        let mut e = event("item_found");
        e.reason = "Found: health potion".to_string();
        e.amount = 2;
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);

        let player = s.player.as_ref().unwrap();
        // The fixture already carries two Health Potions.
        let potion = player.find_item("Health Potion").unwrap();
        assert_eq!(potion.quantity, 4);
        assert_eq!(player.inventory.iter().filter(|i| i.name.eq_ignore_ascii_case("health potion")).count(), 1);
        assert_eq!(log, vec!["Found: health potion x2".to_string()]);
    }

    #[test]
    fn test_unique_item_regrant_is_discarded() {
        let mut s = session();
        let mut e = event("item_found");
        e.reason = "Health Potion".to_string();
        e.amount = 1;
        e.is_unique = true;
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);

        let potion = s.player.as_ref().unwrap().find_item("Health Potion").unwrap();
        assert_eq!(potion.quantity, 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_unique_flag_on_new_item_still_grants() {
        let mut s = session();
        let mut e = event("item_found");
        e.reason = "Amulet of the Tavern".to_string();
        e.is_unique = true;
        e.item_type = Some("Amulet".to_string());
        e.bonuses = HashMap::from([("Defense".to_string(), 1)]);
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);

        let item = s.player.as_ref().unwrap().find_item("Amulet of the Tavern").unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.item_type, ItemType::Amulet);
        assert_eq!(item.bonus("defense"), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_item_lost_removes_record_at_zero() {
        let mut s = session();
        let mut e = event("item_lost");
        e.reason = "Health Potion".to_string();
        e.amount = 0; // amount <= 0 drops the whole stack
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);

        assert!(s.player.as_ref().unwrap().find_item("Health Potion").is_none());
        assert_eq!(log, vec!["Lost: Health Potion x2".to_string()]);
    }

    #[test]
    fn test_gold_floors_at_zero() {
        let mut s = session();
        let mut found = event("gold_found");
        found.amount = 5;
        found.reason = "Coin purse".to_string();
        let mut spent = event("gold_spent");
        spent.amount = 100;
        spent.reason = "Bribed the guard".to_string();
        let mut log = Vec::new();

        apply_event(&mut s, &found, &mut rand::thread_rng(), &mut log);
        apply_event(&mut s, &spent, &mut rand::thread_rng(), &mut log);

        assert_eq!(s.player.as_ref().unwrap().gold, 0);
        assert_eq!(log.len(), 2);
        assert!(log[0].contains("Found 5 gold"));
        assert!(log[1].contains("Spent 100 gold"));
    }

    #[test]
    fn test_xp_gained_applies_and_logs() {
        let mut s = session();
        let mut e = event("xp_gained");
        e.amount = 150;
        e.reason = "Solved the riddle".to_string();
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);

        let player = s.player.as_ref().unwrap();
        assert_eq!(player.level, 2);
        assert!(log[0].contains("Gained 150 XP"));
        assert!(log[1].contains("LEVEL UP"));
    }

    #[test]
    fn test_combat_xp_flag_suppresses_next_award_only() {
        let mut s = session();
        s.combat_xp_awarded = true;
        let mut e = event("xp_gained");
        e.amount = 50;
        e.reason = "Goblin slain".to_string();
        let mut log = Vec::new();

        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);
        assert_eq!(s.player.as_ref().unwrap().experience, 0);
        assert!(!s.combat_xp_awarded);
        assert!(log.is_empty());

        // The very next award goes through.
        apply_event(&mut s, &e, &mut rand::thread_rng(), &mut log);
        assert_eq!(s.player.as_ref().unwrap().experience, 50);
        assert_eq!(log.len(), 1);
    }
}
