//! Combat resolution.
//!
//! Two symmetric paths hang off damage proposals: enemies attacking the
//! player (full hit/dodge/critical adjudication against derived Defense)
//! and the player attacking enemies (the narrated attack always lands;
//! only criticals and death bookkeeping are adjudicated). This module
//! also owns roster synchronization, the combat start/end transitions,
//! and the automatic XP award when the last enemy falls.

use crate::dice;
use crate::leveling;
use crate::narrator::EnemyProposal;
use crate::world::{Enemy, GameSession};
use rand::Rng;
use tracing::debug;

/// Attack rating for roster entries the generator did not rate.
const DEFAULT_ATTACK: i32 = 3;

/// Base difficulty an attack roll must meet before Defense is added.
const HIT_THRESHOLD: i32 = 10;

/// Minimum XP awarded for clearing an encounter.
const MIN_COMBAT_XP: u32 = 20;

/// Outcome of a single enemy attack roll against the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    /// Natural 20: always hits, damage is doubled.
    Critical,
    Hit,
    /// Missed, but only because Defense raised the bar.
    Blocked,
    /// Missed outright.
    Dodged,
}

/// Adjudicate an attack roll. Pure; the roll is the raw d20 face.
pub fn adjudicate_attack(roll: u32, attack: i32, defense: i32) -> AttackOutcome {
    if roll == 20 {
        return AttackOutcome::Critical;
    }
    let total = roll as i32 + attack;
    if total >= HIT_THRESHOLD + defense {
        AttackOutcome::Hit
    } else if total >= HIT_THRESHOLD {
        // Would have hit an undefended target; Defense made the difference.
        AttackOutcome::Blocked
    } else {
        AttackOutcome::Dodged
    }
}

/// How a damage-to-player proposal maps onto the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attacker {
    /// Index of a living roster enemy.
    Living(usize),
    /// The named or inferred attacker is in the roster but dead; the
    /// proposal must be discarded without a trace.
    Dead,
    /// No roster enemy matches; the damage is environmental.
    Unknown,
}

/// Identify the attacking enemy for a damage-to-player proposal.
///
/// Prefers an explicit attacker name; falls back to scanning the roster
/// for an enemy name mentioned inside the proposal's free-text reason,
/// which tolerates generators that only name the attacker in prose.
pub fn identify_attacker(session: &GameSession, attacker: Option<&str>, reason: &str) -> Attacker {
    if let Some(name) = attacker {
        if !name.trim().is_empty() {
            if let Some(index) = session.find_enemy(name) {
                return if session.enemies[index].alive {
                    Attacker::Living(index)
                } else {
                    Attacker::Dead
                };
            }
        }
    }

    let reason_lower = reason.to_lowercase();
    if let Some(index) = session
        .enemies
        .iter()
        .position(|e| !e.name.is_empty() && reason_lower.contains(&e.name.to_lowercase()))
    {
        return if session.enemies[index].alive {
            Attacker::Living(index)
        } else {
            Attacker::Dead
        };
    }

    Attacker::Unknown
}

/// Apply a damage proposal targeting the player.
///
/// A dead named attacker silently discards the whole proposal: the
/// generator is describing an attack from an enemy that died earlier in
/// the same batch. Damage with no identifiable attacker (falling, traps,
/// skill-check consequences) skips the hit roll and applies directly.
pub fn apply_damage_to_player<R: Rng>(
    session: &mut GameSession,
    attacker: Option<&str>,
    amount: i32,
    reason: &str,
    rng: &mut R,
    log: &mut Vec<String>,
) {
    let identified = identify_attacker(session, attacker, reason);

    let damage = match identified {
        Attacker::Dead => {
            debug!(reason, "discarding attack from dead enemy");
            return;
        }
        Attacker::Unknown => amount.max(0),
        Attacker::Living(index) => {
            let enemy_name = session.enemies[index].name.clone();
            let attack = session.enemies[index].attack;
            let defense = match &session.player {
                Some(player) => player.defense(),
                None => return,
            };

            let roll = dice::d20_with_rng(rng);
            match adjudicate_attack(roll, attack, defense) {
                AttackOutcome::Critical => {
                    log.push(format!("Critical hit by {enemy_name}!"));
                    amount.max(0).saturating_mul(2)
                }
                AttackOutcome::Hit => amount.max(0),
                AttackOutcome::Blocked => {
                    log.push(format!("Blocked {enemy_name}'s attack!"));
                    return;
                }
                AttackOutcome::Dodged => {
                    log.push(format!("Dodged {enemy_name}'s attack!"));
                    return;
                }
            }
        }
    };

    let Some(player) = session.player.as_mut() else {
        return;
    };
    player.hp = player.hp.saturating_sub(damage).max(0);
    log.push(format!("Player took {damage} damage: {reason}"));

    if player.hp == 0 {
        log.push("Player has fallen!".to_string());
    }
}

/// Apply a damage proposal targeting a named enemy.
///
/// Returns false when no living enemy matches, so the dispatcher can fall
/// through to the NPC path. The narrated attack always lands; the d20 is
/// rolled only to detect a critical.
pub fn apply_damage_to_enemy<R: Rng>(
    session: &mut GameSession,
    target: &str,
    amount: i32,
    reason: &str,
    rng: &mut R,
    log: &mut Vec<String>,
) -> bool {
    let Some(index) = session.find_living_enemy(target) else {
        return false;
    };

    let mut damage = amount.max(0);
    if dice::d20_with_rng(rng) == 20 {
        damage = damage.saturating_mul(2);
        log.push("Critical hit!".to_string());
    }

    let enemy = &mut session.enemies[index];
    enemy.hp = enemy.hp.saturating_sub(damage).max(0);
    let name = enemy.name.clone();
    log.push(format!("{name} took {damage} damage: {reason}"));

    if enemy.hp == 0 {
        enemy.alive = false;
        log.push(format!("{name} was defeated!"));

        if !session.any_enemy_alive() {
            end_combat_with_victory(session, log);
        }
    }

    true
}

/// Close out the encounter: flip the combat flag, award XP computed from
/// the defeated roster, and arm the duplicate-XP guard.
///
/// Awarding here, rather than trusting a generator-supplied `xp_gained`
/// event, prevents double-counting and guarantees a reward even when the
/// generator forgets one.
fn end_combat_with_victory(session: &mut GameSession, log: &mut Vec<String>) {
    session.in_combat = false;
    log.push("Victory! All enemies defeated!".to_string());

    let reward = combat_xp_reward(&session.enemies);
    if let Some(player) = session.player.as_mut() {
        log.push(format!("Gained {reward} XP from the battle!"));
        log.extend(leveling::apply_experience(player, reward));
        session.combat_xp_awarded = true;
    }
}

/// XP for clearing a roster: `10 + attack*5 + maxHP/3` per enemy,
/// never less than [`MIN_COMBAT_XP`] in total.
pub fn combat_xp_reward(enemies: &[Enemy]) -> u32 {
    let total = enemies.iter().fold(0i32, |acc, e| {
        let share = 10i32
            .saturating_add(e.attack.saturating_mul(5))
            .saturating_add(e.max_hp / 3);
        acc.saturating_add(share)
    });
    (total.max(0) as u32).max(MIN_COMBAT_XP)
}

/// Synchronize the encounter roster with a turn's enemy proposals.
///
/// Update-if-present-else-append by case-insensitive name. A previously
/// set attack rating survives unless the proposal re-supplies a positive
/// one. Entering combat is a transition, not an event: it happens the
/// first time the roster holds a living enemy while the flag is down.
pub fn sync_roster(session: &mut GameSession, proposals: &[EnemyProposal], log: &mut Vec<String>) {
    if proposals.is_empty() {
        return;
    }

    for proposal in proposals {
        match session.find_enemy(&proposal.name) {
            Some(index) => {
                let enemy = &mut session.enemies[index];
                enemy.hp = proposal.hp;
                enemy.max_hp = proposal.max_hp;
                enemy.description = proposal.description.clone();
                enemy.alive = proposal.hp > 0;
                if proposal.attack > 0 {
                    enemy.attack = proposal.attack;
                }
            }
            None => {
                debug!(name = %proposal.name, "adding enemy to roster");
                session.enemies.push(Enemy {
                    name: proposal.name.clone(),
                    hp: proposal.hp,
                    max_hp: proposal.max_hp,
                    alive: proposal.hp > 0,
                    description: proposal.description.clone(),
                    attack: if proposal.attack > 0 {
                        proposal.attack
                    } else {
                        DEFAULT_ATTACK
                    },
                });
            }
        }
    }

    if !session.in_combat && session.any_enemy_alive() {
        session.in_combat = true;
        log.push("Combat started!".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::create_sample_warrior;
    use chrono::Utc;
    use crate::world::{LocationType, SessionId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Smallest seed whose first d20 roll comes up 20.
    fn seed_rolling_twenty_first() -> u64 {
        (0..10_000u64)
            .find(|&seed| dice::d20_with_rng(&mut StdRng::seed_from_u64(seed)) == 20)
            .expect("no seed in range opens with a natural 20")
    }

    fn session_with_enemies(enemies: Vec<Enemy>) -> GameSession {
        GameSession {
            id: SessionId::new(),
            current_location: "The Infinite Tavern".to_string(),
            location_type: LocationType::Tavern,
            world_time: "Evening".to_string(),
            language: "English".to_string(),
            turn_number: 0,
            created_at: Utc::now(),
            in_combat: enemies.iter().any(|e| e.alive),
            game_over: false,
            combat_xp_awarded: false,
            player: Some(create_sample_warrior("Test Hero")),
            npcs: Vec::new(),
            enemies,
            quests: Vec::new(),
            memories: Vec::new(),
            token_usage: Vec::new(),
        }
    }

    fn goblin(hp: i32) -> Enemy {
        Enemy {
            name: "Goblin".to_string(),
            hp,
            max_hp: 7,
            alive: hp > 0,
            description: "A scrawny goblin".to_string(),
            attack: 4,
        }
    }

    #[test]
    fn test_adjudicate_attack_boundaries() {
        // Defense 0, attack 4: roll 6 makes exactly 10.
        assert_eq!(adjudicate_attack(6, 4, 0), AttackOutcome::Hit);
        assert_eq!(adjudicate_attack(5, 4, 0), AttackOutcome::Dodged);
        assert_eq!(adjudicate_attack(18, 4, 0), AttackOutcome::Hit);

        // Defense 3 raises the bar to 13; a 10 would have hit bare skin.
        assert_eq!(adjudicate_attack(6, 4, 3), AttackOutcome::Blocked);
        assert_eq!(adjudicate_attack(9, 4, 3), AttackOutcome::Hit);

        // Natural 20 always crits regardless of defense.
        assert_eq!(adjudicate_attack(20, 0, 50), AttackOutcome::Critical);
    }

    #[test]
    fn test_identify_attacker_by_name_and_reason() {
        let session = session_with_enemies(vec![goblin(7)]);

        assert_eq!(
            identify_attacker(&session, Some("goblin"), ""),
            Attacker::Living(0)
        );
        assert_eq!(
            identify_attacker(&session, None, "The goblin slashes wildly"),
            Attacker::Living(0)
        );
        assert_eq!(
            identify_attacker(&session, None, "A rock falls on you"),
            Attacker::Unknown
        );
    }

    #[test]
    fn test_dead_attacker_discards_proposal() {
        let mut session = session_with_enemies(vec![goblin(0)]);
        let hp_before = session.player.as_ref().unwrap().hp;
        let mut log = Vec::new();

        apply_damage_to_player(
            &mut session,
            Some("Goblin"),
            5,
            "Goblin bite",
            &mut rand::thread_rng(),
            &mut log,
        );

        assert_eq!(session.player.as_ref().unwrap().hp, hp_before);
        assert!(log.is_empty(), "discard must leave no log line: {log:?}");
    }

    #[test]
    fn test_environmental_damage_skips_hit_roll() {
        let mut session = session_with_enemies(Vec::new());
        let mut log = Vec::new();

        apply_damage_to_player(
            &mut session,
            None,
            4,
            "Fell from the ledge",
            &mut rand::thread_rng(),
            &mut log,
        );

        assert_eq!(session.player.as_ref().unwrap().hp, 8);
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("took 4 damage"));
    }

    #[test]
    fn test_player_damage_floors_at_zero_and_announces_fall() {
        let mut session = session_with_enemies(Vec::new());
        session.player.as_mut().unwrap().hp = 3;
        let mut log = Vec::new();

        apply_damage_to_player(
            &mut session,
            None,
            99,
            "Cave-in",
            &mut rand::thread_rng(),
            &mut log,
        );

        assert_eq!(session.player.as_ref().unwrap().hp, 0);
        assert!(log.iter().any(|l| l.contains("Player has fallen!")));
    }

    #[test]
    fn test_enemy_attack_with_overwhelming_rating_always_lands() {
        // attack 30 beats 10 + defense for every non-crit roll, so the
        // only variance left is the critical double.
        let mut session = session_with_enemies(vec![Enemy {
            attack: 30,
            ..goblin(7)
        }]);
        let mut log = Vec::new();

        apply_damage_to_player(
            &mut session,
            Some("Goblin"),
            3,
            "Goblin stab",
            &mut rand::thread_rng(),
            &mut log,
        );

        let hp = session.player.as_ref().unwrap().hp;
        assert!(hp == 9 || hp == 6, "expected 3 or 6 damage, hp = {hp}");
        assert!(log.iter().any(|l| l.contains("took")));
    }

    #[test]
    fn test_natural_twenty_exactly_doubles_damage_to_player() {
        let seed = seed_rolling_twenty_first();
        let mut session = session_with_enemies(vec![goblin(7)]);
        let hp_before = session.player.as_ref().unwrap().hp;
        let mut log = Vec::new();

        apply_damage_to_player(
            &mut session,
            Some("Goblin"),
            3,
            "Goblin stab",
            &mut StdRng::seed_from_u64(seed),
            &mut log,
        );

        assert_eq!(session.player.as_ref().unwrap().hp, hp_before - 6);
        assert!(log.iter().any(|l| l == "Critical hit by Goblin!"));
        assert!(log.iter().any(|l| l.contains("took 6 damage")));
    }

    #[test]
    fn test_natural_twenty_exactly_doubles_damage_to_enemy() {
        let seed = seed_rolling_twenty_first();
        let mut session = session_with_enemies(vec![goblin(7)]);
        let mut log = Vec::new();

        let handled = apply_damage_to_enemy(
            &mut session,
            "Goblin",
            2,
            "Sword strike",
            &mut StdRng::seed_from_u64(seed),
            &mut log,
        );

        assert!(handled);
        assert_eq!(session.enemies[0].hp, 3);
        assert!(log.iter().any(|l| l == "Critical hit!"));
        assert!(log.iter().any(|l| l.contains("Goblin took 4 damage")));
    }

    #[test]
    fn test_extreme_damage_amounts_do_not_overflow() {
        let seed = seed_rolling_twenty_first();
        let mut session = session_with_enemies(vec![goblin(7)]);
        let mut log = Vec::new();

        // Critical doubling of i32::MAX must clamp, not wrap.
        apply_damage_to_player(
            &mut session,
            Some("Goblin"),
            i32::MAX,
            "Meteor swarm",
            &mut StdRng::seed_from_u64(seed),
            &mut log,
        );
        assert_eq!(session.player.as_ref().unwrap().hp, 0);

        let mut log = Vec::new();
        let handled = apply_damage_to_enemy(
            &mut session,
            "Goblin",
            i32::MAX,
            "Meteor swarm",
            &mut StdRng::seed_from_u64(seed),
            &mut log,
        );
        assert!(handled);
        assert_eq!(session.enemies[0].hp, 0);
    }

    #[test]
    fn test_combat_xp_reward_saturates_on_extreme_ratings() {
        let monster = vec![Enemy {
            attack: i32::MAX,
            max_hp: i32::MAX,
            ..goblin(0)
        }];
        assert_eq!(combat_xp_reward(&monster), i32::MAX as u32);
    }

    #[test]
    fn test_killing_last_enemy_ends_combat_and_awards_xp_once() {
        let mut session = session_with_enemies(vec![goblin(2), goblin_named("Orc", 0)]);
        assert!(session.in_combat);
        let xp_before = session.player.as_ref().unwrap().experience;
        let mut log = Vec::new();

        let handled = apply_damage_to_enemy(
            &mut session,
            "Goblin",
            50,
            "Sword strike",
            &mut rand::thread_rng(),
            &mut log,
        );

        assert!(handled);
        assert!(!session.in_combat);
        assert!(session.combat_xp_awarded);
        assert_eq!(log.iter().filter(|l| l.contains("Victory")).count(), 1);
        assert_eq!(log.iter().filter(|l| l.contains("XP")).count(), 1);
        let player = session.player.as_ref().unwrap();
        assert!(player.experience > xp_before || player.level > 1);
    }

    #[test]
    fn test_damage_to_unknown_enemy_falls_through() {
        let mut session = session_with_enemies(vec![goblin(7)]);
        let mut log = Vec::new();
        let handled = apply_damage_to_enemy(
            &mut session,
            "Dragon",
            5,
            "Wild swing",
            &mut rand::thread_rng(),
            &mut log,
        );
        assert!(!handled);
        assert!(log.is_empty());
    }

    #[test]
    fn test_combat_xp_reward_formula_and_floor() {
        // Single weak enemy: 10 + 2*5 + 6/3 = 22.
        let weak = vec![Enemy {
            attack: 2,
            max_hp: 6,
            ..goblin(0)
        }];
        assert_eq!(combat_xp_reward(&weak), 22);

        // A roster worth less than the floor still pays 20.
        let trivial = vec![Enemy {
            attack: 0,
            max_hp: 3,
            ..goblin(0)
        }];
        assert_eq!(combat_xp_reward(&trivial), 20);
    }

    #[test]
    fn test_sync_roster_updates_and_preserves_attack() {
        let mut session = session_with_enemies(vec![goblin(7)]);
        session.in_combat = false;
        session.enemies[0].alive = false;
        session.enemies[0].hp = 0;
        let mut log = Vec::new();

        let proposals = vec![
            EnemyProposal {
                name: "GOBLIN".to_string(),
                hp: 5,
                max_hp: 7,
                description: "Bleeding but angry".to_string(),
                attack: 0,
            },
            EnemyProposal {
                name: "Wolf".to_string(),
                hp: 11,
                max_hp: 11,
                description: "A grey wolf".to_string(),
                attack: 0,
            },
        ];

        sync_roster(&mut session, &proposals, &mut log);

        assert_eq!(session.enemies.len(), 2);
        assert_eq!(session.enemies[0].hp, 5);
        assert!(session.enemies[0].alive);
        // Attack 0 in the proposal keeps the previous rating.
        assert_eq!(session.enemies[0].attack, 4);
        // New entries without a rating get the default.
        assert_eq!(session.enemies[1].attack, DEFAULT_ATTACK);
        assert!(session.in_combat);
        assert_eq!(log, vec!["Combat started!".to_string()]);
    }

    fn goblin_named(name: &str, hp: i32) -> Enemy {
        Enemy {
            name: name.to_string(),
            ..goblin(hp)
        }
    }
}
