//! Prompt construction.
//!
//! All templates are written in English; the target narrative language is
//! injected as an instruction line. User prompts serialize the session
//! into a plain-text state block the generator can ground itself on.

use crate::checks::SkillCheckResult;
use crate::leveling;
use crate::world::{GameSession, MemoryKind, PlayerCharacter, QuestStatus};

/// How many recent event memories go into a turn prompt.
const RECENT_MEMORY_COUNT: usize = 5;

/// How many high-importance memories go into a turn prompt.
const IMPORTANT_MEMORY_COUNT: usize = 3;

/// How many recent event memories feed a summary.
const SUMMARY_MEMORY_COUNT: usize = 10;

fn language_instruction(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("ukrainian") {
        "IMPORTANT: Respond ONLY in Ukrainian language. All narrative, dialogues, descriptions, and suggested actions must be in Ukrainian."
    } else {
        "IMPORTANT: Respond in English language."
    }
}

/// System prompt for an ordinary (non-combat) turn.
pub fn system_prompt(language: &str) -> String {
    format!(
        r#"You are the Dungeon Master of the Infinite Tavern, a fantasy RPG.

{}

CRITICAL RULES:
1. You are NOT the source of truth. The backend is.
2. NEVER modify stats directly.
3. ONLY suggest state changes through "events".
4. NEVER contradict established facts.
5. Do NOT invent player abilities.
6. Keep the tone consistent fantasy (medieval style).
7. Return ONLY valid JSON, no extra text.

EVENT TYPES:
- "damage": reduce HP (target: "player" or a creature name, amount, reason; attacker: the enemy's name when an enemy strikes the player)
- "heal": restore HP (target: "player", amount, reason)
- "item_found": player finds an item (reason: item name, amount: quantity; optionally item_type, bonuses, is_unique)
- "item_lost": player loses or uses an item (reason: item name, amount: quantity)
- "gold_found" / "gold_spent": gold changes (amount, reason)
- "xp_gained": player earns experience (amount, reason)

SKILL CHECKS:
Only request a skill check when the player's action already attempts something challenging.
Use "Strength" for physical feats, "Dexterity" for agility, "Intelligence" for knowledge.
Difficulty ranges: Easy (8), Medium (12), Hard (15), Very Hard (18).
CRITICAL: if you request a skill check, do NOT include events that depend on its outcome.
The backend rolls the dice; you will narrate the consequences in a separate call.
Describe the attempt without revealing the outcome.

SUGGESTED ACTIONS:
After each narrative, provide 3 short action options (2-8 words each), contextually relevant and actionable.

RESPONSE FORMAT (strict JSON):
{{
  "narrative": "Vivid scene description in second person...",
  "events": [{{"type": "damage", "target": "player", "amount": 4, "reason": "Goblin attack", "attacker": "Goblin"}}],
  "new_npcs": [{{"name": "NPC Name", "personalityTraits": "Brief description", "currentLocation": "Location name"}}],
  "quest_updates": [{{"questTitle": "Exact quest title", "status": "Active" or "Completed" or "Failed"}}],
  "location_change": {{"newLocation": "Name", "locationType": "Town", "description": "Brief"}} OR null,
  "skill_checks": [{{"attribute": "Strength", "difficulty": 12, "purpose": "Climb the wall"}}],
  "suggested_actions": ["Option 1", "Option 2", "Option 3"],
  "enemies": [{{"name": "Enemy Name", "hp": 20, "maxHP": 20, "description": "Brief", "attack": 4}}]
}}

Use the "enemies" array ONLY when starting a combat encounter. The "attack" value rates the enemy's
threat: 2-3 weak, 4-5 average, 6-8 dangerous.

Be creative, reactive to player choices, and reward exploration."#,
        language_instruction(language)
    )
}

/// System prompt while the combat flag is up.
pub fn combat_system_prompt(language: &str) -> String {
    format!(
        r#"You are the Dungeon Master managing a combat encounter in the Infinite Tavern.

{}

COMBAT RULES:
1. Combat continues until all enemies are defeated, the player dies, or the player flees.
2. Each conscious enemy attacks every turn unless the player's action prevents it.
3. Enemy damage should be reasonable (2-6 HP typically).
4. When an enemy strikes the player, set "attacker" to that enemy's name on the damage event;
   the backend rolls to see whether the blow lands.
5. Keep combat vivid but brief (3-5 sentences).

RESPONSE FORMAT (strict JSON):
{{
  "narrative": "Combat description...",
  "events": [
    {{"type": "damage", "target": "Goblin 1", "amount": 8, "reason": "Sword strike"}},
    {{"type": "damage", "target": "player", "amount": 3, "reason": "Goblin 2 counterattack", "attacker": "Goblin 2"}}
  ],
  "enemies": [{{"name": "Goblin 1", "hp": 12, "maxHP": 20, "description": "A vicious goblin warrior", "attack": 4}}],
  "skill_checks": [],
  "suggested_actions": ["Attack Goblin 1", "Attack Goblin 2", "Attempt to flee"]
}}

The "enemies" array must list ALL enemies in combat with their current HP."#,
        language_instruction(language)
    )
}

/// System prompt for a new game's opening scene.
pub fn opening_system_prompt(language: &str) -> String {
    format!(
        r#"You are a creative Dungeon Master starting a new fantasy RPG adventure.
Create a UNIQUE, engaging opening scene (2-3 paragraphs) for a player entering the legendary Infinite Tavern.

{}

Invent an ORIGINAL starting scenario for how the player arrived. Write in second person.
Give an intriguing hook, and provide 3 short first action options (2-8 words each).

Return your response IN JSON FORMAT:
{{
  "narrative": "Your story here...",
  "suggested_actions": ["First option", "Second option", "Third option"]
}}"#,
        language_instruction(language)
    )
}

/// System prompt for narrating an already-rolled skill check.
pub fn skill_check_outcome_system_prompt(language: &str) -> String {
    format!(
        r#"You are the Dungeon Master describing the outcome of a skill check.

{}

The player attempted an action and dice were rolled. Based on the result, describe what happens.
On SUCCESS, make it rewarding and include events (item_found, gold_found, ...) when success would
logically grant them. On FAILURE, include consequences such as damage when failure would cause harm.
Keep it brief (2-4 sentences). Return ONLY valid JSON.

RESPONSE FORMAT:
{{
  "narrative": "Brief description of what happens...",
  "events": [{{"type": "damage", "target": "player", "amount": 3, "reason": "Fell while climbing"}}]
}}"#,
        language_instruction(language)
    )
}

/// System prompt for the periodic memory summary.
pub fn summary_system_prompt(language: &str) -> String {
    format!(
        "You are a helpful assistant. Summarize the events concisely in 2-3 sentences.\n\n{}",
        language_instruction(language)
    )
}

/// Serialize the session into the turn user-prompt: state block, roster,
/// NPCs in scene, quests, memories, then the raw player action.
pub fn build_turn_prompt(session: &GameSession, player: &PlayerCharacter, action: &str) -> String {
    let mut out = String::new();

    out.push_str("=== GAME STATE ===\n");
    out.push_str(&format!("Turn: {}\n", session.turn_number));
    out.push_str(&format!("Location: {}\n", session.current_location));
    out.push_str(&format!("Time: {}\n\n", session.world_time));

    out.push_str("=== PLAYER CHARACTER ===\n");
    out.push_str(&format!("Name: {}\n", player.name));
    out.push_str(&format!("Race: {}\n", player.race));
    out.push_str(&format!("Class: {}\n", player.class));
    out.push_str(&format!("Level: {}\n", player.level));
    out.push_str(&format!("HP: {}/{}\n", player.hp, player.max_hp));
    out.push_str(&format!("Strength: {}\n", player.abilities.strength));
    out.push_str(&format!("Dexterity: {}\n", player.abilities.dexterity));
    out.push_str(&format!("Constitution: {}\n", player.abilities.constitution));
    out.push_str(&format!("Intelligence: {}\n", player.abilities.intelligence));
    out.push_str(&format!("Wisdom: {}\n", player.abilities.wisdom));
    out.push_str(&format!("Charisma: {}\n", player.abilities.charisma));
    out.push_str(&format!(
        "Defense: {} (dodge/block rating; higher = harder to hit)\n",
        player.defense()
    ));
    out.push_str(&format!(
        "Experience: {}/{} (next level)\n",
        player.experience,
        leveling::xp_to_next_level(player.level)
    ));
    out.push_str(&format!("Gold: {}\n", player.gold));

    if player.inventory.is_empty() {
        out.push_str("Inventory: Empty\n");
    } else {
        out.push_str("Inventory:\n");
        for item in &player.inventory {
            let equipped = if item.equipped { " (equipped)" } else { "" };
            out.push_str(&format!("  - {} x{}{}\n", item.name, item.quantity, equipped));
        }
    }
    out.push('\n');

    if session.in_combat && session.any_enemy_alive() {
        out.push_str("=== COMBAT - ENEMIES ===\n");
        for enemy in session.enemies.iter().filter(|e| e.alive) {
            out.push_str(&format!("- {}: {}/{} HP\n", enemy.name, enemy.hp, enemy.max_hp));
            if !enemy.description.is_empty() {
                out.push_str(&format!("  {}\n", enemy.description));
            }
        }
        out.push('\n');
    }

    let nearby: Vec<_> = session
        .npcs
        .iter()
        .filter(|n| n.alive && n.location == session.current_location)
        .collect();
    if !nearby.is_empty() {
        out.push_str("=== NPCs IN SCENE ===\n");
        for npc in nearby {
            out.push_str(&format!("- {}: {}\n", npc.name, npc.personality));
            out.push_str(&format!("  Relationship: {}\n", npc.relationship));
        }
        out.push('\n');
    }

    let active: Vec<_> = session
        .quests
        .iter()
        .filter(|q| q.status == QuestStatus::Active)
        .collect();
    if !active.is_empty() {
        out.push_str("=== ACTIVE QUESTS ===\n");
        for quest in active {
            out.push_str(&format!("- {}\n  {}\n", quest.title, quest.description));
        }
        out.push('\n');
    }

    let mut important: Vec<_> = session
        .memories
        .iter()
        .filter(|m| m.kind != MemoryKind::Event)
        .collect();
    important.sort_by(|a, b| b.importance.cmp(&a.importance));
    important.truncate(IMPORTANT_MEMORY_COUNT);
    if !important.is_empty() {
        out.push_str("=== IMPORTANT MEMORIES ===\n");
        for memory in important {
            out.push_str(&format!("- [{:?}] {}\n", memory.kind, memory.content));
        }
        out.push('\n');
    }

    // Last few event memories, oldest first.
    let events: Vec<_> = session
        .memories
        .iter()
        .filter(|m| m.kind == MemoryKind::Event)
        .collect();
    let recent = &events[events.len().saturating_sub(RECENT_MEMORY_COUNT)..];
    if !recent.is_empty() {
        out.push_str("=== RECENT EVENTS ===\n");
        for memory in recent {
            out.push_str(&format!("- {}\n", memory.content));
        }
        out.push('\n');
    }

    out.push_str("=== PLAYER ACTION ===\n");
    out.push_str(action);
    out.push_str("\n\nGenerate narrative and events in strict JSON format.\n");

    out
}

/// User prompt for the opening scene.
pub fn build_opening_prompt(player: &PlayerCharacter) -> String {
    let mut equipment = String::new();
    for item in &player.inventory {
        equipment.push_str(&format!("- {}\n", item.name));
    }

    format!(
        r#"Character: {}, a level {} {} {}

Stats:
- HP: {}/{}
- Strength: {}
- Dexterity: {}
- Intelligence: {}

Starting equipment:
{}
Create an immersive, ORIGINAL opening scene that incorporates the character's race and class.
Make it unique and memorable. Include 3 contextually relevant action options."#,
        player.name,
        player.level,
        player.race,
        player.class,
        player.hp,
        player.max_hp,
        player.abilities.strength,
        player.abilities.dexterity,
        player.abilities.intelligence,
        equipment
    )
}

/// User prompt for narrating an already-rolled skill check.
pub fn build_skill_outcome_prompt(action: &str, result: &SkillCheckResult) -> String {
    let verdict = if result.success { "SUCCESS" } else { "FAILURE" };
    format!(
        r#"Player action: {}
Skill check: {} (DC {})
Player rolled: {} + {} = {}
Result: {}

Describe what happens as a consequence of this {}."#,
        action,
        result.attribute,
        result.difficulty,
        result.roll,
        result.modifier,
        result.total,
        verdict,
        verdict.to_lowercase()
    )
}

/// User prompt for the periodic summary, or None when there is nothing
/// worth summarizing yet.
pub fn build_summary_prompt(session: &GameSession) -> Option<String> {
    let events: Vec<_> = session
        .memories
        .iter()
        .filter(|m| m.kind == MemoryKind::Event)
        .collect();
    if events.is_empty() {
        return None;
    }

    let recent = &events[events.len().saturating_sub(SUMMARY_MEMORY_COUNT)..];
    let mut prompt = String::from("Summarize the following events into a brief paragraph:\n\n");
    for memory in recent {
        prompt.push_str(&memory.content);
        prompt.push('\n');
    }
    Some(prompt)
}

// ==== Fallbacks ====

/// Narrative used when the generator call fails or returns garbage.
pub fn fallback_turn_narrative(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("ukrainian") {
        "Майстер підземель виглядає розгубленим. Нічого не відбувається."
    } else {
        "The dungeon master seems confused. Nothing happens."
    }
}

/// Fallback consequence line when the outcome call fails.
pub fn fallback_skill_outcome(result: &SkillCheckResult) -> String {
    if result.success {
        format!("You manage to {} successfully!", result.purpose.to_lowercase())
    } else {
        format!("You fail to {}.", result.purpose.to_lowercase())
    }
}

/// Canned opening used when generation fails or is skipped.
pub fn default_opening_narrative(name: &str, race: &str, class: &str, language: &str) -> String {
    if language.eq_ignore_ascii_case("ukrainian") {
        format!(
            "Вітаємо, {name}! Ви - {race} {class}, який щойно прибув до легендарної Нескінченної Таверни. \
             Тепле сяйво ліхтарів освітлює дерев'яні столи, де пригодники з далеких земель діляться розповідями про славу. \
             Гаррік, таверняр, знавіще кивує вам. Що ви робите?"
        )
    } else {
        format!(
            "Welcome, {name}! You are a {race} {class} who has just arrived at the legendary Infinite Tavern. \
             The warm glow of lanterns illuminates wooden tables where adventurers from distant lands share tales of glory. \
             Garrick, the tavern keeper, nods at you knowingly. What do you do?"
        )
    }
}

/// Canned first action options.
pub fn default_suggested_actions(language: &str) -> Vec<String> {
    let actions: &[&str] = if language.eq_ignore_ascii_case("ukrainian") {
        &["Підійти до Гарріка", "Оглянути таверну", "Замовити напій"]
    } else {
        &["Approach Garrick", "Look around the tavern", "Order a drink"]
    };
    actions.iter().map(|s| s.to_string()).collect()
}
