//! Experience accrual and level-up cascade.
//!
//! The XP curve is a fixed linear one: each level requires `level * 150`
//! experience. A single award can cross several thresholds; every crossing
//! applies the class growth row (max-HP gain, matching heal, +1 primary
//! attribute) before the function returns.

use crate::world::PlayerCharacter;

/// Experience required to advance from `level` to `level + 1`.
pub fn xp_to_next_level(level: u32) -> u32 {
    level * 150
}

/// Add experience and run any resulting level-ups.
///
/// Returns one human-readable line per level gained. Callers log their own
/// "gained N XP" line; this only narrates the level-ups themselves.
pub fn apply_experience(player: &mut PlayerCharacter, amount: u32) -> Vec<String> {
    player.experience += amount;

    let mut lines = Vec::new();
    while player.experience >= xp_to_next_level(player.level) {
        player.experience -= xp_to_next_level(player.level);
        player.level += 1;

        let class = player.class_kind();
        let hp_gain = class.hp_per_level();
        player.max_hp += hp_gain;
        player.hp = (player.hp + hp_gain).min(player.max_hp);

        let attribute = class.primary_attribute();
        *player.abilities.get_mut(attribute) += 1;

        lines.push(format!(
            "LEVEL UP! {} is now level {}! (+{} max HP, +1 {})",
            player.name, player.level, hp_gain, attribute
        ));
    }

    lines
}
