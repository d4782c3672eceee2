//! Game world types.
//!
//! Contains all persisted state for one game: the session document, the
//! player character, items, enemies, NPCs, quests, memory entries, and
//! token usage accounting. A [`GameSession`] is the unit of persistence
//! and concurrency; everything else is embedded inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for game sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Abilities
// ============================================================================

/// The six character attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    /// Parse an attribute name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Ability> {
        match name.trim().to_lowercase().as_str() {
            "strength" => Some(Ability::Strength),
            "dexterity" => Some(Ability::Dexterity),
            "constitution" => Some(Ability::Constitution),
            "intelligence" => Some(Ability::Intelligence),
            "wisdom" => Some(Ability::Wisdom),
            "charisma" => Some(Ability::Charisma),
            _ => None,
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn get_mut(&mut self, ability: Ability) -> &mut i32 {
        match ability {
            Ability::Strength => &mut self.strength,
            Ability::Dexterity => &mut self.dexterity,
            Ability::Constitution => &mut self.constitution,
            Ability::Intelligence => &mut self.intelligence,
            Ability::Wisdom => &mut self.wisdom,
            Ability::Charisma => &mut self.charisma,
        }
    }

    /// Standard tabletop modifier, floor-divided toward negative infinity.
    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }
}

/// Modifier for a raw attribute value: `(value - 10) / 2`, floored.
pub fn ability_modifier(value: i32) -> i32 {
    (value - 10).div_euclid(2)
}

// ============================================================================
// Character classes
// ============================================================================

/// Closed lookup key for class-specific behavior.
///
/// The character sheet stores the class as an open string (the generator may
/// invent flavors like "Battle Mage"); mechanical lookups go through this
/// enum with `Other` as the explicit default row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Wizard,
    Rogue,
    Cleric,
    Ranger,
    Other,
}

impl CharacterClass {
    /// Look up a class by name, case-insensitively, defaulting to `Other`.
    pub fn from_name(name: &str) -> CharacterClass {
        match name.trim().to_lowercase().as_str() {
            "warrior" => CharacterClass::Warrior,
            "wizard" => CharacterClass::Wizard,
            "rogue" => CharacterClass::Rogue,
            "cleric" => CharacterClass::Cleric,
            "ranger" => CharacterClass::Ranger,
            _ => CharacterClass::Other,
        }
    }

    /// Max-HP gained per level.
    pub fn hp_per_level(&self) -> i32 {
        match self {
            CharacterClass::Warrior => 6,
            CharacterClass::Cleric | CharacterClass::Ranger => 5,
            CharacterClass::Rogue => 4,
            CharacterClass::Wizard => 3,
            CharacterClass::Other => 4,
        }
    }

    /// Attribute incremented on level-up.
    pub fn primary_attribute(&self) -> Ability {
        match self {
            CharacterClass::Warrior => Ability::Strength,
            CharacterClass::Wizard => Ability::Intelligence,
            CharacterClass::Rogue | CharacterClass::Ranger => Ability::Dexterity,
            CharacterClass::Cleric => Ability::Wisdom,
            CharacterClass::Other => Ability::Constitution,
        }
    }

    /// Base max HP at character creation.
    pub fn base_max_hp(&self) -> i32 {
        match self {
            CharacterClass::Warrior => 12,
            CharacterClass::Wizard => 6,
            CharacterClass::Rogue => 8,
            CharacterClass::Cleric | CharacterClass::Ranger => 10,
            CharacterClass::Other => 8,
        }
    }
}

// ============================================================================
// Items
// ============================================================================

/// Item categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    Weapon,
    Armor,
    Shield,
    Helmet,
    Boots,
    Amulet,
    Ring,
    Accessory,
    Potion,
    Scroll,
    Miscellaneous,
}

impl ItemType {
    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Weapon => "Weapon",
            ItemType::Armor => "Armor",
            ItemType::Shield => "Shield",
            ItemType::Helmet => "Helmet",
            ItemType::Boots => "Boots",
            ItemType::Amulet => "Amulet",
            ItemType::Ring => "Ring",
            ItemType::Accessory => "Accessory",
            ItemType::Potion => "Potion",
            ItemType::Scroll => "Scroll",
            ItemType::Miscellaneous => "Miscellaneous",
        }
    }

    /// Parse a generator-supplied type name; anything unrecognized falls
    /// back to `Miscellaneous`.
    pub fn from_name(name: &str) -> ItemType {
        match name.trim().to_lowercase().as_str() {
            "weapon" => ItemType::Weapon,
            "armor" => ItemType::Armor,
            "shield" => ItemType::Shield,
            "helmet" => ItemType::Helmet,
            "boots" => ItemType::Boots,
            "amulet" => ItemType::Amulet,
            "ring" => ItemType::Ring,
            "accessory" => ItemType::Accessory,
            "potion" => ItemType::Potion,
            "scroll" => ItemType::Scroll,
            _ => ItemType::Miscellaneous,
        }
    }

    /// Whether items of this type can be worn or wielded.
    pub fn is_equippable(&self) -> bool {
        !matches!(
            self,
            ItemType::Potion | ItemType::Scroll | ItemType::Miscellaneous
        )
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inventory item.
///
/// The name is the stacking key: within one inventory there is at most one
/// record per distinct name (case-insensitive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub item_type: ItemType,
    pub description: String,
    pub quantity: i32,
    pub equipped: bool,
    /// Stat-name to bonus mapping, only meaningful while equipped.
    #[serde(default)]
    pub bonuses: HashMap<String, i32>,
}

impl Item {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            item_type,
            description: String::new(),
            quantity: 1,
            equipped: false,
            bonuses: HashMap::new(),
        }
    }

    /// Bonus this item grants for the named stat (case-insensitive).
    pub fn bonus(&self, stat: &str) -> i32 {
        self.bonuses
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(stat))
            .map(|(_, value)| *value)
            .sum()
    }
}

// ============================================================================
// Player character
// ============================================================================

/// The player character embedded in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerCharacter {
    pub name: String,
    pub race: String,
    /// Open class string; mechanics use [`CharacterClass::from_name`].
    pub class: String,
    pub level: u32,
    pub experience: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub abilities: AbilityScores,
    pub gold: i32,
    pub inventory: Vec<Item>,
}

impl PlayerCharacter {
    pub fn class_kind(&self) -> CharacterClass {
        CharacterClass::from_name(&self.class)
    }

    /// Derived dodge rating: dexterity modifier plus the sum of "Defense"
    /// bonuses across equipped items. Never stored.
    pub fn defense(&self) -> i32 {
        let equipped_bonus: i32 = self
            .inventory
            .iter()
            .filter(|item| item.equipped)
            .map(|item| item.bonus("Defense"))
            .sum();
        self.abilities.modifier(Ability::Dexterity) + equipped_bonus
    }

    pub fn find_item(&self, name: &str) -> Option<&Item> {
        self.inventory
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    pub fn find_item_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.inventory
            .iter_mut()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }
}

/// Create a plain level-1 warrior, mostly for tests and examples.
pub fn create_sample_warrior(name: impl Into<String>) -> PlayerCharacter {
    PlayerCharacter {
        name: name.into(),
        race: "Human".to_string(),
        class: "Warrior".to_string(),
        level: 1,
        experience: 0,
        hp: 12,
        max_hp: 12,
        abilities: AbilityScores::default(),
        gold: 10,
        inventory: Vec::new(),
    }
}

// ============================================================================
// Enemies, NPCs, quests
// ============================================================================

/// An enemy in the current encounter roster.
///
/// Dead enemies stay in the roster (the "all dead ends combat" bookkeeping
/// needs them) until a new encounter replaces the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub alive: bool,
    pub description: String,
    /// Attack rating used in the hit/dodge calculation.
    /// Tiers: weak 2-3, normal 4-6, strong 7-9, boss 10-12.
    pub attack: i32,
}

/// A non-player character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    pub personality: String,
    pub relationship: String,
    pub location: String,
    pub alive: bool,
}

/// Quest progress states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestStatus {
    Active,
    Completed,
    Failed,
}

impl QuestStatus {
    pub fn from_name(name: &str) -> Option<QuestStatus> {
        match name.trim().to_lowercase().as_str() {
            "active" => Some(QuestStatus::Active),
            "completed" => Some(QuestStatus::Completed),
            "failed" => Some(QuestStatus::Failed),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuestStatus::Active => "Active",
            QuestStatus::Completed => "Completed",
            QuestStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A quest, keyed by title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub title: String,
    pub description: String,
    pub status: QuestStatus,
}

// ============================================================================
// Memory and accounting
// ============================================================================

/// Categories of remembered context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryKind {
    Event,
    Summary,
    Npc,
    Quest,
}

/// A free-text memory entry used as generator context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub content: String,
    pub kind: MemoryKind,
    pub importance: i32,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(content: impl Into<String>, kind: MemoryKind, importance: i32) -> Self {
        Self {
            content: content.into(),
            kind,
            importance,
            created_at: Utc::now(),
        }
    }
}

/// Per-call token usage record. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsageEntry {
    pub timestamp: DateTime<Utc>,
    pub turn_number: u32,
    pub call_type: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub model_name: String,
}

// ============================================================================
// Location and session
// ============================================================================

/// Categorical location types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LocationType {
    #[default]
    Tavern,
    Town,
    Forest,
    Dungeon,
    Cave,
    Mountain,
    Castle,
    Wilderness,
}

impl LocationType {
    pub fn from_name(name: &str) -> Option<LocationType> {
        match name.trim().to_lowercase().as_str() {
            "tavern" => Some(LocationType::Tavern),
            "town" => Some(LocationType::Town),
            "forest" => Some(LocationType::Forest),
            "dungeon" => Some(LocationType::Dungeon),
            "cave" => Some(LocationType::Cave),
            "mountain" => Some(LocationType::Mountain),
            "castle" => Some(LocationType::Castle),
            "wilderness" => Some(LocationType::Wilderness),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LocationType::Tavern => "Tavern",
            LocationType::Town => "Town",
            LocationType::Forest => "Forest",
            LocationType::Dungeon => "Dungeon",
            LocationType::Cave => "Cave",
            LocationType::Mountain => "Mountain",
            LocationType::Castle => "Castle",
            LocationType::Wilderness => "Wilderness",
        }
    }
}

/// One player's persisted game instance.
///
/// The whole document is loaded at the start of a turn and stored back at
/// the end; nothing outside a turn mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub current_location: String,
    pub location_type: LocationType,
    pub world_time: String,
    pub language: String,
    pub turn_number: u32,
    pub created_at: DateTime<Utc>,

    pub in_combat: bool,
    pub game_over: bool,
    /// One-shot guard: set when combat victory auto-awards XP, consumed by
    /// the next `xp_gained` event so the same kill is not counted twice.
    #[serde(default)]
    pub combat_xp_awarded: bool,

    pub player: Option<PlayerCharacter>,
    pub npcs: Vec<Npc>,
    pub enemies: Vec<Enemy>,
    pub quests: Vec<Quest>,
    pub memories: Vec<MemoryEntry>,
    pub token_usage: Vec<TokenUsageEntry>,
}

impl GameSession {
    /// Find a living enemy by name, case-insensitively.
    pub fn find_living_enemy(&self, name: &str) -> Option<usize> {
        self.enemies
            .iter()
            .position(|e| e.alive && e.name.eq_ignore_ascii_case(name))
    }

    /// Find any roster enemy by name, case-insensitively.
    pub fn find_enemy(&self, name: &str) -> Option<usize> {
        self.enemies
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn any_enemy_alive(&self) -> bool {
        self.enemies.iter().any(|e| e.alive)
    }

    pub fn find_living_npc_mut(&mut self, name: &str) -> Option<&mut Npc> {
        self.npcs
            .iter_mut()
            .find(|n| n.alive && n.name.eq_ignore_ascii_case(name))
    }
}
