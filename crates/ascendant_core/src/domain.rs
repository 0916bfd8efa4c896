//! crates/ascendant_core/src/domain.rs
//!
//! Defines the pure, core data structures of the progression engine.
//! Every type here is what gets persisted locally and synced remotely, so all of
//! them are serde-serializable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::level::{title_for_level, xp_threshold_for_level};

//=========================================================================================
// Player Stats
//=========================================================================================

/// One of the five ability scores on the character sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Agility,
    Vitality,
    Intelligence,
    Concentration,
}

impl Ability {
    pub const ALL: [Ability; 5] = [
        Ability::Strength,
        Ability::Agility,
        Ability::Vitality,
        Ability::Intelligence,
        Ability::Concentration,
    ];
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ability::Strength => "strength",
            Ability::Agility => "agility",
            Ability::Vitality => "vitality",
            Ability::Intelligence => "intelligence",
            Ability::Concentration => "concentration",
        };
        f.write_str(name)
    }
}

/// The aggregate character sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub name: String,
    pub level: u32,
    pub xp: u64,
    pub xp_next_level: u64,
    pub strength: u32,
    pub agility: u32,
    pub vitality: u32,
    pub intelligence: u32,
    pub concentration: u32,
    pub title: String,
    pub streak: u32,
    pub available_stat_points: u32,
    /// Highest level whose stat point has been paid out.
    pub peak_level: u32,
    pub skill_points: u32,
    pub onboarding_complete: bool,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            name: String::new(),
            level: 1,
            xp: 0,
            xp_next_level: xp_threshold_for_level(2),
            strength: 10,
            agility: 10,
            vitality: 10,
            intelligence: 10,
            concentration: 10,
            title: title_for_level(1).to_string(),
            streak: 0,
            available_stat_points: 0,
            peak_level: 1,
            skill_points: 0,
            onboarding_complete: false,
        }
    }
}

impl PlayerStats {
    pub fn ability(&self, ability: Ability) -> u32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Agility => self.agility,
            Ability::Vitality => self.vitality,
            Ability::Intelligence => self.intelligence,
            Ability::Concentration => self.concentration,
        }
    }

    pub fn ability_mut(&mut self, ability: Ability) -> &mut u32 {
        match ability {
            Ability::Strength => &mut self.strength,
            Ability::Agility => &mut self.agility,
            Ability::Vitality => &mut self.vitality,
            Ability::Intelligence => &mut self.intelligence,
            Ability::Concentration => &mut self.concentration,
        }
    }
}

/// A partial update to `PlayerStats`. `None` fields are left untouched.
///
/// Level, next-level XP and title are always derived from the merged XP, so
/// they cannot be set directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsUpdate {
    pub name: Option<String>,
    pub xp: Option<u64>,
    pub strength: Option<u32>,
    pub agility: Option<u32>,
    pub vitality: Option<u32>,
    pub intelligence: Option<u32>,
    pub concentration: Option<u32>,
    pub streak: Option<u32>,
    pub skill_points: Option<u32>,
}

//=========================================================================================
// Quests and Habits
//=========================================================================================

/// Whether completing an item rewards (`Good`) or costs (`Bad`) experience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Good,
    Bad,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Epic,
}

impl Difficulty {
    /// XP awarded when a draft does not name its own value.
    pub fn default_xp(self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Normal => 25,
            Difficulty::Hard => 50,
            Difficulty::Epic => 100,
        }
    }
}

/// A one-off or recurring task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub xp_value: u32,
    pub polarity: Polarity,
    pub recurring: bool,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

/// A recurring quest variant with a daily completion flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub xp_value: u32,
    pub polarity: Polarity,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

/// User-entered fields for creating or editing a quest or habit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestDraft {
    pub title: String,
    pub description: Option<String>,
    pub xp_value: Option<u32>,
    pub polarity: Polarity,
    pub recurring: bool,
    pub difficulty: Difficulty,
}

/// Historical record of one completion (or reversal) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestLogEntry {
    pub id: Uuid,
    pub item_id: Uuid,
    pub title: String,
    /// Signed XP change actually applied to the player.
    pub xp_delta: i64,
    pub polarity: Polarity,
    pub completed: bool,
    pub timestamp: DateTime<Utc>,
}

//=========================================================================================
// Skill Tree
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<String>,
    pub xp_reward: u32,
    #[serde(default)]
    pub custom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillPath {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ordered; each node is gated by mastery of the one before it.
    pub nodes: Vec<SkillNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTree {
    pub paths: Vec<SkillPath>,
}

impl SkillTree {
    /// Finds a node and returns it with its path index and position in the path.
    pub fn locate(&self, node_id: &str) -> Option<(usize, usize, &SkillNode)> {
        self.paths.iter().enumerate().find_map(|(p, path)| {
            path.nodes
                .iter()
                .position(|n| n.id == node_id)
                .map(|i| (p, i, &path.nodes[i]))
        })
    }

    pub fn node(&self, node_id: &str) -> Option<&SkillNode> {
        self.locate(node_id).map(|(_, _, node)| node)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillNodeDraft {
    pub name: String,
    pub description: String,
    pub tasks: Vec<String>,
    pub xp_reward: u32,
}

/// Derived lifecycle state of a skill node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Locked,
    Unlocked,
    Active,
    Mastered,
}

/// In-progress skill nodes: node id to the set of completed task strings.
pub type ActiveSkillQuests = BTreeMap<String, BTreeSet<String>>;

//=========================================================================================
// Perks and Buffs
//=========================================================================================

/// The effect a perk applies when it is granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerkEffect {
    /// One-time ability increments.
    StatBoost { boosts: Vec<(Ability, u32)> },
    /// Standing bonus on XP gained from good quests, in percent.
    XpMultiplier { percent: u32 },
}

/// A perk granted to the player, as stored in the buff list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buff {
    pub id: String,
    pub name: String,
    pub description: String,
    pub effect: PerkEffect,
    pub permanent: bool,
    pub level: u32,
    pub granted_at: DateTime<Utc>,
}

//=========================================================================================
// Journal
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Great,
    Good,
    #[default]
    Neutral,
    Low,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalDraft {
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub tags: Vec<String>,
}

//=========================================================================================
// Events and Snapshots
//=========================================================================================

/// Something the presentation layer should be told about after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    LevelUp { level: u32, perk: Option<Buff> },
    SkillMastered { node_id: String, name: String },
}

/// Everything except the stats, bundled the way the remote record stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub quests: Vec<Quest>,
    pub completed_quests: Vec<Uuid>,
    pub quest_log: Vec<QuestLogEntry>,
    pub journal: Vec<JournalEntry>,
    pub skill_tree: SkillTree,
    pub mastered_skills: Vec<String>,
    pub active_skill_quests: Vec<(String, Vec<String>)>,
    pub buffs: Vec<Buff>,
    pub habits: Vec<Habit>,
    pub last_active_date: Option<NaiveDate>,
}

/// The full serialized state of a player's progression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub stats: PlayerStats,
    pub settings: ProfileSettings,
}

/// The remote sync record, one per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProfile {
    pub user_id: Uuid,
    pub snapshot: ProfileSnapshot,
    pub onboarding_complete: bool,
    pub updated_at: DateTime<Utc>,
}
