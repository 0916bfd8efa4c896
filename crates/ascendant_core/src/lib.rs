pub mod domain;
pub mod error;
pub mod level;
pub mod perks;
pub mod ports;
pub mod skills;
pub mod storage;
pub mod store;
pub mod validation;

pub use domain::{
    Ability, Buff, Difficulty, Habit, JournalDraft, JournalEntry, Mood, NodeStatus, PerkEffect,
    PlayerStats, Polarity, ProfileSettings, ProfileSnapshot, ProgressEvent, Quest, QuestDraft,
    QuestLogEntry, RemoteProfile, SkillNode, SkillNodeDraft, SkillPath, SkillTree, StatsUpdate,
};
pub use error::{ProgressError, ProgressResult};
pub use ports::{Clock, LocalStorage, PortError, PortResult, RemoteProfileStore, SystemClock};
pub use storage::MemoryStorage;
pub use store::{ProgressionStore, Reconciliation};
