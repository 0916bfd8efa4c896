//! crates/ascendant_core/src/storage.rs
//!
//! Encoding of state slices at the local storage boundary.
//!
//! In memory the store keeps real sets and maps; on disk sets become JSON arrays
//! and the active-quest map becomes an array of `[key, [values]]` pairs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::warn;

use crate::domain::ActiveSkillQuests;
use crate::ports::{LocalStorage, PortError, PortResult};

//=========================================================================================
// Storage Keys
//=========================================================================================

pub const KEY_STATS: &str = "player_stats";
pub const KEY_QUESTS: &str = "quests";
pub const KEY_HABITS: &str = "habits";
pub const KEY_COMPLETED: &str = "completed_quests";
pub const KEY_QUEST_LOG: &str = "quest_log";
pub const KEY_JOURNAL: &str = "journal";
pub const KEY_SKILL_TREE: &str = "skill_tree";
pub const KEY_MASTERED: &str = "mastered_skills";
pub const KEY_ACTIVE_SKILLS: &str = "active_skill_quests";
pub const KEY_BUFFS: &str = "buffs";
pub const KEY_LAST_ACTIVE_DATE: &str = "last_active_date";

pub const ALL_KEYS: [&str; 11] = [
    KEY_STATS,
    KEY_QUESTS,
    KEY_HABITS,
    KEY_COMPLETED,
    KEY_QUEST_LOG,
    KEY_JOURNAL,
    KEY_SKILL_TREE,
    KEY_MASTERED,
    KEY_ACTIVE_SKILLS,
    KEY_BUFFS,
    KEY_LAST_ACTIVE_DATE,
];

//=========================================================================================
// Set and Map Codecs
//=========================================================================================

pub fn encode_set<T: Clone>(set: &BTreeSet<T>) -> Vec<T> {
    set.iter().cloned().collect()
}

pub fn decode_set<T: Ord>(items: Vec<T>) -> BTreeSet<T> {
    items.into_iter().collect()
}

pub fn encode_active(map: &ActiveSkillQuests) -> Vec<(String, Vec<String>)> {
    map.iter()
        .map(|(node, tasks)| (node.clone(), tasks.iter().cloned().collect()))
        .collect()
}

pub fn decode_active(pairs: Vec<(String, Vec<String>)>) -> ActiveSkillQuests {
    pairs
        .into_iter()
        .map(|(node, tasks)| (node, tasks.into_iter().collect()))
        .collect()
}

//=========================================================================================
// Slice Load / Save
//=========================================================================================

/// Loads one slice. Missing keys yield `None`; corrupt values are discarded and
/// also yield `None`, so the caller falls back to the slice default.
pub fn load_slice<T: DeserializeOwned>(storage: &dyn LocalStorage, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read '{}' from local storage: {}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Discarding corrupt local slice '{}': {}", key, e);
            if let Err(e) = storage.remove(key) {
                warn!("Failed to remove corrupt slice '{}': {}", key, e);
            }
            None
        }
    }
}

/// Serializes and writes one slice.
pub fn save_slice<T: Serialize + ?Sized>(
    storage: &dyn LocalStorage,
    key: &str,
    value: &T,
) -> PortResult<()> {
    let json = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
    storage.set(key, &json)
}

//=========================================================================================
// In-Memory Adapter
//=========================================================================================

/// A `LocalStorage` kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| PortError::Unexpected("storage lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| PortError::Unexpected("storage lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| PortError::Unexpected("storage lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlayerStats;

    #[test]
    fn active_map_encodes_as_pairs() {
        let mut map = ActiveSkillQuests::new();
        map.entry("body-1".to_string())
            .or_default()
            .insert("Do 20 push-ups".to_string());
        map.entry("mind-1".to_string()).or_default();

        let json = serde_json::to_string(&encode_active(&map)).unwrap();
        assert_eq!(json, r#"[["body-1",["Do 20 push-ups"]],["mind-1",[]]]"#);

        let pairs: Vec<(String, Vec<String>)> = serde_json::from_str(&json).unwrap();
        assert_eq!(decode_active(pairs), map);
    }

    #[test]
    fn corrupt_slice_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(KEY_STATS, "{not json").unwrap();

        let loaded: Option<PlayerStats> = load_slice(&storage, KEY_STATS);
        assert!(loaded.is_none());
        assert_eq!(storage.get(KEY_STATS).unwrap(), None);
    }

    #[test]
    fn missing_slice_is_none() {
        let storage = MemoryStorage::new();
        let loaded: Option<Vec<String>> = load_slice(&storage, KEY_MASTERED);
        assert!(loaded.is_none());
    }

    #[test]
    fn saved_slice_loads_back() {
        let storage = MemoryStorage::new();
        let set: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        save_slice(&storage, KEY_MASTERED, &encode_set(&set)).unwrap();
        assert_eq!(storage.get(KEY_MASTERED).unwrap().as_deref(), Some(r#"["a","b"]"#));

        let loaded: Vec<String> = load_slice(&storage, KEY_MASTERED).unwrap();
        assert_eq!(decode_set(loaded), set);
    }
}
