//! crates/ascendant_core/src/store.rs
//!
//! The progression store: the single authoritative in-memory copy of everything
//! the player owns. Every mutation writes the slices it touched to local storage
//! before returning, and queues any `ProgressEvent`s for the caller to drain.

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    Ability, ActiveSkillQuests, Buff, Habit, JournalDraft, JournalEntry, NodeStatus, PerkEffect,
    PlayerStats, Polarity, ProfileSettings, ProfileSnapshot, ProgressEvent, Quest, QuestDraft,
    QuestLogEntry, RemoteProfile, SkillNode, SkillNodeDraft, SkillTree, StatsUpdate,
};
use crate::error::{ProgressError, ProgressResult};
use crate::level::{level_for_xp, title_for_level, xp_threshold_for_level, MAX_XP};
use crate::perks::perks_between;
use crate::ports::{Clock, LocalStorage};
use crate::skills::default_skill_tree;
use crate::storage::{self, load_slice, save_slice};
use crate::validation::{validate_journal, validate_quest, validate_skill_node};

/// Calendar day of a timestamp in the user's local time zone.
pub fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

/// What `reconcile_remote` did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The remote profile overwrote local state.
    Restored,
    /// No usable remote profile; local state was cleared.
    Cleared,
}

/// Toggle target resolved from either the quest or the habit list.
struct ToggleTarget {
    title: String,
    xp_value: u32,
    polarity: Polarity,
    recurring: bool,
    is_habit: bool,
}

pub struct ProgressionStore {
    storage: Arc<dyn LocalStorage>,
    clock: Arc<dyn Clock>,
    stats: PlayerStats,
    quests: Vec<Quest>,
    habits: Vec<Habit>,
    completed: BTreeSet<Uuid>,
    quest_log: Vec<QuestLogEntry>,
    journal: Vec<JournalEntry>,
    skill_tree: SkillTree,
    mastered: BTreeSet<String>,
    active: ActiveSkillQuests,
    buffs: Vec<Buff>,
    last_active_date: Option<NaiveDate>,
    events: Vec<ProgressEvent>,
}

impl ProgressionStore {
    //=====================================================================================
    // Construction
    //=====================================================================================

    /// Loads every slice from local storage, falling back to defaults for
    /// missing or corrupt ones, then applies any pending day rollover.
    pub fn load(storage: Arc<dyn LocalStorage>, clock: Arc<dyn Clock>) -> Self {
        let s = storage.as_ref();
        let stats = load_slice(s, storage::KEY_STATS).unwrap_or_default();
        let quests = load_slice(s, storage::KEY_QUESTS).unwrap_or_default();
        let habits = load_slice(s, storage::KEY_HABITS).unwrap_or_default();
        let completed: Vec<Uuid> = load_slice(s, storage::KEY_COMPLETED).unwrap_or_default();
        let quest_log = load_slice(s, storage::KEY_QUEST_LOG).unwrap_or_default();
        let journal = load_slice(s, storage::KEY_JOURNAL).unwrap_or_default();
        let skill_tree = load_slice(s, storage::KEY_SKILL_TREE).unwrap_or_else(default_skill_tree);
        let mastered: Vec<String> = load_slice(s, storage::KEY_MASTERED).unwrap_or_default();
        let active: Vec<(String, Vec<String>)> =
            load_slice(s, storage::KEY_ACTIVE_SKILLS).unwrap_or_default();
        let buffs = load_slice(s, storage::KEY_BUFFS).unwrap_or_default();
        let last_active_date =
            load_slice::<Option<NaiveDate>>(s, storage::KEY_LAST_ACTIVE_DATE).flatten();

        let mut store = Self {
            storage,
            clock,
            stats,
            quests,
            habits,
            completed: storage::decode_set(completed),
            quest_log,
            journal,
            skill_tree,
            mastered: storage::decode_set(mastered),
            active: storage::decode_active(active),
            buffs,
            last_active_date,
            events: Vec::new(),
        };
        debug!(
            "Loaded progression: level {}, {} quests, {} habits",
            store.stats.level,
            store.quests.len(),
            store.habits.len()
        );
        store.sanitize_stats();
        store.roll_over_day();
        store
    }

    /// Brings persisted or restored stats within the store's invariants.
    fn sanitize_stats(&mut self) {
        self.stats.xp = self.stats.xp.min(MAX_XP);
        self.stats.peak_level = self.stats.peak_level.max(self.stats.level);
    }

    //=====================================================================================
    // Read Access
    //=====================================================================================

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn completed(&self) -> &BTreeSet<Uuid> {
        &self.completed
    }

    pub fn is_completed(&self, id: Uuid) -> bool {
        self.completed.contains(&id)
    }

    pub fn quest_log(&self) -> &[QuestLogEntry] {
        &self.quest_log
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    pub fn skill_tree(&self) -> &SkillTree {
        &self.skill_tree
    }

    pub fn mastered(&self) -> &BTreeSet<String> {
        &self.mastered
    }

    pub fn active_skill_quests(&self) -> &ActiveSkillQuests {
        &self.active
    }

    pub fn buffs(&self) -> &[Buff] {
        &self.buffs
    }

    /// Sum of every granted XP multiplier, in percent.
    pub fn xp_multiplier_percent(&self) -> u32 {
        self.buffs
            .iter()
            .map(|b| match b.effect {
                PerkEffect::XpMultiplier { percent } => percent,
                PerkEffect::StatBoost { .. } => 0,
            })
            .sum()
    }

    /// XP value of every item completed today that still exists.
    pub fn completed_xp_today(&self) -> u64 {
        let quests = self
            .quests
            .iter()
            .filter(|q| self.completed.contains(&q.id))
            .map(|q| u64::from(q.xp_value));
        let habits = self
            .habits
            .iter()
            .filter(|h| self.completed.contains(&h.id))
            .map(|h| u64::from(h.xp_value));
        quests.chain(habits).sum()
    }

    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        let (path, index, _) = self.skill_tree.locate(node_id)?;
        if self.mastered.contains(node_id) {
            return Some(NodeStatus::Mastered);
        }
        if self.active.contains_key(node_id) {
            return Some(NodeStatus::Active);
        }
        let unlocked = index == 0
            || self
                .mastered
                .contains(&self.skill_tree.paths[path].nodes[index - 1].id);
        Some(if unlocked {
            NodeStatus::Unlocked
        } else {
            NodeStatus::Locked
        })
    }

    /// Takes the events raised since the last drain.
    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        std::mem::take(&mut self.events)
    }

    fn today(&self) -> NaiveDate {
        local_date(self.clock.now())
    }

    //=====================================================================================
    // Day Rollover
    //=====================================================================================

    /// Starts a new day if the calendar date changed since the last activity:
    /// the completed set empties and every habit becomes uncompleted.
    /// Returns whether a rollover happened.
    pub fn roll_over_day(&mut self) -> bool {
        let today = self.today();
        if self.last_active_date == Some(today) {
            return false;
        }
        let rolled = self.last_active_date.is_some();
        if rolled {
            info!(
                "New day {}: clearing {} completed items",
                today,
                self.completed.len()
            );
            self.completed.clear();
            for habit in &mut self.habits {
                habit.is_completed = false;
            }
            self.persist_completed();
            self.persist_habits();
        }
        self.last_active_date = Some(today);
        self.persist(storage::KEY_LAST_ACTIVE_DATE, &self.last_active_date);
        rolled
    }

    //=====================================================================================
    // Stats
    //=====================================================================================

    /// Merges a partial update, then re-derives level, title and next-level XP.
    /// XP is clamped to `MAX_XP`. Levels above the highest one already paid out
    /// grant one stat point each, and every perk crossed is applied; dropping
    /// levels withdraws unspent points for the lost levels.
    pub fn update_stats(&mut self, update: StatsUpdate) {
        self.roll_over_day();
        let old_level = self.stats.level;
        let stats = &mut self.stats;
        if let Some(name) = update.name {
            stats.name = name;
        }
        if let Some(xp) = update.xp {
            if xp > MAX_XP {
                warn!("XP {} exceeds the cap; clamping to {}", xp, MAX_XP);
            }
            stats.xp = xp.min(MAX_XP);
        }
        if let Some(v) = update.strength {
            stats.strength = v;
        }
        if let Some(v) = update.agility {
            stats.agility = v;
        }
        if let Some(v) = update.vitality {
            stats.vitality = v;
        }
        if let Some(v) = update.intelligence {
            stats.intelligence = v;
        }
        if let Some(v) = update.concentration {
            stats.concentration = v;
        }
        if let Some(v) = update.streak {
            stats.streak = v;
        }
        if let Some(v) = update.skill_points {
            stats.skill_points = v;
        }
        self.apply_level_change(old_level);
        self.persist_stats();
    }

    fn apply_level_change(&mut self, old_level: u32) {
        let new_level = level_for_xp(self.stats.xp);
        // Invariant: peak_level >= level. Older snapshots may lack the field.
        let mut peak = self.stats.peak_level.max(old_level);
        if new_level > old_level {
            let fresh = new_level.saturating_sub(peak);
            self.stats.available_stat_points =
                self.stats.available_stat_points.saturating_add(fresh);
            peak = peak.max(new_level);
            let now = self.clock.now();
            let mut last_perk = None;
            for perk in perks_between(old_level, new_level) {
                if self.buffs.iter().any(|b| b.id == perk.id) {
                    continue;
                }
                let buff = perk.to_buff(now);
                if let PerkEffect::StatBoost { boosts } = &buff.effect {
                    for (ability, amount) in boosts {
                        let score = self.stats.ability_mut(*ability);
                        *score = score.saturating_add(*amount);
                    }
                }
                info!("Perk unlocked at level {}: {}", perk.level, perk.name);
                self.buffs.push(buff.clone());
                last_perk = Some(buff);
            }
            if last_perk.is_some() {
                self.persist(storage::KEY_BUFFS, &self.buffs);
            }
            info!("Level up: {} -> {}", old_level, new_level);
            self.events.push(ProgressEvent::LevelUp {
                level: new_level,
                perk: last_perk,
            });
        } else if new_level < old_level {
            // Only unspent points come back, and the peak drops by the same amount.
            let lost = old_level - new_level;
            let withdrawn = lost.min(self.stats.available_stat_points);
            self.stats.available_stat_points -= withdrawn;
            peak -= withdrawn;
            info!("Level down: {} -> {}", old_level, new_level);
        }
        self.stats.level = new_level;
        self.stats.peak_level = peak;
        self.stats.xp_next_level = xp_threshold_for_level(new_level.saturating_add(1));
        self.stats.title = title_for_level(new_level).to_string();
    }

    pub fn complete_onboarding(&mut self, name: &str) -> ProgressResult<()> {
        self.roll_over_day();
        let name = name.trim();
        if name.is_empty() {
            return Err(ProgressError::Validation("Name cannot be empty".to_string()));
        }
        self.stats.name = name.to_string();
        self.stats.onboarding_complete = true;
        self.persist_stats();
        Ok(())
    }

    /// Spends one available stat point on `ability`.
    pub fn allocate_stat_point(&mut self, ability: Ability) -> ProgressResult<u32> {
        self.roll_over_day();
        if self.stats.available_stat_points == 0 {
            return Err(ProgressError::InsufficientPoints);
        }
        self.stats.available_stat_points -= 1;
        let score = self.stats.ability_mut(ability);
        *score += 1;
        let score = *score;
        self.persist_stats();
        Ok(score)
    }

    /// Applies a signed XP change clamped to `0..=MAX_XP` and returns the
    /// change actually applied.
    fn grant_xp_delta(&mut self, delta: i64) -> i64 {
        let old_xp = i128::from(self.stats.xp);
        let new_xp = (old_xp + i128::from(delta)).clamp(0, i128::from(MAX_XP));
        self.update_stats(StatsUpdate {
            xp: u64::try_from(new_xp).ok(),
            ..Default::default()
        });
        let applied = i128::from(self.stats.xp) - old_xp;
        applied.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    //=====================================================================================
    // Quest / Habit Completion
    //=====================================================================================

    fn toggle_target(&self, id: Uuid) -> ProgressResult<ToggleTarget> {
        if let Some(q) = self.quests.iter().find(|q| q.id == id) {
            return Ok(ToggleTarget {
                title: q.title.clone(),
                xp_value: q.xp_value,
                polarity: q.polarity,
                recurring: q.recurring,
                is_habit: false,
            });
        }
        if let Some(h) = self.habits.iter().find(|h| h.id == id) {
            return Ok(ToggleTarget {
                title: h.title.clone(),
                xp_value: h.xp_value,
                polarity: h.polarity,
                recurring: true,
                is_habit: true,
            });
        }
        Err(ProgressError::NotFound(format!("Quest or habit {}", id)))
    }

    /// XP change completing the item would cause before clamping.
    fn nominal_delta(&self, target: &ToggleTarget) -> i64 {
        let base = i64::from(target.xp_value);
        match target.polarity {
            Polarity::Good => base * (100 + i64::from(self.xp_multiplier_percent())) / 100,
            Polarity::Bad => -base,
        }
    }

    fn adjust_streak(&mut self, id: Uuid, is_habit: bool, completed: bool) {
        let step = |streak: &mut u32| {
            *streak = if completed {
                streak.saturating_add(1)
            } else {
                streak.saturating_sub(1)
            };
        };
        if is_habit {
            if let Some(h) = self.habits.iter_mut().find(|h| h.id == id) {
                step(&mut h.streak);
            }
        } else if let Some(q) = self.quests.iter_mut().find(|q| q.id == id) {
            step(&mut q.streak);
        }
    }

    /// Flips a quest or habit between completed and not completed today.
    /// Returns `true` when the item is now completed.
    pub fn toggle_quest_or_habit(&mut self, id: Uuid) -> ProgressResult<bool> {
        self.roll_over_day();
        let target = self.toggle_target(id)?;
        let now = self.clock.now();

        let now_completed = if self.completed.remove(&id) {
            let today = self.today();
            let same_day = self.quest_log.iter().rposition(|e| {
                e.item_id == id && e.completed && local_date(e.timestamp) == today
            });
            match same_day {
                Some(index) => {
                    let entry = self.quest_log.remove(index);
                    self.grant_xp_delta(-entry.xp_delta);
                    if target.recurring {
                        self.adjust_streak(id, target.is_habit, false);
                    }
                }
                None => {
                    let applied = self.grant_xp_delta(-self.nominal_delta(&target));
                    self.quest_log.push(QuestLogEntry {
                        id: Uuid::new_v4(),
                        item_id: id,
                        title: target.title.clone(),
                        xp_delta: applied,
                        polarity: target.polarity,
                        completed: false,
                        timestamp: now,
                    });
                }
            }
            false
        } else {
            let applied = self.grant_xp_delta(self.nominal_delta(&target));
            self.completed.insert(id);
            self.quest_log.push(QuestLogEntry {
                id: Uuid::new_v4(),
                item_id: id,
                title: target.title.clone(),
                xp_delta: applied,
                polarity: target.polarity,
                completed: true,
                timestamp: now,
            });
            if target.recurring {
                self.adjust_streak(id, target.is_habit, true);
            }
            true
        };

        if target.is_habit {
            if let Some(h) = self.habits.iter_mut().find(|h| h.id == id) {
                h.is_completed = now_completed;
            }
            self.persist_habits();
        } else {
            self.persist_quests();
        }
        self.persist_completed();
        self.persist(storage::KEY_QUEST_LOG, &self.quest_log);
        debug!("Toggled '{}' -> completed={}", target.title, now_completed);
        Ok(now_completed)
    }

    //=====================================================================================
    // Quest / Habit CRUD
    //=====================================================================================

    pub fn add_quest(&mut self, draft: QuestDraft) -> ProgressResult<Quest> {
        self.roll_over_day();
        let valid = validate_quest(&draft)?;
        let quest = Quest {
            id: Uuid::new_v4(),
            title: valid.title,
            description: valid.description,
            xp_value: valid.xp_value,
            polarity: draft.polarity,
            recurring: draft.recurring,
            streak: 0,
            difficulty: draft.difficulty,
            created_at: self.clock.now(),
        };
        self.quests.push(quest.clone());
        self.persist_quests();
        Ok(quest)
    }

    pub fn edit_quest(&mut self, id: Uuid, draft: QuestDraft) -> ProgressResult<Quest> {
        self.roll_over_day();
        let valid = validate_quest(&draft)?;
        let quest = self
            .quests
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| ProgressError::NotFound(format!("Quest {}", id)))?;
        quest.title = valid.title;
        quest.description = valid.description;
        quest.xp_value = valid.xp_value;
        quest.polarity = draft.polarity;
        quest.recurring = draft.recurring;
        quest.difficulty = draft.difficulty;
        let quest = quest.clone();
        self.persist_quests();
        Ok(quest)
    }

    /// Deletes a quest and drops it from the completed set. Its log history stays.
    pub fn delete_quest(&mut self, id: Uuid) -> ProgressResult<()> {
        self.roll_over_day();
        let before = self.quests.len();
        self.quests.retain(|q| q.id != id);
        if self.quests.len() == before {
            return Err(ProgressError::NotFound(format!("Quest {}", id)));
        }
        self.completed.remove(&id);
        self.persist_quests();
        self.persist_completed();
        Ok(())
    }

    pub fn add_habit(&mut self, draft: QuestDraft) -> ProgressResult<Habit> {
        self.roll_over_day();
        let valid = validate_quest(&draft)?;
        let habit = Habit {
            id: Uuid::new_v4(),
            title: valid.title,
            description: valid.description,
            xp_value: valid.xp_value,
            polarity: draft.polarity,
            streak: 0,
            difficulty: draft.difficulty,
            is_completed: false,
            created_at: self.clock.now(),
        };
        self.habits.push(habit.clone());
        self.persist_habits();
        Ok(habit)
    }

    pub fn edit_habit(&mut self, id: Uuid, draft: QuestDraft) -> ProgressResult<Habit> {
        self.roll_over_day();
        let valid = validate_quest(&draft)?;
        let habit = self
            .habits
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| ProgressError::NotFound(format!("Habit {}", id)))?;
        habit.title = valid.title;
        habit.description = valid.description;
        habit.xp_value = valid.xp_value;
        habit.polarity = draft.polarity;
        habit.difficulty = draft.difficulty;
        let habit = habit.clone();
        self.persist_habits();
        Ok(habit)
    }

    pub fn delete_habit(&mut self, id: Uuid) -> ProgressResult<()> {
        self.roll_over_day();
        let before = self.habits.len();
        self.habits.retain(|h| h.id != id);
        if self.habits.len() == before {
            return Err(ProgressError::NotFound(format!("Habit {}", id)));
        }
        self.completed.remove(&id);
        self.persist_habits();
        self.persist_completed();
        Ok(())
    }

    //=====================================================================================
    // Skill Quests
    //=====================================================================================

    fn require_status(&self, node_id: &str) -> ProgressResult<NodeStatus> {
        self.node_status(node_id)
            .ok_or_else(|| ProgressError::NotFound(format!("Skill node {}", node_id)))
    }

    pub fn start_skill_quest(&mut self, node_id: &str) -> ProgressResult<()> {
        self.roll_over_day();
        match self.require_status(node_id)? {
            NodeStatus::Unlocked => {}
            NodeStatus::Locked => {
                return Err(ProgressError::InvalidState(format!(
                    "Skill node {} is locked",
                    node_id
                )))
            }
            NodeStatus::Active => {
                return Err(ProgressError::InvalidState(format!(
                    "Skill node {} is already active",
                    node_id
                )))
            }
            NodeStatus::Mastered => {
                return Err(ProgressError::InvalidState(format!(
                    "Skill node {} is already mastered",
                    node_id
                )))
            }
        }
        self.active.insert(node_id.to_string(), BTreeSet::new());
        self.persist_active();
        Ok(())
    }

    /// Abandons an active node, discarding its task progress.
    pub fn cancel_skill_quest(&mut self, node_id: &str) -> ProgressResult<()> {
        self.roll_over_day();
        if self.require_status(node_id)? != NodeStatus::Active {
            return Err(ProgressError::InvalidState(format!(
                "Skill node {} is not active",
                node_id
            )));
        }
        self.active.remove(node_id);
        self.persist_active();
        Ok(())
    }

    /// Flips one task of an active node. Returns the node status afterwards,
    /// which is `Mastered` when this toggle completed the last task.
    pub fn toggle_skill_task(&mut self, node_id: &str, task: &str) -> ProgressResult<NodeStatus> {
        self.roll_over_day();
        if self.require_status(node_id)? != NodeStatus::Active {
            return Err(ProgressError::InvalidState(format!(
                "Skill node {} is not active",
                node_id
            )));
        }
        let known = self
            .skill_tree
            .node(node_id)
            .map_or(false, |n| n.tasks.iter().any(|t| t == task));
        if !known {
            return Err(ProgressError::Validation(format!(
                "'{}' is not a task of skill node {}",
                task, node_id
            )));
        }
        let done = self.active.entry(node_id.to_string()).or_default();
        if !done.remove(task) {
            done.insert(task.to_string());
        }
        if self.check_mastery(node_id) {
            return Ok(NodeStatus::Mastered);
        }
        self.persist_active();
        Ok(NodeStatus::Active)
    }

    /// Moves an active node to mastered once every task is done, granting its
    /// XP and one skill point.
    fn check_mastery(&mut self, node_id: &str) -> bool {
        let Some(node) = self.skill_tree.node(node_id) else {
            return false;
        };
        let done = self.active.get(node_id).map_or(0, |d| d.len());
        if done != node.tasks.len() {
            return false;
        }
        let (name, reward) = (node.name.clone(), node.xp_reward);

        self.active.remove(node_id);
        self.mastered.insert(node_id.to_string());
        self.persist_active();
        self.persist(storage::KEY_MASTERED, &storage::encode_set(&self.mastered));

        info!("Skill mastered: {} (+{} XP)", name, reward);
        self.events.push(ProgressEvent::SkillMastered {
            node_id: node_id.to_string(),
            name,
        });
        self.update_stats(StatsUpdate {
            xp: Some(self.stats.xp.saturating_add(u64::from(reward))),
            skill_points: Some(self.stats.skill_points.saturating_add(1)),
            ..Default::default()
        });
        true
    }

    pub fn add_custom_skill_node(
        &mut self,
        path_id: &str,
        draft: SkillNodeDraft,
    ) -> ProgressResult<SkillNode> {
        self.roll_over_day();
        let valid = validate_skill_node(&draft)?;
        let path = self
            .skill_tree
            .paths
            .iter_mut()
            .find(|p| p.id == path_id)
            .ok_or_else(|| ProgressError::NotFound(format!("Skill path {}", path_id)))?;
        let node = SkillNode {
            id: format!("custom-{}", Uuid::new_v4()),
            name: valid.name,
            description: valid.description,
            tasks: valid.tasks,
            xp_reward: valid.xp_reward,
            custom: true,
        };
        path.nodes.push(node.clone());
        self.persist(storage::KEY_SKILL_TREE, &self.skill_tree);
        Ok(node)
    }

    /// Replaces a node's definition. Progress on tasks that no longer exist is
    /// dropped, and the node is mastered if every remaining task is done.
    pub fn edit_skill_node(
        &mut self,
        node_id: &str,
        draft: SkillNodeDraft,
    ) -> ProgressResult<SkillNode> {
        self.roll_over_day();
        let valid = validate_skill_node(&draft)?;
        let (path, index, _) = self
            .skill_tree
            .locate(node_id)
            .ok_or_else(|| ProgressError::NotFound(format!("Skill node {}", node_id)))?;
        let node = &mut self.skill_tree.paths[path].nodes[index];
        node.name = valid.name;
        node.description = valid.description;
        node.tasks = valid.tasks;
        node.xp_reward = valid.xp_reward;
        let node = node.clone();
        self.persist(storage::KEY_SKILL_TREE, &self.skill_tree);

        if let Some(done) = self.active.get_mut(node_id) {
            done.retain(|t| node.tasks.contains(t));
            if !self.check_mastery(node_id) {
                self.persist_active();
            }
        }
        Ok(node)
    }

    pub fn delete_skill_node(&mut self, node_id: &str) -> ProgressResult<()> {
        self.roll_over_day();
        let (path, index, _) = self
            .skill_tree
            .locate(node_id)
            .ok_or_else(|| ProgressError::NotFound(format!("Skill node {}", node_id)))?;
        self.skill_tree.paths[path].nodes.remove(index);
        self.mastered.remove(node_id);
        self.active.remove(node_id);
        self.persist(storage::KEY_SKILL_TREE, &self.skill_tree);
        self.persist(storage::KEY_MASTERED, &storage::encode_set(&self.mastered));
        self.persist_active();
        Ok(())
    }

    //=====================================================================================
    // Journal
    //=====================================================================================

    pub fn add_journal_entry(&mut self, draft: JournalDraft) -> ProgressResult<JournalEntry> {
        self.roll_over_day();
        let valid = validate_journal(&draft)?;
        let now = self.clock.now();
        let entry = JournalEntry {
            id: Uuid::new_v4(),
            title: valid.title,
            content: valid.content,
            mood: valid.mood,
            tags: valid.tags,
            created_at: now,
            updated_at: now,
        };
        self.journal.push(entry.clone());
        self.persist(storage::KEY_JOURNAL, &self.journal);
        Ok(entry)
    }

    pub fn edit_journal_entry(
        &mut self,
        id: Uuid,
        draft: JournalDraft,
    ) -> ProgressResult<JournalEntry> {
        self.roll_over_day();
        let valid = validate_journal(&draft)?;
        let now = self.clock.now();
        let entry = self
            .journal
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ProgressError::NotFound(format!("Journal entry {}", id)))?;
        entry.title = valid.title;
        entry.content = valid.content;
        entry.mood = valid.mood;
        entry.tags = valid.tags;
        entry.updated_at = now;
        let entry = entry.clone();
        self.persist(storage::KEY_JOURNAL, &self.journal);
        Ok(entry)
    }

    pub fn delete_journal_entry(&mut self, id: Uuid) -> ProgressResult<()> {
        self.roll_over_day();
        let before = self.journal.len();
        self.journal.retain(|e| e.id != id);
        if self.journal.len() == before {
            return Err(ProgressError::NotFound(format!("Journal entry {}", id)));
        }
        self.persist(storage::KEY_JOURNAL, &self.journal);
        Ok(())
    }

    //=====================================================================================
    // Snapshots and Reconciliation
    //=====================================================================================

    /// The whole store in the shape the remote record uses.
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            stats: self.stats.clone(),
            settings: ProfileSettings {
                quests: self.quests.clone(),
                completed_quests: storage::encode_set(&self.completed),
                quest_log: self.quest_log.clone(),
                journal: self.journal.clone(),
                skill_tree: self.skill_tree.clone(),
                mastered_skills: storage::encode_set(&self.mastered),
                active_skill_quests: storage::encode_active(&self.active),
                buffs: self.buffs.clone(),
                habits: self.habits.clone(),
                last_active_date: self.last_active_date,
            },
        }
    }

    /// Replaces every slice with the snapshot and writes all of them locally.
    pub fn restore(&mut self, snapshot: ProfileSnapshot) {
        let ProfileSnapshot { stats, settings } = snapshot;
        self.stats = stats;
        self.sanitize_stats();
        self.quests = settings.quests;
        self.completed = storage::decode_set(settings.completed_quests);
        self.quest_log = settings.quest_log;
        self.journal = settings.journal;
        self.skill_tree = if settings.skill_tree.paths.is_empty() {
            default_skill_tree()
        } else {
            settings.skill_tree
        };
        self.mastered = storage::decode_set(settings.mastered_skills);
        self.active = storage::decode_active(settings.active_skill_quests);
        self.buffs = settings.buffs;
        self.habits = settings.habits;
        self.last_active_date = settings.last_active_date;
        self.events.clear();
        self.persist_all();
        self.roll_over_day();
    }

    /// Clears every slice in memory and in local storage.
    pub fn reset(&mut self) {
        for key in storage::ALL_KEYS {
            if let Err(e) = self.storage.remove(key) {
                warn!("Failed to clear local slice '{}': {}", key, e);
            }
        }
        self.stats = PlayerStats::default();
        self.quests.clear();
        self.habits.clear();
        self.completed.clear();
        self.quest_log.clear();
        self.journal.clear();
        self.skill_tree = default_skill_tree();
        self.mastered.clear();
        self.active.clear();
        self.buffs.clear();
        self.last_active_date = None;
        self.events.clear();
        info!("Local progression reset");
    }

    /// Session-start reconciliation: an onboarded remote profile overwrites
    /// local state; anything else clears it. No merge is attempted.
    pub fn reconcile_remote(&mut self, remote: Option<RemoteProfile>) -> Reconciliation {
        match remote {
            Some(profile) if profile.onboarding_complete => {
                info!(
                    "Restoring remote profile for {} (updated {})",
                    profile.user_id, profile.updated_at
                );
                let mut snapshot = profile.snapshot;
                snapshot.stats.onboarding_complete = true;
                self.restore(snapshot);
                Reconciliation::Restored
            }
            _ => {
                info!("No onboarded remote profile; clearing local state");
                self.reset();
                Reconciliation::Cleared
            }
        }
    }

    //=====================================================================================
    // Persistence Helpers
    //=====================================================================================

    fn persist<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = save_slice(self.storage.as_ref(), key, value) {
            warn!("Failed to persist '{}' locally: {}", key, e);
        }
    }

    fn persist_stats(&self) {
        self.persist(storage::KEY_STATS, &self.stats);
    }

    fn persist_quests(&self) {
        self.persist(storage::KEY_QUESTS, &self.quests);
    }

    fn persist_habits(&self) {
        self.persist(storage::KEY_HABITS, &self.habits);
    }

    fn persist_completed(&self) {
        self.persist(storage::KEY_COMPLETED, &storage::encode_set(&self.completed));
    }

    fn persist_active(&self) {
        self.persist(storage::KEY_ACTIVE_SKILLS, &storage::encode_active(&self.active));
    }

    fn persist_all(&self) {
        self.persist_stats();
        self.persist_quests();
        self.persist_habits();
        self.persist_completed();
        self.persist(storage::KEY_QUEST_LOG, &self.quest_log);
        self.persist(storage::KEY_JOURNAL, &self.journal);
        self.persist(storage::KEY_SKILL_TREE, &self.skill_tree);
        self.persist(storage::KEY_MASTERED, &storage::encode_set(&self.mastered));
        self.persist_active();
        self.persist(storage::KEY_BUFFS, &self.buffs);
        self.persist(storage::KEY_LAST_ACTIVE_DATE, &self.last_active_date);
    }
}
