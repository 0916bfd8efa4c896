//! End-to-end behaviour of the progression store against in-memory storage.

use ascendant_core::domain::{NodeStatus, SkillNodeDraft};
use ascendant_core::level::{level_for_xp, MAX_XP};
use ascendant_core::storage::{self, MemoryStorage};
use ascendant_core::{
    Ability, Clock, LocalStorage, Polarity, ProfileSnapshot, ProgressError, ProgressEvent,
    ProgressionStore, QuestDraft, Reconciliation, RemoteProfile, StatsUpdate,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        )))
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn setup() -> (Arc<MemoryStorage>, Arc<TestClock>, ProgressionStore) {
    let storage = Arc::new(MemoryStorage::new());
    let clock = TestClock::new();
    let store = ProgressionStore::load(storage.clone(), clock.clone());
    (storage, clock, store)
}

fn quest(title: &str, xp: u32, polarity: Polarity, recurring: bool) -> QuestDraft {
    QuestDraft {
        title: title.to_string(),
        xp_value: Some(xp),
        polarity,
        recurring,
        ..Default::default()
    }
}

#[test]
fn first_quest_levels_up_without_perk() {
    let (_, _, mut store) = setup();
    let q = store.add_quest(quest("Morning run", 50, Polarity::Good, false)).unwrap();

    assert!(store.toggle_quest_or_habit(q.id).unwrap());

    let stats = store.stats();
    assert_eq!(stats.xp, 50);
    assert_eq!(stats.level, 2);
    assert_eq!(stats.available_stat_points, 1);
    assert_eq!(stats.xp_next_level, 200);
    assert_eq!(
        store.drain_events(),
        vec![ProgressEvent::LevelUp { level: 2, perk: None }]
    );
    assert!(store.buffs().is_empty());
}

#[test]
fn toggle_round_trip_restores_state() {
    let (_, _, mut store) = setup();
    let q = store.add_quest(quest("Meditate", 50, Polarity::Good, true)).unwrap();
    let before_stats = store.stats().clone();
    let before_log = store.quest_log().to_vec();

    store.toggle_quest_or_habit(q.id).unwrap();
    assert_eq!(store.quests()[0].streak, 1);
    assert!(!store.toggle_quest_or_habit(q.id).unwrap());

    assert_eq!(store.stats(), &before_stats);
    assert_eq!(store.quest_log(), before_log.as_slice());
    assert_eq!(store.quests()[0].streak, 0);
    assert!(!store.is_completed(q.id));
}

#[test]
fn bad_quest_clamps_at_zero_and_reverses_exactly() {
    let (_, _, mut store) = setup();
    store.update_stats(StatsUpdate {
        xp: Some(30),
        ..Default::default()
    });
    let q = store.add_quest(quest("Doomscrolling", 50, Polarity::Bad, false)).unwrap();

    store.toggle_quest_or_habit(q.id).unwrap();
    assert_eq!(store.stats().xp, 0);
    assert_eq!(store.quest_log()[0].xp_delta, -30);

    store.toggle_quest_or_habit(q.id).unwrap();
    assert_eq!(store.stats().xp, 30);
    assert!(store.quest_log().is_empty());
}

#[test]
fn multi_level_jump_grants_every_crossed_perk() {
    let (_, _, mut store) = setup();
    store.update_stats(StatsUpdate {
        xp: Some(450),
        ..Default::default()
    });
    assert_eq!(store.stats().level, 4);
    store.drain_events();
    let concentration = store.stats().concentration;
    let points = store.stats().available_stat_points;

    store.update_stats(StatsUpdate {
        xp: Some(5000),
        ..Default::default()
    });

    let stats = store.stats();
    assert_eq!(stats.level, 11);
    assert_eq!(stats.available_stat_points, points + 7);
    assert_eq!(stats.concentration, concentration + 2);
    assert_eq!(stats.title, "C-Rank Hunter");
    let ids: Vec<_> = store.buffs().iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["iron_focus", "arcane_efficiency"]);
    assert_eq!(store.xp_multiplier_percent(), 10);

    match store.drain_events().as_slice() {
        [ProgressEvent::LevelUp { level: 11, perk: Some(perk) }] => {
            assert_eq!(perk.id, "arcane_efficiency")
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[test]
fn perks_are_not_reapplied_after_losing_a_level() {
    let (_, _, mut store) = setup();
    store.update_stats(StatsUpdate {
        xp: Some(800),
        ..Default::default()
    });
    assert_eq!(store.stats().level, 5);
    let concentration = store.stats().concentration;

    store.update_stats(StatsUpdate {
        xp: Some(700),
        ..Default::default()
    });
    assert_eq!(store.stats().level, 4);
    store.update_stats(StatsUpdate {
        xp: Some(800),
        ..Default::default()
    });

    assert_eq!(store.stats().concentration, concentration);
    assert_eq!(store.buffs().len(), 1);
}

#[test]
fn xp_multiplier_scales_good_quests() {
    let (_, _, mut store) = setup();
    store.update_stats(StatsUpdate {
        xp: Some(5000),
        ..Default::default()
    });
    let q = store.add_quest(quest("Deep work", 100, Polarity::Good, false)).unwrap();

    store.toggle_quest_or_habit(q.id).unwrap();
    assert_eq!(store.stats().xp, 5110);
    store.toggle_quest_or_habit(q.id).unwrap();
    assert_eq!(store.stats().xp, 5000);
}

#[test]
fn deleting_completed_quest_purges_it() {
    let (_, _, mut store) = setup();
    let keep = store.add_quest(quest("Stretch", 10, Polarity::Good, false)).unwrap();
    let gone = store.add_quest(quest("Run", 25, Polarity::Good, false)).unwrap();
    store.toggle_quest_or_habit(keep.id).unwrap();
    store.toggle_quest_or_habit(gone.id).unwrap();
    assert_eq!(store.completed_xp_today(), 35);

    store.delete_quest(gone.id).unwrap();

    assert!(store.quests().iter().all(|q| q.id != gone.id));
    assert!(!store.is_completed(gone.id));
    assert_eq!(store.completed_xp_today(), 10);
    assert_eq!(
        store.toggle_quest_or_habit(gone.id),
        Err(ProgressError::NotFound(format!("Quest or habit {}", gone.id)))
    );
}

#[test]
fn habits_track_completion_and_streak() {
    let (_, _, mut store) = setup();
    let h = store.add_habit(quest("Drink water", 10, Polarity::Good, true)).unwrap();

    store.toggle_quest_or_habit(h.id).unwrap();
    let habit = &store.habits()[0];
    assert!(habit.is_completed);
    assert_eq!(habit.streak, 1);
    assert!(store.is_completed(h.id));
}

#[test]
fn new_day_clears_completion_but_keeps_streaks() {
    let (storage, clock, mut store) = setup();
    let h = store.add_habit(quest("Journal", 10, Polarity::Good, true)).unwrap();
    store.toggle_quest_or_habit(h.id).unwrap();

    clock.advance(Duration::days(1));
    let mut reloaded = ProgressionStore::load(storage.clone(), clock.clone());

    assert!(reloaded.completed().is_empty());
    assert!(!reloaded.habits()[0].is_completed);
    assert_eq!(reloaded.habits()[0].streak, 1);
    assert_eq!(reloaded.stats().xp, 10);

    reloaded.toggle_quest_or_habit(h.id).unwrap();
    assert_eq!(reloaded.habits()[0].streak, 2);
    assert_eq!(reloaded.quest_log().len(), 2);
}

#[test]
fn undo_without_same_day_entry_appends_reversal() {
    let (_, clock, mut store) = setup();
    let q = store.add_quest(quest("Read", 20, Polarity::Good, false)).unwrap();
    store.toggle_quest_or_habit(q.id).unwrap();

    // Same calendar day, but the entry was removed from history by hand.
    let snapshot = {
        let mut s = store.snapshot();
        s.settings.quest_log.clear();
        s
    };
    store.restore(snapshot);
    clock.advance(Duration::minutes(5));

    store.toggle_quest_or_habit(q.id).unwrap();
    assert_eq!(store.stats().xp, 0);
    let entry = &store.quest_log()[0];
    assert!(!entry.completed);
    assert_eq!(entry.xp_delta, -20);
}

#[test]
fn skill_node_masters_on_last_distinct_task() {
    let (_, _, mut store) = setup();
    let node = store.skill_tree().paths[0].nodes[0].clone();
    let next = store.skill_tree().paths[0].nodes[1].id.clone();
    assert_eq!(store.node_status(&next), Some(NodeStatus::Locked));

    store.start_skill_quest(&node.id).unwrap();
    let (first, rest) = node.tasks.split_first().unwrap();

    // Toggling one task on and off again does not count towards mastery.
    store.toggle_skill_task(&node.id, first).unwrap();
    store.toggle_skill_task(&node.id, first).unwrap();
    for task in rest {
        assert_eq!(store.toggle_skill_task(&node.id, task).unwrap(), NodeStatus::Active);
    }
    assert_eq!(store.stats().skill_points, 0);

    assert_eq!(store.toggle_skill_task(&node.id, first).unwrap(), NodeStatus::Mastered);
    assert_eq!(store.stats().xp, u64::from(node.xp_reward));
    assert_eq!(store.stats().skill_points, 1);
    assert!(store.mastered().contains(&node.id));
    assert!(!store.active_skill_quests().contains_key(&node.id));
    assert_eq!(store.node_status(&next), Some(NodeStatus::Unlocked));

    let events = store.drain_events();
    assert!(events.contains(&ProgressEvent::SkillMastered {
        node_id: node.id.clone(),
        name: node.name.clone(),
    }));

    // Mastery is terminal: no second reward.
    assert!(matches!(
        store.toggle_skill_task(&node.id, first),
        Err(ProgressError::InvalidState(_))
    ));
    assert!(store.start_skill_quest(&node.id).is_err());
    assert_eq!(store.stats().skill_points, 1);
}

#[test]
fn locked_and_unknown_skill_operations_fail() {
    let (_, _, mut store) = setup();
    let locked = store.skill_tree().paths[1].nodes[2].id.clone();
    assert!(matches!(
        store.start_skill_quest(&locked),
        Err(ProgressError::InvalidState(_))
    ));
    assert!(matches!(
        store.start_skill_quest("nope"),
        Err(ProgressError::NotFound(_))
    ));

    let first = store.skill_tree().paths[1].nodes[0].clone();
    store.start_skill_quest(&first.id).unwrap();
    assert!(matches!(
        store.toggle_skill_task(&first.id, "not a task"),
        Err(ProgressError::Validation(_))
    ));
}

#[test]
fn cancel_discards_partial_progress() {
    let (_, _, mut store) = setup();
    let node = store.skill_tree().paths[2].nodes[0].clone();
    store.start_skill_quest(&node.id).unwrap();
    store.toggle_skill_task(&node.id, &node.tasks[0]).unwrap();

    store.cancel_skill_quest(&node.id).unwrap();
    assert_eq!(store.node_status(&node.id), Some(NodeStatus::Unlocked));

    store.start_skill_quest(&node.id).unwrap();
    assert!(store.active_skill_quests()[&node.id].is_empty());
}

#[test]
fn custom_nodes_can_be_edited_into_mastery_and_deleted() {
    let (_, _, mut store) = setup();
    let node = store
        .add_custom_skill_node(
            "mind",
            SkillNodeDraft {
                name: "Chess".to_string(),
                tasks: vec!["Solve 10 puzzles".to_string(), "Play a rated game".to_string()],
                xp_reward: 300,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(node.custom);
    assert_eq!(store.skill_tree().paths[1].nodes.last().unwrap().id, node.id);

    // Master the rest of the path so the custom node unlocks.
    let path: Vec<_> = store.skill_tree().paths[1].nodes[..3].to_vec();
    for seeded in &path {
        store.start_skill_quest(&seeded.id).unwrap();
        for task in &seeded.tasks {
            store.toggle_skill_task(&seeded.id, task).unwrap();
        }
    }
    store.start_skill_quest(&node.id).unwrap();
    store.toggle_skill_task(&node.id, "Solve 10 puzzles").unwrap();
    let points = store.stats().skill_points;

    let edited = store
        .edit_skill_node(
            &node.id,
            SkillNodeDraft {
                name: "Chess".to_string(),
                tasks: vec!["Solve 10 puzzles".to_string()],
                xp_reward: 300,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(edited.tasks.len(), 1);
    assert_eq!(store.node_status(&node.id), Some(NodeStatus::Mastered));
    assert_eq!(store.stats().skill_points, points + 1);

    store.delete_skill_node(&node.id).unwrap();
    assert!(store.skill_tree().node(&node.id).is_none());
    assert!(!store.mastered().contains(&node.id));
}

#[test]
fn stat_points_are_spent_one_at_a_time() {
    let (_, _, mut store) = setup();
    assert_eq!(
        store.allocate_stat_point(Ability::Strength),
        Err(ProgressError::InsufficientPoints)
    );
    store.update_stats(StatsUpdate {
        xp: Some(50),
        ..Default::default()
    });
    let strength = store.stats().strength;
    assert_eq!(store.allocate_stat_point(Ability::Strength), Ok(strength + 1));
    assert_eq!(store.stats().available_stat_points, 0);
}

#[test]
fn stat_points_cannot_be_farmed_by_toggling() {
    let (_, _, mut store) = setup();
    let q = store.add_quest(quest("Sprint", 50, Polarity::Good, false)).unwrap();
    let strength = store.stats().strength;

    store.toggle_quest_or_habit(q.id).unwrap();
    assert_eq!(store.stats().available_stat_points, 1);
    store.allocate_stat_point(Ability::Strength).unwrap();

    for _ in 0..3 {
        store.toggle_quest_or_habit(q.id).unwrap();
        assert_eq!(store.stats().level, 1);
        assert_eq!(store.stats().available_stat_points, 0);
        store.toggle_quest_or_habit(q.id).unwrap();
        assert_eq!(store.stats().level, 2);
        assert_eq!(
            store.allocate_stat_point(Ability::Strength),
            Err(ProgressError::InsufficientPoints)
        );
    }
    assert_eq!(store.stats().strength, strength + 1);

    // Levels past the peak still pay out.
    store.update_stats(StatsUpdate {
        xp: Some(200),
        ..Default::default()
    });
    assert_eq!(store.stats().level, 3);
    assert_eq!(store.stats().available_stat_points, 1);
}

#[test]
fn extreme_xp_is_clamped_and_toggles_stay_exact() {
    let (_, _, mut store) = setup();
    store.update_stats(StatsUpdate {
        xp: Some(u64::MAX),
        ..Default::default()
    });
    assert_eq!(store.stats().xp, MAX_XP);
    assert_eq!(store.stats().level, level_for_xp(MAX_XP));
    assert_eq!(store.stats().title, "S-Rank Hunter");

    let good = store.add_quest(quest("Overachieve", 10, Polarity::Good, false)).unwrap();
    store.toggle_quest_or_habit(good.id).unwrap();
    assert_eq!(store.stats().xp, MAX_XP);
    assert_eq!(store.quest_log()[0].xp_delta, 0);
    store.toggle_quest_or_habit(good.id).unwrap();
    assert_eq!(store.stats().xp, MAX_XP);

    store.update_stats(StatsUpdate {
        xp: Some(1 << 63),
        ..Default::default()
    });
    let bad = store.add_quest(quest("Slack off", 10, Polarity::Bad, false)).unwrap();
    store.toggle_quest_or_habit(bad.id).unwrap();
    assert_eq!(store.stats().xp, MAX_XP - 10);
    store.toggle_quest_or_habit(bad.id).unwrap();
    assert_eq!(store.stats().xp, MAX_XP);
}

#[test]
fn every_mutator_applies_day_rollover() {
    let (_, clock, mut store) = setup();
    let habit = store.add_habit(quest("Stretch", 10, Polarity::Good, true)).unwrap();
    store.toggle_quest_or_habit(habit.id).unwrap();
    assert!(store.habits()[0].is_completed);

    clock.advance(Duration::days(1));
    let entry = ascendant_core::JournalDraft {
        title: "New morning".to_string(),
        ..Default::default()
    };
    store.add_journal_entry(entry).unwrap();

    assert!(!store.is_completed(habit.id));
    assert!(!store.habits()[0].is_completed);
    assert_eq!(store.habits()[0].streak, 1);

    clock.advance(Duration::days(1));
    store.toggle_quest_or_habit(habit.id).unwrap();
    clock.advance(Duration::days(1));
    store.update_stats(StatsUpdate::default());
    assert!(store.completed().is_empty());
}

#[test]
fn state_survives_reload() {
    let (storage, clock, mut store) = setup();
    let q = store.add_quest(quest("Write", 40, Polarity::Good, true)).unwrap();
    store.toggle_quest_or_habit(q.id).unwrap();
    let node = store.skill_tree().paths[0].nodes[0].clone();
    store.start_skill_quest(&node.id).unwrap();
    store.toggle_skill_task(&node.id, &node.tasks[1]).unwrap();
    store
        .add_journal_entry(ascendant_core::JournalDraft {
            title: "Day one".to_string(),
            content: "Started".to_string(),
            ..Default::default()
        })
        .unwrap();

    let reloaded = ProgressionStore::load(storage.clone(), clock.clone());
    assert_eq!(reloaded.snapshot(), store.snapshot());

    let raw = storage.get(storage::KEY_ACTIVE_SKILLS).unwrap().unwrap();
    assert!(raw.starts_with("[[\"body-1\","));
}

#[test]
fn corrupt_slice_falls_back_to_default() {
    let (storage, clock, mut store) = setup();
    store.add_quest(quest("Walk", 10, Polarity::Good, false)).unwrap();
    storage.set(storage::KEY_STATS, "[1, 2").unwrap();

    let reloaded = ProgressionStore::load(storage.clone(), clock.clone());
    assert_eq!(reloaded.stats().level, 1);
    assert_eq!(reloaded.stats().xp, 0);
    assert_eq!(reloaded.quests().len(), 1);
}

#[test]
fn reconcile_restores_or_clears() {
    let (storage, clock, mut store) = setup();
    store.add_quest(quest("Local only", 10, Polarity::Good, false)).unwrap();

    let mut remote_snapshot = ProfileSnapshot::default();
    remote_snapshot.stats.xp = 200;
    remote_snapshot.stats.level = 3;
    let remote = RemoteProfile {
        user_id: uuid::Uuid::new_v4(),
        snapshot: remote_snapshot,
        onboarding_complete: true,
        updated_at: clock.now(),
    };
    assert_eq!(store.reconcile_remote(Some(remote.clone())), Reconciliation::Restored);
    assert_eq!(store.stats().xp, 200);
    assert!(store.stats().onboarding_complete);
    assert!(store.quests().is_empty());
    assert!(!store.skill_tree().paths.is_empty());

    let reloaded = ProgressionStore::load(storage.clone(), clock.clone());
    assert_eq!(reloaded.stats().xp, 200);

    let not_onboarded = RemoteProfile {
        onboarding_complete: false,
        ..remote
    };
    assert_eq!(store.reconcile_remote(Some(not_onboarded)), Reconciliation::Cleared);
    assert_eq!(store.stats().xp, 0);
    assert_eq!(storage.get(storage::KEY_STATS).unwrap(), None);

    assert_eq!(store.reconcile_remote(None), Reconciliation::Cleared);
}
