//! crates/ascendant_core/src/skills.rs
//!
//! Seed data for the skill tree.

use crate::domain::{SkillNode, SkillPath, SkillTree};

fn node(id: &str, name: &str, description: &str, tasks: &[&str], xp_reward: u32) -> SkillNode {
    SkillNode {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        tasks: tasks.iter().map(|t| t.to_string()).collect(),
        xp_reward,
        custom: false,
    }
}

/// The skill tree every new player starts with.
pub fn default_skill_tree() -> SkillTree {
    SkillTree {
        paths: vec![
            SkillPath {
                id: "body".to_string(),
                name: "Path of the Body".to_string(),
                description: "Strength and endurance training.".to_string(),
                nodes: vec![
                    node(
                        "body-1",
                        "Awakened Vessel",
                        "Build the daily movement habit.",
                        &["Walk 5,000 steps", "Do 20 push-ups", "Stretch for 10 minutes"],
                        100,
                    ),
                    node(
                        "body-2",
                        "Iron Frame",
                        "Structured strength work.",
                        &["Complete a full-body workout", "Hold a 1 minute plank", "Run 3 km"],
                        200,
                    ),
                    node(
                        "body-3",
                        "Unyielding",
                        "Push past the comfortable.",
                        &["Run 10 km", "Do 100 push-ups in a day", "Train 5 days in one week"],
                        400,
                    ),
                ],
            },
            SkillPath {
                id: "mind".to_string(),
                name: "Path of the Mind".to_string(),
                description: "Learning and focus.".to_string(),
                nodes: vec![
                    node(
                        "mind-1",
                        "Spark of Curiosity",
                        "Start feeding the mind.",
                        &["Read for 20 minutes", "Write a one-page summary", "Learn one new word"],
                        100,
                    ),
                    node(
                        "mind-2",
                        "Deep Work",
                        "Sustain attention.",
                        &[
                            "Focus for 90 minutes without distraction",
                            "Finish a book chapter",
                            "Teach someone a concept",
                        ],
                        200,
                    ),
                    node(
                        "mind-3",
                        "Scholar",
                        "Master a subject.",
                        &[
                            "Finish a course",
                            "Write an essay",
                            "Build a project from what you learned",
                        ],
                        400,
                    ),
                ],
            },
            SkillPath {
                id: "discipline".to_string(),
                name: "Path of Discipline".to_string(),
                description: "Routine and self-control.".to_string(),
                nodes: vec![
                    node(
                        "discipline-1",
                        "First Light",
                        "Own the morning.",
                        &["Wake before 7am", "Make your bed", "Plan the day"],
                        100,
                    ),
                    node(
                        "discipline-2",
                        "Cold Resolve",
                        "Do hard things on purpose.",
                        &[
                            "Take a cold shower",
                            "No social media for a day",
                            "Cook every meal for a day",
                        ],
                        200,
                    ),
                    node(
                        "discipline-3",
                        "Shadow Monarch",
                        "Consistency without exception.",
                        &[
                            "Keep a 30 day streak",
                            "Journal every day for a week",
                            "Complete every habit for a week",
                        ],
                        400,
                    ),
                ],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seeded_ids_are_unique() {
        let tree = default_skill_tree();
        let ids: Vec<_> = tree.paths.iter().flat_map(|p| &p.nodes).map(|n| &n.id).collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len());
        assert!(tree.paths.iter().all(|p| !p.nodes.is_empty()));
    }
}
