//! crates/ascendant_core/src/validation.rs
//!
//! Validation of user-entered drafts before they reach the store.

use crate::domain::{JournalDraft, QuestDraft, SkillNodeDraft};
use crate::error::{ProgressError, ProgressResult};

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_QUEST_XP: u32 = 1000;
pub const MAX_SKILL_XP: u32 = 5000;
pub const DEFAULT_SKILL_XP: u32 = 150;
pub const MAX_TAGS: usize = 10;

fn checked_title(field: &str, raw: &str) -> ProgressResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ProgressError::Validation(format!("{} cannot be empty", field)));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ProgressError::Validation(format!(
            "{} is too long (maximum {} characters)",
            field, MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

/// A quest or habit draft that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidQuest {
    pub title: String,
    pub description: Option<String>,
    pub xp_value: u32,
}

pub fn validate_quest(draft: &QuestDraft) -> ProgressResult<ValidQuest> {
    let title = checked_title("Title", &draft.title)?;
    let xp_value = draft.xp_value.unwrap_or_else(|| draft.difficulty.default_xp());
    if xp_value == 0 || xp_value > MAX_QUEST_XP {
        return Err(ProgressError::Validation(format!(
            "XP value must be between 1 and {}",
            MAX_QUEST_XP
        )));
    }
    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    Ok(ValidQuest {
        title,
        description,
        xp_value,
    })
}

/// Trims task names and rejects empty lists, blank tasks and duplicates.
pub fn validate_skill_node(draft: &SkillNodeDraft) -> ProgressResult<SkillNodeDraft> {
    let name = checked_title("Name", &draft.name)?;
    let mut tasks: Vec<String> = Vec::with_capacity(draft.tasks.len());
    for task in &draft.tasks {
        let task = task.trim();
        if task.is_empty() {
            return Err(ProgressError::Validation("Tasks cannot be blank".to_string()));
        }
        if tasks.iter().any(|t| t == task) {
            return Err(ProgressError::Validation(format!("Duplicate task '{}'", task)));
        }
        tasks.push(task.to_string());
    }
    if tasks.is_empty() {
        return Err(ProgressError::Validation(
            "A skill node needs at least one task".to_string(),
        ));
    }
    let xp_reward = match draft.xp_reward {
        0 => DEFAULT_SKILL_XP,
        xp if xp > MAX_SKILL_XP => {
            return Err(ProgressError::Validation(format!(
                "XP reward cannot exceed {}",
                MAX_SKILL_XP
            )))
        }
        xp => xp,
    };
    Ok(SkillNodeDraft {
        name,
        description: draft.description.trim().to_string(),
        tasks,
        xp_reward,
    })
}

pub fn validate_journal(draft: &JournalDraft) -> ProgressResult<JournalDraft> {
    let title = draft.title.trim();
    let content = draft.content.trim();
    if title.is_empty() && content.is_empty() {
        return Err(ProgressError::Validation(
            "A journal entry needs a title or content".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ProgressError::Validation(format!(
            "Title is too long (maximum {} characters)",
            MAX_TITLE_LEN
        )));
    }
    let mut tags: Vec<String> = Vec::new();
    for tag in &draft.tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.len() > MAX_TAGS {
        return Err(ProgressError::Validation(format!(
            "At most {} tags are allowed",
            MAX_TAGS
        )));
    }
    Ok(JournalDraft {
        title: title.to_string(),
        content: content.to_string(),
        mood: draft.mood,
        tags,
    })
}
