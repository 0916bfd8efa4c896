//! crates/ascendant_core/src/perks.rs
//!
//! Static table of perks unlocked at specific levels.

use chrono::{DateTime, Utc};

use crate::domain::{Ability, Buff, PerkEffect};

/// Compile-time description of a perk's effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerkEffectDef {
    StatBoost(&'static [(Ability, u32)]),
    XpMultiplier(u32),
}

/// One row of the perk table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perk {
    pub level: u32,
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub effect: PerkEffectDef,
    pub permanent: bool,
}

impl Perk {
    /// Materializes the perk into a buff record granted at `now`.
    pub fn to_buff(&self, now: DateTime<Utc>) -> Buff {
        let effect = match self.effect {
            PerkEffectDef::StatBoost(boosts) => PerkEffect::StatBoost {
                boosts: boosts.to_vec(),
            },
            PerkEffectDef::XpMultiplier(percent) => PerkEffect::XpMultiplier { percent },
        };
        Buff {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            effect,
            permanent: self.permanent,
            level: self.level,
            granted_at: now,
        }
    }
}

/// Ordered by level.
pub static PERK_TABLE: &[Perk] = &[
    Perk {
        level: 5,
        id: "iron_focus",
        name: "Iron Focus",
        description: "+2 Concentration",
        effect: PerkEffectDef::StatBoost(&[(Ability::Concentration, 2)]),
        permanent: true,
    },
    Perk {
        level: 10,
        id: "arcane_efficiency",
        name: "Arcane Efficiency",
        description: "+10% XP from all sources",
        effect: PerkEffectDef::XpMultiplier(10),
        permanent: true,
    },
    Perk {
        level: 15,
        id: "titans_resolve",
        name: "Titan's Resolve",
        description: "+2 Strength, +2 Vitality",
        effect: PerkEffectDef::StatBoost(&[(Ability::Strength, 2), (Ability::Vitality, 2)]),
        permanent: true,
    },
    Perk {
        level: 20,
        id: "shadow_step",
        name: "Shadow Step",
        description: "+3 Agility",
        effect: PerkEffectDef::StatBoost(&[(Ability::Agility, 3)]),
        permanent: true,
    },
    Perk {
        level: 25,
        id: "sages_insight",
        name: "Sage's Insight",
        description: "+3 Intelligence",
        effect: PerkEffectDef::StatBoost(&[(Ability::Intelligence, 3)]),
        permanent: true,
    },
    Perk {
        level: 30,
        id: "monarchs_presence",
        name: "Monarch's Presence",
        description: "+1 to every ability",
        effect: PerkEffectDef::StatBoost(&[
            (Ability::Strength, 1),
            (Ability::Agility, 1),
            (Ability::Vitality, 1),
            (Ability::Intelligence, 1),
            (Ability::Concentration, 1),
        ]),
        permanent: true,
    },
];

/// Returns the perk unlocked at exactly `level`, if any.
pub fn perk_for_level(level: u32) -> Option<&'static Perk> {
    PERK_TABLE.iter().find(|p| p.level == level)
}

/// Every perk with `from < level <= to`, in ascending level order.
pub fn perks_between(from: u32, to: u32) -> impl Iterator<Item = &'static Perk> {
    PERK_TABLE
        .iter()
        .filter(move |p| p.level > from && p.level <= to)
}
