//! Sparse progress records: only what differs from the catalog defaults.
//!
//! These are the shapes written under the `*-progress` keys. A field equal to
//! its default is left out, and an entity whose fields are all default is left
//! out of the array entirely, so the payload grows with the player's progress
//! rather than with the catalog.

use serde::{Deserialize, Serialize};

use crate::state::{AgentState, MinigameState, MissionState, UnlockableState};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProgress {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockableProgress {
    pub id: String,
    #[serde(default)]
    pub unlocked: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameProgress {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times_completed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_reduction: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionProgress {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed: Option<bool>,
}

/// `Some(value)` unless it equals the default.
fn unless_default<T: PartialEq>(value: T, default: T) -> Option<T> {
    (value != default).then_some(value)
}

pub fn serialize_agent_progress(agents: &[AgentState]) -> Vec<AgentProgress> {
    agents
        .iter()
        .filter_map(|a| {
            let owned = unless_default(a.owned, 0);
            let multiplier = unless_default(a.multiplier, 1.0);
            if owned.is_none() && multiplier.is_none() {
                return None;
            }
            Some(AgentProgress {
                id: a.id().to_string(),
                owned,
                multiplier,
            })
        })
        .collect()
}

pub fn serialize_unlockable_progress(unlockables: &[UnlockableState]) -> Vec<UnlockableProgress> {
    unlockables
        .iter()
        .filter(|u| u.unlocked)
        .map(|u| UnlockableProgress {
            id: u.id().to_string(),
            unlocked: true,
        })
        .collect()
}

/// Derived `cooldown`/`reward` are never written; they are rebuilt on load.
pub fn serialize_minigame_progress(minigames: &[MinigameState]) -> Vec<MinigameProgress> {
    minigames
        .iter()
        .filter_map(|m| {
            let record = MinigameProgress {
                id: m.id().to_string(),
                unlocked: unless_default(m.unlocked, m.template.initially_unlocked),
                times_completed: unless_default(m.times_completed, 0),
                last_played: unless_default(m.last_played, 0),
                reward_multiplier: unless_default(m.reward_multiplier, 1.0),
                cooldown_reduction: unless_default(m.cooldown_reduction, 0.0),
            };
            let is_default = record.unlocked.is_none()
                && record.times_completed.is_none()
                && record.last_played.is_none()
                && record.reward_multiplier.is_none()
                && record.cooldown_reduction.is_none();
            (!is_default).then_some(record)
        })
        .collect()
}

pub fn serialize_mission_progress(missions: &[MissionState]) -> Vec<MissionProgress> {
    missions
        .iter()
        .filter(|m| m.completed || m.claimed)
        .map(|m| MissionProgress {
            id: m.id().to_string(),
            completed: unless_default(m.completed, false),
            claimed: unless_default(m.claimed, false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{build_agents, build_minigames, build_missions, build_unlockables};

    #[test]
    fn defaults_serialize_to_nothing() {
        assert!(serialize_agent_progress(&build_agents(&[])).is_empty());
        assert!(serialize_unlockable_progress(&build_unlockables(&[])).is_empty());
        assert!(serialize_minigame_progress(&build_minigames(&[])).is_empty());
        assert!(serialize_mission_progress(&build_missions(&[])).is_empty());
    }

    #[test]
    fn default_agent_is_omitted_even_when_present() {
        let mut agents = build_agents(&[]);
        agents[1].owned = 2;
        let progress = serialize_agent_progress(&agents);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].id, "ink-courier");
        assert_eq!(progress[0].owned, Some(2));
        assert_eq!(progress[0].multiplier, None);
    }

    #[test]
    fn sparse_json_omits_default_fields() {
        let mut agents = build_agents(&[]);
        agents[0].multiplier = 2.0;
        let json = serde_json::to_string(&serialize_agent_progress(&agents)).unwrap();
        assert_eq!(json, r#"[{"id":"hatchling","multiplier":2.0}]"#);
    }

    #[test]
    fn minigame_records_use_camel_case() {
        let mut games = build_minigames(&[]);
        games[0].times_completed = 3;
        games[0].last_played = 1_700_000_000_000;
        let json = serde_json::to_string(&serialize_minigame_progress(&games)).unwrap();
        assert_eq!(
            json,
            r#"[{"id":"breathing-therapy","timesCompleted":3,"lastPlayed":1700000000000}]"#
        );
    }

    #[test]
    fn unlocked_gated_therapy_is_recorded() {
        let mut games = build_minigames(&[]);
        games[1].unlocked = true;
        let progress = serialize_minigame_progress(&games);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].id, "bubble-therapy");
        assert_eq!(progress[0].unlocked, Some(true));
    }

    #[test]
    fn completed_but_unclaimed_mission_round_trips() {
        let mut missions = build_missions(&[]);
        missions[0].completed = true;
        let progress = serialize_mission_progress(&missions);
        assert_eq!(
            progress,
            vec![MissionProgress {
                id: "first-collect".into(),
                completed: Some(true),
                claimed: None,
            }]
        );
        assert_eq!(build_missions(&progress), missions);
    }

    #[test]
    fn only_unlocked_unlockables_are_written() {
        let mut unlockables = build_unlockables(&[]);
        unlockables[3].unlocked = true;
        let progress = serialize_unlockable_progress(&unlockables);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].id, unlockables[3].id());
    }
}
