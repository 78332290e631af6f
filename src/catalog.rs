//! Template registry: every agent, unlockable, therapy and mission the site ships with.
//!
//! Templates are immutable and compiled in. Runtime state is layered on top of
//! them by `state::build_*`. Ids are unique within each list; that is checked
//! by tests rather than at runtime.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// A helper that earns krakenlings every second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentTemplate {
    pub id: &'static str,
    pub base_cost: f64,
    /// Krakenlings per second for a single owned unit.
    pub collection_rate: f64,
    /// Geometric cost growth per unit owned.
    pub cost_multiplier: f64,
    /// Another agent that must be owned at least once first.
    pub unlock_requirement: Option<&'static str>,
    /// A mission that must be claimed first.
    pub mission_requirement: Option<&'static str>,
}

impl AgentTemplate {
    const fn new(
        id: &'static str,
        base_cost: f64,
        collection_rate: f64,
        cost_multiplier: f64,
    ) -> Self {
        Self {
            id,
            base_cost,
            collection_rate,
            cost_multiplier,
            unlock_requirement: None,
            mission_requirement: None,
        }
    }

    const fn after(self, agent_id: &'static str) -> Self {
        Self {
            unlock_requirement: Some(agent_id),
            ..self
        }
    }

    const fn gated_by(self, mission_id: &'static str) -> Self {
        Self {
            mission_requirement: Some(mission_id),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnlockableKind {
    Page,
    Feature,
    Treasure,
    Upgrade,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradeType {
    /// Adds `multiplier_value` (as a fraction) to total KPS.
    Passive,
    AgentMultiplier,
    /// Adds `multiplier_value` to a therapy's cooldown reduction.
    MinigameCooldown,
    MinigameRewardMultiplier,
    Audio,
    CollectionMultiplier,
}

/// Target id that makes a therapy upgrade apply to every therapy.
pub const ALL_MINIGAMES: &str = "all";

/// A one-time purchase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnlockableTemplate {
    pub id: &'static str,
    pub cost: u64,
    pub kind: UnlockableKind,
    pub route: Option<&'static str>,
    pub upgrade_type: Option<UpgradeType>,
    pub target_agent_id: Option<&'static str>,
    pub target_minigame_id: Option<&'static str>,
    pub multiplier_value: Option<f64>,
    /// Flat krakenlings per manual collection.
    pub manual_collection_value: Option<u64>,
    /// Manual collection worth this many seconds of KPS.
    pub manual_collection_percent_of_kps: Option<f64>,
    pub mission_requirement: Option<&'static str>,
}

impl UnlockableTemplate {
    const fn new(id: &'static str, cost: u64, kind: UnlockableKind) -> Self {
        Self {
            id,
            cost,
            kind,
            route: None,
            upgrade_type: None,
            target_agent_id: None,
            target_minigame_id: None,
            multiplier_value: None,
            manual_collection_value: None,
            manual_collection_percent_of_kps: None,
            mission_requirement: None,
        }
    }

    const fn page(id: &'static str, cost: u64, route: &'static str) -> Self {
        Self {
            route: Some(route),
            ..Self::new(id, cost, UnlockableKind::Page)
        }
    }

    const fn upgrade(id: &'static str, cost: u64, upgrade_type: UpgradeType) -> Self {
        Self {
            upgrade_type: Some(upgrade_type),
            ..Self::new(id, cost, UnlockableKind::Upgrade)
        }
    }

    const fn passive(id: &'static str, cost: u64, bonus: f64) -> Self {
        Self {
            multiplier_value: Some(bonus),
            ..Self::upgrade(id, cost, UpgradeType::Passive)
        }
    }

    const fn agent_boost(id: &'static str, cost: u64, agent_id: &'static str, factor: f64) -> Self {
        Self {
            target_agent_id: Some(agent_id),
            multiplier_value: Some(factor),
            ..Self::upgrade(id, cost, UpgradeType::AgentMultiplier)
        }
    }

    const fn cooldown(id: &'static str, cost: u64, minigame_id: &'static str, reduction: f64) -> Self {
        Self {
            target_minigame_id: Some(minigame_id),
            multiplier_value: Some(reduction),
            ..Self::upgrade(id, cost, UpgradeType::MinigameCooldown)
        }
    }

    const fn reward(id: &'static str, cost: u64, minigame_id: &'static str, factor: f64) -> Self {
        Self {
            target_minigame_id: Some(minigame_id),
            multiplier_value: Some(factor),
            ..Self::upgrade(id, cost, UpgradeType::MinigameRewardMultiplier)
        }
    }

    const fn flat_collection(id: &'static str, cost: u64, value: u64) -> Self {
        Self {
            manual_collection_value: Some(value),
            ..Self::upgrade(id, cost, UpgradeType::CollectionMultiplier)
        }
    }

    const fn percent_collection(id: &'static str, cost: u64, percent: f64) -> Self {
        Self {
            manual_collection_percent_of_kps: Some(percent),
            ..Self::upgrade(id, cost, UpgradeType::CollectionMultiplier)
        }
    }

    const fn gated_by(self, mission_id: &'static str) -> Self {
        Self {
            mission_requirement: Some(mission_id),
            ..self
        }
    }

    /// True for an unlocked-able upgrade of the given type.
    pub fn is_upgrade(&self, upgrade_type: UpgradeType) -> bool {
        self.kind == UnlockableKind::Upgrade && self.upgrade_type == Some(upgrade_type)
    }
}

/// A replayable therapy session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinigameTemplate {
    pub id: &'static str,
    pub emotion_id: &'static str,
    pub base_reward: u64,
    pub base_cooldown_ms: u64,
    pub mission_requirement: Option<&'static str>,
    pub initially_unlocked: bool,
}

impl MinigameTemplate {
    const fn new(
        id: &'static str,
        emotion_id: &'static str,
        base_reward: u64,
        base_cooldown_ms: u64,
    ) -> Self {
        Self {
            id,
            emotion_id,
            base_reward,
            base_cooldown_ms,
            mission_requirement: None,
            initially_unlocked: false,
        }
    }

    const fn unlocked(self) -> Self {
        Self {
            initially_unlocked: true,
            ..self
        }
    }

    const fn gated_by(self, mission_id: &'static str) -> Self {
        Self {
            mission_requirement: Some(mission_id),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionKind {
    /// `target` is a route.
    VisitPage,
    /// `target` is a therapy id, `target_count` the completions needed.
    CompleteTherapy,
    /// `target` is a number of manually collected krakenlings.
    CollectKrakenlings,
    /// `target` is a krakenling balance.
    ReachKrakenlings,
    /// `target` is a KPS figure.
    ReachKps,
    /// `target` is an unlockable id.
    PurchaseItem,
    /// `target_count` distinct agents owned.
    HelpersOwned,
    /// `target` is a mission id that must be claimed.
    MissionCompleted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MissionTemplate {
    pub id: &'static str,
    pub kind: MissionKind,
    pub target: Option<&'static str>,
    pub target_count: Option<u32>,
    pub reward: Option<u64>,
    pub depends_on: &'static [&'static str],
}

impl MissionTemplate {
    const fn new(id: &'static str, kind: MissionKind, reward: u64) -> Self {
        Self {
            id,
            kind,
            target: None,
            target_count: None,
            reward: Some(reward),
            depends_on: &[],
        }
    }

    const fn target(self, target: &'static str) -> Self {
        Self {
            target: Some(target),
            ..self
        }
    }

    const fn count(self, count: u32) -> Self {
        Self {
            target_count: Some(count),
            ..self
        }
    }

    const fn after(self, depends_on: &'static [&'static str]) -> Self {
        Self { depends_on, ..self }
    }
}

use MissionKind::*;

pub static AGENTS: &[AgentTemplate] = &[
    AgentTemplate::new("hatchling", 15.0, 0.1, 1.15),
    AgentTemplate::new("ink-courier", 100.0, 1.0, 1.15).after("hatchling"),
    AgentTemplate::new("reef-designer", 1_100.0, 8.0, 1.15).after("ink-courier"),
    AgentTemplate::new("tide-engineer", 12_000.0, 47.0, 1.15)
        .after("reef-designer")
        .gated_by("reach-10-kps"),
    AgentTemplate::new("abyss-producer", 130_000.0, 260.0, 1.15).after("tide-engineer"),
    AgentTemplate::new("elder-kraken", 1_400_000.0, 1_400.0, 1.2)
        .after("abyss-producer")
        .gated_by("reach-1000-kps"),
];

pub static UNLOCKABLES: &[UnlockableTemplate] = &[
    // pages
    UnlockableTemplate::page("page-about", 50, "/about"),
    UnlockableTemplate::page("page-projects", 250, "/projects").gated_by("visit-about"),
    UnlockableTemplate::page("page-team", 1_000, "/team"),
    UnlockableTemplate::page("page-contact", 5_000, "/contact"),
    // features
    UnlockableTemplate {
        route: Some("/therapy"),
        ..UnlockableTemplate::new("therapy-room", 300, UnlockableKind::Feature)
    },
    UnlockableTemplate::new("collect-all", 500, UnlockableKind::Feature),
    // treasures
    UnlockableTemplate::new("pearl-of-wisdom", 10_000, UnlockableKind::Treasure),
    UnlockableTemplate::new("sunken-compass", 75_000, UnlockableKind::Treasure),
    UnlockableTemplate::new("golden-tentacle", 1_000_000, UnlockableKind::Treasure)
        .gated_by("reach-1000-kps"),
    // upgrades
    UnlockableTemplate::upgrade("music-box", 200, UpgradeType::Audio),
    UnlockableTemplate::passive("warm-currents", 5_000, 0.05),
    UnlockableTemplate::passive("deep-currents", 50_000, 0.10),
    UnlockableTemplate::passive("abyssal-currents", 500_000, 0.25).gated_by("reach-100-kps"),
    UnlockableTemplate::agent_boost("hatchling-training", 100, "hatchling", 2.0),
    UnlockableTemplate::agent_boost("hatchling-mentors", 10_000, "hatchling", 3.0),
    UnlockableTemplate::agent_boost("courier-satchels", 1_000, "ink-courier", 2.0),
    UnlockableTemplate::agent_boost("designer-tablets", 11_000, "reef-designer", 2.0),
    UnlockableTemplate::agent_boost("engineer-toolkits", 120_000, "tide-engineer", 2.0),
    UnlockableTemplate::agent_boost("producer-slates", 1_300_000, "abyss-producer", 2.0),
    UnlockableTemplate::cooldown("breathing-focus", 2_000, "breathing-therapy", 0.25),
    UnlockableTemplate::cooldown("bubble-focus", 8_000, "bubble-therapy", 0.25),
    UnlockableTemplate::cooldown("mindful-tides", 40_000, ALL_MINIGAMES, 0.10),
    UnlockableTemplate::reward("gratitude-journal", 3_000, "breathing-therapy", 1.5),
    UnlockableTemplate::reward("therapy-certificate", 60_000, ALL_MINIGAMES, 2.0),
    UnlockableTemplate::flat_collection("collect-multiplier-2", 100, 2),
    UnlockableTemplate::flat_collection("collect-multiplier-5", 1_000, 5),
    UnlockableTemplate::flat_collection("collect-multiplier-10", 10_000, 10),
    UnlockableTemplate::percent_collection("collect-percent-1", 50_000, 5.0),
    UnlockableTemplate::percent_collection("collect-percent-2", 250_000, 10.0),
    UnlockableTemplate::percent_collection("collect-percent-3", 2_000_000, 25.0),
];

pub static MINIGAMES: &[MinigameTemplate] = &[
    MinigameTemplate::new("breathing-therapy", "anxiety", 50, 60_000).unlocked(),
    MinigameTemplate::new("bubble-therapy", "sadness", 150, 180_000).gated_by("first-therapy"),
    MinigameTemplate::new("ink-therapy", "anger", 400, 300_000).gated_by("therapy-regular"),
    MinigameTemplate::new("tide-therapy", "fear", 1_000, 600_000).gated_by("reach-100-kps"),
];

pub static MISSIONS: &[MissionTemplate] = &[
    MissionTemplate::new("first-collect", CollectKrakenlings, 20).target("10"),
    MissionTemplate::new("first-helper", HelpersOwned, 25)
        .count(1)
        .after(&["first-collect"]),
    MissionTemplate::new("visit-about", VisitPage, 50)
        .target("/about")
        .after(&["first-helper"]),
    MissionTemplate::new("reach-500", ReachKrakenlings, 100)
        .target("500")
        .after(&["first-helper"]),
    MissionTemplate::new("first-therapy", CompleteTherapy, 75)
        .target("breathing-therapy")
        .count(1)
        .after(&["visit-about"]),
    MissionTemplate::new("buy-projects", PurchaseItem, 150)
        .target("page-projects")
        .after(&["visit-about"]),
    MissionTemplate::new("visit-projects", VisitPage, 200)
        .target("/projects")
        .after(&["buy-projects"]),
    MissionTemplate::new("collect-1000", CollectKrakenlings, 1_000)
        .target("1000")
        .after(&["first-collect"]),
    MissionTemplate::new("reach-10-kps", ReachKps, 250)
        .target("10")
        .after(&["reach-500"]),
    MissionTemplate::new("three-helpers", HelpersOwned, 300)
        .count(3)
        .after(&["reach-10-kps"]),
    MissionTemplate::new("therapy-regular", CompleteTherapy, 500)
        .target("breathing-therapy")
        .count(5)
        .after(&["first-therapy"]),
    MissionTemplate::new("reach-100-kps", ReachKps, 2_000)
        .target("100")
        .after(&["three-helpers"]),
    MissionTemplate::new("reach-1000-kps", ReachKps, 20_000)
        .target("1000")
        .after(&["reach-100-kps"]),
    MissionTemplate::new("kraken-legend", MissionCompleted, 50_000)
        .target("reach-1000-kps")
        .after(&["reach-100-kps", "visit-projects"]),
];

/// Ordered template lists plus id lookups.
pub struct Registry {
    pub agents: &'static [AgentTemplate],
    pub unlockables: &'static [UnlockableTemplate],
    pub minigames: &'static [MinigameTemplate],
    pub missions: &'static [MissionTemplate],
    agent_index: HashMap<&'static str, &'static AgentTemplate>,
    unlockable_index: HashMap<&'static str, &'static UnlockableTemplate>,
    minigame_index: HashMap<&'static str, &'static MinigameTemplate>,
    mission_index: HashMap<&'static str, &'static MissionTemplate>,
}

impl Registry {
    pub fn new(
        agents: &'static [AgentTemplate],
        unlockables: &'static [UnlockableTemplate],
        minigames: &'static [MinigameTemplate],
        missions: &'static [MissionTemplate],
    ) -> Self {
        Self {
            agents,
            unlockables,
            minigames,
            missions,
            agent_index: agents.iter().map(|t| (t.id, t)).collect(),
            unlockable_index: unlockables.iter().map(|t| (t.id, t)).collect(),
            minigame_index: minigames.iter().map(|t| (t.id, t)).collect(),
            mission_index: missions.iter().map(|t| (t.id, t)).collect(),
        }
    }

    /// The catalog compiled into the site.
    pub fn builtin() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(|| Registry::new(AGENTS, UNLOCKABLES, MINIGAMES, MISSIONS))
    }

    pub fn agent(&self, id: &str) -> Option<&'static AgentTemplate> {
        self.agent_index.get(id).copied()
    }

    pub fn unlockable(&self, id: &str) -> Option<&'static UnlockableTemplate> {
        self.unlockable_index.get(id).copied()
    }

    pub fn minigame(&self, id: &str) -> Option<&'static MinigameTemplate> {
        self.minigame_index.get(id).copied()
    }

    pub fn mission(&self, id: &str) -> Option<&'static MissionTemplate> {
        self.mission_index.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_every_template() {
        let registry = Registry::builtin();
        for t in AGENTS {
            assert_eq!(registry.agent(t.id), Some(t));
        }
        for t in UNLOCKABLES {
            assert_eq!(registry.unlockable(t.id), Some(t));
        }
        for t in MINIGAMES {
            assert_eq!(registry.minigame(t.id), Some(t));
        }
        for t in MISSIONS {
            assert_eq!(registry.mission(t.id), Some(t));
        }
    }

    #[test]
    fn unknown_ids_are_absent() {
        let registry = Registry::builtin();
        assert!(registry.agent("giant-squid").is_none());
        assert!(registry.unlockable("page-blog").is_none());
        assert!(registry.minigame("sand-therapy").is_none());
        assert!(registry.mission("reach-mars").is_none());
    }

    #[test]
    fn builder_helpers_fill_optional_fields() {
        let tide = Registry::builtin().agent("tide-engineer").unwrap();
        assert_eq!(tide.unlock_requirement, Some("reef-designer"));
        assert_eq!(tide.mission_requirement, Some("reach-10-kps"));

        let focus = Registry::builtin().unlockable("breathing-focus").unwrap();
        assert!(focus.is_upgrade(UpgradeType::MinigameCooldown));
        assert_eq!(focus.target_minigame_id, Some("breathing-therapy"));
        assert_eq!(focus.multiplier_value, Some(0.25));
    }

    #[test]
    fn percent_tier_one_is_five_times_kps() {
        let tier = Registry::builtin().unlockable("collect-percent-1").unwrap();
        assert_eq!(tier.manual_collection_percent_of_kps, Some(5.0));
        let flat = Registry::builtin().unlockable("collect-multiplier-10").unwrap();
        assert_eq!(flat.manual_collection_value, Some(10));
    }

    #[test]
    fn only_breathing_therapy_starts_unlocked() {
        let unlocked: Vec<_> = MINIGAMES
            .iter()
            .filter(|m| m.initially_unlocked)
            .map(|m| m.id)
            .collect();
        assert_eq!(unlocked, vec!["breathing-therapy"]);
    }
}
