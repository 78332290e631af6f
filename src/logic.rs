//! Economy rules — pure functions over the state collections, fully testable.

use log::debug;

use crate::catalog::{UpgradeType, ALL_MINIGAMES};
use crate::state::{
    sanitize_reduction, AgentState, MinigameState, MissionState, UnlockableState,
};

/// Manual-collection tiers, most powerful first. Percent tiers outrank flat ones.
pub const MANUAL_COLLECTION_PRIORITY: &[&str] = &[
    "collect-percent-3",
    "collect-percent-2",
    "collect-percent-1",
    "collect-multiplier-10",
    "collect-multiplier-5",
    "collect-multiplier-2",
];

// ── Agents ────────────────────────────────────────────────

/// Price of the next unit: `floor(base_cost * cost_multiplier ^ owned)`.
pub fn agent_cost(agent: &AgentState) -> u64 {
    cost_at(agent, agent.owned)
}

/// Saturates at `u64::MAX` once the price no longer fits.
pub fn cost_at(agent: &AgentState, owned: u32) -> u64 {
    let t = &agent.template;
    let exponent = owned.min(i32::MAX as u32) as i32;
    (t.base_cost * t.cost_multiplier.powi(exponent)).floor() as u64
}

/// Krakenlings per second this agent contributes before passive bonuses.
pub fn agent_kps(agent: &AgentState) -> f64 {
    if agent.owned == 0 {
        return 0.0;
    }
    agent.owned as f64 * agent.template.collection_rate * agent.multiplier
}

/// Sum of agent output, raised once by the summed passive upgrade bonuses.
///
/// Passive percentages add together before they are applied; they do not
/// compound with each other.
pub fn total_kps(agents: &[AgentState], unlockables: &[UnlockableState]) -> f64 {
    let base: f64 = agents.iter().map(agent_kps).sum();
    base + base * passive_bonus(unlockables)
}

pub fn passive_bonus(unlockables: &[UnlockableState]) -> f64 {
    unlockables
        .iter()
        .filter(|u| u.unlocked && u.template.is_upgrade(UpgradeType::Passive))
        .filter_map(|u| u.template.multiplier_value)
        .sum()
}

/// Prerequisite agent owned and prerequisite mission claimed.
pub fn is_agent_available(
    agent: &AgentState,
    agents: &[AgentState],
    missions: &[MissionState],
) -> bool {
    let agent_ok = agent.template.unlock_requirement.map_or(true, |req| {
        agents.iter().any(|a| a.id() == req && a.owned > 0)
    });
    agent_ok && mission_claimed(agent.template.mission_requirement, missions)
}

pub fn can_afford_agent(agent: &AgentState, balance: f64) -> bool {
    balance.floor() >= agent_cost(agent) as f64
}

/// Buy one unit. Returns the price paid, `None` if unknown or unaffordable.
pub fn buy_agent(agents: &mut [AgentState], id: &str, balance: f64) -> Option<u64> {
    let agent = agents.iter_mut().find(|a| a.id() == id)?;
    let cost = agent_cost(agent);
    if !can_afford_agent(agent, balance) {
        return None;
    }
    agent.owned = agent.owned.saturating_add(1);
    debug!("bought {} (#{}) for {}", agent.id(), agent.owned, cost);
    Some(cost)
}

/// Product of every unlocked agent-multiplier upgrade aimed at `agent_id`.
pub fn resolve_agent_multiplier(agent_id: &str, unlockables: &[UnlockableState]) -> f64 {
    unlockables
        .iter()
        .filter(|u| u.unlocked && u.template.is_upgrade(UpgradeType::AgentMultiplier))
        .filter(|u| u.template.target_agent_id == Some(agent_id))
        .filter_map(|u| u.template.multiplier_value)
        .product()
}

/// Recompute every agent multiplier from scratch. Returns true if any changed.
pub fn apply_agent_multipliers(agents: &mut [AgentState], unlockables: &[UnlockableState]) -> bool {
    let mut changed = false;
    for agent in agents.iter_mut() {
        let multiplier = resolve_agent_multiplier(agent.id(), unlockables);
        if multiplier != agent.multiplier {
            agent.multiplier = multiplier;
            changed = true;
        }
    }
    changed
}

// ── Unlockables ───────────────────────────────────────────

pub fn is_unlockable_available(unlockable: &UnlockableState, missions: &[MissionState]) -> bool {
    mission_claimed(unlockable.template.mission_requirement, missions)
}

pub fn can_afford_unlockable(unlockable: &UnlockableState, balance: f64) -> bool {
    balance.floor() >= unlockable.template.cost as f64
}

/// Latch an unlockable. Returns the price paid; `None` if unknown, already
/// unlocked or unaffordable.
pub fn buy_unlockable(unlockables: &mut [UnlockableState], id: &str, balance: f64) -> Option<u64> {
    let unlockable = unlockables.iter_mut().find(|u| u.id() == id)?;
    if unlockable.unlocked || !can_afford_unlockable(unlockable, balance) {
        return None;
    }
    unlockable.unlocked = true;
    debug!("unlocked {} for {}", unlockable.id(), unlockable.template.cost);
    Some(unlockable.template.cost)
}

/// Apply the effect of an unlockable that was just bought.
///
/// Agent multipliers and cooldown reductions are recomputed from every
/// unlocked upgrade; reward multipliers compound onto the current value.
/// Returns `(agents_changed, minigames_changed)`.
pub fn apply_unlockable_effects(
    agents: &mut [AgentState],
    minigames: &mut [MinigameState],
    unlockables: &[UnlockableState],
    id: &str,
) -> (bool, bool) {
    let Some(bought) = unlockables.iter().find(|u| u.id() == id && u.unlocked) else {
        return (false, false);
    };
    let template = bought.template;
    match template.upgrade_type {
        Some(UpgradeType::AgentMultiplier) => {
            let Some(target) = template.target_agent_id else {
                return (false, false);
            };
            let multiplier = resolve_agent_multiplier(target, unlockables);
            let changed = agents
                .iter_mut()
                .filter(|a| a.id() == target)
                .fold(false, |changed, a| {
                    let differs = a.multiplier != multiplier;
                    a.multiplier = multiplier;
                    changed || differs
                });
            (changed, false)
        }
        Some(UpgradeType::MinigameCooldown) => {
            let mut changed = false;
            for m in minigames.iter_mut().filter(|m| targets(template.target_minigame_id, m)) {
                let reduction = resolve_cooldown_reduction(m.id(), unlockables);
                if reduction != m.cooldown_reduction {
                    m.cooldown_reduction = reduction;
                    m.refresh_derived();
                    changed = true;
                }
            }
            (false, changed)
        }
        Some(UpgradeType::MinigameRewardMultiplier) => {
            let factor = template.multiplier_value.unwrap_or(1.0);
            let mut changed = false;
            for m in minigames.iter_mut().filter(|m| targets(template.target_minigame_id, m)) {
                apply_reward_multiplier(m, factor);
                changed = true;
            }
            (false, changed)
        }
        _ => (false, false),
    }
}

fn targets(target: Option<&str>, minigame: &MinigameState) -> bool {
    matches!(target, Some(t) if t == ALL_MINIGAMES || t == minigame.id())
}

fn mission_claimed(requirement: Option<&str>, missions: &[MissionState]) -> bool {
    requirement.map_or(true, |req| {
        missions.iter().any(|m| m.id() == req && m.claimed)
    })
}

// ── Minigames ─────────────────────────────────────────────

/// Additive reduction from every unlocked cooldown upgrade aimed at this
/// therapy (or at all therapies), clamped below 1.
pub fn resolve_cooldown_reduction(minigame_id: &str, unlockables: &[UnlockableState]) -> f64 {
    let total: f64 = unlockables
        .iter()
        .filter(|u| u.unlocked && u.template.is_upgrade(UpgradeType::MinigameCooldown))
        .filter(|u| {
            matches!(u.template.target_minigame_id, Some(t) if t == ALL_MINIGAMES || t == minigame_id)
        })
        .filter_map(|u| u.template.multiplier_value)
        .sum();
    sanitize_reduction(total)
}

/// Compound a reward multiplier onto the therapy's current one.
pub fn apply_reward_multiplier(minigame: &mut MinigameState, factor: f64) {
    if factor.is_finite() && factor > 0.0 {
        minigame.reward_multiplier *= factor;
        minigame.refresh_derived();
    }
}

/// Latch therapies whose mission requirement is now claimed.
pub fn refresh_minigame_unlocks(minigames: &mut [MinigameState], missions: &[MissionState]) -> bool {
    let mut changed = false;
    for m in minigames.iter_mut().filter(|m| !m.unlocked) {
        if m.template.mission_requirement.is_some()
            && mission_claimed(m.template.mission_requirement, missions)
        {
            m.unlocked = true;
            changed = true;
        }
    }
    changed
}

/// Milliseconds until the therapy can be played again (0 = ready).
pub fn cooldown_remaining(minigame: &MinigameState, now: u64) -> u64 {
    if minigame.last_played == 0 {
        return 0;
    }
    let elapsed = now.saturating_sub(minigame.last_played);
    minigame.cooldown.saturating_sub(elapsed)
}

pub fn is_minigame_playable(minigame: &MinigameState, now: u64) -> bool {
    minigame.unlocked && cooldown_remaining(minigame, now) == 0
}

/// Record a completion at `now`. Returns the reward earned, which is the
/// reward shown before this completion.
pub fn complete_minigame(minigame: &mut MinigameState, now: u64) -> u64 {
    let earned = minigame.reward;
    minigame.last_played = now;
    minigame.times_completed = minigame.times_completed.saturating_add(1);
    minigame.refresh_derived();
    debug!(
        "{} completed ({} times), earned {}",
        minigame.id(),
        minigame.times_completed,
        earned
    );
    earned
}

/// Complete a therapy if it is playable right now.
pub fn play_minigame(minigames: &mut [MinigameState], id: &str, now: u64) -> Option<u64> {
    let minigame = minigames.iter_mut().find(|m| m.id() == id)?;
    if !is_minigame_playable(minigame, now) {
        return None;
    }
    Some(complete_minigame(minigame, now))
}

// ── Manual collection ─────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollectionTier {
    /// Fixed krakenlings per collection.
    Flat(u64),
    /// `percent` times the current KPS per collection.
    Percent(f64),
}

impl CollectionTier {
    pub fn value(self, total_kps: f64) -> u64 {
        match self {
            CollectionTier::Flat(value) => value,
            CollectionTier::Percent(percent) => ((total_kps * percent).floor() as u64).max(1),
        }
    }
}

/// The best unlocked collection tier, by fixed priority. Not cached: KPS moves.
pub fn resolve_manual_collection_tier(unlockables: &[UnlockableState]) -> CollectionTier {
    MANUAL_COLLECTION_PRIORITY
        .iter()
        .filter_map(|id| unlockables.iter().find(|u| u.id() == *id && u.unlocked))
        .find_map(|u| {
            if let Some(percent) = u.template.manual_collection_percent_of_kps {
                Some(CollectionTier::Percent(percent))
            } else {
                u.template.manual_collection_value.map(CollectionTier::Flat)
            }
        })
        .unwrap_or(CollectionTier::Flat(1))
}

pub fn manual_collection_value(unlockables: &[UnlockableState], total_kps: f64) -> u64 {
    resolve_manual_collection_tier(unlockables).value(total_kps)
}
