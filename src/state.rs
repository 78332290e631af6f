//! Runtime state layered on top of the catalog templates, and the builders
//! that assemble it from (possibly missing) saved progress.

use std::collections::HashMap;

use crate::catalog::{
    AgentTemplate, MinigameTemplate, MissionTemplate, UnlockableTemplate, AGENTS, MINIGAMES,
    MISSIONS, UNLOCKABLES,
};
use crate::progress::{AgentProgress, MinigameProgress, MissionProgress, UnlockableProgress};

/// Upper bound on a therapy's cooldown reduction, so a cooldown never reaches zero.
pub const MAX_COOLDOWN_REDUCTION: f64 = 0.95;

/// An agent together with how many the player owns.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentState {
    pub template: AgentTemplate,
    pub owned: u32,
    /// Product of every unlocked agent-multiplier upgrade (default 1.0).
    pub multiplier: f64,
}

impl AgentState {
    pub fn new(template: AgentTemplate) -> Self {
        Self {
            template,
            owned: 0,
            multiplier: 1.0,
        }
    }

    pub fn id(&self) -> &'static str {
        self.template.id
    }

    fn apply_progress(&mut self, progress: &AgentProgress) {
        if let Some(owned) = progress.owned {
            self.owned = owned;
        }
        if let Some(multiplier) = progress.multiplier {
            self.multiplier = sanitize_multiplier(multiplier);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnlockableState {
    pub template: UnlockableTemplate,
    /// One-way latch.
    pub unlocked: bool,
}

impl UnlockableState {
    pub fn new(template: UnlockableTemplate) -> Self {
        Self {
            template,
            unlocked: false,
        }
    }

    pub fn id(&self) -> &'static str {
        self.template.id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinigameState {
    pub template: MinigameTemplate,
    pub unlocked: bool,
    pub times_completed: u32,
    /// Epoch milliseconds of the last completion, 0 = never played.
    pub last_played: u64,
    pub reward_multiplier: f64,
    pub cooldown_reduction: f64,
    /// Derived: `floor(base_cooldown * (1 - cooldown_reduction))`.
    pub cooldown: u64,
    /// Derived: `floor(base_reward * (times_completed + 1) * reward_multiplier)`.
    pub reward: u64,
}

impl MinigameState {
    pub fn new(template: MinigameTemplate) -> Self {
        let mut state = Self {
            template,
            unlocked: template.initially_unlocked,
            times_completed: 0,
            last_played: 0,
            reward_multiplier: 1.0,
            cooldown_reduction: 0.0,
            cooldown: 0,
            reward: 0,
        };
        state.refresh_derived();
        state
    }

    pub fn id(&self) -> &'static str {
        self.template.id
    }

    /// Recompute `cooldown` and `reward` from the persisted fields.
    pub fn refresh_derived(&mut self) {
        let reduction = self.cooldown_reduction.clamp(0.0, MAX_COOLDOWN_REDUCTION);
        self.cooldown = (self.template.base_cooldown_ms as f64 * (1.0 - reduction)).floor() as u64;
        self.reward = (self.template.base_reward as f64
            * (self.times_completed as f64 + 1.0)
            * self.reward_multiplier)
            .floor() as u64;
    }

    fn apply_progress(&mut self, progress: &MinigameProgress) {
        // unlocking is a latch: saved `false` never re-locks a starter therapy
        if progress.unlocked == Some(true) {
            self.unlocked = true;
        }
        if let Some(times) = progress.times_completed {
            self.times_completed = times;
        }
        if let Some(last_played) = progress.last_played {
            self.last_played = last_played;
        }
        if let Some(multiplier) = progress.reward_multiplier {
            self.reward_multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            };
        }
        if let Some(reduction) = progress.cooldown_reduction {
            self.cooldown_reduction = sanitize_reduction(reduction);
        }
        self.refresh_derived();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MissionState {
    pub template: MissionTemplate,
    pub completed: bool,
    /// Implies `completed`.
    pub claimed: bool,
}

impl MissionState {
    pub fn new(template: MissionTemplate) -> Self {
        Self {
            template,
            completed: false,
            claimed: false,
        }
    }

    pub fn id(&self) -> &'static str {
        self.template.id
    }
}

fn sanitize_multiplier(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

pub(crate) fn sanitize_reduction(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, MAX_COOLDOWN_REDUCTION)
    } else {
        0.0
    }
}

/// Index progress records by id. A later duplicate wins.
fn index_by_id<'a, P>(progress: &'a [P], id: impl Fn(&P) -> &str) -> HashMap<&'a str, &'a P> {
    progress.iter().map(|p| (id(p), p)).collect()
}

pub fn build_agents(progress: &[AgentProgress]) -> Vec<AgentState> {
    build_agents_with(AGENTS, progress)
}

/// Records whose id is not in `templates` are dropped.
pub fn build_agents_with(templates: &[AgentTemplate], progress: &[AgentProgress]) -> Vec<AgentState> {
    let saved = index_by_id(progress, |p| p.id.as_str());
    templates
        .iter()
        .map(|t| {
            let mut state = AgentState::new(*t);
            if let Some(p) = saved.get(t.id) {
                state.apply_progress(p);
            }
            state
        })
        .collect()
}

pub fn build_unlockables(progress: &[UnlockableProgress]) -> Vec<UnlockableState> {
    build_unlockables_with(UNLOCKABLES, progress)
}

pub fn build_unlockables_with(
    templates: &[UnlockableTemplate],
    progress: &[UnlockableProgress],
) -> Vec<UnlockableState> {
    let saved = index_by_id(progress, |p| p.id.as_str());
    templates
        .iter()
        .map(|t| UnlockableState {
            template: *t,
            unlocked: saved.get(t.id).is_some_and(|p| p.unlocked),
        })
        .collect()
}

pub fn build_minigames(progress: &[MinigameProgress]) -> Vec<MinigameState> {
    build_minigames_with(MINIGAMES, progress)
}

pub fn build_minigames_with(
    templates: &[MinigameTemplate],
    progress: &[MinigameProgress],
) -> Vec<MinigameState> {
    let saved = index_by_id(progress, |p| p.id.as_str());
    templates
        .iter()
        .map(|t| {
            let mut state = MinigameState::new(*t);
            if let Some(p) = saved.get(t.id) {
                state.apply_progress(p);
            }
            state
        })
        .collect()
}

pub fn build_missions(progress: &[MissionProgress]) -> Vec<MissionState> {
    build_missions_with(MISSIONS, progress)
}

pub fn build_missions_with(
    templates: &[MissionTemplate],
    progress: &[MissionProgress],
) -> Vec<MissionState> {
    let saved = index_by_id(progress, |p| p.id.as_str());
    templates
        .iter()
        .map(|t| {
            let mut state = MissionState::new(*t);
            if let Some(p) = saved.get(t.id) {
                state.claimed = p.claimed.unwrap_or(false);
                // a claimed mission is always completed, whatever was saved
                state.completed = p.completed.unwrap_or(false) || state.claimed;
            }
            state
        })
        .collect()
}
