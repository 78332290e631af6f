//! Mission evaluation.
//!
//! Each mission moves `pending → completed → claimed` and never back. A
//! mission is only looked at once every mission in its `depends_on` list has
//! been claimed; until then it stays pending and out of the available view.

use std::collections::HashSet;

use log::info;

use crate::catalog::MissionKind;
use crate::config::VisitRule;
use crate::state::{AgentState, MinigameState, MissionState, UnlockableState};

/// Where the player is on the site. Supplied by the host UI.
pub trait Navigation {
    fn current_route(&self) -> &str;
    fn has_scrolled_to_bottom(&self, route: &str) -> bool;
}

/// A plain record of the current route and every route scrolled to the bottom.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteLog {
    current: String,
    scrolled: HashSet<String>,
}

impl RouteLog {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            current: route.into(),
            scrolled: HashSet::new(),
        }
    }

    pub fn visit(&mut self, route: impl Into<String>) {
        self.current = route.into();
    }

    pub fn mark_scrolled_to_bottom(&mut self, route: impl Into<String>) {
        self.scrolled.insert(route.into());
    }

    /// Record a scroll position on the current route. Returns true the first
    /// time the route is seen within `threshold_px` of its bottom.
    pub fn record_scroll(
        &mut self,
        scroll_y: f64,
        viewport_height: f64,
        document_height: f64,
        threshold_px: f64,
    ) -> bool {
        if !is_scrolled_to_bottom(scroll_y, viewport_height, document_height, threshold_px) {
            return false;
        }
        self.scrolled.insert(self.current.clone())
    }
}

impl Navigation for RouteLog {
    fn current_route(&self) -> &str {
        &self.current
    }

    fn has_scrolled_to_bottom(&self, route: &str) -> bool {
        self.scrolled.contains(route)
    }
}

pub fn is_scrolled_to_bottom(
    scroll_y: f64,
    viewport_height: f64,
    document_height: f64,
    threshold_px: f64,
) -> bool {
    scroll_y + viewport_height >= document_height - threshold_px
}

/// Counters that are not part of any collection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Counters {
    /// Manually collected krakenlings, all time.
    pub picked: f64,
    /// Current krakenling balance.
    pub currency: f64,
    pub total_kps: f64,
}

/// Everything a completion predicate may look at.
pub struct MissionContext<'a> {
    pub navigation: &'a dyn Navigation,
    pub visit_rule: VisitRule,
    pub counters: Counters,
    pub agents: &'a [AgentState],
    pub unlockables: &'a [UnlockableState],
    pub minigames: &'a [MinigameState],
}

/// Every dependency exists and has been claimed.
pub fn dependencies_met(mission: &MissionState, missions: &[MissionState]) -> bool {
    mission
        .template
        .depends_on
        .iter()
        .all(|dep| missions.iter().any(|m| m.id() == *dep && m.claimed))
}

fn numeric_target(mission: &MissionState) -> Option<f64> {
    mission.template.target?.trim().parse::<f64>().ok()
}

fn is_satisfied(mission: &MissionState, ctx: &MissionContext, claimed: &HashSet<&str>) -> bool {
    let t = &mission.template;
    match t.kind {
        MissionKind::VisitPage => t.target.is_some_and(|route| match ctx.visit_rule {
            VisitRule::Route => ctx.navigation.current_route() == route,
            VisitRule::ScrolledToBottom => ctx.navigation.has_scrolled_to_bottom(route),
        }),
        MissionKind::CompleteTherapy => {
            let needed = t.target_count.unwrap_or(1);
            t.target.is_some_and(|id| {
                ctx.minigames
                    .iter()
                    .any(|m| m.id() == id && m.times_completed >= needed)
            })
        }
        MissionKind::CollectKrakenlings => {
            numeric_target(mission).is_some_and(|n| ctx.counters.picked >= n)
        }
        MissionKind::ReachKrakenlings => {
            numeric_target(mission).is_some_and(|n| ctx.counters.currency >= n)
        }
        MissionKind::ReachKps => {
            numeric_target(mission).is_some_and(|n| ctx.counters.total_kps >= n)
        }
        MissionKind::PurchaseItem => t.target.is_some_and(|id| {
            ctx.unlockables.iter().any(|u| u.id() == id && u.unlocked)
        }),
        MissionKind::MissionCompleted => t.target.is_some_and(|id| claimed.contains(id)),
        MissionKind::HelpersOwned => {
            let owned = ctx.agents.iter().filter(|a| a.owned > 0).count();
            owned >= t.target_count.unwrap_or(1) as usize
        }
    }
}

/// One evaluation pass. Returns true if any mission became completed.
pub fn evaluate_missions(missions: &mut [MissionState], ctx: &MissionContext) -> bool {
    // claims never happen during a pass, so one snapshot serves every predicate
    let claimed: HashSet<&'static str> = missions
        .iter()
        .filter(|m| m.claimed)
        .map(|m| m.id())
        .collect();

    let ready: Vec<usize> = missions
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.completed)
        .filter(|(_, m)| m.template.depends_on.iter().all(|dep| claimed.contains(dep)))
        .filter(|(_, m)| is_satisfied(m, ctx, &claimed))
        .map(|(i, _)| i)
        .collect();

    for &i in &ready {
        missions[i].completed = true;
        info!("mission completed: {}", missions[i].id());
    }
    !ready.is_empty()
}

/// Claim a completed mission. Returns its reward (0 when it has none).
pub fn claim_mission(missions: &mut [MissionState], id: &str) -> Option<u64> {
    let mission = missions.iter_mut().find(|m| m.id() == id)?;
    if !mission.completed || mission.claimed {
        return None;
    }
    mission.claimed = true;
    info!("mission claimed: {}", mission.id());
    Some(mission.template.reward.unwrap_or(0))
}

/// Missions the player can see: dependencies claimed, not yet claimed itself.
pub fn available_missions(missions: &[MissionState]) -> Vec<&MissionState> {
    missions
        .iter()
        .filter(|m| !m.claimed && dependencies_met(m, missions))
        .collect()
}
