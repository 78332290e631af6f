//! Tunables for a session: storage keys, tick rate and mission signal rules.

use serde::Deserialize;

use crate::error::ConfigError;

/// Persisted keys, one JSON (or float) string per key.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub agents: String,
    pub unlockables: String,
    pub minigames: String,
    pub missions: String,
    /// Fractional krakenling balance (authoritative).
    pub currency: String,
    /// Cumulative manually collected krakenlings.
    pub picked: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            agents: "agents-progress".into(),
            unlockables: "unlockables-progress".into(),
            minigames: "minigames-progress".into(),
            missions: "missions-progress".into(),
            currency: "octopus-count".into(),
            picked: "octopus-picked-count".into(),
        }
    }
}

/// How a `visit-page` mission decides the page was visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitRule {
    /// Being on the route is enough.
    Route,
    /// The player must have reached the bottom of the route at least once.
    ScrolledToBottom,
}

/// Covers accrual timers firing as slowly as every few seconds; longer gaps
/// (a backgrounded tab) are clamped.
pub const DEFAULT_MAX_TICK_GAP_MS: f64 = 5_000.0;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub keys: StorageKeys,
    /// Accrual ticks per real-time second.
    pub ticks_per_sec: u32,
    /// Largest wall-clock gap converted into ticks by a single update.
    pub max_tick_gap_ms: f64,
    /// Distance from the page bottom that still counts as "scrolled to bottom".
    pub scroll_bottom_threshold_px: f64,
    pub visit_rule: VisitRule,
    /// Advisory per-key byte budget of the host store. Exceeding it only warns.
    pub max_value_bytes: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            keys: StorageKeys::default(),
            ticks_per_sec: 10,
            max_tick_gap_ms: DEFAULT_MAX_TICK_GAP_MS,
            scroll_bottom_threshold_px: 200.0,
            visit_rule: VisitRule::ScrolledToBottom,
            max_value_bytes: 4096,
        }
    }
}

impl EconomyConfig {
    /// Parse overrides from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EconomyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_sec == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        let threshold = self.scroll_bottom_threshold_px;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(ConfigError::InvalidScrollThreshold(
                self.scroll_bottom_threshold_px,
            ));
        }
        let gap = self.max_tick_gap_ms;
        if !gap.is_finite() || gap < 0.0 {
            return Err(ConfigError::InvalidTickGap(gap));
        }
        Ok(())
    }
}
