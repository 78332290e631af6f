//! セーブ/ロード機能と旧形式セーブデータのマイグレーション。
//!
//! ## 形式
//!
//! 各コレクションは `progress` モジュールの疎な配列として 1 キーずつ保存する。
//! 空配列になったキーは `"[]"` を書かずに削除する。
//!
//! ## 旧形式 (legacy shape)
//!
//! 以前のバージョンはテンプレートごと丸ごと保存していた。旧形式にしか存在しない
//! フィールドで判別する:
//!
//! - agents: `collectionRate`
//! - unlockables: `type`
//! - minigames: `baseReward`
//! - missions: `name`
//!
//! 1 件でも旧形式のエントリがあれば配列全体を旧形式として扱い、疎な形式に
//! 変換した上で `should_persist = true` を返す（呼び出し側が再保存する）。
//! パースエラーや配列以外の値はデータ無しと同じ扱いでデフォルトに戻す。
//! どの経路でも panic や `Err` は返さない。
//!
//! TODO: 判別をフィールド嗅ぎ分けから `schemaVersion` タグに置き換える。
//! 旧形式のセーブが残っている間は嗅ぎ分けも併用する必要がある。

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::progress::{AgentProgress, MinigameProgress, MissionProgress, UnlockableProgress};
use crate::state::{
    build_agents, build_minigames, build_missions, build_unlockables, AgentState, MinigameState,
    MissionState, UnlockableState,
};
use crate::store::KeyValueStore;

/// Result of reading one persisted collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Loaded<T> {
    pub state: T,
    /// The stored value should be rewritten (legacy shape or unreadable data).
    pub should_persist: bool,
}

/// A pre-refactor full-object entry that can be reduced to sparse progress.
trait LegacyShape: DeserializeOwned {
    type Progress: DeserializeOwned;
    /// Field only the legacy shape carries.
    const DISCRIMINATOR: &'static str;

    /// `None` when the entry carries nothing worth restoring.
    fn into_progress(self) -> Option<Self::Progress>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAgent {
    id: Option<String>,
    owned: Option<f64>,
    multiplier: Option<f64>,
}

impl LegacyShape for LegacyAgent {
    type Progress = AgentProgress;
    const DISCRIMINATOR: &'static str = "collectionRate";

    fn into_progress(self) -> Option<AgentProgress> {
        let owned = self.owned.and_then(whole_count).filter(|&n| n > 0);
        let multiplier = self
            .multiplier
            .filter(|m| m.is_finite() && *m > 0.0 && *m != 1.0);
        if owned.is_none() && multiplier.is_none() {
            return None;
        }
        Some(AgentProgress {
            id: self.id?,
            owned,
            multiplier,
        })
    }
}

#[derive(Deserialize)]
struct LegacyUnlockable {
    id: Option<String>,
    unlocked: Option<bool>,
}

impl LegacyShape for LegacyUnlockable {
    type Progress = UnlockableProgress;
    const DISCRIMINATOR: &'static str = "type";

    fn into_progress(self) -> Option<UnlockableProgress> {
        if self.unlocked != Some(true) {
            return None;
        }
        Some(UnlockableProgress {
            id: self.id?,
            unlocked: true,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyMinigame {
    id: Option<String>,
    unlocked: Option<bool>,
    times_completed: Option<f64>,
    last_played: Option<f64>,
    reward_multiplier: Option<f64>,
    cooldown_reduction: Option<f64>,
}

impl LegacyShape for LegacyMinigame {
    type Progress = MinigameProgress;
    const DISCRIMINATOR: &'static str = "baseReward";

    fn into_progress(self) -> Option<MinigameProgress> {
        let record = MinigameProgress {
            id: self.id?,
            // the old shape always stored `unlocked`; only `true` can matter
            unlocked: self.unlocked.filter(|&u| u),
            times_completed: self.times_completed.and_then(whole_count).filter(|&n| n > 0),
            last_played: self
                .last_played
                .filter(|t| t.is_finite() && *t > 0.0)
                .map(|t| t as u64),
            reward_multiplier: self
                .reward_multiplier
                .filter(|m| m.is_finite() && *m != 1.0),
            cooldown_reduction: self
                .cooldown_reduction
                .filter(|r| r.is_finite() && *r != 0.0),
        };
        Some(record)
    }
}

#[derive(Deserialize)]
struct LegacyMission {
    id: Option<String>,
    completed: Option<bool>,
    claimed: Option<bool>,
}

impl LegacyShape for LegacyMission {
    type Progress = MissionProgress;
    const DISCRIMINATOR: &'static str = "name";

    fn into_progress(self) -> Option<MissionProgress> {
        let completed = self.completed.filter(|&c| c);
        let claimed = self.claimed.filter(|&c| c);
        if completed.is_none() && claimed.is_none() {
            return None;
        }
        Some(MissionProgress {
            id: self.id?,
            completed,
            claimed,
        })
    }
}

/// Non-negative finite number floored to a count.
fn whole_count(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0).then(|| value.floor() as u32)
}

/// Parse a stored collection into sparse progress, migrating legacy shapes.
fn load_progress<L: LegacyShape>(raw: Option<&str>, label: &str) -> (Vec<L::Progress>, bool) {
    let Some(raw) = raw else {
        return (Vec::new(), false);
    };

    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("{label}: セーブデータが配列ではありません（破棄します）");
            return (Vec::new(), true);
        }
        Err(e) => {
            warn!("{label}: セーブデータのパースに失敗（破棄します）: {e}");
            return (Vec::new(), true);
        }
    };

    if entries.iter().any(|e| e.get(L::DISCRIMINATOR).is_some()) {
        info!(
            "{label}: 旧形式のセーブデータをマイグレーション ({} entries)",
            entries.len()
        );
        let progress = entries
            .into_iter()
            .filter_map(|e| serde_json::from_value::<L>(e).ok())
            .filter_map(L::into_progress)
            .collect();
        return (progress, true);
    }

    let progress = entries
        .into_iter()
        .filter_map(|e| match serde_json::from_value::<L::Progress>(e) {
            Ok(p) => Some(p),
            Err(err) => {
                warn!("{label}: 読めないエントリを無視: {err}");
                None
            }
        })
        .collect();
    (progress, false)
}

pub fn deserialize_agents(raw: Option<&str>) -> Loaded<Vec<AgentState>> {
    let (progress, should_persist) = load_progress::<LegacyAgent>(raw, "agents");
    Loaded {
        state: build_agents(&progress),
        should_persist,
    }
}

pub fn deserialize_unlockables(raw: Option<&str>) -> Loaded<Vec<UnlockableState>> {
    let (progress, should_persist) = load_progress::<LegacyUnlockable>(raw, "unlockables");
    Loaded {
        state: build_unlockables(&progress),
        should_persist,
    }
}

pub fn deserialize_minigames(raw: Option<&str>) -> Loaded<Vec<MinigameState>> {
    let (progress, should_persist) = load_progress::<LegacyMinigame>(raw, "minigames");
    Loaded {
        state: build_minigames(&progress),
        should_persist,
    }
}

pub fn deserialize_missions(raw: Option<&str>) -> Loaded<Vec<MissionState>> {
    let (progress, should_persist) = load_progress::<LegacyMission>(raw, "missions");
    Loaded {
        state: build_missions(&progress),
        should_persist,
    }
}

/// Write a sparse collection, or delete the key when there is nothing to keep.
pub fn persist_progress<S, T>(
    store: &mut S,
    key: &str,
    progress: &[T],
    max_bytes: usize,
) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    if progress.is_empty() {
        return store.remove(key);
    }
    let json = serde_json::to_string(progress).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    if json.len() > max_bytes {
        warn!(
            "{key}: {} bytes exceeds the store budget of {max_bytes} bytes",
            json.len()
        );
    }
    store.set(key, &json)
}

/// Read a float counter. Missing or unreadable values count as zero.
pub fn load_counter<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> f64 {
    let Some(raw) = store.get(key) else {
        return 0.0;
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => {
            warn!("{key}: unreadable counter {raw:?}, treating as 0");
            0.0
        }
    }
}

pub fn save_counter<S: KeyValueStore + ?Sized>(
    store: &mut S,
    key: &str,
    value: f64,
) -> Result<(), StoreError> {
    store.set(key, &value.to_string())
}
