use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::model::*;

use super::SharedTimeState;

/// Lock table with one entry per quarter-hour of the day.
///
/// Every entry exists from startup, so the table never grows and multi-entry
/// operations can lock a known, ordered set. Guards are always acquired in
/// ascending time order, which rules out lock-order deadlocks between
/// concurrent inventory and admission operations.
pub struct SlotTable {
    times: Vec<SharedTimeState>,
}

impl SlotTable {
    pub fn new(states: Vec<TimeState>) -> Self {
        Self {
            times: states.into_iter().map(|ts| Arc::new(RwLock::new(ts))).collect(),
        }
    }

    /// Fresh states for all 96 quarter-hours, ready to be filled by replay.
    pub fn empty_states() -> Vec<TimeState> {
        (0..SLOTS_PER_DAY)
            .filter_map(SlotTime::from_index)
            .map(TimeState::new)
            .collect()
    }

    pub fn get(&self, time: SlotTime) -> SharedTimeState {
        self.times[time.index()].clone()
    }

    /// Write-lock the given times. `times` must be sorted and deduplicated.
    pub async fn write_many(&self, times: &[SlotTime]) -> Vec<OwnedRwLockWriteGuard<TimeState>> {
        debug_assert!(times.windows(2).all(|w| w[0] < w[1]), "times must be sorted and unique");
        let mut guards = Vec::with_capacity(times.len());
        for time in times {
            guards.push(self.get(*time).write_owned().await);
        }
        guards
    }

    /// Write-lock every quarter-hour, in order.
    pub async fn write_all(&self) -> Vec<OwnedRwLockWriteGuard<TimeState>> {
        let mut guards = Vec::with_capacity(self.times.len());
        for ts in &self.times {
            guards.push(ts.clone().write_owned().await);
        }
        guards
    }

    /// Read-lock every quarter-hour, in order.
    pub async fn read_all(&self) -> Vec<OwnedRwLockReadGuard<TimeState>> {
        let mut guards = Vec::with_capacity(self.times.len());
        for ts in &self.times {
            guards.push(ts.clone().read_owned().await);
        }
        guards
    }
}
