use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// 各階段共享的計數器
#[derive(Debug, Default)]
pub struct EngineStats {
    pub batches_generated: AtomicU64,
    pub fragment_sets: AtomicU64,
    pub keyword_sets: AtomicU64,
    pub generations: AtomicU64,
    pub generation_failures: AtomicU64,
    pub artifacts_written: AtomicU64,
    pub write_failures: AtomicU64,
    pub stable: AtomicU64,
    pub unstable: AtomicU64,
    pub pulse_switches: AtomicU64,
}

pub fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub batches_generated: u64,
    pub fragment_sets: u64,
    pub keyword_sets: u64,
    pub generations: u64,
    pub generation_failures: u64,
    pub artifacts_written: u64,
    pub write_failures: u64,
    pub stable: u64,
    pub unstable: u64,
    pub pulse_switches: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            batches_generated: load(&self.batches_generated),
            fragment_sets: load(&self.fragment_sets),
            keyword_sets: load(&self.keyword_sets),
            generations: load(&self.generations),
            generation_failures: load(&self.generation_failures),
            artifacts_written: load(&self.artifacts_written),
            write_failures: load(&self.write_failures),
            stable: load(&self.stable),
            unstable: load(&self.unstable),
            pulse_switches: load(&self.pulse_switches),
        }
    }
}

impl StatsSnapshot {
    pub fn evaluated(&self) -> u64 {
        self.stable + self.unstable
    }

    /// 穩定產出比例，尚無判定時為 None
    pub fn stability_ratio(&self) -> Option<f64> {
        match self.evaluated() {
            0 => None,
            total => Some(self.stable as f64 / total as f64),
        }
    }
}
