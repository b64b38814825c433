use crate::core::stats::StatsSnapshot;
use std::time::Duration;
#[cfg(feature = "cli")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// 每分鐘的速率，運行時間過短時為 0
pub fn per_minute(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs < 1.0 {
        0.0
    } else {
        count as f64 * 60.0 / secs
    }
}

/// 引擎進程的資源快照
#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub cores: usize,
    pub rss_mb: u64,
    pub rss_percent: f32,
    pub peak_rss_mb: u64,
    pub uptime: Duration,
}

/// 把進程資源與管線進度一起記錄下來
#[cfg(feature = "cli")]
#[derive(Clone)]
pub struct SystemMonitor {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
    started: Instant,
    peak_rss_mb: Arc<Mutex<u64>>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            sysinfo::get_current_pid()
                .map_err(|e| tracing::warn!("⚠️ Cannot determine current PID, process stats disabled: {}", e))
                .ok()
        } else {
            None
        };

        Self {
            system: Arc::new(Mutex::new(System::new())),
            pid,
            started: Instant::now(),
            peak_rss_mb: Arc::new(Mutex::new(0)),
            enabled,
        }
    }

    pub fn sample(&self) -> Option<ResourceUsage> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        system.refresh_cpu_usage();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system.process(pid)?;
        let rss_mb = process.memory() / 1024 / 1024;
        let total_mb = system.total_memory() / 1024 / 1024;

        let mut peak = self.peak_rss_mb.lock().ok()?;
        *peak = (*peak).max(rss_mb);

        Some(ResourceUsage {
            cpu_percent: process.cpu_usage(),
            cores: system.cpus().len(),
            rss_mb,
            rss_percent: if total_mb > 0 {
                rss_mb as f32 * 100.0 / total_mb as f32
            } else {
                0.0
            },
            peak_rss_mb: *peak,
            uptime: self.started.elapsed(),
        })
    }

    pub fn log_stats(&self, phase: &str, stats: &StatsSnapshot) {
        if !self.enabled {
            return;
        }
        match self.sample() {
            Some(usage) => tracing::info!(
                "📊 {} - CPU: {:.1}% ({} cores), Memory: {}MB ({:.1}%), Batches: {}, Generated: {}, Evaluated: {}",
                phase,
                usage.cpu_percent,
                usage.cores,
                usage.rss_mb,
                usage.rss_percent,
                stats.batches_generated,
                stats.generations,
                stats.evaluated()
            ),
            None => tracing::info!(
                "📊 {} - Batches: {}, Generated: {}, Evaluated: {}",
                phase,
                stats.batches_generated,
                stats.generations,
                stats.evaluated()
            ),
        }
    }

    pub fn log_final_stats(&self, stats: &StatsSnapshot) {
        if !self.enabled {
            return;
        }
        let uptime = self.started.elapsed();
        let peak = self.sample().map(|usage| usage.peak_rss_mb).unwrap_or_default();
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB, {:.1} generations/min, {:.1} batches/min",
            uptime,
            peak,
            per_minute(stats.generations, uptime),
            per_minute(stats.batches_generated, uptime)
        );
    }
}

// 非 CLI 建置不帶 sysinfo，只保留介面
#[cfg(not(feature = "cli"))]
#[derive(Clone)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str, _stats: &StatsSnapshot) {}

    pub fn log_final_stats(&self, _stats: &StatsSnapshot) {}
}
