use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub cycles: CycleMetrics,
    pub broadcast: BroadcastMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleMetrics {
    pub total: u64,
    pub idle: u64,
    pub fulfilled: u64,
    pub failed: u64,
    pub resyncs: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastMetrics {
    pub races: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

/// Lock-free counters for the oracle loop.
#[derive(Debug)]
pub struct MetricsCollector {
    cycles_total: AtomicU64,
    cycles_idle: AtomicU64,
    cycles_fulfilled: AtomicU64,
    cycles_failed: AtomicU64,
    resyncs: AtomicU64,
    races: AtomicU64,
    race_latency_sum_ms: AtomicU64,
    race_min_latency_ms: AtomicU64,
    race_max_latency_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            cycles_idle: AtomicU64::new(0),
            cycles_fulfilled: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            resyncs: AtomicU64::new(0),
            races: AtomicU64::new(0),
            race_latency_sum_ms: AtomicU64::new(0),
            race_min_latency_ms: AtomicU64::new(u64::MAX),
            race_max_latency_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn record_idle_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::SeqCst);
        self.cycles_idle.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_fulfilled_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::SeqCst);
        self.cycles_fulfilled.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::SeqCst);
        self.cycles_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_resync(&self) {
        self.resyncs.fetch_add(1, Ordering::SeqCst);
    }

    /// Time from handing the signed bytes to the endpoints until the first
    /// success.
    pub fn record_race_latency(&self, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        self.races.fetch_add(1, Ordering::SeqCst);
        self.race_latency_sum_ms
            .fetch_add(latency_ms, Ordering::SeqCst);
        self.race_min_latency_ms
            .fetch_min(latency_ms, Ordering::SeqCst);
        self.race_max_latency_ms
            .fetch_max(latency_ms, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.cycles_total.load(Ordering::SeqCst);
        let fulfilled = self.cycles_fulfilled.load(Ordering::SeqCst);
        let failed = self.cycles_failed.load(Ordering::SeqCst);

        let races = self.races.load(Ordering::SeqCst);
        let latency_sum = self.race_latency_sum_ms.load(Ordering::SeqCst);
        let min_latency = self.race_min_latency_ms.load(Ordering::SeqCst);

        // Idle cycles do no work, so they don't count towards the rate
        let attempted = fulfilled + failed;

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.uptime().as_secs(),
            cycles: CycleMetrics {
                total,
                idle: self.cycles_idle.load(Ordering::SeqCst),
                fulfilled,
                failed,
                resyncs: self.resyncs.load(Ordering::SeqCst),
                success_rate: if attempted > 0 {
                    fulfilled as f64 / attempted as f64 * 100.0
                } else {
                    0.0
                },
            },
            broadcast: BroadcastMetrics {
                races,
                avg_latency_ms: if races > 0 {
                    latency_sum as f64 / races as f64
                } else {
                    0.0
                },
                min_latency_ms: if min_latency == u64::MAX { 0 } else { min_latency },
                max_latency_ms: self.race_max_latency_ms.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json();
        tokio::fs::write(path, json).await
    }

    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::SeqCst)
    }

    pub fn cycles_fulfilled(&self) -> u64 {
        self.cycles_fulfilled.load(Ordering::SeqCst)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::SeqCst)
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
