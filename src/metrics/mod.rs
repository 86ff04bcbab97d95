use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System};

pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);

/// Gap between the two warm-up samples. CPU usage is a delta between
/// refreshes, so the very first reading is always 0%; a short-spaced second
/// sample gives a real number before anything renders.
pub const WARM_UP_DELAY: Duration = Duration::from_millis(120);

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub net_up_bps: f64,
    pub net_down_bps: f64,
    pub taken_at: Instant,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            mem_percent: 0.0,
            net_up_bps: 0.0,
            net_down_bps: 0.0,
            taken_at: Instant::now(),
        }
    }
}

/// Shared read handle to the latest snapshot. Consumers clone this; only the
/// sampler writes through it.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<MetricsSnapshot>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> MetricsSnapshot {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn publish(&self, snapshot: MetricsSnapshot) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = snapshot;
        }
    }
}

/// Periodic system sampler. Owns the sysinfo state and publishes snapshots
/// through a [`SnapshotHandle`] at a fixed cadence.
pub struct Sampler {
    sys: System,
    networks: Networks,
    handle: SnapshotHandle,
    last_refresh_at: Option<Instant>,
    refreshes: u64,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        Self {
            sys,
            networks: Networks::new_with_refreshed_list(),
            handle: SnapshotHandle::new(),
            last_refresh_at: None,
            refreshes: 0,
        }
    }

    pub fn handle(&self) -> SnapshotHandle {
        self.handle.clone()
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    /// Take a sample immediately, regardless of the cadence, and publish it.
    pub fn force_refresh(&mut self) -> MetricsSnapshot {
        let now = Instant::now();

        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.networks.refresh();

        let total_mem = self.sys.total_memory();
        let mem_percent = if total_mem == 0 {
            0.0
        } else {
            (self.sys.used_memory() as f64 / total_mem as f64 * 100.0) as f32
        };

        let elapsed = self
            .last_refresh_at
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        let (mut up_bps, mut down_bps) = (0.0, 0.0);
        if elapsed > 0.0 {
            let (mut up, mut down) = (0u64, 0u64);
            for (_, data) in &self.networks {
                up += data.transmitted();
                down += data.received();
            }
            up_bps = up as f64 / elapsed;
            down_bps = down as f64 / elapsed;
        }

        let snapshot = MetricsSnapshot {
            cpu_percent: self.sys.global_cpu_usage().clamp(0.0, 100.0),
            mem_percent: mem_percent.clamp(0.0, 100.0),
            net_up_bps: up_bps,
            net_down_bps: down_bps,
            taken_at: now,
        };

        self.last_refresh_at = Some(now);
        self.refreshes += 1;
        self.handle.publish(snapshot.clone());
        snapshot
    }

    /// Two samples a short moment apart; the second one is the first value
    /// worth displaying.
    pub async fn warm_up(&mut self) -> MetricsSnapshot {
        self.force_refresh();
        tokio::time::sleep(WARM_UP_DELAY).await;
        self.force_refresh()
    }

    /// Consume the sampler into a background refresh loop. Call
    /// [`Sampler::warm_up`] first so the published snapshot is never the
    /// artificial 0% first reading.
    pub fn spawn_refresh_loop(mut self) -> SnapshotHandle {
        let handle = self.handle();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; we already have a fresh sample.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.force_refresh();
            }
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_refresh_publishes_to_handle() {
        let mut sampler = Sampler::new();
        let handle = sampler.handle();
        let before = handle.latest().taken_at;

        let snapshot = sampler.force_refresh();

        assert_eq!(sampler.refresh_count(), 1);
        assert!(handle.latest().taken_at >= before);
        assert!(snapshot.mem_percent >= 0.0 && snapshot.mem_percent <= 100.0);
        assert!(snapshot.cpu_percent >= 0.0 && snapshot.cpu_percent <= 100.0);
    }

    #[tokio::test]
    async fn warm_up_takes_two_samples() {
        let mut sampler = Sampler::new();

        let first = sampler.force_refresh();
        let warmed = sampler.warm_up().await;

        assert_eq!(sampler.refresh_count(), 3);
        assert!(warmed.taken_at > first.taken_at);
    }

    #[test]
    fn handle_clones_share_state() {
        let handle = SnapshotHandle::new();
        let reader = handle.clone();

        let mut snapshot = MetricsSnapshot::default();
        snapshot.cpu_percent = 42.0;
        handle.publish(snapshot);

        assert_eq!(reader.latest().cpu_percent, 42.0);
    }
}
