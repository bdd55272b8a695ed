use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

/// Running totals kept by the engine across its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub ticks: u64,
    pub rendered_frames: u64,
    pub skipped_frames: u64,
    pub last_command_count: usize,
    pub last_draw_calls: usize,
}

impl FrameStats {
    pub(crate) fn record(&mut self, rendered: bool) {
        self.ticks = self.ticks.saturating_add(1);
        if rendered {
            self.rendered_frames = self.rendered_frames.saturating_add(1);
        } else {
            self.skipped_frames = self.skipped_frames.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    /// Ticks per second.
    pub fps: f32,
    /// Ticks per second that actually rendered.
    pub render_fps: f32,
    pub frame_time_ms: f32,
    pub skipped_frames: u32,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    rendered: u32,
    frame_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub(crate) fn starting_at(interval_start: Instant, interval: Duration) -> Self {
        Self {
            interval_start,
            interval,
            ticks: 0,
            rendered: 0,
            frame_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, frame_dt: Duration, rendered: bool) {
        self.ticks = self.ticks.saturating_add(1);
        if rendered {
            self.rendered = self.rendered.saturating_add(1);
        }
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.ticks as f32 / elapsed_seconds,
            render_fps: self.rendered as f32 / elapsed_seconds,
            frame_time_ms,
            skipped_frames: self.ticks - self.rendered,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.rendered = 0;
        self.frame_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<LoopMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn snapshot_separates_ticks_from_rendered_frames() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));

        accumulator.record_tick(Duration::from_millis(16), true);
        accumulator.record_tick(Duration::from_millis(16), false);
        accumulator.record_tick(Duration::from_millis(16), false);
        accumulator.record_tick(Duration::from_millis(16), true);

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 4.0).abs() < 0.05);
        assert!((snapshot.render_fps - 2.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert_eq!(snapshot.skipped_frames, 2);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(16), true);

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn frame_stats_count_rendered_and_skipped_ticks() {
        let mut stats = FrameStats::default();
        stats.record(true);
        stats.record(false);
        stats.record(false);
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.rendered_frames, 1);
        assert_eq!(stats.skipped_frames, 2);
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot, LoopMetricsSnapshot::default());
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let expected = LoopMetricsSnapshot {
            fps: 60.0,
            render_fps: 15.0,
            frame_time_ms: 11.0,
            skipped_frames: 45,
        };
        handle.publish(expected);

        assert_eq!(handle.snapshot(), expected);
    }
}
