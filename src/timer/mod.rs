use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Finished,
}

#[derive(Debug)]
struct TimerState {
    phase: TimerPhase,
    total: Duration,
    banked: Duration,
    started_at: Option<Instant>,
}

/// Shared countdown timer. Cheap to clone; all clones see the same state.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    inner: Arc<RwLock<TimerState>>,
}

impl CountdownTimer {
    pub fn new(total: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TimerState {
                phase: TimerPhase::Idle,
                total,
                banked: Duration::ZERO,
                started_at: None,
            })),
        }
    }

    pub fn start(&self) {
        if let Ok(mut state) = self.inner.write() {
            match state.phase {
                TimerPhase::Running => {}
                TimerPhase::Idle | TimerPhase::Finished => {
                    state.banked = Duration::ZERO;
                    state.started_at = Some(Instant::now());
                    state.phase = TimerPhase::Running;
                }
                TimerPhase::Paused => {
                    state.started_at = Some(Instant::now());
                    state.phase = TimerPhase::Running;
                }
            }
        }
    }

    pub fn pause(&self) {
        if let Ok(mut state) = self.inner.write() {
            if state.phase == TimerPhase::Running {
                state.banked = Self::total_elapsed(&state);
                state.started_at = None;
                state.phase = TimerPhase::Paused;
            }
        }
    }

    pub fn reset(&self) {
        if let Ok(mut state) = self.inner.write() {
            state.phase = TimerPhase::Idle;
            state.banked = Duration::ZERO;
            state.started_at = None;
        }
    }

    pub fn set_total(&self, total: Duration) {
        if let Ok(mut state) = self.inner.write() {
            state.total = total;
        }
    }

    fn total_elapsed(state: &TimerState) -> Duration {
        let running = state
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);
        state.banked + running
    }

    pub fn elapsed(&self) -> Duration {
        self.inner
            .read()
            .map(|state| Self::total_elapsed(&state).min(state.total))
            .unwrap_or(Duration::ZERO)
    }

    pub fn remaining(&self) -> Duration {
        self.inner
            .read()
            .map(|state| state.total.saturating_sub(Self::total_elapsed(&state)))
            .unwrap_or(Duration::ZERO)
    }

    pub fn phase(&self) -> TimerPhase {
        self.inner
            .read()
            .map(|state| {
                if state.phase == TimerPhase::Running
                    && Self::total_elapsed(&state) >= state.total
                {
                    TimerPhase::Finished
                } else {
                    state.phase
                }
            })
            .unwrap_or(TimerPhase::Idle)
    }

    /// Completion as 0-100, or `None` while the timer is idle (there is no
    /// meaningful progress to scale anything by then).
    pub fn progress_percent(&self) -> Option<f64> {
        self.inner.read().ok().and_then(|state| {
            if state.phase == TimerPhase::Idle || state.total.is_zero() {
                return None;
            }
            let elapsed = Self::total_elapsed(&state).as_secs_f64();
            let total = state.total.as_secs_f64();
            Some((elapsed / total * 100.0).clamp(0.0, 100.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timer_has_no_progress() {
        let timer = CountdownTimer::new(Duration::from_secs(60));

        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert_eq!(timer.progress_percent(), None);
        assert_eq!(timer.remaining(), Duration::from_secs(60));
    }

    #[test]
    fn started_timer_reports_progress() {
        let timer = CountdownTimer::new(Duration::from_secs(60));

        timer.start();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(timer.phase(), TimerPhase::Running);
        let progress = timer.progress_percent().unwrap();
        assert!(progress > 0.0 && progress < 100.0, "progress: {}", progress);
        assert!(timer.remaining() < Duration::from_secs(60));
    }

    #[test]
    fn pause_freezes_elapsed_time() {
        let timer = CountdownTimer::new(Duration::from_secs(60));

        timer.start();
        std::thread::sleep(Duration::from_millis(20));
        timer.pause();

        let frozen = timer.elapsed();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(timer.phase(), TimerPhase::Paused);
        assert_eq!(timer.elapsed(), frozen);
    }

    #[test]
    fn reset_returns_to_idle() {
        let timer = CountdownTimer::new(Duration::from_secs(60));

        timer.start();
        timer.reset();

        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert_eq!(timer.progress_percent(), None);
    }

    #[test]
    fn short_timer_finishes() {
        let timer = CountdownTimer::new(Duration::from_millis(10));

        timer.start();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(timer.phase(), TimerPhase::Finished);
        assert_eq!(timer.progress_percent(), Some(100.0));
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn clones_share_state() {
        let timer = CountdownTimer::new(Duration::from_secs(60));
        let clone = timer.clone();

        timer.start();

        assert_eq!(clone.phase(), TimerPhase::Running);
    }
}
