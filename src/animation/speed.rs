use serde::{Deserialize, Serialize};

/// Signal used to scale playback speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMetric {
    /// Play frames at their declared durations.
    Original,
    CpuPercent,
    MemoryPercent,
    TimerProgress,
}

/// One breakpoint of the speed curve: at `percent` load, play at
/// `scale_percent` of the original speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedPoint {
    pub percent: u8,
    pub scale_percent: u32,
}

/// Piecewise-linear mapping from a 0-100 metric value to a speed scale.
#[derive(Debug, Clone)]
pub struct SpeedCurve {
    default_scale_percent: f64,
    points: Vec<SpeedPoint>,
}

impl SpeedCurve {
    pub fn new(default_scale_percent: u32, mut points: Vec<SpeedPoint>) -> Self {
        points.sort_by_key(|p| p.percent);
        Self {
            default_scale_percent: default_scale_percent.max(1) as f64,
            points,
        }
    }

    /// Speed scale (in percent of original speed) for a metric value.
    pub fn scale_for_percent(&self, percent: f64) -> f64 {
        let percent = percent.clamp(0.0, 100.0);

        let Some(first) = self.points.first() else {
            return self.default_scale_percent;
        };

        if percent <= f64::from(first.percent) {
            // Interpolate from the default scale at 0% up to the first breakpoint.
            let p1 = f64::from(first.percent);
            let s1 = f64::from(first.scale_percent);
            if p1 <= 0.0 {
                return s1;
            }
            let t = percent / p1;
            return self.default_scale_percent + (s1 - self.default_scale_percent) * t;
        }

        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let (p0, p1) = (f64::from(a.percent), f64::from(b.percent));
            if percent >= p0 && percent <= p1 {
                let (s0, s1) = (f64::from(a.scale_percent), f64::from(b.scale_percent));
                if p1 <= p0 {
                    return s1;
                }
                let t = (percent - p0) / (p1 - p0);
                return s0 + (s1 - s0) * t;
            }
        }

        // Above the last breakpoint: clamp to its scale.
        f64::from(self.points[self.points.len() - 1].scale_percent)
    }

    /// Scale `base_ms` by the curve at `percent`. `None` means the metric is
    /// unavailable (idle timer, say) and the base interval is used unscaled.
    /// `min_ms` of 0 disables the lower clamp.
    pub fn scaled_interval_ms(&self, base_ms: u64, percent: Option<f64>, min_ms: u64) -> u64 {
        let base_ms = base_ms.max(1);

        let Some(percent) = percent else {
            return base_ms;
        };

        let mut scale_percent = self.scale_for_percent(percent);
        if scale_percent <= 0.0 {
            scale_percent = 100.0;
        }

        let scale = (scale_percent / 100.0).max(0.1);
        let scaled = ((base_ms as f64) / scale).round() as u64;
        let scaled = scaled.max(1);

        if min_ms > 0 {
            scaled.max(min_ms)
        } else {
            scaled
        }
    }
}
