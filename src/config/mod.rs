use crate::animation::speed::{SpeedMetric, SpeedPoint};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BASE_INTERVAL_MS: u64 = 150;
pub const DEFAULT_POMODORO_MINUTES: u64 = 25;

/// Persisted user settings. Unknown keys are ignored so older files keep
/// loading after upgrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Animation identifier: a reserved token or a name under the animations dir.
    pub animation: String,
    pub base_interval_ms: u64,
    /// Lower bound for the scaled playback interval. 0 disables the clamp.
    pub min_interval_ms: u64,
    pub speed_metric: SpeedMetric,
    /// Scale percent applied when no breakpoints are configured.
    pub speed_default_scale: u32,
    pub speed_points: Vec<SpeedPoint>,
    /// Two or three "#RRGGBB" gradient stops for percent gauge icons.
    pub percent_colors: Vec<String>,
    pub pomodoro_minutes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            animation: "__logo__".to_string(),
            base_interval_ms: DEFAULT_BASE_INTERVAL_MS,
            min_interval_ms: 0,
            speed_metric: SpeedMetric::MemoryPercent,
            speed_default_scale: 100,
            speed_points: vec![],
            percent_colors: vec![
                "#3FB950".to_string(),
                "#D29922".to_string(),
                "#F85149".to_string(),
            ],
            pomodoro_minutes: DEFAULT_POMODORO_MINUTES,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parsed color stops, falling back to the defaults when fewer than two
    /// entries parse cleanly.
    pub fn color_stops(&self) -> Vec<[u8; 3]> {
        let parsed: Vec<[u8; 3]> = self
            .percent_colors
            .iter()
            .filter_map(|s| parse_color(s))
            .collect();

        if parsed.len() >= 2 {
            parsed
        } else {
            Settings::default()
                .percent_colors
                .iter()
                .filter_map(|s| parse_color(s))
                .collect()
        }
    }

    pub fn base_interval(&self) -> u64 {
        if self.base_interval_ms == 0 {
            DEFAULT_BASE_INTERVAL_MS
        } else {
            self.base_interval_ms
        }
    }
}

/// Parse "#RRGGBB" into RGB bytes.
pub fn parse_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
