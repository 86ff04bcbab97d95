pub mod icon;
pub mod platform;

use crate::animation::decoder::Frame;
use crate::animation::IconSink;
use crate::menu::builder::MenuDeps;
use crate::metrics::{MetricsSnapshot, SnapshotHandle, SAMPLE_INTERVAL};
use crate::timer::{CountdownTimer, TimerPhase};
use anyhow::{anyhow, Result};
use std::sync::mpsc;
use tokio::sync::broadcast;
use tray_icon::Icon;

/// State pushed at the tray by background tasks. The platform tray loop is
/// the only code that touches the actual tray handle.
pub enum TrayUpdate {
    Icon(Icon),
    Tooltip(String),
}

/// Sender half of the tray update channel. The engine pushes icons through
/// it and the tooltip task pushes text.
#[derive(Clone)]
pub struct TrayUpdateSender {
    tx: mpsc::Sender<TrayUpdate>,
}

impl TrayUpdateSender {
    pub fn send_tooltip(&self, text: String) {
        let _ = self.tx.send(TrayUpdate::Tooltip(text));
    }
}

impl IconSink for TrayUpdateSender {
    fn push_icon(&mut self, frame: &Frame) -> Result<()> {
        self.tx
            .send(TrayUpdate::Icon(frame.icon().clone()))
            .map_err(|_| anyhow!("tray update channel closed"))
    }
}

pub fn update_channel() -> (TrayUpdateSender, mpsc::Receiver<TrayUpdate>) {
    let (tx, rx) = mpsc::channel();
    (TrayUpdateSender { tx }, rx)
}

pub struct TrayManager {
    _tray: platform::PlatformTray,
}

impl TrayManager {
    pub fn new(
        deps: MenuDeps,
        shutdown_tx: broadcast::Sender<()>,
        updates: mpsc::Receiver<TrayUpdate>,
    ) -> Result<Self> {
        let icon = icon::create_logo_icon()?;
        let tray = platform::create_tray(deps, shutdown_tx, updates, icon)?;
        Ok(Self { _tray: tray })
    }
}

/// Refresh the tooltip at the sampler cadence.
pub fn spawn_tooltip_task(
    metrics: SnapshotHandle,
    timer: CountdownTimer,
    sender: TrayUpdateSender,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sender.send_tooltip(format_tooltip(&metrics.latest(), &timer));
        }
    });
}

fn format_tooltip(snapshot: &MetricsSnapshot, timer: &CountdownTimer) -> String {
    let mut text = format!(
        "CPU {:.0}%  Mem {:.0}%",
        snapshot.cpu_percent, snapshot.mem_percent
    );

    match timer.phase() {
        TimerPhase::Idle => {}
        TimerPhase::Running => {
            let remaining = timer.remaining().as_secs();
            text.push_str(&format!(
                "\nTimer: {}:{:02} left",
                remaining / 60,
                remaining % 60
            ));
        }
        TimerPhase::Paused => text.push_str("\nTimer: paused"),
        TimerPhase::Finished => text.push_str("\nTimer: done"),
    }

    text
}
