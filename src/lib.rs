pub mod animation;
pub mod config;
pub mod menu;
pub mod metrics;
pub mod paths;
pub mod timer;
pub mod tray;
