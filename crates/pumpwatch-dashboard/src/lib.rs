/*
[INPUT]:  Public API exports for the pumpwatch-dashboard crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod board;
pub mod config;
pub mod live_data;

// Re-export main types for convenience
pub use board::{BoardSettings, DashboardSnapshot, TokenBoard};
pub use config::DashboardConfig;
pub use live_data::{FeedKind, FeedStatus, LiveDataHub};
