//! Three-round weighted prize lottery: ticket-weighted draws for third,
//! second and first place, a spinning wheel that lands on each pre-drawn
//! winner, and a SQLite-backed session that survives restarts.

pub mod animation;
pub mod draw;
pub mod export;
pub mod geometry;
pub mod import;
pub mod models;
pub mod rotation;
pub mod round;
pub mod settings;
pub mod store;
pub mod weighted;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
pub use commands::run;

pub use draw::{DrawSession, Lottery, RoundOutcome, Snapshot, SpinPlan};
pub use models::{Entry, LotteryState, LotteryStep, Place, Winner};
pub use round::{DrawRejected, Podium};
pub use store::{SqliteStore, StoreError};

/// Installs the fmt subscriber, filtered by `RUST_LOG`. Safe to call twice.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
