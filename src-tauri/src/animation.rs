use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Roughly one display refresh.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// `1 - (1 - t)^3`: fast start, soft landing.
pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinFrame {
    /// Elapsed fraction of the spin, clamped to `[0, 1]`.
    pub progress: f64,
    pub rotation: f64,
}

impl SpinFrame {
    pub fn is_last(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Host-provided frame clock. Each call resolves on the next frame with the
/// time elapsed since the spin started.
pub trait FrameTicker {
    fn next_frame(&mut self) -> impl Future<Output = Duration> + Send;
}

/// Ticks on a tokio interval at [`FRAME_INTERVAL`].
pub struct IntervalTicker {
    interval: Interval,
    started: Instant,
}

impl IntervalTicker {
    pub fn new() -> Self {
        Self::with_period(FRAME_INTERVAL)
    }

    pub fn with_period(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            started: Instant::now(),
        }
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTicker for IntervalTicker {
    fn next_frame(&mut self) -> impl Future<Output = Duration> + Send {
        async move {
            self.interval.tick().await;
            self.started.elapsed()
        }
    }
}

/// A finite forward spin from one rotation to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinAnimation {
    pub from: f64,
    pub to: f64,
    pub duration: Duration,
}

impl SpinAnimation {
    pub fn new(from: f64, to: f64, duration: Duration) -> Self {
        Self { from, to, duration }
    }

    pub fn frame_at(&self, elapsed: Duration) -> SpinFrame {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        let rotation = if progress >= 1.0 {
            self.to
        } else {
            self.from + (self.to - self.from) * ease_out_cubic(progress)
        };
        SpinFrame { progress, rotation }
    }

    /// Drives the spin frame by frame until it reaches `to`, reporting every
    /// frame. Dropping the future stops the spin where it is.
    pub async fn play<T, F>(&self, ticker: &mut T, mut on_frame: F) -> f64
    where
        T: FrameTicker,
        F: FnMut(SpinFrame),
    {
        loop {
            let elapsed = ticker.next_frame().await;
            let frame = self.frame_at(elapsed);
            on_frame(frame);
            if frame.is_last() {
                return frame.rotation;
            }
        }
    }
}
