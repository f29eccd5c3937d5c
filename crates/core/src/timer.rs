//! Frame pacing statistics.

use std::time::{Duration, Instant};

/// Tracks CPU frame time and how long the frame loop stalled on slot fences.
///
/// A large fence stall means the CPU is running the full number of frames
/// ahead of the GPU and is being throttled by backpressure.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_frame: Option<Instant>,
    last_delta: Duration,
    last_fence_wait: Duration,
    total_fence_wait: Duration,
    frames: u64,
}

/// Snapshot of [`FrameTimer`] counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Frames started since the timer was created or reset.
    pub frames: u64,
    /// CPU time between the two most recent frame starts.
    pub last_delta: Duration,
    /// Time the most recent frame spent blocked on its slot fence.
    pub last_fence_wait: Duration,
    /// Accumulated fence stall time.
    pub total_fence_wait: Duration,
    /// Wall time since the timer was created or reset.
    pub elapsed: Duration,
}

impl FrameTimer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_frame: None,
            last_delta: Duration::ZERO,
            last_fence_wait: Duration::ZERO,
            total_fence_wait: Duration::ZERO,
            frames: 0,
        }
    }

    /// Mark the start of a frame and return the delta to the previous one.
    ///
    /// The first frame reports a zero delta.
    pub fn begin_frame(&mut self) -> Duration {
        let now = Instant::now();
        self.last_delta = self
            .last_frame
            .map_or(Duration::ZERO, |previous| now - previous);
        self.last_frame = Some(now);
        self.frames += 1;
        self.last_delta
    }

    /// Record time spent waiting on the current slot's fence.
    pub fn record_fence_wait(&mut self, waited: Duration) {
        self.last_fence_wait = waited;
        self.total_fence_wait += waited;
    }

    /// Current counters.
    pub fn stats(&self) -> FrameStats {
        FrameStats {
            frames: self.frames,
            last_delta: self.last_delta,
            last_fence_wait: self.last_fence_wait,
            total_fence_wait: self.total_fence_wait,
            elapsed: self.start.elapsed(),
        }
    }

    /// Reset all counters to the current time.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
