//! Frame phases.

use std::fmt;

/// Where the orchestrator is within the frame loop.
///
/// ```text
/// Idle -> Acquired -> Recording -> Submitted -> Presented -> Acquired ...
///   \
///    -> OutOfFrame -> Idle
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// No frame has been started, or out-of-frame work was just submitted.
    #[default]
    Idle,
    /// Recording into the out-of-frame slot.
    OutOfFrame,
    /// A swapchain image has been acquired for the current slot.
    Acquired,
    /// At least one command buffer has been opened this frame.
    Recording,
    /// The frame's work has been submitted with its fence.
    Submitted,
    /// The frame has been queued for presentation.
    Presented,
}

impl FramePhase {
    /// Whether a new frame or out-of-frame recording may begin.
    #[inline]
    pub fn is_between_frames(self) -> bool {
        matches!(self, Self::Idle | Self::Presented)
    }

    /// Whether command buffers may be opened or submitted without sync.
    #[inline]
    pub fn accepts_recording(self) -> bool {
        matches!(self, Self::OutOfFrame | Self::Acquired | Self::Recording)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::OutOfFrame => "out of frame",
            Self::Acquired => "acquired",
            Self::Recording => "recording",
            Self::Submitted => "submitted",
            Self::Presented => "presented",
        }
    }
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
