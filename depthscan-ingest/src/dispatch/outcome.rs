use std::fmt;

/// What happened to one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Frame `id` was handed to the callback.
    Dispatched { id: u64 },
    /// Frame `id` exceeded the quota and fired the completion signal.
    Finished { id: u64 },
    /// The notification produced no dispatch.
    Dropped(DropReason),
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched { .. })
    }
}

/// Why a notification was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The sample was gone before it could be acquired.
    MissingReference,
    /// Depth or color data was missing from the sample.
    AcquisitionFailed,
    /// The driver failed or panicked while the sample was read.
    Fault(String),
    /// The quota was already reached.
    Finished,
    /// The dispatcher was shut down before the frame could be queued.
    Shutdown,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingReference => write!(f, "no frame reference"),
            Self::AcquisitionFailed => write!(f, "frame data could not be acquired"),
            Self::Fault(message) => write!(f, "fault: {}", message),
            Self::Finished => write!(f, "scan already finished"),
            Self::Shutdown => write!(f, "dispatcher shut down"),
        }
    }
}
