#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackStatus {
    Pending,
    Done,
    Failed,
}

/// Copy of device memory that becomes readable a few frames after it was
/// requested.
#[derive(Debug)]
pub struct Readback<T> {
    payload: Option<T>,
    ready_at: u64,
}

impl<T> Readback<T> {
    pub(crate) fn new(payload: Option<T>, ready_at: u64) -> Self {
        Self { payload, ready_at }
    }

    pub fn ready_at(&self) -> u64 {
        self.ready_at
    }

    pub fn status(&self, frame: u64) -> ReadbackStatus {
        if frame < self.ready_at {
            ReadbackStatus::Pending
        } else if self.payload.is_some() {
            ReadbackStatus::Done
        } else {
            ReadbackStatus::Failed
        }
    }

    pub fn is_complete(&self, frame: u64) -> bool {
        self.status(frame) != ReadbackStatus::Pending
    }

    /// Completed data, or `None` while pending or after a failure.
    pub fn data(&self, frame: u64) -> Option<&T> {
        if frame < self.ready_at {
            return None;
        }
        self.payload.as_ref()
    }

    pub(crate) fn into_payload(self) -> Option<T> {
        self.payload
    }
}
