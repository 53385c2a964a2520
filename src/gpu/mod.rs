//! Emulated compute device.
//!
//! Kernels run on the CPU through rayon, but the device keeps the same
//! contract a graphics queue would: every dispatch and binding is counted and
//! readbacks only complete after a configurable number of frames.

pub mod arena;
pub mod readback;

pub use arena::{BufferPool, PooledBuffer};
pub use readback::{Readback, ReadbackStatus};

use tracing::{trace, warn};

use crate::config::TerrainInfo;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    pub dispatches: u64,
    pub bindings: u64,
    pub readbacks: u64,
    pub failed_readbacks: u64,
}

pub struct Device {
    frame: u64,
    readback_latency: u32,
    injected_failures: u32,
    stats: DeviceStats,
}

impl Device {
    pub fn new(info: &TerrainInfo) -> Self {
        Self {
            frame: 0,
            readback_latency: info.readback_latency,
            injected_failures: 0,
            stats: DeviceStats::default(),
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn advance_frame(&mut self) {
        self.frame += 1;
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Records that chunk buffers were (re)bound to a kernel.
    pub fn bind(&mut self, kernel: &'static str) {
        self.stats.bindings += 1;
        trace!("Binding buffers to {}", kernel);
    }

    /// Runs a kernel and counts it as one dispatch.
    pub fn dispatch<R>(&mut self, kernel: &'static str, body: impl FnOnce() -> R) -> R {
        self.stats.dispatches += 1;
        trace!("Dispatching {} on frame {}", kernel, self.frame);
        body()
    }

    /// Makes the next `count` readback requests fail.
    pub fn inject_readback_errors(&mut self, count: u32) {
        self.injected_failures += count;
    }

    pub fn request_readback<T>(&mut self, data: T) -> Readback<T> {
        self.stats.readbacks += 1;
        let ready_at = self.frame + self.readback_latency as u64;
        if self.injected_failures > 0 {
            self.injected_failures -= 1;
            self.stats.failed_readbacks += 1;
            warn!("Readback requested on frame {} will fail", self.frame);
            return Readback::new(None, ready_at);
        }
        Readback::new(Some(data), ready_at)
    }

    /// Blocks until `readback` completes. Returns `None` if it failed.
    pub fn wait<T>(&mut self, readback: Readback<T>) -> Option<T> {
        if self.frame < readback.ready_at() {
            self.frame = readback.ready_at();
        }
        readback.into_payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readbacks_complete_after_latency() {
        let info = TerrainInfo {
            readback_latency: 2,
            ..Default::default()
        };
        let mut device = Device::new(&info);
        let readback = device.request_readback(vec![1u32, 2, 3]);
        assert_eq!(readback.status(device.frame()), ReadbackStatus::Pending);
        device.advance_frame();
        assert!(!readback.is_complete(device.frame()));
        device.advance_frame();
        assert_eq!(readback.data(device.frame()), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn injected_failures_are_consumed_in_order() {
        let mut device = Device::new(&TerrainInfo::default());
        device.inject_readback_errors(1);
        let failed = device.request_readback(1u8);
        let ok = device.request_readback(2u8);
        device.advance_frame();
        assert_eq!(failed.status(device.frame()), ReadbackStatus::Failed);
        assert_eq!(ok.status(device.frame()), ReadbackStatus::Done);
        assert_eq!(device.stats().failed_readbacks, 1);
    }

    #[test]
    fn wait_fast_forwards_the_frame() {
        let mut device = Device::new(&TerrainInfo::default());
        let readback = device.request_readback(5i32);
        assert_eq!(device.wait(readback), Some(5));
        assert_eq!(device.frame(), 1);
    }
}
