//! Capture source: enumerates interfaces and polls `pcap` for frames,
//! copying bytes into an owned [`Frame`] before they leave this module.
//!
//! `pcap::Capture::next_packet` already returns roughly every
//! `CAPTURE_TIMEOUT_MS` milliseconds on an idle interface, so a shared
//! `AtomicBool` stop flag checked after each poll gives prompt, race-free
//! shutdown without needing the capture library's breakloop FFI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use pcap::{Capture, Device};
use tracing::{debug, info, warn};

use crate::config;
use crate::error::CaptureError;
use crate::queue::CaptureQueue;

/// One enumerable capture interface.
pub struct Interface {
    pub name: String,
    pub description: Option<String>,
}

pub fn list_interfaces() -> Result<Vec<Interface>, CaptureError> {
    let devices = Device::list().map_err(|e| CaptureError::CaptureOpenFailed(e.to_string()))?;
    Ok(devices
        .into_iter()
        .map(|d| Interface {
            name: d.name,
            description: d.desc,
        })
        .collect())
}

pub struct CaptureHandle {
    capture: Capture<pcap::Active>,
}

pub fn open(device_name: &str) -> Result<CaptureHandle, CaptureError> {
    let device = Device::list()
        .map_err(|e| CaptureError::CaptureOpenFailed(e.to_string()))?
        .into_iter()
        .find(|d| d.name == device_name)
        .ok_or_else(|| CaptureError::InvalidSelection(device_name.to_string()))?;

    let capture = Capture::from_device(device)
        .map_err(|e| CaptureError::CaptureOpenFailed(e.to_string()))?
        .snaplen(config::SNAPLEN)
        .timeout(config::CAPTURE_TIMEOUT_MS)
        .promisc(true)
        .open()
        .map_err(|e| CaptureError::CaptureOpenFailed(e.to_string()))?;

    Ok(CaptureHandle { capture })
}

/// Runs the capture loop on the calling thread, pushing frames onto `queue`
/// until `stop` is set. Intended to be the body of the dedicated capture
/// thread spawned by the pipeline supervisor.
pub fn run(mut handle: CaptureHandle, queue: Arc<CaptureQueue>, stop: Arc<AtomicBool>) {
    info!("capture thread started");
    while !stop.load(Ordering::SeqCst) {
        match handle.capture.next_packet() {
            Ok(packet) => {
                let wire_len = packet.header.len;
                let timestamp = UNIX_EPOCH
                    + Duration::new(
                        packet.header.ts.tv_sec as u64,
                        (packet.header.ts.tv_usec as u32).saturating_mul(1000),
                    );
                queue.push(wire_len, timestamp, packet.data);
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                warn!("capture error, stopping capture thread: {e}");
                break;
            }
        }
    }
    debug!("capture thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn queue_push_copies_the_callers_slice_independent_of_the_original_buffer() {
        let queue = CaptureQueue::new(1);
        let mut original = vec![1u8, 2, 3];
        assert!(queue.push(3, UNIX_EPOCH, &original));
        original[0] = 0xFF;
        let frame = queue.pop(|| false).unwrap();
        assert_eq!(frame.data, vec![1, 2, 3]);
    }

    #[test]
    fn queue_push_rejects_a_full_queue_without_growing_depth() {
        let queue = CaptureQueue::new(1);
        assert!(queue.push(3, UNIX_EPOCH, &[1, 2, 3]));
        assert!(!queue.push(3, UNIX_EPOCH, &[4, 5, 6]));
        assert_eq!(queue.depth(), 1);
    }
}
