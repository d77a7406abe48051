//! Layered protocol decoder stack.
//!
//! Each module decodes one protocol header from a borrowed byte slice,
//! bumps the counters for the layers it dispatches to, emits its record
//! through the [`crate::emit::Emitter`], and recurses into the next layer
//! with the remaining payload slice. No decoder ever indexes its input
//! slice directly; all reads go through [`crate::cursor::ByteCursor`], so
//! a short or malformed buffer surfaces as a `DecodeError` rather than a
//! panic.

pub mod arp;
pub mod dhcp;
pub mod dns;
pub mod ethernet;
pub mod http;
pub mod icmp;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod tls;
pub mod udp;

use std::time::SystemTime;

use crate::emit::Emitter;
use crate::stats::CounterRegistry;

/// A single captured frame: owned bytes plus capture metadata.
///
/// `wire_len` may exceed `data.len()` when the capture source's snaplen
/// truncated the frame before delivery.
pub struct Frame {
    pub data: Vec<u8>,
    pub wire_len: u32,
    pub timestamp: SystemTime,
}

impl Frame {
    pub fn new(data: Vec<u8>, wire_len: u32, timestamp: SystemTime) -> Self {
        Frame {
            data,
            wire_len,
            timestamp,
        }
    }
}

/// Decodes one frame end-to-end: Ethernet header, then whatever network,
/// transport and application layers its contents dispatch to.
pub fn decode_frame(frame: &Frame, counters: &CounterRegistry, emitter: &Emitter) {
    ethernet::decode(&frame.data, counters, emitter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn frame_wire_len_can_exceed_captured_length() {
        let frame = Frame::new(vec![0u8; 10], 1500, UNIX_EPOCH);
        assert_eq!(frame.data.len(), 10);
        assert_eq!(frame.wire_len, 1500);
    }
}
