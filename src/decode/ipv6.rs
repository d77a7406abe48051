//! IPv6 header decoder and extension-header walker.

use std::net::Ipv6Addr;

use crate::config;
use crate::cursor::ByteCursor;
use crate::decode::{icmp, tcp, udp};
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::{CounterRegistry, Tag};

pub struct Ipv6Record<'a> {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub hop_limit: u8,
    pub next_header: u8,
    pub payload_len: usize,
    pub payload: &'a [u8],
}

pub fn parse(buf: &[u8]) -> Result<Ipv6Record<'_>, DecodeError> {
    if buf.len() < 40 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: 40,
        });
    }
    let mut c = ByteCursor::new(buf);
    let _ver_tc_fl = c.read_u32()?;
    let mut payload_len = c.read_u16()? as usize;
    let next_header = c.read_u8()?;
    let hop_limit = c.read_u8()?;
    let src = Ipv6Addr::from(c.read_array16()?);
    let dst = Ipv6Addr::from(c.read_array16()?);

    if payload_len > buf.len() - 40 {
        payload_len = buf.len() - 40;
    }

    Ok(Ipv6Record {
        src,
        dst,
        hop_limit,
        next_header,
        payload_len,
        payload: &c.rest()[..payload_len],
    })
}

/// Result of walking the extension-header chain: the final transport
/// protocol number and the payload slice that follows it.
pub struct ExtensionWalkResult<'a> {
    pub final_protocol: u8,
    pub payload: &'a [u8],
}

/// Walks the IPv6 extension-header chain starting right after the fixed
/// header, returning the final transport protocol and its payload.
pub fn walk_extensions<'a>(
    mut payload: &'a [u8],
    mut next_header: u8,
) -> Result<ExtensionWalkResult<'a>, DecodeError> {
    for _ in 0..config::IPV6_MAX_EXT_HEADERS {
        if matches!(next_header, 6 | 17 | 58) {
            return Ok(ExtensionWalkResult {
                final_protocol: next_header,
                payload,
            });
        }

        if payload.len() < 8 {
            return Err(DecodeError::MalformedIPv6Chain);
        }

        let hdr_ext_len = payload[1];
        let hdr_len = match next_header {
            44 => 8, // Fragment header is fixed-size.
            _ => (hdr_ext_len as usize + 1) * 8,
        };

        if hdr_len < 8 || hdr_len > payload.len() || hdr_len > config::IPV6_EXT_HDR_MAX_BYTES {
            return Err(DecodeError::MalformedIPv6Chain);
        }

        let following_next_header = payload[0];
        let remainder = &payload[hdr_len..];

        // Forward-progress invariant: the walk must strictly advance.
        if remainder.len() >= payload.len() {
            return Err(DecodeError::MalformedIPv6Chain);
        }

        next_header = following_next_header;
        payload = remainder;
    }

    Err(DecodeError::MalformedIPv6Chain)
}

pub fn decode(buf: &[u8], counters: &CounterRegistry, emitter: &Emitter) {
    let rec = match parse(buf) {
        Ok(r) => r,
        Err(e) => {
            emitter.warn(&format!("IPv6: {e}"));
            return;
        }
    };

    emitter.info(&format!(
        "IPv6: {} -> {}, HopLimit={}, NextHdr={}, PayloadLen={}",
        rec.src, rec.dst, rec.hop_limit, rec.next_header, rec.payload_len
    ));

    let walked = match walk_extensions(rec.payload, rec.next_header) {
        Ok(w) => w,
        Err(e) => {
            emitter.warn(&format!("IPv6: {e}"));
            return;
        }
    };

    let src = rec.src.to_string();
    let dst = rec.dst.to_string();
    match walked.final_protocol {
        58 => {
            counters.increment(Tag::Icmp);
            icmp::decode_v6(walked.payload, emitter);
        }
        6 => {
            counters.increment(Tag::Tcp);
            tcp::decode(walked.payload, &src, &dst, counters, emitter);
        }
        17 => {
            counters.increment(Tag::Udp);
            udp::decode(walked.payload, &src, &dst, counters, emitter);
        }
        other => {
            emitter.debug(&format!("IPv6: Unsupported transport protocol {other}"));
        }
    }
}
