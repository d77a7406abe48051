//! Lightweight HTTP recognizer: first line plus `Host:` header, no further
//! parsing and no state carried across TCP segments.

use crate::config;
use crate::emit::Emitter;
use crate::stats::{CounterRegistry, Tag};

fn first_line(payload: &[u8]) -> &[u8] {
    let end = payload
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(payload.len());
    &payload[..end.min(config::HTTP_LINE_CAP)]
}

/// Case-insensitive free substring search for `Host:` anywhere in the
/// payload, not anchored to the start of a `\r\n`-delimited line. Extracts
/// from the match to the next `\r\n` (or the end of the payload).
fn find_host_line(payload: &[u8]) -> Option<String> {
    const NEEDLE: &[u8] = b"host:";
    let pos = payload
        .windows(NEEDLE.len())
        .position(|w| w.eq_ignore_ascii_case(NEEDLE))?;
    let rest = &payload[pos..];
    let end = rest
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(rest.len());
    let line = &rest[..end.min(config::HTTP_LINE_CAP)];
    Some(String::from_utf8_lossy(line).into_owned())
}

pub fn decode(
    payload: &[u8],
    src_ip: &str,
    src_port: u16,
    dst_ip: &str,
    dst_port: u16,
    counters: &CounterRegistry,
    emitter: &Emitter,
) {
    counters.increment(Tag::Http);

    let line = String::from_utf8_lossy(first_line(payload)).into_owned();
    emitter.info(&format!("[HTTP] {src_ip}:{src_port} -> {dst_ip}:{dst_port} | {line}"));

    if let Some(host_line) = find_host_line(payload) {
        emitter.debug(&format!("  {host_line}"));
    }
}
