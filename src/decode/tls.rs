//! TLS record-framing recognizer: five-byte record header only, no
//! handshake parsing and no SNI extraction.

use crate::cursor::ByteCursor;
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::{CounterRegistry, Tag};

pub struct TlsRecord {
    pub content_type: u8,
    pub version: u16,
    pub length: usize,
}

pub fn parse(buf: &[u8]) -> Result<TlsRecord, DecodeError> {
    if buf.len() < 5 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: 5,
        });
    }
    let mut c = ByteCursor::new(buf);
    let content_type = c.read_u8()?;
    let version = c.read_u16()?;
    let declared_len = c.read_u16()? as usize;
    let remaining = buf.len() - 5;
    let length = declared_len.min(remaining);

    Ok(TlsRecord {
        content_type,
        version,
        length,
    })
}

fn content_type_name(ct: u8) -> &'static str {
    match ct {
        20 => "ChangeCipherSpec",
        21 => "Alert",
        22 => "Handshake",
        23 => "ApplicationData",
        _ => "Unknown",
    }
}

fn version_name(v: u16) -> &'static str {
    match v {
        0x0301 => "TLS 1.0",
        0x0302 => "TLS 1.1",
        0x0303 => "TLS 1.2",
        0x0304 => "TLS 1.3",
        _ => "Unknown",
    }
}

#[allow(clippy::too_many_arguments)]
pub fn decode(
    buf: &[u8],
    src_ip: &str,
    src_port: u16,
    dst_ip: &str,
    dst_port: u16,
    counters: &CounterRegistry,
    emitter: &Emitter,
) {
    let rec = match parse(buf) {
        Ok(r) => r,
        Err(e) => {
            emitter.warn(&format!("HTTPS: {e}"));
            return;
        }
    };

    counters.increment(Tag::Https);

    emitter.info(&format!(
        "HTTPS: {}:{} -> {}:{}, TLS Record: {}, Version={}, Length={}",
        src_ip,
        src_port,
        dst_ip,
        dst_port,
        content_type_name(rec.content_type),
        version_name(rec.version),
        rec.length
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_record(ct: u8, version: u16, declared_len: u16, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![ct];
        buf.extend_from_slice(&version.to_be_bytes());
        buf.extend_from_slice(&declared_len.to_be_bytes());
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn parses_handshake_record_header() {
        let buf = build_record(22, 0x0303, 10, &[0u8; 10]);
        let rec = parse(&buf).unwrap();
        assert_eq!(rec.content_type, 22);
        assert_eq!(rec.version, 0x0303);
        assert_eq!(rec.length, 10);
        assert_eq!(content_type_name(rec.content_type), "Handshake");
        assert_eq!(version_name(rec.version), "TLS 1.2");
    }

    #[test]
    fn clamps_declared_length_to_remaining_payload() {
        let buf = build_record(23, 0x0303, 9000, &[0u8; 3]);
        let rec = parse(&buf).unwrap();
        assert_eq!(rec.length, 3);
    }

    #[test]
    fn bumps_https_counter_exactly_once() {
        let counters = CounterRegistry::new();
        let emitter = Emitter::new(crate::emit::Verbosity::Debug);
        let buf = build_record(23, 0x0304, 0, &[]);
        decode(&buf, "10.0.0.1", 50000, "93.184.216.34", 443, &counters, &emitter);
        assert_eq!(counters.get(Tag::Https), 1);
    }
}
