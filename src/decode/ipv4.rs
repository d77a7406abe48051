//! IPv4 header decoder.

use std::net::Ipv4Addr;

use crate::cursor::ByteCursor;
use crate::decode::{icmp, tcp, udp};
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::{CounterRegistry, Tag};

pub struct Ipv4Record<'a> {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub ttl: u8,
    pub protocol: u8,
    pub total_length: usize,
    pub more_fragments: bool,
    pub fragment_offset: u16,
    pub payload: &'a [u8],
}

pub fn parse(buf: &[u8]) -> Result<Ipv4Record<'_>, DecodeError> {
    if buf.len() < 20 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: 20,
        });
    }
    let mut c = ByteCursor::new(buf);
    let ver_ihl = c.read_u8()?;
    let ihl = ((ver_ihl & 0x0F) as usize) * 4;
    if !(20..=buf.len()).contains(&ihl) {
        return Err(DecodeError::InvalidHeaderLength { value: ihl });
    }
    let _dscp_ecn = c.read_u8()?;
    let mut total_length = c.read_u16()? as usize;
    let _id = c.read_u16()?;
    let flags_fragment = c.read_u16()?;
    let ttl = c.read_u8()?;
    let protocol = c.read_u8()?;
    let _checksum = c.read_u16()?;
    let src = Ipv4Addr::from(c.read_array4()?);
    let dst = Ipv4Addr::from(c.read_array4()?);

    if total_length < ihl {
        return Err(DecodeError::InvalidLengthField {
            declared: total_length,
            have: buf.len(),
        });
    }
    if total_length > buf.len() {
        total_length = buf.len();
    }

    // Skip IPv4 options, if any.
    c = ByteCursor::new(buf);
    c.skip(ihl)?;
    let payload_len = total_length.saturating_sub(ihl);
    let payload = &c.rest()[..payload_len.min(c.rest().len())];

    let more_fragments = flags_fragment & 0x2000 != 0;
    let fragment_offset = (flags_fragment & 0x1FFF) * 8;

    Ok(Ipv4Record {
        src,
        dst,
        ttl,
        protocol,
        total_length,
        more_fragments,
        fragment_offset,
        payload,
    })
}

pub fn decode(buf: &[u8], counters: &CounterRegistry, emitter: &Emitter) {
    let rec = match parse(buf) {
        Ok(r) => r,
        Err(DecodeError::InvalidLengthField { declared, have }) => {
            emitter.warn(&format!(
                "IPv4: Invalid total length {declared} < IHL, have {have}"
            ));
            return;
        }
        Err(e) => {
            emitter.warn(&format!("IPv4: {e}"));
            return;
        }
    };

    let mut line = format!(
        "IPv4: {} -> {}, TTL={}, Proto={}, Len={}",
        rec.src, rec.dst, rec.ttl, rec.protocol, rec.total_length
    );
    if rec.more_fragments || rec.fragment_offset != 0 {
        line.push_str(&format!(
            "  [fragment {} offset={}]",
            if rec.more_fragments { "MF" } else { "" },
            rec.fragment_offset
        ));
    }
    emitter.info(&line);

    let src = rec.src.to_string();
    let dst = rec.dst.to_string();
    match rec.protocol {
        1 => {
            counters.increment(Tag::Icmp);
            icmp::decode_v4(rec.payload, emitter);
        }
        6 => {
            counters.increment(Tag::Tcp);
            tcp::decode(rec.payload, &src, &dst, counters, emitter);
        }
        17 => {
            counters.increment(Tag::Udp);
            udp::decode(rec.payload, &src, &dst, counters, emitter);
        }
        other => {
            emitter.debug(&format!("IPv4: Unsupported protocol {other}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ipv4(protocol: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 20];
        buf[0] = 0x45; // version 4, IHL 5
        let total_len = (20 + payload.len()) as u16;
        buf[2..4].copy_from_slice(&total_len.to_be_bytes());
        buf[8] = 64; // ttl
        buf[9] = protocol;
        buf[12..16].copy_from_slice(&[192, 168, 1, 10]);
        buf[16..20].copy_from_slice(&[192, 168, 1, 20]);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn parses_addresses_ttl_and_protocol() {
        let buf = build_ipv4(6, &[]);
        let rec = parse(&buf).unwrap();
        assert_eq!(rec.src, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(rec.dst, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(rec.ttl, 64);
        assert_eq!(rec.protocol, 6);
    }

    #[test]
    fn clamps_total_length_to_captured_size_instead_of_rejecting() {
        let mut buf = build_ipv4(17, &[1, 2, 3, 4]);
        // Declare a total length far larger than what was actually captured.
        buf[2..4].copy_from_slice(&2000u16.to_be_bytes());
        let rec = parse(&buf).unwrap();
        assert_eq!(rec.total_length, buf.len());
    }

    #[test]
    fn invalid_ihl_is_rejected() {
        let mut buf = build_ipv4(6, &[]);
        buf[0] = 0x41; // IHL = 1 word = 4 bytes, below the 20-byte minimum
        assert!(matches!(
            parse(&buf),
            Err(DecodeError::InvalidHeaderLength { .. })
        ));
    }

    #[test]
    fn fragment_flags_are_decoded() {
        let mut buf = build_ipv4(6, &[]);
        // MF set, fragment offset = 5 (in 8-byte units) -> 40 bytes
        buf[6..8].copy_from_slice(&(0x2000u16 | 5).to_be_bytes());
        let rec = parse(&buf).unwrap();
        assert!(rec.more_fragments);
        assert_eq!(rec.fragment_offset, 40);
    }
}
