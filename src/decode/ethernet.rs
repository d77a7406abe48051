//! Ethernet II frame decoder: the entry point of the decoder stack.

use crate::cursor::ByteCursor;
use crate::decode::{arp, ipv4, ipv6};
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::{CounterRegistry, Tag};

pub struct EthernetRecord<'a> {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub ethertype: u16,
    pub payload: &'a [u8],
}

pub fn parse(buf: &[u8]) -> Result<EthernetRecord<'_>, DecodeError> {
    let mut c = ByteCursor::new(buf);
    let dst_mac = c.read_array6()?;
    let src_mac = c.read_array6()?;
    let ethertype = c.read_u16()?;
    Ok(EthernetRecord {
        dst_mac,
        src_mac,
        ethertype,
        payload: c.rest(),
    })
}

pub fn format_mac(mac: [u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

pub fn decode(buf: &[u8], counters: &CounterRegistry, emitter: &Emitter) {
    let rec = match parse(buf) {
        Ok(r) => r,
        Err(e) => {
            emitter.warn(&format!("Ethernet: {e}"));
            return;
        }
    };

    counters.increment(Tag::Eth);
    emitter.info(&format!(
        "[Ethernet] Src MAC {}, Dst MAC {}, Type 0x{:04X}",
        format_mac(rec.src_mac),
        format_mac(rec.dst_mac),
        rec.ethertype
    ));

    match rec.ethertype {
        0x0800 => {
            counters.increment(Tag::IPv4);
            ipv4::decode(rec.payload, counters, emitter);
        }
        0x86DD => {
            counters.increment(Tag::IPv6);
            ipv6::decode(rec.payload, counters, emitter);
        }
        0x0806 => {
            counters.increment(Tag::Arp);
            arp::decode(rec.payload, emitter);
        }
        other => {
            emitter.debug(&format!("Ethernet: Unsupported type 0x{other:04X}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]); // dst
        buf.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]); // src
        buf.extend_from_slice(&ethertype.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn parses_header_fields_and_dispatches_payload() {
        let frame = build_frame(0x0800, &[1, 2, 3]);
        let rec = parse(&frame).unwrap();
        assert_eq!(rec.ethertype, 0x0800);
        assert_eq!(rec.src_mac, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(rec.payload, &[1, 2, 3]);
    }

    #[test]
    fn truncated_frame_under_14_bytes_errors() {
        let frame = vec![0u8; 13];
        assert!(parse(&frame).is_err());
    }

    #[test]
    fn unsupported_ethertype_bumps_only_eth_counter() {
        let counters = CounterRegistry::new();
        let emitter = Emitter::new(crate::emit::Verbosity::Debug);
        let frame = build_frame(0x9999, &[]);
        decode(&frame, &counters, &emitter);
        assert_eq!(counters.get(Tag::Eth), 1);
        assert_eq!(counters.total(), 1);
    }
}
