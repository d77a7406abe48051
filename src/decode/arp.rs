//! ARP (Ethernet/IPv4) decoder.

use std::net::Ipv4Addr;

use crate::cursor::ByteCursor;
use crate::decode::ethernet::format_mac;
use crate::emit::Emitter;
use crate::error::DecodeError;

pub struct ArpRecord {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_size: u8,
    pub protocol_size: u8,
    pub operation: u16,
    pub sender_mac: [u8; 6],
    pub sender_ip: Ipv4Addr,
    pub target_mac: [u8; 6],
    pub target_ip: Ipv4Addr,
}

pub fn parse(buf: &[u8]) -> Result<ArpRecord, DecodeError> {
    if buf.len() < 28 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: 28,
        });
    }
    let mut c = ByteCursor::new(buf);
    let hardware_type = c.read_u16()?;
    let protocol_type = c.read_u16()?;
    let hardware_size = c.read_u8()?;
    let protocol_size = c.read_u8()?;
    let operation = c.read_u16()?;
    let sender_mac = c.read_array6()?;
    let sender_ip = Ipv4Addr::from(c.read_array4()?);
    let target_mac = c.read_array6()?;
    let target_ip = Ipv4Addr::from(c.read_array4()?);

    if hardware_type != 1 {
        return Err(DecodeError::UnsupportedProtocol {
            value: hardware_type as u8,
        });
    }
    if protocol_type != 0x0800 {
        return Err(DecodeError::UnsupportedEtherType {
            value: protocol_type,
        });
    }

    Ok(ArpRecord {
        hardware_type,
        protocol_type,
        hardware_size,
        protocol_size,
        operation,
        sender_mac,
        sender_ip,
        target_mac,
        target_ip,
    })
}

fn op_name(op: u16) -> &'static str {
    match op {
        1 => "ARP Request",
        2 => "ARP Reply",
        3 => "RARP Request",
        4 => "RARP Reply",
        _ => "Unknown",
    }
}

pub fn decode(buf: &[u8], emitter: &Emitter) {
    let rec = match parse(buf) {
        Ok(r) => r,
        Err(DecodeError::UnsupportedProtocol { value }) => {
            emitter.debug(&format!("ARP: Unsupported hardware type {value}"));
            return;
        }
        Err(DecodeError::UnsupportedEtherType { value }) => {
            emitter.debug(&format!("ARP: Unsupported protocol type 0x{value:04X}"));
            return;
        }
        Err(e) => {
            emitter.warn(&format!("ARP: {e}"));
            return;
        }
    };

    let op = rec.operation;
    emitter.info(&format!("ARP: {}", op_name(op)));
    emitter.info(&format!(
        "     Sender: {} ({})",
        rec.sender_ip,
        format_mac(rec.sender_mac)
    ));
    if op == 1 {
        emitter.info(&format!("     Target: {} (Broadcast)", rec.target_ip));
    } else {
        emitter.info(&format!(
            "     Target: {} ({})",
            rec.target_ip,
            format_mac(rec.target_mac)
        ));
    }
    emitter.debug(&format!(
        "     Hardware Type: Ethernet (0x{:04X})",
        rec.hardware_type
    ));
    emitter.debug(&format!(
        "     Protocol Type: IPv4 (0x{:04X})",
        rec.protocol_type
    ));
    emitter.debug(&format!("     Hardware Size: {} bytes", rec.hardware_size));
    emitter.debug(&format!("     Protocol Size: {} bytes", rec.protocol_size));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_arp(op: u16, sender_ip: [u8; 4], target_ip: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes()); // hardware type ethernet
        buf.extend_from_slice(&0x0800u16.to_be_bytes()); // protocol type IPv4
        buf.push(6);
        buf.push(4);
        buf.extend_from_slice(&op.to_be_bytes());
        buf.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        buf.extend_from_slice(&sender_ip);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        buf.extend_from_slice(&target_ip);
        buf
    }

    #[test]
    fn request_decodes_sender_and_target_addresses() {
        let buf = build_arp(1, [192, 168, 1, 1], [192, 168, 1, 2]);
        let rec = parse(&buf).unwrap();
        assert_eq!(rec.sender_ip, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(rec.sender_mac, [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(op_name(rec.operation), "ARP Request");
    }

    #[test]
    fn unsupported_hardware_type_is_rejected_not_erred_loudly() {
        let mut buf = build_arp(1, [1, 2, 3, 4], [5, 6, 7, 8]);
        buf[0..2].copy_from_slice(&6u16.to_be_bytes());
        assert!(matches!(
            parse(&buf),
            Err(DecodeError::UnsupportedProtocol { .. })
        ));
    }

    #[test]
    fn truncated_arp_payload_errors() {
        let buf = vec![0u8; 20];
        assert!(parse(&buf).is_err());
    }
}
