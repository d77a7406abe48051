//! DHCP message decoder, including the option TLV walk.

use std::net::Ipv4Addr;

use crate::config;
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::{CounterRegistry, Tag};

const MAGIC_COOKIE: u32 = 0x6382_5363;
const FIXED_HEADER_LEN: usize = 236;

pub struct DhcpHeader {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub broadcast: bool,
    pub ciaddr: Option<Ipv4Addr>,
    pub yiaddr: Option<Ipv4Addr>,
    pub siaddr: Option<Ipv4Addr>,
    pub giaddr: Option<Ipv4Addr>,
    pub chaddr: Vec<u8>,
}

fn ipv4_or_none(bytes: &[u8]) -> Option<Ipv4Addr> {
    let mut a = [0u8; 4];
    a.copy_from_slice(bytes);
    if a == [0, 0, 0, 0] {
        None
    } else {
        Some(Ipv4Addr::from(a))
    }
}

pub fn parse_header(buf: &[u8]) -> Result<DhcpHeader, DecodeError> {
    if buf.len() < FIXED_HEADER_LEN + 4 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: FIXED_HEADER_LEN + 4,
        });
    }
    let magic = u32::from_be_bytes([buf[236], buf[237], buf[238], buf[239]]);
    if magic != MAGIC_COOKIE {
        return Err(DecodeError::InvalidLengthField {
            declared: magic as usize,
            have: MAGIC_COOKIE as usize,
        });
    }

    let op = buf[0];
    let htype = buf[1];
    let hlen = buf[2];
    let hops = buf[3];
    let xid = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let secs = u16::from_be_bytes([buf[8], buf[9]]);
    let flags = u16::from_be_bytes([buf[10], buf[11]]);
    let broadcast = flags & 0x8000 != 0;
    let ciaddr = ipv4_or_none(&buf[12..16]);
    let yiaddr = ipv4_or_none(&buf[16..20]);
    let siaddr = ipv4_or_none(&buf[20..24]);
    let giaddr = ipv4_or_none(&buf[24..28]);
    let chaddr_len = (hlen as usize).min(config::DHCP_MAX_CHADDR_LEN);
    let chaddr = buf[28..28 + chaddr_len].to_vec();

    Ok(DhcpHeader {
        op,
        htype,
        hlen,
        hops,
        xid,
        secs,
        broadcast,
        ciaddr,
        yiaddr,
        siaddr,
        giaddr,
        chaddr,
    })
}

#[derive(Default)]
pub struct DhcpOptions {
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub dns_server: Option<Ipv4Addr>,
    pub hostname: Option<String>,
    pub requested_ip: Option<Ipv4Addr>,
    pub lease_time: Option<u32>,
    pub msg_type: Option<u8>,
    pub server_id: Option<Ipv4Addr>,
}

/// Walks the option TLV area; a malformed option stops the walk and keeps
/// whatever options were already parsed.
pub fn parse_options(options: &[u8]) -> DhcpOptions {
    let mut result = DhcpOptions::default();
    let mut offset = 0usize;

    while offset < options.len() {
        let code = options[offset];
        if code == 255 {
            break;
        }
        if code == 0 {
            offset += 1;
            continue;
        }
        if offset + 1 >= options.len() {
            break;
        }
        let len = options[offset + 1] as usize;
        if offset + 2 + len > options.len() {
            break;
        }
        let value = &options[offset + 2..offset + 2 + len];

        match code {
            1 if len == 4 => {
                result.subnet_mask = Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            3 if len >= 4 => {
                result.router = Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            6 if len >= 4 => {
                result.dns_server = Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            12 if len > 0 && len < config::DHCP_MAX_HOSTNAME_LEN => {
                result.hostname = Some(String::from_utf8_lossy(value).into_owned());
            }
            50 if len == 4 => {
                result.requested_ip = Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            51 if len == 4 => {
                result.lease_time =
                    Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
            }
            53 if len == 1 && (1..=8).contains(&value[0]) => result.msg_type = Some(value[0]),
            54 if len == 4 => {
                result.server_id = Some(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            }
            _ => {}
        }

        offset += 2 + len;
    }

    result
}

fn op_name(op: u8) -> &'static str {
    match op {
        1 => "BOOTREQUEST",
        2 => "BOOTREPLY",
        _ => "UNKNOWN",
    }
}

fn msg_type_name(t: Option<u8>) -> &'static str {
    match t {
        Some(1) => "DISCOVER",
        Some(2) => "OFFER",
        Some(3) => "REQUEST",
        Some(4) => "DECLINE",
        Some(5) => "ACK",
        Some(6) => "NAK",
        Some(7) => "RELEASE",
        Some(8) => "INFORM",
        _ => "UNKNOWN",
    }
}

#[allow(clippy::too_many_arguments)]
pub fn decode(
    buf: &[u8],
    src_ip: &str,
    dst_ip: &str,
    src_port: u16,
    dst_port: u16,
    counters: &CounterRegistry,
    emitter: &Emitter,
) {
    let header = match parse_header(buf) {
        Ok(h) => h,
        Err(DecodeError::InvalidLengthField { .. }) => {
            emitter.debug("DHCP: invalid magic cookie");
            return;
        }
        Err(e) => {
            emitter.warn(&format!("DHCP: {e}"));
            return;
        }
    };

    counters.increment(Tag::Dhcp);

    let options = parse_options(&buf[240..]);

    emitter.info(&format!(
        "DHCP: {src_ip}:{src_port} -> {dst_ip}:{dst_port}, Op={}, Type={}, XID=0x{:08X}",
        op_name(header.op),
        msg_type_name(options.msg_type),
        header.xid
    ));

    emitter.debug(&format!(
        "  Hardware: Type={}, Len={}, Hops={}",
        header.htype, header.hlen, header.hops
    ));
    emitter.debug(&format!(
        "  Flags: {}",
        if header.broadcast {
            "(Broadcast)"
        } else {
            ""
        }
    ));
    emitter.debug(&format!("  Elapsed: {} seconds", header.secs));
    if !header.chaddr.is_empty() {
        let mac = header
            .chaddr
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        emitter.debug(&format!("  Client MAC: {mac}"));
    }
    if let Some(ip) = header.ciaddr {
        emitter.debug(&format!("  Client IP: {ip}"));
    }
    if let Some(ip) = header.yiaddr {
        emitter.debug(&format!("  Your IP: {ip}"));
    }
    if let Some(ip) = header.siaddr {
        emitter.debug(&format!("  Server IP: {ip}"));
    }
    if let Some(ip) = header.giaddr {
        emitter.debug(&format!("  Gateway IP: {ip}"));
    }
    if let Some(name) = &options.hostname {
        emitter.debug(&format!("  Hostname: {name}"));
    }
    if let Some(ip) = options.requested_ip {
        emitter.debug(&format!("  Requested IP: {ip}"));
    }
    if let Some(ip) = options.server_id {
        emitter.debug(&format!("  Server ID: {ip}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_dhcp(msg_type: u8, hostname: Option<&str>) -> Vec<u8> {
        let mut buf = vec![0u8; 240];
        buf[0] = 1; // BOOTREQUEST
        buf[1] = 1; // htype ethernet
        buf[2] = 6; // hlen
        buf[4..8].copy_from_slice(&0xDEADBEEFu32.to_be_bytes());
        buf[28..34].copy_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        buf[236..240].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());

        let mut options = Vec::new();
        options.push(53);
        options.push(1);
        options.push(msg_type);
        if let Some(h) = hostname {
            options.push(12);
            options.push(h.len() as u8);
            options.extend_from_slice(h.as_bytes());
        }
        options.push(255); // end
        buf.extend_from_slice(&options);
        buf
    }

    #[test]
    fn parses_header_and_validates_magic_cookie() {
        let buf = build_dhcp(3, None);
        let header = parse_header(&buf).unwrap();
        assert_eq!(header.op, 1);
        assert_eq!(header.xid, 0xDEADBEEF);
        assert_eq!(header.chaddr, vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn wrong_magic_cookie_is_rejected() {
        let mut buf = build_dhcp(3, None);
        buf[236] = 0;
        assert!(matches!(
            parse_header(&buf),
            Err(DecodeError::InvalidLengthField { .. })
        ));
    }

    #[test]
    fn option_walk_recognizes_message_type_and_hostname() {
        let buf = build_dhcp(3, Some("my-host"));
        let options = parse_options(&buf[240..]);
        assert_eq!(options.msg_type, Some(3));
        assert_eq!(options.hostname.as_deref(), Some("my-host"));
    }

    #[test]
    fn malformed_option_stops_walk_but_keeps_earlier_options() {
        let mut buf = build_dhcp(3, None);
        // Replace the terminator with a truncated option (length byte claims
        // more bytes than remain).
        let options_start = 240;
        let end_idx = buf.len() - 1;
        buf[end_idx] = 99; // bogus option code
        buf.push(250); // implausible length, out of bounds
        let options = parse_options(&buf[options_start..]);
        assert_eq!(options.msg_type, Some(3));
    }
}
