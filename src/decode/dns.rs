//! DNS message decoder, including name-compression pointer handling.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::config;
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::{CounterRegistry, Tag};

pub struct DnsHeader {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub ad: bool,
    pub cd: bool,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

fn read_u16_at(msg: &[u8], pos: usize) -> Result<u16, DecodeError> {
    if pos + 2 > msg.len() {
        return Err(DecodeError::Truncated {
            have: msg.len().saturating_sub(pos),
            need: 2,
        });
    }
    Ok(u16::from_be_bytes([msg[pos], msg[pos + 1]]))
}

fn read_u32_at(msg: &[u8], pos: usize) -> Result<u32, DecodeError> {
    if pos + 4 > msg.len() {
        return Err(DecodeError::Truncated {
            have: msg.len().saturating_sub(pos),
            need: 4,
        });
    }
    Ok(u32::from_be_bytes([
        msg[pos],
        msg[pos + 1],
        msg[pos + 2],
        msg[pos + 3],
    ]))
}

pub fn parse_header(msg: &[u8]) -> Result<DnsHeader, DecodeError> {
    if msg.len() < 12 {
        return Err(DecodeError::Truncated {
            have: msg.len(),
            need: 12,
        });
    }
    let id = read_u16_at(msg, 0)?;
    let flags = read_u16_at(msg, 2)?;
    Ok(DnsHeader {
        id,
        qr: flags & 0x8000 != 0,
        opcode: ((flags >> 11) & 0x0F) as u8,
        aa: flags & 0x0400 != 0,
        tc: flags & 0x0200 != 0,
        rd: flags & 0x0100 != 0,
        ra: flags & 0x0080 != 0,
        ad: flags & 0x0020 != 0,
        cd: flags & 0x0010 != 0,
        rcode: (flags & 0x000F) as u8,
        qdcount: read_u16_at(msg, 4)?,
        ancount: read_u16_at(msg, 6)?,
        nscount: read_u16_at(msg, 8)?,
        arcount: read_u16_at(msg, 10)?,
    })
}

/// Decodes a possibly-compressed name starting at `pos` within the whole
/// DNS message. Returns the decoded name and the position just past the
/// first pointer encountered (or past the final label if uncompressed) —
/// not past the ultimate target of any followed pointer.
pub fn read_name(msg: &[u8], mut pos: usize) -> Result<(String, usize), DecodeError> {
    let mut labels: Vec<String> = Vec::new();
    let mut post_pointer_pos: Option<usize> = None;
    let mut hops: u32 = 0;

    loop {
        if pos >= msg.len() {
            return Err(DecodeError::Truncated {
                have: 0,
                need: 1,
            });
        }
        let len_byte = msg[pos];

        if len_byte == 0 {
            pos += 1;
            if post_pointer_pos.is_none() {
                post_pointer_pos = Some(pos);
            }
            break;
        }

        if len_byte & 0xC0 == 0xC0 {
            let b2 = *msg.get(pos + 1).ok_or(DecodeError::Truncated {
                have: msg.len() - pos,
                need: 2,
            })?;
            let target = (((len_byte & 0x3F) as usize) << 8) | b2 as usize;
            if post_pointer_pos.is_none() {
                post_pointer_pos = Some(pos + 2);
            }
            if target < 12 || target >= msg.len() || target == pos {
                return Err(DecodeError::MalformedName);
            }
            hops += 1;
            if hops > config::DNS_MAX_POINTER_HOPS {
                return Err(DecodeError::MalformedName);
            }
            pos = target;
            continue;
        }

        let label_len = len_byte as usize;
        if label_len > config::DNS_MAX_LABEL_LEN as usize {
            return Err(DecodeError::MalformedName);
        }
        if pos + 1 + label_len > msg.len() {
            return Err(DecodeError::Truncated {
                have: msg.len() - pos - 1,
                need: label_len,
            });
        }
        labels.push(String::from_utf8_lossy(&msg[pos + 1..pos + 1 + label_len]).into_owned());
        pos += 1 + label_len;
    }

    Ok((labels.join("."), post_pointer_pos.unwrap_or(pos)))
}

pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

fn read_question(msg: &[u8], pos: usize) -> Result<(Question, usize), DecodeError> {
    let (name, pos) = read_name(msg, pos)?;
    let qtype = read_u16_at(msg, pos)?;
    let qclass = read_u16_at(msg, pos + 2)?;
    Ok((
        Question {
            name,
            qtype,
            qclass,
        },
        pos + 4,
    ))
}

pub struct ResourceRecord {
    pub name: String,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdlength: u16,
    pub rdata_rendered: String,
}

fn rtype_name(rtype: u16) -> &'static str {
    match rtype {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        12 => "PTR",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        _ => "OTHER",
    }
}

fn render_rdata(msg: &[u8], rtype: u16, rdata_start: usize, rdlength: usize) -> String {
    let rdata = &msg[rdata_start..rdata_start + rdlength];
    match rtype {
        1 if rdlength == 4 => {
            let mut a = [0u8; 4];
            a.copy_from_slice(rdata);
            Ipv4Addr::from(a).to_string()
        }
        28 if rdlength == 16 => {
            let mut a = [0u8; 16];
            a.copy_from_slice(rdata);
            Ipv6Addr::from(a).to_string()
        }
        5 | 2 | 12 => read_name(msg, rdata_start)
            .map(|(n, _)| n)
            .unwrap_or_else(|_| "<malformed name>".to_string()),
        15 if rdlength >= 2 => {
            let pref = read_u16_at(msg, rdata_start).unwrap_or(0);
            let name = read_name(msg, rdata_start + 2)
                .map(|(n, _)| n)
                .unwrap_or_else(|_| "<malformed name>".to_string());
            format!("preference={pref} exchange={name}")
        }
        16 => {
            let mut strings = Vec::new();
            let mut i = 0;
            while i < rdata.len() {
                let len = rdata[i] as usize;
                if i + 1 + len > rdata.len() {
                    break;
                }
                strings.push(String::from_utf8_lossy(&rdata[i + 1..i + 1 + len]).into_owned());
                i += 1 + len;
            }
            strings.join(",")
        }
        _ => format!("Type={rtype}, rdlength={rdlength}"),
    }
}

fn read_rr(msg: &[u8], pos: usize) -> Result<(ResourceRecord, usize), DecodeError> {
    let (name, pos) = read_name(msg, pos)?;
    let rtype = read_u16_at(msg, pos)?;
    let rclass = read_u16_at(msg, pos + 2)?;
    let ttl = read_u32_at(msg, pos + 4)?;
    let rdlength = read_u16_at(msg, pos + 8)? as usize;
    let rdata_start = pos + 10;
    if rdata_start + rdlength > msg.len() {
        return Err(DecodeError::Truncated {
            have: msg.len() - rdata_start,
            need: rdlength,
        });
    }
    let rdata_rendered = render_rdata(msg, rtype, rdata_start, rdlength);
    Ok((
        ResourceRecord {
            name,
            rtype,
            rclass,
            ttl,
            rdlength: rdlength as u16,
            rdata_rendered,
        },
        rdata_start + rdlength,
    ))
}

pub fn decode(buf: &[u8], counters: &CounterRegistry, emitter: &Emitter) {
    counters.increment(Tag::Dns);

    let header = match parse_header(buf) {
        Ok(h) => h,
        Err(e) => {
            emitter.warn(&format!("DNS: {e}"));
            return;
        }
    };

    emitter.info(&format!(
        "DNS: {} (ID=0x{:04X})",
        if header.qr { "Response" } else { "Query" },
        header.id
    ));

    let mut flags = Vec::new();
    if header.aa {
        flags.push("AA");
    }
    if header.tc {
        flags.push("TC");
    }
    if header.rd {
        flags.push("RD");
    }
    if header.ra {
        flags.push("RA");
    }
    if header.ad {
        flags.push("AD");
    }
    if header.cd {
        flags.push("CD");
    }
    emitter.info(&format!("Flags: {}", flags.join(" ")));
    emitter.info(&format!(
        "Questions: {}, Answers: {}, Authority: {}, Additional: {}",
        header.qdcount, header.ancount, header.nscount, header.arcount
    ));

    let mut pos = 12;
    for _ in 0..header.qdcount {
        match read_question(buf, pos) {
            Ok((q, new_pos)) => {
                emitter.info(&format!(
                    "  Question: {} (Type={}, Class={})",
                    q.name, q.qtype, q.qclass
                ));
                pos = new_pos;
            }
            Err(e) => {
                emitter.warn(&format!("DNS: {e}"));
                return;
            }
        }
    }

    for _ in 0..header.ancount {
        match read_rr(buf, pos) {
            Ok((rr, new_pos)) => {
                emitter.info(&format!(
                    "  Answer: {} (Type={}, Class={}, TTL={}) {}",
                    rr.name, rr.rtype, rr.rclass, rr.ttl, rr.rdata_rendered
                ));
                emitter.debug(&format!(
                    "    rdata: type={} class={} rdlength={} value={}",
                    rtype_name(rr.rtype),
                    rr.rclass,
                    rr.rdlength,
                    rr.rdata_rendered
                ));
                pos = new_pos;
            }
            Err(e) => {
                emitter.warn(&format!("DNS: {e}"));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_com_query() -> Vec<u8> {
        let mut buf = vec![0u8; 12];
        buf[0..2].copy_from_slice(&0x1234u16.to_be_bytes());
        buf[2..4].copy_from_slice(&0x0100u16.to_be_bytes()); // RD set
        buf[4..6].copy_from_slice(&1u16.to_be_bytes()); // qdcount
        // QNAME: example.com
        buf.extend_from_slice(&[7]);
        buf.extend_from_slice(b"example");
        buf.extend_from_slice(&[3]);
        buf.extend_from_slice(b"com");
        buf.push(0);
        buf.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
        buf.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
        buf
    }

    #[test]
    fn parses_header_flags_and_question() {
        let buf = example_com_query();
        let header = parse_header(&buf).unwrap();
        assert_eq!(header.id, 0x1234);
        assert!(!header.qr);
        assert!(header.rd);
        assert_eq!(header.qdcount, 1);

        let (q, _) = read_question(&buf, 12).unwrap();
        assert_eq!(q.name, "example.com");
        assert_eq!(q.qtype, 1);
        assert_eq!(q.qclass, 1);
    }

    #[test]
    fn compressed_answer_name_decodes_and_stops_after_the_pointer() {
        let mut buf = example_com_query();
        let question_name_offset = 12u16;
        let answer_start = buf.len();
        // Pointer back to the question's NAME at offset 12.
        buf.extend_from_slice(&(0xC000 | question_name_offset).to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes()); // TYPE A
        buf.extend_from_slice(&1u16.to_be_bytes()); // CLASS IN
        buf.extend_from_slice(&300u32.to_be_bytes()); // TTL
        buf.extend_from_slice(&4u16.to_be_bytes()); // RDLENGTH
        buf.extend_from_slice(&[93, 184, 216, 34]); // rdata: an IPv4 address

        let (rr, new_pos) = read_rr(&buf, answer_start).unwrap();
        assert_eq!(rr.name, "example.com");
        assert_eq!(rr.rdata_rendered, "93.184.216.34");
        // Cursor should sit right after the 2-byte pointer, not after "com".
        assert_eq!(new_pos, answer_start + 2 + 2 + 2 + 4 + 2 + 4);
    }

    #[test]
    fn self_loop_pointer_yields_malformed_name() {
        let mut buf = vec![0u8; 12];
        let pointer_pos = buf.len() as u16;
        // A pointer whose target equals its own offset.
        buf.extend_from_slice(&(0xC000 | pointer_pos).to_be_bytes());
        let err = read_name(&buf, pointer_pos as usize).unwrap_err();
        assert_eq!(err, DecodeError::MalformedName);
    }

    #[test]
    fn pointer_chain_longer_than_16_hops_is_rejected() {
        // Build a message where offset 12 is a pointer to 14, 14 points to
        // 16, and so on, 20 hops deep, never reaching a terminator.
        let mut buf = vec![0u8; 12];
        for i in 0..20u16 {
            let next = 12 + (i + 1) * 2;
            buf.extend_from_slice(&(0xC000 | next).to_be_bytes());
        }
        let err = read_name(&buf, 12).unwrap_err();
        assert_eq!(err, DecodeError::MalformedName);
    }

    #[test]
    fn debug_verbosity_emits_per_answer_rdata_detail() {
        use crate::emit::{Emitter, SharedBuf, Verbosity};
        use std::sync::{Arc, Mutex};

        let mut buf = example_com_query();
        let answer_start = buf.len();
        buf.extend_from_slice(&(0xC000 | 12u16).to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&300u32.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[93, 184, 216, 34]);
        buf[6..8].copy_from_slice(&1u16.to_be_bytes()); // ancount

        let _ = answer_start;
        let counters = CounterRegistry::new();
        let out = Arc::new(Mutex::new(Vec::new()));
        let emitter = Emitter::with_writer(Verbosity::Debug, Box::new(SharedBuf(out.clone())));
        decode(&buf, &counters, &emitter);

        let written = String::from_utf8(out.lock().unwrap().clone()).unwrap();
        assert!(written.contains("rdata: type=A"));
        assert!(written.contains("rdlength=4"));
    }

    #[test]
    fn label_over_63_bytes_is_rejected() {
        let mut buf = vec![0u8; 12];
        buf.push(64); // label length 64 > 63
        buf.extend(std::iter::repeat(b'a').take(64));
        buf.push(0);
        let err = read_name(&buf, 12).unwrap_err();
        assert_eq!(err, DecodeError::MalformedName);
    }
}
