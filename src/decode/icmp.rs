//! ICMPv4 and ICMPv6 decoders.

use crate::cursor::ByteCursor;
use crate::emit::Emitter;
use crate::error::DecodeError;

pub struct Icmpv4Record {
    pub kind: u8,
    pub code: u8,
    pub id: Option<u16>,
    pub seq: Option<u16>,
}

pub fn parse_v4(buf: &[u8]) -> Result<Icmpv4Record, DecodeError> {
    if buf.len() < 8 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: 8,
        });
    }
    let mut c = ByteCursor::new(buf);
    let kind = c.read_u8()?;
    let code = c.read_u8()?;
    let _checksum = c.read_u16()?;
    let (id, seq) = if kind == 0 || kind == 8 {
        (Some(c.read_u16()?), Some(c.read_u16()?))
    } else {
        (None, None)
    };
    Ok(Icmpv4Record {
        kind,
        code,
        id,
        seq,
    })
}

pub fn decode_v4(buf: &[u8], emitter: &Emitter) {
    let rec = match parse_v4(buf) {
        Ok(r) => r,
        Err(e) => {
            emitter.warn(&format!("ICMPv4: {e}"));
            return;
        }
    };
    let line = match (rec.kind, rec.id, rec.seq) {
        (0, Some(id), Some(seq)) => format!("ICMPv4: Echo Reply (id={id}, seq={seq})"),
        (8, Some(id), Some(seq)) => format!("ICMPv4: Echo Request (id={id}, seq={seq})"),
        (3, _, _) => format!("ICMPv4: Destination Unreachable (code={})", rec.code),
        (4, _, _) => "ICMPv4: Source Quench (deprecated)".to_string(),
        (5, _, _) => format!("ICMPv4: Redirect (code={})", rec.code),
        (9, _, _) => "ICMPv4: Router Advertisement".to_string(),
        (10, _, _) => "ICMPv4: Router Solicitation".to_string(),
        (11, _, _) => format!("ICMPv4: Time Exceeded (code={})", rec.code),
        (12, _, _) => "ICMPv4: Parameter Problem".to_string(),
        (kind, _, _) => format!("ICMPv4: Type={kind} Code={}", rec.code),
    };
    emitter.info(&line);
}

pub struct Icmpv6Record {
    pub kind: u8,
    pub code: u8,
    pub id: Option<u16>,
    pub seq: Option<u16>,
}

pub fn parse_v6(buf: &[u8]) -> Result<Icmpv6Record, DecodeError> {
    let mut c = ByteCursor::new(buf);
    let kind = c.read_u8()?;
    let code = c.read_u8()?;
    let _checksum = c.read_u16()?;
    let (id, seq) = if (kind == 128 || kind == 129) && buf.len() >= 8 {
        (Some(c.read_u16()?), Some(c.read_u16()?))
    } else {
        (None, None)
    };
    Ok(Icmpv6Record {
        kind,
        code,
        id,
        seq,
    })
}

pub fn decode_v6(buf: &[u8], emitter: &Emitter) {
    let rec = match parse_v6(buf) {
        Ok(r) => r,
        Err(e) => {
            emitter.warn(&format!("ICMPv6: {e}"));
            return;
        }
    };
    let line = match (rec.kind, rec.id, rec.seq) {
        (128, Some(id), Some(seq)) => format!("ICMPv6: Echo Request (id={id}, seq={seq})"),
        (128, None, None) => "ICMPv6: Echo Request".to_string(),
        (129, Some(id), Some(seq)) => format!("ICMPv6: Echo Reply (id={id}, seq={seq})"),
        (129, None, None) => "ICMPv6: Echo Reply".to_string(),
        (133, _, _) => "ICMPv6: Router Solicitation".to_string(),
        (134, _, _) => "ICMPv6: Router Advertisement".to_string(),
        (135, _, _) => "ICMPv6: Neighbor Solicitation".to_string(),
        (136, _, _) => "ICMPv6: Neighbor Advertisement".to_string(),
        (1, _, _) => format!("ICMPv6: Destination Unreachable (code={})", rec.code),
        (3, _, _) => format!("ICMPv6: Time Exceeded (code={})", rec.code),
        (kind, _, _) => format!("ICMPv6: Type={kind} Code={}", rec.code),
    };
    emitter.info(&line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_echo_request_reads_id_and_seq() {
        let buf = [8, 0, 0, 0, 0x00, 0x05, 0x00, 0x07];
        let rec = parse_v4(&buf).unwrap();
        assert_eq!(rec.kind, 8);
        assert_eq!(rec.id, Some(5));
        assert_eq!(rec.seq, Some(7));
    }

    #[test]
    fn v4_dest_unreachable_has_no_id_or_seq() {
        let buf = [3, 1, 0, 0, 0, 0, 0, 0];
        let rec = parse_v4(&buf).unwrap();
        assert_eq!(rec.code, 1);
        assert_eq!(rec.id, None);
    }

    #[test]
    fn v4_truncated_below_8_bytes_errors() {
        let buf = [3, 1, 0];
        assert!(parse_v4(&buf).is_err());
    }

    #[test]
    fn v6_neighbor_solicitation_has_no_id_or_seq() {
        let buf = [135, 0, 0, 0];
        let rec = parse_v6(&buf).unwrap();
        assert_eq!(rec.kind, 135);
        assert_eq!(rec.id, None);
    }

    #[test]
    fn v6_echo_reply_reads_id_and_seq() {
        let buf = [129, 0, 0, 0, 0x00, 0x01, 0x00, 0x02];
        let rec = parse_v6(&buf).unwrap();
        assert_eq!(rec.id, Some(1));
        assert_eq!(rec.seq, Some(2));
    }
}
