//! UDP datagram decoder.

use crate::cursor::ByteCursor;
use crate::decode::{dhcp, dns};
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::CounterRegistry;

pub struct UdpRecord<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: usize,
    pub payload: &'a [u8],
}

pub fn parse(buf: &[u8]) -> Result<UdpRecord<'_>, DecodeError> {
    if buf.len() < 8 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: 8,
        });
    }
    let mut c = ByteCursor::new(buf);
    let src_port = c.read_u16()?;
    let dst_port = c.read_u16()?;
    let declared_len = c.read_u16()? as usize;
    let _checksum = c.read_u16()?;

    let length = if declared_len < 8 || declared_len > buf.len() {
        buf.len()
    } else {
        declared_len
    };

    Ok(UdpRecord {
        src_port,
        dst_port,
        length,
        payload: &buf[8..length],
    })
}

pub fn decode(buf: &[u8], src_ip: &str, dst_ip: &str, counters: &CounterRegistry, emitter: &Emitter) {
    let rec = match parse(buf) {
        Ok(r) => r,
        Err(e) => {
            emitter.warn(&format!("UDP: {e}"));
            return;
        }
    };

    emitter.info(&format!(
        "UDP: {}:{} -> {}:{}, Len={}",
        src_ip, rec.src_port, dst_ip, rec.dst_port, rec.length
    ));

    if (rec.src_port == 53 || rec.dst_port == 53) && !rec.payload.is_empty() {
        dns::decode(rec.payload, counters, emitter);
    }
    if rec.src_port == 67 || rec.dst_port == 67 || rec.src_port == 68 || rec.dst_port == 68 {
        dhcp::decode(rec.payload, src_ip, dst_ip, rec.src_port, rec.dst_port, counters, emitter);
    }
}
