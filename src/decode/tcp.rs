//! TCP segment decoder.

use crate::config;
use crate::cursor::ByteCursor;
use crate::decode::{http, tls};
use crate::emit::Emitter;
use crate::error::DecodeError;
use crate::stats::CounterRegistry;

pub struct TcpFlags {
    pub cwr: bool,
    pub ece: bool,
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}

impl TcpFlags {
    fn from_byte(b: u8) -> Self {
        TcpFlags {
            cwr: b & 0x80 != 0,
            ece: b & 0x40 != 0,
            urg: b & 0x20 != 0,
            ack: b & 0x10 != 0,
            psh: b & 0x08 != 0,
            rst: b & 0x04 != 0,
            syn: b & 0x02 != 0,
            fin: b & 0x01 != 0,
        }
    }

    /// Renders set flags in the fixed contract order `CWR ECE URG ACK PSH RST SYN FIN`.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if self.cwr {
            parts.push("CWR");
        }
        if self.ece {
            parts.push("ECE");
        }
        if self.urg {
            parts.push("URG");
        }
        if self.ack {
            parts.push("ACK");
        }
        if self.psh {
            parts.push("PSH");
        }
        if self.rst {
            parts.push("RST");
        }
        if self.syn {
            parts.push("SYN");
        }
        if self.fin {
            parts.push("FIN");
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("{} ", parts.join(" "))
        }
    }
}

pub struct TcpRecord<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub window: u16,
    pub flags: TcpFlags,
    pub payload: &'a [u8],
}

pub fn parse(buf: &[u8]) -> Result<TcpRecord<'_>, DecodeError> {
    if buf.len() < 20 {
        return Err(DecodeError::Truncated {
            have: buf.len(),
            need: 20,
        });
    }
    let mut c = ByteCursor::new(buf);
    let src_port = c.read_u16()?;
    let dst_port = c.read_u16()?;
    let seq = c.read_u32()?;
    let ack = c.read_u32()?;
    let data_offset_reserved = c.read_u8()?;
    let flags_byte = c.read_u8()?;
    let window = c.read_u16()?;
    let _checksum = c.read_u16()?;
    let _urgent = c.read_u16()?;

    let hdr_len = ((data_offset_reserved >> 4) as usize) * 4;
    if hdr_len < 20 || hdr_len > buf.len().min(config::TCP_MAX_HEADER_LEN) {
        return Err(DecodeError::InvalidHeaderLength { value: hdr_len });
    }

    let payload = &buf[hdr_len..];

    Ok(TcpRecord {
        src_port,
        dst_port,
        seq,
        ack,
        window,
        flags: TcpFlags::from_byte(flags_byte),
        payload,
    })
}

pub fn decode(buf: &[u8], src_ip: &str, dst_ip: &str, counters: &CounterRegistry, emitter: &Emitter) {
    let rec = match parse(buf) {
        Ok(r) => r,
        Err(e) => {
            emitter.warn(&format!("TCP: {e}"));
            return;
        }
    };

    emitter.info(&format!(
        "TCP: {}:{} -> {}:{}, Seq={} Ack={}, Win={} [{}]",
        src_ip,
        rec.src_port,
        dst_ip,
        rec.dst_port,
        rec.seq,
        rec.ack,
        rec.window,
        rec.flags.render()
    ));

    if rec.payload.is_empty() {
        return;
    }

    if rec.src_port == 80 || rec.dst_port == 80 {
        http::decode(rec.payload, src_ip, rec.src_port, dst_ip, rec.dst_port, counters, emitter);
    }
    if rec.src_port == 443 || rec.dst_port == 443 {
        tls::decode(rec.payload, src_ip, rec.src_port, dst_ip, rec.dst_port, counters, emitter);
    }
}
