//! Per-protocol counter registry.
//!
//! Counters are lock-free atomics: many writers (every decoder, from any
//! thread that happens to be analyzing a frame), one reader (the
//! persistence worker). Reads are intentionally unsynchronized relative to
//! increments — a snapshot may be torn across a concurrent increment, which
//! is fine for a periodic, advisory JSON/DB dump.

pub mod db;
pub mod persist;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Protocol tags tracked by the registry, in the fixed order used for
/// JSON and database persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Eth,
    IPv4,
    IPv6,
    Tcp,
    Udp,
    Icmp,
    Arp,
    Dns,
    Http,
    Https,
    Dhcp,
}

const TAG_COUNT: usize = 11;

impl Tag {
    fn index(self) -> usize {
        match self {
            Tag::Eth => 0,
            Tag::IPv4 => 1,
            Tag::IPv6 => 2,
            Tag::Tcp => 3,
            Tag::Udp => 4,
            Tag::Icmp => 5,
            Tag::Arp => 6,
            Tag::Dns => 7,
            Tag::Http => 8,
            Tag::Https => 9,
            Tag::Dhcp => 10,
        }
    }
}

pub struct CounterRegistry {
    total: AtomicU64,
    counters: [AtomicU64; TAG_COUNT],
}

impl CounterRegistry {
    pub fn new() -> Self {
        CounterRegistry {
            total: AtomicU64::new(0),
            counters: Default::default(),
        }
    }

    /// Atomically bumps both the named counter and `total`.
    pub fn increment(&self, tag: Tag) {
        self.counters[tag.index()].fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, tag: Tag) -> u64 {
        self.counters[tag.index()].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// An unsynchronized point-in-time snapshot of every counter.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total_packets: self.total(),
            ethernet: self.get(Tag::Eth),
            ipv4: self.get(Tag::IPv4),
            ipv6: self.get(Tag::IPv6),
            tcp: self.get(Tag::Tcp),
            udp: self.get(Tag::Udp),
            icmp: self.get(Tag::Icmp),
            arp: self.get(Tag::Arp),
            dns: self.get(Tag::Dns),
            http: self.get(Tag::Http),
            https: self.get(Tag::Https),
            dhcp: self.get(Tag::Dhcp),
        }
    }

    /// Reseeds every counter from a loaded snapshot (startup only; not safe
    /// to call concurrently with live traffic).
    pub fn reseed(&self, snapshot: &Snapshot) {
        self.total.store(snapshot.total_packets, Ordering::Relaxed);
        self.counters[Tag::Eth.index()].store(snapshot.ethernet, Ordering::Relaxed);
        self.counters[Tag::IPv4.index()].store(snapshot.ipv4, Ordering::Relaxed);
        self.counters[Tag::IPv6.index()].store(snapshot.ipv6, Ordering::Relaxed);
        self.counters[Tag::Tcp.index()].store(snapshot.tcp, Ordering::Relaxed);
        self.counters[Tag::Udp.index()].store(snapshot.udp, Ordering::Relaxed);
        self.counters[Tag::Icmp.index()].store(snapshot.icmp, Ordering::Relaxed);
        self.counters[Tag::Arp.index()].store(snapshot.arp, Ordering::Relaxed);
        self.counters[Tag::Dns.index()].store(snapshot.dns, Ordering::Relaxed);
        self.counters[Tag::Http.index()].store(snapshot.http, Ordering::Relaxed);
        self.counters[Tag::Https.index()].store(snapshot.https, Ordering::Relaxed);
        self.counters[Tag::Dhcp.index()].store(snapshot.dhcp, Ordering::Relaxed);
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time read of every counter, in the fixed field order used by
/// the JSON snapshot and `protocol_stats` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub total_packets: u64,
    pub ethernet: u64,
    pub ipv4: u64,
    pub ipv6: u64,
    pub tcp: u64,
    pub udp: u64,
    pub icmp: u64,
    pub arp: u64,
    pub dns: u64,
    pub http: u64,
    pub https: u64,
    pub dhcp: u64,
}
