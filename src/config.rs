//! Centralized runtime constants.
//!
//! All tunable intervals, sizes and bounds live here so they can be found
//! and adjusted in one place instead of scattered across modules.

/// Maximum number of captured frames buffered between the capture thread
/// and the analyzer thread.
pub const QUEUE_CAPACITY: usize = 10_000;

/// Emit one warning line for every Nth frame dropped because the queue was full.
pub const DROP_WARN_EVERY: u64 = 1_000;

/// Snapshot length passed to the capture source (maximum bytes captured per frame).
pub const SNAPLEN: i32 = 65_536;

/// Read timeout passed to the capture source, in milliseconds.
pub const CAPTURE_TIMEOUT_MS: i32 = 1_000;

/// Interval at which the persistence worker snapshots counters to disk/DB (seconds).
pub const PERSIST_INTERVAL_SECS: u64 = 15;

/// Base delay before the first database reconnect attempt (seconds).
pub const DB_BACKOFF_BASE_SECS: u64 = 1;

/// Backoff multiplier applied after each failed reconnect attempt.
pub const DB_BACKOFF_FACTOR: u64 = 2;

/// Maximum reconnect attempts before the database is permanently disabled
/// for the lifetime of the process.
pub const DB_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Hard ceiling on IPv6 extension-header walk iterations.
pub const IPV6_MAX_EXT_HEADERS: u32 = 64;

/// Hard ceiling on the byte length of a single IPv6 extension header.
pub const IPV6_EXT_HDR_MAX_BYTES: usize = 2048;

/// Hard ceiling on DNS name-compression pointer traversals per name.
pub const DNS_MAX_POINTER_HOPS: u32 = 16;

/// Maximum length of a single DNS label.
pub const DNS_MAX_LABEL_LEN: u8 = 63;

/// Maximum DHCP hostname option length this crate will render (bytes).
pub const DHCP_MAX_HOSTNAME_LEN: usize = 256;

/// Maximum bytes of a client hardware address DHCP will render.
pub const DHCP_MAX_CHADDR_LEN: usize = 16;

/// Base component of the shutdown drain timeout (seconds).
pub const SHUTDOWN_TIMEOUT_BASE_SECS: u64 = 10;

/// Per-queued-entry component of the shutdown drain timeout (milliseconds).
pub const SHUTDOWN_TIMEOUT_PER_ENTRY_MS: u64 = 10;

/// Hard ceiling on the shutdown drain timeout, regardless of queue depth.
pub const SHUTDOWN_TIMEOUT_MAX_SECS: u64 = 300;

/// Maximum accepted length of a single `.env` line; longer lines are rejected.
pub const ENV_FILE_MAX_LINE_LEN: usize = 2048;

/// Maximum rendered length of an HTTP request/status line or `Host:` line.
pub const HTTP_LINE_CAP: usize = 256;

/// Largest valid TCP header length (data offset field maxes out at 15 words).
pub const TCP_MAX_HEADER_LEN: usize = 60;

/// Path the JSON counter snapshot is written to.
pub const STATS_JSON_PATH: &str = "stats.json";

/// Compiled-in fallback database path, used when `AWS_RDS_CONNINFO` is unset or empty.
pub const DEFAULT_DB_PATH: &str = "netsentry.db";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_timeout_components_are_sane() {
        assert!(SHUTDOWN_TIMEOUT_BASE_SECS > 0);
        assert!(SHUTDOWN_TIMEOUT_PER_ENTRY_MS > 0);
        assert!(SHUTDOWN_TIMEOUT_MAX_SECS > SHUTDOWN_TIMEOUT_BASE_SECS);
    }

    #[test]
    fn dns_and_ipv6_bounds_are_small_and_positive() {
        assert!(DNS_MAX_POINTER_HOPS > 0 && DNS_MAX_POINTER_HOPS < 100);
        assert!(IPV6_MAX_EXT_HEADERS > 0 && IPV6_MAX_EXT_HEADERS < 1000);
    }

    #[test]
    fn queue_capacity_matches_spec() {
        assert_eq!(QUEUE_CAPACITY, 10_000);
    }
}
