//! SQLite-backed durable counter sink.
//!
//! Owned exclusively by the persistence worker; no other thread touches
//! the connection. `AWS_RDS_CONNINFO` is read as a filesystem path to the
//! database file rather than a network connection string — a deliberate
//! substitution for the original Postgres sink, documented in DESIGN.md.

use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::error::PersistError;
use crate::stats::Snapshot;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, PersistError> {
        let conn = Connection::open(path).map_err(PersistError::DbConnectFailed)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS protocol_stats (
                total_packets INTEGER NOT NULL,
                ethernet      INTEGER NOT NULL,
                ipv4          INTEGER NOT NULL,
                ipv6          INTEGER NOT NULL,
                tcp           INTEGER NOT NULL,
                udp           INTEGER NOT NULL,
                icmp          INTEGER NOT NULL,
                arp           INTEGER NOT NULL,
                dns           INTEGER NOT NULL,
                http          INTEGER NOT NULL,
                https         INTEGER NOT NULL,
                dhcp          INTEGER NOT NULL
            );",
        )
        .map_err(PersistError::DbQueryFailed)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Appends one row for this snapshot. The table is append-only; history
    /// is reconstructed by row order.
    pub fn insert_snapshot(&self, snap: &Snapshot) -> Result<(), PersistError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(
                "INSERT INTO protocol_stats
                    (total_packets, ethernet, ipv4, ipv6, tcp, udp, icmp, arp, dns, http, https, dhcp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )
            .map_err(PersistError::DbQueryFailed)?;
        stmt.execute(params![
            snap.total_packets as i64,
            snap.ethernet as i64,
            snap.ipv4 as i64,
            snap.ipv6 as i64,
            snap.tcp as i64,
            snap.udp as i64,
            snap.icmp as i64,
            snap.arp as i64,
            snap.dns as i64,
            snap.http as i64,
            snap.https as i64,
            snap.dhcp as i64,
        ])
        .map_err(PersistError::DbQueryFailed)?;
        Ok(())
    }
}
