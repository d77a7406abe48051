//! Persistence worker: periodically snapshots the counter registry to a
//! JSON file and, if a database is configured, to a durable row.

use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config;
use crate::error::PersistError;
use crate::stats::db::Database;
use crate::stats::{CounterRegistry, Snapshot};

/// Lifecycle of the worker's database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbState {
    Disconnected,
    Connected,
    PermanentlyDisabled,
}

/// A shutdown signal the persistence worker can wait on instead of
/// sleeping blindly for the full interval.
#[derive(Default)]
pub struct ShutdownEvent {
    flag: AtomicBool,
    mutex: Mutex<()>,
    cvar: Condvar,
}

impl ShutdownEvent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let _guard = self.mutex.lock().unwrap();
        self.cvar.notify_all();
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Waits up to `timeout`, returning `true` if woken by shutdown rather
    /// than by the timeout elapsing.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        let guard = self.mutex.lock().unwrap();
        let (_guard, _result) = self
            .cvar
            .wait_timeout_while(guard, timeout, |_| !self.is_set())
            .unwrap();
        self.is_set()
    }
}

/// Loads a previously saved JSON snapshot, tolerating surrounding
/// whitespace; returns `None` if the file does not exist.
pub fn load_snapshot(path: &str) -> Option<Snapshot> {
    let text = fs::read_to_string(path).ok()?;
    let cleaned = strip_trailing_commas(&text);
    serde_json::from_str(&cleaned).ok()
}

/// Removes commas that precede a closing `}` or `]` (ignoring whitespace
/// between them), so a hand-edited snapshot with a trailing comma still
/// parses as strict JSON. Commas inside string literals are left alone.
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Writes the snapshot as pretty-printed JSON, atomically (write to a
/// temp file in the same directory, then rename over the destination).
pub fn save_snapshot(path: &str, snap: &Snapshot) -> Result<(), PersistError> {
    let body = serde_json::to_string_pretty(snap).expect("Snapshot serialization cannot fail");
    let tmp_path = format!("{path}.tmp");
    {
        let mut f = fs::File::create(&tmp_path).map_err(PersistError::JsonWriteFailed)?;
        f.write_all(body.as_bytes())
            .map_err(PersistError::JsonWriteFailed)?;
        f.sync_all().map_err(PersistError::JsonWriteFailed)?;
    }
    fs::rename(&tmp_path, path).map_err(PersistError::JsonWriteFailed)?;
    Ok(())
}

/// Resolves the database path from `AWS_RDS_CONNINFO`. Unset falls back to
/// the compiled-in default path; explicitly set to an empty string means
/// "no database configured" (`None`) and is not itself a connection
/// failure, so the persistence worker never attempts a connection for it.
pub fn resolve_db_path() -> Option<String> {
    match std::env::var("AWS_RDS_CONNINFO") {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Ok(_) => None,
        Err(_) => Some(config::DEFAULT_DB_PATH.to_string()),
    }
}

pub struct PersistenceWorker {
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    /// Spawns the worker thread. `db_path` of `None` runs in JSON-only mode.
    pub fn spawn(
        counters: Arc<CounterRegistry>,
        json_path: String,
        db_path: Option<String>,
        shutdown: Arc<ShutdownEvent>,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("persistence-worker".into())
            .spawn(move || run(counters, json_path, db_path, shutdown))
            .expect("failed to spawn persistence-worker thread");
        PersistenceWorker {
            handle: Some(handle),
        }
    }

    pub fn join(mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn run(
    counters: Arc<CounterRegistry>,
    json_path: String,
    db_path: Option<String>,
    shutdown: Arc<ShutdownEvent>,
) {
    let mut db: Option<Database> = None;
    let mut db_state = DbState::Disconnected;
    if db_path.is_none() {
        info!("persistence worker running in json-only mode");
    }

    loop {
        let woken_by_shutdown =
            shutdown.wait_timeout(Duration::from_secs(config::PERSIST_INTERVAL_SECS));

        let snap = counters.snapshot();

        if let Err(e) = save_snapshot(&json_path, &snap) {
            warn!("failed to write json snapshot: {e}");
        }

        if let Some(path) = db_path.as_deref() {
            if db_state != DbState::PermanentlyDisabled {
                if db.is_none() {
                    match Database::open(path) {
                        Ok(opened) => {
                            db = Some(opened);
                            db_state = DbState::Connected;
                        }
                        Err(e) => {
                            db_state = reconnect_with_backoff(path, &mut db, e);
                        }
                    }
                }
                if let Some(conn) = db.as_ref() {
                    if let Err(e) = conn.insert_snapshot(&snap) {
                        warn!("database insert failed, will attempt reconnect: {e}");
                        db = None;
                        db_state = reconnect_with_backoff(
                            path,
                            &mut db,
                            e,
                        );
                    }
                }
            }
        }

        if woken_by_shutdown {
            // Final snapshot only on a clean wake (not a timed-out drain).
            if let Err(e) = save_snapshot(&json_path, &counters.snapshot()) {
                error!("failed to write final json snapshot: {e}");
            }
            debug!("persistence worker exiting cleanly");
            return;
        }
    }
}

/// Exponential backoff (base 1s, factor 2) across `DB_MAX_RECONNECT_ATTEMPTS`
/// attempts; on exhaustion the database is permanently disabled for the
/// process lifetime.
fn reconnect_with_backoff(
    path: &str,
    db: &mut Option<Database>,
    first_error: PersistError,
) -> DbState {
    warn!("database connection lost: {first_error}");
    let mut delay = Duration::from_secs(config::DB_BACKOFF_BASE_SECS);
    for attempt in 1..=config::DB_MAX_RECONNECT_ATTEMPTS {
        thread::sleep(delay);
        match Database::open(path) {
            Ok(opened) => {
                *db = Some(opened);
                info!("database reconnected after {attempt} attempt(s)");
                return DbState::Connected;
            }
            Err(e) => {
                warn!("reconnect attempt {attempt} failed: {e}");
                delay *= config::DB_BACKOFF_FACTOR as u32;
            }
        }
    }
    error!("database reconnect attempts exhausted, disabling database for this process");
    DbState::PermanentlyDisabled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            total_packets: 3,
            ethernet: 3,
            ipv4: 2,
            ipv6: 0,
            tcp: 1,
            udp: 1,
            icmp: 0,
            arp: 0,
            dns: 0,
            http: 0,
            https: 0,
            dhcp: 0,
        }
    }

    #[test]
    fn json_round_trip_preserves_counter_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let path_str = path.to_str().unwrap();
        let snap = sample();
        save_snapshot(path_str, &snap).unwrap();
        let loaded = load_snapshot(path_str).unwrap();
        assert_eq!(loaded, snap);
    }

    #[test]
    fn load_snapshot_tolerates_a_missing_file() {
        assert!(load_snapshot("/nonexistent/path/stats.json").is_none());
    }

    #[test]
    fn load_snapshot_tolerates_trailing_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let path_str = path.to_str().unwrap();
        let raw = r#"{
            "total_packets": 3,
            "ethernet": 3,
            "ipv4": 2,
            "ipv6": 0,
            "tcp": 1,
            "udp": 1,
            "icmp": 0,
            "arp": 0,
            "dns": 0,
            "http": 0,
            "https": 0,
            "dhcp": 0,
        }"#;
        fs::write(path_str, raw).unwrap();
        assert_eq!(load_snapshot(path_str).unwrap(), sample());
    }

    #[test]
    fn strip_trailing_commas_leaves_commas_inside_strings_untouched() {
        let input = r#"{"a": "x,y,", "b": 1,}"#;
        assert_eq!(strip_trailing_commas(input), r#"{"a": "x,y,", "b": 1}"#);
    }

    #[test]
    fn shutdown_event_wait_timeout_returns_true_when_signalled() {
        let ev = ShutdownEvent::new();
        let ev2 = ev.clone();
        let handle = thread::spawn(move || ev2.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        ev.signal();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn shutdown_event_wait_timeout_returns_false_on_elapse() {
        let ev = ShutdownEvent::new();
        assert!(!ev.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn resolve_db_path_treats_explicit_empty_string_as_not_configured() {
        // std::env is process-global; exercise the matching logic directly
        // rather than mutating the environment from a parallel test run.
        fn resolve(raw: Result<String, std::env::VarError>) -> Option<String> {
            match raw {
                Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
                Ok(_) => None,
                Err(_) => Some(config::DEFAULT_DB_PATH.to_string()),
            }
        }
        assert_eq!(resolve(Ok(String::new())), None);
        assert_eq!(resolve(Ok("  ".to_string())), None);
        assert_eq!(
            resolve(Err(std::env::VarError::NotPresent)),
            Some(config::DEFAULT_DB_PATH.to_string())
        );
        assert_eq!(
            resolve(Ok("/var/db/netsentry.db".to_string())),
            Some("/var/db/netsentry.db".to_string())
        );
    }
}
