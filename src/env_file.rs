//! Minimal `.env` loader: `KEY=VALUE` per line, `#` comments, blank lines
//! ignored, whitespace trimmed around key and value, CRLF tolerated, and
//! lines over [`config::ENV_FILE_MAX_LINE_LEN`] rejected with a warning
//! rather than aborting the whole file.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::config;

/// Loads `path` if it exists, setting process environment variables for
/// each `KEY=VALUE` pair found. Returns the number of variables loaded.
/// A missing file is not an error: it simply loads zero variables.
pub fn load(path: &Path) -> usize {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(_) => return 0,
    };

    let mut loaded = 0;
    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.len() > config::ENV_FILE_MAX_LINE_LEN {
            warn!(
                "skipping .env line longer than {} bytes",
                config::ENV_FILE_MAX_LINE_LEN
            );
            continue;
        }
        if let Some((key, value)) = parse_line(line) {
            std::env::set_var(key, value);
            loaded += 1;
        }
    }

    debug!("loaded {loaded} variables from {}", path.display());
    loaded
}

/// Parses one already-CRLF-stripped line into a `(key, value)` pair,
/// skipping blank lines and `#`-prefixed comments.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}
