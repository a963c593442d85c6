//! `RINGD_*` environment lookups.
//!
//! Scalars fall back to their default on a missing or unparsable value;
//! lists are strict.
//!
//! ```ignore
//! use ringd_core::env::{env_get, env_get_bool, env_get_list};
//!
//! let port: u16 = env_get("RINGD_PORT", 3000);
//! let sqpoll = env_get_bool("RINGD_SQPOLL", false);
//! let rings: Vec<BufRingParams> = env_get_list("RINGD_BUF_RINGS", defaults)?;
//! ```

use std::str::FromStr;

/// Trimmed value of `key`, if set and non-blank.
fn lookup(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `key` parsed as `T`, else `default`.
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// `key` parsed as `T`; `None` when unset or unparsable.
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    lookup(key)?.parse().ok()
}

/// Accepts `1/true/yes/on` and `0/false/no/off`, any case.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    lookup(key).as_deref().and_then(parse_bool).unwrap_or(default)
}

/// Comma-separated `T`s. Unset or blank gives `default`; one bad element
/// fails the whole list.
pub fn env_get_list<T: FromStr>(key: &str, default: Vec<T>) -> Result<Vec<T>, T::Err> {
    let Some(val) = lookup(key) else {
        return Ok(default);
    };
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
