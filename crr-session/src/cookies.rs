//! Session cookie jar.
//!
//! The service rotates its session cookie freely, so every `Set-Cookie`
//! header on every reply is merged into the jar. The jar is scoped to a
//! single endpoint, so domain and path attributes are not tracked; expiry
//! and the `Secure` flag are.

use chrono::{DateTime, Utc};
use crr_common::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub secure: bool,
    /// Absolute expiry; session cookies have none.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Errors loading or saving the persisted jar.
#[derive(Debug, Error)]
pub enum CookieStoreError {
    #[error("cannot access cookie file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cookie file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CookieStoreError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::InternalCookieStore
    }
}

/// Cookies for one endpoint, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    /// Merge one `Set-Cookie` header. Returns whether the jar changed.
    pub fn merge_set_cookie(&mut self, header: &str, now: DateTime<Utc>) -> bool {
        let Some(parsed) = parse_set_cookie(header, now) else {
            tracing::debug!(header, "Ignoring unparseable Set-Cookie header");
            return false;
        };
        if parsed.is_expired(now) {
            return self.cookies.remove(&parsed.name).is_some();
        }
        match self.cookies.get(&parsed.name) {
            Some(existing) if *existing == parsed => false,
            _ => {
                self.cookies.insert(parsed.name.clone(), parsed);
                true
            }
        }
    }

    /// Render the `Cookie` request header, dropping expired entries first.
    ///
    /// `Secure` cookies are only sent over an encrypted channel.
    pub fn header_value(&mut self, secure_channel: bool, now: DateTime<Utc>) -> Option<String> {
        self.cookies.retain(|_, cookie| !cookie.is_expired(now));
        let pairs: Vec<String> = self
            .cookies
            .values()
            .filter(|cookie| secure_channel || !cookie.secure)
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Load a persisted jar.
    pub fn load(path: &Path) -> Result<Self, CookieStoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| CookieStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CookieStoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Persist the jar; written to a sibling temp file and renamed into place.
    pub fn save(&self, path: &Path) -> Result<(), CookieStoreError> {
        let io_err = |source| CookieStoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| {
            CookieStoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }
}

/// Parse a `Set-Cookie` header value into a cookie.
///
/// `Max-Age` wins over `Expires`; a non-positive `Max-Age` or a past
/// `Expires` yields a cookie that is already expired, which the jar treats
/// as a deletion.
pub fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<Cookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut secure = false;
    let mut max_age: Option<i64> = None;
    let mut expires: Option<DateTime<Utc>> = None;

    for attribute in parts {
        let (key, attr_value) = match attribute.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (attribute.trim(), None),
        };
        match key.to_ascii_lowercase().as_str() {
            "secure" => secure = true,
            "max-age" => max_age = attr_value.and_then(|v| v.parse().ok()),
            "expires" => expires = attr_value.and_then(parse_cookie_date),
            _ => {}
        }
    }

    let expires_at = match max_age {
        Some(secs) if secs <= 0 => Some(DateTime::<Utc>::MIN_UTC),
        // Lifetimes past chrono's range are kept without an expiry.
        Some(secs) => chrono::Duration::try_seconds(secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .or(expires),
        None => expires,
    };

    Some(Cookie {
        name: name.to_string(),
        value: value.to_string(),
        secure,
        expires_at,
    })
}

/// Cookie dates come as `Wed, 21 Oct 2015 07:28:00 GMT` or with dashes
/// (`21-Oct-2015`).
fn parse_cookie_date(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.replace('-', " ");
    DateTime::parse_from_rfc2822(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_simple_cookie() {
        let cookie = parse_set_cookie("Bugzilla_logincookie=abc123; path=/; HttpOnly", now())
            .unwrap();
        assert_eq!(cookie.name, "Bugzilla_logincookie");
        assert_eq!(cookie.value, "abc123");
        assert!(!cookie.secure);
        assert!(cookie.expires_at.is_none());
    }

    #[test]
    fn test_parse_max_age_and_secure() {
        let cookie = parse_set_cookie("sid=x; Max-Age=60; Secure", now()).unwrap();
        assert!(cookie.secure);
        assert_eq!(
            cookie.expires_at,
            Some(now() + chrono::Duration::seconds(60))
        );
    }

    #[test]
    fn test_parse_expires_with_dashes() {
        let cookie =
            parse_set_cookie("sid=x; expires=Wed, 21-Oct-2037 07:28:00 GMT", now()).unwrap();
        assert_eq!(
            cookie.expires_at,
            Some(Utc.with_ymd_and_hms(2037, 10, 21, 7, 28, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_nameless() {
        assert!(parse_set_cookie("=value", now()).is_none());
        assert!(parse_set_cookie("novalue", now()).is_none());
    }

    #[test]
    fn test_rotation_replaces_value() {
        let mut jar = CookieJar::new();
        assert!(jar.merge_set_cookie("sid=one", now()));
        assert!(!jar.merge_set_cookie("sid=one", now()));
        assert!(jar.merge_set_cookie("sid=two", now()));
        assert_eq!(jar.get("sid"), Some("two"));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_max_age_zero_deletes() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("sid=one", now());
        assert!(jar.merge_set_cookie("sid=; Max-Age=0", now()));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_past_expires_deletes() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("sid=one", now());
        jar.merge_set_cookie("sid=gone; Expires=Thu, 01 Jan 1970 00:00:00 GMT", now());
        assert!(jar.get("sid").is_none());
    }

    #[test]
    fn test_header_value_joins_and_filters_secure() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("a=1", now());
        jar.merge_set_cookie("b=2; Secure", now());
        assert_eq!(jar.header_value(true, now()).as_deref(), Some("a=1; b=2"));
        assert_eq!(jar.header_value(false, now()).as_deref(), Some("a=1"));
    }

    #[test]
    fn test_header_value_drops_expired() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("a=1; Max-Age=10", now());
        let later = now() + chrono::Duration::seconds(11);
        assert!(jar.header_value(true, later).is_none());
        assert!(jar.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cookies.json");
        let mut jar = CookieJar::new();
        jar.merge_set_cookie("sid=persisted; Max-Age=3600", now());
        jar.save(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let loaded = CookieJar::load(&path).unwrap();
        assert_eq!(loaded, jar);
    }

    #[test]
    fn test_load_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "not json").unwrap();
        let err = CookieJar::load(&path).unwrap_err();
        assert!(matches!(err, CookieStoreError::Corrupt { .. }));
        assert_eq!(err.code(), ErrorCode::InternalCookieStore);
    }

    #[test]
    fn test_huge_max_age_keeps_cookie_without_expiry() {
        for header in [
            "sid=x; Max-Age=9223372036854775807",
            "sid=x; Max-Age=99999999999999",
        ] {
            let cookie = parse_set_cookie(header, now()).unwrap();
            assert_eq!(cookie.expires_at, None);

            let mut jar = CookieJar::new();
            assert!(jar.merge_set_cookie(header, now()));
            assert_eq!(jar.header_value(false, now()).as_deref(), Some("sid=x"));
        }
    }

    proptest! {
        #[test]
        fn test_parse_never_panics(header in ".*") {
            let _ = parse_set_cookie(&header, now());
        }

        #[test]
        fn test_any_max_age_is_accepted(secs in any::<i64>()) {
            let mut jar = CookieJar::new();
            jar.merge_set_cookie(&format!("sid=x; Max-Age={secs}"), now());
            prop_assert_eq!(jar.get("sid").is_some(), secs > 0);
        }

        #[test]
        fn test_name_value_roundtrip(
            name in "[A-Za-z_][A-Za-z0-9_]{0,15}",
            value in "[A-Za-z0-9]{0,20}",
        ) {
            let cookie = parse_set_cookie(&format!("{name}={value}; Path=/"), now()).unwrap();
            prop_assert_eq!(cookie.name, name);
            prop_assert_eq!(cookie.value, value);
        }
    }
}
