//! Format predicates for the validate-or-blank steps, and safe file names.

use std::net::IpAddr;
use std::str::FromStr;

use axum::http::uri::PathAndQuery;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Returned by [`safe_filename`] when nothing usable is left of the input.
pub const FALLBACK_FILENAME: &str = "unnamed";

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("static regex")
});

static UNIX_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:/[A-Za-z0-9._:~-]+)+/?$").expect("static regex"));

static WINDOWS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z]:\\(?:[^\\/:*?"<>|\x00-\x1f]+\\)*[^\\/:*?"<>|\x00-\x1f]*$"#)
        .expect("static regex")
});

static FILENAME_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ &_=+:]").expect("static regex"));

static FILENAME_ILLEGAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9.-]").expect("static regex"));

/// IPv4 or IPv6 address literal.
pub fn is_ip(value: &str) -> bool {
    IpAddr::from_str(value).is_ok()
}

/// Unix timestamp in seconds: one to ten ASCII digits.
pub fn is_unix_time(value: &str) -> bool {
    (1..=10).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
}

/// Email address with a dotted domain.
pub fn is_email(value: &str) -> bool {
    value.len() <= 254 && EMAIL.is_match(value)
}

/// Absolute URL with a host, no embedded whitespace or control characters.
pub fn is_url(value: &str) -> bool {
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    Url::parse(value).map(|u| u.has_host()).unwrap_or(false)
}

/// Request target: an absolute URL or an origin-form path starting with `/`.
pub fn is_request_uri(value: &str) -> bool {
    if value.starts_with('/') {
        !value.chars().any(|c| c.is_whitespace() || c.is_control())
            && PathAndQuery::from_str(value).is_ok()
    } else {
        is_url(value)
    }
}

/// Absolute Unix or Windows file path without `..` segments.
pub fn is_file_path(value: &str) -> bool {
    let traverses = value.split(['/', '\\']).any(|segment| segment == "..");
    !traverses && (UNIX_PATH.is_match(value) || WINDOWS_PATH.is_match(value))
}

/// Keep a valid file path as-is, otherwise render a file-system safe name.
///
/// The rendering lowercases, keeps only the last path component, maps
/// separators (` &_=+:`) to `-`, drops anything outside `[a-z0-9.-]` and
/// collapses repeated dashes. The result is never empty.
pub fn safe_filename(value: &str) -> String {
    if is_file_path(value) {
        return value.to_string();
    }

    let lower = value.to_lowercase();
    let base = lower
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim();

    let name = FILENAME_SEPARATORS.replace_all(base, "-");
    let mut name = FILENAME_ILLEGAL.replace_all(&name, "").into_owned();
    while name.contains("--") {
        name = name.replace("--", "-");
    }

    match name.as_str() {
        "" | "." | ".." => FALLBACK_FILENAME.to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip() {
        assert!(is_ip("192.168.0.1"));
        assert!(is_ip("::1"));
        assert!(is_ip("2001:db8::8a2e:370:7334"));
        assert!(!is_ip("256.0.0.1"));
        assert!(!is_ip("10.0.0.1 "));
        assert!(!is_ip("localhost"));
    }

    #[test]
    fn test_unix_time() {
        assert!(is_unix_time("1700000000"));
        assert!(is_unix_time("0"));
        assert!(!is_unix_time(""));
        assert!(!is_unix_time("17000000000"));
        assert!(!is_unix_time("-1"));
        assert!(!is_unix_time("12.5"));
    }

    #[test]
    fn test_email() {
        assert!(is_email("user@example.com"));
        assert!(is_email("first.last+tag@sub.example.org"));
        assert!(!is_email("user@localhost"));
        assert!(!is_email("user@@example.com"));
        assert!(!is_email("user example@example.com"));
        assert!(!is_email("<script>@example.com"));
    }

    #[test]
    fn test_url() {
        assert!(is_url("https://example.com/a?b=c"));
        assert!(is_url("http://10.0.0.1:8080"));
        assert!(!is_url("/relative/path"));
        assert!(!is_url("javascript:alert(1)"));
        assert!(!is_url("http://exa mple.com"));
    }

    #[test]
    fn test_request_uri() {
        assert!(is_request_uri("/index.html?x=1"));
        assert!(is_request_uri("http://example.com/x"));
        assert!(!is_request_uri("index.html"));
        assert!(!is_request_uri("/a b"));
    }

    #[test]
    fn test_file_path() {
        assert!(is_file_path("/var/log/app.log"));
        assert!(is_file_path(r"C:\Users\me\file.txt"));
        assert!(!is_file_path("/var/../etc/passwd"));
        assert!(!is_file_path("relative.txt"));
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("/var/log/app.log"), "/var/log/app.log");
        assert_eq!(safe_filename("My Report_Final.PDF"), "my-report-final.pdf");
        assert_eq!(safe_filename("../../etc/passwd"), "passwd");
        assert_eq!(safe_filename("a  &  b.txt"), "a-b.txt");
        assert_eq!(safe_filename("<>"), FALLBACK_FILENAME);
        assert_eq!(safe_filename(".."), FALLBACK_FILENAME);
        assert_eq!(safe_filename(""), FALLBACK_FILENAME);
    }
}
