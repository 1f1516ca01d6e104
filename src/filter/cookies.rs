//! Inbound cookie set/del/only policy.
//!
//! The `Cookie` header is a composite of `name=value` pairs, so each stage
//! works on a parsed cookie list and the header is rebuilt once at the end.

use std::collections::HashSet;

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

use crate::config::schema::CookiePolicyConfig;

/// One request cookie. `value` is `None` for a bare name sent without `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Compiled cookie policy. Cookie names are case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct CookiePolicy {
    set: Vec<Cookie>,
    del: HashSet<String>,
    only: HashSet<String>,
}

impl CookiePolicy {
    pub fn from_config(config: &CookiePolicyConfig) -> Self {
        Self {
            set: config
                .set
                .iter()
                .map(|(name, value)| Cookie::new(name.clone(), value.clone()))
                .collect(),
            del: config.del.iter().cloned().collect(),
            only: config.only.iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.del.is_empty() && self.only.is_empty()
    }

    /// Run set → del → only, each stage consuming the previous stage's list.
    pub fn apply(&self, cookies: Vec<Cookie>) -> Vec<Cookie> {
        let cookies = self.stage_set(cookies);
        let cookies = self.stage_del(cookies);
        self.stage_only(cookies)
    }

    fn stage_set(&self, mut cookies: Vec<Cookie>) -> Vec<Cookie> {
        for cookie in &self.set {
            tracing::info!(cookie = %cookie.name, value = ?cookie.value, "Add cookie");
            cookies.push(cookie.clone());
        }
        cookies
    }

    fn stage_del(&self, cookies: Vec<Cookie>) -> Vec<Cookie> {
        if self.del.is_empty() {
            return cookies;
        }
        retain_logged(cookies, |c| !self.del.contains(&c.name))
    }

    fn stage_only(&self, cookies: Vec<Cookie>) -> Vec<Cookie> {
        if self.only.is_empty() {
            return cookies;
        }
        retain_logged(cookies, |c| self.only.contains(&c.name))
    }

    /// Apply the policy to the `Cookie` header(s) of a request header snapshot.
    ///
    /// With an empty policy the headers are returned untouched. Otherwise all
    /// `Cookie` headers are replaced by a single rebuilt one, or removed if
    /// no cookie survives.
    pub fn filter_headers(&self, mut headers: HeaderMap) -> HeaderMap {
        if self.is_empty() {
            return headers;
        }
        let cookies = self.apply(parse_cookies(&headers));
        headers.remove(COOKIE);
        if cookies.is_empty() {
            return headers;
        }
        match HeaderValue::from_str(&render_cookies(&cookies)) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => tracing::warn!("Rebuilt Cookie header is not a valid header value, dropped"),
        }
        headers
    }

    pub(crate) fn summary(&self) -> serde_json::Value {
        let mut del: Vec<_> = self.del.iter().collect();
        del.sort();
        let mut only: Vec<_> = self.only.iter().collect();
        only.sort();
        serde_json::json!({
            "set": self.set.iter().map(|c| (c.name.clone(), c.value.clone().unwrap_or_default()))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "del": del,
            "only": only,
        })
    }
}

fn retain_logged(cookies: Vec<Cookie>, keep: impl Fn(&Cookie) -> bool) -> Vec<Cookie> {
    cookies
        .into_iter()
        .filter(|cookie| {
            let kept = keep(cookie);
            if !kept {
                tracing::info!(cookie = %cookie.name, "Remove cookie");
            }
            kept
        })
        .collect()
}

/// Parse every `Cookie` header into name/value pairs, in order.
///
/// Pairs without `=` become a bare cookie; empty segments are skipped.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<Cookie> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => Cookie::new(name.trim(), value.trim()),
            None => Cookie::bare(pair),
        })
        .collect()
}

/// Render cookies in `Cookie` header form: `a=1; b=2`. Bare cookies are
/// rendered as the name alone.
pub fn render_cookies(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| match &c.value {
            Some(value) => format!("{}={}", c.name, value),
            None => c.name.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
