//! Proxy hooks invoked by the transport around the upstream call.
//!
//! - [`pre_forward`] rewrites the outbound request: query/body fields,
//!   cookies, identification headers, header policy, then the target.
//! - [`post_receive`] applies the outbound header policy to the response.
//!
//! Both are synchronous and fail-open: a value that fails validation is
//! blanked, and nothing here aborts the request.

use std::str::FromStr;

use axum::body::Bytes;
use axum::http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, HOST},
    request, response,
    uri::{Authority, PathAndQuery, Scheme},
    HeaderMap, HeaderName, HeaderValue, Method, Uri,
};
use thiserror::Error;

use crate::filter::{headers::sanitize_values, Direction};
use crate::sanitize::{sanitize_body, sanitize_query, RuleSet};

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_ORIGIN_HOST: HeaderName = HeaderName::from_static("x-origin-host");

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Upstream URL that is not an absolute `scheme://authority` URL.
#[derive(Debug, Error)]
#[error("invalid upstream URL '{0}'")]
pub struct InvalidUpstream(pub String);

/// The single forwarding target. Only scheme and authority are substituted
/// into outbound requests; the request path is kept.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    pub fn parse(url: &str) -> Result<Self, InvalidUpstream> {
        let uri = Uri::from_str(url).map_err(|_| InvalidUpstream(url.to_string()))?;
        let parts = uri.into_parts();
        match (parts.scheme, parts.authority) {
            (Some(scheme), Some(authority)) => Ok(Self { scheme, authority }),
            _ => Err(InvalidUpstream(url.to_string())),
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Point `path_and_query` at the upstream.
    fn target(&self, path_and_query: PathAndQuery) -> Uri {
        let built = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build();
        match built {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build upstream URI, forwarding to root");
                Uri::builder()
                    .scheme(self.scheme.clone())
                    .authority(self.authority.clone())
                    .path_and_query("/")
                    .build()
                    .unwrap_or_default()
            }
        }
    }
}

/// Which request parts are sanitized for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stages {
    QueryOnly,
    QueryAndBody,
}

impl Stages {
    /// POST and PUT carry form bodies. GET, HEAD, DELETE and any other
    /// method only get their query string sanitized.
    pub fn for_method(method: &Method) -> Self {
        match *method {
            Method::POST | Method::PUT => Stages::QueryAndBody,
            _ => Stages::QueryOnly,
        }
    }
}

/// Rewrite an outbound request before it is sent upstream.
pub fn pre_forward(
    rules: &RuleSet,
    upstream: &Upstream,
    mut parts: request::Parts,
    body: Bytes,
) -> (request::Parts, Bytes) {
    let path_and_query = rewrite_query(rules, &parts.uri);

    let mut rewritten_body = None;
    if Stages::for_method(&parts.method) == Stages::QueryAndBody && is_form(&parts.headers) {
        rewritten_body = sanitize_body(rules, &body).map(Bytes::from);
    }

    let original_host = parts
        .headers
        .get(HOST)
        .cloned()
        .or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        });

    let headers = std::mem::take(&mut parts.headers);
    let headers = rules.cookies_in().filter_headers(headers);
    let headers = add_identification(headers, original_host, upstream);
    let headers = rules.headers_in().apply(headers, Direction::Inbound);
    let mut headers = match rules.header_rule() {
        Some(rule) => sanitize_values(headers, rule),
        None => headers,
    };

    let body = match rewritten_body {
        Some(new_body) => {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(new_body.len()));
            new_body
        }
        None => body,
    };

    parts.headers = headers;
    parts.uri = upstream.target(path_and_query);
    (parts, body)
}

/// Rewrite an inbound response before it is returned to the client.
/// The body is never inspected.
pub fn post_receive(rules: &RuleSet, mut parts: response::Parts) -> response::Parts {
    let headers = std::mem::take(&mut parts.headers);
    parts.headers = rules.headers_out().apply(headers, Direction::Outbound);
    parts
}

fn rewrite_query(rules: &RuleSet, uri: &Uri) -> PathAndQuery {
    let path = uri.path();
    let rebuilt = match uri.query() {
        Some(query) => {
            let query = sanitize_query(rules, query);
            if query.is_empty() {
                path.to_string()
            } else {
                format!("{}?{}", path, query)
            }
        }
        None => path.to_string(),
    };
    PathAndQuery::from_str(&rebuilt).unwrap_or_else(|_| PathAndQuery::from_static("/"))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

fn add_identification(
    mut headers: HeaderMap,
    original_host: Option<HeaderValue>,
    upstream: &Upstream,
) -> HeaderMap {
    if let Some(host) = original_host {
        headers.append(X_FORWARDED_HOST, host);
    }
    if let Ok(origin) = HeaderValue::from_str(upstream.authority().as_str()) {
        headers.append(X_ORIGIN_HOST, origin);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use axum::http::{Request, Response};

    fn rules(toml: &str) -> RuleSet {
        RuleSet::from_config(&load_config_from_str(toml).unwrap())
    }

    fn upstream() -> Upstream {
        Upstream::parse("http://127.0.0.1:9000/").unwrap()
    }

    fn request(method: Method, uri: &str, content_type: Option<&str>) -> request::Parts {
        let mut builder = Request::builder().method(method).uri(uri).header(HOST, "gateway.local");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_upstream_parse() {
        assert_eq!(upstream().authority().as_str(), "127.0.0.1:9000");
        assert!(Upstream::parse("/just/a/path").is_err());
        assert!(Upstream::parse("not a url").is_err());
    }

    #[test]
    fn test_stages_by_method() {
        assert_eq!(Stages::for_method(&Method::GET), Stages::QueryOnly);
        assert_eq!(Stages::for_method(&Method::HEAD), Stages::QueryOnly);
        assert_eq!(Stages::for_method(&Method::DELETE), Stages::QueryOnly);
        assert_eq!(Stages::for_method(&Method::PATCH), Stages::QueryOnly);
        assert_eq!(Stages::for_method(&Method::POST), Stages::QueryAndBody);
        assert_eq!(Stages::for_method(&Method::PUT), Stages::QueryAndBody);
    }

    #[test]
    fn test_get_query_html_stripped() {
        let rules = rules("[fields.q]\ntype = \"text\"\nstrip_html = true\n");
        let parts = request(
            Method::GET,
            "/search?q=%3Cscript%3Ealert(1)%3C%2Fscript%3E",
            None,
        );
        let (parts, _) = pre_forward(&rules, &upstream(), parts, Bytes::new());
        assert_eq!(parts.uri.to_string(), "http://127.0.0.1:9000/search?q=alert%281%29");
    }

    #[test]
    fn test_post_body_numeric() {
        let rules = rules("[fields.amount]\ntype = \"numeric\"\n");
        let parts = request(Method::POST, "/pay", Some(FORM_CONTENT_TYPE));
        let (parts, body) = pre_forward(&rules, &upstream(), parts, Bytes::from("amount=123abc"));
        assert_eq!(body, Bytes::from("amount=123"));
        assert_eq!(parts.headers.get(CONTENT_LENGTH).unwrap(), "10");
    }

    #[test]
    fn test_non_form_body_untouched() {
        let rules = rules("[default_field]\ntype = \"absent\"\n");
        let json = Bytes::from(r#"{"amount":"123abc"}"#);
        let parts = request(Method::POST, "/pay", Some("application/json"));
        let (parts, body) = pre_forward(&rules, &upstream(), parts, json.clone());
        assert_eq!(body, json);
        assert!(parts.headers.get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_delete_body_untouched() {
        let rules = rules("[default_field]\ntype = \"absent\"\n");
        let parts = request(Method::DELETE, "/item?id=1", Some(FORM_CONTENT_TYPE));
        let (parts, body) = pre_forward(&rules, &upstream(), parts, Bytes::from("id=2"));
        assert_eq!(body, Bytes::from("id=2"));
        assert_eq!(parts.uri.query(), Some("id="));
    }

    #[test]
    fn test_empty_form_body_untouched() {
        let rules = rules("[default_field]\ntype = \"absent\"\n");
        let parts = request(Method::PUT, "/", Some("application/x-www-form-urlencoded; charset=utf-8"));
        let (_, body) = pre_forward(&rules, &upstream(), parts, Bytes::new());
        assert!(body.is_empty());
    }

    #[test]
    fn test_unconfigured_field_passes() {
        let rules = rules("");
        let parts = request(Method::GET, "/?foo=bar", None);
        let (parts, _) = pre_forward(&rules, &upstream(), parts, Bytes::new());
        assert_eq!(parts.uri.query(), Some("foo=bar"));
    }

    #[test]
    fn test_identification_headers() {
        let rules = rules("");
        let parts = request(Method::GET, "/", None);
        let (parts, _) = pre_forward(&rules, &upstream(), parts, Bytes::new());
        assert_eq!(parts.headers.get(X_FORWARDED_HOST).unwrap(), "gateway.local");
        assert_eq!(parts.headers.get(X_ORIGIN_HOST).unwrap(), "127.0.0.1:9000");
        assert_eq!(parts.uri.to_string(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn test_header_only_can_drop_identification() {
        let rules = rules("[header_in]\nonly = [\"Host\"]\n");
        let parts = request(Method::GET, "/", None);
        let (parts, _) = pre_forward(&rules, &upstream(), parts, Bytes::new());
        assert!(parts.headers.get(X_FORWARDED_HOST).is_none());
        assert_eq!(parts.headers.get(HOST).unwrap(), "gateway.local");
    }

    #[test]
    fn test_cookies_filtered_before_headers() {
        let rules = rules(
            "[cookie_in]\ndel = [\"x\"]\nonly = [\"y\"]\n[header_in]\nset = { \"X-Gateway\" = \"1\" }\n",
        );
        let mut parts = request(Method::GET, "/", None);
        parts.headers.insert("cookie", HeaderValue::from_static("x=1; y=2"));
        let (parts, _) = pre_forward(&rules, &upstream(), parts, Bytes::new());
        assert_eq!(parts.headers.get("cookie").unwrap(), "y=2");
        assert_eq!(parts.headers.get("x-gateway").unwrap(), "1");
    }

    #[test]
    fn test_global_header_sanitization() {
        let rules = rules("[sanitize_headers]\nstrip_sqlia = true\n");
        let mut parts = request(Method::GET, "/", None);
        parts.headers.insert(
            "x-foo",
            HeaderValue::from_static("1=1' OR '1'='1' UNION SELECT password FROM users"),
        );
        let (parts, _) = pre_forward(&rules, &upstream(), parts, Bytes::new());
        assert_eq!(
            parts.headers.get("x-foo").unwrap(),
            "1=1' OR '1'='1' UNION ****** password FROM users"
        );
    }

    #[test]
    fn test_post_receive_filters_response_headers() {
        let rules = rules("[header_out]\ndel = [\"Server\"]\nset = { \"X-Frame-Options\" = \"DENY\" }\n");
        let (parts, _) = Response::builder()
            .header("server", "nginx")
            .header("content-type", "text/html")
            .body(())
            .unwrap()
            .into_parts();
        let parts = post_receive(&rules, parts);
        assert!(parts.headers.get("server").is_none());
        assert_eq!(parts.headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(parts.headers.get("content-type").unwrap(), "text/html");
    }
}
