//! Per-field request metadata extraction.
//!
//! Every helper here is total: a missing or malformed source degrades to an
//! empty value (or `None` for omitted fields) instead of failing, so one bad
//! header can never cost the request its log line.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use http::header::AsHeaderName;
use http::{HeaderMap, Request, Version};

/// A header value as a string, if present and valid UTF-8.
pub(crate) fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// HTTP protocol version in the `HTTP/x.y` notation clients send.
pub(crate) fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "",
    }
}

/// Request scheme: the URI scheme when the request carries an absolute URI,
/// otherwise the `x-forwarded-proto` header a TLS-terminating proxy sets,
/// otherwise plain `http`.
pub(crate) fn scheme<B>(req: &Request<B>) -> String {
    if let Some(scheme) = req.uri().scheme_str() {
        return scheme.to_string();
    }
    header_str(req.headers(), "x-forwarded-proto")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("http")
        .to_string()
}

/// Client IP address.
///
/// Prefers the first entry of `x-forwarded-for`, then `x-real-ip`, then the
/// peer address the server recorded via [`ConnectInfo`]. Empty when none of
/// those are available (e.g. requests driven directly through the service
/// in tests).
pub(crate) fn remote_ip<B>(req: &Request<B>) -> String {
    if let Some(forwarded) = header_str(req.headers(), "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(req.headers(), "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}
