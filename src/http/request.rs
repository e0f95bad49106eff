//! Request size estimation.
//!
//! # Responsibilities
//! - Approximate the size of an inbound request from its head
//! - Never touch the body stream
//!
//! # Design Decisions
//! - Sum of method, protocol, header names and values, host, URI and the
//!   declared content length
//! - `Host` is counted once, as the host string, not again as a header
//! - An unknown content length (chunked, streamed) contributes nothing, so
//!   such bodies are under-counted rather than buffered

use axum::body::HttpBody;
use axum::http::{header, HeaderValue, Request, Version};

/// Approximate the number of bytes of `request` as received on the wire.
pub fn approximate_request_size<B: HttpBody>(request: &Request<B>) -> u64 {
    let mut size = request.method().as_str().len() + protocol(request.version()).len();

    let headers = request.headers();
    for name in headers.keys() {
        if name == header::HOST {
            continue;
        }
        size += name.as_str().len();
        size += headers.get_all(name).iter().map(HeaderValue::len).sum::<usize>();
    }

    size += host(request).map_or(0, str::len);
    size += request.uri().to_string().len();

    let mut size = size as u64;
    if let Some(length) = declared_content_length(request) {
        size += length;
    }
    size
}

/// Protocol string as it appears on an HTTP/1 request line.
pub fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "",
    }
}

fn host<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
}

/// `Content-Length` if present and valid, else the body's exact length if known.
fn declared_content_length<B: HttpBody>(request: &Request<B>) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| request.body().size_hint().exact())
}
