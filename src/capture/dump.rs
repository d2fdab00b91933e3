//! HTTP/1.x wire rendering of captured messages.
//!
//! Output is what a client or server would have put on the wire: start
//! line, headers, blank line, body. `Host` leads the request headers.
//! Bodies of chunked messages are written back in chunked framing.

use axum::body::Bytes;
use axum::http::{header, request, response, HeaderMap, Version};

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderMap, skip_host: bool) {
    for (name, value) in headers {
        if skip_host && name == header::HOST {
            continue;
        }
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
}

/// True when `chunked` is the final transfer coding.
fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

fn write_body(out: &mut Vec<u8>, headers: &HeaderMap, body: &[u8]) {
    if !is_chunked(headers) {
        out.extend_from_slice(body);
        return;
    }
    if !body.is_empty() {
        out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
}

/// Render a request head and its buffered body.
pub fn dump_request(parts: &request::Parts, body: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(256 + body.len());

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    out.extend_from_slice(
        format!("{} {} {}\r\n", parts.method, target, version_str(parts.version)).as_bytes(),
    );

    let host = parts
        .headers
        .get(header::HOST)
        .map(|v| v.as_bytes().to_vec())
        .or_else(|| parts.uri.authority().map(|a| a.as_str().as_bytes().to_vec()));
    if let Some(host) = host {
        out.extend_from_slice(b"Host: ");
        out.extend_from_slice(&host);
        out.extend_from_slice(b"\r\n");
    }

    write_headers(&mut out, &parts.headers, true);
    out.extend_from_slice(b"\r\n");
    write_body(&mut out, &parts.headers, body);
    Bytes::from(out)
}

/// Render a response head and its buffered body.
pub fn dump_response(parts: &response::Parts, body: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(256 + body.len());

    out.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            version_str(parts.version),
            parts.status.as_u16(),
            parts.status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );
    write_headers(&mut out, &parts.headers, false);
    out.extend_from_slice(b"\r\n");
    write_body(&mut out, &parts.headers, body);
    Bytes::from(out)
}
