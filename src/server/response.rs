use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::Arc;

use super::http_status::HttpStatus;
use crate::pipeline::gzip_pool::GzipPool;

pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// Bytes shared across requests, such as the rewritten shell document.
    Shared(Arc<[u8]>),
    File { file: File, len: u64 },
    /// `inner`, gzipped through a pool buffer while it is written out. The
    /// compressed length is unknown until the last byte is sent.
    Gzip { inner: Box<Body>, pool: Arc<GzipPool> },
}

impl Body {
    /// The number of bytes `copy_to` will write, when known up front.
    pub fn len(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            Body::Shared(bytes) => Some(bytes.len() as u64),
            Body::File { len, .. } => Some(*len),
            Body::Gzip { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Streams the whole body into `out`.
    pub fn copy_to<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<u64> {
        match self {
            Body::Empty => Ok(0),
            Body::Bytes(bytes) => out.write_all(bytes).map(|_| bytes.len() as u64),
            Body::Shared(bytes) => out.write_all(bytes).map(|_| bytes.len() as u64),
            Body::File { file, len } => io::copy(&mut file.take(*len), out),
            Body::Gzip { inner, pool } => pool.compress_to(out, |encoder| inner.copy_to(encoder)),
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Body::Shared(b) => write!(f, "Shared({} bytes)", b.len()),
            Body::File { len, .. } => write!(f, "File({} bytes)", len),
            Body::Gzip { inner, .. } => write!(f, "Gzip({:?})", inner),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    status: HttpStatus,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: HttpStatus) -> Self {
        let mut response = Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        };
        if !status.is_bodiless() {
            response.set_header("Content-Length", "0");
        }
        response
    }

    /// A plain-text response, the shape used for every error page.
    pub fn text(status: HttpStatus, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(Body::Bytes(body.into().into_bytes()))
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(HttpStatus::MovedPermanently).with_header("Location", location)
    }

    pub fn not_found() -> Self {
        Self::text(HttpStatus::NotFound, "404 page not found")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.set_body(body);
        self
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    /// Replaces any existing header of the same name (case-insensitively).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove_header(&name);
        self.headers.push((name, value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Sets the body and its `Content-Length`. Bodies of unknown length go
    /// without one and are delimited by closing the connection.
    pub fn set_body(&mut self, body: Body) {
        if !self.status.is_bodiless() {
            match body.len() {
                Some(len) => self.set_header("Content-Length", len.to_string()),
                None => self.remove_header("Content-Length"),
            }
        }
        self.body = body;
    }

    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Empty)
    }

    /// Reads the full body into memory. Meant for tests and small bodies.
    pub fn read_body(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.body.len().unwrap_or_default() as usize);
        self.body.copy_to(&mut out)?;
        Ok(out)
    }

    /// Serializes the response. With `head_only` the body is omitted but the
    /// headers, including `Content-Length`, are sent as for `GET`.
    pub fn write_to<W: Write>(mut self, out: &mut W, head_only: bool) -> io::Result<()> {
        let mut head = self.status.as_response_line();
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("Connection: close\r\n\r\n");
        out.write_all(head.as_bytes())?;

        if !head_only && !self.status.is_bodiless() {
            self.body.copy_to(out)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_head_and_body() {
        let response = Response::text(HttpStatus::Ok, "Ok");
        let mut out = Vec::new();
        response.write_to(&mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nOk"));
    }

    #[test]
    fn head_only_omits_body_but_keeps_length() {
        let response = Response::text(HttpStatus::Ok, "hello");
        let mut out = Vec::new();
        response.write_to(&mut out, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut response = Response::new(HttpStatus::Ok).with_header("X-Test", "a");
        response.set_header("x-test", "b");
        assert_eq!(response.header("X-TEST"), Some("b"));
        assert_eq!(
            response
                .headers()
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case("x-test"))
                .count(),
            1
        );
    }

    #[test]
    fn gzip_body_streams_without_a_length() {
        use flate2::read::GzDecoder;

        let pool = GzipPool::new(1);
        let mut response = Response::text(HttpStatus::Ok, "squeeze me");
        let inner = response.take_body();
        response.set_body(Body::Gzip {
            inner: Box::new(inner),
            pool: Arc::clone(&pool),
        });
        assert_eq!(response.header("Content-Length"), None);

        let mut out = Vec::new();
        response.write_to(&mut out, false).unwrap();
        let split = out.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let mut plain = String::new();
        GzDecoder::new(&out[split..]).read_to_string(&mut plain).unwrap();
        assert_eq!(plain, "squeeze me");
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn not_modified_has_no_length_or_body() {
        let response = Response::new(HttpStatus::NotModified);
        assert_eq!(response.header("Content-Length"), None);
    }
}
