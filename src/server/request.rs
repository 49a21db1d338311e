use log::debug;
use percent_encoding::percent_decode_str;
use std::io::{BufRead, Read};
use thiserror::Error;

/// Upper bound on the size of a request head (request line plus headers).
pub const MAX_HEAD_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("connection closed before a request was received")]
    Empty,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request head exceeds {} bytes", MAX_HEAD_SIZE)]
    HeadTooLarge,

    #[error("error reading request: {0}")]
    Io(#[from] std::io::Error),
}

/// An HTTP/1.x request head.
///
/// `target` is the request target exactly as received and never changes;
/// `path` is its percent-decoded path component, which inner pipeline stages
/// may rewrite (mount prefix stripping).
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    target: String,
    path: String,
    headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        let path = decode_path(&target);
        Self {
            method: method.into(),
            target,
            path,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Reads one request head from `reader`. The body, if any, is left unread.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, RequestError> {
        let mut limited = reader.take(MAX_HEAD_SIZE as u64 + 1);
        let mut consumed = 0usize;

        let request_line = match read_head_line(&mut limited, &mut consumed)? {
            Some(line) if !line.is_empty() => line,
            Some(_) => return Err(RequestError::Malformed("empty request line".into())),
            None => return Err(RequestError::Empty),
        };

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 || !parts[2].starts_with("HTTP/") {
            return Err(RequestError::Malformed(format!(
                "bad request line: {}",
                request_line
            )));
        }

        let mut request = Request::new(parts[0], parts[1]);
        debug!("Parsing request: {} {}", request.method, request.target);

        loop {
            let line = read_head_line(&mut limited, &mut consumed)?
                .ok_or_else(|| RequestError::Malformed("unterminated request head".into()))?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| RequestError::Malformed(format!("bad header line: {}", line)))?;
            if name.is_empty() || name.ends_with(char::is_whitespace) {
                return Err(RequestError::Malformed(format!("bad header name: {}", name)));
            }
            request.headers.push((name.to_string(), value.trim().to_string()));
        }

        Ok(request)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Case-insensitive lookup of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_head(&self) -> bool {
        self.method == "HEAD"
    }
}

fn read_head_line<R: BufRead>(
    reader: &mut R,
    consumed: &mut usize,
) -> Result<Option<String>, RequestError> {
    let mut raw = Vec::new();
    let n = reader.read_until(b'\n', &mut raw)?;
    if n == 0 {
        return if *consumed > MAX_HEAD_SIZE {
            Err(RequestError::HeadTooLarge)
        } else {
            Ok(None)
        };
    }
    *consumed += n;
    if *consumed > MAX_HEAD_SIZE {
        return Err(RequestError::HeadTooLarge);
    }
    if raw.last() != Some(&b'\n') {
        return Err(RequestError::Malformed("unterminated request head".into()));
    }
    let line = String::from_utf8_lossy(&raw);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Extracts and percent-decodes the path component of a request target.
/// Absolute-form targets (`http://host/path`) are reduced to their path.
fn decode_path(target: &str) -> String {
    let without_query = target.split(['?', '#']).next().unwrap_or_default();
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => without_query,
    };
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_request_line_and_headers() {
        let raw = "GET /app/a%20b?x=1 HTTP/1.1\r\nHost: example.com\r\nX-Forwarded-Proto: http\r\n\r\n";
        let request = Request::parse(Cursor::new(raw)).unwrap();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.target(), "/app/a%20b?x=1");
        assert_eq!(request.path(), "/app/a b");
        assert_eq!(request.header("host"), Some("example.com"));
        assert_eq!(request.header("x-forwarded-proto"), Some("http"));
    }

    #[test]
    fn accepts_bare_newlines() {
        let request = Request::parse(Cursor::new("HEAD / HTTP/1.0\n\n")).unwrap();
        assert!(request.is_head());
        assert_eq!(request.path(), "/");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Request::parse(Cursor::new("hello\r\n\r\n")),
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(Request::parse(Cursor::new("")), Err(RequestError::Empty)));
        assert!(matches!(
            Request::parse(Cursor::new("GET / HTTP/1.1\r\nHost: x\r\n")),
            Err(RequestError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_oversized_head() {
        let raw = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(MAX_HEAD_SIZE));
        assert!(matches!(
            Request::parse(Cursor::new(raw)),
            Err(RequestError::HeadTooLarge)
        ));
    }

    #[test]
    fn absolute_form_target_is_reduced_to_path() {
        let request = Request::new("GET", "http://example.com/docs/page?q");
        assert_eq!(request.path(), "/docs/page");
    }
}
