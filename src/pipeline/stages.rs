use log::{debug, info};
use std::sync::Arc;

use super::gzip_pool::GzipPool;
use super::{BoxHandler, Handler, Stage};
use crate::context::Shell;
use crate::credentials::Credential;
use crate::fallback::RequestPath;
use crate::header_config::{ExtraHeader, HeaderConfig};
use crate::server::http_status::HttpStatus;
use crate::server::request::Request;
use crate::server::response::{Body, Response};

pub const HTTPS_REDIRECT: &str = "https-redirect";
pub const REQUEST_LOGGING: &str = "request-logging";
pub const STRIP_PREFIX: &str = "strip-prefix";
pub const FALLBACK_SHELL: &str = "fallback-shell";
pub const BASIC_AUTH: &str = "basic-auth";
pub const CUSTOM_HEADERS: &str = "custom-headers";
pub const COMPRESSION: &str = "compression";

/// Header set by the TLS-terminating proxy with the client-facing scheme.
pub const FORWARDED_PROTO: &str = "X-Forwarded-Proto";

const AUTH_REALM: &str = "Basic realm=\"Restricted\"";

struct HttpsRedirect {
    next: BoxHandler,
    log_requests: bool,
}

impl Handler for HttpsRedirect {
    fn serve(&self, request: Request) -> Response {
        if request.header(FORWARDED_PROTO) != Some("http") {
            return self.next.serve(request);
        }

        let host = request.header("Host").unwrap_or_default();
        if self.log_requests {
            info!("301 {} {}", request.method(), request.path());
        }
        Response::redirect(format!("https://{}{}", host, request.target()))
    }
}

pub fn https_redirect(log_requests: bool) -> Stage {
    Stage::new(HTTPS_REDIRECT, move |next: BoxHandler| -> BoxHandler {
        Box::new(HttpsRedirect { next, log_requests })
    })
}

struct RequestLogging {
    next: BoxHandler,
}

impl Handler for RequestLogging {
    fn serve(&self, request: Request) -> Response {
        info!("{} {}", request.method(), request.path());
        self.next.serve(request)
    }
}

pub fn request_logging() -> Stage {
    Stage::new(REQUEST_LOGGING, |next: BoxHandler| -> BoxHandler {
        Box::new(RequestLogging { next })
    })
}

struct StripPrefix {
    next: BoxHandler,
    prefix: String,
}

impl Handler for StripPrefix {
    fn serve(&self, mut request: Request) -> Response {
        let Some(rest) = request.path().strip_prefix(self.prefix.as_str()) else {
            return Response::not_found();
        };
        let rest = rest.to_string();
        request.set_path(rest);
        self.next.serve(request)
    }
}

pub fn strip_prefix(prefix: String) -> Stage {
    Stage::new(STRIP_PREFIX, move |next: BoxHandler| -> BoxHandler {
        Box::new(StripPrefix { next, prefix })
    })
}

struct FallbackShell {
    next: BoxHandler,
    shell: Shell,
}

impl FallbackShell {
    fn is_shell_request(&self, request: &Request) -> bool {
        if request.method() != "GET" && !request.is_head() {
            return false;
        }
        match RequestPath::parse(request.path()) {
            Ok(path) => path.is_root() || path == self.shell.path,
            Err(_) => false,
        }
    }
}

impl Handler for FallbackShell {
    fn serve(&self, request: Request) -> Response {
        if !self.is_shell_request(&request) {
            return self.next.serve(request);
        }
        debug!("Serving shell document for {}", request.path());
        Response::new(HttpStatus::Ok)
            .with_header("Content-Type", self.shell.content_type.as_str())
            .with_body(Body::Shared(Arc::clone(&self.shell.bytes)))
    }
}

pub fn fallback_shell(shell: Shell) -> Stage {
    Stage::new(FALLBACK_SHELL, move |next: BoxHandler| -> BoxHandler {
        Box::new(FallbackShell { next, shell })
    })
}

struct BasicAuth {
    next: BoxHandler,
    credential: Credential,
}

impl Handler for BasicAuth {
    fn serve(&self, request: Request) -> Response {
        let authorized = request
            .header("Authorization")
            .is_some_and(|value| self.credential.matches_header(value));
        if authorized {
            return self.next.serve(request);
        }
        debug!("Challenging unauthenticated request for {}", request.path());
        Response::text(HttpStatus::Unauthorized, "Unauthorized.")
            .with_header("WWW-Authenticate", AUTH_REALM)
    }
}

pub fn basic_auth(credential: Credential) -> Stage {
    Stage::new(BASIC_AUTH, move |next: BoxHandler| -> BoxHandler {
        Box::new(BasicAuth { next, credential })
    })
}

struct CustomHeaders {
    next: BoxHandler,
    config: HeaderConfig,
}

impl Handler for CustomHeaders {
    fn serve(&self, request: Request) -> Response {
        let path = request.path().to_string();
        let mut response = self.next.serve(request);
        for (name, value) in self.config.lookup(&path) {
            response.set_header(name, value);
        }
        response
    }
}

pub fn custom_headers(config: HeaderConfig) -> Stage {
    Stage::new(CUSTOM_HEADERS, move |next: BoxHandler| -> BoxHandler {
        Box::new(CustomHeaders { next, config })
    })
}

/// Adds the `--append-header` header to every response and gzips bodies for
/// clients that accept it. Compression happens while the body is written to
/// the client.
struct Compression {
    next: BoxHandler,
    header: ExtraHeader,
    pool: Arc<GzipPool>,
}

impl Handler for Compression {
    fn serve(&self, request: Request) -> Response {
        let accepts_gzip = request
            .header("Accept-Encoding")
            .is_some_and(|value| value.contains("gzip"));
        let mut response = self.next.serve(request);
        response.set_header(self.header.name.as_str(), self.header.value.as_str());

        if !accepts_gzip
            || response.status().is_bodiless()
            || response.header("Content-Encoding").is_some()
            || response.body().is_empty()
        {
            return response;
        }

        response.set_header("Content-Encoding", "gzip");
        response.set_header("Vary", "Accept-Encoding");
        let inner = response.take_body();
        response.set_body(Body::Gzip {
            inner: Box::new(inner),
            pool: Arc::clone(&self.pool),
        });
        response
    }
}

pub fn compression(header: ExtraHeader, pool: Arc<GzipPool>) -> Stage {
    Stage::new(COMPRESSION, move |next: BoxHandler| -> BoxHandler {
        Box::new(Compression { next, header, pool })
    })
}
