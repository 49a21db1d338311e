use chrono::{DateTime, Utc};
use log::{debug, error, info};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fs::File;
use std::io;

use crate::fallback::{Asset, FallbackFileSystem, Match, RequestPath, ResolvedAsset};
use crate::pipeline::Handler;
use crate::server::http_status::HttpStatus;
use crate::server::request::Request;
use crate::server::response::{Body, Response};

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Characters escaped in a relative redirect to a directory.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'<')
    .add(b'>');

/// Terminal handler: resolves the path through the fallback filesystem and
/// streams the file.
pub struct FileServer {
    files: FallbackFileSystem,
}

impl FileServer {
    pub fn new(files: FallbackFileSystem) -> Self {
        Self { files }
    }

    fn serve_asset(&self, request: &Request, asset: Asset) -> Response {
        let modified = asset.metadata.modified().ok().map(DateTime::<Utc>::from);

        if let (Some(modified), Some(since)) = (
            modified,
            request.header("If-Modified-Since").and_then(parse_http_date),
        ) {
            if modified.timestamp() <= since.timestamp() {
                return Response::new(HttpStatus::NotModified)
                    .with_header("Last-Modified", format_http_date(modified));
            }
        }

        let file = match File::open(&asset.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Response::not_found(),
            Err(e) => {
                error!("Error opening file {:?}: {}", asset.path, e);
                return Response::text(
                    HttpStatus::InternalServerError,
                    "500 Internal Server Error",
                );
            }
        };

        let mime = mime_guess::from_path(&asset.path).first_or_octet_stream();
        let content_type = if mime.type_() == mime_guess::mime::TEXT
            && mime.get_param("charset").is_none()
        {
            format!("{}; charset=utf-8", mime.essence_str())
        } else {
            mime.to_string()
        };

        let len = asset.metadata.len();
        let mut response = Response::new(HttpStatus::Ok).with_header("Content-Type", content_type);
        if let Some(modified) = modified {
            response.set_header("Last-Modified", format_http_date(modified));
        }
        debug!("Serving {:?} ({} bytes)", asset.path, len);
        response.with_body(Body::File { file, len })
    }
}

impl Handler for FileServer {
    fn serve(&self, request: Request) -> Response {
        if request.method() != "GET" && !request.is_head() {
            return Response::text(HttpStatus::MethodNotAllowed, "405 method not allowed")
                .with_header("Allow", "GET, HEAD");
        }

        let path = match RequestPath::parse(request.path()) {
            Ok(path) => path,
            Err(e) => {
                info!("Rejected request path {:?}: {}", request.path(), e);
                return Response::text(HttpStatus::BadRequest, "invalid URL path");
            }
        };

        match self.files.open(&path) {
            ResolvedAsset::NotFound => Response::not_found(),
            ResolvedAsset::Found(asset) => {
                if asset.matched == Match::DirectoryIndex
                    && !path.is_root()
                    && !path.has_trailing_slash()
                {
                    let name = utf8_percent_encode(path.file_name(), SEGMENT);
                    let query = request
                        .target()
                        .split_once('?')
                        .map(|(_, query)| format!("?{}", query))
                        .unwrap_or_default();
                    return Response::redirect(format!("{}/{}", name, query));
                }
                self.serve_asset(&request, asset)
            }
        }
    }
}

pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE).to_string()
}

pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
