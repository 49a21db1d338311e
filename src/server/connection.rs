use log::{debug, error, warn};
use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use super::http_status::HttpStatus;
use super::request::{Request, RequestError};
use super::response::Response;
use crate::pipeline::Router;

/// How long a worker waits for a client to finish sending its request head.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves exactly one request on `stream`, then closes it.
pub fn handle_client(stream: TcpStream, router: &Router) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => "unknown".to_string(),
    };

    debug!("Handling request from {}", peer_addr);

    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
        warn!("Unable to set read timeout for {}: {}", peer_addr, e);
    }

    let reader = match stream.try_clone() {
        Ok(reader) => BufReader::new(reader),
        Err(e) => {
            error!("Error cloning stream for {}: {}", peer_addr, e);
            return;
        }
    };

    let (response, head_only) = match Request::parse(reader) {
        Ok(request) => {
            let head_only = request.is_head();
            (router.dispatch(request), head_only)
        }
        Err(RequestError::Empty) => {
            debug!("Connection closed by client {}", peer_addr);
            return;
        }
        Err(RequestError::Io(e)) => {
            debug!("Error reading from {}: {}", peer_addr, e);
            return;
        }
        Err(RequestError::HeadTooLarge) => {
            warn!("Oversized request head from {}", peer_addr);
            (
                Response::text(
                    HttpStatus::RequestHeaderFieldsTooLarge,
                    "431 Request Header Fields Too Large",
                ),
                false,
            )
        }
        Err(e) => {
            warn!("Bad request from {}: {}", peer_addr, e);
            (Response::text(HttpStatus::BadRequest, "400 Bad Request"), false)
        }
    };

    let status = response.status();
    let mut writer = BufWriter::new(&stream);
    if let Err(e) = response.write_to(&mut writer, head_only) {
        debug!("Error sending response to {}: {}", peer_addr, e);
        return;
    }

    debug!("Sent {} to {}", status.code(), peer_addr);
}
