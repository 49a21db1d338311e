//! Request pipeline.
//!
//! The server's behaviour is a fixed, ordered list of named [`Stage`]s
//! wrapped around the [`FileServer`]. Each stage either answers a request
//! itself, in which case no inner stage runs, or hands it to the next one.
//! Which stages are present depends on the [`AppContext`]; their relative
//! order never changes.

pub mod gzip_pool;
pub mod stages;

use std::sync::Arc;

use crate::context::AppContext;
use crate::file_server::FileServer;
use crate::server::http_status::HttpStatus;
use crate::server::request::Request;
use crate::server::response::Response;
use gzip_pool::GzipPool;

/// Idle compression buffers kept between requests.
pub const GZIP_POOL_SIZE: usize = 32;

pub const HEALTH_PATH: &str = "/health";

pub trait Handler: Send + Sync {
    fn serve(&self, request: Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(Request) -> Response + Send + Sync,
{
    fn serve(&self, request: Request) -> Response {
        self(request)
    }
}

pub type BoxHandler = Box<dyn Handler>;

/// A named decorator: given the next handler inward, produce this layer.
pub struct Stage {
    name: &'static str,
    wrap: Box<dyn FnOnce(BoxHandler) -> BoxHandler>,
}

impl Stage {
    pub fn new<F>(name: &'static str, wrap: F) -> Self
    where
        F: FnOnce(BoxHandler) -> BoxHandler + 'static,
    {
        Self {
            name,
            wrap: Box::new(wrap),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Stages listed outermost first.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// The canonical stage order for a configured server.
    pub fn for_context(ctx: &AppContext, pool: Arc<GzipPool>) -> Self {
        let mut pipeline = Pipeline::new();
        if ctx.https_promote {
            pipeline = pipeline.push(stages::https_redirect(ctx.log_requests));
        }
        if ctx.log_requests {
            pipeline = pipeline.push(stages::request_logging());
        }
        if !ctx.mount_prefix.is_empty() {
            pipeline = pipeline.push(stages::strip_prefix(ctx.mount_prefix.clone()));
        }
        if let Some(shell) = &ctx.shell {
            pipeline = pipeline.push(stages::fallback_shell(shell.clone()));
        }
        if let Some(credential) = &ctx.credential {
            pipeline = pipeline.push(stages::basic_auth(credential.clone()));
        }
        if let Some(config) = &ctx.header_config {
            pipeline = pipeline.push(stages::custom_headers(config.clone()));
        }
        if let Some(header) = &ctx.extra_header {
            pipeline = pipeline.push(stages::compression(header.clone(), pool));
        }
        pipeline
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Wraps `terminal` in every stage, innermost last-listed first.
    pub fn build(self, terminal: BoxHandler) -> BoxHandler {
        self.stages
            .into_iter()
            .rev()
            .fold(terminal, |next, stage| (stage.wrap)(next))
    }
}

/// Top-level dispatch: the health endpoint sits beside the pipeline, and only
/// requests under the mount prefix enter it.
pub struct Router {
    health_check: bool,
    mount_prefix: String,
    stage_names: Vec<&'static str>,
    pipeline: BoxHandler,
    pool: Arc<GzipPool>,
}

impl Router {
    pub fn new(ctx: &AppContext) -> Self {
        Self::with_pool(ctx, GzipPool::new(GZIP_POOL_SIZE))
    }

    pub fn with_pool(ctx: &AppContext, pool: Arc<GzipPool>) -> Self {
        let pipeline = Pipeline::for_context(ctx, Arc::clone(&pool));
        let stage_names = pipeline.stage_names();
        let terminal: BoxHandler = Box::new(FileServer::new(ctx.files.clone()));
        Self {
            health_check: ctx.health_check,
            mount_prefix: ctx.mount_prefix.clone(),
            stage_names,
            pipeline: pipeline.build(terminal),
            pool,
        }
    }

    pub fn stage_names(&self) -> &[&'static str] {
        &self.stage_names
    }

    pub fn gzip_pool(&self) -> &Arc<GzipPool> {
        &self.pool
    }

    pub fn dispatch(&self, request: Request) -> Response {
        if self.health_check && request.path() == HEALTH_PATH {
            return Response::text(HttpStatus::Ok, "Ok");
        }

        if self.mount_prefix.is_empty() {
            return self.pipeline.serve(request);
        }

        let path = request.path();
        match path.strip_prefix(self.mount_prefix.as_str()) {
            Some("") => {
                let query = request
                    .target()
                    .split_once('?')
                    .map(|(_, q)| format!("?{}", q))
                    .unwrap_or_default();
                Response::redirect(format!("{}/{}", self.mount_prefix, query))
            }
            Some(rest) if rest.starts_with('/') => self.pipeline.serve(request),
            _ => Response::not_found(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Stage {
        Stage::new(name, move |next: BoxHandler| -> BoxHandler {
            Box::new(move |request: Request| {
                log.lock().unwrap().push(name);
                next.serve(request)
            })
        })
    }

    #[test]
    fn stages_run_outermost_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .push(recording("outer", Arc::clone(&log)))
            .push(recording("middle", Arc::clone(&log)))
            .push(recording("inner", Arc::clone(&log)));
        assert_eq!(pipeline.stage_names(), vec!["outer", "middle", "inner"]);

        let terminal_log = Arc::clone(&log);
        let handler = pipeline.build(Box::new(move |_: Request| {
            terminal_log.lock().unwrap().push("terminal");
            Response::new(HttpStatus::Ok)
        }));
        handler.serve(Request::new("GET", "/"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer", "middle", "inner", "terminal"]
        );
    }

    #[test]
    fn short_circuit_skips_inner_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .push(Stage::new("gate", |_next: BoxHandler| -> BoxHandler {
                Box::new(|_: Request| Response::new(HttpStatus::Unauthorized))
            }))
            .push(recording("inner", Arc::clone(&log)));

        let handler = pipeline.build(Box::new(|_: Request| Response::new(HttpStatus::Ok)));
        let response = handler.serve(Request::new("GET", "/"));

        assert_eq!(response.status(), HttpStatus::Unauthorized);
        assert!(log.lock().unwrap().is_empty());
    }
}
