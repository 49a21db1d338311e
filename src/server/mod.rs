pub mod config;
pub mod connection;
pub mod http_status;
pub mod request;
pub mod response;

use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use threadpool::ThreadPool;

use crate::context::AppContext;
use crate::error::StartupError;
use crate::pipeline::Router;
use config::ServerConfig;
use connection::handle_client;

/// Accepts connections and runs each one on a pool worker from start to finish.
pub struct HttpServer {
    listener: TcpListener,
    router: Arc<Router>,
    thread_pool: ThreadPool,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, context: &AppContext) -> Result<Self, StartupError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .map_err(|e| StartupError::Io(format!("unable to listen on {}", addr), e))?;

        let router = Router::new(context);
        info!("Pipeline stages: {}", router.stage_names().join(" -> "));

        Ok(Self {
            listener,
            router: Arc::new(router),
            thread_pool: ThreadPool::new(config.threads.max(1)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Runs the accept loop forever.
    pub fn run(&self) {
        info!(
            "Server running with {} threads",
            self.thread_pool.max_count()
        );

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let router = Arc::clone(&self.router);
                    self.thread_pool.execute(move || handle_client(stream, &router));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
