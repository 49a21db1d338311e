//! Static-asset HTTP server for single-page applications.
//!
//! Requests pass through a fixed pipeline of stages (HTTPS promotion, access
//! logging, mount prefix stripping, the in-memory shell document, basic auth,
//! configured headers, compression) before reaching a file server that
//! resolves misses through a fallback rule.

pub mod context;
pub mod credentials;
pub mod error;
pub mod fallback;
pub mod file_server;
pub mod header_config;
pub mod logger;
pub mod pipeline;
pub mod server;
pub mod template;
