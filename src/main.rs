use clap::Parser;
use log::{error, info};

use spa_static_server::context::{AppContext, mount_prefix};
use spa_static_server::logger;
use spa_static_server::server::HttpServer;
use spa_static_server::server::config::ServerConfig;

fn main() {
    let config = ServerConfig::parse();

    if let Err(e) = logger::init(config.log_timezone, config.log_file.as_deref()) {
        eprintln!("Can't open log file: {}", e);
        std::process::exit(5);
    }
    info!(
        "Starting static server for {:?} (fallback {:?})",
        config.path, config.fallback
    );

    let server = AppContext::initialize(&config)
        .and_then(|context| HttpServer::new(&config, &context));
    let server = match server {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    match server.local_addr() {
        Ok(addr) => info!("Listening at {} {}/...", addr, mount_prefix(&config.context)),
        Err(e) => error!("Unable to read listening address: {}", e),
    }
    server.run();
}
