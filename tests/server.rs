use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use tempfile::{TempDir, tempdir};

use spa_static_server::context::AppContext;
use spa_static_server::server::HttpServer;
use spa_static_server::server::config::ServerConfig;

fn start(configure: impl FnOnce(&mut ServerConfig)) -> (TempDir, SocketAddr) {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<html>{'env' : 'dev'}</html>").unwrap();
    fs::write(dir.path().join("style.css"), "body { color: red; }").unwrap();

    let mut config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        threads: 4,
        path: dir.path().to_path_buf(),
        header_config_path: dir.path().join("headerConfig.json"),
        ..ServerConfig::default()
    };
    configure(&mut config);

    let context = AppContext::initialize(&config).unwrap();
    let server = HttpServer::new(&config, &context).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    (dir, addr)
}

fn send(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn serves_the_rewritten_shell_over_tcp() {
    let (_dir, addr) = start(|config| {
        config.substitutions = vec!["env".into(), "prod".into()];
    });

    let response = send(addr, "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("Content-Type: text/html\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.ends_with("<html>{'env':'prod'}</html>"));
}

#[test]
fn serves_files_and_head_requests() {
    let (_dir, addr) = start(|_| {});

    let response = send(addr, "GET /style.css HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(response.contains("Content-Type: text/css; charset=utf-8\r\n"), "{response}");
    assert!(response.ends_with("body { color: red; }"));

    let response = send(addr, "HEAD /style.css HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(response.contains("Content-Length: 20\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\n"));
}

#[test]
fn malformed_requests_get_400() {
    let (_dir, addr) = start(|_| {});
    let response = send(addr, "NONSENSE\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
}

#[test]
fn health_and_auth_challenge() {
    let (_dir, addr) = start(|config| {
        config.enable_health = true;
        config.set_basic_auth = Some("user:pass".into());
    });

    let response = send(addr, "GET /health HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("\r\n\r\nOk"));

    let response = send(addr, "GET /style.css HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 401 Unauthorized\r\n"), "{response}");
    assert!(response.contains("WWW-Authenticate: Basic realm=\"Restricted\"\r\n"));

    let response = send(
        addr,
        "GET /style.css HTTP/1.1\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
}
