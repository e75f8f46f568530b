use chrono::Local;
use hyper::{Method, StatusCode};
use std::net::SocketAddr;

use crate::config::Config;

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    println!("======================================");
    println!("respond demo server started");
    println!("Listening on: http://{addr}");
    println!("Serving files from: {}", config.files.root);
    if let Some(workers) = config.server.workers {
        println!("Worker threads: {workers}");
    }
    println!("======================================\n");
}

pub fn log_request(method: &Method, path: &str) {
    println!("[{}] [Request] {method} {path}", timestamp());
}

pub fn log_response(status: StatusCode, size: usize) {
    println!("[{}] [Response] {status} ({size} bytes)", timestamp());
}

pub fn log_warning(msg: &str) {
    eprintln!("[{}] [Warn] {msg}", timestamp());
}

pub fn log_error(msg: &str) {
    eprintln!("[{}] [Error] {msg}", timestamp());
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    eprintln!("[{}] [Error] Failed to serve connection: {err:?}", timestamp());
}
