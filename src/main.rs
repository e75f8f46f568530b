use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::sync::Arc;
use tokio::net::TcpListener;

mod config;
mod handler;
mod logger;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let listener = create_reusable_listener(addr)?;
    let config = Arc::new(cfg);

    logger::log_server_start(&addr, &config);

    loop {
        match listener.accept().await {
            Ok((stream, _peer_addr)) => {
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    serve_connection(stream, config).await;
                });
            }
            Err(e) => {
                logger::log_error(&format!("Failed to accept connection: {e}"));
            }
        }
    }
}

async fn serve_connection(stream: tokio::net::TcpStream, config: Arc<config::Config>) {
    let io = TokioIo::new(stream);

    let conn = http1::Builder::new().keep_alive(true).serve_connection(
        io,
        service_fn(move |req| {
            let config = Arc::clone(&config);
            async move { handler::handle_request(req, config).await }
        }),
    );

    if let Err(err) = conn.await {
        logger::log_connection_error(&err);
    }
}

/// Create a `TcpListener` with `SO_REUSEADDR` enabled, so restarts can
/// rebind a port still in TIME_WAIT.
fn create_reusable_listener(addr: std::net::SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
