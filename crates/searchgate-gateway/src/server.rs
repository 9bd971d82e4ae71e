//! The HTTP server loop.
//!
//! One task per connection; each request is buffered, dispatched through the
//! gateway, and written back. `SIGINT` stops accepting and returns cleanly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use searchgate_core::{GatewayError, GatewayResult};
use searchgate_middleware::{Response, ResponseExt};

use crate::config::GatewayConfig;
use crate::gateway::Gateway;

/// The gateway's TCP listener and accept loop.
pub struct GatewayServer {
    config: GatewayConfig,
    gateway: Arc<Gateway>,
}

impl GatewayServer {
    /// Creates a server over an assembled gateway.
    #[must_use]
    pub fn new(config: GatewayConfig, gateway: Arc<Gateway>) -> Self {
        Self { config, gateway }
    }

    /// Runs until `SIGINT`.
    pub async fn run(self) -> GatewayResult<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .listen_addr
                .parse()
                .map_err(|e| GatewayError::internal(format!("invalid listen address: {e}")))?,
            self.config.server.listen_port,
        );

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::internal(format!("failed to bind {addr}: {e}")))?;

        info!("searchgate listening on {addr}");

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("failed to accept connection: {e}");
                        continue;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
            };

            let gateway = self.gateway.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let gateway = gateway.clone();
                    async move { handle_request(req, gateway, peer_addr).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("connection error: {e}");
                }
            });
        }
    }
}

async fn handle_request(
    request: http::Request<Incoming>,
    gateway: Arc<Gateway>,
    peer_addr: SocketAddr,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(Response::json(
                StatusCode::BAD_REQUEST,
                &GatewayError::bad_request("can't read request body").envelope(),
            ));
        }
    };

    let request = http::Request::from_parts(parts, Full::new(body_bytes));
    Ok(gateway.dispatch(request, Some(peer_addr)).await)
}
