//! Static/form HTTP front end.
//!
//! Serves the fixed pages and arbitrary static files from the web root, and
//! forwards every POST body verbatim as one UDP datagram to the relay
//! listener. The browser always gets a 302 back to `/` on POST; datagram
//! delivery is fire-and-forget and never reflected in the response.

pub mod mime;

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Page served for `GET /`.
const INDEX_PAGE: &str = "index.html";

/// Page served for `GET /message.html`.
const MESSAGE_PAGE: &str = "message.html";

/// Page served alongside a 404 status.
const ERROR_PAGE: &str = "error.html";

/// The HTTP front end.
///
/// Owns the listening socket and the shared request-handling state. Dropping
/// the server releases the socket.
#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

/// State shared by all connections.
#[derive(Debug)]
struct AppState {
    /// Directory static files are confined to.
    web_root: PathBuf,
    /// Where POST bodies are relayed to.
    relay_addr: SocketAddr,
    /// Outbound socket for relaying, bound once at startup.
    relay_socket: UdpSocket,
}

impl HttpServer {
    /// Bind the HTTP listener and the outbound relay socket.
    ///
    /// # Errors
    ///
    /// Returns an error if either socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        web_root: PathBuf,
        relay_addr: SocketAddr,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::bind(addr, source))?;

        // Ephemeral local port in the same address family as the relay
        let outbound: SocketAddr = match relay_addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let relay_socket = UdpSocket::bind(outbound)
            .await
            .map_err(|source| Error::bind(outbound, source))?;

        Ok(Self {
            listener,
            state: Arc::new(AppState {
                web_root,
                relay_addr,
                relay_socket,
            }),
        })
    }

    /// The address the listener is actually bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be retrieved.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until the task is cancelled.
    ///
    /// # Errors
    ///
    /// Never returns `Ok`; accept failures are logged and the loop continues.
    pub async fn run(self) -> Result<()> {
        info!("HTTP server listening on {}", self.listener.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    warn!("Failed to accept connection: {err}");
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move {
                        Ok::<_, std::convert::Infallible>(state.handle(req).await)
                    }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("Connection from {peer} ended: {err}");
                }
            });
        }
    }
}

impl AppState {
    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        match *req.method() {
            Method::GET => self.handle_get(req.uri().path()).await,
            Method::POST => self.handle_post(req).await,
            _ => response(
                StatusCode::METHOD_NOT_ALLOWED,
                "text/plain; charset=utf-8",
                Bytes::from_static(b"Method not allowed"),
            ),
        }
    }

    async fn handle_get(&self, path: &str) -> Response<Full<Bytes>> {
        match path {
            "/" => self.serve_page(INDEX_PAGE, StatusCode::OK).await,
            "/message.html" => self.serve_page(MESSAGE_PAGE, StatusCode::OK).await,
            other => self.serve_static(other).await,
        }
    }

    /// Serve one of the fixed HTML pages.
    async fn serve_page(&self, name: &str, status: StatusCode) -> Response<Full<Bytes>> {
        match tokio::fs::read(self.web_root.join(name)).await {
            Ok(body) => response(status, "text/html; charset=utf-8", body.into()),
            Err(err) => {
                warn!("Fixed page {name} unreadable: {err}");
                response(status, "text/html; charset=utf-8", Bytes::new())
            }
        }
    }

    async fn serve_static(&self, request_path: &str) -> Response<Full<Bytes>> {
        let Some(relative) = sanitize_path(request_path) else {
            debug!("Rejected request path {request_path:?}");
            return self.not_found().await;
        };

        let full = self.web_root.join(relative);
        match tokio::fs::read(&full).await {
            Ok(body) => response(StatusCode::OK, mime::guess(&full), body.into()),
            Err(_) => self.not_found().await,
        }
    }

    async fn not_found(&self) -> Response<Full<Bytes>> {
        self.serve_page(ERROR_PAGE, StatusCode::NOT_FOUND).await
    }

    /// Forward the POST body to the relay listener and redirect home.
    ///
    /// The redirect never depends on the relay outcome; a failed send is a
    /// logged information loss and nothing more.
    async fn handle_post(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        match req.into_body().collect().await {
            Ok(collected) => {
                let body = collected.to_bytes();
                match self.relay_socket.send_to(&body, self.relay_addr).await {
                    Ok(sent) => debug!("Relayed {sent} byte(s) to {}", self.relay_addr),
                    Err(err) => {
                        warn!("Failed to relay submission to {}: {err}", self.relay_addr);
                    }
                }
            }
            Err(err) => warn!("Failed to read request body: {err}"),
        }

        redirect_home()
    }
}

/// Normalize a request path into a relative path that cannot escape the
/// web root. Any parent-directory, root, or prefix component rejects the
/// whole path.
fn sanitize_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');

    let mut clean = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn response(status: StatusCode, content_type: &str, body: Bytes) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(body));
    *res.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        res.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    res
}

fn redirect_home() -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(Bytes::new()));
    *res.status_mut() = StatusCode::FOUND;
    res.headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static("/"));
    res
}
