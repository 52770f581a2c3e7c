// HTTP transport seam and the construction-time transport resolver

use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    // The request never reached the remote service
    #[error("connection failed: {0}")]
    Connect(String),

    // Failed after connecting; the request may have been delivered
    #[error("transport failure: {0}")]
    Io(String),
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// Default transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    // A send error without is_connect() can still mean the peer saw the request
    if err.is_connect() || err.is_builder() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

static GLOBAL_TRANSPORT: OnceLock<Arc<dyn Transport>> = OnceLock::new();

/// Installs a process-wide transport picked up by every client built
/// afterwards without an explicit one.
///
/// Returns the rejected transport if one is already installed.
pub fn install_global_transport(
    transport: Arc<dyn Transport>,
) -> Result<(), Arc<dyn Transport>> {
    GLOBAL_TRANSPORT.set(transport)
}

pub fn global_transport() -> Option<Arc<dyn Transport>> {
    GLOBAL_TRANSPORT.get().cloned()
}

// Where a resolved transport came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSource {
    Explicit,
    Global,
    Library,
}

// How a client builder wants its transport chosen
#[derive(Clone, Default)]
pub enum TransportChoice {
    #[default]
    Auto,
    Explicit(Arc<dyn Transport>),
    Unavailable,
}

impl fmt::Debug for TransportChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportChoice::Auto => f.write_str("Auto"),
            TransportChoice::Explicit(_) => f.write_str("Explicit(..)"),
            TransportChoice::Unavailable => f.write_str("Unavailable"),
        }
    }
}

#[derive(Clone)]
pub enum ResolvedTransport {
    Available {
        transport: Arc<dyn Transport>,
        source: TransportSource,
    },
    Unavailable,
}

impl ResolvedTransport {
    pub fn is_available(&self) -> bool {
        matches!(self, ResolvedTransport::Available { .. })
    }

    pub fn source(&self) -> Option<TransportSource> {
        match self {
            ResolvedTransport::Available { source, .. } => Some(*source),
            ResolvedTransport::Unavailable => None,
        }
    }
}

impl fmt::Debug for ResolvedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedTransport::Available { source, .. } => {
                f.debug_struct("Available").field("source", source).finish()
            }
            ResolvedTransport::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// Picks the first transport on offer: explicit, then process-global, then
/// the library default. Never fails; absence is `Unavailable`.
pub fn select_transport<F>(
    explicit: Option<Arc<dyn Transport>>,
    global: Option<Arc<dyn Transport>>,
    library: F,
) -> ResolvedTransport
where
    F: FnOnce() -> Option<Arc<dyn Transport>>,
{
    let (transport, source) = match (explicit, global) {
        (Some(transport), _) => (Some(transport), TransportSource::Explicit),
        (None, Some(transport)) => (Some(transport), TransportSource::Global),
        (None, None) => (library(), TransportSource::Library),
    };

    match transport {
        Some(transport) => {
            debug!(?source, "HTTP transport resolved");
            ResolvedTransport::Available { transport, source }
        }
        None => {
            warn!("No HTTP transport available, using fallback responses");
            ResolvedTransport::Unavailable
        }
    }
}

pub fn resolve_transport(choice: TransportChoice) -> ResolvedTransport {
    match choice {
        TransportChoice::Unavailable => {
            warn!("HTTP transport disabled, using fallback responses");
            ResolvedTransport::Unavailable
        }
        TransportChoice::Explicit(transport) => select_transport(Some(transport), None, || None),
        TransportChoice::Auto => select_transport(None, global_transport(), || {
            match ReqwestTransport::new() {
                Ok(transport) => Some(Arc::new(transport) as Arc<dyn Transport>),
                Err(err) => {
                    warn!(error = %err, "Failed to build reqwest client");
                    None
                }
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_server::MockServer;
    use std::net::TcpListener;
    use tokio::io::AsyncReadExt;

    fn mock() -> Arc<dyn Transport> {
        Arc::new(MockServer::new())
    }

    #[test]
    fn test_explicit_transport_wins() {
        let resolved = select_transport(Some(mock()), Some(mock()), || Some(mock()));
        assert_eq!(resolved.source(), Some(TransportSource::Explicit));
    }

    #[test]
    fn test_global_before_library() {
        let resolved = select_transport(None, Some(mock()), || {
            panic!("library transport should not be built")
        });
        assert_eq!(resolved.source(), Some(TransportSource::Global));
    }

    #[test]
    fn test_library_then_unavailable() {
        let resolved = select_transport(None, None, || Some(mock()));
        assert_eq!(resolved.source(), Some(TransportSource::Library));

        let resolved = select_transport(None, None, || None);
        assert!(!resolved.is_available());
    }

    #[test]
    fn test_forced_unavailable() {
        assert!(!resolve_transport(TransportChoice::Unavailable).is_available());
    }

    #[test]
    fn test_auto_picks_installed_global() {
        // Only this test installs the process-wide transport
        let _ = install_global_transport(mock());

        let resolved = resolve_transport(TransportChoice::Auto);
        assert_eq!(resolved.source(), Some(TransportSource::Global));
        assert!(global_transport().is_some());
    }

    #[tokio::test]
    async fn test_reqwest_refused_connection_is_connect_error() {
        // Bind then drop to get a port nobody is listening on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let transport = ReqwestTransport::new().unwrap();
        let result = transport
            .send(HttpRequest {
                method: Method::GET,
                url: format!("http://127.0.0.1:{port}/ping"),
                headers: HeaderMap::new(),
                body: None,
            })
            .await;

        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_reqwest_connection_dropped_after_send_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept, read the request, then hang up without answering
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            socket.read(&mut buf).await.unwrap()
        });

        let transport = ReqwestTransport::new().unwrap();
        let result = transport
            .send(HttpRequest {
                method: Method::POST,
                url: format!("http://{addr}/rides"),
                headers: HeaderMap::new(),
                body: Some(Bytes::from_static(b"{}")),
            })
            .await;

        assert!(server.await.unwrap() > 0);
        assert!(matches!(result, Err(TransportError::Io(_))), "got {result:?}");
    }
}
