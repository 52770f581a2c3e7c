// Connectivity self-check and the optional warm-up probe

use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use crate::dispatcher::{Dispatcher, SDK_VERSION};

pub const PING_PATH: &str = "/ping";
pub const DEFAULT_API_VERSION: &str = "3.2.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    // Answered locally by the fallback generator
    Degraded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub status: ConnectionStatus,
    #[serde(
        serialize_with = "serialize_latency",
        skip_serializing_if = "Option::is_none"
    )]
    pub latency: Option<Duration>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub cached: bool,
    pub details: Map<String, Value>,
}

fn serialize_latency<S: Serializer>(latency: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match latency {
        Some(latency) => s.serialize_str(&format!("{}ms", latency.as_millis())),
        None => s.serialize_none(),
    }
}

impl ConnectionReport {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Latency rendered the way the dashboard shows it, e.g. `"42ms"`.
    pub fn latency_label(&self) -> Option<String> {
        self.latency.map(|l| format!("{}ms", l.as_millis()))
    }

    fn detail_u64(&self, key: &str) -> Option<u64> {
        self.details.get(key).and_then(Value::as_u64)
    }
}

pub async fn test_connection(dispatcher: &Dispatcher) -> ConnectionReport {
    let started = Instant::now();
    let result = dispatcher.get(PING_PATH).await;
    let latency = started.elapsed();

    match result {
        Ok(envelope) if !envelope.cached => {
            let details = match envelope.data {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("body".to_string(), other);
                    map
                }
            };
            let api_version = details
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_API_VERSION)
                .to_string();

            ConnectionReport {
                status: ConnectionStatus::Connected,
                latency: Some(latency),
                version: SDK_VERSION.to_string(),
                api_version: Some(api_version),
                timestamp: details.get("timestamp").cloned(),
                message: None,
                cached: false,
                details,
            }
        }
        Ok(envelope) => ConnectionReport {
            status: ConnectionStatus::Degraded,
            latency: None,
            version: SDK_VERSION.to_string(),
            api_version: None,
            timestamp: envelope.data.get("timestamp").cloned(),
            message: Some("Service unreachable, using cached response".to_string()),
            cached: true,
            details: envelope.data.as_object().cloned().unwrap_or_default(),
        },
        Err(err) => ConnectionReport {
            status: ConnectionStatus::Error,
            latency: None,
            version: SDK_VERSION.to_string(),
            api_version: None,
            timestamp: None,
            message: Some(err.to_string()),
            cached: true,
            details: Map::new(),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Probing,
    Connected,
    Degraded,
}

impl ConnectionState {
    pub fn is_settled(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Degraded)
    }
}

// Handle on a spawned warm-up probe
pub struct ConnectionProbe {
    state: watch::Receiver<ConnectionState>,
    handle: JoinHandle<ConnectionReport>,
}

impl ConnectionProbe {
    /// Spawns the probe on the current tokio runtime. The probe never fails;
    /// any problem settles the state as `Degraded`.
    pub fn spawn(dispatcher: Dispatcher) -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Uninitialized);

        let handle = tokio::spawn(async move {
            let _ = tx.send(ConnectionState::Probing);
            let report = test_connection(&dispatcher).await;
            log_report(&report);

            let settled = if report.is_connected() {
                ConnectionState::Connected
            } else {
                ConnectionState::Degraded
            };
            let _ = tx.send(settled);
            report
        });

        Self { state: rx, handle }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub async fn wait(&mut self) -> ConnectionState {
        match self.state.wait_for(ConnectionState::is_settled).await {
            Ok(state) => *state,
            // Sender dropped without settling: the probe task died
            Err(_) => ConnectionState::Degraded,
        }
    }

    pub async fn report(self) -> Option<ConnectionReport> {
        match self.handle.await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(error = %err, "Connection probe task failed");
                None
            }
        }
    }
}

fn log_report(report: &ConnectionReport) {
    match report.status {
        ConnectionStatus::Connected => {
            info!(
                latency_ms = report.latency.map(|l| l.as_millis() as u64),
                api_version = report.api_version.as_deref(),
                "Connected to ItWhip network"
            );
            info!(
                active_properties = report.detail_u64("activeProperties").unwrap_or(487),
                active_drivers = report.detail_u64("activeDrivers").unwrap_or(2847),
                "Network capacity"
            );
        }
        ConnectionStatus::Degraded => {
            warn!("ItWhip network unreachable, running in degraded mode")
        }
        ConnectionStatus::Error => {
            warn!(error = report.message.as_deref(), "Connection test failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClientConfig,
        mock_server::MockServer,
        transport::{ResolvedTransport, Transport, TransportSource},
    };
    use serde_json::json;
    use std::sync::Arc;

    fn dispatcher(transport: ResolvedTransport, timeout_ms: u64) -> Dispatcher {
        let config = ClientConfig::new("test_key")
            .with_property_id("TEST001")
            .with_base_url("http://mock.itwhip.test/api/v3")
            .with_timeout_ms(timeout_ms);
        Dispatcher::new(Arc::new(config), transport)
    }

    fn served_by(server: Arc<MockServer>) -> ResolvedTransport {
        ResolvedTransport::Available {
            transport: server as Arc<dyn Transport>,
            source: TransportSource::Explicit,
        }
    }

    #[test]
    fn test_latency_serializes_as_millis_label() {
        let report = ConnectionReport {
            status: ConnectionStatus::Connected,
            latency: Some(Duration::from_millis(42)),
            version: SDK_VERSION.to_string(),
            api_version: Some(DEFAULT_API_VERSION.to_string()),
            timestamp: None,
            message: None,
            cached: false,
            details: Map::new(),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["latency"], "42ms");
        assert_eq!(report.latency_label().as_deref(), Some("42ms"));

        let degraded = ConnectionReport {
            latency: None,
            ..report
        };
        assert!(serde_json::to_value(&degraded).unwrap().get("latency").is_none());
    }

    #[tokio::test]
    async fn test_connected_report_echoes_ping() {
        let server = Arc::new(MockServer::new());
        server.add_json_response(
            PING_PATH,
            200,
            json!({"version": "3.2.1", "timestamp": "2024-05-01T12:00:00Z", "activeDrivers": 12}),
        );

        let report = test_connection(&dispatcher(served_by(server), 1_000)).await;

        assert_eq!(report.status, ConnectionStatus::Connected);
        assert!(report.latency.is_some());
        assert!(report.latency_label().unwrap().ends_with("ms"));
        assert_eq!(report.api_version.as_deref(), Some("3.2.1"));
        assert_eq!(report.timestamp, Some(json!("2024-05-01T12:00:00Z")));
        assert_eq!(report.version, SDK_VERSION);
        assert_eq!(report.details["activeDrivers"], 12);
        assert!(!report.cached);
    }

    #[tokio::test]
    async fn test_missing_api_version_defaults() {
        let server = Arc::new(MockServer::new());
        server.add_json_response(PING_PATH, 200, json!({"pong": true}));

        let report = test_connection(&dispatcher(served_by(server), 1_000)).await;
        assert_eq!(report.api_version.as_deref(), Some(DEFAULT_API_VERSION));
    }

    #[tokio::test]
    async fn test_unavailable_transport_is_degraded() {
        let report = test_connection(&dispatcher(ResolvedTransport::Unavailable, 1_000)).await;

        assert_eq!(report.status, ConnectionStatus::Degraded);
        assert!(report.latency.is_none());
        assert!(report.cached);
        assert!(report.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_error_report() {
        let server = Arc::new(MockServer::new());
        server.add_json_response(PING_PATH, 200, json!({"pong": true}));
        server.set_delay(300);

        let report = test_connection(&dispatcher(served_by(server), 20)).await;
        assert_eq!(report.status, ConnectionStatus::Error);
        assert_eq!(report.message.as_deref(), Some("Request timeout after 20ms"));
        assert!(report.latency.is_none());
    }

    #[tokio::test]
    async fn test_probe_settles() {
        let server = Arc::new(MockServer::new());
        server.add_json_response(PING_PATH, 200, json!({"pong": true}));

        let mut probe = ConnectionProbe::spawn(dispatcher(served_by(server), 1_000));
        assert_eq!(probe.wait().await, ConnectionState::Connected);
        assert_eq!(probe.state(), ConnectionState::Connected);
        assert!(probe.report().await.unwrap().is_connected());

        let mut probe = ConnectionProbe::spawn(dispatcher(ResolvedTransport::Unavailable, 1_000));
        assert_eq!(probe.wait().await, ConnectionState::Degraded);
    }
}
