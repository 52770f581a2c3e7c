// Instant Ride client: wires the dispatcher, the authorization gate and the
// namespace facades around one immutable configuration

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    analytics::Analytics,
    auth::{AuthorizationGate, AuthorizationState},
    config::ClientConfig,
    connection::{self, ConnectionProbe, ConnectionReport},
    dispatcher::{Dispatcher, RequestSpec, ResponseEnvelope, SDK_VERSION},
    error::{ApiError, ClientError},
    flights::Flights,
    hotels::Hotels,
    rides::Rides,
    transport::{resolve_transport, Transport, TransportChoice},
};

pub const STATUS_PATH: &str = "/status";
pub const VERSION_PATH: &str = "/version";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheck {
    #[serde(default = "default_compatible")]
    pub compatible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

fn default_compatible() -> bool {
    true
}

impl VersionCheck {
    fn current() -> Self {
        Self {
            compatible: true,
            current_version: Some(SDK_VERSION.to_string()),
            error: None,
            details: Map::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    transport: TransportChoice,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = TransportChoice::Explicit(transport);
        self
    }

    /// Builds a client with no transport; every call is answered by the
    /// fallback generator.
    pub fn offline(mut self) -> Self {
        self.transport = TransportChoice::Unavailable;
        self
    }

    /// Validates the configuration before anything else, so a bad
    /// credential never causes network activity.
    pub fn build(self) -> Result<InstantRideClient, ClientError> {
        let config = self.config.ok_or(ClientError::MissingCredential)?;
        config.validate()?;

        info!(
            version = SDK_VERSION,
            property = config.property_id.as_deref().unwrap_or("unset"),
            environment = %config.environment,
            "ItWhip SDK initializing"
        );

        let transport = resolve_transport(self.transport);
        let dispatcher = Dispatcher::new(Arc::new(config), transport);
        Ok(InstantRideClient::from_dispatcher(dispatcher))
    }
}

#[derive(Clone)]
pub struct InstantRideClient {
    dispatcher: Dispatcher,
    gate: AuthorizationGate,
    rides: Rides,
    analytics: Analytics,
    hotels: Hotels,
    flights: Flights,
}

impl InstantRideClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder().config(config).build()
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        let gate = AuthorizationGate::new(dispatcher.clone());
        Self {
            rides: Rides::new(dispatcher.clone(), gate.clone()),
            analytics: Analytics::new(dispatcher.clone()),
            hotels: Hotels::new(dispatcher.clone()),
            flights: Flights::new(dispatcher.clone()),
            gate,
            dispatcher,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.dispatcher.config()
    }

    pub fn version(&self) -> &'static str {
        SDK_VERSION
    }

    pub fn rides(&self) -> &Rides {
        &self.rides
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn hotels(&self) -> &Hotels {
        &self.hotels
    }

    pub fn flights(&self) -> &Flights {
        &self.flights
    }

    pub async fn dispatch(&self, spec: RequestSpec) -> Result<ResponseEnvelope, ApiError> {
        self.dispatcher.dispatch(spec).await
    }

    /// Starts the connectivity probe in the background. Optional: no other
    /// call waits for it or depends on its outcome.
    pub fn spawn_warm_up(&self) -> ConnectionProbe {
        ConnectionProbe::spawn(self.dispatcher.clone())
    }

    pub async fn test_connection(&self) -> ConnectionReport {
        connection::test_connection(&self.dispatcher).await
    }

    pub async fn get_status(&self) -> Value {
        match self.dispatcher.get(STATUS_PATH).await {
            Ok(envelope) => envelope.data,
            Err(err) => json!({
                "status": "unknown",
                "error": err.to_string(),
            }),
        }
    }

    pub async fn check_authorization(&self) -> AuthorizationState {
        self.gate.check_authorization().await
    }

    pub async fn validate_auth(&self) -> AuthorizationState {
        self.check_authorization().await
    }

    pub async fn is_activated(&self) -> bool {
        self.gate.is_activated().await
    }

    pub async fn check_version(&self) -> VersionCheck {
        match self.dispatcher.get(VERSION_PATH).await {
            Ok(envelope) => envelope
                .data
                .pointer("/client/compatibility")
                .cloned()
                .and_then(|compatibility| serde_json::from_value(compatibility).ok())
                .unwrap_or_else(VersionCheck::current),
            Err(err) => VersionCheck {
                current_version: None,
                error: Some(err.to_string()),
                ..VersionCheck::current()
            },
        }
    }
}
