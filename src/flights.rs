// Flight tracking

use serde_json::{json, Value};

use crate::{
    dispatcher::{path_segment, Dispatcher},
    error::ACTIVATION_PORTAL_URL,
};

pub const FLIGHTS_TRACK_PATH: &str = "/flights/track";

#[derive(Clone)]
pub struct Flights {
    dispatcher: Dispatcher,
}

impl Flights {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn track(&self, flight_number: &str) -> Value {
        let target = format!("{FLIGHTS_TRACK_PATH}/{}", path_segment(flight_number.trim()));
        match self.dispatcher.get(&target).await {
            Ok(envelope) => envelope.data,
            Err(_) => json!({
                "error": "INTEGRATION_REQUIRED",
                "message": "Flight tracking requires GDS integration",
                "instructions": format!("Complete verification at {ACTIVATION_PORTAL_URL}"),
            }),
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
    use std::sync::Arc;

    #[tokio::test]
    async fn test_track() {
        let server = Arc::new(MockServer::new());
        server.add_json_response("/flights/track/AA100", 200, json!({"status": "landed"}));
        let config = ClientConfig::new("test_key")
            .with_base_url("http://mock.itwhip.test/api/v3")
            .with_timeout_ms(1_000);
        let flights = Flights::new(Dispatcher::new(
            Arc::new(config),
            ResolvedTransport::Available {
                transport: server.clone() as Arc<dyn Transport>,
                source: TransportSource::Explicit,
            },
        ));

        assert_eq!(flights.track(" AA100 ").await["status"], "landed");

        let missing = flights.track("ZZ999").await;
        assert_eq!(missing["error"], "INTEGRATION_REQUIRED");
        assert!(missing["instructions"]
            .as_str()
            .unwrap()
            .ends_with("portal.itwhip.com"));

        flights.track("../status").await;
        assert!(server
            .last_request()
            .unwrap()
            .url
            .ends_with("/flights/track/..%2Fstatus"));
    }
}
