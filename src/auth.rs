// Authorization gate for privileged operations

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    dispatcher::{Dispatcher, RequestSpec},
    error::{ActivationRequired, ApiError},
};

pub const AUTH_VALIDATE_PATH: &str = "/auth/validate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Hotel,
    #[serde(other)]
    Other,
}

// Result of one validation round-trip. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationState {
    pub valid: bool,
    pub account_type: Option<AccountType>,
    pub raw_details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthorizationState {
    pub fn denied(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            valid: false,
            account_type: None,
            raw_details: json!({ "valid": false, "error": error }),
            error: Some(error),
        }
    }

    pub fn from_details(details: Value) -> Self {
        let valid = details.get("valid").and_then(Value::as_bool).unwrap_or(false);
        let account_type = details
            .get("accountType")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());
        let error = details
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            valid,
            account_type,
            raw_details: details,
            error,
        }
    }

    pub fn permits(&self, required: AccountType) -> bool {
        self.valid && self.account_type == Some(required)
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    dispatcher: Dispatcher,
}

impl AuthorizationGate {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Validates the current credential against the remote service.
    ///
    /// Every call is a fresh round-trip. Failures come back as
    /// `valid == false` instead of an error.
    pub async fn check_authorization(&self) -> AuthorizationState {
        match self
            .dispatcher
            .dispatch(RequestSpec::post(AUTH_VALIDATE_PATH))
            .await
        {
            Ok(envelope) if envelope.ok => {
                let state = AuthorizationState::from_details(envelope.data);
                debug!(valid = state.valid, account_type = ?state.account_type, "Authorization checked");
                state
            }
            Ok(envelope) => AuthorizationState::denied(
                envelope
                    .error_message
                    .unwrap_or_else(|| "Authorization service unavailable".to_string()),
            ),
            Err(err) => {
                warn!(error = %err, "Authorization check failed");
                AuthorizationState::denied(err.to_string())
            }
        }
    }

    /// Gate for privileged calls: a fresh check that must report a valid
    /// account of the `required` type.
    pub async fn require(&self, required: AccountType) -> Result<AuthorizationState, ApiError> {
        let state = self.check_authorization().await;
        if state.permits(required) {
            Ok(state)
        } else {
            warn!(valid = state.valid, account_type = ?state.account_type, "Privileged operation rejected");
            Err(ApiError::PropertyNotActivated(ActivationRequired::default()))
        }
    }

    pub async fn is_activated(&self) -> bool {
        self.check_authorization().await.permits(AccountType::Hotel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClientConfig,
        mock_server::{MockServer, ServerMode},
        transport::{ResolvedTransport, Transport, TransportSource},
    };
    use reqwest::Method;
    use std::sync::Arc;

    fn gate(server: Arc<MockServer>, timeout_ms: u64) -> AuthorizationGate {
        let config = ClientConfig::new("test_key")
            .with_base_url("http://mock.itwhip.test/api/v3")
            .with_timeout_ms(timeout_ms);
        AuthorizationGate::new(Dispatcher::new(
            Arc::new(config),
            ResolvedTransport::Available {
                transport: server as Arc<dyn Transport>,
                source: TransportSource::Explicit,
            },
        ))
    }

    #[tokio::test]
    async fn test_valid_hotel_account() {
        let server = Arc::new(MockServer::new());
        server.add_json_response(
            AUTH_VALIDATE_PATH,
            200,
            json!({"valid": true, "accountType": "hotel", "propertyId": "TEST001"}),
        );
        let gate = gate(server.clone(), 1_000);

        let state = gate.check_authorization().await;
        assert!(state.valid);
        assert_eq!(state.account_type, Some(AccountType::Hotel));
        assert_eq!(state.raw_details["propertyId"], "TEST001");
        assert!(gate.is_activated().await);

        // No caching: each check is its own POST
        assert_eq!(server.request_count(), 2);
        assert!(server.requests().iter().all(|r| r.method == Method::POST));
    }

    #[tokio::test]
    async fn test_other_account_type_is_not_permitted() {
        let server = Arc::new(MockServer::new());
        server.add_json_response(
            AUTH_VALIDATE_PATH,
            200,
            json!({"valid": true, "accountType": "driver"}),
        );
        let gate = gate(server, 1_000);

        let state = gate.check_authorization().await;
        assert!(state.valid);
        assert_eq!(state.account_type, Some(AccountType::Other));
        assert!(!state.permits(AccountType::Hotel));
        assert!(matches!(
            gate.require(AccountType::Hotel).await,
            Err(ApiError::PropertyNotActivated(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_failures_become_invalid_state() {
        let server = Arc::new(MockServer::new());
        server.add_json_response(AUTH_VALIDATE_PATH, 401, json!({"error": "Invalid API key"}));
        let state = gate(server, 1_000).check_authorization().await;
        assert!(!state.valid);
        assert_eq!(state.error.as_deref(), Some("API error: 401 - Invalid API key"));

        let server = Arc::new(MockServer::new());
        server.set_delay(300);
        let state = gate(server, 20).check_authorization().await;
        assert!(!state.valid);

        let server = Arc::new(MockServer::new());
        server.set_mode(ServerMode::CompleteOutage);
        let state = gate(server, 1_000).check_authorization().await;
        assert!(!state.valid);
        assert_eq!(state.account_type, None);
    }
}
