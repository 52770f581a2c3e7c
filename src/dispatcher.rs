// Request dispatcher: the single primitive every facade goes through

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::ClientConfig,
    error::{ApiError, ErrorRoute},
    fallback::fallback,
    transport::{HttpRequest, HttpResponse, ResolvedTransport, TransportError},
};

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const API_KEY_HEADER: &str = "x-api-key";
pub const SDK_VERSION_HEADER: &str = "x-sdk-version";

pub fn sdk_version_tag() -> String {
    format!("itwhip-rs/{SDK_VERSION}")
}

/// Percent-encodes `raw` so it stays a single path segment under the target
/// it is appended to.
pub fn path_segment(raw: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(raw.as_bytes())
        .map(|chunk| if chunk == "+" { "%20" } else { chunk })
        .collect();
    match encoded.as_str() {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => encoded,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub ok: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub cached: bool,
}

impl ResponseEnvelope {
    pub fn live(data: Value) -> Self {
        Self {
            ok: true,
            data,
            error_code: None,
            error_message: None,
            cached: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Unwraps the payload, turning a degraded (`ok == false`) envelope into
    /// [`ApiError::ServiceUnavailable`].
    pub fn into_result(self) -> Result<Value, ApiError> {
        if self.ok {
            return Ok(self.data);
        }
        Err(ApiError::ServiceUnavailable {
            code: self
                .error_code
                .unwrap_or_else(|| "SERVICE_UNAVAILABLE".to_string()),
            message: self
                .error_message
                .unwrap_or_else(|| "Service unavailable".to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub target: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn try_json<T: Serialize>(self, body: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Ok(self.json(value))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<ClientConfig>,
    transport: ResolvedTransport,
}

impl Dispatcher {
    pub fn new(config: Arc<ClientConfig>, transport: ResolvedTransport) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport_available(&self) -> bool {
        self.transport.is_available()
    }

    pub async fn get(&self, target: &str) -> Result<ResponseEnvelope, ApiError> {
        self.dispatch(RequestSpec::get(target)).await
    }

    /// Executes one request attempt.
    ///
    /// Connectivity failures, including a missing transport, resolve to the
    /// fallback envelope for `spec.target`. Timeouts, error statuses and
    /// unparseable bodies are returned as errors.
    pub async fn dispatch(&self, spec: RequestSpec) -> Result<ResponseEnvelope, ApiError> {
        let request = self.build_request(&spec)?;

        match self.execute(request).await {
            Ok(envelope) => Ok(envelope),
            Err(err) => match err.route() {
                ErrorRoute::Fallback => {
                    warn!(endpoint = %spec.target, error = %err, "Service unreachable, using fallback response");
                    Ok(fallback(&spec.target))
                }
                ErrorRoute::Propagate => Err(err),
            },
        }
    }

    pub fn resolve_url(&self, target: &str) -> String {
        if let Ok(url) = Url::parse(target) {
            if !url.cannot_be_a_base() {
                return target.to_string();
            }
        }

        let base = self.config.base_url.trim_end_matches('/');
        if target.is_empty() || target.starts_with('/') || target.starts_with('?') {
            format!("{base}{target}")
        } else {
            format!("{base}/{target}")
        }
    }

    fn build_request(&self, spec: &RequestSpec) -> Result<HttpRequest, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut api_key = HeaderValue::from_str(&self.config.credential)
            .map_err(|_| ApiError::InvalidRequest("credential is not a valid header value".into()))?;
        api_key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

        let version = HeaderValue::from_str(&sdk_version_tag())
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        headers.insert(HeaderName::from_static(SDK_VERSION_HEADER), version);

        // Caller headers replace the defaults on collision
        for (name, value) in &spec.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidRequest(format!("invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ApiError::InvalidRequest(format!("invalid value for header '{name}'"))
            })?;
            headers.insert(name, value);
        }

        let body = match &spec.body {
            Some(value) => Some(Bytes::from(
                serde_json::to_vec(value).map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
            )),
            None => None,
        };

        Ok(HttpRequest {
            method: spec.method.clone(),
            url: self.resolve_url(&spec.target),
            headers,
            body,
        })
    }

    async fn execute(&self, request: HttpRequest) -> Result<ResponseEnvelope, ApiError> {
        let transport = match &self.transport {
            ResolvedTransport::Available { transport, .. } => transport,
            ResolvedTransport::Unavailable => return Err(ApiError::TransportUnavailable),
        };

        let method = request.method.clone();
        let url = request.url.clone();
        let started = Instant::now();

        // Dropping the timeout future on either path cancels the timer
        let response = match tokio::time::timeout(self.config.timeout(), transport.send(request))
            .await
        {
            Err(_) => {
                warn!(%method, %url, timeout_ms = self.config.timeout_ms, "Request timed out");
                return Err(ApiError::Timeout(self.config.timeout_ms));
            }
            Ok(Err(TransportError::Connect(message))) => {
                return Err(ApiError::NetworkError(message))
            }
            Ok(Err(TransportError::Io(message))) => return Err(ApiError::TransportError(message)),
            Ok(Ok(response)) => response,
        };

        debug!(
            %method,
            %url,
            status = response.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        classify_response(response)
    }
}

/// Parses the body and decides success. Parsing happens first, so a
/// non-JSON body is malformed whatever the status.
pub fn classify_response(response: HttpResponse) -> Result<ResponseEnvelope, ApiError> {
    let data: Value = serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

    if !response.status.is_success() || carries_error(&data) {
        return Err(ApiError::ApiResponseError {
            status_code: response.status.as_u16(),
            message: error_message(&data).unwrap_or_else(|| "API request failed".to_string()),
        });
    }

    Ok(ResponseEnvelope::live(data))
}

fn carries_error(data: &Value) -> bool {
    let explicit_error = data.get("error").is_some_and(|e| !e.is_null());
    let unsuccessful = data.get("success") == Some(&Value::Bool(false));
    explicit_error || unsuccessful
}

fn error_message(data: &Value) -> Option<String> {
    let text = |value: &Value| -> Option<String> {
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    };

    data.get("error")
        .and_then(text)
        .or_else(|| data.get("message").and_then(text))
}
