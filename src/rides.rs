// Ride lifecycle: creation (privileged), tracking and fare estimates

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{AccountType, AuthorizationGate},
    dispatcher::{path_segment, Dispatcher, RequestSpec},
    error::ApiError,
};

pub const RIDES_PATH: &str = "/rides";

const STANDARD_RATE_PER_MILE: f64 = 3.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub pickup: String,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passengers: Option<u32>,
    #[serde(default)]
    pub surge_free: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideConfirmation {
    pub ride_id: String,
    pub status: String,
    pub driver: String,
    pub fare: String,
}

impl RideConfirmation {
    // Fills anything the service left out with the standard dispatch defaults
    fn from_response(data: &Value, request: &RideRequest) -> Self {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            ride_id: text("rideId")
                .unwrap_or_else(|| format!("RIDE_{}", Utc::now().timestamp_millis())),
            status: text("status").unwrap_or_else(|| "dispatched".to_string()),
            driver: text("driver").unwrap_or_else(|| "Arriving in 3 minutes".to_string()),
            fare: text("fare").unwrap_or_else(|| {
                if request.surge_free { "$45" } else { "$127" }.to_string()
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FareEstimate {
    pub pickup: String,
    pub destination: String,
    pub distance_miles: u32,
    pub standard_fare: f64,
    pub surge_fare: f64,
    pub surge_multiplier: f64,
    pub savings: f64,
    pub message: String,
}

impl FareEstimate {
    pub fn distance_label(&self) -> String {
        format!("{} miles", self.distance_miles)
    }

    pub fn surge_label(&self) -> String {
        format!("${:.2} ({:.1}x surge)", self.surge_fare, self.surge_multiplier)
    }
}

#[derive(Clone)]
pub struct Rides {
    dispatcher: Dispatcher,
    gate: AuthorizationGate,
}

impl Rides {
    pub fn new(dispatcher: Dispatcher, gate: AuthorizationGate) -> Self {
        Self { dispatcher, gate }
    }

    /// Books a ride. Requires an activated hotel property; otherwise the call
    /// fails with [`ApiError::PropertyNotActivated`] without sending the ride.
    pub async fn create(&self, request: RideRequest) -> Result<RideConfirmation, ApiError> {
        self.gate.require(AccountType::Hotel).await?;

        let spec = RequestSpec::post(RIDES_PATH).try_json(&request)?;
        let data = self.dispatcher.dispatch(spec).await?.into_result()?;
        let confirmation = RideConfirmation::from_response(&data, &request);

        info!(ride_id = %confirmation.ride_id, status = %confirmation.status, "Ride dispatched");
        Ok(confirmation)
    }

    pub async fn dispatch(&self, request: RideRequest) -> Result<RideConfirmation, ApiError> {
        self.create(request).await
    }

    pub async fn track(&self, ride_id: &str) -> Value {
        let target = format!("{RIDES_PATH}/{}", path_segment(ride_id));
        match self.dispatcher.get(&target).await {
            Ok(envelope) => envelope.data,
            Err(_) => json!({
                "error": "RIDE_NOT_FOUND",
                "message": "Invalid ride ID or tracking not available",
            }),
        }
    }

    pub fn estimate(&self, pickup: &str, destination: &str) -> FareEstimate {
        estimate_with_rng(pickup, destination, &mut rand::thread_rng())
    }
}

pub fn estimate_with_rng<R: Rng>(
    pickup: &str,
    destination: &str,
    rng: &mut R,
) -> FareEstimate {
    let distance_miles: u32 = rng.gen_range(5..25);
    let standard_fare = distance_miles as f64 * STANDARD_RATE_PER_MILE;
    let surge_multiplier = 1.5 + rng.gen::<f64>() * 2.0;
    let surge_fare = standard_fare * surge_multiplier;

    FareEstimate {
        pickup: pickup.to_string(),
        destination: destination.to_string(),
        distance_miles,
        standard_fare,
        surge_fare,
        surge_multiplier,
        savings: surge_fare - standard_fare,
        message: "Activate to lock in no-surge pricing".to_string(),
    }
}
