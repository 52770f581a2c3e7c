// Revenue and demand analytics

use serde::Serialize;
use serde_json::Value;

use crate::{
    dispatcher::{Dispatcher, ResponseEnvelope},
    error::{ApiError, ACTIVATION_PORTAL_URL},
};

pub const ANALYTICS_SAMPLE_PATH: &str = "/analytics/sample";
pub const DEFAULT_PERIOD: &str = "week";

const COMPETITOR_AVERAGE: f64 = 67_433.0;
const DEFAULT_ACTIVE_RIDES: u64 = 47;
const DEFAULT_DAILY_RIDES: u64 = 892;
const DEFAULT_SURGE_LEVEL: f64 = 2.1;
const SURGE_THRESHOLD: f64 = 1.5;

// Summary shown to properties that are not earning yet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedOpportunity {
    pub period: String,
    pub your_revenue: f64,
    pub competitor_average: f64,
    pub missed_opportunity: f64,
    pub message: String,
    pub activation_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MissedOpportunity {
    fn new(period: &str, missed: f64, error: Option<String>) -> Self {
        Self {
            period: period.to_string(),
            your_revenue: 0.0,
            competitor_average: COMPETITOR_AVERAGE,
            missed_opportunity: missed,
            message: "Activate to start earning".to_string(),
            activation_url: ACTIVATION_PORTAL_URL.to_string(),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RevenueReport {
    Earning(Value),
    NotActivated(MissedOpportunity),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandSnapshot {
    pub current_hour: u64,
    pub today: u64,
    pub this_week: u64,
    pub surge: bool,
    pub surge_level: f64,
    pub message: String,
    pub cached: bool,
}

impl DemandSnapshot {
    fn from_sample(sample: &Value) -> Self {
        let rides = |key: &str| sample.pointer(&format!("/rides/{key}")).and_then(Value::as_u64);
        let market_surge = sample
            .pointer("/surgeAnalysis/currentMarketSurge")
            .and_then(Value::as_f64);
        let today = rides("total").unwrap_or(DEFAULT_DAILY_RIDES);

        Self {
            current_hour: rides("active").unwrap_or(DEFAULT_ACTIVE_RIDES),
            today,
            this_week: today * 7,
            surge: market_surge.is_some_and(|s| s > SURGE_THRESHOLD),
            surge_level: market_surge.unwrap_or(DEFAULT_SURGE_LEVEL),
            message: "High demand - guests paying surge prices".to_string(),
            cached: false,
        }
    }

    fn cached() -> Self {
        Self {
            current_hour: DEFAULT_ACTIVE_RIDES,
            today: DEFAULT_DAILY_RIDES,
            this_week: 6234,
            surge: true,
            surge_level: DEFAULT_SURGE_LEVEL,
            message: "High demand - guests paying surge prices".to_string(),
            cached: true,
        }
    }
}

// An object with a non-zero (or absent) total, or a plain non-zero number
fn is_earning(revenue: &Value) -> bool {
    match revenue {
        Value::Object(fields) => fields
            .get("total")
            .map_or(true, |total| total.as_f64().is_some_and(|t| t != 0.0)),
        Value::Number(amount) => amount.as_f64().is_some_and(|a| a != 0.0),
        _ => false,
    }
}

#[derive(Clone)]
pub struct Analytics {
    dispatcher: Dispatcher,
}

impl Analytics {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn get_revenue(&self, period: Option<&str>) -> RevenueReport {
        let period = period.unwrap_or(DEFAULT_PERIOD);
        let target = format!("{ANALYTICS_SAMPLE_PATH}?period={period}");

        match self.dispatcher.get(&target).await {
            Ok(envelope) => {
                match envelope.data.get("revenue") {
                    Some(revenue) if is_earning(revenue) => RevenueReport::Earning(envelope.data),
                    _ => {
                        let missed = envelope
                            .data
                            .pointer("/missedOpportunity/total")
                            .and_then(Value::as_f64)
                            .unwrap_or(COMPETITOR_AVERAGE);
                        RevenueReport::NotActivated(MissedOpportunity::new(period, missed, None))
                    }
                }
            }
            Err(err) => RevenueReport::NotActivated(MissedOpportunity::new(
                period,
                COMPETITOR_AVERAGE,
                Some(err.to_string()),
            )),
        }
    }

    pub async fn get_demand(&self) -> DemandSnapshot {
        let target = format!("{ANALYTICS_SAMPLE_PATH}?period=today");
        match self.dispatcher.get(&target).await {
            Ok(envelope) => DemandSnapshot::from_sample(&envelope.data),
            Err(_) => DemandSnapshot::cached(),
        }
    }

    pub async fn get_sample(&self) -> Result<ResponseEnvelope, ApiError> {
        self.dispatcher.get(ANALYTICS_SAMPLE_PATH).await
    }
}
