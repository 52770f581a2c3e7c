// Hotel search, directly or through the Amadeus GDS

use std::collections::BTreeMap;

use serde_json::{json, Value};
use url::form_urlencoded;

use crate::dispatcher::Dispatcher;

pub const HOTELS_SEARCH_PATH: &str = "/hotels/search";
pub const AMADEUS_HOTELS_PATH: &str = "/amadeus/hotels";
pub const DEFAULT_CITY_CODE: &str = "PHX";
pub const DEFAULT_RADIUS: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotelSearchParams {
    pub city_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<u32>,
    pub use_amadeus: bool,
    // Passed through to the query string as-is
    pub extra: BTreeMap<String, String>,
}

impl HotelSearchParams {
    pub fn city(city_code: impl Into<String>) -> Self {
        Self {
            city_code: Some(city_code.into()),
            ..Default::default()
        }
    }

    pub fn nearby(latitude: f64, longitude: f64, radius: Option<u32>) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            radius: Some(radius.unwrap_or(DEFAULT_RADIUS)),
            ..Default::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn query_string(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(city_code) = &self.city_code {
            query.append_pair("cityCode", city_code);
        }
        if let Some(latitude) = self.latitude {
            query.append_pair("latitude", &latitude.to_string());
        }
        if let Some(longitude) = self.longitude {
            query.append_pair("longitude", &longitude.to_string());
        }
        if let Some(radius) = self.radius {
            query.append_pair("radius", &radius.to_string());
        }
        for (key, value) in &self.extra {
            query.append_pair(key, value);
        }
        query.finish()
    }

    fn target(&self) -> String {
        let path = if self.use_amadeus {
            AMADEUS_HOTELS_PATH
        } else {
            HOTELS_SEARCH_PATH
        };
        format!("{path}?{}", self.query_string())
    }
}

#[derive(Clone)]
pub struct Hotels {
    dispatcher: Dispatcher,
}

impl Hotels {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn search(&self, params: HotelSearchParams) -> Value {
        match self.dispatcher.get(&params.target()).await {
            Ok(envelope) => envelope.data,
            Err(err) => json!({
                "success": false,
                "error": err.to_string(),
                "hotels": [],
            }),
        }
    }

    pub async fn search_by_city(&self, city_code: Option<&str>) -> Value {
        self.search(HotelSearchParams::city(city_code.unwrap_or(DEFAULT_CITY_CODE)))
            .await
    }

    pub async fn search_nearby(&self, latitude: f64, longitude: f64, radius: Option<u32>) -> Value {
        self.search(HotelSearchParams::nearby(latitude, longitude, radius))
            .await
    }

    pub async fn search_gds(&self, params: HotelSearchParams) -> Value {
        self.search(HotelSearchParams {
            use_amadeus: true,
            ..params
        })
        .await
    }
}
