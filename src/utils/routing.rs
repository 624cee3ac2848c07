// Routing provider abstraction and the OpenRouteService client

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::RoutingError;
use crate::models::GeoPoint;

pub const OPENROUTESERVICE_URL: &str = "https://api.openrouteservice.org/v2/directions/driving-car";

/// Raw route summary as returned by the provider
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RouteSummary {
    /// Seconds
    pub duration: f64,
    /// Meters
    pub distance: f64,
}

/// A service able to compute a driving route between two points
pub trait RoutingProvider: Send + Sync {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteSummary, RoutingError>;
}

#[derive(Serialize)]
struct DirectionsRequest {
    /// Pairs of [longitude, latitude]
    coordinates: [[f64; 2]; 2],
}

#[derive(Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    summary: RouteSummary,
}

/// Blocking client for the OpenRouteService directions endpoint
pub struct OpenRouteService {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OpenRouteService {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoutingError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl RoutingProvider for OpenRouteService {
    fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteSummary, RoutingError> {
        let body = DirectionsRequest {
            coordinates: [[from.longitude, from.latitude], [to.longitude, to.latitude]],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.api_key.as_str())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .map_err(|e| RoutingError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(RoutingError::RateLimited),
            status if !status.is_success() => return Err(RoutingError::Status(status.as_u16())),
            _ => {}
        }

        let text = response
            .text()
            .map_err(|e| RoutingError::Transport(e.to_string()))?;
        parse_summary(&text)
    }
}

/// Extracts `routes[0].summary` from a directions response body
pub fn parse_summary(body: &str) -> Result<RouteSummary, RoutingError> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::Malformed(e.to_string()))?;

    response
        .routes
        .into_iter()
        .next()
        .map(|route| route.summary)
        .ok_or_else(|| RoutingError::Malformed("response contains no route".to_string()))
}
