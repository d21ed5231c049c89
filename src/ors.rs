//! OpenRouteService HTTP adapter for distance matrices and reverse geocoding.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::matrix::DistanceMatrix;
use crate::models::Location;
use crate::traits::{DistanceMatrixProvider, ReverseGeocoder};

#[derive(Debug, Clone)]
pub struct OrsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub profile: String,
    pub matrix_timeout_secs: u64,
    pub geocode_timeout_secs: u64,
}

impl Default for OrsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openrouteservice.org".to_string(),
            api_key: None,
            profile: "driving-car".to_string(),
            matrix_timeout_secs: 10,
            geocode_timeout_secs: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrsClient {
    config: OrsConfig,
    client: reqwest::blocking::Client,
}

impl OrsClient {
    pub fn new(config: OrsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.matrix_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OrsConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingCredentials)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

impl DistanceMatrixProvider for OrsClient {
    fn matrix_for(&self, locations: &[Location]) -> Result<DistanceMatrix, ProviderError> {
        if locations.is_empty() {
            return Ok(DistanceMatrix::new(0));
        }
        let api_key = self.api_key()?;

        // ORS expects [lng, lat]
        let payload = MatrixRequest {
            locations: locations.iter().map(|loc| [loc.lng, loc.lat]).collect(),
            metrics: ["distance"],
            units: "km",
        };

        let body = self
            .client
            .post(self.endpoint(&format!("v2/matrix/{}", self.config.profile)))
            .header(AUTHORIZATION, api_key)
            .timeout(Duration::from_secs(self.config.matrix_timeout_secs))
            .json(&payload)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<MatrixResponse>())?;

        parse_matrix(body, locations.len())
    }
}

impl ReverseGeocoder for OrsClient {
    fn address_for(&self, location: Location) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;

        let body = self
            .client
            .get(self.endpoint("geocode/reverse"))
            .header(AUTHORIZATION, api_key)
            .header(ACCEPT, "application/json")
            .query(&[
                ("point.lat", location.lat.to_string()),
                ("point.lon", location.lng.to_string()),
                ("size", "1".to_string()),
            ])
            .timeout(Duration::from_secs(self.config.geocode_timeout_secs))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<GeocodeResponse>())?;

        parse_address(body)
    }
}

#[derive(Debug, Serialize)]
struct MatrixRequest {
    locations: Vec<[f64; 2]>,
    metrics: [&'static str; 1],
    units: &'static str,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    features: Vec<GeocodeFeature>,
}

#[derive(Debug, Deserialize)]
struct GeocodeFeature {
    #[serde(default)]
    properties: Option<GeocodeProperties>,
}

#[derive(Debug, Deserialize)]
struct GeocodeProperties {
    #[serde(default)]
    label: Option<String>,
}

/// Validates a matrix response. Unroutable pairs come back as `null`; any of
/// them rejects the whole matrix so callers never see a partial one.
fn parse_matrix(body: MatrixResponse, expected: usize) -> Result<DistanceMatrix, ProviderError> {
    let rows = body
        .distances
        .ok_or_else(|| ProviderError::Malformed("response missing 'distances'".to_string()))?;

    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().collect::<Option<Vec<f64>>>())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ProviderError::Malformed("unroutable location pair".to_string()))?;

    let matrix = DistanceMatrix::from_rows(rows)
        .ok_or_else(|| ProviderError::Malformed("distances are not a square matrix".to_string()))?;

    if matrix.size() != expected {
        return Err(ProviderError::Malformed(format!(
            "expected {} locations, got {}",
            expected,
            matrix.size()
        )));
    }
    if !matrix.is_well_formed() {
        return Err(ProviderError::Malformed(
            "negative or non-finite distance".to_string(),
        ));
    }

    Ok(matrix.symmetrized())
}

fn parse_address(body: GeocodeResponse) -> Result<String, ProviderError> {
    body.features
        .into_iter()
        .next()
        .and_then(|feature| feature.properties)
        .and_then(|properties| properties.label)
        .filter(|label| !label.trim().is_empty())
        .ok_or_else(|| ProviderError::Malformed("no reverse-geocode result".to_string()))
}
