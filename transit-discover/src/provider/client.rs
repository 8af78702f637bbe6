//! HTTP client for hafas-rest-api endpoints.
//!
//! Provides async methods for the four queries the discovery engine needs.
//! Handles the user agent header, concurrency limiting, and conversion to
//! domain types.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::domain::{Departure, Journey, Stop, StopId, Trip};

use super::convert::{convert_departures, convert_journeys, convert_locations, convert_trip};
use super::error::ProviderError;
use super::profile::Profile;
use super::types::{DeparturesResponse, ErrorBody, JourneysResponse, LocationDto, TripResponse};
use super::{DeparturesOptions, JourneysOptions, LocationsOptions, TransitProvider, TripOptions};

/// Default base URL (VBB, Berlin/Brandenburg).
const DEFAULT_BASE_URL: &str = "https://v6.vbb.transport.rest";

/// Default maximum concurrent HTTP requests.
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Configuration for the REST client.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URL of the endpoint
    pub base_url: String,
    /// User agent identifying the caller to the endpoint operator
    pub user_agent: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Timezone and locale of the endpoint
    pub profile: Profile,
}

impl RestClientConfig {
    /// Create a new config for the given profile.
    pub fn new(profile: Profile) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("transit-discover/", env!("CARGO_PKG_VERSION")).to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
            profile,
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// hafas-rest-api client.
///
/// Uses a semaphore to limit concurrent requests so several crawls can share
/// one client without overloading the endpoint.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
    profile: Profile,
}

impl RestClient {
    /// Create a new client with the given configuration.
    pub fn new(config: RestClientConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        let user_agent =
            HeaderValue::from_str(&config.user_agent).map_err(|_| ProviderError::Api {
                status: 0,
                message: "Invalid user agent".to_string(),
            })?;
        headers.insert(USER_AGENT, user_agent);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            profile: config.profile,
        })
    }

    /// GET `path` with `query` and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let url = format!("{}{}", self.base_url, path);
        trace!(url = %url, "GET");

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }
}

/// Map a non-2xx response to an error, recognizing flagged upstream errors.
fn classify_failure(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.chars().take(500).collect());

    if let Some(err) = parsed.as_ref().filter(|b| b.is_hafas_error == Some(true)) {
        let code = err
            .hafas_code
            .clone()
            .or_else(|| err.code.clone())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        return ProviderError::Flagged { code, message };
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return ProviderError::NotFound(message);
    }

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

fn flag(value: bool) -> String {
    value.to_string()
}

impl TransitProvider for RestClient {
    fn profile(&self) -> &Profile {
        &self.profile
    }

    async fn locations(
        &self,
        query: &str,
        options: &LocationsOptions,
    ) -> Result<Vec<Stop>, ProviderError> {
        let dtos: Vec<LocationDto> = self
            .get_json(
                "/locations",
                &[
                    ("query", query.to_string()),
                    ("results", options.results.to_string()),
                    ("addresses", flag(options.addresses)),
                    ("poi", flag(options.poi)),
                    ("stops", flag(true)),
                    ("linesOfStops", flag(options.lines_of_stops)),
                ],
            )
            .await?;

        Ok(convert_locations(&dtos))
    }

    async fn departures(
        &self,
        stop: &StopId,
        options: &DeparturesOptions,
    ) -> Result<Vec<Departure>, ProviderError> {
        let path = departures_path(stop);
        let response: DeparturesResponse = self
            .get_json(
                &path,
                &[
                    ("when", options.when.to_rfc3339()),
                    ("duration", options.duration_mins.to_string()),
                    ("remarks", flag(options.remarks)),
                    ("subStops", flag(options.sub_stops)),
                    ("linesOfStops", flag(options.lines_of_stops)),
                ],
            )
            .await?;

        Ok(convert_departures(&response.into_departures())?)
    }

    async fn trip(
        &self,
        trip_id: &str,
        line_name: &str,
        options: &TripOptions,
    ) -> Result<Trip, ProviderError> {
        let path = trip_path(trip_id);
        let response: TripResponse = self
            .get_json(
                &path,
                &[
                    ("lineName", line_name.to_string()),
                    ("when", options.when.to_rfc3339()),
                    ("stopovers", flag(true)),
                    ("remarks", flag(false)),
                ],
            )
            .await?;

        Ok(convert_trip(&response.into_trip(), trip_id)?)
    }

    async fn journeys(
        &self,
        from: &StopId,
        to: &StopId,
        options: &JourneysOptions,
    ) -> Result<Vec<Journey>, ProviderError> {
        let response: JourneysResponse = self
            .get_json(
                "/journeys",
                &[
                    ("from", from.as_str().to_string()),
                    ("to", to.as_str().to_string()),
                    ("results", options.results.to_string()),
                    ("departure", options.departure.to_rfc3339()),
                    ("stopovers", flag(options.stopovers)),
                    ("startWithWalking", flag(options.start_with_walking)),
                    ("remarks", flag(options.remarks)),
                    ("subStops", flag(options.sub_stops)),
                ],
            )
            .await?;

        Ok(convert_journeys(&response.into_journeys())?)
    }
}

fn departures_path(stop: &StopId) -> String {
    format!("/stops/{}/departures", urlencoding::encode(stop.as_str()))
}

/// HAFAS trip ids contain `|` and `#`, so they are percent-encoded.
fn trip_path(trip_id: &str) -> String {
    format!("/trips/{}", urlencoding::encode(trip_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile::new("Europe/Berlin", "de-DE").unwrap()
    }

    #[test]
    fn config_builder() {
        let config = RestClientConfig::new(profile())
            .with_base_url("http://localhost:3000/")
            .with_user_agent("test-agent")
            .with_max_concurrent(10)
            .with_timeout(60);

        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn config_defaults() {
        let config = RestClientConfig::new(profile());

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.user_agent.starts_with("transit-discover/"));
    }

    #[test]
    fn client_creation() {
        let client = RestClient::new(RestClientConfig::new(profile()));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().profile().locale(), "de-DE");
    }

    #[test]
    fn flagged_bodies_become_flagged_errors() {
        let err = classify_failure(
            reqwest::StatusCode::BAD_GATEWAY,
            r#"{"message":"no connections","isHafasError":true,"code":"NOT_FOUND","hafasCode":"H890"}"#,
        );
        assert!(err.is_flagged());
        assert_eq!(err.code(), Some("H890"));
    }

    #[test]
    fn plain_failures_are_not_flagged() {
        let err = classify_failure(reqwest::StatusCode::NOT_FOUND, r#"{"message":"no such trip"}"#);
        assert!(matches!(err, ProviderError::NotFound(ref m) if m == "no such trip"));

        let err = classify_failure(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(
            matches!(err, ProviderError::Api { status: 500, ref message } if message == "oops")
        );
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(
            trip_path("1|2345|0|86|18032024"),
            "/trips/1%7C2345%7C0%7C86%7C18032024"
        );
        assert_eq!(trip_path("abc-1.2_x~"), "/trips/abc-1.2_x~");
        assert_eq!(
            departures_path(&StopId::parse("de:11000:900100003").unwrap()),
            "/stops/de%3A11000%3A900100003/departures"
        );
    }

    // Tests against a live endpoint would go here; they need network access
    // and should be marked #[ignore].
}
