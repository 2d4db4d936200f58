//! Nominatim / OpenStreetMap geocoder client.
//!
//! Nominatim has strict rate limits on the public instance: **1 request per
//! second** maximum, and every request must carry an identifying
//! `User-Agent`. The client sleeps `rate_limit_ms` before each request.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;

use crate::config::NominatimConfig;
use crate::retry::{self, RetryPolicy};
use crate::{GeocodeError, GeocodedLocation, Geocoder};

/// Free-form place search against a Nominatim instance.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    rate_limit_ms: u64,
    retry: RetryPolicy,
}

impl NominatimGeocoder {
    /// Builds a geocoder (and its HTTP client) from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            rate_limit_ms: config.rate_limit_ms,
            retry: config.retry_policy(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<Option<GeocodedLocation>, GeocodeError> {
        if self.rate_limit_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.rate_limit_ms)).await;
        }

        log::debug!("Nominatim query: {query:?}");

        let body = retry::send_json(
            || {
                self.client
                    .get(&self.base_url)
                    .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            },
            self.retry,
        )
        .await?;

        parse_response(&body)
    }
}

/// Parses a Nominatim `jsonv2` search response.
///
/// An empty array is a well-formed "no match" and yields `Ok(None)`.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedLocation>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = parse_coordinate(&first["lat"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lat in Nominatim response".to_string(),
    })?;

    let longitude = parse_coordinate(&first["lon"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lon in Nominatim response".to_string(),
    })?;

    let display_name = first["display_name"].as_str().map(String::from);

    Ok(Some(GeocodedLocation {
        latitude,
        longitude,
        display_name,
    }))
}

/// Nominatim returns coordinates as strings; accept bare numbers too.
fn parse_coordinate(value: &serde_json::Value) -> Option<f64> {
    let parsed = value
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .or_else(|| value.as_f64())?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> NominatimConfig {
        let mut config = NominatimConfig::embedded().unwrap();
        config.base_url = base_url;
        config.rate_limit_ms = 0;
        config.max_retries = 1;
        config.retry_base_delay_ms = 1;
        config.user_agent = "case_geo-tests".to_string();
        config
    }

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "-41.2887953",
            "lon": "174.7772114",
            "display_name": "Wellington, Wellington City, Wellington, New Zealand"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - -41.288_795_3).abs() < 1e-7);
        assert!((result.longitude - 174.777_211_4).abs() < 1e-7);
        assert_eq!(
            result.display_name.as_deref(),
            Some("Wellington, Wellington City, Wellington, New Zealand")
        );
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_missing_longitude() {
        let body = serde_json::json!([{ "lat": "1.0" }]);
        let err = parse_response(&body).unwrap_err();
        assert!(err.to_string().contains("lon"));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let body = serde_json::json!([{ "lat": "NaN", "lon": "1.0" }]);
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_non_array_body() {
        let body = serde_json::json!({ "error": "Unable to geocode" });
        assert!(parse_response(&body).is_err());
    }

    #[tokio::test]
    async fn sends_free_form_query_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Wellington, NZ"))
            .and(query_param("format", "jsonv2"))
            .and(query_param("limit", "1"))
            .and(header("user-agent", "case_geo-tests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "lat": "-41.2887953",
                "lon": "174.7772114",
                "display_name": "Wellington, New Zealand"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let geocoder =
            NominatimGeocoder::new(&test_config(format!("{}/search", server.uri()))).unwrap();
        let result = geocoder.geocode("Wellington, NZ").await.unwrap().unwrap();
        assert!((result.latitude - -41.288_795_3).abs() < 1e-7);
    }

    #[tokio::test]
    async fn empty_result_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let geocoder =
            NominatimGeocoder::new(&test_config(format!("{}/search", server.uri()))).unwrap();
        assert!(geocoder.geocode("Atlantis").await.unwrap().is_none());
    }
}
