//! Nominatim-compatible address search.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::GeocoderConfig;
use crate::models::Coordinate;

/// Best match for a free-text address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeHit {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl GeocodeHit {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

pub struct Geocoder {
    client: Client,
    url: Url,
}

impl Geocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("Invalid geocoder URL")?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, url })
    }

    /// Search URL for `text`, keeping any query already in the base URL
    fn search_url(&self, text: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("q", text)
            .append_pair("format", "json")
            .append_pair("limit", "1");
        url
    }

    /// Look up `text`. Blank input, transport failures and empty result
    /// lists all yield `None`.
    pub async fn search(&self, text: &str) -> Option<GeocodeHit> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let response = match self.client.get(self.search_url(text)).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Geocoder request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Geocoder returned status {}", response.status());
            return None;
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to read geocoder response: {}", e);
                return None;
            }
        };

        let hit = parse_first_hit(&body);
        if hit.is_none() {
            debug!("No geocoder match for '{}'", text);
        }
        hit
    }
}

/// First usable entry of a Nominatim search response
pub fn parse_first_hit(body: &[u8]) -> Option<GeocodeHit> {
    let results: Vec<SearchResult> = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => {
            warn!("Malformed geocoder response: {}", e);
            return None;
        }
    };

    results.into_iter().find_map(|r| {
        let latitude = r.lat.trim().parse::<f64>().ok()?;
        let longitude = r.lon.trim().parse::<f64>().ok()?;
        if !(latitude.is_finite() && longitude.is_finite()) {
            return None;
        }
        Some(GeocodeHit {
            latitude,
            longitude,
            display_name: r.display_name,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nominatim_response() {
        let body = r#"[
            {
                "place_id": 123,
                "lat": "-22.9068467",
                "lon": "-43.1728965",
                "display_name": "Rio de Janeiro, Região Sudeste, Brasil"
            }
        ]"#;
        let hit = parse_first_hit(body.as_bytes()).unwrap();
        assert_eq!(hit.latitude, -22.9068467);
        assert_eq!(hit.longitude, -43.1728965);
        assert_eq!(hit.display_name, "Rio de Janeiro, Região Sudeste, Brasil");
    }

    #[test]
    fn test_empty_or_broken_response() {
        assert!(parse_first_hit(b"[]").is_none());
        assert!(parse_first_hit(b"{\"error\": \"nope\"}").is_none());
        assert!(parse_first_hit(br#"[{"lat": "north", "lon": "-43.1"}]"#).is_none());
    }

    #[tokio::test]
    async fn test_search_url_encodes_text() {
        let geocoder = Geocoder::new(&GeocoderConfig {
            url: "https://nominatim.example.org/search?countrycodes=br".to_string(),
            user_agent: "proxmap-test".to_string(),
        })
        .unwrap();

        let url = geocoder.search_url("Rua São Clemente, 360");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("countrycodes".to_string(), "br".to_string()),
                ("q".to_string(), "Rua São Clemente, 360".to_string()),
                ("format".to_string(), "json".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(url.path(), "/search");
    }

    #[tokio::test]
    async fn test_blank_text_skips_request() {
        let geocoder = Geocoder::new(&GeocoderConfig {
            url: "http://127.0.0.1:9/search".to_string(),
            user_agent: "proxmap-test".to_string(),
        })
        .unwrap();
        assert!(geocoder.search("   ").await.is_none());
    }
}
