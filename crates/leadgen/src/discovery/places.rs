use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::leads::NewLead;

const PLACES_API_URL: &str = "https://places.googleapis.com/v1";
const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.nationalPhoneNumber,places.websiteUri,places.rating,places.userRatingCount,places.googleMapsUri";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One business returned by a text search.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub formatted_address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub maps_url: Option<String>,
    pub raw: serde_json::Value,
}

impl Place {
    pub fn into_new_lead(
        self,
        category: &str,
        city: &str,
        email: Option<String>,
    ) -> NewLead {
        NewLead {
            place_id: self.id,
            business_name: self.name,
            category: Some(category.to_string()),
            address: self.formatted_address,
            city: Some(city.to_string()),
            phone: self.phone,
            email,
            website_url: self.website,
            google_maps_url: self.maps_url,
            rating: self.rating,
            review_count: self.review_count,
            raw_places_data: Some(self.raw),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlacesError {
    #[error("places api key is not configured")]
    MissingApiKey,
    #[error("invalid places api key header")]
    InvalidHeader,
    #[error("places transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("places api error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Text search against a places directory.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Place>, PlacesError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextRequest<'a> {
    text_query: &'a str,
    language_code: &'a str,
    max_result_count: u32,
}

#[derive(Deserialize, Default)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacePayload {
    id: String,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    national_phone_number: Option<String>,
    website_uri: Option<String>,
    rating: Option<f64>,
    user_rating_count: Option<i32>,
    google_maps_uri: Option<String>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: String,
}

/// Parses the `places` array, skipping entries without an id.
pub fn parse_places(body: serde_json::Value) -> Vec<Place> {
    let response: SearchTextResponse = serde_json::from_value(body).unwrap_or_default();
    response
        .places
        .into_iter()
        .filter_map(|raw| {
            let payload: PlacePayload = serde_json::from_value(raw.clone()).ok()?;
            Some(Place {
                id: payload.id,
                name: payload
                    .display_name
                    .map(|name| name.text)
                    .unwrap_or_else(|| "Unknown".to_string()),
                formatted_address: payload.formatted_address,
                phone: payload.national_phone_number,
                website: payload.website_uri.filter(|uri| !uri.trim().is_empty()),
                rating: payload.rating,
                review_count: payload.user_rating_count,
                maps_url: payload.google_maps_uri,
                raw,
            })
        })
        .collect()
}

pub struct GooglePlacesClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    max_results: u32,
}

impl GooglePlacesClient {
    pub fn new(api_key: &str, max_results: u32) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: PLACES_API_URL.to_string(),
            max_results,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, PlacesError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| PlacesError::InvalidHeader)?,
        );
        headers.insert("x-goog-fieldmask", HeaderValue::from_static(FIELD_MASK));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl PlaceSearch for GooglePlacesClient {
    async fn search(&self, query: &str) -> Result<Vec<Place>, PlacesError> {
        let url = format!("{}/places:searchText", self.base_url);
        debug!(%query, "places text search");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .timeout(REQUEST_TIMEOUT)
            .json(&SearchTextRequest {
                text_query: query,
                language_code: "en",
                max_result_count: self.max_results,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PlacesError::Api { status, body });
        }

        Ok(parse_places(response.json().await?))
    }
}

/// Stand-in used when no places key is configured; every search fails loudly.
pub struct UnconfiguredPlaces;

#[async_trait]
impl PlaceSearch for UnconfiguredPlaces {
    async fn search(&self, _query: &str) -> Result<Vec<Place>, PlacesError> {
        Err(PlacesError::MissingApiKey)
    }
}
