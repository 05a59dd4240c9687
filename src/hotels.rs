// Hotel provider adapter: location search and hotel listings

use crate::provider::{null_as_default, ProviderError, RapidApiTransport};
use crate::resolver::PlaceLookup;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_HOTEL_OFFERS: usize = 5;
pub const SEARCH_LOCATION_PATH: &str = "/api/v1/hotels/searchLocation";
pub const SEARCH_HOTELS_PATH: &str = "/api/v1/hotels/searchHotels";
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LocationResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<LocationEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEntry {
    // Sent as a number by the provider, tolerated as a string
    pub geo_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HotelSearchResponse {
    pub data: Option<HotelSearchData>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HotelSearchData {
    // Decoded one by one so a bad listing only costs itself
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelListing {
    pub title: Option<String>,
    pub price_for_display: Option<String>,
    pub bubble_rating: Option<BubbleRating>,
    pub secondary_info: Option<String>,
    pub commerce_info: Option<CommerceInfo>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BubbleRating {
    pub rating: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommerceInfo {
    pub external_url: Option<String>,
}

/// Normalized hotel listing. `link` keeps the full URL; shortening is a display concern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotelOffer {
    pub name: String,
    pub price: String,
    pub rating: Option<f64>,
    pub location: String,
    pub link: Option<String>,
}

impl HotelOffer {
    pub fn rating_label(&self) -> String {
        match self.rating {
            Some(rating) => format!("{}", rating),
            None => "unknown".to_string(),
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

impl From<&HotelListing> for HotelOffer {
    fn from(listing: &HotelListing) -> Self {
        let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
        HotelOffer {
            name: or_na(&listing.title),
            price: or_na(&listing.price_for_display),
            rating: listing
                .bubble_rating
                .as_ref()
                .and_then(|b| b.rating.as_ref())
                .and_then(numeric),
            location: or_na(&listing.secondary_info),
            link: listing
                .commerce_info
                .as_ref()
                .and_then(|c| c.external_url.clone()),
        }
    }
}

/// Keeps the first five listings in provider order, dropping undecodable ones.
pub fn normalize_listings(response: &HotelSearchResponse) -> Vec<HotelOffer> {
    let listings = match response.data.as_ref() {
        Some(data) => &data.data,
        None => return Vec::new(),
    };

    listings
        .iter()
        .take(MAX_HOTEL_OFFERS)
        .enumerate()
        .filter_map(|(index, raw)| match HotelListing::deserialize(raw) {
            Ok(listing) => Some(HotelOffer::from(&listing)),
            Err(e) => {
                warn!(index, reason = %e, "skipping malformed hotel listing");
                None
            }
        })
        .collect()
}

/// Sorts by rating, highest first. Unknown ratings go last; ties keep provider order.
pub fn rank_by_rating(offers: &mut [HotelOffer]) {
    offers.sort_by(|a, b| match (a.rating, b.rating) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotelCriteria {
    pub geo_id: String,
    pub check_in: String,
    pub check_out: Option<String>,
}

#[async_trait]
pub trait HotelProvider: Send + Sync + 'static {
    async fn search_location(&self, query: &str) -> Result<LocationResponse, ProviderError>;

    async fn search_hotels(
        &self,
        criteria: &HotelCriteria,
    ) -> Result<HotelSearchResponse, ProviderError>;
}

pub struct TripAdvisorClient {
    transport: RapidApiTransport,
}

impl TripAdvisorClient {
    pub fn new(transport: RapidApiTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl HotelProvider for TripAdvisorClient {
    async fn search_location(&self, query: &str) -> Result<LocationResponse, ProviderError> {
        self.transport
            .get_json(SEARCH_LOCATION_PATH, &[("query", query)])
            .await
    }

    async fn search_hotels(
        &self,
        criteria: &HotelCriteria,
    ) -> Result<HotelSearchResponse, ProviderError> {
        // The provider takes an empty checkOut for open-ended stays
        let check_out = criteria.check_out.as_deref().unwrap_or("");
        let query = [
            ("geoId", criteria.geo_id.as_str()),
            ("checkIn", criteria.check_in.as_str()),
            ("checkOut", check_out),
        ];
        self.transport.get_json(SEARCH_HOTELS_PATH, &query).await
    }
}

#[derive(Clone)]
pub struct HotelSearch {
    provider: Arc<dyn HotelProvider>,
}

impl HotelSearch {
    pub fn new(provider: Arc<dyn HotelProvider>) -> Self {
        Self { provider }
    }

    pub async fn search(&self, criteria: &HotelCriteria) -> Result<Vec<HotelOffer>, ProviderError> {
        let response = self.provider.search_hotels(criteria).await?;
        let offers = normalize_listings(&response);
        debug!(count = offers.len(), "normalized hotel offers");
        Ok(offers)
    }
}

#[async_trait]
impl PlaceLookup for HotelSearch {
    async fn lookup(&self, city: &str) -> Result<Option<String>, ProviderError> {
        let response = self.provider.search_location(city).await?;
        match response.data.first() {
            None => Ok(None),
            Some(entry) => entry
                .geo_id
                .as_ref()
                .and_then(identifier)
                .map(Some)
                .ok_or_else(|| ProviderError::Parse("missing data[0].geoId".to_string())),
        }
    }
}

#[cfg(test)]
pub mod mock_hotels {
    use super::*;
    use crate::provider::decode_body;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct CannedHotels {
        locations: HashMap<String, String>,
        hotels_body: String,
        pub searches: Mutex<Vec<HotelCriteria>>,
        search_calls: AtomicUsize,
    }

    impl CannedHotels {
        pub fn new(hotels_body: &str) -> Self {
            Self {
                locations: HashMap::new(),
                hotels_body: hotels_body.to_string(),
                searches: Mutex::new(Vec::new()),
                search_calls: AtomicUsize::new(0),
            }
        }

        pub fn location(mut self, city: &str, body: &str) -> Self {
            self.locations.insert(city.to_string(), body.to_string());
            self
        }

        pub fn search_calls(&self) -> usize {
            self.search_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HotelProvider for CannedHotels {
        async fn search_location(&self, query: &str) -> Result<LocationResponse, ProviderError> {
            let body = self
                .locations
                .get(query)
                .map(String::as_str)
                .unwrap_or(r#"{"data": []}"#);
            decode_body(body)
        }

        async fn search_hotels(
            &self,
            criteria: &HotelCriteria,
        ) -> Result<HotelSearchResponse, ProviderError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.searches.lock().push(criteria.clone());
            decode_body(&self.hotels_body)
        }
    }

    pub fn listing_json(title: &str, rating: Option<f64>) -> String {
        let rating = rating
            .map(|r| format!(r#""bubbleRating": {{"count": "1,024", "rating": {}}},"#, r))
            .unwrap_or_default();
        format!(
            r#"{{
                "title": "{}",
                "priceForDisplay": "€180",
                {}
                "secondaryInfo": "Centro Storico",
                "commerceInfo": {{"externalUrl": "https://www.booking.com/hotel/it/{}.html"}}
            }}"#,
            title,
            rating,
            title.to_lowercase().replace(' ', "-")
        )
    }

    pub fn hotels_body(listings: &[String]) -> String {
        format!(
            r#"{{"status": true, "data": {{"data": [{}]}}}}"#,
            listings.join(",")
        )
    }
}
