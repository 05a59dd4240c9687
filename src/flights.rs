// Flight provider adapter: place autocomplete and round-trip search

use crate::provider::{null_as_default, ProviderError, RapidApiTransport};
use crate::resolver::PlaceLookup;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_FLIGHT_OFFERS: usize = 5;
pub const AUTOCOMPLETE_PATH: &str = "/flights/auto-complete";
pub const SEARCH_ROUNDTRIP_PATH: &str = "/flights/search-roundtrip";

// Wire structures for the flight provider; every field optional so a gap is a
// per-record problem rather than a decode failure of the whole response
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AutocompleteResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<AutocompletePlace>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AutocompletePlace {
    pub presentation: Option<Presentation>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Presentation {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FlightSearchResponse {
    pub data: Option<FlightSearchData>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FlightSearchData {
    // Decoded one by one so a bad itinerary only costs itself
    pub itineraries: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Itinerary {
    pub price: Option<ItineraryPrice>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub legs: Vec<Leg>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ItineraryPrice {
    pub formatted: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub origin: Option<Place>,
    pub destination: Option<Place>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub duration_in_minutes: Option<i64>,
    pub stop_count: Option<u32>,
    pub carriers: Option<Carriers>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub display_code: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Carriers {
    #[serde(default, deserialize_with = "null_as_default")]
    pub marketing: Vec<Carrier>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Carrier {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub flight_number: Option<String>,
}

// Normalized records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegEndpoint {
    pub code: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightOffer {
    pub price: String,
    pub airline: String,
    pub flight_number: String,
    pub departure: LegEndpoint,
    pub arrival: LegEndpoint,
    pub duration_minutes: i64,
    pub stop_count: u32,
    pub return_leg_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightCriteria {
    pub origin_id: String,
    pub destination_id: String,
    pub depart_date: String,
    pub return_date: Option<String>,
}

fn field<T>(value: Option<T>, name: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("missing {}", name))
}

fn endpoint(place: Option<&Place>, timestamp: Option<&String>, side: &str) -> Result<LegEndpoint, String> {
    let code = place
        .and_then(|p| p.display_code.clone())
        .ok_or_else(|| format!("missing {}.displayCode", side))?;
    let timestamp = field(timestamp.cloned(), side)?;
    Ok(LegEndpoint { code, timestamp })
}

fn return_leg_summary(leg: &Leg) -> Result<String, String> {
    let from = endpoint(leg.origin.as_ref(), leg.departure.as_ref(), "return origin")?;
    let to = leg
        .destination
        .as_ref()
        .and_then(|p| p.display_code.clone())
        .ok_or_else(|| "missing return destination.displayCode".to_string())?;
    Ok(format!("{} to {} at {}", from.code, to, from.timestamp))
}

impl TryFrom<&Itinerary> for FlightOffer {
    type Error = String;

    fn try_from(itinerary: &Itinerary) -> Result<Self, Self::Error> {
        let price = field(
            itinerary.price.as_ref().and_then(|p| p.formatted.clone()),
            "price.formatted",
        )?;
        let outbound = itinerary.legs.first().ok_or("missing legs[0]")?;

        let airline = field(
            outbound
                .carriers
                .as_ref()
                .and_then(|c| c.marketing.first())
                .and_then(|c| c.name.clone()),
            "carriers.marketing[0].name",
        )?;
        let flight_number = field(
            outbound.segments.first().and_then(|s| s.flight_number.clone()),
            "segments[0].flightNumber",
        )?;

        let return_leg_summary = match itinerary.legs.get(1) {
            Some(leg) => return_leg_summary(leg)?,
            None => crate::intent::ONE_WAY.to_string(),
        };

        Ok(FlightOffer {
            price,
            airline,
            flight_number,
            departure: endpoint(outbound.origin.as_ref(), outbound.departure.as_ref(), "departure")?,
            arrival: endpoint(outbound.destination.as_ref(), outbound.arrival.as_ref(), "arrival")?,
            duration_minutes: field(outbound.duration_in_minutes, "durationInMinutes")?,
            stop_count: field(outbound.stop_count, "stopCount")?,
            return_leg_summary,
        })
    }
}

/// Keeps the first five itineraries in provider order, dropping malformed ones.
pub fn normalize_itineraries(response: &FlightSearchResponse) -> Vec<FlightOffer> {
    let itineraries = match response.data.as_ref().and_then(|d| d.itineraries.as_ref()) {
        Some(itineraries) => itineraries,
        None => return Vec::new(),
    };

    itineraries
        .iter()
        .take(MAX_FLIGHT_OFFERS)
        .enumerate()
        .filter_map(|(index, raw)| {
            let itinerary = Itinerary::deserialize(raw).map_err(|e| e.to_string());
            match itinerary.and_then(|itinerary| FlightOffer::try_from(&itinerary)) {
                Ok(offer) => Some(offer),
                Err(reason) => {
                    warn!(index, %reason, "skipping malformed itinerary");
                    None
                }
            }
        })
        .collect()
}

// Raw endpoints of the flight provider
#[async_trait]
pub trait FlightProvider: Send + Sync + 'static {
    async fn autocomplete(&self, query: &str) -> Result<AutocompleteResponse, ProviderError>;

    async fn search_roundtrip(
        &self,
        criteria: &FlightCriteria,
    ) -> Result<FlightSearchResponse, ProviderError>;
}

pub struct SkyScannerClient {
    transport: RapidApiTransport,
}

impl SkyScannerClient {
    pub fn new(transport: RapidApiTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl FlightProvider for SkyScannerClient {
    async fn autocomplete(&self, query: &str) -> Result<AutocompleteResponse, ProviderError> {
        self.transport
            .get_json(AUTOCOMPLETE_PATH, &[("query", query)])
            .await
    }

    async fn search_roundtrip(
        &self,
        criteria: &FlightCriteria,
    ) -> Result<FlightSearchResponse, ProviderError> {
        let mut query = vec![
            ("fromEntityId", criteria.origin_id.as_str()),
            ("toEntityId", criteria.destination_id.as_str()),
            ("departDate", criteria.depart_date.as_str()),
        ];
        if let Some(return_date) = &criteria.return_date {
            query.push(("returnDate", return_date.as_str()));
        }
        self.transport.get_json(SEARCH_ROUNDTRIP_PATH, &query).await
    }
}

/// Stateless flight search adapter over a [`FlightProvider`].
#[derive(Clone)]
pub struct FlightSearch {
    provider: Arc<dyn FlightProvider>,
}

impl FlightSearch {
    pub fn new(provider: Arc<dyn FlightProvider>) -> Self {
        Self { provider }
    }

    pub async fn search(&self, criteria: &FlightCriteria) -> Result<Vec<FlightOffer>, ProviderError> {
        let response = self.provider.search_roundtrip(criteria).await?;
        let offers = normalize_itineraries(&response);
        debug!(count = offers.len(), "normalized flight offers");
        Ok(offers)
    }
}

#[async_trait]
impl PlaceLookup for FlightSearch {
    async fn lookup(&self, city: &str) -> Result<Option<String>, ProviderError> {
        let response = self.provider.autocomplete(city).await?;
        match response.data.first() {
            None => Ok(None),
            Some(place) => place
                .presentation
                .as_ref()
                .and_then(|p| p.id.clone())
                .map(Some)
                .ok_or_else(|| ProviderError::Parse("missing data[0].presentation.id".to_string())),
        }
    }
}

#[cfg(test)]
pub mod mock_flights {
    use super::*;
    use crate::provider::decode_body;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    // Serves canned JSON bodies and remembers the criteria it was asked for
    pub struct CannedFlights {
        places: HashMap<String, String>,
        search_body: String,
        pub searches: Mutex<Vec<FlightCriteria>>,
    }

    impl CannedFlights {
        pub fn new(search_body: &str) -> Self {
            Self {
                places: HashMap::new(),
                search_body: search_body.to_string(),
                searches: Mutex::new(Vec::new()),
            }
        }

        pub fn place(mut self, city: &str, body: &str) -> Self {
            self.places.insert(city.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl FlightProvider for CannedFlights {
        async fn autocomplete(&self, query: &str) -> Result<AutocompleteResponse, ProviderError> {
            let body = self
                .places
                .get(query)
                .map(String::as_str)
                .unwrap_or(r#"{"data": []}"#);
            decode_body(body)
        }

        async fn search_roundtrip(
            &self,
            criteria: &FlightCriteria,
        ) -> Result<FlightSearchResponse, ProviderError> {
            self.searches.lock().push(criteria.clone());
            decode_body(&self.search_body)
        }
    }

    pub fn itinerary_json(price: &str, flight_number: &str, round_trip: bool) -> String {
        let outbound = format!(
            r#"{{
                "origin": {{"displayCode": "CDG"}},
                "destination": {{"displayCode": "FCO"}},
                "departure": "2025-06-01T07:15:00",
                "arrival": "2025-06-01T09:20:00",
                "durationInMinutes": 125,
                "stopCount": 0,
                "carriers": {{"marketing": [{{"name": "Air France"}}]}},
                "segments": [{{"flightNumber": "{}"}}]
            }}"#,
            flight_number
        );
        let inbound = r#"{
                "origin": {"displayCode": "FCO"},
                "destination": {"displayCode": "CDG"},
                "departure": "2025-06-08T18:00:00",
                "arrival": "2025-06-08T20:10:00",
                "durationInMinutes": 130,
                "stopCount": 0,
                "carriers": {"marketing": [{"name": "Air France"}]},
                "segments": [{"flightNumber": "1405"}]
            }"#;
        let legs = if round_trip {
            format!("{}, {}", outbound, inbound)
        } else {
            outbound
        };
        format!(
            r#"{{"price": {{"formatted": "{}"}}, "legs": [{}]}}"#,
            price, legs
        )
    }

    pub fn search_body(itineraries: &[String]) -> String {
        format!(r#"{{"data": {{"itineraries": [{}]}}}}"#, itineraries.join(","))
    }
}
