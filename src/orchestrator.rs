//! Query-to-summary pipelines.
//!
//! Each pipeline (flights, hotels, attractions) turns a raw query into a
//! [`SearchReport`]. Every failure short of misconfiguration ends up as a
//! readable message in the report; nothing here panics or retries.

use crate::attractions::{AttractionsClient, DuckDuckGoSearch, WebSearch};
use crate::config::AssistantConfig;
use crate::flights::{FlightCriteria, FlightOffer, FlightProvider, FlightSearch, SkyScannerClient};
use crate::hotels::{rank_by_rating, HotelCriteria, HotelOffer, HotelProvider, HotelSearch, TripAdvisorClient};
use crate::identifier_cache::{IdentifierCache, Namespace};
use crate::intent::{ExtractionError, IntentExtractor, TravelIntent};
use crate::llm::{GeminiClient, LlmClient, LlmError};
use crate::provider::{ProviderError, RapidApiTransport};
use crate::resolver::IdentifierResolver;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("language model client: {0}")]
    Llm(#[from] LlmError),

    #[error("provider client: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportStatus {
    Found,
    Empty,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport<T> {
    pub status: ReportStatus,
    pub offers: Vec<T>,
    pub summary: String,
}

impl<T> SearchReport<T> {
    fn found(offers: Vec<T>, summary: String) -> Self {
        Self {
            status: ReportStatus::Found,
            offers,
            summary,
        }
    }

    fn empty(summary: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Empty,
            offers: Vec::new(),
            summary: summary.into(),
        }
    }

    fn failed(summary: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Failed,
            offers: Vec::new(),
            summary: summary.into(),
        }
    }
}

impl<T> fmt::Display for SearchReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.status {
            ReportStatus::Found => "✅",
            ReportStatus::Empty | ReportStatus::Failed => "❌",
        };
        write!(f, "{} {}", marker, self.summary)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPlan {
    pub intent: Option<TravelIntent>,
    pub flights: SearchReport<FlightOffer>,
    pub hotels: SearchReport<HotelOffer>,
    pub attractions: String,
}

pub fn session_key(raw_query: &str) -> String {
    raw_query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// State scoped to one interactive session, keyed by normalized query.
///
/// Holds the intent extracted for each query and the hotel report computed for
/// it, so asking the same thing twice neither re-prompts the model nor repeats
/// the hotel search.
#[derive(Debug, Default)]
pub struct SearchSession {
    intents: Mutex<HashMap<String, TravelIntent>>,
    hotel_reports: Mutex<HashMap<String, SearchReport<HotelOffer>>>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intent(&self, raw_query: &str) -> Option<TravelIntent> {
        self.intents.lock().get(&session_key(raw_query)).cloned()
    }

    pub fn hotel_report(&self, raw_query: &str) -> Option<SearchReport<HotelOffer>> {
        self.hotel_reports.lock().get(&session_key(raw_query)).cloned()
    }

    fn remember_intent(&self, raw_query: &str, intent: &TravelIntent) {
        self.intents
            .lock()
            .insert(session_key(raw_query), intent.clone());
    }

    fn remember_hotel_report(&self, raw_query: &str, report: &SearchReport<HotelOffer>) {
        self.hotel_reports
            .lock()
            .insert(session_key(raw_query), report.clone());
    }
}

fn describe_extraction_failure(err: &ExtractionError) -> String {
    format!("Could not understand the travel request: {}", err)
}

fn describe_provider_failure(kind: &str, err: &ProviderError) -> String {
    match err {
        ProviderError::Parse(_) => "Error parsing API response.".to_string(),
        other => format!("Error during {} search: {}", kind, other),
    }
}

pub struct SearchOrchestrator {
    extractor: IntentExtractor,
    resolver: IdentifierResolver,
    flights: FlightSearch,
    hotels: HotelSearch,
    attractions: AttractionsClient,
    session: SearchSession,
}

impl SearchOrchestrator {
    /// Wires the pipelines over the given seams, sharing one identifier cache.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        flight_provider: Arc<dyn FlightProvider>,
        hotel_provider: Arc<dyn HotelProvider>,
        web_search: Arc<dyn WebSearch>,
        attraction_cooldown: Duration,
        cache: Arc<IdentifierCache>,
    ) -> Self {
        let flights = FlightSearch::new(flight_provider);
        let hotels = HotelSearch::new(hotel_provider);
        let resolver = IdentifierResolver::new(
            cache,
            Arc::new(flights.clone()),
            Arc::new(hotels.clone()),
        );

        Self {
            extractor: IntentExtractor::new(llm),
            resolver,
            flights,
            hotels,
            attractions: AttractionsClient::new(web_search, attraction_cooldown),
            session: SearchSession::new(),
        }
    }

    /// Builds the production stack: Gemini, Sky Scanner, TripAdvisor, DuckDuckGo.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, SetupError> {
        let llm = GeminiClient::new(
            config.gemini_base_url.clone(),
            config.gemini_model.clone(),
            config.gemini_api_key.clone(),
            config.http_timeout,
        )?;
        let flights = SkyScannerClient::new(RapidApiTransport::new(
            config.flights.clone(),
            config.rapid_api_key(),
            config.http_timeout,
        )?);
        let hotels = TripAdvisorClient::new(RapidApiTransport::new(
            config.hotels.clone(),
            config.rapid_api_key(),
            config.http_timeout,
        )?);
        let search = DuckDuckGoSearch::new(config.search_base_url.clone(), config.http_timeout)?;

        Ok(Self::new(
            Arc::new(llm),
            Arc::new(flights),
            Arc::new(hotels),
            Arc::new(search),
            config.attraction_cooldown,
            Arc::new(IdentifierCache::new()),
        ))
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn cache(&self) -> &Arc<IdentifierCache> {
        self.resolver.cache()
    }

    /// Extracts the intent for a query, once per session.
    pub async fn intent_for(&self, raw_query: &str) -> Result<TravelIntent, ExtractionError> {
        if let Some(intent) = self.session.intent(raw_query) {
            return Ok(intent);
        }
        let intent = self.extractor.extract(raw_query).await?;
        info!(
            origin = %intent.origin_city,
            destination = %intent.destination_city,
            depart = %intent.depart_date,
            return_date = %intent.return_date,
            "extracted travel intent"
        );
        self.session.remember_intent(raw_query, &intent);
        Ok(intent)
    }

    #[instrument(skip(self))]
    pub async fn run_flight_search(&self, raw_query: &str) -> SearchReport<FlightOffer> {
        match self.intent_for(raw_query).await {
            Ok(intent) => self.flights_for_intent(&intent).await,
            Err(e) => SearchReport::failed(describe_extraction_failure(&e)),
        }
    }

    pub async fn flights_for_intent(&self, intent: &TravelIntent) -> SearchReport<FlightOffer> {
        let (origin, destination) = tokio::join!(
            self.resolver
                .resolve(Namespace::FlightEntity, &intent.origin_city),
            self.resolver
                .resolve(Namespace::FlightEntity, &intent.destination_city),
        );

        let (origin_id, destination_id) = match (origin, destination) {
            (Ok(o), Ok(d)) => (o, d),
            (origin, destination) => {
                for err in [origin.err(), destination.err()].into_iter().flatten() {
                    warn!(error = %err, "flight place resolution failed");
                }
                return SearchReport::failed(format!(
                    "Could not find IDs for {} and {}.",
                    intent.origin_city, intent.destination_city
                ));
            }
        };

        let criteria = FlightCriteria {
            origin_id,
            destination_id,
            depart_date: intent.depart_date.to_string(),
            return_date: intent.return_date.date().map(|d| d.to_string()),
        };

        let offers = match self.flights.search(&criteria).await {
            Ok(offers) => offers,
            Err(e) => {
                warn!(error = %e, "flight search failed");
                return SearchReport::failed(describe_provider_failure("flight", &e));
            }
        };

        // Provider order is price-ascending; the first offer is the cheapest
        match offers.first() {
            None => SearchReport::empty("No flights found."),
            Some(best) => {
                let summary = format!(
                    "The cheapest flight is {} flight {} at {}.",
                    best.airline, best.flight_number, best.price
                );
                SearchReport::found(offers, summary)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn run_hotel_search(&self, raw_query: &str) -> SearchReport<HotelOffer> {
        if let Some(report) = self.session.hotel_report(raw_query) {
            info!("hotel search already done this session; reusing result");
            return report;
        }

        let report = match self.intent_for(raw_query).await {
            Ok(intent) => self.hotels_for_intent(&intent).await,
            Err(e) => return SearchReport::failed(describe_extraction_failure(&e)),
        };

        if report.status != ReportStatus::Failed {
            self.session.remember_hotel_report(raw_query, &report);
        }
        report
    }

    pub async fn hotels_for_intent(&self, intent: &TravelIntent) -> SearchReport<HotelOffer> {
        let city = intent.destination_city.trim();
        let geo_id = match self.resolver.resolve(Namespace::HotelGeo, city).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "hotel place resolution failed");
                return SearchReport::failed(format!("Could not retrieve GeoID for {}: {}", city, e));
            }
        };

        let criteria = HotelCriteria {
            geo_id,
            check_in: intent.depart_date.to_string(),
            check_out: intent.return_date.date().map(|d| d.to_string()),
        };

        let mut offers = match self.hotels.search(&criteria).await {
            Ok(offers) => offers,
            Err(e) => {
                warn!(error = %e, "hotel search failed");
                return SearchReport::failed(describe_provider_failure("hotel", &e));
            }
        };

        if offers.is_empty() {
            return SearchReport::empty("No hotels found.");
        }

        rank_by_rating(&mut offers);
        let best = &offers[0];
        let summary = format!(
            "The highest-rated hotel is {} with a rating of {}/5 at {}.",
            best.name,
            best.rating_label(),
            best.price
        );
        SearchReport::found(offers, summary)
    }

    #[instrument(skip(self))]
    pub async fn run_attraction_search(&self, destination_city: &str) -> String {
        let city = destination_city.trim();
        match self.attractions.search(city).await {
            Ok(Some(text)) => text,
            Ok(None) => format!("No attractions found for '{}'.", city),
            Err(e) => {
                warn!(error = %e, "attraction search failed");
                format!("Error searching for attractions: {}", e)
            }
        }
    }

    /// Extracts intent once, then runs all three pipelines concurrently.
    pub async fn plan_trip(&self, raw_query: &str) -> TripPlan {
        let intent = match self.intent_for(raw_query).await {
            Ok(intent) => intent,
            Err(e) => {
                let message = describe_extraction_failure(&e);
                return TripPlan {
                    intent: None,
                    flights: SearchReport::failed(message.clone()),
                    hotels: SearchReport::failed(message.clone()),
                    attractions: message,
                };
            }
        };

        let (flights, hotels, attractions) = tokio::join!(
            self.flights_for_intent(&intent),
            self.run_hotel_search(raw_query),
            self.run_attraction_search(&intent.destination_city),
        );

        TripPlan {
            intent: Some(intent),
            flights,
            hotels,
            attractions,
        }
    }
}
