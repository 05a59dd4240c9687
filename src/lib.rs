// Conversational travel-planning assistant: query -> intent -> provider lookups -> summaries

pub mod attractions;
pub mod config;
pub mod flights;
pub mod hotels;
pub mod identifier_cache;
pub mod intent;
pub mod llm;
pub mod orchestrator;
pub mod presentation;
pub mod provider;
pub mod resolver;

// Re-export key types for convenience
pub use config::{AssistantConfig, ConfigError};
pub use flights::{FlightOffer, FlightSearch};
pub use hotels::{HotelOffer, HotelSearch};
pub use identifier_cache::{CacheStatsReport, IdentifierCache, Namespace};
pub use intent::{ExtractionError, IntentExtractor, ReturnDate, TravelDate, TravelIntent};
pub use llm::{CompletionRequest, GeminiClient, LlmClient, LlmError};
pub use orchestrator::{ReportStatus, SearchOrchestrator, SearchReport, SearchSession, TripPlan};
pub use provider::ProviderError;
pub use resolver::{IdentifierResolver, PlaceLookup, ResolveError};
