// Resolves free-text place names into provider identifiers, read-through the cache

use crate::identifier_cache::{normalize_city, IdentifierCache, Namespace};
use crate::provider::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No {namespace} found for {city}.")]
    NotFound { namespace: Namespace, city: String },

    #[error("{namespace} lookup for {city} failed: {source}")]
    Provider {
        namespace: Namespace,
        city: String,
        #[source]
        source: ProviderError,
    },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}

// One place-name lookup endpoint of a provider
#[async_trait]
pub trait PlaceLookup: Send + Sync + 'static {
    // Ok(None) means the provider answered well-formed but with no match
    async fn lookup(&self, city: &str) -> Result<Option<String>, ProviderError>;
}

pub struct IdentifierResolver {
    cache: Arc<IdentifierCache>,
    flight_lookup: Arc<dyn PlaceLookup>,
    hotel_lookup: Arc<dyn PlaceLookup>,
}

impl IdentifierResolver {
    pub fn new(
        cache: Arc<IdentifierCache>,
        flight_lookup: Arc<dyn PlaceLookup>,
        hotel_lookup: Arc<dyn PlaceLookup>,
    ) -> Self {
        Self {
            cache,
            flight_lookup,
            hotel_lookup,
        }
    }

    pub fn cache(&self) -> &Arc<IdentifierCache> {
        &self.cache
    }

    fn lookup_for(&self, namespace: Namespace) -> &Arc<dyn PlaceLookup> {
        match namespace {
            Namespace::FlightEntity => &self.flight_lookup,
            Namespace::HotelGeo => &self.hotel_lookup,
        }
    }

    /// Returns the cached identifier or fetches it once from the namespace's provider.
    ///
    /// Only successful lookups are cached, so a `NotFound` city is asked again
    /// on the next call. A blank city is `NotFound` without any lookup.
    pub async fn resolve(&self, namespace: Namespace, city: &str) -> Result<String, ResolveError> {
        let city = normalize_city(city);
        if city.is_empty() {
            return Err(ResolveError::NotFound { namespace, city });
        }

        if let Some(identifier) = self.cache.get(namespace, &city) {
            debug!(%namespace, city = %city, "identifier cache hit");
            return Ok(identifier);
        }

        let fill_lock = self.cache.fill_lock(namespace, &city);
        let outcome = {
            let _guard = fill_lock.lock().await;
            self.fetch_locked(namespace, city.clone()).await
        };
        drop(fill_lock);
        self.cache.release_fill_lock(namespace, &city);
        outcome
    }

    // Caller holds the fill lock for (namespace, city)
    async fn fetch_locked(&self, namespace: Namespace, city: String) -> Result<String, ResolveError> {
        // Another task may have filled the key while we waited
        if let Some(identifier) = self.cache.peek(namespace, &city) {
            return Ok(identifier);
        }

        let found = self
            .lookup_for(namespace)
            .lookup(&city)
            .await
            .map_err(|source| ResolveError::Provider {
                namespace,
                city: city.clone(),
                source,
            })?;

        match found {
            Some(identifier) => {
                info!(%namespace, city = %city, identifier = %identifier, "resolved place");
                Ok(self.cache.insert(namespace, &city, identifier))
            }
            None => Err(ResolveError::NotFound { namespace, city }),
        }
    }
}

#[cfg(test)]
pub mod mock_lookup {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub enum Scripted {
        Found(String),
        Missing,
        Malformed,
        Down,
    }

    // Answers from a fixed table and counts every call
    pub struct CountingLookup {
        answers: Mutex<HashMap<String, Scripted>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingLookup {
        pub fn new() -> Self {
            Self {
                answers: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn answer(self, city: &str, answer: Scripted) -> Self {
            self.answers.lock().insert(city.to_string(), answer);
            self
        }

        pub fn set(&self, city: &str, answer: Scripted) {
            self.answers.lock().insert(city.to_string(), answer);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlaceLookup for CountingLookup {
        async fn lookup(&self, city: &str) -> Result<Option<String>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.answers.lock().get(city) {
                Some(Scripted::Found(id)) => Ok(Some(id.clone())),
                Some(Scripted::Malformed) => {
                    Err(ProviderError::Parse("expected value at line 1".to_string()))
                }
                Some(Scripted::Down) => {
                    Err(ProviderError::Transport("connection refused".to_string()))
                }
                Some(Scripted::Missing) | None => Ok(None),
            }
        }
    }
}
