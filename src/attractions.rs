// Attraction suggestions from a general web search

use crate::provider::ProviderError;
use async_trait::async_trait;
use futures::FutureExt;
use regex::Regex;
use reqwest::Client;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub fn attraction_query(city: &str) -> String {
    format!(
        "List of most visited tourist attractions in {} - Just names, no descriptions",
        city.trim()
    )
}

// Free-text search engine; no structured schema
#[async_trait]
pub trait WebSearch: Send + Sync + 'static {
    async fn run(&self, query: &str) -> Result<String, ProviderError>;
}

pub const RESULTS_PATH: &str = "/html/";

// Snippet anchors of the DuckDuckGo HTML results page
const SNIPPET_PATTERN: &str = r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#;
const TAG_PATTERN: &str = r"<[^>]+>";

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

struct SnippetParser {
    snippet: Regex,
    tag: Regex,
}

impl SnippetParser {
    fn new() -> Result<Self, ProviderError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| ProviderError::Client(format!("bad pattern: {}", e)))
        };
        Ok(Self {
            snippet: compile(SNIPPET_PATTERN)?,
            tag: compile(TAG_PATTERN)?,
        })
    }

    // One line per result snippet, markup stripped
    fn snippets(&self, html: &str) -> String {
        self.snippet
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| decode_entities(self.tag.replace_all(m.as_str(), "").trim()))
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// General web search over the DuckDuckGo HTML results page.
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
    parser: SnippetParser,
}

impl DuckDuckGoSearch {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("travel-assistant/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            parser: SnippetParser::new()?,
        })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn run(&self, query: &str) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), RESULTS_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let text = self.parser.snippets(&body);
        debug!(lines = text.lines().count(), "web search snippets");
        Ok(text)
    }
}

/// Runs `fut`, then waits `delay` whatever the outcome, panics included.
pub async fn with_cooldown<F, T>(delay: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let outcome = AssertUnwindSafe(fut).catch_unwind().await;
    if !delay.is_zero() {
        debug!(delay_ms = delay.as_millis() as u64, "search cool-down");
        tokio::time::sleep(delay).await;
    }
    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

pub struct AttractionsClient {
    search: Arc<dyn WebSearch>,
    cooldown: Duration,
}

impl AttractionsClient {
    pub fn new(search: Arc<dyn WebSearch>, cooldown: Duration) -> Self {
        Self { search, cooldown }
    }

    // Ok(None) when the search engine returned nothing usable
    pub async fn search(&self, city: &str) -> Result<Option<String>, ProviderError> {
        let query = attraction_query(city);
        let result = with_cooldown(self.cooldown, self.search.run(&query)).await?;
        let text = result.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::mock_search::FixedSearch;
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_applies_after_success() {
        let search = Arc::new(FixedSearch::replying("Colosseum\nPantheon\nTrevi Fountain"));
        let client = AttractionsClient::new(search.clone(), Duration::from_secs(5));

        let started = Instant::now();
        let text = client.search(" Rome ").await.unwrap();

        assert_eq!(text.as_deref(), Some("Colosseum\nPantheon\nTrevi Fountain"));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(
            search.queries.lock()[0],
            "List of most visited tourist attractions in Rome - Just names, no descriptions"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_applies_after_failure() {
        let client = AttractionsClient::new(Arc::new(FixedSearch::failing()), Duration::from_secs(5));

        let started = Instant::now();
        let result = client.search("Rome").await;

        assert!(matches!(result, Err(ProviderError::Transport(_))));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_applies_when_search_panics() {
        let started = Instant::now();
        let handle = tokio::spawn(with_cooldown(Duration::from_secs(5), async move {
            if started.elapsed() >= Duration::ZERO {
                panic!("search engine exploded");
            }
        }));

        let joined = handle.await;
        assert!(joined.unwrap_err().is_panic());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_blank_result_is_none() {
        let client = AttractionsClient::new(Arc::new(FixedSearch::replying("  \n")), Duration::ZERO);
        assert_eq!(client.search("Reykjavik").await.unwrap(), None);
    }

    // Trimmed capture of a DuckDuckGo HTML results page
    const RESULTS_PAGE: &str = r#"
<div class="results">
  <div class="result results_links results_links_deep web-result ">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="https://www.tripadvisor.com/Attractions-g187791">THE 15 BEST Things to Do in Rome</a>
    </h2>
    <a class="result__snippet" href="https://www.tripadvisor.com/Attractions-g187791"><b>Colosseum</b>, Pantheon, Trevi Fountain &amp; Roman Forum</a>
  </div>
  <div class="result results_links results_links_deep web-result ">
    <a class="result__snippet" href="https://en.wikipedia.org/wiki/Vatican_Museums">The Vatican Museums
      are Christian and art museums located within Vatican City</a>
  </div>
  <div class="result results_links results_links_deep web-result ">
    <a class="result__snippet" href="https://example.org"> </a>
  </div>
</div>"#;

    #[test]
    fn test_results_page_snippets_are_joined() {
        let parser = SnippetParser::new().unwrap();
        assert_eq!(
            parser.snippets(RESULTS_PAGE),
            "Colosseum, Pantheon, Trevi Fountain & Roman Forum\n\
             The Vatican Museums are Christian and art museums located within Vatican City"
        );
    }

    #[test]
    fn test_page_without_results_is_blank() {
        let parser = SnippetParser::new().unwrap();
        assert_eq!(parser.snippets(r#"<div class="no-results">No results.</div>"#), "");
    }
}
