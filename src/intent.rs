// Turns a free-text travel query into a typed TravelIntent via the language model

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub const ONE_WAY: &str = "one-way";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("model response contained no JSON object")]
    NoJsonObject,

    #[error("model response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

// A date as the model gave it: ISO when it parses, the literal text otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TravelDate {
    Iso(NaiveDate),
    Literal(String),
}

impl TravelDate {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => TravelDate::Iso(date),
            Err(_) => TravelDate::Literal(raw.to_string()),
        }
    }
}

impl fmt::Display for TravelDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelDate::Iso(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            TravelDate::Literal(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReturnDate {
    OneWay,
    On(TravelDate),
}

impl ReturnDate {
    pub fn parse(raw: &str) -> Self {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if compact.is_empty() || compact == "oneway" || compact == "none" || compact == "null" {
            ReturnDate::OneWay
        } else {
            ReturnDate::On(TravelDate::parse(raw))
        }
    }

    pub fn date(&self) -> Option<&TravelDate> {
        match self {
            ReturnDate::OneWay => None,
            ReturnDate::On(date) => Some(date),
        }
    }
}

impl fmt::Display for ReturnDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnDate::OneWay => write!(f, "{}", ONE_WAY),
            ReturnDate::On(date) => write!(f, "{}", date),
        }
    }
}

/// Structured reading of one raw query. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TravelIntent {
    pub origin_city: String,
    pub destination_city: String,
    pub depart_date: TravelDate,
    pub return_date: ReturnDate,
}

impl TravelIntent {
    pub fn has_origin(&self) -> bool {
        !self.origin_city.is_empty()
    }
}

// Wire shape the prompt asks for; every field optional so absence is reported by name
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntent {
    from_city: Option<String>,
    to_city: Option<String>,
    depart_date: Option<String>,
    return_date: Option<String>,
}

impl TryFrom<RawIntent> for TravelIntent {
    type Error = ExtractionError;

    fn try_from(raw: RawIntent) -> Result<Self, Self::Error> {
        let from_city = raw.from_city.ok_or(ExtractionError::MissingField("fromCity"))?;
        let to_city = raw.to_city.ok_or(ExtractionError::MissingField("toCity"))?;
        let depart_date = raw
            .depart_date
            .ok_or(ExtractionError::MissingField("departDate"))?;
        let return_date = raw
            .return_date
            .ok_or(ExtractionError::MissingField("returnDate"))?;

        let mut origin_city = from_city.trim().to_string();
        let mut destination_city = to_city.trim().to_string();

        // A lone city is the destination
        if destination_city.is_empty() {
            destination_city = std::mem::take(&mut origin_city);
        }
        if destination_city.is_empty() {
            return Err(ExtractionError::MissingField("toCity"));
        }

        Ok(TravelIntent {
            origin_city,
            destination_city,
            depart_date: TravelDate::parse(&depart_date),
            return_date: ReturnDate::parse(&return_date),
        })
    }
}

pub fn build_prompt(query: &str) -> String {
    format!(
        r#"You are an expert travel assistant. Extract these details from the query:
- Departure city
- Destination city
- Departure date (YYYY-MM-DD)
- Return date (YYYY-MM-DD or "One way")

If only one city is mentioned, assume it is the destination city.

Return JSON with exactly these fields:
{{
  "fromCity": "...",
  "toCity": "...",
  "departDate": "...",
  "returnDate": "..." or "One way"
}}

Query: {}"#,
        query.trim()
    )
}

/// Narrows model output to the span from the first `{` to the last `}`, inclusive.
pub fn extract_json_payload(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}

pub fn parse_intent(response: &str) -> Result<TravelIntent, ExtractionError> {
    let payload = extract_json_payload(response).ok_or(ExtractionError::NoJsonObject)?;
    let raw: RawIntent =
        serde_json::from_str(payload).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
    TravelIntent::try_from(raw)
}

pub struct IntentExtractor {
    llm: Arc<dyn LlmClient>,
}

impl IntentExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Single model call; any failure is final for the query.
    pub async fn extract(&self, query: &str) -> Result<TravelIntent, ExtractionError> {
        let request = CompletionRequest::json(build_prompt(query));
        let response = self.llm.complete(&request).await?;
        debug!(chars = response.len(), "model replied");

        parse_intent(&response).map_err(|e| {
            warn!(error = %e, "could not extract travel intent");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_llm::ScriptedLlm;
    use test_case::test_case;

    #[test]
    fn test_prose_around_json_is_ignored() {
        let response = r#"Sure! {"fromCity":"Paris","toCity":"Rome","departDate":"2025-06-01","returnDate":"One way"} Hope that helps."#;
        let intent = parse_intent(response).unwrap();

        assert_eq!(intent.origin_city, "Paris");
        assert_eq!(intent.destination_city, "Rome");
        assert_eq!(intent.depart_date.to_string(), "2025-06-01");
        assert_eq!(intent.return_date, ReturnDate::OneWay);
        assert_eq!(intent.return_date.to_string(), "one-way");
    }

    #[test]
    fn test_fenced_json_is_extracted() {
        let response = "```json\n{\"fromCity\": \"Berlin\", \"toCity\": \"Madrid\", \"departDate\": \"2025-07-10\", \"returnDate\": \"2025-07-17\"}\n```";
        let intent = parse_intent(response).unwrap();
        assert_eq!(
            intent.return_date,
            ReturnDate::On(TravelDate::Iso(NaiveDate::from_ymd_opt(2025, 7, 17).unwrap()))
        );
    }

    #[test]
    fn test_no_brace_is_extraction_failure() {
        let result = parse_intent("I could not understand that request.");
        assert!(matches!(result, Err(ExtractionError::NoJsonObject)));
    }

    #[test]
    fn test_closing_brace_before_opening_is_rejected() {
        assert_eq!(extract_json_payload("} nothing {"), None);
    }

    #[test]
    fn test_broken_json_is_invalid() {
        let result = parse_intent(r#"{"fromCity": "Paris", "toCity": }"#);
        assert!(matches!(result, Err(ExtractionError::InvalidJson(_))));
    }

    #[test]
    fn test_missing_field_is_named() {
        let result =
            parse_intent(r#"{"fromCity": "Paris", "toCity": "Rome", "departDate": "2025-06-01"}"#);
        assert!(matches!(result, Err(ExtractionError::MissingField("returnDate"))));
    }

    #[test]
    fn test_single_city_becomes_destination() {
        let intent = parse_intent(
            r#"{"fromCity": "Tokyo", "toCity": "", "departDate": "2025-09-01", "returnDate": "One way"}"#,
        )
        .unwrap();
        assert_eq!(intent.destination_city, "Tokyo");
        assert!(!intent.has_origin());
    }

    #[test]
    fn test_unparsed_date_is_kept_literally() {
        let intent = parse_intent(
            r#"{"fromCity": "", "toCity": "Oslo", "departDate": "next Friday", "returnDate": "2025-13-40"}"#,
        )
        .unwrap();
        assert_eq!(intent.depart_date, TravelDate::Literal("next Friday".to_string()));
        assert_eq!(
            intent.return_date,
            ReturnDate::On(TravelDate::Literal("2025-13-40".to_string()))
        );
    }

    #[test_case("One way" ; "title case")]
    #[test_case("one-way" ; "hyphenated")]
    #[test_case("ONEWAY" ; "upper compact")]
    #[test_case("" ; "empty")]
    fn test_one_way_sentinels(raw: &str) {
        assert_eq!(ReturnDate::parse(raw), ReturnDate::OneWay);
    }

    #[test]
    fn test_prompt_embeds_query_and_single_city_rule() {
        let prompt = build_prompt("  fly me to Lisbon on 2025-05-02 ");
        assert!(prompt.ends_with("Query: fly me to Lisbon on 2025-05-02"));
        assert!(prompt.contains("If only one city is mentioned, assume it is the destination city."));
        assert!(prompt.contains("\"returnDate\""));
    }

    #[tokio::test]
    async fn test_extractor_requests_json_once() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"fromCity":"Milan","toCity":"London","departDate":"2025-03-03","returnDate":"2025-03-09"}"#,
        ));
        let extractor = IntentExtractor::new(llm.clone());

        let intent = extractor.extract("Milan to London 3-9 March").await.unwrap();
        assert_eq!(intent.destination_city, "London");

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].json_response);
        assert!(prompts[0].prompt.contains("Milan to London 3-9 March"));
    }

    #[tokio::test]
    async fn test_model_failure_is_not_retried() {
        let llm = Arc::new(ScriptedLlm::new().fail(LlmError::Http("connection reset".into())));
        let extractor = IntentExtractor::new(llm.clone());

        let err = extractor.extract("anything").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Model(_)));
        assert_eq!(llm.prompts().len(), 1);
    }
}
