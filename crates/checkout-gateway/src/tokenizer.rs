//! Card Tokenization
//!
//! Raw card data goes straight from the client to the tokenization service
//! (Wompi) and comes back as an opaque token; only that token is ever sent
//! to the storefront backend.
//!
//! The service reports errors in several shapes. They are parsed into
//! [`TokenizationErrorBody`] and normalized by
//! [`extract_tokenization_error`]:
//!
//! ```text
//! {"error":{"messages":["a","b"]}}                 → "a, b"
//! {"error":{"messages":{"number":["is invalid"]}}} → "Card number: is invalid"
//! {"error":{"messages":"text"}}                    → "text"
//! {"error":{"reason":"text"}}                      → "text"
//! {"error":"text"}                                 → "text"
//! {"error":{"type":"INPUT_VALIDATION_ERROR"}}      → "INPUT_VALIDATION_ERROR"
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use checkout_core::CardDetails;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::TokenizerConfig;
use crate::error::{GatewayError, Result};

/// Token issued for a card
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardToken {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: String,
}

/// Card tokenizer trait
#[async_trait]
pub trait CardTokenizer: Send + Sync {
    /// Exchange raw card data for an opaque token
    async fn tokenize(&self, card: &CardDetails) -> Result<CardToken>;

    /// Tokenizer name, for logs
    fn name(&self) -> &str;
}

/// `messages` field: list, field → list map, or plain text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessages {
    List(Vec<String>),
    Fields(BTreeMap<String, Vec<String>>),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub reason: Option<String>,
    pub messages: Option<ErrorMessages>,
}

/// `error` field: structured detail or a bare string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    Detail(ErrorDetail),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct TokenizationErrorBody {
    pub error: Option<ErrorField>,
}

const DEFAULT_TOKENIZATION_ERROR: &str = "Card tokenization failed";

fn friendly_field(field: &str) -> &str {
    match field {
        "card_holder" => "Card holder",
        "number" => "Card number",
        "cvc" => "CVC",
        "exp_month" => "Expiry month",
        "exp_year" => "Expiry year",
        other => other,
    }
}

impl TokenizationErrorBody {
    /// One human-readable message, whatever shape the payload had
    pub fn message(&self) -> Option<String> {
        match self.error.as_ref()? {
            ErrorField::Text(text) => Some(text.clone()),
            ErrorField::Detail(detail) => match &detail.messages {
                Some(ErrorMessages::List(list)) => Some(list.join(", ")),
                Some(ErrorMessages::Fields(fields)) => Some(
                    fields
                        .iter()
                        .map(|(field, msgs)| format!("{}: {}", friendly_field(field), msgs.join(" ")))
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                Some(ErrorMessages::Text(text)) => Some(text.clone()),
                None => detail.reason.clone().or_else(|| detail.kind.clone()),
            },
        }
    }
}

/// Normalize a tokenization error payload into a single message
pub fn extract_tokenization_error(body: &str) -> String {
    serde_json::from_str::<TokenizationErrorBody>(body)
        .ok()
        .and_then(|b| b.message())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TOKENIZATION_ERROR.to_string())
}

/// Sanity checks run before any card data leaves the process
pub fn check_card_details(card: &CardDetails) -> Result<()> {
    if card.number.len() < 13 {
        return Err(GatewayError::Tokenization("Invalid card number".into()));
    }
    if !(3..=4).contains(&card.cvc.len()) || !card.cvc.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::Tokenization("Invalid CVC".into()));
    }
    if card.exp_month.is_empty() || card.exp_year.is_empty() {
        return Err(GatewayError::Tokenization("Invalid expiry date".into()));
    }
    if card.card_holder.trim().chars().count() < 5 {
        return Err(GatewayError::Tokenization(
            "Card holder name must be at least 5 characters".into(),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
struct TokenEnvelope {
    data: CardToken,
}

/// Wompi tokenization client
pub struct WompiTokenizer {
    http: Client,
    config: TokenizerConfig,
}

impl WompiTokenizer {
    pub fn new(config: TokenizerConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(TokenizerConfig::from_env()?)
    }
}

#[async_trait]
impl CardTokenizer for WompiTokenizer {
    async fn tokenize(&self, card: &CardDetails) -> Result<CardToken> {
        check_card_details(card)?;

        let url = format!("{}/tokens/cards", self.config.api_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.public_key)
            .json(card)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let envelope: TokenEnvelope = response.json().await?;
            tracing::info!(token_status = %envelope.data.status, "Card tokenized");
            return Ok(envelope.data);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_tokenization_error(&body);
        tracing::warn!(status = %status, message = %message, "Card tokenization rejected");

        Err(GatewayError::Tokenization(message))
    }

    fn name(&self) -> &str {
        "wompi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> CardDetails {
        CardDetails {
            number: "4242424242424242".into(),
            cvc: "123".into(),
            exp_month: "12".into(),
            exp_year: "29".into(),
            card_holder: "Ana Perez".into(),
        }
    }

    #[test]
    fn test_error_message_list() {
        let body = r#"{"error":{"type":"INPUT_VALIDATION_ERROR","messages":["Card expired","Bad CVC"]}}"#;
        assert_eq!(extract_tokenization_error(body), "Card expired, Bad CVC");
    }

    #[test]
    fn test_error_message_field_map() {
        let body = r#"{"error":{"type":"INPUT_VALIDATION_ERROR","messages":{"number":["is invalid"],"card_holder":["too","short"]}}}"#;
        assert_eq!(
            extract_tokenization_error(body),
            "Card holder: too short, Card number: is invalid"
        );
    }

    #[test]
    fn test_error_message_text_reason_type() {
        assert_eq!(extract_tokenization_error(r#"{"error":{"messages":"Card rejected"}}"#), "Card rejected");
        assert_eq!(extract_tokenization_error(r#"{"error":{"reason":"Unauthorized key"}}"#), "Unauthorized key");
        assert_eq!(extract_tokenization_error(r#"{"error":"Service unavailable"}"#), "Service unavailable");
        assert_eq!(
            extract_tokenization_error(r#"{"error":{"type":"NOT_FOUND_ERROR"}}"#),
            "NOT_FOUND_ERROR"
        );
    }

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(extract_tokenization_error("{}"), DEFAULT_TOKENIZATION_ERROR);
        assert_eq!(extract_tokenization_error("not json"), DEFAULT_TOKENIZATION_ERROR);
        assert_eq!(extract_tokenization_error(r#"{"error":{}}"#), DEFAULT_TOKENIZATION_ERROR);
    }

    #[test]
    fn test_check_card_details() {
        assert!(check_card_details(&card()).is_ok());

        let short_holder = CardDetails { card_holder: "Ana".into(), ..card() };
        assert!(matches!(check_card_details(&short_holder), Err(GatewayError::Tokenization(_))));

        let bad_cvc = CardDetails { cvc: "12a".into(), ..card() };
        assert!(check_card_details(&bad_cvc).is_err());

        let no_month = CardDetails { exp_month: String::new(), ..card() };
        assert!(check_card_details(&no_month).is_err());
    }

    #[test]
    fn test_token_envelope() {
        let json = r#"{"status":"CREATED","data":{"id":"tok_test_1","status":"CREATED","created_at":"2026-10-18T00:00:00Z"}}"#;
        let envelope: TokenEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data.id, "tok_test_1");
    }

    fn tokenizer_at(server: &wiremock::MockServer) -> WompiTokenizer {
        WompiTokenizer::new(TokenizerConfig {
            api_url: format!("{}/v1/", server.uri()),
            public_key: "pub_test_key".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_tokenize_reads_data_envelope() {
        use wiremock::matchers::{bearer_token, body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tokens/cards"))
            .and(bearer_token("pub_test_key"))
            .and(body_json(serde_json::json!({
                "number": "4242424242424242",
                "cvc": "123",
                "exp_month": "12",
                "exp_year": "29",
                "card_holder": "Ana Perez"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "status": "CREATED",
                "data": {"id": "tok_test_1", "status": "CREATED", "created_at": "2026-01-01T00:00:00Z"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = tokenizer_at(&server).tokenize(&card()).await.unwrap();

        assert_eq!(token.id, "tok_test_1");
        assert_eq!(token.status, "CREATED");
    }

    #[tokio::test]
    async fn test_tokenize_rejection_is_normalized() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tokens/cards"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "error": {
                    "type": "INPUT_VALIDATION_ERROR",
                    "messages": {"number": ["is invalid"]}
                }
            })))
            .mount(&server)
            .await;

        let err = tokenizer_at(&server).tokenize(&card()).await.unwrap_err();

        assert!(matches!(err, GatewayError::Tokenization(ref m) if m == "Card number: is invalid"));
    }

    #[tokio::test]
    async fn test_tokenize_guard_skips_the_network() {
        use wiremock::matchers::any;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut short_holder = card();
        short_holder.card_holder = "Ana".into();
        let err = tokenizer_at(&server).tokenize(&short_holder).await.unwrap_err();

        assert!(matches!(err, GatewayError::Tokenization(_)));
    }
}
