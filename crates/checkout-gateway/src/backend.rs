//! Payment Backend Client
//!
//! The storefront backend owns customers, transactions and the calls to the
//! payment provider. [`PaymentBackend`] is the seam the orchestrator and the
//! poller talk through; [`HttpPaymentBackend`] is the reqwest implementation.

use async_trait::async_trait;
use checkout_core::{CheckoutItem, CustomerInfo, PaymentStatus};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{GatewayError, Result};

/// Customer created by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub customer_id: String,
    pub email: String,
}

/// Order line as the backend expects it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub product_id: String,
    pub quantity: u32,
}

impl From<&CheckoutItem> for TransactionItem {
    fn from(item: &CheckoutItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
        }
    }
}

/// `POST /transactions` body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub items: Vec<TransactionItem>,
    pub customer_id: String,
}

/// Transaction created by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub total_amount: Decimal,
    pub base_fee: Decimal,
    pub delivery_fee: Decimal,
    pub status: String,
}

/// Provider acceptance token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceToken {
    pub acceptance_token: String,
    #[serde(default)]
    pub permalink: String,
}

/// `POST /transactions/{id}/process` body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    pub card_token: String,
    pub acceptance_token: String,
    pub customer_email: String,
    pub delivery_address: String,
    pub delivery_city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_postal_code: Option<String>,
}

/// Payment outcome, from submission or from a status check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub status: PaymentStatus,
    pub transaction_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "wompiReference")]
    pub reference: Option<String>,
}

/// Payment backend trait
///
/// Implemented over HTTP by [`HttpPaymentBackend`] and in-memory by
/// [`crate::mock::MockPaymentBackend`].
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// `POST /customers`
    async fn create_customer(&self, customer: &CustomerInfo) -> Result<CustomerRecord>;

    /// `POST /transactions`
    async fn create_transaction(&self, request: &CreateTransactionRequest) -> Result<TransactionRecord>;

    /// `GET /transactions/wompi/acceptance-token`
    async fn acceptance_token(&self) -> Result<AcceptanceToken>;

    /// `POST /transactions/{id}/process`
    async fn process_payment(
        &self,
        transaction_id: &str,
        request: &ProcessPaymentRequest,
    ) -> Result<PaymentResponse>;

    /// `GET /transactions/{id}/status`
    async fn transaction_status(&self, transaction_id: &str) -> Result<PaymentResponse>;

    /// Backend name, for logs
    fn name(&self) -> &str;
}

/// Error body shape: `message` is a string or a list of strings
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiMessage {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<ApiMessage>,
}

/// Pull the user-facing message out of a backend error body
pub fn extract_api_error(body: &str, fallback: &str) -> String {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .map(|m| match m {
            ApiMessage::One(text) => text,
            ApiMessage::Many(list) => list.join(", "),
        })
        .filter(|m| !m.trim().is_empty());

    message.unwrap_or_else(|| fallback.to_string())
}

/// reqwest-backed payment backend
pub struct HttpPaymentBackend {
    http: Client,
    base_url: String,
}

impl HttpPaymentBackend {
    /// Create a new client
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(&BackendConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_api_error(&body, fallback);
        tracing::warn!(status = %status, message = %message, "Payment backend request failed");

        Err(GatewayError::Remote(message))
    }
}

#[async_trait]
impl PaymentBackend for HttpPaymentBackend {
    async fn create_customer(&self, customer: &CustomerInfo) -> Result<CustomerRecord> {
        let response = self.http.post(self.url("/customers")).json(customer).send().await?;
        Self::read(response, "Failed to create customer").await
    }

    async fn create_transaction(&self, request: &CreateTransactionRequest) -> Result<TransactionRecord> {
        let response = self.http.post(self.url("/transactions")).json(request).send().await?;
        Self::read(response, "Failed to create transaction").await
    }

    async fn acceptance_token(&self) -> Result<AcceptanceToken> {
        let response = self
            .http
            .get(self.url("/transactions/wompi/acceptance-token"))
            .send()
            .await?;
        Self::read(response, "Failed to get acceptance token").await
    }

    async fn process_payment(
        &self,
        transaction_id: &str,
        request: &ProcessPaymentRequest,
    ) -> Result<PaymentResponse> {
        let response = self
            .http
            .post(self.url(&format!("/transactions/{transaction_id}/process")))
            .json(request)
            .send()
            .await?;
        Self::read(response, "Failed to process payment").await
    }

    async fn transaction_status(&self, transaction_id: &str) -> Result<PaymentResponse> {
        let response = self
            .http
            .get(self.url(&format!("/transactions/{transaction_id}/status")))
            .send()
            .await?;
        Self::read(response, "Failed to get transaction status").await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_extract_api_error_shapes() {
        assert_eq!(extract_api_error(r#"{"message":"Invalid Email"}"#, "fallback"), "Invalid Email");
        assert_eq!(
            extract_api_error(r#"{"message":["email must be an email","phone too short"],"statusCode":400}"#, "fallback"),
            "email must be an email, phone too short"
        );
        assert_eq!(extract_api_error(r#"{"statusCode":500}"#, "fallback"), "fallback");
        assert_eq!(extract_api_error("<html>Bad Gateway</html>", "fallback"), "fallback");
        assert_eq!(extract_api_error(r#"{"message":"  "}"#, "fallback"), "fallback");
    }

    #[test]
    fn test_payment_response_accepts_provider_reference() {
        let json = r#"{"status":"APPROVED","transactionId":"tx_1","wompiReference":"ref_9"}"#;
        let response: PaymentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, PaymentStatus::Approved);
        assert_eq!(response.reference.as_deref(), Some("ref_9"));
        assert!(response.message.is_none());
    }

    #[test]
    fn test_transaction_record_from_numbers() {
        let json = r#"{"transactionId":"tx_1","totalAmount":135000,"baseFee":5000,"deliveryFee":10000,"status":"PENDING"}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.total_amount, dec!(135000));
    }

    #[test]
    fn test_process_request_wire_names() {
        let request = ProcessPaymentRequest {
            card_token: "tok".into(),
            acceptance_token: "acc".into(),
            customer_email: "ana@example.com".into(),
            delivery_address: "Calle 123 #45-67".into(),
            delivery_city: "Bogota".into(),
            delivery_postal_code: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["cardToken"], "tok");
        assert_eq!(json["acceptanceToken"], "acc");
        assert!(json.get("deliveryPostalCode").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpPaymentBackend::new(&BackendConfig {
            api_url: "http://localhost:3000/".into(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(backend.url("/customers"), "http://localhost:3000/customers");
    }

    fn backend_at(server: &wiremock::MockServer) -> HttpPaymentBackend {
        HttpPaymentBackend::new(&BackendConfig {
            api_url: server.uri(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_create_customer() {
        use wiremock::matchers::{body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .and(body_json(serde_json::json!({
                "name": "Ana Perez",
                "email": "ana@example.com",
                "phone": "3001234567"
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"customerId": "cus_1", "email": "ana@example.com"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let customer = CustomerInfo {
            name: "Ana Perez".into(),
            email: "ana@example.com".into(),
            phone: "3001234567".into(),
        };
        let record = backend_at(&server).create_customer(&customer).await.unwrap();

        assert_eq!(record.customer_id, "cus_1");
    }

    #[tokio::test]
    async fn test_http_customer_failure_uses_fallback() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = backend_at(&server)
            .create_customer(&CustomerInfo::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Remote(ref m) if m == "Failed to create customer"));
    }

    #[tokio::test]
    async fn test_http_create_transaction_reports_backend_message() {
        use wiremock::matchers::{body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .and(body_json(serde_json::json!({
                "items": [{"productId": "prod_1", "quantity": 2}],
                "customerId": "cus_1"
            })))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": ["Insufficient stock"], "statusCode": 400})),
            )
            .mount(&server)
            .await;

        let request = CreateTransactionRequest {
            items: vec![TransactionItem {
                product_id: "prod_1".into(),
                quantity: 2,
            }],
            customer_id: "cus_1".into(),
        };
        let err = backend_at(&server).create_transaction(&request).await.unwrap_err();

        assert!(matches!(err, GatewayError::Remote(ref m) if m == "Insufficient stock"));
    }

    #[tokio::test]
    async fn test_http_acceptance_token_is_a_get() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transactions/wompi/acceptance-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "acceptanceToken": "acc_1",
                "permalink": "https://example.com/terms.pdf"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = backend_at(&server).acceptance_token().await.unwrap();

        assert_eq!(token.acceptance_token, "acc_1");
    }

    #[tokio::test]
    async fn test_http_process_and_status_paths() {
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions/tx_1/process"))
            .and(body_partial_json(serde_json::json!({"cardToken": "tok_1", "acceptanceToken": "acc_1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "PENDING", "transactionId": "tx_1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/transactions/tx_1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "APPROVED",
                "transactionId": "tx_1",
                "wompiReference": "ref_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_at(&server);
        let request = ProcessPaymentRequest {
            card_token: "tok_1".into(),
            acceptance_token: "acc_1".into(),
            customer_email: "ana@example.com".into(),
            delivery_address: "Calle 123 #45-67".into(),
            delivery_city: "Bogota".into(),
            delivery_postal_code: None,
        };

        let submitted = backend.process_payment("tx_1", &request).await.unwrap();
        assert_eq!(submitted.status, PaymentStatus::Pending);

        let polled = backend.transaction_status("tx_1").await.unwrap();
        assert_eq!(polled.status, PaymentStatus::Approved);
        assert_eq!(polled.reference.as_deref(), Some("ref_1"));
    }

    #[tokio::test]
    async fn test_http_status_failure_uses_fallback() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transactions/tx_1/status"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = backend_at(&server).transaction_status("tx_1").await.unwrap_err();

        assert!(matches!(err, GatewayError::Remote(ref m) if m == "Failed to get transaction status"));
    }
}
