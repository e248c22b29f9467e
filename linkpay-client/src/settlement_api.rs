//! Client for the settlement server's HTTP endpoints.
//!
//! [`HttpSettlementApi`] posts x402 payloads to `POST /api/x402/verify/{id}`
//! and landed transactions to `POST /api/pay/direct`, and fetches offers
//! from `GET /api/x402/requirements/{id}`. Rejections carrying the server's
//! `{error, message}` body surface as [`SettlementApiError::Rejected`].

use async_trait::async_trait;
use linkpay::constants::{X_BUYER_ADDRESS_HEADER, X_PAYMENT_HEADER, X_PAYMENT_REQUIRED_HEADER};
use linkpay::proto::decode_payment_required;
use linkpay::settlement::{ApiErrorBody, ApiSuccess, DirectPaymentRequest, ErrorReason};
use linkpay::{Network, PaymentRequired, Settlement};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Errors talking to the settlement server.
#[derive(Debug, thiserror::Error)]
pub enum SettlementApiError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body was not what the endpoint promises.
    #[error("Failed to decode response: {context}: {message}")]
    Decode {
        /// Human-readable context.
        context: &'static str,
        /// What went wrong.
        message: String,
    },
    /// The server refused the payment.
    #[error("{reason}: {message}")]
    Rejected {
        /// HTTP status.
        status: StatusCode,
        /// Stable reason tag.
        reason: ErrorReason,
        /// Server's explanation.
        message: String,
    },
    /// Unexpected HTTP status without a recognizable error body.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
}

impl SettlementApiError {
    /// The stable reason tag, if the server gave one.
    #[must_use]
    pub const fn reason(&self) -> Option<ErrorReason> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The message shown to the buyer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                reason: ErrorReason::Replay,
                ..
            } => "This payment has already been used to unlock a purchase.".to_owned(),
            Self::Rejected { message, .. } => message.clone(),
            _ => "Could not reach the payment server. Please try again.".to_owned(),
        }
    }
}

/// What the orchestrator needs from the settlement server.
#[async_trait]
pub trait SettlementApi: Send + Sync {
    /// Submits an encoded x402 payload for `product_id`.
    async fn verify_x402(
        &self,
        product_id: &str,
        payment_header: &str,
        buyer_address: &str,
    ) -> Result<Settlement, SettlementApiError>;

    /// Reports a landed transfer.
    async fn verify_direct(
        &self,
        request: &DirectPaymentRequest,
    ) -> Result<Settlement, SettlementApiError>;
}

/// [`SettlementApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpSettlementApi {
    base_url: Url,
    client: Client,
    timeout: Option<Duration>,
}

impl HttpSettlementApi {
    /// Creates a client for the server at `base_url`.
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        // Relative joins would otherwise drop the last path segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            client: Client::new(),
            timeout: None,
        }
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The server's base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, context: &'static str) -> Result<Url, SettlementApiError> {
        self.base_url
            .join(path)
            .map_err(|source| SettlementApiError::UrlParse { context, source })
    }

    async fn send(
        &self,
        req: RequestBuilder,
        context: &'static str,
    ) -> Result<Response, SettlementApiError> {
        let req = match self.timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        };
        req.send()
            .await
            .map_err(|source| SettlementApiError::Http { context, source })
    }

    /// Fetches the payment offer for a product.
    ///
    /// The server answers `402 Payment Required`; the envelope is read from
    /// the `X-PAYMENT-REQUIRED` header, or the body when the header is absent.
    ///
    /// # Errors
    ///
    /// [`SettlementApiError::Rejected`] if the product cannot be bought.
    #[tracing::instrument(skip(self), err)]
    pub async fn payment_requirements(
        &self,
        product_id: &str,
        network: Network,
    ) -> Result<PaymentRequired, SettlementApiError> {
        const CONTEXT: &str = "GET /api/x402/requirements";
        let mut url = self.endpoint(&format!("api/x402/requirements/{product_id}"), CONTEXT)?;
        url.query_pairs_mut().append_pair("network", network.name());
        let response = self.send(self.client.get(url), CONTEXT).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Err(rejection(response, CONTEXT).await);
        }
        let header = response
            .headers()
            .get(X_PAYMENT_REQUIRED_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        match header {
            Some(encoded) => {
                decode_payment_required(&encoded).map_err(|e| SettlementApiError::Decode {
                    context: CONTEXT,
                    message: e.to_string(),
                })
            }
            None => response
                .json()
                .await
                .map_err(|e| SettlementApiError::Decode {
                    context: CONTEXT,
                    message: e.to_string(),
                }),
        }
    }
}

#[async_trait]
impl SettlementApi for HttpSettlementApi {
    #[tracing::instrument(skip(self, payment_header), err)]
    async fn verify_x402(
        &self,
        product_id: &str,
        payment_header: &str,
        buyer_address: &str,
    ) -> Result<Settlement, SettlementApiError> {
        const CONTEXT: &str = "POST /api/x402/verify";
        let url = self.endpoint(&format!("api/x402/verify/{product_id}"), CONTEXT)?;
        let req = self
            .client
            .post(url)
            .header(X_PAYMENT_HEADER, payment_header)
            .header(X_BUYER_ADDRESS_HEADER, buyer_address);
        settlement(self.send(req, CONTEXT).await?, CONTEXT).await
    }

    #[tracing::instrument(skip(self), err)]
    async fn verify_direct(
        &self,
        request: &DirectPaymentRequest,
    ) -> Result<Settlement, SettlementApiError> {
        const CONTEXT: &str = "POST /api/pay/direct";
        let url = self.endpoint("api/pay/direct", CONTEXT)?;
        let req = self.client.post(url).json(request);
        settlement(self.send(req, CONTEXT).await?, CONTEXT).await
    }
}

async fn settlement(
    response: Response,
    context: &'static str,
) -> Result<Settlement, SettlementApiError> {
    if response.status() != StatusCode::OK {
        return Err(rejection(response, context).await);
    }
    let body: ApiSuccess<Settlement> =
        response
            .json()
            .await
            .map_err(|e| SettlementApiError::Decode {
                context,
                message: e.to_string(),
            })?;
    if !body.success {
        return Err(SettlementApiError::Decode {
            context,
            message: "success flag not set".to_owned(),
        });
    }
    Ok(body.data)
}

async fn rejection(response: Response, context: &'static str) -> SettlementApiError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(source) => return SettlementApiError::Http { context, source },
    };
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) => SettlementApiError::Rejected {
            status,
            reason: err.error,
            message: err.message,
        },
        Err(_) => SettlementApiError::HttpStatus {
            context,
            status,
            body,
        },
    }
}
