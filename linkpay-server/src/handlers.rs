//! Axum route handlers.
//!
//! - `POST /api/x402/verify/{product_id}` settles a signed x402 payload
//!   carried in the `X-PAYMENT` header
//! - `POST /api/pay/direct` settles a landed transfer
//! - `GET /api/x402/requirements/{product_id}` answers `402` with the offer
//! - `GET /health` reports liveness
//!
//! A `solana_only` deployment does not mount the x402 verify route, quotes
//! only Solana networks and accepts only Solana signatures on the direct
//! route.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use linkpay::constants::{X_BUYER_ADDRESS_HEADER, X_PAYMENT_HEADER, X_PAYMENT_REQUIRED_HEADER};
use linkpay::proto::{decode_payment_payload, decode_payment_required, encode_payment_required};
use linkpay::settlement::{ApiSuccess, DirectPaymentRequest};
use linkpay::{ChainFamily, Network, Settlement};
use linkpay_ledger::proof::is_solana_signature;
use linkpay_ledger::{LedgerError, Proof, SqliteLedger};
use serde::{Deserialize, Serialize};

use crate::config::Deployment;
use crate::error::ApiError;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The settlement ledger.
    pub ledger: SqliteLedger,
    /// Accepted payment paths.
    pub deployment: Deployment,
}

/// Query parameters of the x402 verify endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct BuyerQuery {
    /// Buyer address, when not sent as `X-BUYER-ADDRESS`.
    pub buyer: Option<String>,
}

/// Query parameters of the requirements endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct NetworkQuery {
    /// Network to quote on; defaults to the first accepted network the
    /// deployment can take.
    pub network: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Always `ok`.
    pub status: String,
    /// Server version.
    pub version: String,
}

/// `POST /api/x402/verify/{product_id}`: settles an x402 payment.
///
/// The buyer is taken from `X-BUYER-ADDRESS`, then `?buyer=`, then the
/// payload's payer.
///
/// # Errors
///
/// `400` for a missing or malformed payload, `404` for an unknown product,
/// `402` if the product cannot be sold or the proof does not pay for it,
/// `409` if the payment was already used.
pub async fn verify_x402(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<BuyerQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiSuccess<Settlement>>, ApiError> {
    let encoded = header_str(&headers, X_PAYMENT_HEADER)
        .ok_or_else(|| ApiError::bad_request(format!("missing {X_PAYMENT_HEADER} header")))?;
    let payload =
        decode_payment_payload(encoded).map_err(|e| ApiError::x402(LedgerError::from(e)))?;
    let buyer = header_str(&headers, X_BUYER_ADDRESS_HEADER)
        .map(str::to_owned)
        .or(query.buyer)
        .unwrap_or_else(|| payload.payload.authorization.from.clone());

    let settlement = state
        .ledger
        .verify_payment(&product_id, &Proof::X402(payload), &buyer)
        .await
        .map_err(ApiError::x402)?;
    Ok(Json(ApiSuccess::new(settlement)))
}

/// `POST /api/pay/direct`: settles a landed transfer.
///
/// # Errors
///
/// `400` for any rejection, `500` for storage failures.
pub async fn pay_direct(
    State(state): State<AppState>,
    body: Result<Json<DirectPaymentRequest>, JsonRejection>,
) -> Result<Json<ApiSuccess<Settlement>>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let network: Network = request
        .network
        .parse()
        .map_err(|e| ApiError::bad_request(format!("{e}")))?;
    if state.deployment == Deployment::SolanaOnly {
        if request.network != "solana" {
            return Err(ApiError::bad_request("only Solana payments are accepted"));
        }
        if !is_solana_signature(&request.tx_hash) {
            return Err(ApiError::bad_request(
                "txHash is not a base58 Solana transaction signature",
            ));
        }
    }

    let proof = Proof::Transaction {
        network,
        reference: request.tx_hash,
    };
    let settlement = state
        .ledger
        .verify_payment(&request.product_id, &proof, &request.buyer_address)
        .await
        .map_err(ApiError::direct)?;
    Ok(Json(ApiSuccess::new(settlement)))
}

/// `GET /api/x402/requirements/{product_id}`: the payment offer.
///
/// Answers `402 Payment Required` with the `PaymentRequired` envelope as the
/// JSON body and, encoded, in the `X-PAYMENT-REQUIRED` header.
///
/// # Errors
///
/// `404` for an unknown product, `402` with an error body if it cannot be
/// sold, `400` for an unknown or unaccepted network.
pub async fn payment_requirements(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> Result<Response, ApiError> {
    let accepted = state.ledger.networks();
    let network: Network = match query.network {
        Some(name) => name
            .parse()
            .map_err(|e| ApiError::bad_request(format!("{e}")))?,
        None => accepted
            .iter()
            .copied()
            .find(|n| {
                state.deployment == Deployment::Multichain || n.family() == ChainFamily::Solana
            })
            .ok_or_else(|| ApiError::bad_request("no network to quote on"))?,
    };
    if state.deployment == Deployment::SolanaOnly && network.family() != ChainFamily::Solana {
        return Err(ApiError::bad_request("only Solana payments are accepted"));
    }
    if !accepted.contains(&network) {
        return Err(ApiError::bad_request(format!(
            "payments on {network} are not accepted"
        )));
    }

    let product = state
        .ledger
        .product(&product_id)
        .await
        .map_err(ApiError::x402)?
        .ok_or_else(|| ApiError::x402(LedgerError::NotFound(product_id.clone())))?;
    if !product.is_active {
        return Err(ApiError::x402(LedgerError::Unavailable(product_id)));
    }
    if product.is_sold_out() {
        return Err(ApiError::x402(LedgerError::SoldOut(product_id)));
    }

    let internal =
        |e: &dyn std::fmt::Display| ApiError::x402(LedgerError::Corrupt(e.to_string()));
    let encoded = encode_payment_required(
        &product.creator_address,
        &product.price_units.to_string(),
        network.caip2(),
        &product.id,
        network.usdc_asset(),
    )
    .map_err(|e| internal(&e))?;
    let envelope = decode_payment_required(&encoded).map_err(|e| internal(&e))?;
    let header = HeaderValue::from_str(&encoded).map_err(|e| internal(&e))?;

    let mut response = (StatusCode::PAYMENT_REQUIRED, Json(envelope)).into_response();
    response
        .headers_mut()
        .insert(X_PAYMENT_REQUIRED_HEADER, header);
    Ok(response)
}

/// `GET /health`.
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Creates an Axum [`axum::Router`] with all settlement endpoints.
pub fn router(state: AppState) -> axum::Router {
    let mut router = axum::Router::new()
        .route("/api/pay/direct", post(pay_direct))
        .route(
            "/api/x402/requirements/{product_id}",
            get(payment_requirements),
        )
        .route("/health", get(health));
    if state.deployment == Deployment::Multichain {
        router = router.route("/api/x402/verify/{product_id}", post(verify_x402));
    }
    router.with_state(state)
}
