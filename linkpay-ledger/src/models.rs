//! Rows stored by the ledger.

use chrono::{DateTime, Utc};
use linkpay::amount::from_base_units;
use linkpay::network::USDC_DECIMALS;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A sellable link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product id.
    pub id: String,
    /// Creator wallet address; also the payee.
    pub creator_address: String,
    /// Display title.
    pub title: String,
    /// Price in USDC base units.
    pub price_units: i64,
    /// Concealed target URL (see [`obfuscation`](crate::obfuscation)).
    #[serde(skip_serializing)]
    pub target_ref: String,
    /// Settled purchases so far.
    pub sold_count: i64,
    /// Optional cap on `sold_count`.
    pub max_quantity: Option<i64>,
    /// Whether the product is on sale.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Price in USDC.
    #[must_use]
    pub fn price(&self) -> Decimal {
        from_base_units(self.price_units.unsigned_abs(), USDC_DECIMALS)
    }

    /// Whether the quantity cap has been reached.
    #[must_use]
    pub fn is_sold_out(&self) -> bool {
        self.max_quantity.is_some_and(|max| self.sold_count >= max)
    }
}

/// Input for [`SqliteLedger::create_product`](crate::SqliteLedger::create_product).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Explicit id; a UUID is generated when `None`.
    pub id: Option<String>,
    /// Creator wallet address.
    pub creator_address: String,
    /// Display title.
    pub title: String,
    /// Price in USDC; zero for free products.
    pub price: Decimal,
    /// The URL unlocked by a purchase, in plain text.
    pub target_url: String,
    /// Optional cap on the number of sales.
    pub max_quantity: Option<u32>,
}

impl NewProduct {
    /// A product without a quantity cap.
    pub fn new(
        creator_address: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            creator_address: creator_address.into(),
            title: title.into(),
            price,
            target_url: target_url.into(),
            max_quantity: None,
        }
    }

    /// Sets an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Caps the number of sales.
    #[must_use]
    pub const fn with_max_quantity(mut self, max: u32) -> Self {
        self.max_quantity = Some(max);
        self
    }
}

/// A settled purchase. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    /// Purchase id.
    pub id: String,
    /// Product bought.
    pub product_id: String,
    /// Buyer wallet address.
    pub buyer_address: String,
    /// Canonical on-chain reference.
    pub tx_reference: String,
    /// `base` or `solana`.
    pub network: String,
    /// Amount charged in USDC base units.
    pub amount_units: i64,
    /// Settlement time.
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    /// Amount charged in USDC.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        from_base_units(self.amount_units.unsigned_abs(), USDC_DECIMALS)
    }
}
