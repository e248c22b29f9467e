//! SQLite implementation of the ledger.

use chrono::Utc;
use linkpay::amount::{from_base_units, to_base_units};
use linkpay::network::USDC_DECIMALS;
use linkpay::{Network, Settlement};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::fmt::Debug;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{NewProduct, Product, Purchase};
use crate::obfuscation::{conceal, reveal};
use crate::proof::{EvmProofPolicy, Proof};

/// How long a writer waits for the database lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The settlement ledger on a SQLite database.
///
/// SQLite has a single writer: settlements of different products queue
/// briefly on the write lock (waiting up to five seconds), from the claiming
/// insert until commit. Reads are not blocked in WAL mode.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    evm_proof: EvmProofPolicy,
    networks: Vec<Network>,
}

impl Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SqliteLedger ({:?}, {:?}, {:?})",
            self.pool, self.evm_proof, self.networks
        )
    }
}

impl SqliteLedger {
    /// Opens (creating if needed) the database at `url` and applies
    /// migrations. Only mainnet payments are accepted until
    /// [`with_networks`](Self::with_networks) says otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or migrated.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        evm_proof: EvmProofPolicy,
    ) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);
        if let Some(parent) = options.get_filename().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(url, max_connections, ?evm_proof, "ledger ready");
        Ok(Self {
            pool,
            evm_proof,
            networks: Network::MAINNETS.to_vec(),
        })
    }

    /// Replaces the set of networks payments are accepted on.
    #[must_use]
    pub fn with_networks(mut self, networks: impl IntoIterator<Item = Network>) -> Self {
        self.networks = networks.into_iter().collect();
        self
    }

    /// Networks payments are accepted on.
    #[must_use]
    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    /// The configured x402 proof policy.
    #[must_use]
    pub const fn evm_proof_policy(&self) -> EvmProofPolicy {
        self.evm_proof
    }

    /// Settles a payment for `product_id`.
    ///
    /// Checks, in order: the product exists, it is active, the reference has
    /// not settled another purchase, the quantity cap is not reached, and the
    /// proof matches the product. Then records the purchase, increments the
    /// sold count and credits the creator, all in one transaction.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`], [`LedgerError::Unavailable`],
    /// [`LedgerError::Replay`], [`LedgerError::SoldOut`],
    /// [`LedgerError::InvalidProof`] (also for a network outside
    /// [`networks`](Self::networks)) or [`LedgerError::Protocol`] for
    /// rejected payments; [`LedgerError::Database`] for storage failures.
    #[tracing::instrument(skip(self, proof), err)]
    pub async fn verify_payment(
        &self,
        product_id: &str,
        proof: &Proof,
        buyer_address: &str,
    ) -> Result<Settlement, LedgerError> {
        let buyer_address = buyer_address.trim();
        if buyer_address.is_empty() {
            return Err(LedgerError::Protocol("missing buyer address".to_owned()));
        }
        let network = proof.network(&self.networks)?;
        let reference = proof.reference()?;

        let mut tx = self.pool.begin().await?;
        // Claim the reference first: the insert takes the write lock, and the
        // unique index on tx_reference rejects concurrent claims.
        let claimed = claim_reference(
            product_id,
            buyer_address,
            &reference,
            network.ledger_name(),
            &mut tx,
        )
        .await;
        match claimed {
            Ok(true) => {}
            Ok(false) => return Err(LedgerError::NotFound(product_id.to_owned())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                return Err(self.explain_duplicate(product_id, reference).await);
            }
            Err(e) => return Err(e.into()),
        }

        let product = fetch_product(product_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::NotFound(product_id.to_owned()))?;
        if !product.is_active {
            return Err(LedgerError::Unavailable(product_id.to_owned()));
        }
        if product.is_sold_out() {
            return Err(LedgerError::SoldOut(product_id.to_owned()));
        }
        proof.check(&product, buyer_address, self.evm_proof)?;
        let unlocked_content =
            reveal(&product.target_ref).map_err(|e| LedgerError::Corrupt(e.to_string()))?;

        sqlx::query("UPDATE products SET sold_count = sold_count + 1 WHERE id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        credit_creator(&product.creator_address, product.price_units, &mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            product_id,
            %network,
            reference = %reference,
            buyer = buyer_address,
            "payment settled"
        );
        Ok(Settlement {
            tx_hash: reference,
            unlocked_content,
        })
    }

    /// A reference collided with an existing purchase. Report an inactive
    /// product over the replay so the error does not depend on history.
    async fn explain_duplicate(&self, product_id: &str, reference: String) -> LedgerError {
        match self.product(product_id).await {
            Ok(Some(p)) if !p.is_active => LedgerError::Unavailable(product_id.to_owned()),
            Ok(_) => {
                tracing::warn!(product_id, %reference, "replayed payment reference");
                LedgerError::Replay(reference)
            }
            Err(e) => e,
        }
    }

    /// Creates a product.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Protocol`] for a negative or over-precise price or an
    /// empty creator address; [`LedgerError::Database`] otherwise.
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, LedgerError> {
        if new.creator_address.trim().is_empty() {
            return Err(LedgerError::Protocol("missing creator address".to_owned()));
        }
        let units = to_base_units(new.price, USDC_DECIMALS)?;
        let price_units = i64::try_from(units)
            .map_err(|_| LedgerError::Protocol(format!("price {} out of range", new.price)))?;
        let id = new.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let product = sqlx::query_as(
            r#"
                INSERT INTO products (id, creator_address, title, price_units, target_ref, max_quantity, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *;
            "#,
        )
        .bind(&id)
        .bind(new.creator_address.trim())
        .bind(new.title)
        .bind(price_units)
        .bind(conceal(&new.target_url))
        .bind(new.max_quantity.map(i64::from))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(err) if err.is_unique_violation() => {
                LedgerError::Protocol(format!("product {id} already exists"))
            }
            _ => LedgerError::from(e),
        })?;
        Ok(product)
    }

    /// Looks up a product, active or not.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Database`] on storage failure.
    pub async fn product(&self, product_id: &str) -> Result<Option<Product>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_product(product_id, &mut conn).await?)
    }

    /// Activates or deactivates a product.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if there is no such product.
    pub async fn set_active(&self, product_id: &str, active: bool) -> Result<Product, LedgerError> {
        sqlx::query_as("UPDATE products SET is_active = $1 WHERE id = $2 RETURNING *")
            .bind(active)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::NotFound(product_id.to_owned()))
    }

    /// Total settled earnings of a creator, in USDC.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Database`] on storage failure.
    pub async fn creator_earnings(&self, address: &str) -> Result<Decimal, LedgerError> {
        let units: Option<i64> = sqlx::query_scalar(
            "SELECT total_earnings_units FROM creator_profiles WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(from_base_units(
            units.unwrap_or_default().unsigned_abs(),
            USDC_DECIMALS,
        ))
    }

    /// The purchase recorded under an on-chain reference.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Database`] on storage failure.
    pub async fn purchase_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Purchase>, LedgerError> {
        Ok(
            sqlx::query_as("SELECT * FROM purchases WHERE tx_reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// All purchases by a buyer, newest first.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Database`] on storage failure.
    pub async fn purchases_for_buyer(&self, buyer: &str) -> Result<Vec<Purchase>, LedgerError> {
        Ok(sqlx::query_as(
            "SELECT * FROM purchases WHERE buyer_address = $1 ORDER BY created_at DESC, id",
        )
        .bind(buyer)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Inserts the purchase row, copying the price from the product. Returns
/// `false` if the product does not exist.
async fn claim_reference(
    product_id: &str,
    buyer_address: &str,
    reference: &str,
    network: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO purchases (id, product_id, buyer_address, tx_reference, network, amount_units, created_at)
            SELECT $1, id, $2, $3, $4, price_units, $5 FROM products WHERE id = $6;
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(buyer_address)
    .bind(reference)
    .bind(network)
    .bind(Utc::now())
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

async fn fetch_product(
    product_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await
}

async fn credit_creator(
    address: &str,
    amount_units: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO creator_profiles (address, total_earnings_units) VALUES ($1, $2)
            ON CONFLICT (address) DO UPDATE
            SET total_earnings_units = total_earnings_units + excluded.total_earnings_units;
        "#,
    )
    .bind(address)
    .bind(amount_units)
    .execute(conn)
    .await?;
    Ok(())
}
