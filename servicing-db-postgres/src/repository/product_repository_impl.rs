use async_trait::async_trait;
use sqlx::Row;

use servicing_api::domain::{EscrowPolicy, FeePolicy, ProductPolicy};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::repository::ProductRepository;

use super::executor::Executor;

/// Policies are configuration documents, stored whole as JSONB and
/// deserialized on read.
pub struct ProductRepositoryImpl {
    executor: Executor,
}

impl ProductRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn decode<T: serde::de::DeserializeOwned>(
        value: serde_json::Value,
        what: &str,
    ) -> ServicingResult<T> {
        serde_json::from_value(value)
            .map_err(|e| ServicingError::Configuration(format!("corrupt {what} policy: {e}")))
    }

    fn encode<T: serde::Serialize>(policy: &T, what: &str) -> ServicingResult<serde_json::Value> {
        serde_json::to_value(policy)
            .map_err(|e| ServicingError::Configuration(format!("unencodable {what} policy: {e}")))
    }
}

#[async_trait]
impl ProductRepository for ProductRepositoryImpl {
    async fn find_product_policy(
        &self,
        product_code: &str,
    ) -> ServicingResult<Option<ProductPolicy>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT policy FROM product_policies WHERE product_code = $1")
                    .bind(product_code),
            )
            .await
            .map_err(ServicingError::from)?;
        row.map(|row| {
            let value: serde_json::Value = row.try_get("policy").map_err(ServicingError::from)?;
            Self::decode(value, "product")
        })
        .transpose()
    }

    async fn find_fee_policy(&self, product_code: &str) -> ServicingResult<Option<FeePolicy>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT policy FROM fee_policies WHERE product_code = $1")
                    .bind(product_code),
            )
            .await
            .map_err(ServicingError::from)?;
        row.map(|row| {
            let value: serde_json::Value = row.try_get("policy").map_err(ServicingError::from)?;
            Self::decode(value, "fee")
        })
        .transpose()
    }

    async fn find_escrow_policy(
        &self,
        product_code: &str,
        jurisdiction: &str,
    ) -> ServicingResult<Option<EscrowPolicy>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT policy FROM escrow_policies \
                     WHERE product_code = $1 AND jurisdiction = $2",
                )
                .bind(product_code)
                .bind(jurisdiction),
            )
            .await
            .map_err(ServicingError::from)?;
        row.map(|row| {
            let value: serde_json::Value = row.try_get("policy").map_err(ServicingError::from)?;
            Self::decode(value, "escrow")
        })
        .transpose()
    }

    async fn upsert_product_policy(&self, policy: ProductPolicy) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO product_policies (product_code, policy) VALUES ($1, $2) \
                     ON CONFLICT (product_code) DO UPDATE SET policy = EXCLUDED.policy",
                )
                .bind(&policy.product_code)
                .bind(Self::encode(&policy, "product")?),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn upsert_fee_policy(
        &self,
        product_code: &str,
        policy: FeePolicy,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO fee_policies (product_code, policy) VALUES ($1, $2) \
                     ON CONFLICT (product_code) DO UPDATE SET policy = EXCLUDED.policy",
                )
                .bind(product_code)
                .bind(Self::encode(&policy, "fee")?),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn upsert_escrow_policy(
        &self,
        product_code: &str,
        jurisdiction: &str,
        policy: EscrowPolicy,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO escrow_policies (product_code, jurisdiction, policy) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (product_code, jurisdiction) DO UPDATE SET policy = EXCLUDED.policy",
                )
                .bind(product_code)
                .bind(jurisdiction)
                .bind(Self::encode(&policy, "escrow")?),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }
}
