use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use servicing_api::domain::{EscrowPolicy, FeePolicy, ProductPolicy};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::repository::ProductRepository;

/// Cached policy lookup. Policies are immutable configuration, so a
/// short-TTL read-through cache is safe; ledger balances are never
/// cached here.
pub struct PolicyService {
    product_repository: Arc<dyn ProductRepository>,
    product_cache: Cache<String, ProductPolicy>,
    fee_cache: Cache<String, FeePolicy>,
    escrow_cache: Cache<(String, String), EscrowPolicy>,
}

impl PolicyService {
    pub fn new(product_repository: Arc<dyn ProductRepository>) -> Self {
        Self {
            product_repository,
            product_cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(300))
                .build(),
            fee_cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(300))
                .build(),
            escrow_cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(300))
                .build(),
        }
    }

    pub async fn product_policy(&self, product_code: &str) -> ServicingResult<ProductPolicy> {
        if let Some(policy) = self.product_cache.get(product_code).await {
            return Ok(policy);
        }
        let policy = self
            .product_repository
            .find_product_policy(product_code)
            .await?
            .ok_or_else(|| ServicingError::ProductPolicyNotFound(product_code.to_string()))?;
        self.product_cache
            .insert(product_code.to_string(), policy.clone())
            .await;
        Ok(policy)
    }

    pub async fn fee_policy(&self, product_code: &str) -> ServicingResult<FeePolicy> {
        if let Some(policy) = self.fee_cache.get(product_code).await {
            return Ok(policy);
        }
        let policy = self
            .product_repository
            .find_fee_policy(product_code)
            .await?
            .ok_or_else(|| ServicingError::ProductPolicyNotFound(product_code.to_string()))?;
        self.fee_cache
            .insert(product_code.to_string(), policy.clone())
            .await;
        Ok(policy)
    }

    pub async fn escrow_policy(
        &self,
        product_code: &str,
        jurisdiction: &str,
    ) -> ServicingResult<EscrowPolicy> {
        let key = (product_code.to_string(), jurisdiction.to_string());
        if let Some(policy) = self.escrow_cache.get(&key).await {
            return Ok(policy);
        }
        let policy = self
            .product_repository
            .find_escrow_policy(product_code, jurisdiction)
            .await?
            // jurisdictions without an override fall back to defaults
            .unwrap_or_default();
        self.escrow_cache.insert(key, policy.clone()).await;
        Ok(policy)
    }
}
