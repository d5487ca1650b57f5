use async_trait::async_trait;
use servicing_api::domain::{EscrowPolicy, FeePolicy, ProductPolicy};
use servicing_api::ServicingResult;

/// Policy lookup. Policies are immutable configuration; implementations
/// may cache them, never ledger balances.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_product_policy(
        &self,
        product_code: &str,
    ) -> ServicingResult<Option<ProductPolicy>>;

    async fn find_fee_policy(&self, product_code: &str) -> ServicingResult<Option<FeePolicy>>;

    /// Escrow analysis policy keyed by (product, jurisdiction).
    async fn find_escrow_policy(
        &self,
        product_code: &str,
        jurisdiction: &str,
    ) -> ServicingResult<Option<EscrowPolicy>>;

    async fn upsert_product_policy(&self, policy: ProductPolicy) -> ServicingResult<()>;

    async fn upsert_fee_policy(&self, product_code: &str, policy: FeePolicy)
        -> ServicingResult<()>;

    async fn upsert_escrow_policy(
        &self,
        product_code: &str,
        jurisdiction: &str,
        policy: EscrowPolicy,
    ) -> ServicingResult<()>;
}
