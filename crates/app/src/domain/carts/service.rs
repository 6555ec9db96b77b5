//! Carts service.
//!
//! Rows in `cart_entries` are the source of truth. The per-user cache hash is
//! written through on every mutation once it exists, and rebuilt from storage
//! whenever a listing finds it missing.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use mockall::automock;
use sqlx::error::{DatabaseError, ErrorKind};
use tracing::{debug, error, warn};

use crate::{
    cache::{Cache, keys},
    database::Db,
    domain::{
        carts::{
            errors::CartsServiceError,
            models::{CartLine, CartLineRef},
            records::CartEntryRecord,
            repository::PgCartsRepository,
        },
        products::{
            ProductsService, ProductsServiceError, records::SkuId,
            repository::PgProductsRepository,
        },
    },
    ids::UserId,
    retry::{ConflictRetry, RetryPolicy},
};

/// Result of one optimistic merge attempt.
enum Merge {
    Written(CartEntryRecord),
    Removed,
    Conflicted,
}

#[derive(Clone)]
pub struct PgCartsService {
    db: Db,
    cache: Arc<dyn Cache>,
    products: Arc<dyn ProductsService>,
    repository: PgCartsRepository,
    skus: PgProductsRepository,
    retry: RetryPolicy,
    cache_ttl: Duration,
}

impl std::fmt::Debug for PgCartsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCartsService")
            .field("retry", &self.retry)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl PgCartsService {
    #[must_use]
    pub fn new(
        db: Db,
        cache: Arc<dyn Cache>,
        products: Arc<dyn ProductsService>,
        retry: RetryPolicy,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            db,
            cache,
            products,
            repository: PgCartsRepository::new(),
            skus: PgProductsRepository::new(),
            retry,
            cache_ttl,
        }
    }

    async fn try_merge(
        &self,
        user: UserId,
        sku: SkuId,
        specification: &str,
        delta: i32,
    ) -> Result<Merge, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self
            .skus
            .get_sku(&mut tx, sku)
            .await
            .map_err(ProductsServiceError::from)?;

        if !record.listed {
            return Err(CartsServiceError::Delisted);
        }

        let merge = match self
            .repository
            .get_entry(&mut tx, user, sku, specification)
            .await?
        {
            Some(entry) => {
                let count = entry
                    .count
                    .checked_add(delta)
                    .ok_or(CartsServiceError::InvalidQuantity(delta))?;

                if count < 0 {
                    return Err(CartsServiceError::InvalidQuantity(count));
                }

                if count > record.stock {
                    return Err(CartsServiceError::InsufficientStock {
                        requested: count,
                        available: record.stock,
                    });
                }

                if count == 0 {
                    if self.repository.delete_versioned_entry(&mut tx, &entry).await? {
                        Merge::Removed
                    } else {
                        Merge::Conflicted
                    }
                } else {
                    self.repository
                        .update_count(&mut tx, &entry, count)
                        .await?
                        .map_or(Merge::Conflicted, Merge::Written)
                }
            }
            None => {
                if delta <= 0 {
                    return Err(CartsServiceError::InvalidQuantity(delta));
                }

                if delta > record.stock {
                    return Err(CartsServiceError::InsufficientStock {
                        requested: delta,
                        available: record.stock,
                    });
                }

                match self
                    .repository
                    .insert_entry(&mut tx, user, sku, specification, delta)
                    .await
                {
                    Ok(entry) => Merge::Written(entry),
                    Err(error) if is_unique_violation(&error) => Merge::Conflicted,
                    Err(error) => return Err(error.into()),
                }
            }
        };

        if !matches!(merge, Merge::Conflicted) {
            tx.commit().await?;
        }

        Ok(merge)
    }

    /// Build the display line from the SKU and its product, fetched concurrently.
    async fn display(&self, entry: &CartEntryRecord) -> Result<CartLine, ProductsServiceError> {
        let (sku, spu) = tokio::try_join!(
            self.products.get_sku(entry.sku_id),
            self.products.get_spu_of_sku(entry.sku_id),
        )?;

        Ok(CartLine {
            sku_id: sku.id,
            title: sku.title,
            price: sku.price,
            default_pic_url: spu.default_pic_url,
            publish_status: spu.publish_status,
            specification: entry.specification.clone(),
            count: entry.count,
            selected: entry.selected,
            created_at: entry.created_at,
        })
    }

    /// Write-path mirror. Failures leave the cache cold rather than wrong.
    async fn mirror(&self, entry: &CartEntryRecord) {
        if let Err(source) = self.refresh_cached_line(entry.clone()).await {
            warn!(user = %entry.user_id, sku = %entry.sku_id, error = %source, "failed to mirror cart line");
            self.invalidate(entry.user_id).await;
        }
    }

    async fn forget(&self, user: UserId, sku: SkuId, specification: &str) {
        if let Err(source) = self
            .evict_cached_line(user, sku, specification.to_string())
            .await
        {
            warn!(user = %user, sku = %sku, error = %source, "failed to evict cart line");
            self.invalidate(user).await;
        }
    }

    async fn invalidate(&self, user: UserId) {
        if let Err(source) = self.cache.delete(&keys::cart(user)).await {
            error!(user = %user, error = %source, "failed to invalidate cart cache");
        }
    }

    async fn cached_lines(&self, user: UserId) -> Option<Vec<CartLine>> {
        let fields = match self.cache.hash_get_all(&keys::cart(user)).await {
            Ok(fields) => fields,
            Err(source) => {
                warn!(user = %user, error = %source, "cart cache read failed");
                return None;
            }
        };

        if fields.is_empty() {
            return None;
        }

        let mut lines = Vec::with_capacity(fields.len());

        for value in fields.values() {
            match serde_json::from_str::<CartLine>(value) {
                Ok(line) => lines.push(line),
                Err(source) => {
                    warn!(user = %user, error = %source, "discarding undecodable cart cache");
                    return None;
                }
            }
        }

        lines.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.sku_id.cmp(&b.sku_id))
                .then_with(|| a.specification.cmp(&b.specification))
        });

        Some(lines)
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map(DatabaseError::kind)
        .is_some_and(|kind| matches!(kind, ErrorKind::UniqueViolation))
}

#[async_trait]
impl CartsService for PgCartsService {
    async fn add_or_update(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
        delta: i32,
    ) -> Result<Option<CartEntryRecord>, CartsServiceError> {
        let specification = specification.trim();

        if delta == 0 {
            return Err(CartsServiceError::InvalidQuantity(delta));
        }

        if !self.products.specifications(sku).await?.contains(specification) {
            return Err(CartsServiceError::InvalidSpecification);
        }

        let mut retry = ConflictRetry::new(&self.retry);

        loop {
            match self.try_merge(user, sku, specification, delta).await? {
                Merge::Written(entry) => {
                    debug!(user = %user, sku = %sku, count = entry.count, "cart line written");
                    self.mirror(&entry).await;

                    return Ok(Some(entry));
                }
                Merge::Removed => {
                    debug!(user = %user, sku = %sku, "cart line merged to zero and removed");
                    self.forget(user, sku, specification).await;

                    return Ok(None);
                }
                Merge::Conflicted => retry.conflicted().await?,
            }
        }
    }

    async fn remove(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
    ) -> Result<(), CartsServiceError> {
        let specification = specification.trim();
        let mut tx = self.db.begin().await?;

        let removed = self
            .repository
            .delete_entry(&mut tx, user, sku, specification)
            .await?;

        if removed == 0 {
            return Err(CartsServiceError::NotFound);
        }

        tx.commit().await?;

        self.forget(user, sku, specification).await;

        Ok(())
    }

    async fn set_selected(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
        selected: bool,
    ) -> Result<CartEntryRecord, CartsServiceError> {
        let specification = specification.trim();
        let mut tx = self.db.begin().await?;

        let entry = self
            .repository
            .set_selected(&mut tx, user, sku, specification, selected)
            .await?;

        tx.commit().await?;

        self.mirror(&entry).await;

        Ok(entry)
    }

    async fn list(&self, user: UserId) -> Result<Vec<CartLine>, CartsServiceError> {
        if let Some(lines) = self.cached_lines(user).await {
            return Ok(lines);
        }

        let mut tx = self.db.begin().await?;

        let entries = self.repository.list_entries(&mut tx, user).await?;

        tx.commit().await?;

        let built = join_all(entries.iter().map(|entry| self.display(entry))).await;

        let mut lines = Vec::with_capacity(entries.len());
        let mut fields = Vec::with_capacity(entries.len());
        let mut complete = true;

        for (entry, result) in entries.iter().zip(built) {
            let line = match result {
                Ok(line) => line,
                Err(source) => {
                    warn!(user = %user, sku = %entry.sku_id, error = %source, "omitting cart line");
                    complete = false;
                    continue;
                }
            };

            match serde_json::to_string(&line) {
                Ok(value) => fields.push((keys::cart_field(line.sku_id, &line.specification), value)),
                Err(source) => {
                    warn!(user = %user, error = %source, "failed to encode cart line");
                    complete = false;
                }
            }

            lines.push(line);
        }

        // A partial listing is served but never cached.
        if complete
            && !fields.is_empty()
            && let Err(source) = self
                .cache
                .hash_set_many(&keys::cart(user), &fields, self.cache_ttl)
                .await
        {
            warn!(user = %user, error = %source, "failed to warm cart cache");
        }

        Ok(lines)
    }

    async fn count(&self, user: UserId) -> Result<i64, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let count = self.repository.count_entries(&mut tx, user).await?;

        tx.commit().await?;

        Ok(count)
    }

    async fn remove_lines(
        &self,
        user: UserId,
        lines: Vec<CartLineRef>,
    ) -> Result<u64, CartsServiceError> {
        let mut tx = self.db.begin().await?;
        let mut removed = 0;

        for line in &lines {
            removed += self
                .repository
                .delete_entry(&mut tx, user, line.sku_id, &line.specification)
                .await?;
        }

        tx.commit().await?;

        for line in &lines {
            self.forget(user, line.sku_id, &line.specification).await;
        }

        Ok(removed)
    }

    async fn refresh_cached_line(&self, entry: CartEntryRecord) -> Result<(), CartsServiceError> {
        let key = keys::cart(entry.user_id);

        // A cold cart is rebuilt in full by the next listing.
        if !self.cache.exists(&key).await? {
            return Ok(());
        }

        let line = self.display(&entry).await?;
        let value = serde_json::to_string(&line).map_err(CartsServiceError::Encode)?;

        let written = self
            .cache
            .hash_set_if_exists(
                &key,
                &keys::cart_field(entry.sku_id, &entry.specification),
                &value,
                self.cache_ttl,
            )
            .await?;

        if !written {
            debug!(user = %entry.user_id, "cart cache expired before refresh");
        }

        Ok(())
    }

    async fn evict_cached_line(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
    ) -> Result<(), CartsServiceError> {
        self.cache
            .hash_delete(&keys::cart(user), &keys::cart_field(sku, &specification))
            .await?;

        Ok(())
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Add `delta` units of a SKU in a given specification to a user's cart.
    ///
    /// Merges into an existing line. Returns `None` when the merge brought the
    /// line to zero and removed it.
    async fn add_or_update(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
        delta: i32,
    ) -> Result<Option<CartEntryRecord>, CartsServiceError>;

    async fn remove(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
    ) -> Result<(), CartsServiceError>;

    async fn set_selected(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
        selected: bool,
    ) -> Result<CartEntryRecord, CartsServiceError>;

    /// The user's cart lines, newest first.
    async fn list(&self, user: UserId) -> Result<Vec<CartLine>, CartsServiceError>;

    /// Number of lines in the user's cart.
    async fn count(&self, user: UserId) -> Result<i64, CartsServiceError>;

    /// Drop lines after checkout. Lines already gone are ignored.
    async fn remove_lines(
        &self,
        user: UserId,
        lines: Vec<CartLineRef>,
    ) -> Result<u64, CartsServiceError>;

    /// Rewrite one line of a warm cart cache from a stored row.
    async fn refresh_cached_line(&self, entry: CartEntryRecord) -> Result<(), CartsServiceError>;

    /// Drop one line from the cart cache.
    async fn evict_cached_line(
        &self,
        user: UserId,
        sku: SkuId,
        specification: String,
    ) -> Result<(), CartsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        domain::products::MockProductsService,
        test::{TestContext, helpers},
    };

    use super::*;

    const USER: UserId = UserId::from_i64(7);

    async fn add(
        ctx: &TestContext,
        sku: SkuId,
        delta: i32,
    ) -> Result<Option<CartEntryRecord>, CartsServiceError> {
        ctx.carts
            .add_or_update(USER, sku, helpers::SPEC.to_string(), delta)
            .await
    }

    #[tokio::test]
    async fn first_add_creates_an_unselected_line() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 10).await;

        let entry = add(&ctx, sku, 2).await?.ok_or("line was removed")?;

        assert_eq!(entry.count, 2);
        assert!(!entry.selected);
        assert_eq!(ctx.carts.count(USER).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn merged_quantity_is_persisted() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 10).await;

        add(&ctx, sku, 5).await?;
        add(&ctx, sku, 3).await?;
        let entry = add(&ctx, sku, -1).await?.ok_or("line was removed")?;

        assert_eq!(entry.count, 7);
        assert_eq!(entry.version, 2);

        Ok(())
    }

    #[tokio::test]
    async fn merge_beyond_stock_is_rejected_without_mutation() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 6).await;

        add(&ctx, sku, 5).await?;
        let result = add(&ctx, sku, 2).await;

        assert!(
            matches!(
                result,
                Err(CartsServiceError::InsufficientStock {
                    requested: 7,
                    available: 6
                })
            ),
            "expected InsufficientStock, got {result:?}"
        );

        let lines = ctx.carts.list(USER).await?;
        assert_eq!(lines.first().map(|line| line.count), Some(5));

        Ok(())
    }

    #[tokio::test]
    async fn merge_below_zero_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 6).await;

        add(&ctx, sku, 2).await?;
        let result = add(&ctx, sku, -3).await;

        assert!(
            matches!(result, Err(CartsServiceError::InvalidQuantity(-1))),
            "expected InvalidQuantity, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn merge_to_zero_removes_the_line() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 6).await;

        add(&ctx, sku, 2).await?;
        let entry = add(&ctx, sku, -2).await?;

        assert_eq!(entry, None);
        assert_eq!(ctx.carts.count(USER).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn new_line_needs_a_positive_delta_within_stock() {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;

        let negative = add(&ctx, sku, -1).await;
        let too_many = add(&ctx, sku, 4).await;

        assert!(
            matches!(negative, Err(CartsServiceError::InvalidQuantity(-1))),
            "expected InvalidQuantity, got {negative:?}"
        );
        assert!(
            matches!(too_many, Err(CartsServiceError::InsufficientStock { .. })),
            "expected InsufficientStock, got {too_many:?}"
        );
    }

    #[tokio::test]
    async fn undeclared_specification_is_rejected() {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;

        let result = ctx
            .carts
            .add_or_update(USER, sku, "purple".to_string(), 1)
            .await;

        assert!(
            matches!(result, Err(CartsServiceError::InvalidSpecification)),
            "expected InvalidSpecification, got {result:?}"
        );
    }

    #[tokio::test]
    async fn delisted_sku_is_rejected() {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;
        helpers::delist(&ctx, sku).await;

        let result = add(&ctx, sku, 1).await;

        assert!(
            matches!(result, Err(CartsServiceError::Delisted)),
            "expected Delisted, got {result:?}"
        );
    }

    #[tokio::test]
    async fn unknown_sku_is_rejected() {
        let ctx = TestContext::new().await;

        let result = add(&ctx, SkuId::from_i64(404), 1).await;

        assert!(
            matches!(result, Err(CartsServiceError::UnknownSku)),
            "expected UnknownSku, got {result:?}"
        );
    }

    #[tokio::test]
    async fn concurrent_adds_to_one_line_all_land() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 50).await;

        let adds = (0..5).map(|_| {
            let carts = ctx.carts.clone();

            tokio::spawn(async move {
                carts
                    .add_or_update(USER, sku, helpers::SPEC.to_string(), 1)
                    .await
            })
        });

        for outcome in join_all(adds).await {
            outcome??;
        }

        let lines = ctx.carts.list(USER).await?;
        assert_eq!(lines.first().map(|line| line.count), Some(5));

        Ok(())
    }

    #[tokio::test]
    async fn list_builds_display_lines_and_warms_the_cache() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;
        add(&ctx, sku, 1).await?;

        let lines = ctx.carts.list(USER).await?;

        let line = lines.first().ok_or("empty cart")?;
        assert_eq!(line.sku_id, sku);
        assert_eq!(line.price, helpers::price());
        assert_eq!(line.default_pic_url, helpers::SPU_PIC);
        assert!(ctx.cache.exists(&keys::cart(USER)).await?);

        Ok(())
    }

    #[tokio::test]
    async fn warm_cache_serves_listings_and_follows_writes() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 10).await;
        add(&ctx, sku, 1).await?;
        ctx.carts.list(USER).await?;

        add(&ctx, sku, 2).await?;
        ctx.carts
            .set_selected(USER, sku, helpers::SPEC.to_string(), true)
            .await?;

        let cached = ctx.cache.hash_get_all(&keys::cart(USER)).await?;
        let line: CartLine = serde_json::from_str(
            cached
                .get(&keys::cart_field(sku, helpers::SPEC))
                .ok_or("line not cached")?,
        )?;

        assert_eq!(line.count, 3);
        assert!(line.selected);

        Ok(())
    }

    #[tokio::test]
    async fn removing_a_missing_line_is_not_found() {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;

        let result = ctx
            .carts
            .remove(USER, sku, helpers::SPEC.to_string())
            .await;

        assert!(
            matches!(result, Err(CartsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn selecting_a_missing_line_is_not_found() {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;

        let result = ctx
            .carts
            .set_selected(USER, sku, helpers::SPEC.to_string(), true)
            .await;

        assert!(
            matches!(result, Err(CartsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn remove_lines_is_idempotent() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;
        add(&ctx, sku, 1).await?;
        ctx.carts.list(USER).await?;

        let lines = vec![CartLineRef {
            sku_id: sku,
            specification: helpers::SPEC.to_string(),
        }];

        assert_eq!(ctx.carts.remove_lines(USER, lines.clone()).await?, 1);
        assert_eq!(ctx.carts.remove_lines(USER, lines).await?, 0);
        assert!(ctx.carts.list(USER).await?.is_empty());
        assert!(!ctx.cache.exists(&keys::cart(USER)).await?);

        Ok(())
    }

    #[tokio::test]
    async fn a_partial_listing_leaves_the_cache_cold() -> TestResult {
        let ctx = TestContext::new().await;
        let healthy = helpers::seed_sku(&ctx, 3).await;
        let flaky = helpers::seed_sku(&ctx, 3).await;
        add(&ctx, healthy, 1).await?;
        add(&ctx, flaky, 1).await?;

        let healthy_sku = ctx.products.get_sku(healthy).await?;
        let flaky_sku = ctx.products.get_sku(flaky).await?;
        let healthy_spu = ctx.products.get_spu_of_sku(healthy).await?;

        let mut products = MockProductsService::new();

        products.expect_get_sku().returning(move |sku| {
            Ok(if sku == healthy {
                healthy_sku.clone()
            } else {
                flaky_sku.clone()
            })
        });
        products.expect_get_spu_of_sku().returning(move |sku| {
            if sku == healthy {
                Ok(healthy_spu.clone())
            } else {
                Err(ProductsServiceError::Sql(sqlx::Error::PoolTimedOut))
            }
        });

        let carts = PgCartsService::new(
            ctx.app.clone(),
            ctx.cache.clone(),
            Arc::new(products),
            ctx.settings.retry,
            ctx.settings.carts.cache_ttl(),
        );

        let lines = carts.list(USER).await?;

        assert_eq!(lines.len(), 1);
        assert!(!ctx.cache.exists(&keys::cart(USER)).await?);
        assert_eq!(ctx.carts.list(USER).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn padded_specifications_address_the_stored_line() -> TestResult {
        let ctx = TestContext::new().await;
        let sku = helpers::seed_sku(&ctx, 3).await;
        add(&ctx, sku, 1).await?;

        let padded = format!(" {} ", helpers::SPEC);

        let entry = ctx.carts.set_selected(USER, sku, padded.clone(), true).await?;
        assert!(entry.selected);

        ctx.carts.remove(USER, sku, padded).await?;
        assert_eq!(ctx.carts.count(USER).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn writes_after_cache_expiry_do_not_seed_a_partial_cart() -> TestResult {
        let ctx = TestContext::new().await;
        let first = helpers::seed_sku(&ctx, 5).await;
        let second = helpers::seed_sku(&ctx, 5).await;
        add(&ctx, first, 1).await?;
        add(&ctx, second, 1).await?;
        ctx.carts.list(USER).await?;

        ctx.cache.delete(&keys::cart(USER)).await?;
        add(&ctx, first, 1).await?;

        assert!(!ctx.cache.exists(&keys::cart(USER)).await?);
        assert_eq!(ctx.carts.list(USER).await?.len(), 2);

        Ok(())
    }
}
