//! Seckill Handlers

pub(crate) mod admit;
pub(crate) mod index;
pub(crate) mod status;

#[cfg(test)]
mod tests {
    use stockroom_app::domain::seckill::records::SeckillSkuId;

    pub(super) const SECKILL_SKU: SeckillSkuId = SeckillSkuId::from_i64(501);
}
