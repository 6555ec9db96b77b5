//! Order Records

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::products::records::{SkuId, SpuId},
    ids::{TypedId, UserId},
};

/// Order number. Minted at pre-submission and used as the order's primary key.
pub type OrderNumber = TypedId<OrderRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown status code {0}")]
pub struct UnknownStatusCode(pub i16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    AwaitingShipment,
    Shipped,
    Completed,
    Closed,
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            OrderStatus::AwaitingShipment => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Completed => 3,
            OrderStatus::Closed => 4,
            OrderStatus::Expired => 5,
            OrderStatus::PendingPayment => 6,
        }
    }
}

impl TryFrom<i16> for OrderStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(OrderStatus::AwaitingShipment),
            2 => Ok(OrderStatus::Shipped),
            3 => Ok(OrderStatus::Completed),
            4 => Ok(OrderStatus::Closed),
            5 => Ok(OrderStatus::Expired),
            6 => Ok(OrderStatus::PendingPayment),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayStatus {
    Paid,
    Failed,
    Unpaid,
}

impl PayStatus {
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            PayStatus::Paid => 1,
            PayStatus::Failed => 2,
            PayStatus::Unpaid => 3,
        }
    }
}

impl TryFrom<i16> for PayStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(PayStatus::Paid),
            2 => Ok(PayStatus::Failed),
            3 => Ok(PayStatus::Unpaid),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderNumber,
    pub user_id: UserId,
    pub total_money: Decimal,
    pub freight: Decimal,
    pub pay_money: Decimal,
    pub total_num: i32,
    pub order_status: OrderStatus,
    pub pay_status: PayStatus,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub pay_time: Option<Timestamp>,
    pub expiration_time: Timestamp,

    /// Whether `expiration_time` had passed by the database clock when read.
    pub past_due: bool,
    pub version: i64,
    pub created_at: Timestamp,
}

/// Immutable snapshot of one purchased SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub order_id: OrderNumber,
    pub sku_id: SkuId,
    pub spu_id: SpuId,
    pub product_name: String,
    pub product_price: Decimal,
    pub product_pic: String,
    pub product_quantity: i32,
    pub product_total_money: Decimal,
}
