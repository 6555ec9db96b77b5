//! Order Models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    orders::records::{OrderItemRecord, OrderNumber, OrderRecord},
    products::records::SkuId,
};

/// One requested line of a candidate order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku_id: SkuId,
    pub specification: String,
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub lines: Vec<OrderLine>,
    pub receiver: Receiver,
}

/// A priced line shown before the shopper commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreSubmitLine {
    pub sku_id: SkuId,
    pub title: String,
    pub price: Decimal,
    pub default_pic_url: String,
    pub specification: String,
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreSubmitOrder {
    pub order_number: OrderNumber,
    pub total_money: Decimal,
    pub freight: Decimal,
    pub pay_money: Decimal,
    pub lines: Vec<PreSubmitLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
}
