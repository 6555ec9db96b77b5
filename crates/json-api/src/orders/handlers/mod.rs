//! Order Handlers

use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};

use stockroom_app::domain::orders::{
    models::{Order, OrderLine},
    records::{OrderItemRecord, OrderRecord, OrderStatus, PayStatus},
};

use crate::response::{ApiError, parse_id};

pub(crate) mod delete;
pub(crate) mod get;
pub(crate) mod payment;
pub(crate) mod presubmit;
pub(crate) mod submit;

/// Order Line Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderLineRequest {
    /// SKU id, as a decimal string
    pub sku_id: String,

    /// Specification value offered by the product
    pub specification: String,

    /// Units to buy
    pub count: i32,
}

fn into_lines(lines: Vec<OrderLineRequest>) -> Result<Vec<OrderLine>, ApiError> {
    lines
        .into_iter()
        .map(|line| {
            Ok(OrderLine {
                sku_id: parse_id(&line.sku_id)?,
                specification: line.specification,
                count: line.count,
            })
        })
        .collect()
}

/// Order Summary Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderSummaryResponse {
    /// Order number, as a decimal string
    pub order_number: String,

    /// Item subtotal
    pub total_money: String,

    /// Freight charge
    pub freight: String,

    /// Amount due
    pub pay_money: String,

    /// Total units across all items
    pub total_num: i32,

    /// Order status
    pub order_status: String,

    /// Payment status
    pub pay_status: String,

    /// Receiver name
    pub receiver_name: String,

    /// Receiver phone
    pub receiver_phone: String,

    /// Delivery address
    pub receiver_address: String,

    /// When payment was recorded
    pub pay_time: Option<String>,

    /// End of the payment window
    pub expiration_time: String,

    /// When the order was created
    pub created_at: String,
}

impl From<OrderRecord> for OrderSummaryResponse {
    fn from(order: OrderRecord) -> Self {
        Self {
            order_number: order.id.to_string(),
            total_money: order.total_money.to_string(),
            freight: order.freight.to_string(),
            pay_money: order.pay_money.to_string(),
            total_num: order.total_num,
            order_status: order_status_name(order.order_status).to_string(),
            pay_status: pay_status_name(order.pay_status).to_string(),
            receiver_name: order.receiver_name,
            receiver_phone: order.receiver_phone,
            receiver_address: order.receiver_address,
            pay_time: order.pay_time.as_ref().map(ToString::to_string),
            expiration_time: order.expiration_time.to_string(),
            created_at: order.created_at.to_string(),
        }
    }
}

/// Order Item Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderItemResponse {
    /// SKU id, as a decimal string
    pub sku_id: String,

    /// SPU id, as a decimal string
    pub spu_id: String,

    /// Product name when ordered
    pub product_name: String,

    /// Unit price when ordered
    pub product_price: String,

    /// Picture when ordered
    pub product_pic: String,

    /// Units ordered
    pub product_quantity: i32,

    /// Line total
    pub product_total_money: String,
}

impl From<OrderItemRecord> for OrderItemResponse {
    fn from(item: OrderItemRecord) -> Self {
        Self {
            sku_id: item.sku_id.to_string(),
            spu_id: item.spu_id.to_string(),
            product_name: item.product_name,
            product_price: item.product_price.to_string(),
            product_pic: item.product_pic,
            product_quantity: item.product_quantity,
            product_total_money: item.product_total_money.to_string(),
        }
    }
}

/// Order Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderResponse {
    /// The order header
    pub order: OrderSummaryResponse,

    /// Item snapshots
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order: order.order.into(),
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

const fn order_status_name(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::PendingPayment => "pending_payment",
        OrderStatus::AwaitingShipment => "awaiting_shipment",
        OrderStatus::Shipped => "shipped",
        OrderStatus::Completed => "completed",
        OrderStatus::Closed => "closed",
        OrderStatus::Expired => "expired",
    }
}

const fn pay_status_name(status: PayStatus) -> &'static str {
    match status {
        PayStatus::Paid => "paid",
        PayStatus::Failed => "failed",
        PayStatus::Unpaid => "unpaid",
    }
}
