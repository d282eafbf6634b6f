use proptest::prelude::*;
use kitchen_core::models::{OrderItemRequest, OrderRequest, OrderType};
use kitchen_core::state_machine::OrderStatus;

pub fn order_type_strategy() -> impl Strategy<Value = OrderType> {
    prop::sample::select(OrderType::ALL.to_vec())
}

pub fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

/// Customer names accepted by intake validation
pub fn customer_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z' -]{0,40}[A-Za-z]"
}

/// Prices in the accepted item range, in thousandths of a unit
///
/// Roughly nine in ten land on a sub-cent value such as 50.004.
pub fn price_mills_strategy() -> impl Strategy<Value = i64> {
    10i64..=999_990
}

/// Whole-cent prices inside the accepted item price range
pub fn price_cents_strategy() -> impl Strategy<Value = i64> {
    price_mills_strategy().prop_map(|mills| (mills / 10).max(1))
}

fn item_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{0,30}"
}

pub fn order_item_strategy() -> impl Strategy<Value = OrderItemRequest> {
    (item_name_strategy(), 1i64..=10, price_cents_strategy()).prop_map(
        |(name, quantity, cents)| OrderItemRequest {
            name,
            quantity,
            price: cents as f64 / 100.0,
        },
    )
}

/// Items whose price may carry a third decimal place
pub fn any_precision_item_strategy() -> impl Strategy<Value = OrderItemRequest> {
    (item_name_strategy(), 1i64..=10, price_mills_strategy()).prop_map(
        |(name, quantity, mills)| OrderItemRequest {
            name,
            quantity,
            price: mills as f64 / 1000.0,
        },
    )
}

fn request_with_items(
    items: impl Strategy<Value = OrderItemRequest>,
) -> impl Strategy<Value = OrderRequest> {
    (
        customer_name_strategy(),
        order_type_strategy(),
        1i64..=100,
        "[0-9]{1,4} [A-Za-z]{5,20} Street",
        prop::collection::vec(items, 1..=20),
    )
        .prop_map(|(customer_name, order_type, table, address, items)| OrderRequest {
            customer_name,
            order_type: order_type.as_str().to_string(),
            table_number: order_type.requires_table_number().then_some(table),
            delivery_address: order_type.requires_delivery_address().then_some(address),
            items,
        })
}

/// Requests that satisfy every intake rule for their order type
pub fn valid_order_request_strategy() -> impl Strategy<Value = OrderRequest> {
    request_with_items(order_item_strategy())
}

/// Otherwise valid requests whose item prices may be finer than a cent
pub fn any_precision_order_request_strategy() -> impl Strategy<Value = OrderRequest> {
    request_with_items(any_precision_item_strategy())
}
