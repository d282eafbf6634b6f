//! # Input Validation
//!
//! Field-level validation of order intake requests. Every rule is checked and
//! every violation reported, so a caller can fix a request in one round trip.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::order::OrderType;
use crate::models::order_request::{OrderItemRequest, OrderRequest};

pub const CUSTOMER_NAME_MAX_LEN: usize = 100;
pub const TABLE_NUMBER_RANGE: std::ops::RangeInclusive<i64> = 1..=100;
pub const DELIVERY_ADDRESS_MIN_LEN: usize = 10;
pub const ITEMS_PER_ORDER: std::ops::RangeInclusive<usize> = 1..=20;
pub const ITEM_NAME_MAX_LEN: usize = 50;
pub const ITEM_QUANTITY_RANGE: std::ops::RangeInclusive<i64> = 1..=10;
pub const ITEM_PRICE_MIN: f64 = 0.01;
pub const ITEM_PRICE_MAX: f64 = 999.99;

/// Slack for binary representation error when checking two-decimal prices
const CENT_TOLERANCE: f64 = 1e-6;

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All rejected fields of a request, in the order they were checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|error| error.field == field)
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Letters, whitespace, hyphens and apostrophes only
fn is_valid_customer_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == '-' || c == '\'')
}

/// Prices are whole cents; anything finer would be rounded away in the total
fn has_sub_cent_precision(price: f64) -> bool {
    let cents = price * 100.0;
    (cents - cents.round()).abs() > CENT_TOLERANCE
}

/// Validate a raw intake request, collecting every violation
///
/// Returns the parsed order type on success so callers don't re-parse it.
pub fn validate_order_request(request: &OrderRequest) -> Result<OrderType, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let customer_name = request.customer_name.trim();
    if customer_name.is_empty() {
        errors.push("customer_name", "customer name is required");
    } else if customer_name.chars().count() > CUSTOMER_NAME_MAX_LEN {
        errors.push(
            "customer_name",
            format!("customer name must not exceed {CUSTOMER_NAME_MAX_LEN} characters"),
        );
    } else if !is_valid_customer_name(customer_name) {
        errors.push(
            "customer_name",
            "customer name must contain only letters, spaces, hyphens, and apostrophes",
        );
    }

    let order_type = request.order_type.parse::<OrderType>().ok();
    match order_type {
        None => errors.push(
            "order_type",
            format!("order type must be one of: {}", OrderType::expected_values()),
        ),
        Some(order_type) => validate_type_conditional_fields(request, order_type, &mut errors),
    }

    if request.items.len() < *ITEMS_PER_ORDER.start() {
        errors.push("items", "order must contain at least 1 item");
    } else if request.items.len() > *ITEMS_PER_ORDER.end() {
        errors.push(
            "items",
            format!("order must not contain more than {} items", ITEMS_PER_ORDER.end()),
        );
    }

    for (index, item) in request.items.iter().enumerate() {
        validate_item(index, item, &mut errors);
    }

    match order_type {
        Some(order_type) if errors.is_empty() => Ok(order_type),
        _ => Err(errors),
    }
}

fn validate_type_conditional_fields(
    request: &OrderRequest,
    order_type: OrderType,
    errors: &mut ValidationErrors,
) {
    let label = match order_type {
        OrderType::DineIn => "dine-in",
        OrderType::Takeout => "takeout",
        OrderType::Delivery => "delivery",
    };

    match (order_type.requires_table_number(), request.table_number) {
        (true, None) => errors.push(
            "table_number",
            format!("table number is required for {label} orders"),
        ),
        (true, Some(table)) if !TABLE_NUMBER_RANGE.contains(&table) => errors.push(
            "table_number",
            format!(
                "table number must be between {} and {}",
                TABLE_NUMBER_RANGE.start(),
                TABLE_NUMBER_RANGE.end()
            ),
        ),
        (false, Some(_)) => errors.push(
            "table_number",
            format!("table number must not be present for {label} orders"),
        ),
        _ => {}
    }

    match (
        order_type.requires_delivery_address(),
        request.delivery_address.as_deref(),
    ) {
        (true, None) => errors.push(
            "delivery_address",
            format!("delivery address is required for {label} orders"),
        ),
        (true, Some(address)) if address.trim().chars().count() < DELIVERY_ADDRESS_MIN_LEN => {
            errors.push(
                "delivery_address",
                format!("delivery address must be at least {DELIVERY_ADDRESS_MIN_LEN} characters"),
            )
        }
        (false, Some(_)) => errors.push(
            "delivery_address",
            format!("delivery address must not be present for {label} orders"),
        ),
        _ => {}
    }
}

fn validate_item(index: usize, item: &OrderItemRequest, errors: &mut ValidationErrors) {
    let prefix = format!("items[{index}]");

    let name = item.name.trim();
    if name.is_empty() {
        errors.push(format!("{prefix}.name"), "item name is required");
    } else if name.chars().count() > ITEM_NAME_MAX_LEN {
        errors.push(
            format!("{prefix}.name"),
            format!("item name must not exceed {ITEM_NAME_MAX_LEN} characters"),
        );
    }

    if item.quantity < *ITEM_QUANTITY_RANGE.start() {
        errors.push(format!("{prefix}.quantity"), "item quantity must be at least 1");
    } else if item.quantity > *ITEM_QUANTITY_RANGE.end() {
        errors.push(
            format!("{prefix}.quantity"),
            format!("item quantity must not exceed {}", ITEM_QUANTITY_RANGE.end()),
        );
    }

    // NaN fails both comparisons, so check it explicitly
    if item.price.is_nan() || item.price < ITEM_PRICE_MIN {
        errors.push(format!("{prefix}.price"), "item price must be at least 0.01");
    } else if item.price > ITEM_PRICE_MAX {
        errors.push(format!("{prefix}.price"), "item price must not exceed 999.99");
    } else if has_sub_cent_precision(item.price) {
        errors.push(
            format!("{prefix}.price"),
            "item price must have at most 2 decimal places",
        );
    }
}
