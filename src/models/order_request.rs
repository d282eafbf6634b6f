use serde::{Deserialize, Serialize};

use crate::models::order::{NewOrder, OrderItem};
use crate::validation::{validate_order_request, ValidationErrors};

/// Order intake payload as submitted by a client
///
/// Numeric fields are wide so out-of-range values reach validation instead
/// of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer_name: String,
    pub order_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub name: String,
    pub quantity: i64,
    pub price: f64,
}

impl OrderRequest {
    /// Validate and normalise into an order draft with total and priority
    pub fn into_new_order(self) -> Result<NewOrder, ValidationErrors> {
        let order_type = validate_order_request(&self)?;

        // Ranges were checked above, so these conversions cannot fail
        let table_number = self.table_number.and_then(|t| i32::try_from(t).ok());
        let items = self
            .items
            .into_iter()
            .map(|item| OrderItem {
                name: item.name.trim().to_string(),
                quantity: i32::try_from(item.quantity).unwrap_or_default(),
                price: item.price,
            })
            .collect();

        Ok(NewOrder::new(
            self.customer_name.trim().to_string(),
            order_type,
            table_number,
            self.delivery_address,
            items,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::{OrderType, Priority};

    #[test]
    fn test_into_new_order_normalises_and_prices() {
        let request = OrderRequest {
            customer_name: "  Ada Lovelace ".to_string(),
            order_type: "dine_in".to_string(),
            table_number: Some(4),
            delivery_address: None,
            items: vec![OrderItemRequest {
                name: " Pepperoni ".to_string(),
                quantity: 1,
                price: 120.0,
            }],
        };

        let order = request.into_new_order().unwrap();
        assert_eq!(order.customer_name, "Ada Lovelace");
        assert_eq!(order.order_type, OrderType::DineIn);
        assert_eq!(order.table_number, Some(4));
        assert_eq!(order.items[0].name, "Pepperoni");
        assert_eq!(order.total_amount, 120.0);
        assert_eq!(order.priority, Priority::High);
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let request: OrderRequest = serde_json::from_str(
            r#"{"customer_name":"Bob","order_type":"takeout","items":[{"name":"Soup","quantity":2,"price":4.5}]}"#,
        )
        .unwrap();
        assert!(request.table_number.is_none());
        assert_eq!(request.into_new_order().unwrap().total_amount, 9.0);
    }
}
