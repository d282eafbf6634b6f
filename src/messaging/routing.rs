//! # Routing Keys
//!
//! Order messages are routed with `<role>.<order_type>.<priority>`, e.g.
//! `kitchen.delivery.10`. The work queue binds on `kitchen.#`, so type and
//! priority travel with the message without partitioning the queue.

use crate::constants::topology::KITCHEN_ROLE;
use crate::models::{OrderType, Priority};

pub fn order_routing_key(order_type: OrderType, priority: Priority) -> String {
    format!("{KITCHEN_ROLE}.{order_type}.{}", priority.value())
}

/// Inverse of [`order_routing_key`]; `None` for anything else
pub fn parse_order_routing_key(routing_key: &str) -> Option<(OrderType, Priority)> {
    let mut segments = routing_key.split('.');
    let role = segments.next()?;
    let order_type = segments.next()?.parse().ok()?;
    let priority = segments.next()?.parse::<i32>().ok()?.try_into().ok()?;
    if role != KITCHEN_ROLE || segments.next().is_some() {
        return None;
    }
    Some((order_type, priority))
}

/// AMQP topic matching: `*` is exactly one word, `#` is zero or more words
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let words: Vec<&str> = if routing_key.is_empty() {
        Vec::new()
    } else {
        routing_key.split('.').collect()
    };
    matches_words(&pattern, &words)
}

fn matches_words(pattern: &[&str], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((&"#", rest)) => (0..=words.len()).any(|skip| matches_words(rest, &words[skip..])),
        Some((&segment, rest)) => match words.split_first() {
            Some((&word, remaining)) if segment == "*" || segment == word => {
                matches_words(rest, remaining)
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::topology::KITCHEN_BINDING;

    #[test]
    fn test_routing_key_grammar() {
        assert_eq!(
            order_routing_key(OrderType::DineIn, Priority::High),
            "kitchen.dine_in.10"
        );
        assert_eq!(
            order_routing_key(OrderType::Takeout, Priority::Low),
            "kitchen.takeout.1"
        );
        assert_eq!(
            parse_order_routing_key("kitchen.delivery.5"),
            Some((OrderType::Delivery, Priority::Medium))
        );
        assert_eq!(parse_order_routing_key("kitchen.delivery.7"), None);
        assert_eq!(parse_order_routing_key("bar.delivery.5"), None);
        assert_eq!(parse_order_routing_key("kitchen.delivery.5.extra"), None);
    }

    #[test]
    fn test_work_binding_matches_every_order_key() {
        for order_type in OrderType::ALL {
            for priority in [Priority::Low, Priority::Medium, Priority::High] {
                let key = order_routing_key(order_type, priority);
                assert!(topic_matches(KITCHEN_BINDING, &key), "{key}");
            }
        }
        assert!(!topic_matches(KITCHEN_BINDING, "bar.takeout.1"));
    }

    #[test]
    fn test_topic_wildcards() {
        assert!(topic_matches("#", ""));
        assert!(topic_matches("#", "a.b.c"));
        assert!(topic_matches("kitchen.#", "kitchen"));
        assert!(topic_matches("kitchen.*.10", "kitchen.takeout.10"));
        assert!(!topic_matches("kitchen.*.10", "kitchen.takeout.5"));
        assert!(!topic_matches("kitchen.*", "kitchen.takeout.5"));
        assert!(topic_matches("*.#.10", "kitchen.a.b.10"));
        assert!(!topic_matches("kitchen", "kitchen.takeout"));
    }
}
