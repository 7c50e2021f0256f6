//! Integration tests for the rules checkout is built on.
//!
//! Cart lines are merged and clamped by core, priced with the store's rules,
//! sent to the provider in minor units, and the resulting order then moves
//! through the status lifecycle. These tests walk that path without I/O.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::HashMap;

use meridian_core::cart::{
    CartLine, MAX_LINE_QUANTITY, clamp_lines_to_stock, clamp_to_stock, merge_lines,
};
use meridian_core::pricing::{CartTotals, PricingRules};
use meridian_core::{CurrencyCode, Money, OrderStatus, ProductId, SizeId};
use rust_decimal::Decimal;

fn rules() -> PricingRules {
    PricingRules {
        flat_shipping_rate: Decimal::new(500, 2),
        free_shipping_threshold: Some(Decimal::new(7500, 2)),
        tax_rate_percent: Decimal::new(825, 2),
    }
}

// =============================================================================
// Cart to Totals
// =============================================================================

#[test]
fn test_guest_cart_merges_into_account_cart() {
    let shirt_m = CartLine::new(ProductId::new(1), Some(SizeId::new(2)), 1);
    let shirt_l = CartLine::new(ProductId::new(1), Some(SizeId::new(3)), 1);
    let mug = CartLine::new(ProductId::new(9), None, 2);

    let account = [shirt_m, mug];
    let guest = [CartLine::new(ProductId::new(1), Some(SizeId::new(2)), 2), shirt_l];

    let merged = merge_lines(&account, &guest);
    assert_eq!(
        merged,
        vec![
            CartLine::new(ProductId::new(1), Some(SizeId::new(2)), 3),
            mug,
            shirt_l,
        ]
    );
}

#[test]
fn test_quantities_clamp_to_stock_before_pricing() {
    assert_eq!(clamp_to_stock(5, 3), 3);
    assert_eq!(clamp_to_stock(5, 0), 0);
    assert_eq!(clamp_to_stock(500, 10_000), MAX_LINE_QUANTITY);
}

#[test]
fn test_merged_sizes_share_product_stock() {
    let account = [CartLine::new(ProductId::new(1), Some(SizeId::new(1)), 5)];
    let guest = [CartLine::new(ProductId::new(1), Some(SizeId::new(2)), 5)];
    let stock = HashMap::from([(ProductId::new(1), 5)]);

    let clamped = clamp_lines_to_stock(merge_lines(&account, &guest), &stock);
    assert_eq!(clamped, vec![account[0]]);
}

#[test]
fn test_totals_below_free_shipping_threshold() {
    let totals = CartTotals::compute(
        [(Decimal::new(2450, 2), 2), (Decimal::new(1800, 2), 1)],
        &rules(),
    );

    assert_eq!(totals.subtotal, Decimal::new(6700, 2));
    assert_eq!(totals.shipping, Decimal::new(500, 2));
    // 8.25% of 67.00 = 5.5275
    assert_eq!(totals.tax, Decimal::new(553, 2));
    assert_eq!(totals.total, Decimal::new(7753, 2));
    assert_eq!(totals.item_count, 3);
    assert_eq!(
        rules().remaining_for_free_shipping(totals.subtotal),
        Some(Decimal::new(800, 2))
    );
}

#[test]
fn test_totals_at_threshold_ship_free() {
    let totals = CartTotals::compute([(Decimal::new(7500, 2), 1)], &rules());
    assert_eq!(totals.shipping, Decimal::ZERO);
    assert_eq!(rules().remaining_for_free_shipping(totals.subtotal), None);
}

#[test]
fn test_empty_cart_costs_nothing() {
    let totals = CartTotals::compute(std::iter::empty(), &rules());
    assert!(totals.is_empty());
    assert_eq!(totals.total, Decimal::ZERO);
}

#[test]
fn test_provider_amounts_round_trip_through_minor_units() {
    let totals = CartTotals::compute([(Decimal::new(1999, 2), 3)], &rules());
    let total = Money::new(totals.total, CurrencyCode::USD);

    let minor = total.to_minor_units().unwrap();
    assert_eq!(Money::from_minor_units(minor, CurrencyCode::USD).amount, totals.total);
}

// =============================================================================
// Order Lifecycle
// =============================================================================

#[test]
fn test_paid_order_fulfilment_path() {
    let path = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];
    for pair in path.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "{} -> {} should be allowed",
            pair[0],
            pair[1]
        );
    }
    assert!(OrderStatus::Delivered.holds_stock());
}

#[test]
fn test_failed_payment_can_be_retried() {
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentFailed));
    assert!(OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Paid));
    assert!(!OrderStatus::PaymentFailed.holds_stock());
}

#[test]
fn test_stock_returns_only_for_orders_that_took_it() {
    assert!(OrderStatus::Paid.releases_stock(OrderStatus::Cancelled));
    assert!(OrderStatus::Shipped.releases_stock(OrderStatus::Refunded));
    assert!(!OrderStatus::Pending.releases_stock(OrderStatus::Cancelled));
}

#[test]
fn test_terminal_statuses_go_nowhere() {
    for status in OrderStatus::ALL.into_iter().filter(OrderStatus::is_terminal) {
        assert!(status.next_statuses().is_empty(), "{status} should be terminal");
    }
}

#[test]
fn test_status_parses_from_admin_form_values() {
    for status in OrderStatus::ALL {
        assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
    }
    assert!("lost".parse::<OrderStatus>().is_err());
}
