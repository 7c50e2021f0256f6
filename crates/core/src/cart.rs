//! Cart line arithmetic shared by guest (session) carts and persisted carts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ProductId, SizeId};

/// Maximum quantity of a single line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// One product/size combination in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub size_id: Option<SizeId>,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub const fn new(product_id: ProductId, size_id: Option<SizeId>, quantity: u32) -> Self {
        Self {
            product_id,
            size_id,
            quantity,
        }
    }

    /// Whether two lines refer to the same product and size.
    #[must_use]
    pub fn same_item(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.size_id == other.size_id
    }
}

/// Merge `incoming` into `existing`, summing quantities of matching lines.
///
/// Lines keep the order in which their product/size first appears. Lines
/// with zero quantity are dropped.
#[must_use]
pub fn merge_lines(existing: &[CartLine], incoming: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(existing.len() + incoming.len());

    for line in existing.iter().chain(incoming) {
        if line.quantity == 0 {
            continue;
        }
        match merged.iter_mut().find(|m| m.same_item(line)) {
            Some(m) => m.quantity = m.quantity.saturating_add(line.quantity),
            None => merged.push(*line),
        }
    }

    merged
}

/// Clamp a requested quantity to available stock and the per-line maximum.
#[must_use]
pub fn clamp_to_stock(quantity: u32, stock: i32) -> u32 {
    let available = u32::try_from(stock).unwrap_or(0);
    quantity.min(available).min(MAX_LINE_QUANTITY)
}

/// Units of a product across all of its sizes.
#[must_use]
pub fn product_quantity(lines: &[CartLine], product_id: ProductId) -> u32 {
    lines
        .iter()
        .filter(|l| l.product_id == product_id)
        .fold(0_u32, |sum, l| sum.saturating_add(l.quantity))
}

/// Clamp every line so each product's sizes together fit its stock.
///
/// Stock is handed out in line order, so earlier lines keep their units.
/// Lines for products missing from `stock` and lines left at zero are
/// dropped.
#[must_use]
pub fn clamp_lines_to_stock(
    lines: Vec<CartLine>,
    stock: &HashMap<ProductId, i32>,
) -> Vec<CartLine> {
    let mut remaining: HashMap<ProductId, i32> = stock.clone();

    lines
        .into_iter()
        .filter_map(|line| {
            let available = remaining.get_mut(&line.product_id)?;
            let quantity = clamp_to_stock(line.quantity, *available);
            *available -= i32::try_from(quantity).unwrap_or(i32::MAX);
            (quantity > 0).then_some(CartLine { quantity, ..line })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i32, size: Option<i32>, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(product), size.map(SizeId::new), quantity)
    }

    #[test]
    fn test_merge_sums_matching_lines() {
        let existing = [line(1, Some(2), 1), line(3, None, 2)];
        let incoming = [line(3, None, 4), line(1, Some(2), 1), line(9, None, 1)];

        assert_eq!(
            merge_lines(&existing, &incoming),
            vec![line(1, Some(2), 2), line(3, None, 6), line(9, None, 1)]
        );
    }

    #[test]
    fn test_merge_distinguishes_sizes() {
        let merged = merge_lines(&[line(1, Some(1), 1)], &[line(1, Some(2), 1), line(1, None, 1)]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_drops_zero_quantity() {
        let merged = merge_lines(&[], &[line(1, None, 0)]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_clamp_to_stock() {
        assert_eq!(clamp_to_stock(5, 3), 3);
        assert_eq!(clamp_to_stock(2, 10), 2);
        assert_eq!(clamp_to_stock(4, -1), 0);
        assert_eq!(clamp_to_stock(500, 1000), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_product_quantity_spans_sizes() {
        let lines = [line(1, Some(1), 2), line(1, Some(2), 3), line(2, None, 7)];
        assert_eq!(product_quantity(&lines, ProductId::new(1)), 5);
        assert_eq!(product_quantity(&lines, ProductId::new(3)), 0);
    }

    #[test]
    fn test_clamp_lines_shares_stock_between_sizes() {
        let stock = HashMap::from([(ProductId::new(1), 5), (ProductId::new(2), 1)]);
        let lines = vec![
            line(1, Some(1), 4),
            line(1, Some(2), 4),
            line(1, Some(3), 1),
            line(2, None, 1),
            line(9, None, 1),
        ];

        assert_eq!(
            clamp_lines_to_stock(lines, &stock),
            vec![line(1, Some(1), 4), line(1, Some(2), 1), line(2, None, 1)]
        );
    }
}
