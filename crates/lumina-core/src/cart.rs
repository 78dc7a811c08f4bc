use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Product;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// The shopping bag. Holds at most one line per product id.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of `product`, returning the line's new quantity.
    pub fn add(&mut self, product: &Product) -> u32 {
        if let Some(item) = self.items.iter_mut().find(|i| i.product.id == product.id) {
            item.quantity += 1;
            return item.quantity;
        }
        self.items.push(CartItem {
            product: product.clone(),
            quantity: 1,
        });
        1
    }

    pub fn remove(&mut self, product_id: &str) -> Option<CartItem> {
        let idx = self.items.iter().position(|i| i.product.id == product_id)?;
        Some(self.items.remove(idx))
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of line totals. No tax, shipping is complimentary.
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

/// Format an amount as dollars with thousands separators ("$12,500",
/// "$1,999.99").
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    let whole = rounded.abs().trunc().to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let fract = rounded.abs().fract();
    if fract.is_zero() {
        format!("{sign}${grouped}")
    } else {
        let cents = (fract * Decimal::ONE_HUNDRED).trunc().to_u32().unwrap_or(0);
        format!("{sign}${grouped}.{cents:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_repeated_add_increments_quantity() {
        let catalog = Catalog::builtin();
        let watch = catalog.get("1").unwrap();
        let mut cart = Cart::new();

        assert_eq!(cart.add(watch), 1);
        assert_eq!(cart.add(watch), 2);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn test_totals_follow_every_add_and_remove() {
        let catalog = Catalog::builtin();
        let mut cart = Cart::new();
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.total(), Decimal::ZERO);

        cart.add(catalog.get("2").unwrap());
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total(), Decimal::from(850));

        cart.add(catalog.get("5").unwrap());
        cart.add(catalog.get("2").unwrap());
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total(), Decimal::from(850 * 2 + 3199));

        let removed = cart.remove("2").unwrap();
        assert_eq!(removed.quantity, 2);
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total(), Decimal::from(3199));
        assert!(cart.remove("2").is_none());
    }

    #[test]
    fn test_lines_keep_insertion_order() {
        let catalog = Catalog::builtin();
        let mut cart = Cart::new();
        for id in ["3", "1", "3", "6"] {
            cart.add(catalog.get(id).unwrap());
        }
        let ids: Vec<&str> = cart.items().iter().map(|i| i.product.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "6"]);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Decimal::from(12500)), "$12,500");
        assert_eq!(format_price(Decimal::from(850)), "$850");
        assert_eq!(format_price(Decimal::from(1_234_567)), "$1,234,567");
        assert_eq!(format_price(Decimal::new(199_999, 2)), "$1,999.99");
        assert_eq!(format_price(Decimal::new(50, 2)), "$0.50");
        assert_eq!(format_price(Decimal::ZERO), "$0");
    }
}
