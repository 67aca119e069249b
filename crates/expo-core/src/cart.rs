//! # Cart
//!
//! The in-progress sale: one line per product, checked against stock.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action           Operation                 Cart Change         │
//! │  ──────────────           ─────────                 ───────────         │
//! │                                                                         │
//! │  Tap product ───────────► add_item(snapshot) ─────► qty + 1 or new line │
//! │                                                                         │
//! │  Type quantity ─────────► set_quantity(n, snap) ──► qty = n (≤ stock)   │
//! │                                                                         │
//! │  Click remove ──────────► remove_item(id) ────────► line dropped        │
//! │                                                                         │
//! │  Clear / sale done ─────► clear() ────────────────► empty               │
//! │                                                                         │
//! │  Every stock-dependent call takes a snapshot fetched for that call.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quantity Policy
//! A quantity above the remaining stock is rejected with
//! [`CoreError::InsufficientStock`]. Nothing is ever clamped silently: the
//! line keeps its previous quantity and the cashier decides what to do.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{SaleItem, StockSnapshot, TaxRate};
use crate::validation::{validate_cart_size, validate_id, validate_price, validate_quantity};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
///
/// ## Invariants
/// - `0 < quantity <= stock_limit` (the remaining stock at the last check)
/// - `line_total == unit_price × quantity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,

    /// Product name when first added (frozen).
    pub product_name: String,

    /// Unit price when first added (frozen).
    pub unit_price: Money,

    pub quantity: i64,

    pub line_total: Money,

    /// Remaining stock reported by the snapshot this line was last checked
    /// against.
    pub stock_limit: i64,
}

impl CartLine {
    fn from_snapshot(snapshot: &StockSnapshot) -> Self {
        CartLine {
            product_id: snapshot.product_id.clone(),
            product_name: snapshot.product_name.clone(),
            unit_price: snapshot.unit_price,
            quantity: 1,
            line_total: snapshot.unit_price,
            stock_limit: snapshot.remaining_quantity,
        }
    }

    fn set_quantity(&mut self, quantity: i64, stock_limit: i64) {
        self.quantity = quantity;
        self.line_total = self.unit_price.multiply_quantity(quantity);
        self.stock_limit = stock_limit;
    }

    /// Freezes this line into a sale item.
    pub fn to_sale_item(&self) -> SaleItem {
        SaleItem {
            product_id: self.product_id.clone(),
            product_name: self.product_name.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
            line_total: self.line_total,
        }
    }
}

/// Derived cart figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub grand_total: Money,
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` and kept in insertion order
/// - Every line has a positive quantity within its stock limit
/// - At most [`MAX_CART_ITEMS`] lines
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Adds one unit of the product.
    ///
    /// ## Behavior
    /// - Not in cart: new line with quantity 1 at the snapshot price
    /// - In cart: quantity + 1, only if that stays within the snapshot's
    ///   remaining quantity
    ///
    /// ## Errors
    /// - `InsufficientStock` when there is no unit left to add
    /// - `CartTooLarge` when a new line would exceed [`MAX_CART_ITEMS`]
    ///
    /// The cart is unchanged on error.
    pub fn add_item(&mut self, snapshot: &StockSnapshot) -> CoreResult<&CartLine> {
        validate_id("product_id", &snapshot.product_id)?;
        validate_price(snapshot.unit_price)?;

        match self.position(&snapshot.product_id) {
            Some(idx) => {
                let requested = self.lines[idx].quantity + 1;
                check_quantity(snapshot, requested)?;
                self.lines[idx].set_quantity(requested, snapshot.remaining_quantity);
                Ok(&self.lines[idx])
            }
            None => {
                check_quantity(snapshot, 1)?;
                validate_cart_size(self.lines.len()).map_err(|_| CoreError::CartTooLarge {
                    max: MAX_CART_ITEMS,
                })?;
                self.lines.push(CartLine::from_snapshot(snapshot));
                Ok(&self.lines[self.lines.len() - 1])
            }
        }
    }

    /// Sets a line's quantity.
    ///
    /// ## Behavior
    /// - `quantity <= 0`: removes the line (same as [`Cart::remove_item`])
    /// - `quantity > remaining stock`: rejected, line unchanged
    /// - otherwise: quantity replaced, line total recomputed
    ///
    /// ## Errors
    /// - `ProductNotInCart` if there is no line for `product_id`
    /// - `InsufficientStock` when `quantity` exceeds the snapshot
    /// - `QuantityTooLarge` above [`MAX_ITEM_QUANTITY`]
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        quantity: i64,
        snapshot: &StockSnapshot,
    ) -> CoreResult<()> {
        if quantity <= 0 {
            self.remove_item(product_id);
            return Ok(());
        }

        let idx = self
            .position(product_id)
            .ok_or_else(|| CoreError::ProductNotInCart(product_id.to_string()))?;

        if snapshot.product_id != product_id {
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                product_name: self.lines[idx].product_name.clone(),
                available: 0,
                requested: quantity,
            });
        }

        check_quantity(snapshot, quantity)?;
        self.lines[idx].set_quantity(quantity, snapshot.remaining_quantity);
        Ok(())
    }

    /// Removes a line. Removing a product that is not in the cart is a no-op.
    pub fn remove_item(&mut self, product_id: &str) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Computes subtotal, tax and grand total.
    ///
    /// Tax is applied once to the subtotal (not per line) and rounded half up
    /// to the minor unit. Pure: calling it twice yields identical results.
    ///
    /// ```rust
    /// use expo_core::cart::Cart;
    /// use expo_core::money::Money;
    /// use expo_core::types::{StockSnapshot, TaxRate};
    ///
    /// let snapshot = StockSnapshot {
    ///     product_id: "p-1".into(),
    ///     product_name: "Rose Damascus Oil 10ml".into(),
    ///     unit_price: Money::from_cents(8500),
    ///     remaining_quantity: 40,
    /// };
    /// let mut cart = Cart::new();
    /// cart.add_item(&snapshot).unwrap();
    ///
    /// let totals = cart.totals(TaxRate::from_bps(500));
    /// assert_eq!(totals.tax.cents(), 425);
    /// assert_eq!(totals.grand_total.cents(), 8925);
    /// ```
    pub fn totals(&self, tax_rate: TaxRate) -> CartTotals {
        let subtotal: Money = self.lines.iter().map(|l| l.line_total).sum();
        let tax = subtotal.apply_rate(tax_rate.bps());
        CartTotals {
            item_count: self.item_count(),
            total_quantity: self.total_quantity(),
            subtotal,
            tax,
            grand_total: subtotal + tax,
        }
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id == product_id)
    }
}

/// Checks a requested line quantity against a fresh snapshot.
pub(crate) fn check_quantity(snapshot: &StockSnapshot, requested: i64) -> CoreResult<()> {
    validate_quantity(requested).map_err(|e| match e {
        ValidationError::OutOfRange { .. } => CoreError::QuantityTooLarge {
            requested,
            max: MAX_ITEM_QUANTITY,
        },
        other => CoreError::Validation(other),
    })?;

    if requested > snapshot.remaining_quantity {
        return Err(CoreError::InsufficientStock {
            product_id: snapshot.product_id.clone(),
            product_name: snapshot.product_name.clone(),
            available: snapshot.remaining_quantity.max(0),
            requested,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
