//! # Checkout
//!
//! Split tender, change, and turning a cart into a [`Sale`].
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout Flow                                   │
//! │                                                                         │
//! │   Cart ──► add_payment / set_payment_text ──► compute_change            │
//! │                                                    │                    │
//! │                     fresh availability ────────────┤                    │
//! │                                                    ▼                    │
//! │                                            prepare_sale()               │
//! │                                                    │                    │
//! │        EmptyCart ◄── InvalidAllocation ◄── InsufficientPayment          │
//! │                                  ◄── InsufficientStock                  │
//! │                                                    │ Ok(Sale)           │
//! │                                                    ▼                    │
//! │                              caller persists, then clear()              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Settlement
//! Change is never entered as an allocation. When the customer overpays,
//! the change is taken back out of the cash allocations (newest first),
//! then out of the others, so every persisted sale satisfies
//! `Σ payment.amount == total_amount`. The per-allocation `tendered`
//! figure keeps what was actually handed over.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::{Cart, CartLine, CartTotals};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{find_snapshot, CustomerInfo, Payment, PaymentMethod, Sale, StockSnapshot, TaxRate};
use crate::validation::{validate_email, validate_id, validate_payment_amount, validate_phone};

// =============================================================================
// Payment Allocation
// =============================================================================

/// One tender row on the payment screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentAllocation {
    pub method: PaymentMethod,
    pub amount: Money,
}

impl PaymentAllocation {
    pub const fn new(method: PaymentMethod, amount: Money) -> Self {
        PaymentAllocation { method, amount }
    }
}

impl Default for PaymentAllocation {
    fn default() -> Self {
        PaymentAllocation::new(PaymentMethod::Cash, Money::zero())
    }
}

fn check_allocation_amount(amount: Money) -> CoreResult<()> {
    validate_payment_amount(amount).map_err(|e| CoreError::invalid_allocation(e.to_string()))
}

/// Sums tender rows, refusing a total that does not fit in minor units.
fn checked_tender_total<I: IntoIterator<Item = Money>>(amounts: I) -> CoreResult<Money> {
    Money::checked_sum(amounts)
        .ok_or_else(|| CoreError::invalid_allocation("total tendered is too large"))
}

// =============================================================================
// Sale Number
// =============================================================================

/// Sale number in the form `SALE-YYYYMMDD-XXXXXXXX`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleNumber(String);

impl SaleNumber {
    /// Builds a sale number from a day and a caller-supplied token.
    pub fn new(date: NaiveDate, token: &str) -> Self {
        SaleNumber(format!("SALE-{}-{}", date.format("%Y%m%d"), token.to_uppercase()))
    }

    /// Generates a sale number for `now` with a random 8-hex-digit token.
    ///
    /// ```rust
    /// use chrono::Utc;
    /// use expo_core::checkout::SaleNumber;
    ///
    /// let number = SaleNumber::generate(Utc::now());
    /// assert!(number.as_str().starts_with("SALE-"));
    /// assert_eq!(number.as_str().len(), "SALE-20240929-1A2B3C4D".len());
    /// ```
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self::for_date(now.date_naive())
    }

    /// Same as [`SaleNumber::generate`] for an already-resolved business day.
    pub fn for_date(date: NaiveDate) -> Self {
        Self::new(date, &random_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SaleNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_token() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}

// =============================================================================
// Sale Context
// =============================================================================

/// Everything a sale needs that does not come from the checkout itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleContext {
    pub exhibition_id: String,
    pub cashier_id: String,
    pub sale_number: SaleNumber,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Checkout
// =============================================================================

/// The active checkout: cart, tender rows, and optional customer.
///
/// ## Invariants
/// - At least one payment allocation (a zero-amount cash row to start)
/// - No allocation is negative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Checkout {
    cart: Cart,
    payments: Vec<PaymentAllocation>,
    customer: Option<CustomerInfo>,
    tax_rate: TaxRate,
}

impl Checkout {
    pub fn new(tax_rate: TaxRate) -> Self {
        Checkout {
            cart: Cart::new(),
            payments: vec![PaymentAllocation::default()],
            customer: None,
            tax_rate,
        }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn payments(&self) -> &[PaymentAllocation] {
        &self.payments
    }

    pub fn customer(&self) -> Option<&CustomerInfo> {
        self.customer.as_ref()
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    pub fn add_item(&mut self, snapshot: &StockSnapshot) -> CoreResult<&CartLine> {
        self.cart.add_item(snapshot)
    }

    pub fn set_quantity(
        &mut self,
        product_id: &str,
        quantity: i64,
        snapshot: &StockSnapshot,
    ) -> CoreResult<()> {
        self.cart.set_quantity(product_id, quantity, snapshot)
    }

    pub fn remove_item(&mut self, product_id: &str) {
        self.cart.remove_item(product_id);
    }

    pub fn totals(&self) -> CartTotals {
        self.cart.totals(self.tax_rate)
    }

    // -------------------------------------------------------------------------
    // Tender
    // -------------------------------------------------------------------------

    /// Appends a tender row and returns its index.
    pub fn add_payment(&mut self, method: PaymentMethod, amount: Money) -> CoreResult<usize> {
        check_allocation_amount(amount)?;
        checked_tender_total(self.payments.iter().map(|p| p.amount).chain([amount]))?;
        self.payments.push(PaymentAllocation::new(method, amount));
        Ok(self.payments.len() - 1)
    }

    pub fn update_payment(
        &mut self,
        index: usize,
        method: PaymentMethod,
        amount: Money,
    ) -> CoreResult<()> {
        check_allocation_amount(amount)?;
        if index >= self.payments.len() {
            return Err(CoreError::PaymentNotFound { index });
        }
        self.check_replacement(index, amount)?;

        self.payments[index] = PaymentAllocation::new(method, amount);
        Ok(())
    }

    /// Sets a row's amount from what the cashier typed.
    ///
    /// Empty text means zero. Non-numeric, over-precise or negative text is
    /// rejected and the row keeps its previous amount.
    pub fn set_payment_text(&mut self, index: usize, text: &str) -> CoreResult<()> {
        if index >= self.payments.len() {
            return Err(CoreError::PaymentNotFound { index });
        }

        let amount = if text.trim().is_empty() {
            Money::zero()
        } else {
            text.parse::<Money>()
                .map_err(|e| CoreError::invalid_allocation(e.to_string()))?
        };
        check_allocation_amount(amount)?;
        self.check_replacement(index, amount)?;

        self.payments[index].amount = amount;
        Ok(())
    }

    /// The tender total with row `index` replaced by `amount` must fit.
    fn check_replacement(&self, index: usize, amount: Money) -> CoreResult<()> {
        let others = self
            .payments
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, p)| p.amount);
        checked_tender_total(others.chain([amount])).map(|_| ())
    }

    /// Removes a tender row. The last remaining row cannot be removed.
    pub fn remove_payment(&mut self, index: usize) -> CoreResult<PaymentAllocation> {
        if index >= self.payments.len() {
            return Err(CoreError::PaymentNotFound { index });
        }
        if self.payments.len() == 1 {
            return Err(CoreError::invalid_allocation(
                "at least one payment allocation is required",
            ));
        }
        Ok(self.payments.remove(index))
    }

    /// Sum of the tender rows. Every edit keeps this sum representable.
    pub fn total_tendered(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// What the customer still owes. Never negative.
    pub fn remaining_due(&self) -> Money {
        (self.totals().grand_total - self.total_tendered()).clamp_non_negative()
    }

    /// `max(0, Σ tendered - grand_total)`.
    pub fn compute_change(&self) -> Money {
        (self.total_tendered() - self.totals().grand_total).clamp_non_negative()
    }

    // -------------------------------------------------------------------------
    // Customer
    // -------------------------------------------------------------------------

    /// Attaches customer details. Blank fields are dropped; an entirely
    /// blank customer clears the attachment.
    pub fn set_customer(&mut self, customer: CustomerInfo) -> CoreResult<()> {
        let customer = customer.normalized();
        if let Some(email) = &customer.email {
            validate_email(email)?;
        }
        if let Some(phone) = &customer.phone {
            validate_phone(phone)?;
        }

        self.customer = if customer.is_empty() { None } else { Some(customer) };
        Ok(())
    }

    /// Empties the cart and resets tender rows and customer.
    pub fn clear(&mut self) {
        self.cart.clear();
        self.payments = vec![PaymentAllocation::default()];
        self.customer = None;
    }

    // -------------------------------------------------------------------------
    // Finalize
    // -------------------------------------------------------------------------

    /// Builds the sale to hand to the sales service.
    ///
    /// ## Checks (in order)
    /// 1. cart not empty (`EmptyCart`)
    /// 2. every allocation non-negative (`InvalidAllocation`)
    /// 3. tendered covers the grand total (`InsufficientPayment`)
    /// 4. every line fits the fresh `availability` (`InsufficientStock`); a
    ///    product missing from it has nothing left
    ///
    /// Does not modify the checkout. Clear it once the sale is persisted.
    pub fn prepare_sale(&self, availability: &[StockSnapshot], context: SaleContext) -> CoreResult<Sale> {
        if self.cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        for allocation in &self.payments {
            check_allocation_amount(allocation.amount)?;
        }

        let totals = self.totals();
        let tendered = checked_tender_total(self.payments.iter().map(|p| p.amount))?;
        if tendered < totals.grand_total {
            return Err(CoreError::InsufficientPayment {
                required: totals.grand_total,
                tendered,
            });
        }

        for line in self.cart.lines() {
            match find_snapshot(availability, &line.product_id) {
                Some(snapshot) => crate::cart::check_quantity(snapshot, line.quantity)?,
                None => {
                    return Err(CoreError::InsufficientStock {
                        product_id: line.product_id.clone(),
                        product_name: line.product_name.clone(),
                        available: 0,
                        requested: line.quantity,
                    })
                }
            }
        }

        validate_id("exhibition_id", &context.exhibition_id)?;
        validate_id("cashier_id", &context.cashier_id)?;

        let change = tendered - totals.grand_total;

        Ok(Sale {
            sale_number: context.sale_number.into_string(),
            exhibition_id: context.exhibition_id,
            items: self.cart.lines().iter().map(CartLine::to_sale_item).collect(),
            payments: settle_payments(&self.payments, change),
            subtotal: totals.subtotal,
            tax: totals.tax,
            total_amount: totals.grand_total,
            amount_tendered: tendered,
            change_given: change,
            customer: self.customer.clone(),
            cashier_id: context.cashier_id,
            created_at: context.created_at,
        })
    }
}

impl Default for Checkout {
    fn default() -> Self {
        Checkout::new(TaxRate::default())
    }
}

/// Applies change back against the tender rows: cash first, newest first,
/// then the rest. Rows that end up applying nothing are dropped.
fn settle_payments(allocations: &[PaymentAllocation], change: Money) -> Vec<Payment> {
    let mut payments: Vec<Payment> = allocations
        .iter()
        .map(|a| Payment {
            method: a.method,
            amount: a.amount,
            tendered: a.amount,
        })
        .collect();

    let cash_first = (0..payments.len())
        .rev()
        .filter(|&i| payments[i].method == PaymentMethod::Cash)
        .chain((0..payments.len()).rev().filter(|&i| payments[i].method != PaymentMethod::Cash))
        .collect::<Vec<_>>();

    let mut left = change;
    for i in cash_first {
        if !left.is_positive() {
            break;
        }
        let taken = left.min(payments[i].amount);
        payments[i].amount -= taken;
        left -= taken;
    }

    payments.retain(|p| !p.amount.is_zero());
    payments
}

// =============================================================================
// Unit Tests
// =============================================================================
