//! # expo-core: Pure Business Logic for Expo POS
//!
//! Checkout and closure rules for an exhibition point of sale, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Expo POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layer (web / desktop)                     │   │
//! │  │    Product grid ──► Cart ──► Tender ──► Receipt ──► Closure     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    expo-service                                 │   │
//! │  │    CheckoutService, ClosureService, collaborator ports          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ expo-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ │   │
//! │  │   │  money  │ │  types  │ │  cart   │ │ checkout │ │ closure │ │   │
//! │  │   │  Money  │ │  Sale   │ │  Cart   │ │ tenders  │ │ report  │ │   │
//! │  │   │   %     │ │  Scope  │ │  lines  │ │  change  │ │ ledger  │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO LOGGING • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in minor units, percentages in basis points
//! - [`types`] - Domain types (StockSnapshot, Sale, Expense, ReportScope, ...)
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//! - [`cart`] - Cart lines checked against stock
//! - [`checkout`] - Split tender, change and sale preparation
//! - [`closure`] - Day-end and exhibition closure reports and locking
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output
//! 2. **No I/O**: inventory, sales and expenses arrive as arguments
//! 3. **Integer Money**: all amounts are minor units (i64)
//! 4. **Explicit Errors**: every failure is a typed [`CoreError`]
//!
//! ## Example Usage
//!
//! ```rust
//! use expo_core::cart::Cart;
//! use expo_core::money::Money;
//! use expo_core::types::{StockSnapshot, TaxRate};
//!
//! let snapshot = StockSnapshot {
//!     product_id: "p-7".to_string(),
//!     product_name: "Amber Musk 50ml".to_string(),
//!     unit_price: Money::from_cents(10000),
//!     remaining_quantity: 3,
//! };
//!
//! let mut cart = Cart::new();
//! cart.add_item(&snapshot).unwrap();
//! cart.add_item(&snapshot).unwrap();
//!
//! let totals = cart.totals(TaxRate::from_bps(500));
//! assert_eq!(totals.grand_total.cents(), 21000); // AED 210.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod closure;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals};
pub use checkout::{Checkout, PaymentAllocation, SaleContext, SaleNumber};
pub use closure::{build_report, ClosureConfirmation, ClosureLedger, ClosureReport, StockPosition, TransactionSummary};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percentage};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default sales tax in basis points (5% UAE VAT).
pub const DEFAULT_TAX_RATE_BPS: u32 = 500;

/// Default estimated cost of goods sold, as a share of gross revenue (55%).
///
/// An approximation: the backend records no per-unit cost, so COGS is a
/// ratio until real cost data exists. Override it through configuration,
/// never with a literal at the call site.
pub const DEFAULT_COGS_RATIO_BPS: u32 = 5500;

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typos such as 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest single amount accepted anywhere money enters the system: a unit
/// price, a tender row, or an expense (10,000,000.00 in major units).
///
/// Keeps every cart, tender and report sum far inside `i64` minor units.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000;
