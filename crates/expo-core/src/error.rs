//! # Error Types
//!
//! Domain-specific error types for expo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  expo-core errors (this file)                                          │
//! │  ├── CoreError        - Checkout and closure rule violations           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  expo-service errors (separate crate)                                  │
//! │  ├── PortError        - Collaborator (backend) call failures           │
//! │  └── ApiError         - What the UI layer sees (serialized)            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → UI                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is recoverable: the operation that raised it leaves its
//! state untouched and the cashier can correct the input and retry.

use thiserror::Error;

use crate::money::Money;
use crate::types::ReportScope;

// =============================================================================
// Core Error
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Requested quantity exceeds the remaining stock last reported by the
    /// inventory service.
    ///
    /// ## User Workflow
    /// ```text
    /// Tap "Oud Royal Attar" (remaining: 3, in cart: 3)
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 4 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Oud Royal Attar 12ml in stock"
    /// ```
    #[error("Insufficient stock for {product_name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// Tendered amount does not cover the grand total.
    #[error("Insufficient payment: total {required}, tendered {tendered}")]
    InsufficientPayment { required: Money, tendered: Money },

    /// Finalize attempted with no lines in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The sales service did not accept the sale. The sale is NOT complete.
    #[error("Sale could not be saved: {0}")]
    PersistenceFailed(String),

    /// A payment allocation is negative, non-numeric, or cannot be removed.
    #[error("Invalid payment allocation: {reason}")]
    InvalidAllocation { reason: String },

    /// The report for this scope has been locked by a close.
    #[error("Closure for {scope} is already closed")]
    AlreadyClosed { scope: ReportScope },

    /// The confirmation presented to the operator does not describe the
    /// report being closed.
    #[error("Closure confirmation does not match the report for {scope}")]
    ConfirmationMismatch { scope: ReportScope },

    #[error("Product {0} is not in the cart")]
    ProductNotInCart(String),

    #[error("No payment allocation at position {index}")]
    PaymentNotFound { index: usize },

    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn invalid_allocation(reason: impl Into<String>) -> Self {
        CoreError::InvalidAllocation {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level input problems caught before any business rule runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
