//! # Service and API Errors
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Expo POS                               │
//! │                                                                         │
//! │  UI layer                     expo-service                              │
//! │  ────────                     ────────────                              │
//! │                                                                         │
//! │  finalize()                                                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  ServiceResult<T>                                                │  │
//! │  │      │                                                           │  │
//! │  │      ├── CoreError::InsufficientPayment ─────┐                   │  │
//! │  │      ├── CoreError::PersistenceFailed ───────┤                   │  │
//! │  │      ├── ServiceError::StockCheckFailed ─────┼──► ApiError ─────►│  │
//! │  │      └── ServiceError::Busy ─────────────────┘                   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  e.code    = "INSUFFICIENT_PAYMENT"                                     │
//! │  e.message = "Insufficient payment: total 262.50, tendered 200.00"      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use expo_core::{CoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::ports::PortError;

// =============================================================================
// Service Error
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Inventory has no record of the product at this exhibition.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A finalize is already in flight for this checkout.
    #[error("A sale is already being finalized")]
    Busy,

    /// Availability could not be fetched, so stock could not be checked.
    #[error("Stock check failed: {0}")]
    StockCheckFailed(PortError),

    /// Sales or expenses for a report could not be read.
    #[error("Report data unavailable: {0}")]
    ReportSourceFailed(PortError),

    #[error("Export failed: {0}")]
    ExportFailed(PortError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// API Error
// =============================================================================

/// What the UI layer receives when an operation fails.
///
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for Oud Royal Attar 12ml: available 3, requested 4"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Requested quantity exceeds remaining stock
    InsufficientStock,

    /// Tendered amount below grand total
    InsufficientPayment,

    /// Finalize attempted on an empty cart
    EmptyCart,

    /// Malformed or unremovable payment allocation
    InvalidAllocation,

    /// Cart edit rejected (unknown line, too many lines)
    CartError,

    /// The sale was not saved
    PersistenceFailed,

    /// Closure for this scope is locked
    AlreadyClosed,

    /// Operation already running (409)
    Busy,

    /// A collaborator could not be reached (503)
    ServiceUnavailable,

    /// Report export failed
    ExportFailed,

    /// Configuration could not be loaded
    ConfigError,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match &err {
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
            CoreError::EmptyCart => ErrorCode::EmptyCart,
            CoreError::PersistenceFailed(reason) => {
                tracing::error!(reason = %reason, "Sale persistence failed");
                ErrorCode::PersistenceFailed
            }
            CoreError::InvalidAllocation { .. } | CoreError::PaymentNotFound { .. } => {
                ErrorCode::InvalidAllocation
            }
            CoreError::AlreadyClosed { .. } => ErrorCode::AlreadyClosed,
            CoreError::ConfirmationMismatch { .. } => ErrorCode::ValidationError,
            CoreError::ProductNotInCart(_) | CoreError::CartTooLarge { .. } => ErrorCode::CartError,
            CoreError::QuantityTooLarge { .. } | CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, message)
    }
}

/// Converts collaborator errors to API errors.
impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => ApiError::not_found("Resource", &what),
            PortError::Rejected(reason) => ApiError::validation(reason),
            PortError::Unavailable(reason) => {
                // Log the transport detail, show a generic message
                tracing::error!(reason = %reason, "Collaborator unavailable");
                ApiError::new(ErrorCode::ServiceUnavailable, "Service temporarily unavailable")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(e) => e.into(),
            ServiceError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            ServiceError::Busy => ApiError::new(ErrorCode::Busy, "A sale is already being finalized"),
            ServiceError::StockCheckFailed(e) => {
                tracing::error!(error = %e, "Stock check failed");
                ApiError::new(ErrorCode::ServiceUnavailable, "Could not check stock, please retry")
            }
            ServiceError::ReportSourceFailed(e) => {
                tracing::error!(error = %e, "Report data unavailable");
                ApiError::new(ErrorCode::ServiceUnavailable, "Report data is unavailable, please retry")
            }
            ServiceError::ExportFailed(e) => {
                tracing::error!(error = %e, "Report export failed");
                ApiError::new(ErrorCode::ExportFailed, format!("Export failed: {}", e))
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!(error = %err, "Configuration error");
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Unit Tests
// =============================================================================
