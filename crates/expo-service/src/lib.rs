//! # expo-service: Checkout and Closure Orchestration
//!
//! The async layer the UI calls. It owns every conversation with the
//! backend and leaves the rules to [`expo_core`].
//!
//! ## Module Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         expo-service                                    │
//! │                                                                         │
//! │  ┌───────────────────┐        ┌───────────────────┐                     │
//! │  │  CheckoutService  │        │  ClosureService   │                     │
//! │  │  cart, tender,    │        │  day-end, run,    │                     │
//! │  │  finalize         │        │  close, export    │                     │
//! │  └─────────┬─────────┘        └─────────┬─────────┘                     │
//! │            │                            │                               │
//! │            ▼                            ▼                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ports: InventoryService  SalesService  ExpenseLedger           │   │
//! │  │         ReportExporter                                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   REST backend / InMemoryBackend                                        │
//! │                                                                         │
//! │  config: ServiceConfig (expo.toml + EXPO_*)   error: ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use expo_service::{init_tracing, CheckoutService, InMemoryBackend, ServiceConfig};
//!
//! # async fn run() -> Result<(), expo_service::ApiError> {
//! init_tracing();
//! let config = ServiceConfig::load(None)?;
//! let backend = Arc::new(InMemoryBackend::new());
//!
//! let checkout = CheckoutService::new(
//!     "expo-1",
//!     "cashier-1",
//!     config.pos_config(),
//!     backend.clone(),
//!     backend,
//! )?;
//! let view = checkout.add_item("p-1").await?;
//! println!("Total: {}", config.format_currency(view.totals.grand_total.cents()));
//! # Ok(())
//! # }
//! ```

pub mod checkout;
pub mod closure;
pub mod config;
pub mod error;
pub mod memory;
pub mod ports;

pub use checkout::{CartView, CheckoutService, Receipt};
pub use closure::{export_file_name, ClosureService};
pub use config::{ConfigError, ServiceConfig};
pub use error::{ApiError, ErrorCode, ServiceError, ServiceResult};
pub use memory::{FailureSwitches, InMemoryBackend};
pub use ports::{
    ExpenseLedger, ExportArtifact, ExportFormat, InventoryService, PortError, PortResult,
    ReportExporter, SalesService,
};

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - Default: INFO
/// - `RUST_LOG=debug` - cart edits and report builds
/// - `RUST_LOG=expo_service=trace` - everything from this crate
///
/// Calling it more than once is harmless; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
