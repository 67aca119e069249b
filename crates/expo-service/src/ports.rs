//! # Collaborator Ports
//!
//! The only way expo-service talks to the outside world.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Port               Operation          In                  Out          │
//! │  ────               ─────────          ──                  ───          │
//! │  InventoryService   availability       exhibition_id       snapshots    │
//! │  SalesService       create_sale        Sale                Sale         │
//! │  SalesService       list_sales         exhibition, date?   Sale[]       │
//! │  ExpenseLedger      list_expenses      exhibition, period  Expense[]    │
//! │  ReportExporter     render             report, format      bytes        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transport is the implementor's business (REST, RPC, in-process). Every
//! call is one request and one response; retries belong to the transport.
//! A failed call is returned as a [`PortError`] and is never replaced with
//! sample data.

use async_trait::async_trait;
use chrono::NaiveDate;
use expo_core::closure::ClosureReport;
use expo_core::types::{Expense, ReportPeriod, Sale, StockSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Port Error
// =============================================================================

/// Failure of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The collaborator could not be reached or failed internally.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The collaborator understood the request and refused it.
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type PortResult<T> = Result<T, PortError>;

// =============================================================================
// Ports
// =============================================================================

#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Current stock for every product at the exhibition.
    async fn availability(&self, exhibition_id: &str) -> PortResult<Vec<StockSnapshot>>;
}

#[async_trait]
pub trait SalesService: Send + Sync {
    /// Persists a finalized sale and returns the stored record.
    async fn create_sale(&self, sale: Sale) -> PortResult<Sale>;

    /// Sales recorded for the exhibition, optionally on one date as the
    /// sales service counts dates. Closure reports ask for the whole
    /// exhibition and assign days themselves.
    async fn list_sales(&self, exhibition_id: &str, date: Option<NaiveDate>) -> PortResult<Vec<Sale>>;
}

#[async_trait]
pub trait ExpenseLedger: Send + Sync {
    async fn list_expenses(&self, exhibition_id: &str, period: ReportPeriod) -> PortResult<Vec<Expense>>;
}

#[async_trait]
pub trait ReportExporter: Send + Sync {
    /// Renders the finished report. Layout and markup are entirely the
    /// exporter's concern.
    async fn render(&self, report: &ClosureReport, format: ExportFormat) -> PortResult<Vec<u8>>;
}

// =============================================================================
// Export Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub const fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub const fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A rendered report ready for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
