//! # In-Memory Backend
//!
//! Inventory, sales and expense ports held in process memory. Used by the
//! test suite and for running the services without a backend.
//!
//! Behaves like the real backend where the services can observe it:
//! creating a sale decrements stock and is refused if stock ran out, and
//! each port can be switched to fail so error paths can be exercised.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use expo_core::types::{Expense, ReportPeriod, Sale, StockSnapshot};

use crate::ports::{ExpenseLedger, InventoryService, PortError, PortResult, SalesService};

/// Which ports should fail on their next calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureSwitches {
    pub inventory: bool,
    pub create_sale: bool,
    pub list_sales: bool,
    pub list_expenses: bool,
}

#[derive(Debug, Default)]
struct BackendState {
    /// exhibition id → product id → snapshot
    stock: BTreeMap<String, BTreeMap<String, StockSnapshot>>,
    sales: Vec<Sale>,
    expenses: Vec<Expense>,
    failures: FailureSwitches,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    /// Used to place sales on business days for `list_sales`.
    utc_offset_minutes: i32,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utc_offset(utc_offset_minutes: i32) -> Self {
        InMemoryBackend {
            state: Mutex::default(),
            utc_offset_minutes,
        }
    }

    /// Adds or replaces a product's stock at an exhibition.
    pub async fn put_stock(&self, exhibition_id: &str, snapshot: StockSnapshot) {
        let mut state = self.state.lock().await;
        state
            .stock
            .entry(exhibition_id.to_string())
            .or_default()
            .insert(snapshot.product_id.clone(), snapshot);
    }

    /// Changes remaining stock, as another terminal selling would.
    pub async fn set_remaining(&self, exhibition_id: &str, product_id: &str, remaining: i64) -> PortResult<()> {
        let mut state = self.state.lock().await;
        let snapshot = state
            .stock
            .get_mut(exhibition_id)
            .and_then(|products| products.get_mut(product_id))
            .ok_or_else(|| PortError::NotFound(format!("product {} at {}", product_id, exhibition_id)))?;
        snapshot.remaining_quantity = remaining;
        Ok(())
    }

    pub async fn remaining(&self, exhibition_id: &str, product_id: &str) -> Option<i64> {
        let state = self.state.lock().await;
        state
            .stock
            .get(exhibition_id)
            .and_then(|products| products.get(product_id))
            .map(|s| s.remaining_quantity)
    }

    /// Seeds a historical sale without touching stock.
    pub async fn insert_sale(&self, sale: Sale) {
        self.state.lock().await.sales.push(sale);
    }

    pub async fn record_expense(&self, expense: Expense) {
        self.state.lock().await.expenses.push(expense);
    }

    /// Every sale stored so far, in creation order.
    pub async fn sales(&self) -> Vec<Sale> {
        self.state.lock().await.sales.clone()
    }

    pub async fn set_failures(&self, failures: FailureSwitches) {
        self.state.lock().await.failures = failures;
    }
}

fn unavailable(operation: &str) -> PortError {
    PortError::Unavailable(format!("{} failed (injected)", operation))
}

#[async_trait]
impl InventoryService for InMemoryBackend {
    async fn availability(&self, exhibition_id: &str) -> PortResult<Vec<StockSnapshot>> {
        let state = self.state.lock().await;
        if state.failures.inventory {
            return Err(unavailable("availability"));
        }

        state
            .stock
            .get(exhibition_id)
            .map(|products| products.values().cloned().collect())
            .ok_or_else(|| PortError::NotFound(format!("exhibition {}", exhibition_id)))
    }
}

#[async_trait]
impl SalesService for InMemoryBackend {
    async fn create_sale(&self, sale: Sale) -> PortResult<Sale> {
        let mut state = self.state.lock().await;
        if state.failures.create_sale {
            return Err(unavailable("create_sale"));
        }

        if state.sales.iter().any(|s| s.sale_number == sale.sale_number) {
            return Err(PortError::Rejected(format!("duplicate sale number {}", sale.sale_number)));
        }

        let products = state
            .stock
            .get_mut(&sale.exhibition_id)
            .ok_or_else(|| PortError::NotFound(format!("exhibition {}", sale.exhibition_id)))?;

        // Check every line before decrementing any, so a refusal leaves stock untouched.
        for item in &sale.items {
            let remaining = products.get(&item.product_id).map_or(0, |s| s.remaining_quantity);
            if item.quantity > remaining {
                return Err(PortError::Rejected(format!(
                    "insufficient stock for {}: {} left, {} sold",
                    item.product_name, remaining, item.quantity
                )));
            }
        }
        for item in &sale.items {
            if let Some(snapshot) = products.get_mut(&item.product_id) {
                snapshot.remaining_quantity -= item.quantity;
            }
        }

        debug!(sale_number = %sale.sale_number, "Stored sale");
        state.sales.push(sale.clone());
        Ok(sale)
    }

    async fn list_sales(&self, exhibition_id: &str, date: Option<NaiveDate>) -> PortResult<Vec<Sale>> {
        let state = self.state.lock().await;
        if state.failures.list_sales {
            return Err(unavailable("list_sales"));
        }

        Ok(state
            .sales
            .iter()
            .filter(|s| s.exhibition_id == exhibition_id)
            .filter(|s| date.map_or(true, |d| s.business_date(self.utc_offset_minutes) == d))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExpenseLedger for InMemoryBackend {
    async fn list_expenses(&self, exhibition_id: &str, period: ReportPeriod) -> PortResult<Vec<Expense>> {
        let state = self.state.lock().await;
        if state.failures.list_expenses {
            return Err(unavailable("list_expenses"));
        }

        Ok(state
            .expenses
            .iter()
            .filter(|e| e.exhibition_id.as_deref().map_or(true, |id| id == exhibition_id))
            .filter(|e| period.contains(e.date))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
