//! # Closure Service
//!
//! Fetches sales and expenses for a scope, builds the report, locks it on
//! confirmation, and hands finished reports to the exporter.
//!
//! ## Business Days
//! Sales are always fetched for the whole exhibition and placed on days by
//! the terminal's own UTC offset. The sales service's idea of a calendar
//! date never decides which day a sale belongs to, so the day-end reports
//! of a run add up to its exhibition report.
//!
//! ## Opening Stock
//! Inventory only reports what is left now. For an exhibition run the
//! opening stock of each product is rebuilt as `remaining + sold since the
//! run started`, which gives the sell-through and stock columns. Day-end
//! reports carry no stock positions.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use expo_core::closure::{ClosureConfirmation, ClosureLedger, ClosureReport, StockPosition, StockPositions};
use expo_core::types::{PosConfig, ReportPeriod, ReportScope, Sale, StockSnapshot};
use expo_core::CoreError;

use crate::error::{ServiceError, ServiceResult};
use crate::ports::{ExpenseLedger, ExportArtifact, ExportFormat, InventoryService, ReportExporter, SalesService};

pub struct ClosureService {
    config: PosConfig,
    inventory: Arc<dyn InventoryService>,
    sales: Arc<dyn SalesService>,
    expenses: Arc<dyn ExpenseLedger>,
    exporter: Arc<dyn ReportExporter>,
    ledger: Mutex<ClosureLedger>,
}

impl ClosureService {
    pub fn new(
        config: PosConfig,
        inventory: Arc<dyn InventoryService>,
        sales: Arc<dyn SalesService>,
        expenses: Arc<dyn ExpenseLedger>,
        exporter: Arc<dyn ReportExporter>,
    ) -> Self {
        ClosureService {
            config,
            inventory,
            sales,
            expenses,
            exporter,
            ledger: Mutex::new(ClosureLedger::new()),
        }
    }

    /// Day-end report for one business day.
    pub async fn day_end_report(&self, exhibition_id: &str, date: NaiveDate) -> ServiceResult<ClosureReport> {
        let scope = ReportScope::day(exhibition_id, date);
        self.ensure_open(&scope).await?;

        let sales = self
            .sales
            .list_sales(exhibition_id, None)
            .await
            .map_err(ServiceError::ReportSourceFailed)?;
        let expenses = self
            .expenses
            .list_expenses(exhibition_id, scope.period)
            .await
            .map_err(ServiceError::ReportSourceFailed)?;

        let report = self
            .ledger
            .lock()
            .await
            .build_report(&sales, &expenses, scope, &self.config, None)?;

        debug!(
            scope = %report.scope,
            transactions = report.totals.total_transactions,
            gross = %report.totals.gross_revenue,
            "Day-end report built"
        );
        Ok(report)
    }

    /// Exhibition closure report covering `start..=end`.
    pub async fn exhibition_report(
        &self,
        exhibition_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<ClosureReport> {
        let scope = ReportScope::run(exhibition_id, start, end);
        self.ensure_open(&scope).await?;

        let sales = self
            .sales
            .list_sales(exhibition_id, None)
            .await
            .map_err(ServiceError::ReportSourceFailed)?;
        let expenses = self
            .expenses
            .list_expenses(exhibition_id, scope.period)
            .await
            .map_err(ServiceError::ReportSourceFailed)?;
        let availability = self
            .inventory
            .availability(exhibition_id)
            .await
            .map_err(ServiceError::ReportSourceFailed)?;

        let stock = stock_positions(&sales, &availability, &scope, &self.config);

        let report = self.ledger.lock().await.build_report(
            &sales,
            &expenses,
            scope,
            &self.config,
            Some(&stock),
        )?;

        debug!(
            scope = %report.scope,
            days = report.duration_days,
            transactions = report.totals.total_transactions,
            "Exhibition report built"
        );
        Ok(report)
    }

    /// Locks the report once the operator has confirmed its summary.
    pub async fn close(
        &self,
        report: ClosureReport,
        confirmation: &ClosureConfirmation,
    ) -> ServiceResult<ClosureReport> {
        let mut ledger = self.ledger.lock().await;
        let closed = ledger.close(report, confirmation, Utc::now()).map_err(|e| {
            warn!(scope = %confirmation.scope, error = %e, "Closure refused");
            e
        })?;

        info!(
            scope = %closed.scope,
            gross = %closed.totals.gross_revenue,
            net_profit = %closed.net_profit,
            transactions = closed.totals.total_transactions,
            "Closure locked"
        );
        Ok(closed)
    }

    /// The locked report for `scope`, if closed.
    pub async fn locked(&self, scope: &ReportScope) -> Option<ClosureReport> {
        self.ledger.lock().await.locked(scope).cloned()
    }

    /// Renders a report through the export collaborator.
    pub async fn export(&self, report: &ClosureReport, format: ExportFormat) -> ServiceResult<ExportArtifact> {
        let bytes = self
            .exporter
            .render(report, format)
            .await
            .map_err(ServiceError::ExportFailed)?;

        let artifact = ExportArtifact {
            file_name: export_file_name(&report.scope, format),
            content_type: format.content_type().to_string(),
            bytes,
        };
        info!(file_name = %artifact.file_name, size = artifact.bytes.len(), "Report exported");
        Ok(artifact)
    }

    async fn ensure_open(&self, scope: &ReportScope) -> ServiceResult<()> {
        if self.ledger.lock().await.is_closed(scope) {
            return Err(CoreError::AlreadyClosed { scope: scope.clone() }.into());
        }
        Ok(())
    }
}

/// `Day_End_Report_2024-09-29.pdf`, `Exhibition_Closure_expo-1_2024-09-26_2024-09-30.xlsx`
pub fn export_file_name(scope: &ReportScope, format: ExportFormat) -> String {
    match scope.period {
        ReportPeriod::Day { date } => format!("Day_End_Report_{}.{}", date, format.extension()),
        ReportPeriod::Run { start, end } => format!(
            "Exhibition_Closure_{}_{}_{}.{}",
            scope.exhibition_id,
            start,
            end,
            format.extension()
        ),
    }
}

/// Rebuilds each product's opening stock as what is left now plus every
/// unit the exhibition sold from the first day of `scope` onward, including
/// sales after the scope ends.
fn stock_positions(
    sales: &[Sale],
    availability: &[StockSnapshot],
    scope: &ReportScope,
    config: &PosConfig,
) -> StockPositions {
    let mut stock: StockPositions = availability
        .iter()
        .map(|s| {
            let remaining = s.remaining_quantity.max(0);
            (s.product_id.clone(), StockPosition { opening: remaining, remaining })
        })
        .collect();

    let start = scope.period.start();
    let sold_since_start = sales
        .iter()
        .filter(|s| s.exhibition_id == scope.exhibition_id)
        .filter(|s| config.business_date(s.created_at) >= start);

    for sale in sold_since_start {
        for item in &sale.items {
            stock
                .entry(item.product_id.clone())
                .or_insert(StockPosition { opening: 0, remaining: 0 })
                .opening += item.quantity;
        }
    }
    stock
}

// =============================================================================
// Unit Tests
// =============================================================================
