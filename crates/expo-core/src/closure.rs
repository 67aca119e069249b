//! # Closure
//!
//! Day-end and exhibition closure: aggregate completed sales and expenses
//! for one scope into a [`ClosureReport`], then lock it.
//!
//! ## Report Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Closure Lifecycle                                │
//! │                                                                         │
//! │   sales[] + expenses[] + scope + PosConfig                              │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │              build_report()  ◄──── recompute freely while open          │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │   ClosureReport { closed: false } ──► confirmation() ──► operator       │
//! │                      │                                      │           │
//! │                      ▼                                      │ confirms  │
//! │           ClosureLedger::close(report, &confirmation) ◄─────┘           │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │   ClosureReport { closed: true }   system of record, never rebuilt      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Figures
//! | Figure               | Rule                                         |
//! |----------------------|----------------------------------------------|
//! | gross_revenue        | Σ sale.total_amount (tax included)           |
//! | avg_transaction      | gross_revenue / transactions, 0 if none      |
//! | payment_breakdown    | Σ payment.amount per method                  |
//! | cost_of_goods_sold   | gross_revenue × COGS ratio (estimate)        |
//! | gross_profit         | gross_revenue - COGS                         |
//! | net_profit           | gross_profit - expenses_total                |
//! | profit_margin        | net_profit / gross_revenue, 0 if no revenue  |
//! | sell_through         | quantity_sold / opening stock, when known    |
//! | transactions         | sales in scope by time, then sale number     |
//!
//! Product revenue is the pre-tax line total, since tax is charged on the
//! sale subtotal and is not attributed to individual products.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Percentage};
use crate::types::{CogsRatio, Currency, Expense, PaymentMethod, PosConfig, ReportScope, Sale};
use crate::validation::{validate_expense_amount, validate_expense_category};

/// Stock of one product at the exhibition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockPosition {
    /// Units on hand when the run opened.
    pub opening: i64,
    /// Units on hand now.
    pub remaining: i64,
}

/// Stock positions per product id, when known.
pub type StockPositions = BTreeMap<String, StockPosition>;

// =============================================================================
// Report Types
// =============================================================================

/// Sales figures for the scope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesTotals {
    pub gross_revenue: Money,
    pub total_transactions: usize,
    pub avg_transaction_value: Money,
    /// Amount applied per payment method. Sums to `gross_revenue`.
    pub payment_breakdown: BTreeMap<PaymentMethod, Money>,
}

/// One row of the product performance table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPerformance {
    pub product_id: String,
    pub product_name: String,
    pub quantity_sold: i64,
    /// Pre-tax revenue from this product's lines.
    pub revenue: Money,
    /// Share of opening stock sold. Present only when opening stock is known.
    pub sell_through: Option<Percentage>,
    pub opening_stock: Option<i64>,
    pub remaining_stock: Option<i64>,
}

/// One completed sale in the report's transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionSummary {
    pub sale_number: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// `None` for a walk-in customer.
    pub customer_name: Option<String>,
    pub total_quantity: i64,
    pub total_amount: Money,
    /// Methods used, in tender order, without repeats.
    pub payment_methods: Vec<PaymentMethod>,
}

impl TransactionSummary {
    fn of(sale: &Sale) -> Self {
        let mut payment_methods: Vec<PaymentMethod> = Vec::new();
        for payment in &sale.payments {
            if !payment_methods.contains(&payment.method) {
                payment_methods.push(payment.method);
            }
        }

        TransactionSummary {
            sale_number: sale.sale_number.clone(),
            created_at: sale.created_at,
            customer_name: sale.customer.as_ref().and_then(|c| c.name.clone()),
            total_quantity: sale.total_quantity(),
            total_amount: sale.total_amount,
            payment_methods,
        }
    }
}

/// Headline facts shown at the top of a closure screen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportHighlights {
    /// Most units sold; ties go to higher revenue, then product id.
    pub best_selling_product: Option<String>,
    /// Highest revenue day; ties go to the earlier day.
    #[ts(as = "Option<String>")]
    pub busiest_day: Option<NaiveDate>,
    /// Largest applied amount; ties go to the method listed first.
    pub predominant_payment_method: Option<PaymentMethod>,
}

/// Financial summary of one exhibition day or one whole exhibition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosureReport {
    pub scope: ReportScope,
    pub currency: Currency,
    pub cogs_ratio: CogsRatio,
    /// Days covered, both ends included.
    pub duration_days: i64,

    pub totals: SalesTotals,
    pub subtotal_total: Money,
    pub tax_collected: Money,
    pub total_quantity_sold: i64,

    /// Estimated from the COGS ratio, not from per-unit costs.
    pub cost_of_goods_sold: Money,
    pub gross_profit: Money,
    pub expenses_total: Money,
    pub expenses_by_category: BTreeMap<String, Money>,
    /// Itemized expenses, by date.
    pub expenses: Vec<Expense>,
    pub net_profit: Money,
    pub profit_margin: Percentage,

    /// Sorted by revenue (highest first), then product id.
    pub product_performance: Vec<ProductPerformance>,
    /// Revenue per business day.
    #[ts(as = "BTreeMap<String, Money>")]
    pub daily_sales: BTreeMap<NaiveDate, Money>,
    /// Every sale in scope, oldest first.
    pub transactions: Vec<TransactionSummary>,
    pub highlights: ReportHighlights,

    pub closed: bool,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// What the operator is shown, and must agree to, before a close commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosureConfirmation {
    pub scope: ReportScope,
    pub gross_revenue: Money,
    pub total_transactions: usize,
    pub net_profit: Money,
}

impl ClosureConfirmation {
    /// Human-readable confirmation prompt.
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use expo_core::closure::ClosureConfirmation;
    /// use expo_core::money::Money;
    /// use expo_core::types::{Currency, ReportScope};
    ///
    /// let confirmation = ClosureConfirmation {
    ///     scope: ReportScope::day("expo-1", NaiveDate::from_ymd_opt(2024, 9, 29).unwrap()),
    ///     gross_revenue: Money::from_cents(74125),
    ///     total_transactions: 3,
    ///     net_profit: Money::from_cents(18356),
    /// };
    /// assert_eq!(
    ///     confirmation.render(&Currency::aed()),
    ///     "Close expo-1 @ 2024-09-29? Total sales AED 741.25 over 3 transactions, net profit AED 183.56. This cannot be undone."
    /// );
    /// ```
    pub fn render(&self, currency: &Currency) -> String {
        format!(
            "Close {}? Total sales {} over {} transactions, net profit {}. This cannot be undone.",
            self.scope,
            self.gross_revenue.format(currency),
            self.total_transactions,
            self.net_profit.format(currency),
        )
    }
}

impl ClosureReport {
    pub fn confirmation(&self) -> ClosureConfirmation {
        ClosureConfirmation {
            scope: self.scope.clone(),
            gross_revenue: self.totals.gross_revenue,
            total_transactions: self.totals.total_transactions,
            net_profit: self.net_profit,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rebuilds the figures from fresh inputs for the same scope.
    ///
    /// A closed report is the system of record and refuses with
    /// `AlreadyClosed`.
    pub fn recompute(
        &mut self,
        sales: &[Sale],
        expenses: &[Expense],
        config: &PosConfig,
        stock: Option<&StockPositions>,
    ) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::AlreadyClosed {
                scope: self.scope.clone(),
            });
        }
        *self = build_report(sales, expenses, self.scope.clone(), config, stock)?;
        Ok(())
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Aggregates sales and expenses into an open report for `scope`.
///
/// Sales outside the scope's exhibition or business-day period, and
/// expenses outside its period, are ignored. Pure and deterministic.
///
/// ## Errors
/// - `Validation` if an expense in scope has a negative or oversized
///   amount, or a blank category
pub fn build_report(
    sales: &[Sale],
    expenses: &[Expense],
    scope: ReportScope,
    config: &PosConfig,
    stock: Option<&StockPositions>,
) -> CoreResult<ClosureReport> {
    let mut sales: Vec<&Sale> = sales.iter().filter(|s| scope.covers_sale(s, config)).collect();
    sales.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.sale_number.cmp(&b.sale_number))
    });

    let mut expenses: Vec<&Expense> = expenses.iter().filter(|e| scope.covers_expense(e)).collect();
    for expense in &expenses {
        validate_expense_category(&expense.category)?;
        validate_expense_amount(expense.amount)?;
    }
    expenses.sort_by_key(|e| e.date);

    let gross_revenue: Money = sales.iter().map(|s| s.total_amount).sum();
    let total_transactions = sales.len();

    let mut payment_breakdown: BTreeMap<PaymentMethod, Money> = BTreeMap::new();
    let mut daily_sales: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    let mut products: BTreeMap<&str, ProductPerformance> = BTreeMap::new();

    for sale in &sales {
        for payment in &sale.payments {
            *payment_breakdown.entry(payment.method).or_default() += payment.amount;
        }

        *daily_sales
            .entry(config.business_date(sale.created_at))
            .or_default() += sale.total_amount;

        for item in &sale.items {
            let row = products
                .entry(item.product_id.as_str())
                .or_insert_with(|| ProductPerformance {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    quantity_sold: 0,
                    revenue: Money::zero(),
                    sell_through: None,
                    opening_stock: None,
                    remaining_stock: None,
                });
            row.quantity_sold += item.quantity;
            row.revenue += item.line_total;
        }
    }

    let mut product_performance: Vec<ProductPerformance> = products
        .into_values()
        .map(|mut row| {
            if let Some(position) = stock.and_then(|s| s.get(&row.product_id)) {
                row.sell_through = Some(Percentage::of_counts(row.quantity_sold, position.opening));
                row.opening_stock = Some(position.opening);
                row.remaining_stock = Some(position.remaining);
            }
            row
        })
        .collect();
    product_performance.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    let mut expenses_by_category: BTreeMap<String, Money> = BTreeMap::new();
    for expense in &expenses {
        *expenses_by_category
            .entry(expense.category.trim().to_string())
            .or_default() += expense.amount;
    }
    let expenses_total: Money = expenses.iter().map(|e| e.amount).sum();

    let cost_of_goods_sold = gross_revenue.apply_rate(config.cogs_ratio.bps());
    let gross_profit = gross_revenue - cost_of_goods_sold;
    let net_profit = gross_profit - expenses_total;

    let highlights = ReportHighlights {
        best_selling_product: product_performance
            .iter()
            .max_by(|a, b| {
                a.quantity_sold
                    .cmp(&b.quantity_sold)
                    .then_with(|| a.revenue.cmp(&b.revenue))
                    .then_with(|| b.product_id.cmp(&a.product_id))
            })
            .map(|p| p.product_name.clone()),
        busiest_day: daily_sales
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(day, _)| *day),
        predominant_payment_method: payment_breakdown
            .iter()
            .filter(|(_, amount)| amount.is_positive())
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(method, _)| *method),
    };

    Ok(ClosureReport {
        duration_days: scope.period.days(),
        scope,
        currency: config.currency.clone(),
        cogs_ratio: config.cogs_ratio,
        totals: SalesTotals {
            gross_revenue,
            total_transactions,
            avg_transaction_value: gross_revenue.div_round(total_transactions as i64),
            payment_breakdown,
        },
        subtotal_total: sales.iter().map(|s| s.subtotal).sum(),
        tax_collected: sales.iter().map(|s| s.tax).sum(),
        total_quantity_sold: sales.iter().map(|s| s.total_quantity()).sum(),
        cost_of_goods_sold,
        gross_profit,
        expenses_total,
        expenses_by_category,
        expenses: expenses.into_iter().cloned().collect(),
        net_profit,
        profit_margin: Percentage::of(net_profit, gross_revenue),
        product_performance,
        daily_sales,
        transactions: sales.iter().map(|s| TransactionSummary::of(s)).collect(),
        highlights,
        closed: false,
        closed_at: None,
    })
}

// =============================================================================
// Closure Ledger
// =============================================================================

/// Tracks which scopes have been closed and holds their locked reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClosureLedger {
    locked: BTreeMap<ReportScope, ClosureReport>,
}

impl ClosureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a report unless `scope` is already closed.
    pub fn build_report(
        &self,
        sales: &[Sale],
        expenses: &[Expense],
        scope: ReportScope,
        config: &PosConfig,
        stock: Option<&StockPositions>,
    ) -> CoreResult<ClosureReport> {
        if self.is_closed(&scope) {
            return Err(CoreError::AlreadyClosed { scope });
        }
        build_report(sales, expenses, scope, config, stock)
    }

    /// Locks `report`. One way: a scope closes exactly once.
    ///
    /// ## Errors
    /// - `AlreadyClosed` if the report or its scope is already closed
    /// - `ConfirmationMismatch` if `confirmation` does not describe `report`
    pub fn close(
        &mut self,
        mut report: ClosureReport,
        confirmation: &ClosureConfirmation,
        now: DateTime<Utc>,
    ) -> CoreResult<ClosureReport> {
        if report.closed || self.is_closed(&report.scope) {
            return Err(CoreError::AlreadyClosed {
                scope: report.scope,
            });
        }

        if report.confirmation() != *confirmation {
            return Err(CoreError::ConfirmationMismatch {
                scope: report.scope,
            });
        }

        report.closed = true;
        report.closed_at = Some(now);
        self.locked.insert(report.scope.clone(), report.clone());
        Ok(report)
    }

    /// The locked report for `scope`, if it has been closed.
    pub fn locked(&self, scope: &ReportScope) -> Option<&ClosureReport> {
        self.locked.get(scope)
    }

    pub fn is_closed(&self, scope: &ReportScope) -> bool {
        self.locked.contains_key(scope)
    }

    pub fn closed_scopes(&self) -> impl Iterator<Item = &ReportScope> {
        self.locked.keys()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::types::{CustomerInfo, Payment, SaleItem, TaxRate};
    use chrono::TimeZone;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn config() -> PosConfig {
        PosConfig {
            tax_rate: TaxRate::from_bps(500),
            cogs_ratio: CogsRatio::from_bps(5500),
            ..PosConfig::default()
        }
    }

    fn item(id: &str, price_cents: i64, quantity: i64) -> SaleItem {
        SaleItem {
            product_id: id.to_string(),
            product_name: format!("Product {}", id),
            unit_price: Money::from_cents(price_cents),
            quantity,
            line_total: Money::from_cents(price_cents * quantity),
        }
    }

    fn sale(
        number: &str,
        day: u32,
        hour: u32,
        items: Vec<SaleItem>,
        payments: Vec<(PaymentMethod, i64)>,
    ) -> Sale {
        let subtotal: Money = items.iter().map(|i| i.line_total).sum();
        let total: Money = payments.iter().map(|(_, c)| Money::from_cents(*c)).sum();
        Sale {
            sale_number: number.to_string(),
            exhibition_id: "expo-1".to_string(),
            items,
            payments: payments
                .into_iter()
                .map(|(method, cents)| Payment {
                    method,
                    amount: Money::from_cents(cents),
                    tendered: Money::from_cents(cents),
                })
                .collect(),
            subtotal,
            tax: total - subtotal,
            total_amount: total,
            amount_tendered: total,
            change_given: Money::zero(),
            customer: None,
            cashier_id: "cashier-1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 9, day, hour, 0, 0).unwrap(),
        }
    }

    fn expense(category: &str, cents: i64, day: u32) -> Expense {
        Expense {
            category: category.to_string(),
            amount: Money::from_cents(cents),
            date: date(day),
            note: None,
            exhibition_id: None,
        }
    }

    /// Three sales on 29 Sep totalling AED 741.25.
    fn day_sales() -> Vec<Sale> {
        vec![
            sale("S1", 29, 10, vec![item("oud", 30000, 1)], vec![(PaymentMethod::Cash, 31500)]),
            sale(
                "S2",
                29,
                12,
                vec![item("musk", 8500, 2), item("amber", 6000, 1)],
                vec![(PaymentMethod::Card, 15000), (PaymentMethod::Cash, 9675)],
            ),
            sale("S3", 29, 16, vec![item("musk", 8500, 2)], vec![(PaymentMethod::Card, 17950)]),
        ]
    }

    #[test]
    fn test_day_report_figures() {
        let scope = ReportScope::day("expo-1", date(29));
        let expenses = vec![expense("Staff", 20000, 29), expense("Transport", 5000, 29)];

        let report = build_report(&day_sales(), &expenses, scope, &config(), None).unwrap();

        assert_eq!(report.totals.gross_revenue.cents(), 74125);
        assert_eq!(report.totals.total_transactions, 3);
        assert_eq!(report.totals.avg_transaction_value.cents(), 24708);
        assert_eq!(report.cost_of_goods_sold.cents(), 40769);
        assert_eq!(report.gross_profit.cents(), 33356);
        assert_eq!(report.expenses_total.cents(), 25000);
        assert_eq!(report.net_profit.cents(), 8356);
        assert_eq!(report.profit_margin.bps(), 1127);
        assert_eq!(report.total_quantity_sold, 6);
        assert_eq!(report.duration_days, 1);
        assert!(!report.closed);
    }

    #[test]
    fn test_payment_breakdown_sums_to_gross_revenue() {
        let scope = ReportScope::day("expo-1", date(29));
        let report = build_report(&day_sales(), &[], scope, &config(), None).unwrap();

        let breakdown = &report.totals.payment_breakdown;
        assert_eq!(breakdown[&PaymentMethod::Cash].cents(), 41175);
        assert_eq!(breakdown[&PaymentMethod::Card].cents(), 32950);
        let sum: Money = breakdown.values().sum();
        assert_eq!(sum, report.totals.gross_revenue);
    }

    #[test]
    fn test_empty_day_has_no_division_by_zero() {
        let scope = ReportScope::day("expo-1", date(29));
        let report = build_report(&[], &[], scope, &config(), None).unwrap();

        assert_eq!(report.totals.gross_revenue, Money::zero());
        assert_eq!(report.totals.avg_transaction_value, Money::zero());
        assert_eq!(report.profit_margin, Percentage::zero());
        assert!(report.totals.payment_breakdown.is_empty());
        assert_eq!(report.highlights, ReportHighlights::default());
    }

    #[test]
    fn test_expenses_without_sales_give_negative_net() {
        let scope = ReportScope::day("expo-1", date(29));
        let report = build_report(&[], &[expense("Booth", 50000, 29)], scope, &config(), None).unwrap();

        assert_eq!(report.net_profit.cents(), -50000);
        assert_eq!(report.profit_margin, Percentage::zero());
    }

    #[test]
    fn test_scope_filters_sales_and_expenses() {
        let mut sales = day_sales();
        sales.push(sale("S4", 30, 11, vec![item("oud", 30000, 1)], vec![(PaymentMethod::Cash, 31500)]));
        let mut other_expo = sale("S5", 29, 11, vec![item("oud", 30000, 1)], vec![(PaymentMethod::Cash, 31500)]);
        other_expo.exhibition_id = "expo-2".to_string();
        sales.push(other_expo);

        let mut tagged = expense("Booth", 10000, 29);
        tagged.exhibition_id = Some("expo-2".to_string());
        let expenses = vec![expense("Staff", 20000, 29), expense("Staff", 20000, 30), tagged];

        let report = build_report(&sales, &expenses, ReportScope::day("expo-1", date(29)), &config(), None).unwrap();

        assert_eq!(report.totals.total_transactions, 3);
        assert_eq!(report.expenses_total.cents(), 20000);
    }

    #[test]
    fn test_business_day_follows_utc_offset() {
        // 21:30 UTC on the 28th is 01:30 on the 29th in Dubai.
        let mut late = sale("S1", 28, 21, vec![item("oud", 30000, 1)], vec![(PaymentMethod::Cash, 31500)]);
        late.created_at = Utc.with_ymd_and_hms(2024, 9, 28, 21, 30, 0).unwrap();
        let dubai = PosConfig {
            utc_offset_minutes: 240,
            ..config()
        };

        let report = build_report(&[late], &[], ReportScope::day("expo-1", date(29)), &dubai, None).unwrap();
        assert_eq!(report.totals.total_transactions, 1);
        assert_eq!(report.daily_sales.keys().copied().collect::<Vec<_>>(), vec![date(29)]);
    }

    #[test]
    fn test_product_performance_ordering_and_stock_positions() {
        let mut stock = StockPositions::new();
        stock.insert("musk".to_string(), StockPosition { opening: 40, remaining: 36 });
        stock.insert("oud".to_string(), StockPosition { opening: 0, remaining: 0 });

        let scope = ReportScope::day("expo-1", date(29));
        let report = build_report(&day_sales(), &[], scope, &config(), Some(&stock)).unwrap();

        let ids: Vec<_> = report.product_performance.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["musk", "oud", "amber"]);

        let musk = &report.product_performance[0];
        assert_eq!(musk.quantity_sold, 4);
        assert_eq!(musk.revenue.cents(), 34000);
        assert_eq!(musk.sell_through, Some(Percentage::from_bps(1000)));
        assert_eq!(musk.opening_stock, Some(40));
        assert_eq!(musk.remaining_stock, Some(36));

        assert_eq!(report.product_performance[1].sell_through, Some(Percentage::zero()));

        let amber = &report.product_performance[2];
        assert_eq!(amber.sell_through, None);
        assert_eq!(amber.opening_stock, None);
        assert_eq!(amber.remaining_stock, None);
    }

    #[test]
    fn test_transactions_listed_oldest_first() {
        let mut sales = day_sales();
        sales.reverse();
        sales[0].customer = Some(CustomerInfo {
            name: Some("Fatima Al Zahra".to_string()),
            ..CustomerInfo::default()
        });
        // Same instant as S1: ordered by sale number.
        let mut twin = sale("S0", 29, 10, vec![item("amber", 6000, 1)], vec![(PaymentMethod::Card, 6300)]);
        twin.created_at = sales[2].created_at;
        sales.push(twin);

        let report = build_report(&sales, &[], ReportScope::day("expo-1", date(29)), &config(), None).unwrap();

        let numbers: Vec<_> = report.transactions.iter().map(|t| t.sale_number.as_str()).collect();
        assert_eq!(numbers, vec!["S0", "S1", "S2", "S3"]);

        let s2 = &report.transactions[2];
        assert_eq!(s2.total_amount.cents(), 24675);
        assert_eq!(s2.total_quantity, 3);
        assert_eq!(s2.payment_methods, vec![PaymentMethod::Card, PaymentMethod::Cash]);
        assert_eq!(s2.customer_name, None);
        assert_eq!(report.transactions[3].customer_name.as_deref(), Some("Fatima Al Zahra"));
    }

    #[test]
    fn test_expenses_itemized_by_date() {
        let mut booth = expense("Booth", 50000, 30);
        booth.note = Some("Hall B corner stand".to_string());
        let expenses = vec![booth.clone(), expense("Staff", 20000, 28), expense("Staff", 1000, 2)];

        let scope = ReportScope::run("expo-1", date(27), date(30));
        let report = build_report(&[], &expenses, scope, &config(), None).unwrap();

        assert_eq!(report.expenses, vec![expense("Staff", 20000, 28), booth]);
        assert_eq!(report.expenses_total.cents(), 70000);
    }

    #[test]
    fn test_invalid_expense_in_scope_is_rejected() {
        let scope = ReportScope::day("expo-1", date(29));

        let err = build_report(&[], &[expense("Staff", -500, 29)], scope.clone(), &config(), None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::MustNotBeNegative { .. })));

        let err = build_report(&[], &[expense("  ", 500, 29)], scope.clone(), &config(), None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));

        // Out of scope: never looked at.
        assert!(build_report(&[], &[expense("Staff", -500, 30)], scope, &config(), None).is_ok());
    }

    #[test]
    fn test_expenses_grouped_by_category() {
        let expenses = vec![
            expense("Staff", 20000, 29),
            expense(" Staff ", 5000, 29),
            expense("Transport", 5000, 29),
        ];
        let report = build_report(&[], &expenses, ReportScope::day("expo-1", date(29)), &config(), None).unwrap();

        assert_eq!(report.expenses_by_category["Staff"].cents(), 25000);
        assert_eq!(report.expenses_by_category["Transport"].cents(), 5000);
    }

    #[test]
    fn test_exhibition_run_report() {
        let mut sales = day_sales();
        sales.push(sale("S4", 30, 11, vec![item("oud", 30000, 3)], vec![(PaymentMethod::BankTransfer, 94500)]));

        let scope = ReportScope::run("expo-1", date(27), date(30));
        let report = build_report(&sales, &[], scope, &config(), None).unwrap();

        assert_eq!(report.duration_days, 4);
        assert_eq!(report.daily_sales.len(), 2);
        assert_eq!(report.highlights.busiest_day, Some(date(30)));
        assert_eq!(report.highlights.best_selling_product.as_deref(), Some("Product oud"));
        assert_eq!(report.highlights.predominant_payment_method, Some(PaymentMethod::BankTransfer));
    }

    #[test]
    fn test_highlight_ties_are_deterministic() {
        let sales = vec![
            sale("S1", 29, 10, vec![item("b", 1000, 1)], vec![(PaymentMethod::Card, 1000)]),
            sale("S2", 30, 10, vec![item("a", 1000, 1)], vec![(PaymentMethod::Cash, 1000)]),
        ];
        let scope = ReportScope::run("expo-1", date(29), date(30));
        let report = build_report(&sales, &[], scope, &config(), None).unwrap();

        assert_eq!(report.highlights.best_selling_product.as_deref(), Some("Product a"));
        assert_eq!(report.highlights.busiest_day, Some(date(29)));
        assert_eq!(report.highlights.predominant_payment_method, Some(PaymentMethod::Cash));
    }

    #[test]
    fn test_build_report_is_idempotent() {
        let scope = ReportScope::day("expo-1", date(29));
        let expenses = vec![expense("Staff", 20000, 29)];
        let first = build_report(&day_sales(), &expenses, scope.clone(), &config(), None).unwrap();
        let second = build_report(&day_sales(), &expenses, scope, &config(), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_close_is_one_way() {
        let scope = ReportScope::day("expo-1", date(29));
        let mut ledger = ClosureLedger::new();
        let report = ledger
            .build_report(&day_sales(), &[], scope.clone(), &config(), None)
            .unwrap();
        let confirmation = report.confirmation();
        let now = Utc.with_ymd_and_hms(2024, 9, 29, 20, 0, 0).unwrap();

        let closed = ledger.close(report.clone(), &confirmation, now).unwrap();
        assert!(closed.closed);
        assert_eq!(closed.closed_at, Some(now));
        assert_eq!(ledger.locked(&scope), Some(&closed));

        assert_eq!(
            ledger.close(report, &confirmation, now),
            Err(CoreError::AlreadyClosed { scope: scope.clone() })
        );
        assert_eq!(
            ledger.build_report(&[], &[], scope.clone(), &config(), None),
            Err(CoreError::AlreadyClosed { scope: scope.clone() })
        );
        assert_eq!(ledger.locked(&scope).unwrap().totals.total_transactions, 3);
    }

    #[test]
    fn test_closed_report_refuses_recompute() {
        let scope = ReportScope::day("expo-1", date(29));
        let mut ledger = ClosureLedger::new();
        let report = build_report(&day_sales(), &[], scope.clone(), &config(), None).unwrap();
        let confirmation = report.confirmation();
        let mut closed = ledger.close(report, &confirmation, Utc::now()).unwrap();

        let err = closed.recompute(&[], &[], &config(), None).unwrap_err();
        assert_eq!(err, CoreError::AlreadyClosed { scope });
        assert_eq!(closed.totals.total_transactions, 3);
    }

    #[test]
    fn test_open_report_recomputes() {
        let scope = ReportScope::day("expo-1", date(29));
        let mut report = build_report(&[], &[], scope, &config(), None).unwrap();

        report.recompute(&day_sales(), &[], &config(), None).unwrap();
        assert_eq!(report.totals.gross_revenue.cents(), 74125);
    }

    #[test]
    fn test_close_requires_matching_confirmation() {
        let scope = ReportScope::day("expo-1", date(29));
        let mut ledger = ClosureLedger::new();
        let report = build_report(&day_sales(), &[], scope.clone(), &config(), None).unwrap();

        let stale = build_report(&[], &[], scope.clone(), &config(), None).unwrap().confirmation();
        assert_eq!(
            ledger.close(report, &stale, Utc::now()),
            Err(CoreError::ConfirmationMismatch { scope: scope.clone() })
        );
        assert!(!ledger.is_closed(&scope));
    }

    #[test]
    fn test_closing_one_day_leaves_others_open() {
        let mut ledger = ClosureLedger::new();
        let report = build_report(&day_sales(), &[], ReportScope::day("expo-1", date(29)), &config(), None).unwrap();
        let confirmation = report.confirmation();
        ledger.close(report, &confirmation, Utc::now()).unwrap();

        assert!(ledger
            .build_report(&[], &[], ReportScope::day("expo-1", date(30)), &config(), None)
            .is_ok());
        assert!(ledger
            .build_report(&[], &[], ReportScope::run("expo-1", date(26), date(30)), &config(), None)
            .is_ok());
        assert_eq!(ledger.closed_scopes().count(), 1);
    }

    #[test]
    fn test_confirmation_text() {
        let report = build_report(&day_sales(), &[], ReportScope::day("expo-1", date(29)), &config(), None).unwrap();
        let text = report.confirmation().render(&report.currency);
        assert!(text.contains("AED 741.25"));
        assert!(text.contains("3 transactions"));
    }
}
