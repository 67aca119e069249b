//! # Domain Types
//!
//! Core domain types shared by the cart, checkout and closure engines.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ StockSnapshot   │   │      Sale       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  sale_number    │   │  method         │       │
//! │  │  unit_price     │   │  items[]        │   │  amount         │       │
//! │  │  remaining_qty  │   │  payments[]     │   │  tendered       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │  ReportScope    │   │ PaymentMethod   │       │
//! │  │    CogsRatio    │   │  exhibition_id  │   │  Cash  Card     │       │
//! │  │  (basis points) │   │  Day | Run      │   │  BankTransfer   │       │
//! │  └─────────────────┘   └─────────────────┘   │  DigitalWallet  │       │
//! │                                              │  Mobile         │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inventory snapshots, sales and expenses are owned by the backend. The core
//! only reads them, except for [`Sale`], which it builds at checkout and hands
//! straight to the sales service.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{DEFAULT_COGS_RATIO_BPS, DEFAULT_TAX_RATE_BPS};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (500 = 5% UAE VAT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (config files, env vars).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// COGS Ratio
// =============================================================================

/// Estimated cost of goods sold as a share of gross revenue, in basis points.
///
/// This is an approximation. The backend keeps no per-unit cost ledger, so
/// closure reports estimate COGS as `gross_revenue × ratio` until real cost
/// data exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CogsRatio(u32);

impl CogsRatio {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        CogsRatio(bps)
    }

    pub fn from_percentage(pct: f64) -> Self {
        CogsRatio((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl Default for CogsRatio {
    fn default() -> Self {
        CogsRatio(DEFAULT_COGS_RATIO_BPS)
    }
}

// =============================================================================
// Currency
// =============================================================================

/// Display currency. Swapping it changes labels only; amounts are never
/// converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Currency {
    /// ISO 4217 code.
    pub code: String,
    /// Symbol for compact display.
    pub symbol: String,
}

impl Currency {
    pub fn aed() -> Self {
        Currency {
            code: "AED".to_string(),
            symbol: "د.إ".to_string(),
        }
    }

    pub fn qar() -> Self {
        Currency {
            code: "QAR".to_string(),
            symbol: "ر.ق".to_string(),
        }
    }

    /// Looks up one of the supported display currencies by code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "AED" => Some(Currency::aed()),
            "QAR" => Some(Currency::qar()),
            _ => None,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::aed()
    }
}

// =============================================================================
// POS Configuration Context
// =============================================================================

/// Explicit context handed to the checkout and closure engines.
///
/// Nothing in the core reads settings from anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PosConfig {
    pub currency: Currency,
    pub tax_rate: TaxRate,
    pub cogs_ratio: CogsRatio,
    /// Offset of the exhibition's local time from UTC, in minutes.
    /// A sale belongs to the business day of `created_at + offset`.
    pub utc_offset_minutes: i32,
}

impl PosConfig {
    /// Business day a UTC timestamp falls on at this exhibition.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        (at + Duration::minutes(self.utc_offset_minutes as i64)).date_naive()
    }

    /// Human-readable amount in this config's currency.
    pub fn format_money(&self, amount: Money) -> String {
        amount.format(&self.currency)
    }
}

// =============================================================================
// Inventory Snapshot
// =============================================================================

/// Stock available for one product at one exhibition, as of the moment it
/// was fetched. Owned by the inventory service; never cached past the
/// operation that fetched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSnapshot {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub remaining_quantity: i64,
}

/// Finds the snapshot for a product in a freshly fetched availability list.
pub fn find_snapshot<'a>(snapshots: &'a [StockSnapshot], product_id: &str) -> Option<&'a StockSnapshot> {
    snapshots.iter().find(|s| s.product_id == product_id)
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    DigitalWallet,
    Mobile,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::BankTransfer,
        PaymentMethod::DigitalWallet,
        PaymentMethod::Mobile,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::DigitalWallet => "digital_wallet",
            PaymentMethod::Mobile => "mobile",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "digital_wallet" => Ok(PaymentMethod::DigitalWallet),
            "mobile" => Ok(PaymentMethod::Mobile),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Optional customer details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl CustomerInfo {
    /// Trims every field and turns blank ones into `None`.
    pub fn normalized(self) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        CustomerInfo {
            name: clean(self.name),
            phone: clean(self.phone),
            email: clean(self.email),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.email.is_none()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sold line. Product data is frozen at the time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i64,
    /// `unit_price × quantity`, before tax.
    pub line_total: Money,
}

/// One tender toward a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub method: PaymentMethod,
    /// Portion applied to the sale total (change already deducted).
    pub amount: Money,
    /// What the customer handed over for this tender.
    pub tendered: Money,
}

/// A finalized sale. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub sale_number: String,
    pub exhibition_id: String,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub subtotal: Money,
    pub tax: Money,
    pub total_amount: Money,
    pub amount_tendered: Money,
    pub change_given: Money,
    pub customer: Option<CustomerInfo>,
    pub cashier_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Units sold across every line.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Business day this sale belongs to, given the exhibition's UTC offset.
    pub fn business_date(&self, utc_offset_minutes: i32) -> NaiveDate {
        (self.created_at + Duration::minutes(utc_offset_minutes as i64)).date_naive()
    }
}

// =============================================================================
// Expense
// =============================================================================

/// An expense recorded in the external ledger (venue rental, staff wages...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub category: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub note: Option<String>,
    /// Exhibition the expense was booked against, when the ledger tracks it.
    pub exhibition_id: Option<String>,
}

// =============================================================================
// Report Scope
// =============================================================================

/// The period a closure report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportPeriod {
    /// One calendar (business) day: day-end register close.
    Day {
        #[ts(as = "String")]
        date: NaiveDate,
    },
    /// An exhibition's whole run, both ends inclusive.
    Run {
        #[ts(as = "String")]
        start: NaiveDate,
        #[ts(as = "String")]
        end: NaiveDate,
    },
}

impl ReportPeriod {
    /// First day of the period.
    pub fn start(&self) -> NaiveDate {
        match *self {
            ReportPeriod::Day { date } => date,
            ReportPeriod::Run { start, .. } => start,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            ReportPeriod::Day { date: day } => date == day,
            ReportPeriod::Run { start, end } => start <= date && date <= end,
        }
    }

    /// Length of the period in days, counting both ends.
    ///
    /// A run from 26 to 30 September is 5 selling days, one more than the
    /// difference between the two dates. Every day a sale can fall on
    /// (see [`ReportPeriod::contains`]) is counted.
    pub fn days(&self) -> i64 {
        match *self {
            ReportPeriod::Day { .. } => 1,
            ReportPeriod::Run { start, end } => (end - start).num_days().abs() + 1,
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportPeriod::Day { date } => write!(f, "{}", date),
            ReportPeriod::Run { start, end } => write!(f, "{}..{}", start, end),
        }
    }
}

/// Which exhibition and period a report covers. Also the key a closure is
/// locked under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportScope {
    pub exhibition_id: String,
    pub period: ReportPeriod,
}

impl ReportScope {
    pub fn day(exhibition_id: impl Into<String>, date: NaiveDate) -> Self {
        ReportScope {
            exhibition_id: exhibition_id.into(),
            period: ReportPeriod::Day { date },
        }
    }

    pub fn run(exhibition_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        ReportScope {
            exhibition_id: exhibition_id.into(),
            period: ReportPeriod::Run { start, end },
        }
    }

    pub fn covers_sale(&self, sale: &Sale, config: &PosConfig) -> bool {
        sale.exhibition_id == self.exhibition_id
            && self.period.contains(config.business_date(sale.created_at))
    }

    pub fn covers_expense(&self, expense: &Expense) -> bool {
        let same_exhibition = expense
            .exhibition_id
            .as_deref()
            .map_or(true, |id| id == self.exhibition_id);
        same_exhibition && self.period.contains(expense.date)
    }
}

impl fmt::Display for ReportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.exhibition_id, self.period)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
