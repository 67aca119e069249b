//! # Checkout Service
//!
//! One cashier, one cart, one exhibition.
//!
//! ## Finalize Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       finalize(customer)                                │
//! │                                                                         │
//! │  in-flight? ──yes──► Busy                                               │
//! │      │ no                                                               │
//! │      ▼                                                                  │
//! │  InventoryService::availability ──err──► StockCheckFailed               │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  Checkout::prepare_sale ──err──► EmptyCart / InsufficientPayment /      │
//! │      │                           InsufficientStock   (cart intact)      │
//! │      ▼                                                                  │
//! │  SalesService::create_sale ──err──► PersistenceFailed (cart intact)     │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  clear checkout, return Receipt                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The checkout lock is held across the whole sequence, so cart edits wait
//! until finalize has either committed or failed.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use expo_core::cart::{CartLine, CartTotals};
use expo_core::checkout::{Checkout, PaymentAllocation, SaleContext, SaleNumber};
use expo_core::money::Money;
use expo_core::types::{find_snapshot, CustomerInfo, PaymentMethod, PosConfig, Sale, StockSnapshot};
use expo_core::validation::validate_id;
use expo_core::CoreError;

use crate::error::{ServiceError, ServiceResult};
use crate::ports::{InventoryService, SalesService};

/// What the cart and tender screens render after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub payments: Vec<PaymentAllocation>,
    pub total_tendered: Money,
    pub remaining_due: Money,
    pub change: Money,
    pub customer: Option<CustomerInfo>,
}

impl CartView {
    fn of(checkout: &Checkout) -> Self {
        CartView {
            lines: checkout.cart().lines().to_vec(),
            totals: checkout.totals(),
            payments: checkout.payments().to_vec(),
            total_tendered: checkout.total_tendered(),
            remaining_due: checkout.remaining_due(),
            change: checkout.compute_change(),
            customer: checkout.customer().cloned(),
        }
    }
}

/// A completed sale as stored by the sales service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub sale: Sale,
    pub change: Money,
    /// Change formatted for the cashier display.
    pub change_display: String,
}

/// Clears the in-flight flag however finalize exits.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CheckoutService {
    exhibition_id: String,
    cashier_id: String,
    config: PosConfig,
    inventory: Arc<dyn InventoryService>,
    sales: Arc<dyn SalesService>,
    checkout: Mutex<Checkout>,
    finalizing: AtomicBool,
}

impl CheckoutService {
    pub fn new(
        exhibition_id: impl Into<String>,
        cashier_id: impl Into<String>,
        config: PosConfig,
        inventory: Arc<dyn InventoryService>,
        sales: Arc<dyn SalesService>,
    ) -> ServiceResult<Self> {
        let exhibition_id = exhibition_id.into();
        let cashier_id = cashier_id.into();
        validate_id("exhibition_id", &exhibition_id)?;
        validate_id("cashier_id", &cashier_id)?;

        Ok(CheckoutService {
            exhibition_id,
            cashier_id,
            checkout: Mutex::new(Checkout::new(config.tax_rate)),
            config,
            inventory,
            sales,
            finalizing: AtomicBool::new(false),
        })
    }

    pub fn exhibition_id(&self) -> &str {
        &self.exhibition_id
    }

    pub async fn view(&self) -> CartView {
        CartView::of(&*self.checkout.lock().await)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Adds one unit, checked against freshly fetched stock.
    pub async fn add_item(&self, product_id: &str) -> ServiceResult<CartView> {
        let snapshot = self.fresh_snapshot(product_id).await?;

        let mut checkout = self.checkout.lock().await;
        let line = checkout.add_item(&snapshot)?;
        debug!(
            product_id = %line.product_id,
            quantity = line.quantity,
            remaining = snapshot.remaining_quantity,
            "Item added to cart"
        );
        Ok(CartView::of(&checkout))
    }

    /// Sets a line quantity. Zero or less removes the line without a stock
    /// lookup.
    ///
    /// A product with no line is refused before inventory is asked. A line
    /// whose product has vanished from inventory has no stock left.
    pub async fn set_quantity(&self, product_id: &str, quantity: i64) -> ServiceResult<CartView> {
        if quantity <= 0 {
            return Ok(self.remove_item(product_id).await);
        }

        if self.checkout.lock().await.cart().line(product_id).is_none() {
            return Err(CoreError::ProductNotInCart(product_id.to_string()).into());
        }

        let availability = self.availability().await?;

        let mut checkout = self.checkout.lock().await;
        match find_snapshot(&availability, product_id) {
            Some(snapshot) => checkout.set_quantity(product_id, quantity, snapshot)?,
            None => {
                let line = checkout
                    .cart()
                    .line(product_id)
                    .ok_or_else(|| CoreError::ProductNotInCart(product_id.to_string()))?;
                return Err(CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    product_name: line.product_name.clone(),
                    available: 0,
                    requested: quantity,
                }
                .into());
            }
        }
        debug!(product_id = %product_id, quantity, "Cart quantity set");
        Ok(CartView::of(&checkout))
    }

    pub async fn remove_item(&self, product_id: &str) -> CartView {
        let mut checkout = self.checkout.lock().await;
        checkout.remove_item(product_id);
        debug!(product_id = %product_id, "Item removed from cart");
        CartView::of(&checkout)
    }

    /// Abandons the current sale.
    pub async fn clear(&self) -> CartView {
        let mut checkout = self.checkout.lock().await;
        checkout.clear();
        debug!("Checkout cleared");
        CartView::of(&checkout)
    }

    // =========================================================================
    // Tender
    // =========================================================================

    pub async fn add_payment(&self, method: PaymentMethod, amount: Money) -> ServiceResult<CartView> {
        let mut checkout = self.checkout.lock().await;
        checkout.add_payment(method, amount)?;
        debug!(method = %method, amount = %amount, "Payment row added");
        Ok(CartView::of(&checkout))
    }

    pub async fn update_payment(
        &self,
        index: usize,
        method: PaymentMethod,
        amount: Money,
    ) -> ServiceResult<CartView> {
        let mut checkout = self.checkout.lock().await;
        checkout.update_payment(index, method, amount)?;
        Ok(CartView::of(&checkout))
    }

    pub async fn set_payment_text(&self, index: usize, text: &str) -> ServiceResult<CartView> {
        let mut checkout = self.checkout.lock().await;
        checkout.set_payment_text(index, text)?;
        Ok(CartView::of(&checkout))
    }

    pub async fn remove_payment(&self, index: usize) -> ServiceResult<CartView> {
        let mut checkout = self.checkout.lock().await;
        checkout.remove_payment(index)?;
        Ok(CartView::of(&checkout))
    }

    pub async fn set_customer(&self, customer: CustomerInfo) -> ServiceResult<CartView> {
        let mut checkout = self.checkout.lock().await;
        checkout.set_customer(customer)?;
        Ok(CartView::of(&checkout))
    }

    // =========================================================================
    // Finalize
    // =========================================================================

    /// Completes the sale.
    ///
    /// On any failure the cart, tender rows and customer are left exactly
    /// as they were. A concurrent call returns [`ServiceError::Busy`]; a
    /// call after success finds an empty cart.
    pub async fn finalize(&self, customer: Option<CustomerInfo>) -> ServiceResult<Receipt> {
        if self
            .finalizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(exhibition_id = %self.exhibition_id, "Finalize already in flight");
            return Err(ServiceError::Busy);
        }
        let _in_flight = InFlight(&self.finalizing);

        let mut checkout = self.checkout.lock().await;

        // Validate customer details on a copy; the live checkout is only
        // touched once the sale is stored.
        let mut pending = checkout.clone();
        if let Some(customer) = customer {
            pending.set_customer(customer)?;
        }
        if pending.cart().is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let availability = self.availability().await?;

        let now = Utc::now();
        let context = SaleContext {
            exhibition_id: self.exhibition_id.clone(),
            cashier_id: self.cashier_id.clone(),
            sale_number: SaleNumber::for_date(self.config.business_date(now)),
            created_at: now,
        };
        let sale = pending.prepare_sale(&availability, context)?;
        let sale_number = sale.sale_number.clone();

        let stored = self.sales.create_sale(sale).await.map_err(|e| {
            warn!(sale_number = %sale_number, error = %e, "Sales service refused sale");
            ServiceError::Core(CoreError::PersistenceFailed(e.to_string()))
        })?;

        checkout.clear();

        info!(
            sale_number = %stored.sale_number,
            exhibition_id = %stored.exhibition_id,
            total = %stored.total_amount,
            change = %stored.change_given,
            items = stored.items.len(),
            "Sale completed"
        );

        Ok(Receipt {
            change: stored.change_given,
            change_display: self.config.format_money(stored.change_given),
            sale: stored,
        })
    }

    async fn availability(&self) -> ServiceResult<Vec<StockSnapshot>> {
        self.inventory
            .availability(&self.exhibition_id)
            .await
            .map_err(ServiceError::StockCheckFailed)
    }

    /// Fresh stock for one product; unknown to inventory is `ProductNotFound`.
    async fn fresh_snapshot(&self, product_id: &str) -> ServiceResult<StockSnapshot> {
        let availability = self.availability().await?;

        find_snapshot(&availability, product_id)
            .cloned()
            .ok_or_else(|| ServiceError::ProductNotFound(product_id.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ErrorCode};
    use crate::memory::{FailureSwitches, InMemoryBackend};
    use expo_core::types::TaxRate;

    const EXPO: &str = "expo-1";

    fn snapshot(id: &str, price_cents: i64, remaining: i64) -> StockSnapshot {
        StockSnapshot {
            product_id: id.to_string(),
            product_name: format!("Product {}", id),
            unit_price: Money::from_cents(price_cents),
            remaining_quantity: remaining,
        }
    }

    async fn setup() -> (Arc<InMemoryBackend>, CheckoutService) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.put_stock(EXPO, snapshot("a", 10000, 10)).await;
        backend.put_stock(EXPO, snapshot("b", 5000, 10)).await;
        backend.put_stock(EXPO, snapshot("c", 2500, 3)).await;

        let config = PosConfig {
            tax_rate: TaxRate::from_bps(500),
            ..PosConfig::default()
        };
        let service =
            CheckoutService::new(EXPO, "cashier-1", config, backend.clone(), backend.clone()).unwrap();
        (backend, service)
    }

    async fn fill_worked_example(service: &CheckoutService) {
        service.add_item("a").await.unwrap();
        service.add_item("a").await.unwrap();
        service.add_item("b").await.unwrap();
    }

    #[tokio::test]
    async fn test_finalize_cash_sale() {
        let (backend, service) = setup().await;
        fill_worked_example(&service).await;
        let view = service.set_payment_text(0, "300").await.unwrap();
        assert_eq!(view.totals.grand_total.cents(), 26250);
        assert_eq!(view.change.cents(), 3750);

        let receipt = service.finalize(None).await.unwrap();

        assert_eq!(receipt.change.cents(), 3750);
        assert_eq!(receipt.change_display, "AED 37.50");
        assert!(receipt.sale.sale_number.starts_with("SALE-"));
        assert_eq!(backend.sales().await.len(), 1);
        assert_eq!(backend.remaining(EXPO, "a").await, Some(8));
        assert!(service.view().await.lines.is_empty());
    }

    #[tokio::test]
    async fn test_second_finalize_is_rejected() {
        let (backend, service) = setup().await;
        fill_worked_example(&service).await;
        service.set_payment_text(0, "262.50").await.unwrap();
        service.finalize(None).await.unwrap();

        let err = service.finalize(None).await.unwrap_err();
        assert_eq!(err, ServiceError::Core(CoreError::EmptyCart));
        assert_eq!(backend.sales().await.len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_payment_keeps_cart() {
        let (backend, service) = setup().await;
        fill_worked_example(&service).await;
        service.set_payment_text(0, "200").await.unwrap();

        let err = service.finalize(None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientPayment { .. })
        ));
        assert_eq!(service.view().await.totals.total_quantity, 3);
        assert!(backend.sales().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_item_stops_at_stock() {
        let (_, service) = setup().await;
        for _ in 0..3 {
            service.add_item("c").await.unwrap();
        }

        let err = service.add_item("c").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { available: 3, requested: 4, .. })
        ));
        assert_eq!(service.view().await.lines[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let (_, service) = setup().await;
        let err = service.add_item("ghost").await.unwrap_err();
        assert_eq!(err, ServiceError::ProductNotFound("ghost".to_string()));
        assert_eq!(ApiError::from(err).code, ErrorCode::NotFound);
        assert!(service.view().await.lines.is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_for_product_not_in_cart() {
        let (backend, service) = setup().await;
        backend
            .set_failures(FailureSwitches {
                inventory: true,
                ..FailureSwitches::default()
            })
            .await;

        // Refused without asking inventory, known product or not.
        for product_id in ["b", "ghost"] {
            let err = service.set_quantity(product_id, 2).await.unwrap_err();
            assert_eq!(err, ServiceError::Core(CoreError::ProductNotInCart(product_id.to_string())));
        }
    }

    #[tokio::test]
    async fn test_set_quantity_after_product_left_inventory() {
        let (_, service) = setup().await;
        service.add_item("a").await.unwrap();

        let other = Arc::new(InMemoryBackend::new());
        other.put_stock(EXPO, snapshot("b", 5000, 10)).await;
        let moved = CheckoutService {
            inventory: other,
            ..service
        };

        let err = moved.set_quantity("a", 2).await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::Core(CoreError::InsufficientStock {
                product_id: "a".to_string(),
                product_name: "Product a".to_string(),
                available: 0,
                requested: 2,
            })
        );
        assert_eq!(moved.view().await.lines[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_stock_sold_elsewhere_is_caught_at_finalize() {
        let (backend, service) = setup().await;
        fill_worked_example(&service).await;
        service.set_payment_text(0, "300").await.unwrap();

        backend.set_remaining(EXPO, "a", 1).await.unwrap();

        let err = service.finalize(None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));
        assert_eq!(service.view().await.totals.total_quantity, 3);
        assert!(backend.sales().await.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_cart() {
        let (backend, service) = setup().await;
        fill_worked_example(&service).await;
        service.set_payment_text(0, "300").await.unwrap();
        backend
            .set_failures(FailureSwitches {
                create_sale: true,
                ..FailureSwitches::default()
            })
            .await;

        let err = service.finalize(None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::PersistenceFailed(_))));

        let view = service.view().await;
        assert_eq!(view.totals.total_quantity, 3);
        assert_eq!(view.total_tendered.cents(), 30000);
        assert_eq!(backend.remaining(EXPO, "a").await, Some(10));

        backend.set_failures(FailureSwitches::default()).await;
        assert!(service.finalize(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_inventory_outage_is_not_masked() {
        let (backend, service) = setup().await;
        backend
            .set_failures(FailureSwitches {
                inventory: true,
                ..FailureSwitches::default()
            })
            .await;

        let err = service.add_item("a").await.unwrap_err();
        assert!(matches!(err, ServiceError::StockCheckFailed(_)));
        assert!(service.view().await.lines.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_finalize_is_busy() {
        let (_, service) = setup().await;
        fill_worked_example(&service).await;
        service.set_payment_text(0, "300").await.unwrap();

        // Simulate a finalize already in flight.
        service.finalizing.store(true, Ordering::Release);
        assert_eq!(service.finalize(None).await.unwrap_err(), ServiceError::Busy);

        service.finalizing.store(false, Ordering::Release);
        assert!(service.finalize(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_finalize_with_customer_and_split_tender() {
        let (backend, service) = setup().await;
        fill_worked_example(&service).await;
        service.update_payment(0, PaymentMethod::Card, Money::from_cents(20000)).await.unwrap();
        service.add_payment(PaymentMethod::Cash, Money::from_cents(10000)).await.unwrap();

        let customer = CustomerInfo {
            name: Some("Layla".to_string()),
            phone: Some("+971 55 765 4321".to_string()),
            email: None,
        };
        let receipt = service.finalize(Some(customer)).await.unwrap();

        assert_eq!(receipt.sale.customer.unwrap().name.as_deref(), Some("Layla"));
        let applied: Money = receipt.sale.payments.iter().map(|p| p.amount).sum();
        assert_eq!(applied, receipt.sale.total_amount);
        assert_eq!(backend.sales().await[0].payments.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_customer_leaves_checkout_untouched() {
        let (backend, service) = setup().await;
        fill_worked_example(&service).await;
        service.set_payment_text(0, "300").await.unwrap();

        let err = service
            .finalize(Some(CustomerInfo {
                email: Some("nope".to_string()),
                ..CustomerInfo::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));
        assert!(service.view().await.customer.is_none());
        assert!(backend.sales().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes_without_lookup() {
        let (backend, service) = setup().await;
        service.add_item("a").await.unwrap();
        backend
            .set_failures(FailureSwitches {
                inventory: true,
                ..FailureSwitches::default()
            })
            .await;

        let view = service.set_quantity("a", 0).await.unwrap();
        assert!(view.lines.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_blank_ids() {
        let backend = Arc::new(InMemoryBackend::new());
        let result = CheckoutService::new("", "cashier-1", PosConfig::default(), backend.clone(), backend);
        assert!(result.is_err());
    }
}
