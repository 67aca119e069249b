//! # Validation Module
//!
//! Input validation run at the edge of every cart, checkout and closure
//! operation, before business rules.
//!
//! ## Usage
//! ```rust
//! use expo_core::validation::{validate_quantity, validate_email};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_email("fatima@example.ae").is_ok());
//! ```

use crate::error::ValidationError;
use crate::money::{Money, BPS_PER_UNIT};
use crate::{MAX_AMOUNT_CENTS, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_ID_LEN: usize = 64;

// =============================================================================
// Identifiers and Text
// =============================================================================

/// Validates a backend identifier (product, exhibition, cashier).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates an expense category label.
pub fn validate_expense_category(category: &str) -> ValidationResult<()> {
    if category.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "category".to_string(),
        });
    }
    Ok(())
}

/// Validates a customer email address.
///
/// ## Rules
/// - exactly one `@` with text on both sides
/// - the domain contains a dot that is neither first nor last
/// - no whitespace
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(l), Some(d), None) => (l, d),
        _ => return Err(invalid("must contain a single @")),
    };

    if local.is_empty() || domain.is_empty() {
        return Err(invalid("must have text before and after @"));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(())
}

/// Validates a customer phone number.
///
/// ## Rules
/// - 6 to 20 characters
/// - digits, spaces, `+`, `-`, parentheses
/// - at least 6 digits
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.len() < 6 || phone.len() > 20 {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be 6 to 20 characters".to_string(),
        });
    }

    let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')');
    if !phone.chars().all(allowed) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, +, - and parentheses".to_string(),
        });
    }

    if phone.chars().filter(char::is_ascii_digit).count() < 6 {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain at least 6 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Non-negative and at most [`MAX_AMOUNT_CENTS`].
fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if amount.cents() > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a unit price. Zero is allowed (giveaways).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    validate_amount("price", price)
}

/// Validates a tendered amount.
///
/// Zero is allowed: an allocation row may be added before the cashier types
/// its amount.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    validate_amount("payment amount", amount)
}

/// Validates an expense amount.
pub fn validate_expense_amount(amount: Money) -> ValidationResult<()> {
    validate_amount("expense amount", amount)
}

/// Validates a rate in basis points (tax rate, COGS ratio): 0% to 100%.
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps as i64 > BPS_PER_UNIT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: BPS_PER_UNIT,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("product_id", "p-001").is_ok());
        assert!(validate_id("product_id", "").is_err());
        assert!(validate_id("product_id", "   ").is_err());
        assert!(validate_id("product_id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price(Money::zero()).is_ok());
        assert!(validate_price(Money::from_cents(-1)).is_err());
        assert!(validate_payment_amount(Money::zero()).is_ok());
        assert!(validate_payment_amount(Money::from_cents(-100)).is_err());
        assert!(validate_expense_amount(Money::from_cents(-100)).is_err());
    }

    #[test]
    fn test_amounts_are_capped() {
        let cap = Money::from_cents(MAX_AMOUNT_CENTS);
        let over = Money::from_cents(MAX_AMOUNT_CENTS + 1);

        assert!(validate_price(cap).is_ok());
        assert!(validate_payment_amount(cap).is_ok());
        assert!(validate_price(over).is_err());
        assert!(validate_expense_amount(over).is_err());
        assert_eq!(
            validate_payment_amount(over),
            Err(ValidationError::OutOfRange {
                field: "payment amount".to_string(),
                min: 0,
                max: MAX_AMOUNT_CENTS,
            })
        );
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps("tax_rate", 0).is_ok());
        assert!(validate_rate_bps("tax_rate", 500).is_ok());
        assert!(validate_rate_bps("cogs_ratio", 10000).is_ok());
        assert!(validate_rate_bps("cogs_ratio", 10001).is_err());
    }

    #[test]
    fn test_validate_expense_category() {
        assert!(validate_expense_category("Booth Rental").is_ok());
        assert!(validate_expense_category("  ").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("fatima@example.ae").is_ok());
        assert!(validate_email("a.b@mail.example.com").is_ok());

        assert!(validate_email("fatima").is_err());
        assert!(validate_email("@example.ae").is_err());
        assert!(validate_email("fatima@").is_err());
        assert!(validate_email("fatima@example").is_err());
        assert!(validate_email("fa@tima@example.ae").is_err());
        assert!(validate_email("fatima @example.ae").is_err());
        assert!(validate_email("fatima@.ae").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+971 50 123 4567").is_ok());
        assert!(validate_phone("(04) 555-0199").is_ok());

        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("call me maybe").is_err());
        assert!(validate_phone("+-() +-()").is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(99).is_ok());
        assert!(validate_cart_size(100).is_err());
    }
}
