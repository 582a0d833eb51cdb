//! Error taxonomy for the checkout completion core.
//!
//! Internal domain failures (`InsufficientStock`, voucher/gift-card rejections,
//! tax and payment errors) are translated into a single field-coded
//! [`ValidationFailure`] shape at the orchestrator boundary; the internal
//! variants never leak past it.

use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use uuid::Uuid;

/// Machine-readable error codes surfaced to callers of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutErrorCode {
    ChannelInactive,
    CheckoutNotFullyPaid,
    VoucherNotApplicable,
    GiftCardNotApplicable,
    TaxError,
    PaymentError,
    InactivePayment,
    InsufficientStock,
    InvalidRedirectUrl,
    ShippingMethodNotSet,
    ShippingAddressNotSet,
    BillingAddressNotSet,
    EmailNotSet,
    InvalidShippingMethod,
    NotFound,
}

/// A field-scoped, coded failure — the only error shape the orchestrator
/// exposes to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// The checkout field the failure is attributed to ("id", "voucher_code",
    /// "redirect_url", ...).
    pub field: String,
    pub code: CheckoutErrorCode,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, code: CheckoutErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.code.as_ref(), self.message)
    }
}

/// Per-variant shortfall carried by an insufficient-stock failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub variant_id: Uuid,
    pub checkout_line_id: Option<Uuid>,
    pub requested: i32,
    pub available: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Insufficient stock for {} variant(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Voucher not applicable: {0}")]
    VoucherNotApplicable(String),

    #[error("Gift card not applicable: {message}")]
    GiftCardNotApplicable { message: String, code: String },

    #[error("Unable to calculate taxes: {0}")]
    TaxError(String),

    #[error("Payment error: {0}")]
    PaymentError(String),

    #[error("{0}")]
    Validation(ValidationFailure),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Event error: {0}")]
    EventError(String),
}

impl CheckoutError {
    /// Translates an internal domain failure into the field-coded validation
    /// shape. This is the single boundary translation applied before any
    /// error reaches a caller of the orchestrator.
    pub fn into_validation(self) -> CheckoutError {
        let failure = match self {
            CheckoutError::InsufficientStock(ref items) => ValidationFailure::new(
                "lines",
                CheckoutErrorCode::InsufficientStock,
                describe_shortfalls(items),
            ),
            CheckoutError::VoucherNotApplicable(ref msg) => ValidationFailure::new(
                "voucher_code",
                CheckoutErrorCode::VoucherNotApplicable,
                msg.clone(),
            ),
            CheckoutError::GiftCardNotApplicable { ref message, .. } => ValidationFailure::new(
                "gift_cards",
                CheckoutErrorCode::GiftCardNotApplicable,
                message.clone(),
            ),
            CheckoutError::TaxError(ref msg) => ValidationFailure::new(
                "id",
                CheckoutErrorCode::TaxError,
                format!("Unable to calculate taxes - {msg}"),
            ),
            CheckoutError::PaymentError(ref msg) => {
                ValidationFailure::new("payment", CheckoutErrorCode::PaymentError, msg.clone())
            }
            other => return other,
        };
        CheckoutError::Validation(failure)
    }

    pub fn validation(
        field: impl Into<String>,
        code: CheckoutErrorCode,
        message: impl Into<String>,
    ) -> Self {
        CheckoutError::Validation(ValidationFailure::new(field, code, message))
    }
}

fn describe_shortfalls(items: &[StockShortfall]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "variant {}: requested {}, available {}",
                item.variant_id, item.requested, item.available
            )
        })
        .collect();
    format!("Insufficient product stock: {}", parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_translates_to_lines_field() {
        let err = CheckoutError::InsufficientStock(vec![StockShortfall {
            variant_id: Uuid::nil(),
            checkout_line_id: None,
            requested: 3,
            available: 2,
        }]);
        match err.into_validation() {
            CheckoutError::Validation(failure) => {
                assert_eq!(failure.field, "lines");
                assert_eq!(failure.code, CheckoutErrorCode::InsufficientStock);
                assert!(failure.message.contains("requested 3, available 2"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn tax_error_keeps_original_message() {
        let err = CheckoutError::TaxError("gateway timeout".into());
        match err.into_validation() {
            CheckoutError::Validation(failure) => {
                assert_eq!(failure.code, CheckoutErrorCode::TaxError);
                assert_eq!(failure.message, "Unable to calculate taxes - gateway timeout");
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn existing_validation_passes_through_unchanged() {
        let err = CheckoutError::validation(
            "id",
            CheckoutErrorCode::CheckoutNotFullyPaid,
            "The authorized amount doesn't cover the checkout's total amount.",
        );
        match err.into_validation() {
            CheckoutError::Validation(failure) => {
                assert_eq!(failure.code, CheckoutErrorCode::CheckoutNotFullyPaid)
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
