//! Checkout Error Types

use keyshop_core::{ItemId, StoreError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Why a checkout was refused before anything was charged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("cart is empty")]
    EmptyCart,

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("item {item} has quantity {quantity}, limit is {limit}")]
    QuantityLimit { item: ItemId, quantity: u32, limit: u32 },
}

/// Checkout errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// No logged-in user
    #[error("Authentication required")]
    Unauthenticated,

    /// Another checkout is still running
    #[error("Checkout already in progress")]
    InFlight,

    /// Refused before any side effect
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// Balance debit rejected or unreachable; nothing was charged
    #[error("Balance debit failed: {0}")]
    Transport(#[source] StoreError),

    /// Debit succeeded but the keys could not be stored
    #[error("Inventory write failed after debit: {0}")]
    Persistence(#[source] StoreError),
}

impl CheckoutError {
    /// Check if the whole checkout can be retried from scratch
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::InFlight)
    }

    /// Where the presentation layer should send the user, if anywhere
    pub const fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => Some("/login"),
            _ => None,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Unauthenticated => "Please log in to check out.",
            Self::InFlight => "Your order is already being processed.",
            Self::Validation(ValidationFailure::EmptyCart) => "Your cart is empty.",
            Self::Validation(ValidationFailure::InsufficientBalance { .. }) => {
                "Insufficient balance. Please top up and try again."
            }
            Self::Validation(ValidationFailure::QuantityLimit { .. }) => {
                "One of the items in your cart exceeds the quantity limit."
            }
            Self::Transport(_) => "Payment could not be completed. Please try again.",
            Self::Persistence(_) => {
                "Your payment went through but your keys could not be saved. Please contact support."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_failures_suggest_retry() {
        let transport = CheckoutError::Transport(StoreError::Unavailable("down".into()));
        assert!(transport.is_retryable());

        let validation = CheckoutError::from(ValidationFailure::EmptyCart);
        assert!(!validation.is_retryable());
        assert_eq!(validation.to_string(), "Validation failed: cart is empty");

        assert_eq!(CheckoutError::Unauthenticated.redirect(), Some("/login"));
    }
}
