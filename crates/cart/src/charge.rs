//! Charge computation for checkout.

use common::CartId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CartError, CartState, Catalog, Money};

pub const CURRENCY_USD: &str = "usd";

/// Everything a payment gateway needs to charge one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub cart_id: CartId,
    pub attempt: u32,
    pub amount: Money,
    pub currency: String,
    /// Product names in item order, comma-joined.
    pub description: String,
    pub receipt_email: String,
    /// Stable across crashes: the same attempt always carries the same key.
    pub idempotency_key: String,
}

impl ChargeRequest {
    /// Builds the request for `attempt` from the cart contents.
    ///
    /// The amount is the sum of quantity times unit price, converted to cents
    /// and truncated. Products missing from the catalog count as free and
    /// contribute an empty name to the description. A separator is only
    /// written once the description is non-empty.
    pub fn for_checkout(
        cart_id: &CartId,
        state: &CartState,
        catalog: &Catalog,
        attempt: u32,
    ) -> Result<Self, CartError> {
        let mut total = Decimal::ZERO;
        let mut description = String::new();

        for item in &state.items {
            let (price, name) = match catalog.get(item.product_id) {
                Some(product) => (product.price, product.name.as_str()),
                None => {
                    tracing::warn!(
                        cart_id = %cart_id,
                        product_id = %item.product_id,
                        "product not in catalog, charging zero"
                    );
                    (Decimal::ZERO, "")
                }
            };

            let line = Decimal::from(item.quantity)
                .checked_mul(price)
                .ok_or(CartError::AmountOverflow)?;
            total = total.checked_add(line).ok_or(CartError::AmountOverflow)?;
            if !description.is_empty() {
                description.push_str(", ");
            }
            description.push_str(name);
        }

        let amount = Money::from_dollars_truncated(total).ok_or(CartError::AmountOverflow)?;

        Ok(Self {
            cart_id: cart_id.clone(),
            attempt,
            amount,
            currency: CURRENCY_USD.to_string(),
            description,
            receipt_email: state.email.clone(),
            idempotency_key: idempotency_key(cart_id, attempt),
        })
    }
}

/// Key a gateway uses to deduplicate retries of the same attempt.
pub fn idempotency_key(cart_id: &CartId, attempt: u32) -> String {
    format!("{cart_id}:checkout:{attempt}")
}
