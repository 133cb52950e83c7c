//! Mutation signals delivered to a cart process.

use serde::{Deserialize, Serialize};

use crate::{CartError, ProductId};

/// Product and quantity carried by add/remove signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl ItemPayload {
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Email carried by update-email and checkout signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub email: String,
}

impl EmailPayload {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// A mutation signal.
///
/// On the wire a signal is a flat JSON object tagged by `route`:
///
/// ```json
/// {"route": "ADD_TO_CART", "productId": 1, "quantity": 2}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route")]
pub enum CartSignal {
    #[serde(rename = "ADD_TO_CART")]
    AddItem(ItemPayload),

    #[serde(rename = "REMOVE_FROM_CART")]
    RemoveItem(ItemPayload),

    #[serde(rename = "UPDATE_EMAIL")]
    UpdateEmail(EmailPayload),

    #[serde(rename = "CHECKOUT")]
    Checkout(EmailPayload),
}

impl CartSignal {
    pub fn add_item(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        CartSignal::AddItem(ItemPayload::new(product_id, quantity))
    }

    pub fn remove_item(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        CartSignal::RemoveItem(ItemPayload::new(product_id, quantity))
    }

    pub fn update_email(email: impl Into<String>) -> Self {
        CartSignal::UpdateEmail(EmailPayload::new(email))
    }

    pub fn checkout(email: impl Into<String>) -> Self {
        CartSignal::Checkout(EmailPayload::new(email))
    }

    /// Decodes an untyped signal body.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CartError> {
        serde_json::from_value(value).map_err(|e| CartError::InvalidSignalPayload(e.to_string()))
    }

    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CartSignal::AddItem(_) => "add_item",
            CartSignal::RemoveItem(_) => "remove_item",
            CartSignal::UpdateEmail(_) => "update_email",
            CartSignal::Checkout(_) => "checkout",
        }
    }
}
