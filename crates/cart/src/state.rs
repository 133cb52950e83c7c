//! Cart state and process status.

use serde::{Deserialize, Serialize};

use crate::ProductId;

/// A line in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    /// Always greater than zero while the item is in a cart.
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// The contents of one cart.
///
/// Items are kept in insertion order and are unique by product. The
/// `checked_out` flag only moves from false to true and is not part of the
/// query payload; callers read the process status instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub email: String,
    #[serde(skip)]
    pub checked_out: bool,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item for a product, if present.
    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Merges `quantity` into the matching item or appends a new one.
    ///
    /// An item whose quantity ends up at or below zero is dropped.
    pub fn add_item(&mut self, product_id: ProductId, quantity: i64) {
        match self
            .items
            .iter()
            .position(|item| item.product_id == product_id)
        {
            Some(index) => {
                let item = &mut self.items[index];
                item.quantity = item.quantity.saturating_add(quantity);
                if item.quantity <= 0 {
                    self.items.remove(index);
                }
            }
            None if quantity > 0 => self.items.push(CartItem::new(product_id, quantity)),
            None => {}
        }
    }

    /// Decrements the matching item, removing it once it reaches zero.
    ///
    /// No-op if the product is not in the cart.
    pub fn remove_item(&mut self, product_id: ProductId, quantity: i64) {
        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.product_id == product_id)
        {
            let item = &mut self.items[index];
            item.quantity = item.quantity.saturating_sub(quantity);
            if item.quantity <= 0 {
                self.items.remove(index);
            }
        }
    }
}

/// Lifecycle status of a cart process.
///
/// ```text
/// Open ──checkout──► CheckingOut ──paid──► Closed
///   ▲                     │
///   └──── charge failed ──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProcessStatus {
    /// Accepting signals.
    #[default]
    Open,

    /// A charge is in flight; signals wait behind it.
    CheckingOut,

    /// Paid (terminal).
    Closed,
}

impl ProcessStatus {
    pub fn accepts_signals(&self) -> bool {
        matches!(self, ProcessStatus::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Open => "Open",
            ProcessStatus::CheckingOut => "CheckingOut",
            ProcessStatus::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
