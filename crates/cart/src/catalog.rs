//! Product catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image: String,
    /// Unit price in dollars.
    pub price: Decimal,
}

impl Product {
    /// Creates a product.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            image: image.into(),
            price,
        }
    }
}

/// Read-only lookup table of products.
///
/// Loaded once at startup and shared between processes behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Creates a catalog from a list of products.
    ///
    /// If two products share an ID, lookups return the first one.
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Returns every product in catalog order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Looks up a product by ID.
    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }

    /// Returns true if the product exists.
    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for Catalog {
    /// The demo storefront's four phones.
    fn default() -> Self {
        Self::new(vec![
            Product::new(
                0,
                "iPhone 12 Pro",
                "Test",
                "https://images.unsplash.com/photo-1603921326210-6edd2d60ca68",
                Decimal::from(999),
            ),
            Product::new(
                1,
                "iPhone 12",
                "Test",
                "https://images.unsplash.com/photo-1611472173362-3f53dbd65d80",
                Decimal::from(699),
            ),
            Product::new(
                2,
                "iPhone SE",
                "399",
                "https://images.unsplash.com/photo-1529618160092-2f8ccc8e087b",
                Decimal::from(399),
            ),
            Product::new(
                3,
                "iPhone 11",
                "599",
                "https://images.unsplash.com/photo-1574755393849-623942496936",
                Decimal::from(599),
            ),
        ])
    }
}
