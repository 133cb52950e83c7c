//! Catalog listing.

use axum::Json;
use axum::extract::State;
use cart::Product;
use serde::Serialize;
use workflow::CartRuntime;

#[derive(Serialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

/// GET /products
pub async fn list(State(runtime): State<CartRuntime>) -> Json<ProductsResponse> {
    Json(ProductsResponse {
        products: runtime.catalog().products().to_vec(),
    })
}
