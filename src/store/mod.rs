//! External collaborators: the catalog store and the object store.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::import::CatalogEntry;

/// REST catalog store client.
pub mod rest;
/// Bucket object storage client.
pub mod storage;

/// Field set submitted when creating one product.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub slug: String,
    pub description: String,
    pub long_description: String,
    pub category_id: Option<String>,
    pub collection_id: Option<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub material: String,
    pub care_instructions: String,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub badge: Option<String>,
    pub is_new_arrival: bool,
    pub is_best_seller: bool,
    pub is_celebrity_special: bool,
    pub is_active: bool,
    pub display_order: i64,
    pub enabled_options: Vec<String>,
    pub video_url: Option<String>,
    pub images: Vec<String>,
}

/// Reference catalog reads and product creation.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<CatalogEntry>>;
    async fn list_collections(&self) -> Result<Vec<CatalogEntry>>;
    async fn list_options(&self) -> Result<Vec<CatalogEntry>>;
    /// Create one product and return its id.
    async fn create_product(&self, product: &NewProduct) -> Result<String>;
}

/// Binary object writes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return a public URL.
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Convert non-2xx responses into an error carrying the body text.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(anyhow::anyhow!("HTTP status {status} error: {body}"))
}
