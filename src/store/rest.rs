//! PostgREST-style catalog store over HTTP.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use super::{CatalogStore, NewProduct, ensure_success};
use crate::{config::StoreCfg, import::CatalogEntry};

/// Catalog store backed by `<base_url>/rest/v1/<table>`.
#[derive(Clone)]
pub struct RestCatalog {
    http: Client,
    cfg: StoreCfg,
}

impl RestCatalog {
    pub fn new(http: Client, cfg: StoreCfg) -> Self {
        Self { http, cfg }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.cfg.base_url.trim_end_matches('/'), table)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.cfg.api_key)
            .bearer_auth(&self.cfg.api_key)
    }

    /// List `id,slug,name` rows of a reference table.
    async fn list(&self, table: &str, select: &str) -> Result<Vec<CatalogEntry>> {
        let url = format!(
            "{}?select={}&order=name.asc",
            self.table_url(table),
            urlencoding::encode(select)
        );
        let resp = self.authed(self.http.get(url)).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<Vec<CatalogEntry>>().await?)
    }
}

#[async_trait]
impl CatalogStore for RestCatalog {
    async fn list_categories(&self) -> Result<Vec<CatalogEntry>> {
        self.list(&self.cfg.categories_table, "id,slug,name").await
    }

    async fn list_collections(&self) -> Result<Vec<CatalogEntry>> {
        self.list(&self.cfg.collections_table, "id,slug,name").await
    }

    async fn list_options(&self) -> Result<Vec<CatalogEntry>> {
        self.list(&self.cfg.options_table, "id,name").await
    }

    async fn create_product(&self, product: &NewProduct) -> Result<String> {
        let req = self
            .http
            .post(self.table_url(&self.cfg.products_table))
            .header("Prefer", "return=representation")
            .json(product);
        let resp = self.authed(req).send().await?;
        let resp = ensure_success(resp).await?;
        let rows = resp.json::<Vec<serde_json::Value>>().await?;

        // The id may be a uuid string or a serial number.
        match rows.first().map(|r| &r["id"]) {
            Some(serde_json::Value::String(id)) => Ok(id.clone()),
            Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
            _ => Err(anyhow!("no id in create response")),
        }
    }
}
