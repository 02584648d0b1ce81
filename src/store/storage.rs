//! Bucket object storage over HTTP.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use super::{ObjectStore, ensure_success};
use crate::config::{StorageCfg, StoreCfg};

/// Object store backed by `<base_url>/storage/v1/object/<bucket>/<key>`.
#[derive(Clone)]
pub struct BucketStorage {
    http: Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl BucketStorage {
    pub fn new(http: Client, store: &StoreCfg, storage: &StorageCfg) -> Self {
        Self {
            http,
            base_url: store.base_url.trim_end_matches('/').to_string(),
            api_key: store.api_key.clone(),
            bucket: storage.bucket.clone(),
        }
    }

    /// Publicly resolvable URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait]
impl ObjectStore for BucketStorage {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes)
                .file_name(filename)
                .mime_str(content_type)?,
        );

        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, key
        );
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("x-upsert", "false")
            .multipart(form)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(self.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_public_url_layout() {
        let mut cfg = Config::default();
        cfg.store.base_url = "https://shop.example.com/".into();
        cfg.storage.bucket = "product-images".into();
        let storage = BucketStorage::new(Client::new(), &cfg.store, &cfg.storage);
        assert_eq!(
            storage.public_url("products/a.png"),
            "https://shop.example.com/storage/v1/object/public/product-images/products/a.png"
        );
    }
}
