//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Catalog store endpoint and table names.
    pub store: StoreCfg,
    /// Object storage bucket for product images.
    pub storage: StorageCfg,
    /// Screening rules for uploaded images.
    pub images: ImageCfg,
    /// Import file defaults.
    pub import: ImportCfg,
}

/// Catalog store REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCfg {
    /// Base URL of the backend (no trailing `/rest/v1`).
    pub base_url: String,
    /// Service key sent as `apikey` and bearer token.
    pub api_key: String,
    pub products_table: String,
    pub categories_table: String,
    pub collections_table: String,
    pub options_table: String,
}

/// Where product images are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageCfg {
    /// Bucket name.
    pub bucket: String,
    /// Folder prefix for generated object keys.
    pub key_prefix: String,
}

/// Image acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCfg {
    /// Size ceiling per file, in bytes.
    pub max_bytes: u64,
    /// Content types accepted after sniffing.
    pub accepted_mime: Vec<String>,
}

impl ImageCfg {
    pub fn accepts(&self, mime: &str) -> bool {
        self.accepted_mime.iter().any(|m| m.eq_ignore_ascii_case(mime))
    }
}

/// Defaults for the import dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportCfg {
    /// File name prefix of the generated template.
    pub template_prefix: String,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Whether the store endpoint has been filled in.
    pub fn is_store_configured(&self) -> bool {
        !self.store.base_url.is_empty() && !self.store.api_key.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreCfg {
                base_url: "".into(),
                api_key: "".into(),
                products_table: "products".into(),
                categories_table: "categories".into(),
                collections_table: "collections".into(),
                options_table: "product_options".into(),
            },
            storage: StorageCfg {
                bucket: "product-images".into(),
                key_prefix: "products".into(),
            },
            images: ImageCfg {
                max_bytes: 5 * 1024 * 1024,
                accepted_mime: vec![
                    "image/jpeg".into(),
                    "image/png".into(),
                    "image/webp".into(),
                ],
            },
            import: ImportCfg {
                template_prefix: "product-import-template".into(),
            },
        }
    }
}
