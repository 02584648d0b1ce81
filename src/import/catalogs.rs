//! Reference catalog snapshot used for cross-reference validation.

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

use crate::store::CatalogStore;

/// A category, collection or selectable option as listed by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: name.into(),
        }
    }
}

/// Accept ids stored either as strings or as integers.
fn id_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(de)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Immutable snapshot of the external catalogs, captured once per session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceCatalogs {
    pub categories: Vec<CatalogEntry>,
    pub collections: Vec<CatalogEntry>,
    pub options: Vec<CatalogEntry>,
}

impl ReferenceCatalogs {
    /// Query all three lists from the store.
    pub async fn load(store: &dyn CatalogStore) -> Result<Self> {
        let categories = store.list_categories().await?;
        let collections = store.list_collections().await?;
        let options = store.list_options().await?;
        tracing::info!(
            "catalogs loaded: {} categories, {} collections, {} options",
            categories.len(),
            collections.len(),
            options.len()
        );
        Ok(Self {
            categories,
            collections,
            options,
        })
    }

    pub fn category_id(&self, slug: &str) -> Option<&str> {
        find_by_slug(&self.categories, slug)
    }

    pub fn collection_id(&self, slug: &str) -> Option<&str> {
        find_by_slug(&self.collections, slug)
    }
}

fn find_by_slug<'a>(entries: &'a [CatalogEntry], slug: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|e| e.slug.eq_ignore_ascii_case(slug))
        .map(|e| e.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_slug_ignores_case() {
        let catalogs = ReferenceCatalogs {
            categories: vec![CatalogEntry::new("c1", "rings", "Rings")],
            ..Default::default()
        };
        assert_eq!(catalogs.category_id("Rings"), Some("c1"));
        assert_eq!(catalogs.category_id("necklaces"), None);
        assert_eq!(catalogs.collection_id("rings"), None);
    }

    #[test]
    fn test_entry_accepts_numeric_ids() {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(r#"[{"id":7,"slug":"bridal","name":"Bridal"},{"id":"x","name":"Size"}]"#)
                .unwrap();
        assert_eq!(entries[0].id, "7");
        assert_eq!(entries[1].id, "x");
        assert_eq!(entries[1].slug, "");
    }
}
