//! Sequential batch upload of validated records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    import::{ImageAsset, ImportError, MatchedImageSet, ParsedProductRecord, ReferenceCatalogs},
    store::{CatalogStore, NewProduct, ObjectStore},
};

/// Everything the orchestrator needs for one run, detached from the wizard.
#[derive(Clone, Debug)]
pub struct UploadBatch {
    pub run_id: Uuid,
    pub records: Vec<ParsedProductRecord>,
    pub images: MatchedImageSet,
}

/// Result for one record.
#[derive(Clone, Debug, PartialEq)]
pub enum UploadOutcome {
    Created {
        row: usize,
        slug: String,
        id: String,
        image_urls: Vec<String>,
    },
    Failed {
        row: usize,
        slug: String,
        error: String,
    },
}

impl UploadOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, UploadOutcome::Created { .. })
    }
}

/// Cumulative counters after each processed record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Final totals plus per-record outcomes in row order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<UploadOutcome>,
}

/// Receives progress after every record, success or failure.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: UploadProgress, outcome: &UploadOutcome);
}

/// Creates products one at a time against the external stores.
pub struct Uploader<'a> {
    pub catalog: &'a dyn CatalogStore,
    pub storage: &'a dyn ObjectStore,
    pub catalogs: &'a ReferenceCatalogs,
    pub key_prefix: &'a str,
}

impl Uploader<'_> {
    /// Upload every eligible record in row order.
    ///
    /// Fails only when there is nothing eligible; per-record failures are
    /// reported in the summary and never stop the batch.
    pub async fn run(
        &self,
        records: Vec<ParsedProductRecord>,
        mut images: MatchedImageSet,
        sink: &dyn ProgressSink,
    ) -> Result<UploadSummary, ImportError> {
        let eligible: Vec<_> = records.into_iter().filter(|r| r.is_eligible()).collect();
        if eligible.is_empty() {
            return Err(ImportError::NothingToUpload);
        }

        let mut progress = UploadProgress {
            total: eligible.len(),
            ..Default::default()
        };
        let mut summary = UploadSummary::default();
        tracing::info!("upload start: {} records", progress.total);

        for record in eligible {
            let assets = images.take(&record.slug);
            let outcome = self.upload_one(&record, assets).await;

            progress.processed += 1;
            if outcome.is_created() {
                progress.succeeded += 1;
            } else {
                progress.failed += 1;
            }
            sink.report(progress, &outcome).await;
            summary.outcomes.push(outcome);
        }

        summary.succeeded = progress.succeeded;
        summary.failed = progress.failed;
        tracing::info!(
            "upload done: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }

    async fn upload_one(
        &self,
        record: &ParsedProductRecord,
        assets: Vec<ImageAsset>,
    ) -> UploadOutcome {
        // All images go up before the product that embeds their URLs.
        let mut image_urls = Vec::with_capacity(assets.len());
        for asset in assets {
            let key = object_key(self.key_prefix, asset.extension);
            match self.storage.put_object(&key, asset.bytes, asset.mime).await {
                Ok(url) => image_urls.push(url),
                Err(e) => {
                    tracing::warn!(
                        "row {}: image {} skipped: {e}",
                        record.row,
                        asset.filename
                    );
                }
            }
        }

        let product = self.assemble(record, image_urls.clone());
        match self.catalog.create_product(&product).await {
            Ok(id) => {
                tracing::info!("row {}: created {} ({id})", record.row, record.slug);
                UploadOutcome::Created {
                    row: record.row,
                    slug: record.slug.clone(),
                    id,
                    image_urls,
                }
            }
            Err(e) => {
                tracing::error!("row {}: create failed for {}: {e}", record.row, record.slug);
                UploadOutcome::Failed {
                    row: record.row,
                    slug: record.slug.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn assemble(&self, record: &ParsedProductRecord, images: Vec<String>) -> NewProduct {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        NewProduct {
            name: record.name.clone(),
            sku: record.sku.clone(),
            slug: record.slug.clone(),
            description: record.description.clone(),
            long_description: record.long_description.clone(),
            category_id: self
                .catalogs
                .category_id(&record.category_slug)
                .map(str::to_string),
            collection_id: self
                .catalogs
                .collection_id(&record.collection_slug)
                .map(str::to_string),
            price: record.price,
            original_price: record.original_price,
            material: record.material.clone(),
            care_instructions: record.care_instructions.clone(),
            stock_quantity: record.stock_quantity,
            low_stock_threshold: record.low_stock_threshold,
            badge: record.badge.map(|b| b.as_str().to_string()),
            is_new_arrival: record.is_new_arrival,
            is_best_seller: record.is_best_seller,
            is_celebrity_special: record.is_celebrity_special,
            is_active: record.is_active,
            display_order: record.display_order,
            enabled_options: record.option_ids(),
            video_url: non_empty(&record.video_url),
            images,
        }
    }
}

/// Fresh storage key `<prefix>/<uuid>.<ext>`; no prefix segment when empty.
fn object_key(prefix: &str, extension: &str) -> String {
    let name = format!("{}.{extension}", Uuid::new_v4());
    match prefix.trim_matches('/') {
        "" => name,
        prefix => format!("{prefix}/{name}"),
    }
}
