//! Filename-based matching of loose image files to parsed records.

use std::collections::BTreeMap;

use super::ParsedProductRecord;
use crate::config::ImageCfg;

/// An uploaded file before screening.
#[derive(Clone, Debug)]
pub struct ImageCandidate {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A screened image with its detected content type and match token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    pub filename: String,
    pub token: String,
    pub mime: &'static str,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    /// Accept a candidate when its sniffed type is allowed and it fits the
    /// size ceiling.
    pub fn screen(candidate: ImageCandidate, rules: &ImageCfg) -> Option<Self> {
        if candidate.bytes.len() as u64 > rules.max_bytes {
            tracing::warn!(
                "image rejected (too large): {} ({} bytes)",
                candidate.filename,
                candidate.bytes.len()
            );
            return None;
        }
        let Some(kind) = infer::get(&candidate.bytes) else {
            tracing::warn!("image rejected (unknown type): {}", candidate.filename);
            return None;
        };
        if !rules.accepts(kind.mime_type()) {
            tracing::warn!(
                "image rejected ({}): {}",
                kind.mime_type(),
                candidate.filename
            );
            return None;
        }
        Some(Self {
            token: token_for(&candidate.filename),
            filename: candidate.filename,
            mime: kind.mime_type(),
            extension: kind.extension(),
            bytes: candidate.bytes,
        })
    }
}

/// Strip the extension, then drop a trailing `_<index>` segment.
pub fn token_for(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    match stem.rsplit_once('_') {
        Some((token, _)) if !token.is_empty() => token.to_string(),
        _ => stem.to_string(),
    }
}

/// Index of the record an asset token belongs to.
///
/// Exact (case-insensitive) slug or sku equality wins; otherwise the first
/// record whose slug or sku contains, or is contained in, the token.
pub fn find_record(token: &str, records: &[ParsedProductRecord]) -> Option<usize> {
    let token = token.to_lowercase();
    if token.is_empty() {
        return None;
    }
    let keys = |r: &ParsedProductRecord| {
        [r.slug.to_lowercase(), r.sku.to_lowercase()]
            .into_iter()
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
    };

    records
        .iter()
        .position(|r| keys(r).iter().any(|k| *k == token))
        .or_else(|| {
            records.iter().position(|r| {
                keys(r)
                    .iter()
                    .any(|k| token.contains(k.as_str()) || k.contains(token.as_str()))
            })
        })
}

/// Per-batch matching totals shown in the images stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub rejected: usize,
}

/// Images waiting for upload, keyed by product slug, in processing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchedImageSet {
    by_slug: BTreeMap<String, Vec<ImageAsset>>,
}

impl MatchedImageSet {
    /// Attach screened assets to records. `rejected` is carried into the
    /// summary for assets that failed screening upstream.
    pub fn add(
        &mut self,
        assets: Vec<ImageAsset>,
        rejected: usize,
        records: &[ParsedProductRecord],
    ) -> MatchSummary {
        let mut summary = MatchSummary {
            rejected,
            ..Default::default()
        };
        for asset in assets {
            match find_record(&asset.token, records) {
                Some(idx) => {
                    tracing::info!("image {} -> {}", asset.filename, records[idx].slug);
                    self.by_slug
                        .entry(records[idx].slug.clone())
                        .or_default()
                        .push(asset);
                    summary.matched += 1;
                }
                None => {
                    tracing::info!("image {} matched no record", asset.filename);
                    summary.unmatched += 1;
                }
            }
        }
        summary
    }

    pub fn for_slug(&self, slug: &str) -> &[ImageAsset] {
        self.by_slug.get(slug).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove one pending image; the rest keep their order.
    pub fn remove(&mut self, slug: &str, index: usize) -> Option<ImageAsset> {
        let list = self.by_slug.get_mut(slug)?;
        if index >= list.len() {
            return None;
        }
        let removed = list.remove(index);
        if list.is_empty() {
            self.by_slug.remove(slug);
        }
        Some(removed)
    }

    /// Hand over a slug's images, leaving none behind.
    pub fn take(&mut self, slug: &str) -> Vec<ImageAsset> {
        self.by_slug.remove(slug).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_slug.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }

    /// Refresh each record's `images` list from the current set.
    pub fn annotate(&self, records: &mut [ParsedProductRecord]) {
        for r in records {
            r.images = self
                .for_slug(&r.slug)
                .iter()
                .map(|a| a.filename.clone())
                .collect();
        }
    }
}
