//! Import wizard stages and the session state they own.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::{
    import::{
        ImageAsset, ImportError, MatchSummary, MatchedImageSet, ParsedProductRecord, RecordCounts,
        ReferenceCatalogs, count,
    },
    upload::{UploadBatch, UploadOutcome, UploadProgress, UploadSummary},
};

/// Wizard stages without their data, used by the transition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    /// Instructions and template download
    Template,
    /// Import file selection
    Upload,
    /// Image assets and match preview
    Images,
    /// Per-row pass/fail review
    Review,
    /// Upload running or finished
    Progress,
}

/// User-driven stage actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WizardAction {
    Begin,
    FileParsed,
    Back,
    Review,
    Confirm,
}

/// Allowed transitions. Anything not listed is rejected.
pub fn transition(from: StageKind, action: WizardAction) -> Option<StageKind> {
    use StageKind as S;
    use WizardAction as A;
    match (from, action) {
        (S::Template, A::Begin) => Some(S::Upload),
        (S::Upload, A::FileParsed) => Some(S::Images),
        (S::Images, A::Back) => Some(S::Upload),
        (S::Images, A::Review) => Some(S::Review),
        (S::Review, A::Back) => Some(S::Images),
        (S::Images | S::Review, A::Confirm) => Some(S::Progress),
        _ => None,
    }
}

/// Rejected wizard actions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("{action:?} is not allowed in the {from:?} stage")]
    IllegalTransition {
        from: StageKind,
        action: WizardAction,
    },
    #[error("there are no valid records to upload")]
    NothingEligible,
    #[error("reference catalogs are not loaded yet")]
    CatalogsNotLoaded,
    #[error("not available in the {0:?} stage")]
    WrongStage(StageKind),
}

/// Parsed records and their pending images.
#[derive(Clone, Debug, Default)]
pub struct Working {
    pub records: Vec<ParsedProductRecord>,
    pub images: MatchedImageSet,
    /// Totals of the most recent image batch.
    pub last_match: Option<MatchSummary>,
}

impl Working {
    pub fn counts(&self) -> RecordCounts {
        count(&self.records)
    }
}

/// Live counters of an upload run.
#[derive(Clone, Debug)]
pub struct ProgressState {
    pub run_id: Uuid,
    pub progress: UploadProgress,
    pub outcomes: Vec<UploadOutcome>,
    pub finished: bool,
    pub error: Option<String>,
}

/// Current stage plus the data that stage owns.
#[derive(Clone, Debug)]
pub enum Stage {
    Template,
    Upload,
    Images(Working),
    Review(Working),
    Progress(ProgressState),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Template => StageKind::Template,
            Stage::Upload => StageKind::Upload,
            Stage::Images(_) => StageKind::Images,
            Stage::Review(_) => StageKind::Review,
            Stage::Progress(_) => StageKind::Progress,
        }
    }
}

/// One import attempt, from template to final totals.
#[derive(Clone, Debug)]
pub struct WizardSession {
    /// Tags worker results so late ones from a closed session are dropped.
    pub id: Uuid,
    pub stage: Stage,
    /// Snapshot captured once per session.
    pub catalogs: Option<Arc<ReferenceCatalogs>>,
    /// Last rejection shown in the current stage.
    pub error: Option<String>,
    /// Total number of wizard steps.
    pub total_steps: usize,
}

impl WizardSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Template,
            catalogs: None,
            error: None,
            total_steps: 5,
        }
    }

    pub fn kind(&self) -> StageKind {
        self.stage.kind()
    }

    fn check(&self, action: WizardAction) -> Result<StageKind, WizardError> {
        transition(self.kind(), action).ok_or(WizardError::IllegalTransition {
            from: self.kind(),
            action,
        })
    }

    fn enter(&mut self, from: StageKind, stage: Stage) {
        tracing::info!("wizard: {:?} -> {:?}", from, stage.kind());
        self.stage = stage;
        self.error = None;
    }

    /// Keep the first snapshot of the session; later ones are ignored so
    /// validation and upload resolve the same ids.
    pub fn set_catalogs(&mut self, catalogs: ReferenceCatalogs) -> bool {
        if self.catalogs.is_some() {
            tracing::warn!("catalog snapshot already taken for session {}", self.id);
            return false;
        }
        self.catalogs = Some(Arc::new(catalogs));
        true
    }

    /// Catalog snapshot, required before parsing or uploading.
    pub fn catalogs(&self) -> Result<Arc<ReferenceCatalogs>, WizardError> {
        self.catalogs.clone().ok_or(WizardError::CatalogsNotLoaded)
    }

    /// template → upload.
    pub fn begin(&mut self) -> Result<(), WizardError> {
        self.check(WizardAction::Begin)?;
        self.enter(StageKind::Template, Stage::Upload);
        Ok(())
    }

    /// Apply the parse result of the import file. A rejection keeps the
    /// wizard in the upload stage with the error shown.
    pub fn apply_parse(
        &mut self,
        result: Result<Vec<ParsedProductRecord>, ImportError>,
    ) -> Result<(), WizardError> {
        self.check(WizardAction::FileParsed)?;
        match result {
            Ok(records) => {
                self.enter(StageKind::Upload, Stage::Images(Working {
                    records,
                    ..Default::default()
                }));
            }
            Err(e) => {
                tracing::error!("import rejected: {e}");
                self.error = Some(e.to_string());
            }
        }
        Ok(())
    }

    /// Match a batch of screened assets against the working records.
    pub fn add_images(
        &mut self,
        assets: Vec<ImageAsset>,
        rejected: usize,
    ) -> Result<MatchSummary, WizardError> {
        let kind = self.kind();
        let Stage::Images(working) = &mut self.stage else {
            return Err(WizardError::WrongStage(kind));
        };
        let summary = working.images.add(assets, rejected, &working.records);
        working.images.annotate(&mut working.records);
        working.last_match = Some(summary);
        Ok(summary)
    }

    /// Drop one pending image of `slug`.
    pub fn remove_image(&mut self, slug: &str, index: usize) -> Option<ImageAsset> {
        let Stage::Images(working) = &mut self.stage else {
            return None;
        };
        let removed = working.images.remove(slug, index)?;
        working.images.annotate(&mut working.records);
        tracing::info!("image removed: {} from {slug}", removed.filename);
        Some(removed)
    }

    /// images → upload discards records and matches; review → images keeps them.
    pub fn back(&mut self) -> Result<(), WizardError> {
        self.check(WizardAction::Back)?;
        let from = self.kind();
        let next = match std::mem::replace(&mut self.stage, Stage::Upload) {
            Stage::Review(working) => Stage::Images(working),
            _ => Stage::Upload,
        };
        self.enter(from, next);
        Ok(())
    }

    /// images → review.
    pub fn review(&mut self) -> Result<(), WizardError> {
        self.check(WizardAction::Review)?;
        if let Stage::Images(working) = std::mem::replace(&mut self.stage, Stage::Upload) {
            self.enter(StageKind::Images, Stage::Review(working));
        }
        Ok(())
    }

    pub fn working(&self) -> Option<&Working> {
        match &self.stage {
            Stage::Images(w) | Stage::Review(w) => Some(w),
            _ => None,
        }
    }

    /// Whether confirming would start an upload.
    pub fn can_confirm(&self) -> bool {
        transition(self.kind(), WizardAction::Confirm).is_some()
            && self.catalogs.is_some()
            && self.working().is_some_and(|w| w.counts().valid > 0)
    }

    /// images/review → progress. Hands the eligible records and their
    /// images to the caller for upload.
    pub fn confirm(&mut self) -> Result<UploadBatch, WizardError> {
        self.check(WizardAction::Confirm)?;
        self.catalogs()?;
        if !self.can_confirm() {
            return Err(WizardError::NothingEligible);
        }

        let from = self.kind();
        let working = match std::mem::replace(&mut self.stage, Stage::Upload) {
            Stage::Images(w) | Stage::Review(w) => w,
            other => {
                self.stage = other;
                return Err(WizardError::WrongStage(from));
            }
        };
        let records: Vec<_> = working
            .records
            .into_iter()
            .filter(|r| r.is_eligible())
            .collect();
        let run_id = Uuid::new_v4();

        self.enter(from, Stage::Progress(ProgressState {
            run_id,
            progress: UploadProgress {
                total: records.len(),
                ..Default::default()
            },
            outcomes: Vec::new(),
            finished: false,
            error: None,
        }));

        Ok(UploadBatch {
            run_id,
            records,
            images: working.images,
        })
    }

    fn progress_mut(&mut self, run_id: Uuid) -> Option<&mut ProgressState> {
        match &mut self.stage {
            Stage::Progress(p) if p.run_id == run_id => Some(p),
            _ => None,
        }
    }

    /// Record one processed row. Events from other runs are ignored.
    pub fn apply_progress(&mut self, run_id: Uuid, progress: UploadProgress, outcome: UploadOutcome) {
        if let Some(p) = self.progress_mut(run_id) {
            p.progress = progress;
            p.outcomes.push(outcome);
        }
    }

    /// Record the end of a run.
    pub fn finish(&mut self, run_id: Uuid, result: Result<UploadSummary, String>) {
        if let Some(p) = self.progress_mut(run_id) {
            p.finished = true;
            match result {
                Ok(summary) => {
                    p.progress.processed = summary.outcomes.len();
                    p.progress.succeeded = summary.succeeded;
                    p.progress.failed = summary.failed;
                    p.outcomes = summary.outcomes;
                }
                Err(e) => p.error = Some(e),
            }
        }
    }

    /// Discard everything; the next open starts clean.
    pub fn close(&mut self) {
        tracing::info!("wizard closed in {:?}", self.kind());
        *self = Self::new();
    }

    /// Step number shown in the header (1-based).
    pub fn step_number(&self) -> usize {
        match self.kind() {
            StageKind::Template => 1,
            StageKind::Upload => 2,
            StageKind::Images => 3,
            StageKind::Review => 4,
            StageKind::Progress => 5,
        }
    }

    /// Instructions for the current stage.
    pub fn prompt(&self) -> &'static str {
        match self.kind() {
            StageKind::Template => {
                "Bulk product import\n\nDownload the template, fill one product per row and keep the header as is.\nLines starting with # list the current categories, collections and options."
            }
            StageKind::Upload => {
                "Select the filled CSV file.\n\nRequired columns must all be present; rows with problems are kept and shown in the review."
            }
            StageKind::Images => {
                "Add product images named <slug-or-sku>_<index>.<ext>.\n\nImages are matched to rows by file name. Remove any wrong match before continuing."
            }
            StageKind::Review => "Review every row. Only rows without errors are uploaded.",
            StageKind::Progress => "Uploading products one at a time.",
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{CatalogEntry, REQUIRED_FIELDS, fixtures, parse_import};

    fn catalogs() -> ReferenceCatalogs {
        ReferenceCatalogs {
            categories: vec![CatalogEntry::new("c1", "rings", "Rings")],
            ..Default::default()
        }
    }

    /// Header plus one row missing `name` and one valid row.
    fn sample_file() -> String {
        let blank = vec![""; REQUIRED_FIELDS.len()];
        let mut invalid = blank.clone();
        invalid[1] = "SKU0";
        invalid[7] = "10";
        let mut valid = blank;
        valid[0] = "Rose Ring";
        valid[1] = "SKU1";
        valid[7] = "20";
        format!(
            "{}\n{}\n{}\n",
            REQUIRED_FIELDS.join(","),
            invalid.join(","),
            valid.join(",")
        )
    }

    fn session_at_images() -> WizardSession {
        let mut s = WizardSession::new();
        s.set_catalogs(catalogs());
        s.begin().unwrap();
        let parsed = parse_import(sample_file().as_bytes(), &catalogs());
        s.apply_parse(parsed).unwrap();
        s
    }

    #[test]
    fn test_transition_table() {
        use StageKind as S;
        use WizardAction as A;
        assert_eq!(transition(S::Template, A::Begin), Some(S::Upload));
        assert_eq!(transition(S::Upload, A::FileParsed), Some(S::Images));
        assert_eq!(transition(S::Images, A::Back), Some(S::Upload));
        assert_eq!(transition(S::Review, A::Confirm), Some(S::Progress));
        assert_eq!(transition(S::Template, A::Confirm), None);
        assert_eq!(transition(S::Upload, A::Confirm), None);
        assert_eq!(transition(S::Progress, A::Back), None);
    }

    #[test]
    fn test_end_to_end_counts() {
        let s = session_at_images();
        assert_eq!(s.kind(), StageKind::Images);
        let working = s.working().unwrap();
        assert_eq!(working.records.len(), 2);
        assert!(working.records[0].errors.iter().any(|e| e == "Name is required"));
        assert!(working.records[1].errors.is_empty());
        assert_eq!(working.counts(), RecordCounts { valid: 1, errors: 1 });
    }

    #[test]
    fn test_parse_rejection_stays_in_upload() {
        let mut s = WizardSession::new();
        s.set_catalogs(catalogs());
        s.begin().unwrap();
        s.apply_parse(Err(ImportError::MissingColumns(vec!["price".into()])))
            .unwrap();
        assert_eq!(s.kind(), StageKind::Upload);
        assert_eq!(s.error.as_deref(), Some("missing required columns: price"));
    }

    #[test]
    fn test_back_discards_working_data() {
        let mut s = session_at_images();
        s.add_images(vec![fixtures::asset("rose-ring_1.png")], 0)
            .unwrap();
        s.back().unwrap();
        assert_eq!(s.kind(), StageKind::Upload);
        assert!(s.working().is_none());
    }

    #[test]
    fn test_review_back_keeps_working_data() {
        let mut s = session_at_images();
        s.add_images(vec![fixtures::asset("SKU1_1.png")], 0).unwrap();
        s.review().unwrap();
        assert_eq!(s.kind(), StageKind::Review);
        s.back().unwrap();
        assert_eq!(s.kind(), StageKind::Images);
        assert_eq!(s.working().unwrap().images.len(), 1);
    }

    #[test]
    fn test_images_are_annotated_and_removable() {
        let mut s = session_at_images();
        let summary = s
            .add_images(
                vec![
                    fixtures::asset("rose-ring_1.png"),
                    fixtures::asset("rose-ring_2.png"),
                    fixtures::asset("unknown_1.png"),
                ],
                2,
            )
            .unwrap();
        assert_eq!(
            summary,
            MatchSummary {
                matched: 2,
                unmatched: 1,
                rejected: 2
            }
        );
        assert_eq!(s.working().unwrap().records[1].images.len(), 2);

        let removed = s.remove_image("rose-ring", 0).unwrap();
        assert_eq!(removed.filename, "rose-ring_1.png");
        assert_eq!(
            s.working().unwrap().records[1].images,
            vec!["rose-ring_2.png".to_string()]
        );
    }

    #[test]
    fn test_confirm_requires_eligible_records() {
        let mut s = WizardSession::new();
        s.set_catalogs(catalogs());
        s.begin().unwrap();
        let header_only = REQUIRED_FIELDS.join(",");
        s.apply_parse(parse_import(header_only.as_bytes(), &catalogs()))
            .unwrap();
        assert_eq!(s.kind(), StageKind::Images);
        assert!(!s.can_confirm());
        assert_eq!(s.confirm().unwrap_err(), WizardError::NothingEligible);
        assert_eq!(s.kind(), StageKind::Images);
    }

    #[test]
    fn test_confirm_hands_over_eligible_batch() {
        let mut s = session_at_images();
        s.add_images(vec![fixtures::asset("SKU1_1.png")], 0).unwrap();
        assert!(s.can_confirm());
        let batch = s.confirm().unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].slug, "rose-ring");
        assert_eq!(batch.images.for_slug("rose-ring").len(), 1);

        let Stage::Progress(p) = &s.stage else {
            panic!("expected progress");
        };
        assert_eq!(p.run_id, batch.run_id);
        assert_eq!(p.progress.total, 1);
        assert_eq!(s.confirm().unwrap_err().to_string(), "Confirm is not allowed in the Progress stage");
    }

    #[test]
    fn test_progress_ignores_other_runs_and_close_resets() {
        let mut s = session_at_images();
        let batch = s.confirm().unwrap();
        let outcome = UploadOutcome::Created {
            row: 3,
            slug: "rose-ring".into(),
            id: "p1".into(),
            image_urls: vec![],
        };
        let step = UploadProgress {
            processed: 1,
            total: 1,
            succeeded: 1,
            failed: 0,
        };

        s.apply_progress(Uuid::new_v4(), step, outcome.clone());
        let Stage::Progress(p) = &s.stage else {
            panic!("expected progress");
        };
        assert_eq!(p.progress.processed, 0);

        s.apply_progress(batch.run_id, step, outcome.clone());
        s.finish(
            batch.run_id,
            Ok(UploadSummary {
                succeeded: 1,
                failed: 0,
                outcomes: vec![outcome],
            }),
        );
        let Stage::Progress(p) = &s.stage else {
            panic!("expected progress");
        };
        assert!(p.finished);
        assert_eq!(p.progress.succeeded, 1);
        assert_eq!(p.outcomes.len(), 1);

        s.close();
        assert_eq!(s.kind(), StageKind::Template);
        assert!(s.catalogs.is_none());
        assert!(s.working().is_none());
    }

    #[test]
    fn test_catalog_snapshot_is_taken_once() {
        let mut s = WizardSession::new();
        assert!(s.set_catalogs(catalogs()));
        let other = ReferenceCatalogs {
            categories: vec![CatalogEntry::new("c2", "rings", "Rings")],
            ..Default::default()
        };
        assert!(!s.set_catalogs(other));
        assert_eq!(s.catalogs().unwrap().category_id("rings"), Some("c1"));

        let before = s.id;
        s.close();
        assert_ne!(s.id, before);
        assert!(s.catalogs.is_none());
    }

    #[test]
    fn test_confirm_needs_catalogs() {
        let mut s = session_at_images();
        s.catalogs = None;
        assert_eq!(s.confirm().unwrap_err(), WizardError::CatalogsNotLoaded);
    }
}
