//! Background worker handling file I/O and store calls.

use std::{path::Path, path::PathBuf, sync::Arc};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::{Config, ImageCfg},
    import::{
        self, ImageAsset, ImageCandidate, ImportError, ParsedProductRecord, ReferenceCatalogs,
    },
    store::{rest::RestCatalog, storage::BucketStorage},
    upload::{ProgressSink, UploadBatch, UploadOutcome, UploadProgress, UploadSummary, Uploader},
};

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Capture a fresh reference catalog snapshot.
    LoadCatalogs { session_id: Uuid },
    /// Read and parse the import file.
    ParseFile {
        session_id: Uuid,
        path: PathBuf,
        catalogs: Arc<ReferenceCatalogs>,
    },
    /// Read and screen one image file or every file in a directory.
    LoadImages { session_id: Uuid, path: PathBuf },
    /// Write the import template.
    WriteTemplate {
        path: PathBuf,
        catalogs: Arc<ReferenceCatalogs>,
    },
    /// Run the upload orchestrator over a confirmed batch.
    StartUpload {
        batch: UploadBatch,
        catalogs: Arc<ReferenceCatalogs>,
    },
}

/// Events emitted by the worker for UI updates.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    CatalogsLoaded {
        session_id: Uuid,
        catalogs: ReferenceCatalogs,
    },
    FileParsed {
        session_id: Uuid,
        result: Result<Vec<ParsedProductRecord>, ImportError>,
    },
    ImagesLoaded {
        session_id: Uuid,
        assets: Vec<ImageAsset>,
        rejected: usize,
    },
    TemplateWritten(PathBuf),
    UploadProgress {
        run_id: Uuid,
        progress: UploadProgress,
        outcome: UploadOutcome,
    },
    UploadFinished {
        run_id: Uuid,
        result: Result<UploadSummary, String>,
    },
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
}

/// Forwards per-record progress of one run to the UI.
struct ChannelSink<'a> {
    tx: &'a mpsc::Sender<WorkerEvent>,
    run_id: Uuid,
}

#[async_trait]
impl ProgressSink for ChannelSink<'_> {
    async fn report(&self, progress: UploadProgress, outcome: &UploadOutcome) {
        let _ = self
            .tx
            .send(WorkerEvent::UploadProgress {
                run_id: self.run_id,
                progress,
                outcome: outcome.clone(),
            })
            .await;
    }
}

/// Main worker loop: handle commands sequentially.
pub async fn run(mut rx: mpsc::Receiver<WorkerCmd>, tx: mpsc::Sender<WorkerEvent>, cfg: Config) {
    // Shared HTTP client for all store calls.
    let http = Client::new();
    let catalog = RestCatalog::new(http.clone(), cfg.store.clone());
    let storage = BucketStorage::new(http, &cfg.store, &cfg.storage);
    tracing::info!("worker started");

    // One command at a time keeps uploads strictly sequential.
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::LoadCatalogs { session_id } => {
                if !cfg.is_store_configured() {
                    tracing::warn!("catalog load skipped: store not configured");
                    let _ = tx
                        .send(WorkerEvent::Error(
                            "store.base_url / store.api_key are not set in config.toml".into(),
                        ))
                        .await;
                    continue;
                }
                match ReferenceCatalogs::load(&catalog).await {
                    Ok(catalogs) => {
                        let _ = tx
                            .send(WorkerEvent::CatalogsLoaded {
                                session_id,
                                catalogs,
                            })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("catalog load failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::Error(format!("catalog load failed: {e}")))
                            .await;
                    }
                }
            }

            WorkerCmd::ParseFile {
                session_id,
                path,
                catalogs,
            } => {
                tracing::info!("parse file: {}", path.display());
                let _ = tx
                    .send(WorkerEvent::Log(format!("Reading {}", path.display())))
                    .await;
                let result = match tokio::fs::read(&path).await {
                    Ok(bytes) => import::parse_import(&bytes, &catalogs),
                    Err(e) => Err(ImportError::Unreadable(e.to_string())),
                };
                let _ = tx
                    .send(WorkerEvent::FileParsed { session_id, result })
                    .await;
            }

            WorkerCmd::LoadImages { session_id, path } => {
                tracing::info!("load images: {}", path.display());
                match load_images(&path, &cfg.images).await {
                    Ok((assets, rejected)) => {
                        if rejected > 0 {
                            let _ = tx
                                .send(WorkerEvent::Log(format!(
                                    "{rejected} image(s) rejected (type or size)"
                                )))
                                .await;
                        }
                        let _ = tx
                            .send(WorkerEvent::ImagesLoaded {
                                session_id,
                                assets,
                                rejected,
                            })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("image load failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::Error(format!("image load failed: {e}")))
                            .await;
                    }
                }
            }

            WorkerCmd::WriteTemplate { path, catalogs } => {
                let text = import::render_template(&catalogs);
                match tokio::fs::write(&path, text).await {
                    Ok(()) => {
                        tracing::info!("template written: {}", path.display());
                        let _ = tx.send(WorkerEvent::TemplateWritten(path)).await;
                    }
                    Err(e) => {
                        tracing::error!("template write failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::Error(format!("template write failed: {e}")))
                            .await;
                    }
                }
            }

            WorkerCmd::StartUpload { batch, catalogs } => {
                let run_id = batch.run_id;
                tracing::info!("upload run {run_id}: {} records", batch.records.len());
                let uploader = Uploader {
                    catalog: &catalog,
                    storage: &storage,
                    catalogs: &catalogs,
                    key_prefix: &cfg.storage.key_prefix,
                };
                let sink = ChannelSink { tx: &tx, run_id };
                let result = uploader
                    .run(batch.records, batch.images, &sink)
                    .await
                    .map_err(|e| e.to_string());
                let _ = tx
                    .send(WorkerEvent::UploadFinished { run_id, result })
                    .await;
            }
        }
    }
}

/// Read image files from a single file or a directory (non-recursive).
///
/// Returns screened assets in filename order and the number rejected.
pub async fn load_images(path: &Path, rules: &ImageCfg) -> Result<(Vec<ImageAsset>, usize)> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| anyhow!("{}: {e}", path.display()))?;

    let mut files = Vec::new();
    if meta.is_dir() {
        let mut entries = tokio::fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
    } else {
        files.push(path.to_path_buf());
    }

    let mut assets = Vec::new();
    let mut rejected = 0;
    for file in files {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Oversize files are rejected without reading them.
        let len = tokio::fs::metadata(&file).await?.len();
        if len > rules.max_bytes {
            tracing::warn!("image rejected (too large): {filename} ({len} bytes)");
            rejected += 1;
            continue;
        }

        let bytes = tokio::fs::read(&file).await?;
        match ImageAsset::screen(ImageCandidate { filename, bytes }, rules) {
            Some(asset) => assets.push(asset),
            None => rejected += 1,
        }
    }
    Ok((assets, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::fixtures::PNG;

    #[tokio::test]
    async fn test_load_images_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ring_2.png"), PNG).unwrap();
        std::fs::write(dir.path().join("ring_1.png"), PNG).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let rules = Config::default().images;
        let (assets, rejected) = load_images(dir.path(), &rules).await.unwrap();
        let names: Vec<_> = assets.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["ring_1.png", "ring_2.png"]);
        assert_eq!(rejected, 1);
    }

    #[tokio::test]
    async fn test_load_images_rejects_oversize_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big_1.png");
        let mut bytes = PNG.to_vec();
        bytes.resize(64, 0);
        std::fs::write(&path, bytes).unwrap();

        let mut rules = Config::default().images;
        rules.max_bytes = 32;
        let (assets, rejected) = load_images(&path, &rules).await.unwrap();
        assert!(assets.is_empty());
        assert_eq!(rejected, 1);
    }

    #[tokio::test]
    async fn test_load_images_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let rules = Config::default().images;
        assert!(load_images(&dir.path().join("nope"), &rules).await.is_err());
    }
}
