//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::Config,
    events::UiState,
    input::InputBoxState,
    shortcuts::Shortcuts,
    ui::Tui,
    wizard::{Stage, WizardSession},
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// インポートウィザード（UIタスクだけが書き換える）。
    pub session: WizardSession,
    /// 選択位置やステータスなどUI固有の状態。
    pub ui: UiState,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,
    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,
    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを書き出して編集できるようにする）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;
    if !cfg.is_store_configured() {
        tracing::warn!("store endpoint is empty in {}", cfg_path.display());
    }

    // ショートカット設定を読み込む（無ければデフォルト）。
    let shortcuts = Shortcuts::load_or_default("shortcut.toml")?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 設定スナップショットでWorkerを起動する。
    tokio::spawn(worker::run(rx_cmd, tx_ev, cfg.clone()));

    // アプリ状態を初期化する。
    let mut app = App {
        cfg,
        session: WizardSession::new(),
        ui: UiState {
            status: "Ready".into(),
            ..Default::default()
        },
        worker_tx: tx_cmd,
        worker_rx: rx_ev,
        input_box: None,
        shortcuts,
    };

    // セッション開始時に参照カタログを取得する。
    request_catalogs(&mut app).await?;

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev);
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どのステージでもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) {
    match ev {
        WorkerEvent::CatalogsLoaded {
            session_id,
            catalogs,
        } => {
            if !is_current(app, session_id, "catalogs") {
                return;
            }
            // セッション内で最初のスナップショットだけを保持する。
            app.ui.busy = false;
            let status = format!(
                "Catalogs loaded: {} categories, {} collections, {} options",
                catalogs.categories.len(),
                catalogs.collections.len(),
                catalogs.options.len()
            );
            if app.session.set_catalogs(catalogs) {
                app.ui.error = None;
                app.ui.status = status;
            }
        }
        WorkerEvent::FileParsed { session_id, result } => {
            if !is_current(app, session_id, "parse result") {
                return;
            }
            app.ui.busy = false;
            match app.session.apply_parse(result) {
                Ok(()) => match app.session.working() {
                    // 取り込み成功：件数を表示して画像ステージへ。
                    Some(working) => {
                        let counts = working.counts();
                        app.ui.reset_selection();
                        app.ui.status = format!(
                            "Parsed {} rows: {} valid, {} with errors",
                            working.records.len(),
                            counts.valid,
                            counts.errors
                        );
                        app.ui.push_log(app.ui.status.clone());
                    }
                    // ファイル全体が拒否された（理由はセッション側に保持）。
                    None => app.ui.status = "Import file rejected".into(),
                },
                Err(e) => {
                    // ステージが変わった後に届いた結果は捨てる。
                    tracing::warn!("parse result dropped: {e}");
                }
            }
        }
        WorkerEvent::ImagesLoaded {
            session_id,
            assets,
            rejected,
        } => {
            if !is_current(app, session_id, "images") {
                return;
            }
            app.ui.busy = false;
            match app.session.add_images(assets, rejected) {
                Ok(summary) => {
                    app.ui.status = format!(
                        "Images: {} matched, {} unmatched, {} rejected",
                        summary.matched, summary.unmatched, summary.rejected
                    );
                    app.ui.push_log(app.ui.status.clone());
                }
                Err(e) => tracing::warn!("images dropped: {e}"),
            }
        }
        WorkerEvent::TemplateWritten(path) => {
            app.ui.busy = false;
            app.ui.status = format!("Template saved: {}", path.display());
            app.ui.push_log(app.ui.status.clone());
        }
        WorkerEvent::UploadProgress {
            run_id,
            progress,
            outcome,
        } => {
            app.session.apply_progress(run_id, progress, outcome);
            app.ui.status = format!("Uploading {}/{}", progress.processed, progress.total);
        }
        WorkerEvent::UploadFinished { run_id, result } => {
            let line = match &result {
                Ok(summary) => format!(
                    "Upload finished: {} created, {} failed",
                    summary.succeeded, summary.failed
                ),
                Err(e) => format!("Upload aborted: {e}"),
            };
            app.session.finish(run_id, result);
            // 現在の実行に対する完了のみ表示する。
            if let Stage::Progress(p) = &app.session.stage
                && p.run_id == run_id
            {
                app.ui.busy = false;
                app.ui.status = line.clone();
                app.ui.push_log(line);
            }
        }
        WorkerEvent::Log(s) => {
            // ログを追加する。
            app.ui.push_log(s);
        }
        WorkerEvent::Error(s) => {
            // ステータスにエラーを表示する。
            app.ui.busy = false;
            app.ui.push_log(format!("Error: {s}"));
            app.ui.error = Some(s);
        }
    }
}

/// 結果が現在のセッション宛てか判定する（閉じたセッションの結果は捨てる）。
fn is_current(app: &App, session_id: Uuid, what: &str) -> bool {
    if session_id == app.session.id {
        return true;
    }
    tracing::warn!("{what} dropped: session {session_id} is closed");
    false
}

/// Workerへ参照カタログの取得を依頼する。
pub async fn request_catalogs(app: &mut App) -> Result<()> {
    tracing::info!("catalog load requested");
    app.worker_tx
        .send(WorkerCmd::LoadCatalogs {
            session_id: app.session.id,
        })
        .await?;
    app.ui.busy = true;
    app.ui.status = "Loading catalogs...".into();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        import::{CatalogEntry, ImportError, REQUIRED_FIELDS, ReferenceCatalogs, fixtures},
        upload::{UploadOutcome, UploadProgress, UploadSummary},
        wizard::StageKind,
    };

    fn test_app() -> (App, mpsc::Receiver<WorkerCmd>) {
        let (tx_cmd, rx_cmd) = mpsc::channel(8);
        let (_tx_ev, rx_ev) = mpsc::channel(8);
        let app = App {
            cfg: Config::default(),
            session: WizardSession::new(),
            ui: UiState::default(),
            worker_tx: tx_cmd,
            worker_rx: rx_ev,
            input_box: None,
            shortcuts: Shortcuts::default(),
        };
        (app, rx_cmd)
    }

    fn catalogs() -> ReferenceCatalogs {
        ReferenceCatalogs {
            categories: vec![CatalogEntry::new("c1", "rings", "Rings")],
            ..Default::default()
        }
    }

    fn parsed_rows(session_id: Uuid) -> WorkerEvent {
        let mut row = vec![""; REQUIRED_FIELDS.len()];
        row[0] = "Rose Ring";
        row[7] = "20";
        row[5] = "rings";
        let text = format!("{}\n{}\n", REQUIRED_FIELDS.join(","), row.join(","));
        WorkerEvent::FileParsed {
            session_id,
            result: crate::import::parse_import(text.as_bytes(), &catalogs()),
        }
    }

    fn loaded(session_id: Uuid, catalogs: ReferenceCatalogs) -> WorkerEvent {
        WorkerEvent::CatalogsLoaded {
            session_id,
            catalogs,
        }
    }

    #[test]
    fn test_worker_events_drive_session() {
        // Workerイベントでウィザードが画像ステージまで進むことを検証する。
        let (mut app, _rx) = test_app();
        let id = app.session.id;
        handle_worker_event(&mut app, loaded(id, catalogs()));
        assert!(app.session.catalogs.is_some());
        app.session.begin().unwrap();

        handle_worker_event(&mut app, parsed_rows(id));
        assert_eq!(app.session.kind(), StageKind::Images);
        assert_eq!(app.ui.status, "Parsed 1 rows: 1 valid, 0 with errors");

        handle_worker_event(
            &mut app,
            WorkerEvent::ImagesLoaded {
                session_id: id,
                assets: vec![fixtures::asset("rose-ring_1.png"), fixtures::asset("zzz_1.png")],
                rejected: 1,
            },
        );
        assert_eq!(app.ui.status, "Images: 1 matched, 1 unmatched, 1 rejected");
    }

    #[test]
    fn test_rejected_file_keeps_upload_stage() {
        // ファイル全体の拒否はアップロードステージに留まることを検証する。
        let (mut app, _rx) = test_app();
        app.session.set_catalogs(catalogs());
        app.session.begin().unwrap();
        let id = app.session.id;
        handle_worker_event(
            &mut app,
            WorkerEvent::FileParsed {
                session_id: id,
                result: Err(ImportError::NoHeader),
            },
        );
        assert_eq!(app.session.kind(), StageKind::Upload);
        assert!(app.session.error.is_some());
        assert_eq!(app.ui.status, "Import file rejected");
    }

    #[test]
    fn test_stale_upload_events_are_ignored() {
        // 閉じた後に届いた旧実行のイベントが無視されることを検証する。
        let (mut app, _rx) = test_app();
        app.session.set_catalogs(catalogs());
        app.session.begin().unwrap();
        let id = app.session.id;
        handle_worker_event(&mut app, parsed_rows(id));
        let batch = app.session.confirm().unwrap();
        app.session.close();

        let outcome = UploadOutcome::Failed {
            row: 2,
            slug: "rose-ring".into(),
            error: "boom".into(),
        };
        handle_worker_event(
            &mut app,
            WorkerEvent::UploadProgress {
                run_id: batch.run_id,
                progress: UploadProgress {
                    processed: 1,
                    total: 1,
                    succeeded: 0,
                    failed: 1,
                },
                outcome: outcome.clone(),
            },
        );
        handle_worker_event(
            &mut app,
            WorkerEvent::UploadFinished {
                run_id: batch.run_id,
                result: Ok(UploadSummary {
                    succeeded: 0,
                    failed: 1,
                    outcomes: vec![outcome],
                }),
            },
        );
        assert_eq!(app.session.kind(), StageKind::Template);
        assert!(app.ui.log.iter().all(|l| !l.contains("Upload finished")));
    }

    #[tokio::test]
    async fn test_request_catalogs_sends_command() {
        let (mut app, mut rx) = test_app();
        request_catalogs(&mut app).await.unwrap();
        match rx.recv().await {
            Some(WorkerCmd::LoadCatalogs { session_id }) => assert_eq!(session_id, app.session.id),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(app.ui.busy);
    }

    #[test]
    fn test_second_catalog_load_keeps_first_snapshot() {
        // 検証に使ったスナップショットが後続の取得で差し替わらないことを検証する。
        let (mut app, _rx) = test_app();
        let id = app.session.id;
        let snapshot = |cat_id: &str| ReferenceCatalogs {
            categories: vec![CatalogEntry::new(cat_id, "rings", "Rings")],
            ..Default::default()
        };
        handle_worker_event(&mut app, loaded(id, snapshot("A-id")));
        app.session.begin().unwrap();
        handle_worker_event(&mut app, parsed_rows(id));
        handle_worker_event(&mut app, loaded(id, snapshot("B-id")));

        let catalogs = app.session.catalogs().unwrap();
        assert_eq!(catalogs.category_id("rings"), Some("A-id"));
    }

    #[test]
    fn test_results_of_closed_session_are_dropped() {
        // 閉じたセッション宛てのカタログ・取り込み結果が新しいセッションに混ざらないことを検証する。
        let (mut app, _rx) = test_app();
        let old = app.session.id;
        app.session.close();
        app.session.begin().unwrap();

        handle_worker_event(&mut app, loaded(old, catalogs()));
        assert!(app.session.catalogs.is_none());
        handle_worker_event(&mut app, parsed_rows(old));
        assert_eq!(app.session.kind(), StageKind::Upload);

        let current = app.session.id;
        handle_worker_event(&mut app, loaded(current, catalogs()));
        assert!(app.session.catalogs.is_some());
    }
}
