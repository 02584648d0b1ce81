//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

use crate::{
    import::template_file_name,
    input::{InputBoxState, InputTarget},
    shortcuts::matches_shortcut,
    wizard::{Stage, StageKind, WizardError},
    worker::WorkerCmd,
};

use super::{App, request_catalogs};

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }

    // 共通ショートカット（終了・やり直し）を先に判定する。
    let common = &app.shortcuts.common;
    if matches_shortcut(&k, &common.quit) {
        return Ok(true);
    }
    if matches_shortcut(&k, &common.close) {
        close_wizard(app).await?;
        return Ok(false);
    }

    // ステージごとのハンドラへ委譲する。
    match app.session.kind() {
        StageKind::Template => handle_template_key(app, k).await?,
        StageKind::Upload => handle_upload_key(app, k),
        StageKind::Images => handle_images_key(app, k).await?,
        StageKind::Review => handle_review_key(app, k).await?,
        StageKind::Progress => handle_progress_key(app, k).await?,
    }
    Ok(false)
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// ウィザード操作の拒否理由を表示する。
fn show_rejection(app: &mut App, e: WizardError) {
    tracing::warn!("wizard action rejected: {e}");
    app.ui.error = Some(e.to_string());
}

/// テンプレート画面のキー処理。
async fn handle_template_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = &app.shortcuts.template;

    if matches_shortcut(&k, &sc.begin) {
        // ファイル選択ステージへ進む。
        match app.session.begin() {
            Ok(()) => app.ui.error = None,
            Err(e) => show_rejection(app, e),
        }
    } else if matches_shortcut(&k, &sc.download) {
        // テンプレートの保存先を尋ねる（カタログ取得前は作れない）。
        if let Err(e) = app.session.catalogs() {
            show_rejection(app, e);
            return Ok(());
        }
        let default_name = template_file_name(&app.cfg.import.template_prefix);
        app.input_box = Some(InputBoxState::new(
            "Save template as:",
            default_name,
            InputTarget::TemplatePath,
        ));
    }
    Ok(())
}

/// ファイル選択画面のキー処理。
fn handle_upload_key(app: &mut App, k: KeyEvent) {
    if matches_shortcut(&k, &app.shortcuts.upload.open_file) && !app.ui.busy {
        // 取り込むCSVファイルのパスを尋ねる。
        app.input_box = Some(InputBoxState::new(
            "Import file (.csv):",
            "",
            InputTarget::ImportFile,
        ));
    }
}

/// 画像割り当て画面のキー処理。
async fn handle_images_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = app.shortcuts.images.clone();
    let record_count = app.session.working().map_or(0, |w| w.records.len());

    if matches_shortcut(&k, &sc.add) && !app.ui.busy {
        // 画像ファイルまたはフォルダのパスを尋ねる。
        app.input_box = Some(InputBoxState::new(
            "Image file or folder:",
            "",
            InputTarget::ImagePath,
        ));
    } else if matches_shortcut(&k, &sc.remove) {
        remove_selected_image(app);
    } else if matches_shortcut(&k, &sc.down) {
        // 次のレコードへ移動する。
        if app.ui.selected + 1 < record_count {
            app.ui.selected += 1;
            app.ui.selected_image = 0;
        }
    } else if matches_shortcut(&k, &sc.up) {
        // 前のレコードへ移動する。
        if app.ui.selected > 0 {
            app.ui.selected -= 1;
            app.ui.selected_image = 0;
        }
    } else if matches_shortcut(&k, &sc.next_image) {
        if app.ui.selected_image + 1 < selected_image_count(app) {
            app.ui.selected_image += 1;
        }
    } else if matches_shortcut(&k, &sc.prev_image) {
        app.ui.selected_image = app.ui.selected_image.saturating_sub(1);
    } else if matches_shortcut(&k, &sc.review) {
        // 行ごとの確認画面へ進む。
        match app.session.review() {
            Ok(()) => app.ui.error = None,
            Err(e) => show_rejection(app, e),
        }
    } else if matches_shortcut(&k, &sc.confirm) {
        confirm_upload(app).await?;
    } else if matches_shortcut(&k, &sc.back) {
        // ファイル選択へ戻る（取り込み結果と画像は破棄される）。
        match app.session.back() {
            Ok(()) => {
                app.ui.reset_selection();
                app.ui.status = "Import discarded".into();
            }
            Err(e) => show_rejection(app, e),
        }
    }
    Ok(())
}

/// 確認画面のキー処理。
async fn handle_review_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = app.shortcuts.review.clone();
    let record_count = app.session.working().map_or(0, |w| w.records.len());

    if matches_shortcut(&k, &sc.confirm) {
        confirm_upload(app).await?;
    } else if matches_shortcut(&k, &sc.back) {
        // 画像割り当てへ戻る（作業データは保持される）。
        if let Err(e) = app.session.back() {
            show_rejection(app, e);
        }
    } else if matches_shortcut(&k, &sc.down) {
        if app.ui.selected + 1 < record_count {
            app.ui.selected += 1;
        }
    } else if matches_shortcut(&k, &sc.up) {
        app.ui.selected = app.ui.selected.saturating_sub(1);
    }
    Ok(())
}

/// 進捗画面のキー処理。
async fn handle_progress_key(app: &mut App, k: KeyEvent) -> Result<()> {
    let sc = app.shortcuts.progress.clone();
    let (outcome_count, finished) = match &app.session.stage {
        Stage::Progress(p) => (p.outcomes.len(), p.finished || p.error.is_some()),
        _ => (0, false),
    };

    if matches_shortcut(&k, &sc.down) {
        if app.ui.selected + 1 < outcome_count {
            app.ui.selected += 1;
        }
    } else if matches_shortcut(&k, &sc.up) {
        app.ui.selected = app.ui.selected.saturating_sub(1);
    } else if matches_shortcut(&k, &sc.done) && finished {
        // 完了後は新しいインポートを始められる。
        close_wizard(app).await?;
    }
    Ok(())
}

/// 選択中レコードの画像枚数。
fn selected_image_count(app: &App) -> usize {
    app.session
        .working()
        .and_then(|w| w.records.get(app.ui.selected))
        .map_or(0, |r| r.images.len())
}

/// 選択中の画像を割り当てから外す。
fn remove_selected_image(app: &mut App) {
    let Some(slug) = app
        .session
        .working()
        .and_then(|w| w.records.get(app.ui.selected))
        .map(|r| r.slug.clone())
    else {
        return;
    };
    if let Some(removed) = app.session.remove_image(&slug, app.ui.selected_image) {
        app.ui.push_log(format!("Removed {} from {slug}", removed.filename));
        // 末尾を消した場合は選択位置を詰める。
        let remaining = selected_image_count(app);
        if app.ui.selected_image >= remaining {
            app.ui.selected_image = remaining.saturating_sub(1);
        }
    }
}

/// 有効なレコードをWorkerへ渡してアップロードを開始する。
async fn confirm_upload(app: &mut App) -> Result<()> {
    if !app.session.can_confirm() {
        // 有効なレコードが無い間は確定を受け付けない。
        app.ui.error = Some(WizardError::NothingEligible.to_string());
        return Ok(());
    }
    let catalogs = match app.session.catalogs() {
        Ok(c) => c,
        Err(e) => {
            show_rejection(app, e);
            return Ok(());
        }
    };
    match app.session.confirm() {
        Ok(batch) => {
            tracing::info!("upload confirmed: {} records", batch.records.len());
            app.ui.reset_selection();
            app.ui.error = None;
            app.ui.busy = true;
            app.ui.status = format!("Uploading 0/{}", batch.records.len());
            app.worker_tx
                .send(WorkerCmd::StartUpload { batch, catalogs })
                .await?;
        }
        Err(e) => show_rejection(app, e),
    }
    Ok(())
}

/// ウィザードを閉じて最初からやり直す。
async fn close_wizard(app: &mut App) -> Result<()> {
    // アップロード中は取り消せない。
    if let Stage::Progress(p) = &app.session.stage
        && !p.finished
        && p.error.is_none()
    {
        app.ui.status = "Upload in progress; wait for it to finish".into();
        return Ok(());
    }
    app.session.close();
    app.ui.reset_selection();
    app.ui.error = None;
    // 新しいセッション用にカタログを取り直す。
    request_catalogs(app).await
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが無ければ何もしない。
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };

    // 入力ボックス用ショートカットを参照する。
    let sc = &app.shortcuts.input_box;

    if matches_shortcut(&k, &sc.confirm) {
        // 入力ボックスを閉じる前に値と反映先を保存する。
        let value = input_state.path_value();
        let target = input_state.target;
        app.input_box = None;

        // 反映先に応じてWorkerへ依頼する。
        apply_input(app, target, value).await?;
    } else if matches_shortcut(&k, &sc.cancel) {
        // 入力を破棄して入力ボックスを閉じる。
        app.input_box = None;
    } else if matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code
        && !k.modifiers.contains(KeyModifiers::CONTROL)
    {
        // コントロールキーでない場合のみ挿入する。
        input_state.insert_char(c);
    }

    Ok(false)
}

/// 確定した入力値をWorkerへのコマンドに変換する。
async fn apply_input(app: &mut App, target: InputTarget, value: String) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let path = PathBuf::from(value);

    let cmd = match target {
        InputTarget::TemplatePath => match app.session.catalogs() {
            Ok(catalogs) => WorkerCmd::WriteTemplate { path, catalogs },
            Err(e) => {
                show_rejection(app, e);
                return Ok(());
            }
        },
        InputTarget::ImportFile => match app.session.catalogs() {
            Ok(catalogs) => {
                app.ui.status = format!("Reading {}...", path.display());
                WorkerCmd::ParseFile {
                    session_id: app.session.id,
                    path,
                    catalogs,
                }
            }
            Err(e) => {
                show_rejection(app, e);
                return Ok(());
            }
        },
        InputTarget::ImagePath => {
            app.ui.status = format!("Reading images from {}...", path.display());
            WorkerCmd::LoadImages {
                session_id: app.session.id,
                path,
            }
        }
    };

    app.ui.busy = true;
    app.ui.error = None;
    app.worker_tx.send(cmd).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::{App, handle_worker_event},
        config::Config,
        events::UiState,
        import::{CatalogEntry, REQUIRED_FIELDS, ReferenceCatalogs, fixtures, parse_import},
        shortcuts::Shortcuts,
        wizard::WizardSession,
        worker::WorkerEvent,
    };
    use tokio::sync::mpsc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::empty())
    }

    fn test_app() -> (App, mpsc::Receiver<WorkerCmd>) {
        let (tx_cmd, rx_cmd) = mpsc::channel(8);
        let (_tx_ev, rx_ev) = mpsc::channel(8);
        let mut session = WizardSession::new();
        session.set_catalogs(ReferenceCatalogs {
            categories: vec![CatalogEntry::new("c1", "rings", "Rings")],
            ..Default::default()
        });
        let app = App {
            cfg: Config::default(),
            session,
            ui: UiState::default(),
            worker_tx: tx_cmd,
            worker_rx: rx_ev,
            input_box: None,
            shortcuts: Shortcuts::default(),
        };
        (app, rx_cmd)
    }

    /// 有効行1件・エラー行1件の取り込み結果を反映した状態にする。
    fn at_images(app: &mut App) {
        app.session.begin().unwrap();
        let blank = vec![""; REQUIRED_FIELDS.len()];
        let mut valid = blank.clone();
        valid[0] = "Rose Ring";
        valid[7] = "20";
        let mut invalid = blank;
        invalid[1] = "SKU9";
        let text = format!(
            "{}\n{}\n{}\n",
            REQUIRED_FIELDS.join(","),
            valid.join(","),
            invalid.join(",")
        );
        let catalogs = app.session.catalogs().unwrap();
        let session_id = app.session.id;
        handle_worker_event(
            app,
            WorkerEvent::FileParsed {
                session_id,
                result: parse_import(text.as_bytes(), &catalogs),
            },
        );
    }

    async fn type_path(app: &mut App, path: &str) {
        for c in path.chars() {
            handle_key(app, key(KeyCode::Char(c))).await.unwrap();
        }
        handle_key(app, key(KeyCode::Enter)).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_file_sends_parse_command() {
        // ファイルパス入力でParseFileが送られることを検証する。
        let (mut app, mut rx) = test_app();
        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.session.kind(), StageKind::Upload);

        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.input_box.is_some());
        type_path(&mut app, "/tmp/hello.csv").await;
        assert!(app.input_box.is_none());
        match rx.recv().await {
            Some(WorkerCmd::ParseFile { path, .. }) => {
                assert_eq!(path, PathBuf::from("/tmp/hello.csv"))
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(app.ui.busy);
    }

    #[tokio::test]
    async fn test_quit_and_typing_do_not_collide() {
        // 入力中の q は終了ではなく文字として扱われることを検証する。
        let (mut app, _rx) = test_app();
        handle_key(&mut app, key(KeyCode::Char('d'))).await.unwrap();
        assert!(app.input_box.is_some());
        let quit = handle_key(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert!(!quit);
        handle_key(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert!(app.input_box.is_none());
        assert!(handle_key(&mut app, key(KeyCode::Char('q'))).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_selected_image() {
        // 選択中の画像が割り当てから外れることを検証する。
        let (mut app, _rx) = test_app();
        at_images(&mut app);
        app.session
            .add_images(
                vec![
                    fixtures::asset("rose-ring_1.png"),
                    fixtures::asset("rose-ring_2.png"),
                ],
                0,
            )
            .unwrap();
        handle_key(&mut app, key(KeyCode::Right)).await.unwrap();
        assert_eq!(app.ui.selected_image, 1);
        handle_key(&mut app, key(KeyCode::Char('x'))).await.unwrap();
        let working = app.session.working().unwrap();
        assert_eq!(working.records[0].images, vec!["rose-ring_1.png".to_string()]);
        assert_eq!(app.ui.selected_image, 0);
    }

    #[tokio::test]
    async fn test_confirm_starts_upload_with_valid_rows_only() {
        // 確定で有効行だけがWorkerへ渡されることを検証する。
        let (mut app, mut rx) = test_app();
        at_images(&mut app);
        handle_key(&mut app, key(KeyCode::Char('r'))).await.unwrap();
        assert_eq!(app.session.kind(), StageKind::Review);
        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.session.kind(), StageKind::Progress);
        match rx.recv().await {
            Some(WorkerCmd::StartUpload { batch, .. }) => {
                assert_eq!(batch.records.len(), 1);
                assert_eq!(batch.records[0].slug, "rose-ring");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_refused_while_uploading() {
        // アップロード中はやり直しできないことを検証する。
        let (mut app, mut rx) = test_app();
        at_images(&mut app);
        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(matches!(rx.recv().await, Some(WorkerCmd::StartUpload { .. })));

        let ctrl_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
        handle_key(&mut app, ctrl_x).await.unwrap();
        assert_eq!(app.session.kind(), StageKind::Progress);

        // Enterも完了前は無視される。
        handle_key(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.session.kind(), StageKind::Progress);
    }

    #[tokio::test]
    async fn test_back_from_images_discards_import() {
        let (mut app, _rx) = test_app();
        at_images(&mut app);
        handle_key(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.session.kind(), StageKind::Upload);
        assert!(app.session.working().is_none());
    }
}
