//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Gauge, Paragraph, Row, Table, TableState, Wrap},
};

use crate::{
    import::ParsedProductRecord,
    input, layout,
    shortcuts::{Shortcuts, format_keys},
    upload::UploadOutcome,
    wizard::{ProgressState, Stage, StageKind, Working},
};

use super::App;

/// 選択行の強調表示スタイル。
fn highlight() -> Style {
    Style::default()
        .bg(Color::Rgb(255, 140, 0)) // オレンジ色の背景
        .fg(Color::Black) // 黒文字
        .add_modifier(Modifier::BOLD)
}

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // メインレイアウト（STEP + Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());
    let body_layout = layout::create_body_layout(main_layout.body);

    // ステップ見出しを描画する。
    f.render_widget(build_step_bar(app), main_layout.step_bar);

    // ステージごとに一覧とINFOパネルを描画する。
    match &app.session.stage {
        Stage::Template | Stage::Upload => {
            draw_instructions(f, app, body_layout.list);
            draw_info(f, app, catalog_info(app), body_layout.info_panel);
        }
        Stage::Images(working) => {
            draw_records(f, app, working, false, body_layout.list);
            draw_info(f, app, images_info(app, working), body_layout.info_panel);
        }
        Stage::Review(working) => {
            draw_records(f, app, working, true, body_layout.list);
            draw_info(f, app, review_info(app, working), body_layout.info_panel);
        }
        Stage::Progress(progress) => {
            draw_progress(f, app, progress, body_layout.list);
            draw_info(f, app, progress_info(app, progress), body_layout.info_panel);
        }
    }

    // HELPバー（ステージごとのショートカット）を描画する。
    let help_bar = Paragraph::new(get_help_text(app.session.kind(), &app.shortcuts))
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバーを描画する。
    f.render_widget(build_status_bar(app), main_layout.status_bar);

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

/// 現在ステップを強調したステップ見出しを構築する。
fn build_step_bar(app: &App) -> Paragraph<'static> {
    const STEPS: [(StageKind, &str); 5] = [
        (StageKind::Template, "Template"),
        (StageKind::Upload, "File"),
        (StageKind::Images, "Images"),
        (StageKind::Review, "Review"),
        (StageKind::Progress, "Upload"),
    ];
    let current = app.session.kind();

    let mut spans = vec![Span::raw(format!(
        "Step {}/{}  ",
        app.session.step_number(),
        app.session.total_steps
    ))];
    for (i, (kind, label)) in STEPS.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" > "));
        }
        let style = if *kind == current {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(*label, style));
    }

    Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("PRODUCT IMPORT"))
}

/// テンプレート/ファイル選択ステージの説明文を描画する。
fn draw_instructions(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = app
        .session
        .prompt()
        .lines()
        .map(|l| Line::from(l.to_string()))
        .collect();

    // 取り込み拒否の理由はここに表示する。
    if let Some(err) = &app.session.error {
        lines.push(Line::default());
        lines.push(Line::styled(
            format!("Import rejected: {err}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let content = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("IMPORT"))
        .wrap(Wrap { trim: false });
    f.render_widget(content, area);
}

/// レコード一覧を描画する（確認ステージでは合否とエラーを表示）。
fn draw_records(f: &mut Frame, app: &App, working: &Working, review: bool, area: Rect) {
    let rows = working.records.iter().map(|r| {
        let result = if r.is_eligible() { "OK" } else { "ERR" };
        let mut cells = vec![
            r.row.to_string(),
            r.slug.clone(),
            r.name.clone(),
            format!("{:.2}", r.price),
            result.to_string(),
        ];
        if review {
            cells.push(r.errors.first().cloned().unwrap_or_default());
        } else {
            cells.push(r.images.len().to_string());
        }
        let row = Row::new(cells);
        if r.is_eligible() {
            row
        } else {
            row.style(Style::default().fg(Color::Red))
        }
    });

    let last = if review { "first error" } else { "images" };
    let counts = working.counts();
    let title = format!(
        "{} ({} valid / {} with errors)",
        if review { "REVIEW" } else { "RECORDS" },
        counts.valid,
        counts.errors
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(12),
            Constraint::Min(12),
            Constraint::Length(10),
            Constraint::Length(4),
            Constraint::Min(if review { 20 } else { 6 }),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title(title))
    .header(Row::new(vec!["row", "slug", "name", "price", "ok", last]).bold())
    .row_highlight_style(highlight());

    // 選択中の行をハイライトする。
    let mut table_state = TableState::default();
    if !working.records.is_empty() {
        table_state.select(Some(app.ui.selected));
    }
    f.render_stateful_widget(table, area, &mut table_state);
}

/// 進捗ゲージと処理結果の一覧を描画する。
fn draw_progress(f: &mut Frame, app: &App, state: &ProgressState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    // 処理済み件数をゲージで表示する。
    let p = &state.progress;
    let ratio = if p.total == 0 {
        0.0
    } else {
        p.processed as f64 / p.total as f64
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("PROGRESS"))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!(
            "{}/{}  ok {}  failed {}",
            p.processed, p.total, p.succeeded, p.failed
        ));
    f.render_widget(gauge, chunks[0]);

    // 1件ごとの結果を行番号順に並べる。
    let rows = state.outcomes.iter().map(|o| match o {
        UploadOutcome::Created {
            row,
            slug,
            image_urls,
            ..
        } => Row::new(vec![
            row.to_string(),
            slug.clone(),
            "created".to_string(),
            format!("{} images", image_urls.len()),
        ])
        .style(Style::default().fg(Color::Green)),
        UploadOutcome::Failed { row, slug, error } => Row::new(vec![
            row.to_string(),
            slug.clone(),
            "failed".to_string(),
            error.clone(),
        ])
        .style(Style::default().fg(Color::Red)),
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(12),
            Constraint::Length(8),
            Constraint::Min(12),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title("RESULTS"))
    .header(Row::new(vec!["row", "slug", "result", "detail"]).bold())
    .row_highlight_style(highlight());

    let mut table_state = TableState::default();
    if !state.outcomes.is_empty() {
        table_state.select(Some(app.ui.selected.min(state.outcomes.len() - 1)));
    }
    f.render_stateful_widget(table, chunks[1], &mut table_state);
}

/// INFOパネル（ステージ固有の情報 + ログ）を描画する。
fn draw_info(f: &mut Frame, app: &App, detail: String, area: Rect) {
    let log = app
        .ui
        .log
        .iter()
        .rev()
        .take(8)
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    let info_panel = Paragraph::new(format!("{detail}\n\nLog:\n{log}"))
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, area);
}

/// 参照カタログの取得状況。
fn catalog_info(app: &App) -> String {
    match &app.session.catalogs {
        Some(c) => format!(
            "Categories: {}\nCollections: {}\nOptions: {}",
            c.categories.len(),
            c.collections.len(),
            c.options.len()
        ),
        None if app.ui.busy => "Loading catalogs...".to_string(),
        None => "Catalogs not loaded".to_string(),
    }
}

/// 選択中レコードの詳細（共通部分）。
fn record_header(r: &ParsedProductRecord) -> String {
    format!(
        "Row {}: {}\nslug: {}\nsku: {}",
        r.row,
        if r.name.is_empty() { "-" } else { r.name.as_str() },
        r.slug,
        if r.sku.is_empty() { "-" } else { r.sku.as_str() },
    )
}

/// 画像ステージの詳細（選択レコードの画像と直近の照合結果）。
fn images_info(app: &App, working: &Working) -> String {
    let mut lines = Vec::new();
    if let Some(r) = working.records.get(app.ui.selected) {
        lines.push(record_header(r));
        lines.push(String::new());
        if r.images.is_empty() {
            lines.push("No images".to_string());
        }
        for (i, name) in r.images.iter().enumerate() {
            // 選択中の画像に印を付ける。
            let marker = if i == app.ui.selected_image { "→" } else { " " };
            lines.push(format!("{marker} {name}"));
        }
    }
    lines.push(String::new());
    lines.push(format!("Pending images: {}", working.images.len()));
    if let Some(m) = &working.last_match {
        lines.push(format!(
            "Last batch: {} matched, {} unmatched, {} rejected",
            m.matched, m.unmatched, m.rejected
        ));
    }
    lines.join("\n")
}

/// 確認ステージの詳細（選択レコードの全エラー）。
fn review_info(app: &App, working: &Working) -> String {
    let Some(r) = working.records.get(app.ui.selected) else {
        return "No records".to_string();
    };
    let mut lines = vec![record_header(r), String::new()];
    if r.errors.is_empty() {
        lines.push(format!("Ready to upload ({} images)", r.images.len()));
    } else {
        lines.push("Will be skipped:".to_string());
        lines.extend(r.errors.iter().map(|e| format!("- {e}")));
    }
    lines.join("\n")
}

/// 進捗ステージの詳細（選択結果と最終集計）。
fn progress_info(app: &App, state: &ProgressState) -> String {
    let mut lines = Vec::new();
    if let Some(o) = state.outcomes.get(app.ui.selected) {
        match o {
            UploadOutcome::Created { slug, id, image_urls, .. } => {
                lines.push(format!("{slug} created as {id}"));
                lines.extend(image_urls.iter().cloned());
            }
            UploadOutcome::Failed { slug, error, .. } => {
                lines.push(format!("{slug} failed"));
                lines.push(error.clone());
            }
        }
        lines.push(String::new());
    }
    if let Some(err) = &state.error {
        lines.push(format!("Upload aborted: {err}"));
    } else if state.finished {
        lines.push(format!(
            "Done: {} created, {} failed",
            state.progress.succeeded, state.progress.failed
        ));
    } else {
        lines.push("Uploading...".to_string());
    }
    lines.join("\n")
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    // エラーの有無でステータス文字列を切り替える。
    let status_text = if let Some(err) = &app.ui.error {
        format!("ERROR: {err}")
    } else if app.ui.busy {
        format!("{} (working)", app.ui.status)
    } else {
        app.ui.status.clone()
    };

    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は赤色で強調表示する。
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }

    status_bar
}

/// 現在ステージに応じたヘルプ文字列を返す。
fn get_help_text(stage: StageKind, shortcuts: &Shortcuts) -> String {
    let common = format!(
        "{}: restart | {}: quit",
        format_keys(&shortcuts.common.close),
        format_keys(&shortcuts.common.quit)
    );
    let stage_help = match stage {
        StageKind::Template => format!(
            "{}: start | {}: download template",
            format_keys(&shortcuts.template.begin),
            format_keys(&shortcuts.template.download)
        ),
        StageKind::Upload => format!(
            "{}: select file",
            format_keys(&shortcuts.upload.open_file)
        ),
        StageKind::Images => format!(
            "{}: add images | {}: remove image | {}/{}: row | {}/{}: image | {}: review | {}: upload | {}: back",
            format_keys(&shortcuts.images.add),
            format_keys(&shortcuts.images.remove),
            format_keys(&shortcuts.images.up),
            format_keys(&shortcuts.images.down),
            format_keys(&shortcuts.images.prev_image),
            format_keys(&shortcuts.images.next_image),
            format_keys(&shortcuts.images.review),
            format_keys(&shortcuts.images.confirm),
            format_keys(&shortcuts.images.back)
        ),
        StageKind::Review => format!(
            "{}: upload valid rows | {}/{}: row | {}: back",
            format_keys(&shortcuts.review.confirm),
            format_keys(&shortcuts.review.up),
            format_keys(&shortcuts.review.down),
            format_keys(&shortcuts.review.back)
        ),
        StageKind::Progress => format!(
            "{}/{}: row | {}: new import (when finished)",
            format_keys(&shortcuts.progress.up),
            format_keys(&shortcuts.progress.down),
            format_keys(&shortcuts.progress.done)
        ),
    };
    format!("{stage_help} | {common}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text_lists_stage_keys() {
        // ステージごとのヘルプに主要キーが含まれることを検証する。
        let sc = Shortcuts::default();
        let help = get_help_text(StageKind::Images, &sc);
        assert!(help.starts_with("a: add images | x/Delete: remove image"));
        assert!(help.ends_with("Ctrl+x: restart | q: quit"));
        assert!(get_help_text(StageKind::Template, &sc).contains("d: download template"));
    }
}
