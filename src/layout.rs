//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// 画面全体の領域（STEP + Body + HELP + STATUS）
pub struct MainLayout {
    /// ステップ見出しの領域
    pub step_bar: Rect,
    /// 一覧 + INFO Panelの領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の2つの領域（一覧 + INFO Panel）
pub struct BodyLayout {
    /// レコード一覧などの領域
    pub list: Rect,
    /// INFO Panelの領域
    pub info_panel: Rect,
}

/// メイン画面を4つの領域に分割
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // ステップ見出し
            Constraint::Min(1),    // Body
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        step_bar: chunks[0],
        body: chunks[1],
        help_bar: chunks[2],
        status_bar: chunks[3],
    }
}

/// Body領域を2つに分割（一覧 65% + INFO Panel 35%）
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(65), // 一覧
            Constraint::Percentage(35), // INFO Panel
        ])
        .split(area);

    BodyLayout {
        list: chunks[0],
        info_panel: chunks[1],
    }
}
