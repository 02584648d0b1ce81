//! パス入力用のポップアップ（InputBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

/// InputBox入力状態
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値
    pub value: String,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 確定時の反映先
    pub target: InputTarget,
}

/// 入力確定時にどの操作へ渡すか
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputTarget {
    /// テンプレートの保存先
    TemplatePath,
    /// 取り込むCSVファイル
    ImportFile,
    /// 画像ファイルまたはフォルダ
    ImagePath,
}

impl InputBoxState {
    /// 初期値付きで開く（カーソルは末尾）。
    pub fn new(prompt: impl Into<String>, value: impl Into<String>, target: InputTarget) -> Self {
        let value = value.into();
        Self {
            prompt: prompt.into(),
            cursor: value.chars().count(),
            value,
            target,
        }
    }

    /// 文字単位のカーソル位置をバイト位置へ変換する。
    fn byte_at(&self, cursor: usize) -> usize {
        self.value
            .char_indices()
            .nth(cursor)
            .map_or(self.value.len(), |(i, _)| i)
    }

    /// 文字を挿入
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_at(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Backspace（カーソル前の文字を削除）
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_at(self.cursor);
        self.value.remove(at);
    }

    /// Delete（カーソル位置の文字を削除）
    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    /// カーソルを左に移動
    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// カーソルを右に移動
    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    /// カーソルを先頭に移動
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// カーソルを末尾に移動
    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// 行全体をクリア
    pub fn clear_line(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// 入力値（前後の空白と引用符を除去）。
    pub fn path_value(&self) -> String {
        // ドラッグ&ドロップで付く引用符を外す。
        self.value
            .trim()
            .trim_matches(|c| c == '\'' || c == '"')
            .to_string()
    }
}

/// InputBoxをポップアップとして描画
pub fn render_input_box(f: &mut Frame, state: &InputBoxState) {
    // 画面中央にポップアップ領域を確保する。
    let area = centered_popup(f.area(), 70, 7);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // プロンプト
            Constraint::Length(1), // 入力欄
            Constraint::Length(1), // 空行
            Constraint::Length(1), // ヘルプ
        ])
        .split(area);

    let prompt = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt, rows[0]);

    // 長いパスはカーソルが見える位置まで横スクロールする。
    let width = (rows[1].width as usize).saturating_sub(1).max(1);
    let skip = state.cursor.saturating_sub(width);
    let chars: Vec<char> = state.value.chars().collect();
    let before: String = chars[skip..state.cursor.min(chars.len())].iter().collect();
    let after: String = chars[state.cursor.min(chars.len())..]
        .iter()
        .take(width.saturating_sub(before.chars().count()))
        .collect();
    let input = Paragraph::new(format!("{before}|{after}")).style(Style::default().fg(Color::Green));
    f.render_widget(input, rows[1]);

    let help = Paragraph::new("Enter=確定 | ESC=キャンセル | Ctrl+U=クリア")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, rows[3]);
}

/// 中央配置のポップアップ領域を計算
fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_multibyte_path() {
        // マルチバイト文字を含むパスの編集を検証する。
        let mut s = InputBoxState::new("Path:", "商品.csv", InputTarget::ImportFile);
        assert_eq!(s.cursor, 6);
        s.move_home();
        s.move_right();
        s.move_right();
        s.insert_char('_');
        assert_eq!(s.value, "商品_.csv");
        s.backspace();
        s.delete();
        assert_eq!(s.value, "商品csv");
        s.move_end();
        s.backspace();
        assert_eq!(s.value, "商品cs");
        s.clear_line();
        assert_eq!((s.value.as_str(), s.cursor), ("", 0));
    }

    #[test]
    fn test_path_value_strips_quotes() {
        // ドロップ時の引用符と空白が除去されることを検証する。
        let s = InputBoxState::new("Path:", " '/tmp/images dir' ", InputTarget::ImagePath);
        assert_eq!(s.path_value(), "/tmp/images dir");
    }
}
