//! ショートカット設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ショートカット設定の全体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortcuts {
    pub common: CommonShortcuts,
    pub template: TemplateShortcuts,
    pub upload: UploadShortcuts,
    pub images: ImagesShortcuts,
    pub review: ReviewShortcuts,
    pub progress: ProgressShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// 全ステージ共通のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonShortcuts {
    pub quit: Vec<String>,
    /// ウィザードを閉じて最初からやり直す。
    pub close: Vec<String>,
}

/// テンプレート画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateShortcuts {
    pub begin: Vec<String>,
    pub download: Vec<String>,
}

/// ファイル選択画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadShortcuts {
    pub open_file: Vec<String>,
}

/// 画像割り当て画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesShortcuts {
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub down: Vec<String>,
    pub up: Vec<String>,
    pub next_image: Vec<String>,
    pub prev_image: Vec<String>,
    pub review: Vec<String>,
    pub confirm: Vec<String>,
    pub back: Vec<String>,
}

/// 確認画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewShortcuts {
    pub confirm: Vec<String>,
    pub back: Vec<String>,
    pub down: Vec<String>,
    pub up: Vec<String>,
}

/// 進捗画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressShortcuts {
    pub down: Vec<String>,
    pub up: Vec<String>,
    /// 完了後に新しいインポートを始める。
    pub done: Vec<String>,
}

/// InputBoxのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub clear_line: Vec<String>,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            // 既存ファイルを読み込んでパースする。
            let content = std::fs::read_to_string(path)?;
            let shortcuts: Shortcuts = toml::from_str(&content)?;
            Ok(shortcuts)
        } else {
            // 未作成の場合は既定値を利用する。
            Ok(Self::default())
        }
    }
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            common: CommonShortcuts {
                quit: vec!["q".into()],
                close: vec!["Ctrl+x".into()],
            },
            template: TemplateShortcuts {
                begin: vec!["Enter".into()],
                download: vec!["d".into()],
            },
            upload: UploadShortcuts {
                open_file: vec!["Enter".into(), "o".into()],
            },
            images: ImagesShortcuts {
                add: vec!["a".into()],
                remove: vec!["x".into(), "Delete".into()],
                down: vec!["Down".into(), "j".into()],
                up: vec!["Up".into(), "k".into()],
                next_image: vec!["Right".into(), "l".into()],
                prev_image: vec!["Left".into(), "h".into()],
                review: vec!["r".into()],
                confirm: vec!["Enter".into()],
                back: vec!["Esc".into()],
            },
            review: ReviewShortcuts {
                confirm: vec!["Enter".into()],
                back: vec!["Esc".into()],
                down: vec!["Down".into(), "j".into()],
                up: vec!["Up".into(), "k".into()],
            },
            progress: ProgressShortcuts {
                down: vec!["Down".into(), "j".into()],
                up: vec!["Up".into(), "k".into()],
                done: vec!["Enter".into()],
            },
            input_box: InputBoxShortcuts {
                confirm: vec!["Enter".into()],
                cancel: vec!["Esc".into()],
                backspace: vec!["Backspace".into()],
                delete: vec!["Delete".into()],
                left: vec!["Left".into()],
                right: vec!["Right".into()],
                home: vec!["Home".into()],
                end: vec!["End".into()],
                clear_line: vec!["Ctrl+u".into()],
            },
        }
    }
}

/// KeyEventがいずれかのショートカット文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts.iter().any(|s| matches_single_shortcut(key, s))
}

/// KeyEventが単一のショートカット文字列と一致するか判定する。
fn matches_single_shortcut(key: &KeyEvent, shortcut: &str) -> bool {
    // ショートカット文字列を分解する（例: "Ctrl+u", "a", "Enter"）。
    let parts: Vec<&str> = shortcut.split('+').collect();
    let (modifiers_str, key_str) = match parts.split_last() {
        Some((last, rest)) => (rest, *last),
        None => return false,
    };

    // 修飾キーを解析して期待値を作る。
    let mut expected_modifiers = KeyModifiers::empty();
    for modifier in modifiers_str {
        match modifier.to_ascii_lowercase().as_str() {
            "ctrl" => expected_modifiers |= KeyModifiers::CONTROL,
            "alt" => expected_modifiers |= KeyModifiers::ALT,
            "shift" => expected_modifiers |= KeyModifiers::SHIFT,
            _ => return false,
        }
    }

    // 修飾キーが一致しなければ即座に不一致とする。
    if key.modifiers != expected_modifiers {
        return false;
    }

    // キーコードの種別ごとに一致判定を行う。
    match key_str.to_ascii_lowercase().as_str() {
        "enter" => key.code == KeyCode::Enter,
        "esc" => key.code == KeyCode::Esc,
        "tab" => key.code == KeyCode::Tab,
        "backspace" => key.code == KeyCode::Backspace,
        "delete" => key.code == KeyCode::Delete,
        "up" => key.code == KeyCode::Up,
        "down" => key.code == KeyCode::Down,
        "left" => key.code == KeyCode::Left,
        "right" => key.code == KeyCode::Right,
        "home" => key.code == KeyCode::Home,
        "end" => key.code == KeyCode::End,
        // 単一文字は大文字小文字を区別して Char として比較する。
        _ => {
            let mut chars = key_str.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => key.code == KeyCode::Char(c),
                _ => false,
            }
        }
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
pub fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_shortcut_simple_char() {
        // 単一文字の一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("a")]));
        assert!(!matches_shortcut(&key, &[String::from("A")]));
    }

    #[test]
    fn test_matches_shortcut_special_key() {
        // 特殊キーの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Esc, KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("Esc")]));
        assert!(matches_shortcut(&key, &[String::from("esc")]));
        assert!(!matches_shortcut(&key, &[String::from("Enter")]));
    }

    #[test]
    fn test_matches_shortcut_with_modifier() {
        // 修飾キー付きの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
        assert!(matches_shortcut(&key, &[String::from("Ctrl+x")]));
        assert!(!matches_shortcut(&key, &[String::from("x")]));
        assert!(!matches_shortcut(&key, &[String::from("Hyper+x")]));
    }

    #[test]
    fn test_matches_shortcut_multiple_keys() {
        // 複数キーバインドの一致判定を検証する。
        let shortcuts = Shortcuts::default().images.down;
        let key_down = KeyEvent::new(KeyCode::Down, KeyModifiers::empty());
        let key_j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::empty());
        let key_k = KeyEvent::new(KeyCode::Char('k'), KeyModifiers::empty());
        assert!(matches_shortcut(&key_down, &shortcuts));
        assert!(matches_shortcut(&key_j, &shortcuts));
        assert!(!matches_shortcut(&key_k, &shortcuts));
    }

    #[test]
    fn test_input_box_keeps_letters_for_typing() {
        // パス入力中に文字キーがカーソル移動に奪われないことを検証する。
        let sc = Shortcuts::default().input_box;
        let key_h = KeyEvent::new(KeyCode::Char('h'), KeyModifiers::empty());
        let all = [
            &sc.confirm, &sc.cancel, &sc.backspace, &sc.delete, &sc.left, &sc.right, &sc.home,
            &sc.end, &sc.clear_line,
        ];
        assert!(all.iter().all(|keys| !matches_shortcut(&key_h, keys)));
    }

    #[test]
    fn test_load_rejects_partial_file() {
        // 項目が欠けた設定ファイルはエラーになることを検証する。
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shortcut.toml");
        std::fs::write(&path, "[common]\nquit = [\"q\"]\n").unwrap();
        assert!(Shortcuts::load_or_default(&path).is_err());
        assert!(Shortcuts::load_or_default(dir.path().join("none.toml")).is_ok());
    }
}
