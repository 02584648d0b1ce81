//! 描画側と共有するUI状態。

/// 画面表示用の一時的な状態（ウィザードの作業データは含まない）。
#[derive(Clone, Debug, Default)]
pub struct UiState {
    /// 一覧の選択行（レコード位置）。
    pub selected: usize,
    /// 選択レコード内の画像位置。
    pub selected_image: usize,
    /// INFOパネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// ワーカー由来のエラー（強調表示用）。
    pub error: Option<String>,
    /// ワーカーの処理待ちかどうか。
    pub busy: bool,
}

impl UiState {
    /// ログを追記する（古いものから捨てる）。
    pub fn push_log(&mut self, line: impl Into<String>) {
        const MAX_LOG: usize = 200;
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log.push(format!("{stamp} {}", line.into()));
        if self.log.len() > MAX_LOG {
            let drop = self.log.len() - MAX_LOG;
            self.log.drain(..drop);
        }
    }

    /// 選択位置を先頭へ戻す。
    pub fn reset_selection(&mut self) {
        self.selected = 0;
        self.selected_image = 0;
    }
}
