//! グローバル環境変数設定
//!
//! アプリケーション全体で使用する環境変数を一元管理。
//! プロセス起動時に一度だけ初期化し、以降はどこからでもアクセス可能。

use once_cell::sync::OnceCell;
use std::sync::Arc;

/// グローバル環境変数設定
static ENV_CONFIG: OnceCell<Arc<EnvConfig>> = OnceCell::new();

/// 環境変数設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// スロット数の上書き (`SOUNDBOARD_CAPACITY`)
    pub capacity: Option<usize>,
    /// 録音ファイルの保存先 (`SOUNDBOARD_RECORDINGS_DIR`)
    pub recordings_dir: Option<String>,
    /// 入力デバイスの優先リスト。カンマ区切り (`SOUNDBOARD_INPUT_DEVICE`)
    pub input_device_priority: Vec<String>,
    /// XDG Data Home ディレクトリ
    pub xdg_data_home: Option<String>,
    /// 環境変数ファイルのパス
    pub env_path: Option<String>,
}

impl EnvConfig {
    /// 環境変数から設定を読み取る（グローバルには登録しない）
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の取得関数から設定を組み立てる
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        EnvConfig {
            capacity: lookup("SOUNDBOARD_CAPACITY").and_then(|s| s.trim().parse().ok()),
            recordings_dir: lookup("SOUNDBOARD_RECORDINGS_DIR"),
            input_device_priority: lookup("SOUNDBOARD_INPUT_DEVICE")
                .map(|s| parse_priority_list(&s))
                .unwrap_or_default(),
            xdg_data_home: lookup("XDG_DATA_HOME"),
            env_path: lookup("SOUNDBOARD_ENV_PATH"),
        }
    }

    /// 全項目未設定の設定
    pub fn empty() -> Self {
        Self::default()
    }

    /// 環境変数から設定を初期化
    ///
    /// アプリケーション起動時に呼び出す。
    /// 既に初期化済みの場合は何もしない（冪等性を保証）。
    pub fn init() {
        // 並列実行時の競合を考慮：既に他のスレッドが初期化していても成功とする
        let _ = ENV_CONFIG.set(Arc::new(Self::from_env()));
    }

    /// 設定を取得。未初期化ならその場で環境変数から初期化する
    pub fn get() -> Arc<EnvConfig> {
        ENV_CONFIG
            .get_or_init(|| Arc::new(Self::from_env()))
            .clone()
    }
}

/// `"USB Mic, Built-in"` 形式の優先リストを分解
fn parse_priority_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
