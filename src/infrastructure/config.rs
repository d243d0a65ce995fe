use crate::utils::config::EnvConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// 永続化されるユーザー設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// スロット数（未設定ならデフォルト）
    #[serde(default)]
    pub capacity: Option<usize>,
    /// 停止時の暗黙上書きを許可するか
    #[serde(default)]
    pub allow_implicit_overwrite: bool,
    /// 録音ファイルの保存先
    #[serde(default)]
    pub recordings_dir: Option<String>,
}

fn data_dir() -> io::Result<PathBuf> {
    let config = EnvConfig::get();
    let dir = if let Some(xdg_data_home) = &config.xdg_data_home {
        PathBuf::from(xdg_data_home).join("soundboard")
    } else {
        ProjectDirs::from("com", "user", "soundboard")
            .ok_or_else(|| io::Error::other("cannot resolve platform dirs"))?
            .data_local_dir()
            .to_path_buf()
    };
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// 設定ファイルのパス
pub fn config_path() -> io::Result<PathBuf> {
    Ok(data_dir()?.join("config.json"))
}

/// 録音ファイルのデフォルト保存先。録音は再起動をまたいで保持しないため一時ディレクトリを使う
pub fn default_recordings_dir() -> PathBuf {
    std::env::temp_dir().join("soundboard")
}

impl AppConfig {
    /// 設定ファイルを読み込みます。存在しない・壊れている場合はデフォルト。
    pub fn load() -> Self {
        match config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => AppConfig::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if let Ok(f) = fs::File::open(path) {
            if let Ok(cfg) = serde_json::from_reader(f) {
                return cfg;
            }
        }
        AppConfig::default()
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&config_path()?)
    }

    /// 一時ファイルに書き出してから rename する
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        {
            let f = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&f, self)?;
        }
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// 録音ファイルの保存先（環境変数 > 設定ファイル > 一時ディレクトリ）
    pub fn recordings_dir(&self, env: &EnvConfig) -> PathBuf {
        env.recordings_dir
            .as_ref()
            .or(self.recordings_dir.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(default_recordings_dir)
    }
}
