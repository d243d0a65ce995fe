use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fixed-grid soundboard (record / play / clear)")]
pub struct Cli {
    /// スロット数（設定ファイル・環境変数より優先）
    #[arg(long)]
    pub capacity: Option<usize>,

    /// 停止時に録音済みスロットへの上書きを許可
    #[arg(long, default_value_t = false)]
    pub allow_implicit_overwrite: bool,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// 各種設定操作
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// 現在の設定を表示
    Show,
    /// 設定値を保存
    Set {
        #[command(subcommand)]
        field: ConfigField,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigField {
    /// スロット数
    Capacity { value: usize },
    /// 暗黙上書きの可否
    Overwrite {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// 録音ファイルの保存先
    #[command(name = "recordings-dir")]
    RecordingsDir { path: String },
}

/// 対話モードの 1 行コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `r`: 録音トグル
    Toggle,
    /// `p N`: スロット押下
    Press(usize),
    /// `c N`: スロット長押し（クリア）
    Clear(usize),
    /// `s`: 状態表示
    Status,
    /// `q`: 終了
    Quit,
    Help,
}

impl ReplCommand {
    /// 入力行を解釈します。空行や不明なコマンドは `None`
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let head = parts.next()?;
        let arg = parts.next().and_then(|s| s.parse::<usize>().ok());
        if parts.next().is_some() {
            return None;
        }
        match (head, arg) {
            ("r" | "record", None) => Some(Self::Toggle),
            ("p" | "press", Some(n)) => Some(Self::Press(n)),
            ("c" | "clear", Some(n)) => Some(Self::Clear(n)),
            ("s" | "status", None) => Some(Self::Status),
            ("q" | "quit" | "exit", None) => Some(Self::Quit),
            ("h" | "help" | "?", None) => Some(Self::Help),
            _ => None,
        }
    }
}

pub const REPL_HELP: &str = "commands: r (toggle recording) | p N (press slot) | c N (clear slot) | s (status) | q (quit)";
