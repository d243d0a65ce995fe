//! プレゼンテーション層へ通知するイベントと状態スナップショット

use crate::domain::Slot;
use crate::error::SoundboardError;

/// コアから送出されるイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundboardEvent {
    /// 録音開始（デバイス準備完了）
    RecordingStarted { slot: usize, session_id: u64 },
    /// 録音停止、スロットへ割り当て済み
    RecordingStopped { slot: usize, session_id: u64 },
    /// スロットがクリアされた
    SlotCleared { slot: usize },
    /// 再生開始。スロット外のハンドル再生では `slot` は `None`
    PlaybackStarted { session_id: u64, slot: Option<usize> },
    /// 再生完了、セッション破棄済み
    PlaybackFinished { session_id: u64 },
    /// 表示用エラー
    Error(SoundboardError),
}

/// 描画用のボード状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub slots: Vec<Slot>,
    /// 録音中の対象スロット
    pub recording: Option<usize>,
}

impl BoardSnapshot {
    /// 各スロットが録音済みかどうか
    pub fn recorded_flags(&self) -> Vec<bool> {
        self.slots.iter().map(|s| !s.is_empty()).collect()
    }
}
