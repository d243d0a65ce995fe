//! 統一エラーハンドリング
//!
//! soundboard コア全体で使用する統一エラー型を定義します。
//! デバイス層のエラー (`DeviceError`) はコントローラーで捕捉され、
//! ここで定義する種別に変換されてプレゼンテーション層へ通知されます。

use crate::infrastructure::audio::DeviceError;
use thiserror::Error;

/// soundboard コア全体で使用する統一エラー型
///
/// すべての種別は回復可能で、プロセスを停止させるものはありません。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoundboardError {
    // ========================================
    // スロット関連エラー
    // ========================================
    #[error("No free slot available")]
    NoFreeSlot,

    #[error("Slot index {index} out of range (capacity {capacity})")]
    InvalidIndex { index: usize, capacity: usize },

    // ========================================
    // 録音関連エラー
    // ========================================
    #[error("Recording already in progress")]
    RecordingInProgress,

    #[error("Recording not started")]
    RecordingNotStarted,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Recording failed: {0}")]
    RecordingFailed(String),

    // ========================================
    // 再生関連エラー
    // ========================================
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    // ========================================
    // ライフサイクル・設定関連エラー
    // ========================================
    #[error("Soundboard is shut down")]
    ShutDown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("System error: {0}")]
    SystemError(String),
}

/// 統一Result型エイリアス
pub type Result<T> = std::result::Result<T, SoundboardError>;

// ========================================
// デバイス層エラーからの変換
// ========================================

impl SoundboardError {
    /// 録音中に発生したデバイスエラーを変換
    pub fn recording(error: DeviceError) -> Self {
        match error {
            DeviceError::PermissionDenied => SoundboardError::PermissionDenied,
            other => SoundboardError::RecordingFailed(other.to_string()),
        }
    }

    /// 再生中に発生したデバイスエラーを変換
    pub fn playback(error: DeviceError) -> Self {
        SoundboardError::PlaybackFailed(error.to_string())
    }
}

// ========================================
// ヘルパー関数
// ========================================

impl SoundboardError {
    /// エラーが再試行可能かどうかを判定
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SoundboardError::RecordingInProgress
                | SoundboardError::RecordingFailed(_)
                | SoundboardError::PlaybackFailed(_)
                | SoundboardError::PermissionDenied
        )
    }

    /// エラーがユーザーアクションで解決可能かどうかを判定
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            SoundboardError::NoFreeSlot
                | SoundboardError::PermissionDenied
                | SoundboardError::InvalidConfig(_)
        )
    }

    /// エラーの重要度レベルを取得（ログレベル代替）
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SoundboardError::SystemError(_) | SoundboardError::InvalidConfig(_) => {
                ErrorSeverity::Error
            }

            SoundboardError::RecordingFailed(_)
            | SoundboardError::PlaybackFailed(_)
            | SoundboardError::PermissionDenied => ErrorSeverity::Warning,

            SoundboardError::NoFreeSlot | SoundboardError::InvalidIndex { .. } => {
                ErrorSeverity::Info
            }

            _ => ErrorSeverity::Debug,
        }
    }
}

/// エラーの重要度レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_mapping() {
        assert_eq!(
            SoundboardError::recording(DeviceError::PermissionDenied),
            SoundboardError::PermissionDenied
        );
        assert!(matches!(
            SoundboardError::recording(DeviceError::Capture("mic unplugged".into())),
            SoundboardError::RecordingFailed(msg) if msg.contains("mic unplugged")
        ));
        assert!(matches!(
            SoundboardError::playback(DeviceError::NoDevice("output".into())),
            SoundboardError::PlaybackFailed(_)
        ));
    }

    #[test]
    fn test_invalid_index_display() {
        let error = SoundboardError::InvalidIndex {
            index: 60,
            capacity: 54,
        };
        assert_eq!(
            error.to_string(),
            "Slot index 60 out of range (capacity 54)"
        );
    }

    #[test]
    fn test_severity_and_flags() {
        assert_eq!(SoundboardError::NoFreeSlot.severity(), ErrorSeverity::Info);
        assert_eq!(
            SoundboardError::SystemError("poisoned".into()).severity(),
            ErrorSeverity::Error
        );
        assert!(SoundboardError::PermissionDenied.is_retryable());
        assert!(SoundboardError::NoFreeSlot.is_user_actionable());
        assert!(!SoundboardError::ShutDown.is_retryable());
    }
}
