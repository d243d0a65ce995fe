use thiserror::Error;
use tokio::sync::oneshot;

pub mod cpal_backend;
pub mod wav;
pub use cpal_backend::CpalAudioDevice;

/// マイク使用許可の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// デバイス側のキャプチャセッション識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureToken(pub u64);

/// デバイス側の再生セッション識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackToken(pub u64);

/// 開始済みの再生セッション。
///
/// `completion` は再生 1 回につき一度だけ発火します（ループ再生はしない）。
/// 送信側が破棄された場合も完了として扱います。
#[derive(Debug)]
pub struct PlaybackStream {
    pub token: PlaybackToken,
    pub completion: oneshot::Receiver<()>,
}

/// オーディオデバイス層のエラー
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("no {0} device available")]
    NoDevice(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("unknown session token {0}")]
    UnknownSession(u64),

    #[error("audio file error: {0}")]
    File(String),
}

impl From<hound::Error> for DeviceError {
    fn from(error: hound::Error) -> Self {
        DeviceError::File(error.to_string())
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(error: std::io::Error) -> Self {
        DeviceError::File(error.to_string())
    }
}
