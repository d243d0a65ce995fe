//! Application層の抽象化トレイト定義
//! オーディオデバイスを抽象化し、テスト可能な構造を提供します

use crate::domain::AudioHandle;
use crate::infrastructure::audio::{
    CaptureToken, DeviceError, Permission, PlaybackStream,
};
use async_trait::async_trait;

/// 録音・再生デバイスの抽象化
///
/// `begin_capture` → `end_capture` は 1 対で呼ばれることを前提とします。
/// 再生は何本でも同時に開けます。
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// マイク使用許可を要求
    async fn request_permission(&self) -> Permission;

    /// 録音用のデバイスモードを設定（冪等。録音開始のたびに呼ばれてよい）
    async fn configure_for_capture(&self) -> Result<(), DeviceError>;

    /// キャプチャを開始
    async fn begin_capture(&self) -> Result<CaptureToken, DeviceError>;

    /// キャプチャを終了してフラッシュし、録音データへのハンドルを返す
    async fn end_capture(&self, token: CaptureToken) -> Result<AudioHandle, DeviceError>;

    /// ハンドルから再生を開始し、完了通知付きのセッションを返す
    async fn begin_playback(&self, handle: &AudioHandle) -> Result<PlaybackStream, DeviceError>;

    /// 不要になったハンドルのリソースを解放（ベストエフォート）
    async fn release_resource(&self, handle: AudioHandle);
}
