//! サービスコンテナ
//!
//! # 責任
//! - コントローラーとデバイス・イベントチャンネルの構築
//! - テスト時のモック注入サポート

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::{
    ControllerConfig, SoundboardController, SoundboardEvent, traits::AudioDevice,
};
use crate::error::Result;
use crate::infrastructure::audio::CpalAudioDevice;

/// サービスコンテナ
pub struct ServiceContainer {
    /// コントローラー（インテント処理のため複数タスクから共有）
    pub controller: Arc<SoundboardController>,
    /// イベント受信チャンネル
    pub event_rx: Option<mpsc::UnboundedReceiver<SoundboardEvent>>,
}

impl ServiceContainer {
    /// cpal デバイスで作成
    pub fn new(
        config: ControllerConfig,
        recordings_dir: PathBuf,
        input_priority: Vec<String>,
    ) -> Result<Self> {
        let device = Arc::new(CpalAudioDevice::new(recordings_dir, input_priority));
        Self::with_dependencies(config, device)
    }

    /// 依存関係を注入して作成（テスト用）
    pub fn with_dependencies(
        config: ControllerConfig,
        device: Arc<dyn AudioDevice>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Arc::new(SoundboardController::new(device, config, tx)?);

        Ok(ServiceContainer {
            controller,
            event_rx: Some(rx),
        })
    }

    /// イベント受信チャンネルを取得（一度だけ）
    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<SoundboardEvent>> {
        self.event_rx.take()
    }
}

/// テスト用のヘルパー実装
pub mod test_helpers {
    use super::*;
    use crate::domain::AudioHandle;
    use crate::infrastructure::audio::{
        CaptureToken, DeviceError, Permission, PlaybackStream, PlaybackToken,
    };
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::{Mutex, MutexGuard};
    use tokio::sync::{Notify, oneshot};

    /// モックデバイスの挙動設定
    #[derive(Debug, Default)]
    pub struct MockScript {
        pub deny_permission: bool,
        pub fail_configure: bool,
        pub fail_begin_capture: bool,
        pub fail_end_capture: bool,
        pub fail_playback: bool,
        /// 再生開始と同時に完了通知を送る
        pub auto_complete_playback: bool,
    }

    #[derive(Debug, Default)]
    struct MockState {
        script: MockScript,
        next_token: u64,
        handles_issued: u64,
        permission_requests: usize,
        open_captures: HashSet<u64>,
        pending_playbacks: BTreeMap<u64, (AudioHandle, oneshot::Sender<()>)>,
        played: Vec<AudioHandle>,
        released: Vec<AudioHandle>,
    }

    /// テスト用のモックオーディオデバイス
    ///
    /// 録音 n 本目のハンドルは `"h{n}"` になります。
    #[derive(Default)]
    pub struct MockAudioDevice {
        state: Mutex<MockState>,
        capture_gate: Option<Arc<Notify>>,
        flush_gate: Option<Arc<Notify>>,
    }

    impl MockAudioDevice {
        pub fn new() -> Self {
            Self::default()
        }

        /// `begin_capture` をゲートが開くまで保留させる
        pub fn with_capture_gate(mut self, gate: Arc<Notify>) -> Self {
            self.capture_gate = Some(gate);
            self
        }

        /// `end_capture` をゲートが開くまで保留させる
        pub fn with_flush_gate(mut self, gate: Arc<Notify>) -> Self {
            self.flush_gate = Some(gate);
            self
        }

        pub fn script(&self, f: impl FnOnce(&mut MockScript)) {
            f(&mut self.lock().script);
        }

        pub fn permission_requests(&self) -> usize {
            self.lock().permission_requests
        }

        pub fn open_captures(&self) -> usize {
            self.lock().open_captures.len()
        }

        pub fn played(&self) -> Vec<AudioHandle> {
            self.lock().played.clone()
        }

        pub fn released(&self) -> Vec<AudioHandle> {
            self.lock().released.clone()
        }

        /// 完了待ちの再生トークン（開始順）
        pub fn pending_playbacks(&self) -> Vec<PlaybackToken> {
            self.lock()
                .pending_playbacks
                .keys()
                .map(|&id| PlaybackToken(id))
                .collect()
        }

        /// 指定トークンの再生を完了させる
        pub fn complete_playback(&self, token: PlaybackToken) -> bool {
            match self.lock().pending_playbacks.remove(&token.0) {
                Some((_, tx)) => tx.send(()).is_ok(),
                None => false,
            }
        }

        /// 指定ハンドルの最も古い再生を完了させる
        pub fn complete_playback_of(&self, handle: &AudioHandle) -> bool {
            let token = self
                .lock()
                .pending_playbacks
                .iter()
                .find(|(_, (h, _))| h == handle)
                .map(|(&id, _)| PlaybackToken(id));
            token.is_some_and(|token| self.complete_playback(token))
        }

        fn lock(&self) -> MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    #[async_trait]
    impl AudioDevice for MockAudioDevice {
        async fn request_permission(&self) -> Permission {
            let mut state = self.lock();
            state.permission_requests += 1;
            if state.script.deny_permission {
                Permission::Denied
            } else {
                Permission::Granted
            }
        }

        async fn configure_for_capture(&self) -> std::result::Result<(), DeviceError> {
            if self.lock().script.fail_configure {
                return Err(DeviceError::Capture("audio mode rejected".into()));
            }
            Ok(())
        }

        async fn begin_capture(&self) -> std::result::Result<CaptureToken, DeviceError> {
            if let Some(gate) = &self.capture_gate {
                gate.notified().await;
            }
            let mut state = self.lock();
            if state.script.fail_begin_capture {
                return Err(DeviceError::NoDevice("input".into()));
            }
            state.next_token += 1;
            let id = state.next_token;
            state.open_captures.insert(id);
            Ok(CaptureToken(id))
        }

        async fn end_capture(
            &self,
            token: CaptureToken,
        ) -> std::result::Result<AudioHandle, DeviceError> {
            if let Some(gate) = &self.flush_gate {
                gate.notified().await;
            }
            let mut state = self.lock();
            if !state.open_captures.remove(&token.0) {
                return Err(DeviceError::UnknownSession(token.0));
            }
            if state.script.fail_end_capture {
                return Err(DeviceError::Capture("flush failed".into()));
            }
            state.handles_issued += 1;
            Ok(AudioHandle::new(format!("h{}", state.handles_issued)))
        }

        async fn begin_playback(
            &self,
            handle: &AudioHandle,
        ) -> std::result::Result<PlaybackStream, DeviceError> {
            let mut state = self.lock();
            if state.script.fail_playback {
                return Err(DeviceError::Playback(format!("cannot open {handle}")));
            }
            state.next_token += 1;
            let id = state.next_token;
            state.played.push(handle.clone());

            let (tx, rx) = oneshot::channel();
            if state.script.auto_complete_playback {
                let _ = tx.send(());
            } else {
                state.pending_playbacks.insert(id, (handle.clone(), tx));
            }
            Ok(PlaybackStream {
                token: PlaybackToken(id),
                completion: rx,
            })
        }

        async fn release_resource(&self, handle: AudioHandle) {
            self.lock().released.push(handle);
        }
    }
}
