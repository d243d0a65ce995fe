//! サウンドボードコントローラー
//!
//! # 責任
//! - プレゼンテーション層からのインテント（トグル・押下・長押し）の検証と委譲
//! - スロット内容の唯一の書き込み口
//! - デバイス層の失敗を捕捉し、エラーイベントとして通知
//!
//! ロック順序は「録音コンテキスト → スロットストア」で固定です。

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::application::events::{BoardSnapshot, SoundboardEvent};
use crate::application::playback_service::PlaybackService;
use crate::application::recording_service::{RecordingService, RecordingState};
use crate::application::traits::AudioDevice;
use crate::domain::{AudioHandle, SlotContent, SlotStore};
use crate::error::{ErrorSeverity, Result, SoundboardError};
use crate::infrastructure::config::AppConfig;
use crate::utils::config::EnvConfig;

/// デフォルトのスロット数 (6 x 9 グリッド)
pub const DEFAULT_CAPACITY: usize = 54;

/// コントローラー設定
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// スロット数
    pub capacity: usize,
    /// 停止時に録音先スロットが埋まっていた場合に上書きを許すか。
    /// `false` なら最小の空きスロットへ退避する
    pub allow_implicit_overwrite: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            allow_implicit_overwrite: false,
        }
    }
}

impl ControllerConfig {
    /// 永続設定と環境変数から解決（環境変数が優先）
    pub fn resolve(settings: &AppConfig, env: &EnvConfig) -> Self {
        Self {
            capacity: env
                .capacity
                .or(settings.capacity)
                .unwrap_or(DEFAULT_CAPACITY),
            allow_implicit_overwrite: settings.allow_implicit_overwrite,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(SoundboardError::InvalidConfig(
                "capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// 録音トグルの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started { slot: usize, session_id: u64 },
    Stopped { slot: usize, session_id: u64 },
}

/// スロット押下の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPressOutcome {
    /// 録音済みスロットの再生を開始した
    Playing { session_id: u64 },
    /// 空きスロット押下で録音を開始した
    RecordingStarted { slot: usize, session_id: u64 },
    /// 録音中の空きスロット押下。何もしない
    Ignored,
}

/// 停止時に確定したスロット
#[derive(Debug)]
struct Committed {
    slot: usize,
    displaced: Option<AudioHandle>,
}

/// コントローラー
pub struct SoundboardController {
    store: Arc<Mutex<SlotStore>>,
    recording: RecordingService,
    playback: PlaybackService,
    device: Arc<dyn AudioDevice>,
    config: ControllerConfig,
    events: mpsc::UnboundedSender<SoundboardEvent>,
}

impl SoundboardController {
    /// 新しいコントローラーを作成
    pub fn new(
        device: Arc<dyn AudioDevice>,
        config: ControllerConfig,
        events: mpsc::UnboundedSender<SoundboardEvent>,
    ) -> Result<Self> {
        config.validate()?;
        info!(capacity = config.capacity, "soundboard initialized");

        Ok(Self {
            store: Arc::new(Mutex::new(SlotStore::new(config.capacity))),
            recording: RecordingService::new(device.clone()),
            playback: PlaybackService::new(device.clone(), events.clone()),
            device,
            config,
            events,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 録音開始 / 停止トグル
    pub async fn on_record_toggle(&self) -> Result<ToggleOutcome> {
        let result = if self.recording.state().is_capturing() {
            self.stop_recording().await
        } else {
            self.start_recording()
                .await
                .map(|(slot, session_id)| ToggleOutcome::Started { slot, session_id })
        };
        self.report(result)
    }

    /// スロット押下: 録音済みなら再生、空なら録音開始（録音中は無視）
    pub async fn on_slot_press(&self, index: usize) -> Result<SlotPressOutcome> {
        let result = self.press(index).await;
        self.report(result)
    }

    /// スロット長押し: 録音・再生の状況にかかわらずクリアする。
    /// 実際にハンドルを破棄した場合は `true`
    pub async fn on_slot_long_press(&self, index: usize) -> Result<bool> {
        let result = self.clear_slot(index).await;
        self.report(result)
    }

    /// 取得済みハンドルを直接再生（スロットの現状態とは無関係）
    pub async fn play_handle(&self, handle: AudioHandle) -> Result<u64> {
        let result = self.playback.play(handle, None).await;
        self.report(result)
    }

    /// 描画用スナップショット
    pub fn snapshot(&self) -> Result<BoardSnapshot> {
        let recording = self.recording.state().target();
        let slots = self.lock_store()?.slots().to_vec();
        Ok(BoardSnapshot { slots, recording })
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording.state()
    }

    /// 録音状態の変化を購読
    pub fn watch_recording(&self) -> watch::Receiver<RecordingState> {
        self.recording.watch()
    }

    pub fn active_playbacks(&self) -> usize {
        self.playback.active_count()
    }

    /// 強制終了。録音中ならキャプチャを停止して結果を破棄し、
    /// その後すべてのスロットをクリアしてハンドルを解放する
    pub async fn shutdown(&self) -> Result<()> {
        info!("soundboard shutting down");
        self.recording.shutdown().await?;

        let held = self.lock_store()?.clear_all();
        info!(count = held.len(), "releasing recorded slots");
        for (slot, handle) in held {
            self.device.release_resource(handle).await;
            self.emit(SoundboardEvent::SlotCleared { slot });
        }
        Ok(())
    }

    async fn start_recording(&self) -> Result<(usize, u64)> {
        let (slot, session_id) = self
            .recording
            .start(|| {
                self.lock_store()?
                    .find_first_empty()
                    .ok_or(SoundboardError::NoFreeSlot)
            })
            .await?;
        self.emit(SoundboardEvent::RecordingStarted { slot, session_id });
        Ok((slot, session_id))
    }

    async fn stop_recording(&self) -> Result<ToggleOutcome> {
        let stopped = self
            .recording
            .stop(|target, handle| self.commit_recording(target, handle))
            .await?;
        let Committed { slot, displaced } = stopped.committed;

        if let Some(old) = displaced {
            info!(slot, %old, "releasing overwritten recording");
            self.device.release_resource(old).await;
        }
        self.emit(SoundboardEvent::RecordingStopped {
            slot,
            session_id: stopped.session_id,
        });
        Ok(ToggleOutcome::Stopped {
            slot,
            session_id: stopped.session_id,
        })
    }

    /// 録音結果をスロットへ確定する（録音コンテキストのロック内で呼ばれる）
    fn commit_recording(&self, target: usize, handle: &AudioHandle) -> Result<Committed> {
        let mut store = self.lock_store()?;
        let slot = if store.get(target)?.is_empty() || self.config.allow_implicit_overwrite {
            target
        } else {
            let fallback = store
                .find_first_empty()
                .ok_or(SoundboardError::NoFreeSlot)?;
            warn!(target, fallback, "target slot already recorded, committing to first empty slot");
            fallback
        };
        let displaced = store.assign(slot, handle.clone())?;
        Ok(Committed { slot, displaced })
    }

    async fn press(&self, index: usize) -> Result<SlotPressOutcome> {
        let slot = self.lock_store()?.get(index)?;
        match slot.content {
            SlotContent::Recorded(handle) => {
                let session_id = self.playback.play(handle, Some(index)).await?;
                Ok(SlotPressOutcome::Playing { session_id })
            }
            SlotContent::Empty => {
                if self.recording.is_recording() {
                    debug!(index, "empty slot pressed while recording, ignoring");
                    return Ok(SlotPressOutcome::Ignored);
                }
                match self.start_recording().await {
                    Ok((slot, session_id)) => {
                        Ok(SlotPressOutcome::RecordingStarted { slot, session_id })
                    }
                    // 確認後に別のインテントが録音を開始した
                    Err(SoundboardError::RecordingInProgress) => Ok(SlotPressOutcome::Ignored),
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn clear_slot(&self, index: usize) -> Result<bool> {
        let previous = self.lock_store()?.clear(index)?;
        match previous {
            Some(handle) => {
                info!(slot = index, %handle, "slot cleared");
                self.device.release_resource(handle).await;
                self.emit(SoundboardEvent::SlotCleared { slot: index });
                Ok(true)
            }
            None => {
                debug!(slot = index, "slot already empty");
                Ok(false)
            }
        }
    }

    /// エラーをログに残し、イベントとして通知してからそのまま返す
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            match e.severity() {
                ErrorSeverity::Error => error!(error = %e, "intent failed"),
                ErrorSeverity::Warning => warn!(error = %e, "intent failed"),
                ErrorSeverity::Info => info!(error = %e, "intent rejected"),
                ErrorSeverity::Debug => debug!(error = %e, "intent rejected"),
            }
            self.emit(SoundboardEvent::Error(e.clone()));
        }
        result
    }

    fn emit(&self, event: SoundboardEvent) {
        // 受信側がいなくてもコアの動作には影響しない
        let _ = self.events.send(event);
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, SlotStore>> {
        self.store
            .lock()
            .map_err(|e| SoundboardError::SystemError(format!("Slot store lock error: {}", e)))
    }
}
