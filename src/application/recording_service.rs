//! 音声録音を管理するサービス
//!
//! # 責任
//! - 録音ステートマシン（Idle → Requesting → Active → Stopping → Idle）の管理
//! - 同時に 1 本しか録音しないことの保証（状態の test-and-set）
//! - 強制終了時のキャプチャ停止とハンドル破棄

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::traits::AudioDevice;
use crate::domain::AudioHandle;
use crate::error::{Result, SoundboardError};
use crate::infrastructure::audio::{CaptureToken, Permission};

/// 録音状態
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    /// 待機中
    Idle,
    /// デバイスの許可・準備待ち
    Requesting { slot: usize, session_id: u64 },
    /// 録音中
    Active { slot: usize, session_id: u64 },
    /// デバイスのフラッシュ待ち
    Stopping { slot: usize, session_id: u64 },
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    /// デバイスがキャプチャ中（停止処理中を含む）か
    pub fn is_capturing(&self) -> bool {
        matches!(
            self,
            RecordingState::Active { .. } | RecordingState::Stopping { .. }
        )
    }

    /// 録音対象のスロット
    pub fn target(&self) -> Option<usize> {
        match *self {
            RecordingState::Idle => None,
            RecordingState::Requesting { slot, .. }
            | RecordingState::Active { slot, .. }
            | RecordingState::Stopping { slot, .. } => Some(slot),
        }
    }

    pub fn session_id(&self) -> Option<u64> {
        match *self {
            RecordingState::Idle => None,
            RecordingState::Requesting { session_id, .. }
            | RecordingState::Active { session_id, .. }
            | RecordingState::Stopping { session_id, .. } => Some(session_id),
        }
    }
}

/// 録音コンテキスト情報
#[derive(Debug)]
pub struct RecordingContext {
    /// 現在の状態
    pub state: RecordingState,
    /// Active 中のみ保持するキャプチャトークン
    capture: Option<CaptureToken>,
    /// 強制終了要求済みか。以降の開始要求は全て拒否する
    pub shutting_down: bool,
    /// セッションIDカウンター
    session_counter: u64,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            capture: None,
            shutting_down: false,
            session_counter: 0,
        }
    }
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// 停止した録音の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedRecording<R> {
    /// 録音開始時に選ばれた対象スロット
    pub target: usize,
    pub session_id: u64,
    /// コミット処理の戻り値
    pub committed: R,
}

/// 録音サービス
pub struct RecordingService {
    device: Arc<dyn AudioDevice>,
    /// 録音コンテキスト
    context: Arc<Mutex<RecordingContext>>,
    /// 状態変化の通知用
    state_tx: watch::Sender<RecordingState>,
}

impl RecordingService {
    /// 新しいRecordingServiceを作成
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        let (state_tx, _) = watch::channel(RecordingState::Idle);
        Self {
            device,
            context: Arc::new(Mutex::new(RecordingContext::new())),
            state_tx,
        }
    }

    /// 現在の録音状態
    pub fn state(&self) -> RecordingState {
        *self.state_tx.borrow()
    }

    /// 状態変化を購読
    pub fn watch(&self) -> watch::Receiver<RecordingState> {
        self.state_tx.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        !self.state().is_idle()
    }

    /// 録音を開始
    ///
    /// `select_target` は Idle 確認と同じクリティカルセクション内で呼ばれ、
    /// 録音先スロットを決定します。エラーを返した場合は状態を変更しません。
    pub async fn start<F>(&self, select_target: F) -> Result<(usize, u64)>
    where
        F: FnOnce() -> Result<usize>,
    {
        let (slot, session_id) = {
            let mut ctx = self.lock()?;

            if ctx.shutting_down {
                return Err(SoundboardError::ShutDown);
            }
            if !ctx.state.is_idle() {
                return Err(SoundboardError::RecordingInProgress);
            }

            let slot = select_target()?;
            ctx.session_counter += 1;
            let session_id = ctx.session_counter;
            self.transition(&mut ctx, RecordingState::Requesting { slot, session_id });
            (slot, session_id)
        };
        // 呼び出し側が future を破棄しても Requesting のまま残さない
        let _cancel_guard = scopeguard::guard(
            RecordingState::Requesting { slot, session_id },
            |pending| self.abandon(pending),
        );
        debug!(slot, session_id, "requesting capture device");

        let token = match self.open_capture().await {
            Ok(token) => token,
            Err(e) => {
                warn!(slot, session_id, error = %e, "failed to start recording");
                self.reset_to_idle()?;
                return Err(e);
            }
        };

        // 準備中に強制終了が要求されていたら即座に破棄する
        let torn_down = {
            let mut ctx = self.lock()?;
            if ctx.shutting_down {
                true
            } else {
                ctx.capture = Some(token);
                self.transition(&mut ctx, RecordingState::Active { slot, session_id });
                false
            }
        };
        if torn_down {
            warn!(slot, session_id, "recording torn down while requesting");
            self.discard_capture(token).await;
            self.reset_to_idle()?;
            return Err(SoundboardError::ShutDown);
        }

        info!(slot, session_id, "recording started");
        Ok((slot, session_id))
    }

    /// 録音を停止
    ///
    /// フラッシュで得たハンドルは `commit` に渡され、Idle へ戻る前に
    /// 同じロック内で確定されます。`commit` が失敗した場合ハンドルは解放されます。
    pub async fn stop<F, R>(&self, commit: F) -> Result<StoppedRecording<R>>
    where
        F: FnOnce(usize, &AudioHandle) -> Result<R>,
    {
        let (target, session_id, token) = {
            let mut ctx = self.lock()?;
            match ctx.state {
                RecordingState::Active { slot, session_id } => {
                    let token = ctx.capture.take().ok_or_else(|| {
                        SoundboardError::SystemError("active recording without capture".into())
                    })?;
                    self.transition(&mut ctx, RecordingState::Stopping { slot, session_id });
                    (slot, session_id, token)
                }
                RecordingState::Stopping { .. } => {
                    return Err(SoundboardError::RecordingInProgress);
                }
                RecordingState::Idle | RecordingState::Requesting { .. } => {
                    return Err(SoundboardError::RecordingNotStarted);
                }
            }
        };
        let _cancel_guard = scopeguard::guard(
            RecordingState::Stopping {
                slot: target,
                session_id,
            },
            |pending| self.abandon(pending),
        );
        debug!(slot = target, session_id, "flushing capture device");

        let handle = match self.device.end_capture(token).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(slot = target, session_id, error = %e, "failed to stop recording");
                self.reset_to_idle()?;
                return Err(SoundboardError::recording(e));
            }
        };

        let committed = {
            let mut ctx = self.lock()?;
            let result = if ctx.shutting_down {
                Err(SoundboardError::ShutDown)
            } else {
                commit(target, &handle)
            };
            self.transition(&mut ctx, RecordingState::Idle);
            result
        };

        match committed {
            Ok(committed) => {
                info!(slot = target, session_id, %handle, "recording stopped");
                Ok(StoppedRecording {
                    target,
                    session_id,
                    committed,
                })
            }
            Err(e) => {
                warn!(slot = target, session_id, error = %e, "discarding recorded handle");
                self.device.release_resource(handle).await;
                Err(e)
            }
        }
    }

    /// 強制終了
    ///
    /// 録音中であればキャプチャを停止してハンドルを破棄し、
    /// 処理中の開始・停止があればその完了を待ちます。
    pub async fn shutdown(&self) -> Result<()> {
        let active = {
            let mut ctx = self.lock()?;
            ctx.shutting_down = true;
            match ctx.state {
                RecordingState::Active { slot, session_id } => {
                    let token = ctx.capture.take();
                    self.transition(&mut ctx, RecordingState::Stopping { slot, session_id });
                    token.map(|token| (slot, session_id, token))
                }
                _ => None,
            }
        };

        if let Some((slot, session_id, token)) = active {
            warn!(slot, session_id, "forced teardown of active recording");
            let _cancel_guard = scopeguard::guard(
                RecordingState::Stopping { slot, session_id },
                |pending| self.abandon(pending),
            );
            self.discard_capture(token).await;
            self.reset_to_idle()?;
        }

        let mut rx = self.state_tx.subscribe();
        rx.wait_for(RecordingState::is_idle)
            .await
            .map(|_| ())
            .map_err(|e| SoundboardError::SystemError(format!("State watch error: {}", e)))
    }

    async fn open_capture(&self) -> Result<CaptureToken> {
        if self.device.request_permission().await == Permission::Denied {
            return Err(SoundboardError::PermissionDenied);
        }
        self.device
            .configure_for_capture()
            .await
            .map_err(SoundboardError::recording)?;
        self.device
            .begin_capture()
            .await
            .map_err(SoundboardError::recording)
    }

    /// キャプチャを停止し、得られたハンドルは保存せずに解放する
    async fn discard_capture(&self, token: CaptureToken) {
        match self.device.end_capture(token).await {
            Ok(handle) => self.device.release_resource(handle).await,
            Err(e) => warn!(error = %e, "failed to flush capture during teardown"),
        }
    }

    /// 処理途中で破棄された開始・停止の後始末。
    /// 状態がまだ `pending` のままなら Idle に戻す（それ以外は何もしない）
    fn abandon(&self, pending: RecordingState) {
        let Ok(mut ctx) = self.context.lock() else {
            return;
        };
        if ctx.state == pending {
            warn!(state = ?pending, "recording operation cancelled, returning to idle");
            ctx.capture = None;
            self.transition(&mut ctx, RecordingState::Idle);
        }
    }

    fn reset_to_idle(&self) -> Result<()> {
        let mut ctx = self.lock()?;
        ctx.capture = None;
        self.transition(&mut ctx, RecordingState::Idle);
        Ok(())
    }

    fn transition(&self, ctx: &mut RecordingContext, next: RecordingState) {
        debug!(from = ?ctx.state, to = ?next, "recording state transition");
        ctx.state = next;
        self.state_tx.send_replace(next);
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecordingContext>> {
        self.context
            .lock()
            .map_err(|e| SoundboardError::SystemError(format!("Context lock error: {}", e)))
    }
}
