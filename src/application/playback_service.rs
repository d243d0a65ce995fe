//! 録音済み音声の再生を管理するサービス
//!
//! # 責任
//! - 再生セッションの開始（fire-and-forget）
//! - デバイスからの完了通知によるセッションの自動破棄
//!
//! セッション同士は独立しており、同時再生数に制限はありません。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::events::SoundboardEvent;
use crate::application::traits::AudioDevice;
use crate::domain::AudioHandle;
use crate::error::{Result, SoundboardError};
use crate::infrastructure::audio::{PlaybackStream, PlaybackToken};

/// 再生中のセッション
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub session_id: u64,
    pub token: PlaybackToken,
    /// 呼び出し時点でのハンドル。元スロットがクリアされても有効
    pub handle: AudioHandle,
    pub slot: Option<usize>,
}

type SessionMap = Arc<Mutex<HashMap<u64, PlaybackSession>>>;

/// 再生サービス
pub struct PlaybackService {
    device: Arc<dyn AudioDevice>,
    sessions: SessionMap,
    session_counter: AtomicU64,
    events: mpsc::UnboundedSender<SoundboardEvent>,
}

impl PlaybackService {
    pub fn new(
        device: Arc<dyn AudioDevice>,
        events: mpsc::UnboundedSender<SoundboardEvent>,
    ) -> Self {
        Self {
            device,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            session_counter: AtomicU64::new(0),
            events,
        }
    }

    /// 再生を開始し、セッションIDを返します。完了は待ちません。
    ///
    /// オープンに失敗した場合はセッションを一切残しません。
    pub async fn play(&self, handle: AudioHandle, slot: Option<usize>) -> Result<u64> {
        let PlaybackStream { token, completion } = self
            .device
            .begin_playback(&handle)
            .await
            .map_err(|e| {
                warn!(%handle, error = %e, "failed to open playback");
                SoundboardError::playback(e)
            })?;

        let session_id = self.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
        lock_sessions(&self.sessions)?.insert(
            session_id,
            PlaybackSession {
                session_id,
                token,
                handle: handle.clone(),
                slot,
            },
        );
        debug!(session_id, ?slot, %handle, "playback started");
        let _ = self
            .events
            .send(SoundboardEvent::PlaybackStarted { session_id, slot });

        let sessions = self.sessions.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            // 送信側が破棄された場合も完了として扱う
            let _ = completion.await;
            if let Ok(mut sessions) = lock_sessions(&sessions) {
                sessions.remove(&session_id);
            }
            debug!(session_id, "playback finished");
            let _ = events.send(SoundboardEvent::PlaybackFinished { session_id });
        });

        Ok(session_id)
    }

    /// 再生中のセッション数
    pub fn active_count(&self) -> usize {
        lock_sessions(&self.sessions)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn is_playing(&self, session_id: u64) -> bool {
        lock_sessions(&self.sessions)
            .map(|s| s.contains_key(&session_id))
            .unwrap_or(false)
    }
}

fn lock_sessions(
    sessions: &SessionMap,
) -> Result<std::sync::MutexGuard<'_, HashMap<u64, PlaybackSession>>> {
    sessions
        .lock()
        .map_err(|e| SoundboardError::SystemError(format!("Playback lock error: {}", e)))
}
