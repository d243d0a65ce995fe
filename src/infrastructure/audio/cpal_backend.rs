use async_trait::async_trait;
use cpal::{
    Device, SampleFormat, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
        mpsc as std_mpsc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::wav::{self, Clip, ClipCursor, FileWavWriter};
use super::{CaptureToken, DeviceError, Permission, PlaybackStream, PlaybackToken};
use crate::application::traits::AudioDevice;
use crate::domain::AudioHandle;

/// 再生終了後、出力バッファが捌けるまでの猶予
const DRAIN_MARGIN: Duration = Duration::from_millis(100);

/// キャプチャスレッドへの停止要求。完了したWAVのパスを返してもらう
type StopRequest = oneshot::Sender<Result<PathBuf, DeviceError>>;

/// 録音中のキャプチャスレッド
struct CaptureWorker {
    stop_tx: std_mpsc::Sender<StopRequest>,
}

/// CPAL によるローカルマイク入力・スピーカー出力実装。
///
/// 録音は `recordings_dir` 以下の WAV ファイルとして保存し、そのパスをハンドルにします。
/// cpal の `Stream` はスレッド間で移動できないため、ストリームごとに専用スレッドを立てます。
/// 解放されたファイルは、どこからもハンドルが参照されなくなった時点で削除します。
pub struct CpalAudioDevice {
    recordings_dir: PathBuf,
    /// 入力デバイスの優先リスト
    input_priority: Vec<String>,
    captures: Mutex<HashMap<u64, CaptureWorker>>,
    /// 解放済みだがクローンがまだ生きているハンドル
    released: Mutex<Vec<AudioHandle>>,
    next_token: AtomicU64,
}

impl CpalAudioDevice {
    pub fn new(recordings_dir: PathBuf, input_priority: Vec<String>) -> Self {
        Self {
            recordings_dir,
            input_priority,
            captures: Mutex::new(HashMap::new()),
            released: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        }
    }

    fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// `<recordings_dir>/slot_<epoch>_<token>.wav` 形式の一意なファイルパスを生成
    fn make_output_path(&self, token: u64) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.recordings_dir.join(format!("slot_{ts}_{token}.wav"))
    }

    /// 解放済みハンドルのうち、このデバイス以外に参照がなくなったものを削除する
    fn sweep_released(&self) {
        let orphaned: Vec<AudioHandle> = match self.released.lock() {
            Ok(mut released) => {
                let (orphaned, alive): (Vec<_>, Vec<_>) = std::mem::take(&mut *released)
                    .into_iter()
                    .partition(|h| h.ref_count() == 1);
                *released = alive;
                orphaned
            }
            Err(e) => {
                warn!(error = %e, "released list lock error");
                return;
            }
        };
        for handle in orphaned {
            remove_recording(Path::new(handle.locator()));
        }
    }

    fn lock_captures(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<u64, CaptureWorker>>, DeviceError> {
        self.captures
            .lock()
            .map_err(|e| DeviceError::Capture(format!("capture table lock error: {e}")))
    }
}

fn remove_recording(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "recording removed"),
        Err(e) => debug!(path = %path.display(), error = %e, "failed to remove recording"),
    }
}

/// 優先リストに従って入力デバイスを選択します。見つからなければデフォルト入力。
fn select_input_device(host: &cpal::Host, priorities: &[String]) -> Option<Device> {
    if !priorities.is_empty() {
        if let Ok(devices) = host.input_devices() {
            let available: Vec<Device> = devices.collect();
            for want in priorities {
                if let Some(dev) = available
                    .iter()
                    .find(|d| d.name().map(|n| n == *want).unwrap_or(false))
                {
                    info!(device = %want, "using preferred input device");
                    return Some(dev.clone());
                }
            }
        }
        warn!("no preferred input device found, falling back to default input device");
    }
    host.default_input_device()
}

/// 入力ストリームを構築。サンプルを WAV ライターに書き込みます。
fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    writer: Arc<Mutex<Option<FileWavWriter>>>,
) -> Result<Stream, DeviceError> {
    let err_fn = |e: cpal::StreamError| warn!(error = %e, "input stream error");
    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _| {
                if let Ok(mut guard) = writer.lock() {
                    if let Some(w) = guard.as_mut() {
                        for &s in data {
                            let _ = w.write_sample(s);
                        }
                    }
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _| {
                if let Ok(mut guard) = writer.lock() {
                    if let Some(w) = guard.as_mut() {
                        for &s in data {
                            let _ = w.write_sample(wav::f32_to_i16(s));
                        }
                    }
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(DeviceError::Capture(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    };
    stream.map_err(|e| DeviceError::Capture(e.to_string()))
}

/// 入力ストリームを開いて録音を開始する
fn open_capture(
    priorities: &[String],
    path: &Path,
) -> Result<(Stream, Arc<Mutex<Option<FileWavWriter>>>), DeviceError> {
    let host = cpal::default_host();
    let device = select_input_device(&host, priorities)
        .ok_or_else(|| DeviceError::NoDevice("input".into()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| DeviceError::Capture(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let writer = Arc::new(Mutex::new(Some(wav::create_writer(
        path,
        config.channels,
        config.sample_rate.0,
    )?)));
    let stream = build_input_stream(&device, &config, sample_format, writer.clone())?;
    stream
        .play()
        .map_err(|e| DeviceError::Capture(e.to_string()))?;
    Ok((stream, writer))
}

/// キャプチャスレッド本体。停止要求（または送信側の破棄）まで録音を続ける
fn run_capture(
    priorities: Vec<String>,
    path: PathBuf,
    ready_tx: oneshot::Sender<Result<(), DeviceError>>,
    stop_rx: std_mpsc::Receiver<StopRequest>,
) {
    let (stream, writer) = match open_capture(&priorities, &path) {
        Ok(opened) => opened,
        Err(e) => {
            // ヘッダーだけ書かれたファイルが残っている場合がある
            if path.exists() {
                remove_recording(&path);
            }
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    let reply = stop_rx.recv().ok();
    drop(stream);

    let finalized = match writer.lock().ok().and_then(|mut w| w.take()) {
        Some(w) => w.finalize().map_err(DeviceError::from),
        None => Err(DeviceError::Capture("wav writer unavailable".into())),
    };
    match (reply, finalized) {
        (Some(reply), Ok(())) => {
            // 停止要求側が待つのをやめていたらファイルは誰にも渡らない
            if let Err(Ok(path)) = reply.send(Ok(path)) {
                remove_recording(&path);
            }
        }
        (Some(reply), Err(e)) => {
            remove_recording(&path);
            let _ = reply.send(Err(e));
        }
        (None, _) => {
            debug!(path = %path.display(), "capture abandoned without stop request");
            remove_recording(&path);
        }
    }
}

/// 再生スレッド本体。クリップを流し終えたら完了を通知する
fn run_playback(
    clip: Clip,
    ready_tx: oneshot::Sender<Result<(), DeviceError>>,
    completion_tx: oneshot::Sender<()>,
) {
    let (done_tx, done_rx) = std_mpsc::channel::<()>();
    let stream = match open_playback(clip, done_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // 最後まで流れた（またはストリームエラー）時点で戻る
    let _ = done_rx.recv();
    std::thread::sleep(DRAIN_MARGIN);
    drop(stream);
    let _ = completion_tx.send(());
}

fn open_playback(
    clip: Clip,
    done_tx: std_mpsc::Sender<()>,
) -> Result<Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| DeviceError::NoDevice("output".into()))?;
    let config: StreamConfig = device
        .default_output_config()
        .map_err(|e| DeviceError::Playback(e.to_string()))?
        .into();
    let mut cursor = ClipCursor::new(clip, config.channels, config.sample_rate.0);

    let error_tx = done_tx.clone();
    let mut notified = false;
    let stream = device
        .build_output_stream(
            &config,
            move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if cursor.fill(output) && !notified {
                    notified = true;
                    let _ = done_tx.send(());
                }
            },
            move |e: cpal::StreamError| {
                warn!(error = %e, "output stream error");
                let _ = error_tx.send(());
            },
            None,
        )
        .map_err(|e| DeviceError::Playback(e.to_string()))?;
    stream
        .play()
        .map_err(|e| DeviceError::Playback(e.to_string()))?;
    Ok(stream)
}

#[async_trait]
impl AudioDevice for CpalAudioDevice {
    /// 入力デバイスが存在すれば許可とみなす
    async fn request_permission(&self) -> Permission {
        let available = tokio::task::spawn_blocking(|| {
            cpal::default_host().default_input_device().is_some()
        })
        .await
        .unwrap_or(false);
        if available {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn configure_for_capture(&self) -> Result<(), DeviceError> {
        tokio::fs::create_dir_all(&self.recordings_dir).await?;
        Ok(())
    }

    async fn begin_capture(&self) -> Result<CaptureToken, DeviceError> {
        self.sweep_released();
        let token = self.next_token();
        let path = self.make_output_path(token);
        let priorities = self.input_priority.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name(format!("soundboard-capture-{token}"))
            .spawn(move || run_capture(priorities, path, ready_tx, stop_rx))?;

        ready_rx
            .await
            .map_err(|_| DeviceError::Capture("capture thread exited".into()))??;

        self.lock_captures()?
            .insert(token, CaptureWorker { stop_tx });
        debug!(token, "capture stream opened");
        Ok(CaptureToken(token))
    }

    async fn end_capture(&self, token: CaptureToken) -> Result<AudioHandle, DeviceError> {
        let worker = self
            .lock_captures()?
            .remove(&token.0)
            .ok_or(DeviceError::UnknownSession(token.0))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        worker
            .stop_tx
            .send(reply_tx)
            .map_err(|_| DeviceError::Capture("capture thread exited".into()))?;
        let path = reply_rx
            .await
            .map_err(|_| DeviceError::Capture("capture thread exited".into()))??;

        debug!(token = token.0, path = %path.display(), "capture flushed");
        Ok(AudioHandle::new(path.to_string_lossy().into_owned()))
    }

    async fn begin_playback(&self, handle: &AudioHandle) -> Result<PlaybackStream, DeviceError> {
        let path = PathBuf::from(handle.locator());
        let clip = tokio::task::spawn_blocking(move || wav::read_clip(&path))
            .await
            .map_err(|e| DeviceError::Playback(e.to_string()))??;

        let token = self.next_token();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (completion_tx, completion_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name(format!("soundboard-playback-{token}"))
            .spawn(move || run_playback(clip, ready_tx, completion_tx))?;

        ready_rx
            .await
            .map_err(|_| DeviceError::Playback("playback thread exited".into()))??;

        Ok(PlaybackStream {
            token: PlaybackToken(token),
            completion: completion_rx,
        })
    }

    /// 呼び出し側がクローンを保持している間はファイルを残し、後から再生できるようにする
    async fn release_resource(&self, handle: AudioHandle) {
        match self.released.lock() {
            Ok(mut released) => released.push(handle),
            Err(e) => {
                warn!(error = %e, %handle, "failed to schedule release");
                return;
            }
        }
        self.sweep_released();
    }
}

impl Drop for CpalAudioDevice {
    fn drop(&mut self) {
        let released = match self.released.get_mut() {
            Ok(released) => std::mem::take(released),
            Err(e) => std::mem::take(e.into_inner()),
        };
        for handle in released {
            remove_recording(Path::new(handle.locator()));
        }
    }
}
