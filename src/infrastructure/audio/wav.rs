//! WAV ファイルの読み書きと再生用サンプル変換

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::{fs::File, io::BufWriter, path::Path};

use super::DeviceError;

pub type FileWavWriter = WavWriter<BufWriter<File>>;

/// 16bit PCM の WAV ライターを作成
pub fn create_writer(
    path: &Path,
    channels: u16,
    sample_rate: u32,
) -> Result<FileWavWriter, DeviceError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    Ok(WavWriter::create(path, spec)?)
}

/// f32 サンプル (-1.0〜1.0) を i16 に変換
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// デコード済みの録音データ
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// インターリーブされたサンプル (-1.0〜1.0)
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Clip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// WAV ファイルを読み込みf32サンプルデータに変換します
pub fn read_clip(path: &Path) -> Result<Clip, DeviceError> {
    if !path.exists() {
        return Err(DeviceError::File(format!(
            "sound file not found: {}",
            path.display()
        )));
    }

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, bits) if bits <= 32 => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
        (format, bits) => {
            return Err(DeviceError::File(format!(
                "unsupported wav format: {format:?} {bits}bit"
            )));
        }
    };

    Ok(Clip {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// 出力ストリームへクリップを流し込むカーソル。
///
/// チャンネル数の違いは「元チャンネルが足りなければ最後のチャンネルを複製」、
/// サンプルレートの違いは最近傍で吸収します。
#[derive(Debug)]
pub struct ClipCursor {
    clip: Clip,
    /// 元クリップ上のフレーム位置
    position: f64,
    step: f64,
    out_channels: usize,
}

impl ClipCursor {
    pub fn new(clip: Clip, out_channels: u16, out_sample_rate: u32) -> Self {
        let step = if out_sample_rate == 0 {
            1.0
        } else {
            clip.sample_rate as f64 / out_sample_rate as f64
        };
        Self {
            clip,
            position: 0.0,
            step,
            out_channels: out_channels.max(1) as usize,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position as usize >= self.clip.frames()
    }

    /// 出力バッファを埋めます。末尾以降は無音。クリップを使い切ったら `true`
    pub fn fill(&mut self, output: &mut [f32]) -> bool {
        let frames = self.clip.frames();
        let src_channels = self.clip.channels.max(1) as usize;

        for frame in output.chunks_mut(self.out_channels) {
            let src_frame = self.position as usize;
            if src_frame >= frames {
                frame.iter_mut().for_each(|s| *s = 0.0);
                continue;
            }
            let base = src_frame * src_channels;
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = self.clip.samples[base + ch.min(src_channels - 1)];
            }
            self.position += self.step;
        }

        self.is_finished()
    }
}
