use std::fmt;
use std::sync::Arc;

/// 録音済み音声への不透明な参照（リソースロケータ）。
///
/// 生成はキャプチャデバイスのみが行い、コアは中身を解釈しません。
/// クローンは安価で、再生セッションは呼び出し時点のクローンを保持します。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AudioHandle(Arc<str>);

impl AudioHandle {
    pub fn new(locator: impl Into<Arc<str>>) -> Self {
        Self(locator.into())
    }

    /// ロケータ文字列を返します。
    pub fn locator(&self) -> &str {
        &self.0
    }

    /// 同じロケータを共有している生存中のクローン数
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioHandle({})", self.0)
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// スロットの中身
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotContent {
    /// 未録音
    #[default]
    Empty,
    /// 録音済み
    Recorded(AudioHandle),
}

impl SlotContent {
    pub fn is_empty(&self) -> bool {
        matches!(self, SlotContent::Empty)
    }

    pub fn handle(&self) -> Option<&AudioHandle> {
        match self {
            SlotContent::Empty => None,
            SlotContent::Recorded(handle) => Some(handle),
        }
    }
}

/// サウンドボード上の 1 セル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub content: SlotContent,
}

impl Slot {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            content: SlotContent::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
