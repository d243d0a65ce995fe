//! 固定長スロット配列の管理
//!
//! # 責任
//! - スロットの割り当て・クリア
//! - 次の録音先（最小インデックスの空きスロット）の決定
//!
//! デバイスには一切触れません。ハンドルの解放は呼び出し側の責任です。

use crate::domain::slot::{AudioHandle, Slot, SlotContent};
use crate::error::{Result, SoundboardError};

/// スロットストア
#[derive(Debug, Clone)]
pub struct SlotStore {
    slots: Vec<Slot>,
}

impl SlotStore {
    /// `capacity` 個の空スロットで初期化
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(Slot::empty).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 最小インデックスの空きスロットを返します。満杯なら `None`。
    pub fn find_first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_empty)
    }

    /// ハンドルを割り当て、上書きされた以前のハンドルを返します。
    pub fn assign(&mut self, index: usize, handle: AudioHandle) -> Result<Option<AudioHandle>> {
        let slot = self.slot_mut(index)?;
        let previous = std::mem::replace(&mut slot.content, SlotContent::Recorded(handle));
        Ok(match previous {
            SlotContent::Recorded(old) => Some(old),
            SlotContent::Empty => None,
        })
    }

    /// スロットを空にし、保持していたハンドルを返します。空スロットに対しては `None`。
    pub fn clear(&mut self, index: usize) -> Result<Option<AudioHandle>> {
        let slot = self.slot_mut(index)?;
        Ok(match std::mem::take(&mut slot.content) {
            SlotContent::Recorded(old) => Some(old),
            SlotContent::Empty => None,
        })
    }

    /// 全スロットを空にし、保持していたハンドルをインデックス順に返します。
    pub fn clear_all(&mut self) -> Vec<(usize, AudioHandle)> {
        self.slots
            .iter_mut()
            .filter_map(|slot| match std::mem::take(&mut slot.content) {
                SlotContent::Recorded(handle) => Some((slot.index, handle)),
                SlotContent::Empty => None,
            })
            .collect()
    }

    /// スロットのスナップショットを取得
    pub fn get(&self, index: usize) -> Result<Slot> {
        self.slots
            .get(index)
            .cloned()
            .ok_or(self.invalid_index(index))
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn recorded_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn is_full(&self) -> bool {
        self.find_first_empty().is_none()
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot> {
        let err = self.invalid_index(index);
        self.slots.get_mut(index).ok_or(err)
    }

    fn invalid_index(&self, index: usize) -> SoundboardError {
        SoundboardError::InvalidIndex {
            index,
            capacity: self.slots.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> AudioHandle {
        AudioHandle::new(name)
    }

    #[test]
    fn test_new_store_is_all_empty() {
        let store = SlotStore::new(54);
        assert_eq!(store.capacity(), 54);
        assert!(store.slots().iter().all(Slot::is_empty));
        assert_eq!(store.recorded_count(), 0);
    }

    #[test]
    fn test_find_first_empty_scans_lowest_index() {
        for capacity in [1usize, 4, 54] {
            let mut store = SlotStore::new(capacity);
            assert_eq!(store.find_first_empty(), Some(0));

            for k in 0..capacity {
                store.assign(k, handle(&format!("h{k}"))).unwrap();
                let expected = if k + 1 < capacity { Some(k + 1) } else { None };
                assert_eq!(store.find_first_empty(), expected, "capacity {capacity}, k {k}");
            }
            assert!(store.is_full());
        }
    }

    #[test]
    fn test_find_first_empty_reuses_cleared_gap() {
        let mut store = SlotStore::new(4);
        for i in 0..3 {
            store.assign(i, handle(&format!("h{i}"))).unwrap();
        }
        store.clear(1).unwrap();
        assert_eq!(store.find_first_empty(), Some(1));
    }

    #[test]
    fn test_assign_returns_displaced_handle() {
        let mut store = SlotStore::new(2);
        assert_eq!(store.assign(0, handle("a")).unwrap(), None);
        assert_eq!(store.assign(0, handle("b")).unwrap(), Some(handle("a")));
        assert_eq!(
            store.get(0).unwrap().content,
            SlotContent::Recorded(handle("b"))
        );
        assert!(store.get(1).unwrap().is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut store = SlotStore::new(3);
        store.assign(2, handle("h")).unwrap();

        assert_eq!(store.clear(2).unwrap(), Some(handle("h")));
        assert!(store.get(2).unwrap().is_empty());

        assert_eq!(store.clear(2).unwrap(), None);
        assert!(store.get(2).unwrap().is_empty());
    }

    #[test]
    fn test_clear_all_returns_recorded_handles() {
        let mut store = SlotStore::new(4);
        store.assign(1, handle("a")).unwrap();
        store.assign(3, handle("b")).unwrap();

        assert_eq!(
            store.clear_all(),
            vec![(1, handle("a")), (3, handle("b"))]
        );
        assert_eq!(store.recorded_count(), 0);
        assert!(store.clear_all().is_empty());
    }

    #[test]
    fn test_out_of_range_index() {
        let mut store = SlotStore::new(4);
        let expected = SoundboardError::InvalidIndex {
            index: 4,
            capacity: 4,
        };
        assert_eq!(store.assign(4, handle("x")).unwrap_err(), expected);
        assert_eq!(store.clear(4).unwrap_err(), expected);
        assert_eq!(store.get(4).unwrap_err(), expected);
        assert_eq!(store.recorded_count(), 0);
    }
}
