pub mod slot;
pub mod slot_store;

pub use slot::{AudioHandle, Slot, SlotContent};
pub use slot_store::SlotStore;
