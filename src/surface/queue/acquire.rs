use std::sync::atomic::Ordering;

use super::slot::SlotState;
use super::{AcquiredSlot, BufferQueue};
use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::fence::Fence;

impl BufferQueue {
    /// ### English
    /// Takes the oldest QUEUED buffer (strict flush order). `NoBuffer` when nothing is queued.
    ///
    /// ### 中文
    /// 取出最早的 QUEUED 缓冲区（严格按 flush 顺序）。没有排队缓冲区时返回 `NoBuffer`。
    pub fn acquire_buffer(&self) -> SurfaceResult<AcquiredSlot> {
        let mut state = self.state.lock();
        let Some(key) = state.dirty_list.pop_front() else {
            return Err(SurfaceError::NoBuffer);
        };
        self.available.fetch_sub(1, Ordering::AcqRel);

        let slot = &mut state.slots[key];
        slot.state = SlotState::Acquired;
        let acquired = AcquiredSlot {
            buffer: slot.buffer.clone(),
            acquire_fence: std::mem::replace(&mut slot.acquire_fence, Fence::invalid()),
            timestamp: slot.timestamp,
            damage: slot.damage,
            scaling_mode: slot.config.scaling_mode,
        };
        tracing::debug!(
            queue = %self.name,
            sequence = acquired.buffer.sequence(),
            timestamp = acquired.timestamp,
            "buffer acquired"
        );
        Ok(acquired)
    }
}
