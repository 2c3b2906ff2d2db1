//! ### English
//! Capacity changes and cache cleaning.
//!
//! Eviction order: FREE slots first, then QUEUED slots (oldest first), then in-flight slots are
//! marked `deleting` and destroyed when they come back.
//!
//! ### 中文
//! 容量变更与缓存清理。
//!
//! 驱逐顺序：先 FREE 槽位，再 QUEUED 槽位（最早的先），最后将流转中的槽位标记为 `deleting`，
//! 在其归还时销毁。

use std::sync::atomic::Ordering;

use super::{BufferQueue, QueueState};
use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::types::SURFACE_MAX_QUEUE_SIZE;

impl BufferQueue {
    pub fn queue_size(&self) -> u32 {
        self.state.lock().queue_size
    }

    /// ### English
    /// Changes the capacity. Shrinking below the number of live slots evicts the surplus.
    ///
    /// ### 中文
    /// 修改容量。缩小到低于存活槽位数时驱逐多出的部分。
    pub fn set_queue_size(&self, queue_size: u32) -> SurfaceResult<()> {
        if !(1..=SURFACE_MAX_QUEUE_SIZE).contains(&queue_size) {
            return Err(SurfaceError::InvalidParam);
        }
        let mut state = self.state.lock();
        let live = state.live_slot_count();
        if live > queue_size as usize {
            self.evict(&mut state, live - queue_size as usize);
        }
        tracing::debug!(
            queue = %self.name,
            from = state.queue_size,
            to = queue_size,
            "queue size changed"
        );
        state.queue_size = queue_size;
        Ok(())
    }

    /// ### English
    /// Destroys every buffer the queue holds; in-flight buffers are destroyed on return.
    ///
    /// ### 中文
    /// 销毁队列持有的所有缓冲区；流转中的缓冲区在归还时销毁。
    pub fn clean_cache(&self) -> SurfaceResult<()> {
        let mut state = self.state.lock();
        let live = state.live_slot_count();
        self.evict(&mut state, live);
        tracing::debug!(queue = %self.name, "cache cleaned");
        Ok(())
    }

    fn evict(&self, state: &mut QueueState, mut count: usize) {
        while count > 0 {
            let Some(key) = state.free_list.pop_front() else {
                break;
            };
            state.destroy(key);
            count -= 1;
        }
        while count > 0 {
            let Some(key) = state.dirty_list.pop_front() else {
                break;
            };
            state.destroy(key);
            self.available.fetch_sub(1, Ordering::AcqRel);
            count -= 1;
        }
        if count == 0 {
            return;
        }
        for slot in state.slots.values_mut() {
            if count == 0 {
                break;
            }
            if slot.is_in_flight() && !slot.deleting {
                slot.deleting = true;
                count -= 1;
                tracing::debug!(
                    queue = %self.name,
                    sequence = slot.sequence(),
                    "in-flight buffer marked for deletion"
                );
            }
        }
    }
}
