//! ### English
//! Producer-side return paths: flush (DEQUEUED → QUEUED) and cancel (DEQUEUED → FREE).
//!
//! ### 中文
//! 生产者侧归还路径：flush（DEQUEUED → QUEUED）与 cancel（DEQUEUED → FREE）。

use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use super::slot::SlotState;
use super::{BufferQueue, resolve};
use crate::surface::buffer::SurfaceBuffer;
use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::fence::SharedFence;
use crate::surface::types::BufferFlushConfig;

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |elapsed| elapsed.as_micros() as i64)
}

impl BufferQueue {
    /// ### English
    /// Queues a rendered buffer for the consumer.
    ///
    /// The consumer listener is notified after the table lock is released.
    ///
    /// #### Parameters
    /// - `buffer`: Buffer previously returned by `request_buffer`.
    /// - `fence`: Signals when the producer's writes are complete.
    /// - `config`: Damage rect and timestamp (0 = now).
    ///
    /// ### 中文
    /// 将渲染完成的缓冲区排队交给消费者。
    ///
    /// 释放表锁后通知消费者监听器。
    ///
    /// #### 参数
    /// - `buffer`：之前由 `request_buffer` 返回的缓冲区。
    /// - `fence`：生产者写入完成时触发。
    /// - `config`：damage 矩形与时间戳（0 = 当前时间）。
    pub fn flush_buffer(
        &self,
        buffer: Option<&SurfaceBuffer>,
        fence: SharedFence,
        config: &BufferFlushConfig,
    ) -> SurfaceResult<()> {
        {
            let mut state = self.state.lock();
            let key = resolve(&state, buffer, SurfaceError::InvalidOperating)?;
            config.validate()?;

            let slot = &mut state.slots[key];
            if slot.state != SlotState::Dequeued {
                tracing::warn!(
                    queue = %self.name,
                    sequence = slot.sequence(),
                    state = ?slot.state,
                    "flush of buffer not dequeued"
                );
                return Err(SurfaceError::InvalidOperating);
            }
            if slot.deleting {
                state.destroy(key);
                return Ok(());
            }
            if slot.buffer.is_mapped() {
                slot.buffer.flush_cache()?;
            }

            slot.state = SlotState::Queued;
            slot.acquire_fence = fence;
            slot.damage = config.damage;
            slot.timestamp = if config.timestamp == 0 {
                now_micros()
            } else {
                config.timestamp
            };
            tracing::debug!(
                queue = %self.name,
                sequence = slot.sequence(),
                timestamp = slot.timestamp,
                "buffer queued"
            );
            state.dirty_list.push_back(key);
            self.available.fetch_add(1, Ordering::AcqRel);
        }

        self.notify_available();
        Ok(())
    }

    /// ### English
    /// Returns a dequeued buffer to the free list without presenting it.
    ///
    /// ### 中文
    /// 将出队的缓冲区直接归还空闲列表而不呈现。
    pub fn cancel_buffer(&self, buffer: Option<&SurfaceBuffer>) -> SurfaceResult<()> {
        let mut state = self.state.lock();
        let key = resolve(&state, buffer, SurfaceError::InvalidOperating)?;

        let slot = &mut state.slots[key];
        if slot.state != SlotState::Dequeued {
            return Err(SurfaceError::InvalidOperating);
        }
        if slot.deleting {
            state.destroy(key);
            return Ok(());
        }
        slot.state = SlotState::Free;
        tracing::debug!(queue = %self.name, sequence = slot.sequence(), "buffer cancelled");
        state.free_list.push_back(key);
        Ok(())
    }
}
