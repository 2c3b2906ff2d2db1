//! ### English
//! Consumer-side release: ACQUIRED → FREE, recording the fence the next producer must wait on.
//!
//! ### 中文
//! 消费者侧 release：ACQUIRED → FREE，并记录下一个生产者需要等待的 fence。

use super::slot::SlotState;
use super::{BufferQueue, resolve};
use crate::surface::buffer::SurfaceBuffer;
use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::fence::SharedFence;

impl BufferQueue {
    /// ### English
    /// Releases an acquired buffer back to the queue.
    ///
    /// #### Parameters
    /// - `buffer`: Buffer previously returned by `acquire_buffer`.
    /// - `fence`: Signals when the consumer no longer reads the buffer; handed to the next
    ///   `request_buffer` that reuses it.
    ///
    /// A buffer marked for deletion by a shrink is destroyed here and the release listener is not
    /// told about it.
    ///
    /// ### 中文
    /// 将 acquire 的缓冲区释放回队列。
    ///
    /// #### 参数
    /// - `buffer`：之前由 `acquire_buffer` 返回的缓冲区。
    /// - `fence`：消费者不再读取缓冲区时触发；交给下一次复用它的 `request_buffer`。
    ///
    /// 被 shrink 标记删除的缓冲区在此销毁，不会通知释放监听器。
    pub fn release_buffer(
        &self,
        buffer: Option<&SurfaceBuffer>,
        fence: SharedFence,
    ) -> SurfaceResult<()> {
        let released = {
            let mut state = self.state.lock();
            let key = resolve(&state, buffer, SurfaceError::NoEntry)?;

            let slot = &mut state.slots[key];
            if slot.state != SlotState::Acquired {
                tracing::warn!(
                    queue = %self.name,
                    sequence = slot.sequence(),
                    state = ?slot.state,
                    "release of buffer not acquired"
                );
                return Err(SurfaceError::InvalidOperating);
            }
            slot.state = SlotState::Free;
            slot.release_fence = fence;
            let sequence = slot.sequence();
            if slot.deleting {
                state.destroy(key);
                tracing::debug!(queue = %self.name, sequence, "deleted buffer released");
                None
            } else {
                let buffer = slot.buffer.clone();
                state.free_list.push_back(key);
                tracing::debug!(queue = %self.name, sequence, "buffer released");
                Some(buffer)
            }
        };

        if let Some(buffer) = released {
            self.notify_released(&buffer);
        }
        Ok(())
    }
}
