//! ### English
//! Producer-side request: hands a FREE (or freshly allocated) buffer to the producer.
//!
//! ### 中文
//! 生产者侧 request：将 FREE（或新分配的）缓冲区交给生产者。

use std::sync::Arc;

use super::slot::{BufferSlot, SlotKey, SlotState};
use super::{BufferQueue, QueueState, RequestedSlot};
use crate::surface::buffer::SurfaceBuffer;
use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::fence::Fence;
use crate::surface::types::BufferRequestConfig;

impl BufferQueue {
    /// ### English
    /// Dequeues a buffer matching `config`.
    ///
    /// Preference order: a FREE buffer allocated for the same config, a new allocation while
    /// below capacity, then reallocation of the oldest FREE slot. Fails `NoConsumer` without a
    /// registered consumer, `InvalidParam` for a bad config and `NoBuffer` when every slot is in
    /// flight.
    ///
    /// #### Parameters
    /// - `config`: Geometry, format, usage and color metadata of the wanted buffer.
    ///
    /// ### 中文
    /// 出队一个匹配 `config` 的缓冲区。
    ///
    /// 优先级：为相同配置分配的 FREE 缓冲区、未达容量时新分配、最后重新分配最早的 FREE 槽位。
    /// 未注册消费者返回 `NoConsumer`，配置非法返回 `InvalidParam`，所有槽位都在流转中返回 `NoBuffer`。
    ///
    /// #### 参数
    /// - `config`：所需缓冲区的尺寸、格式、用途与颜色元数据。
    pub fn request_buffer(&self, config: &BufferRequestConfig) -> SurfaceResult<RequestedSlot> {
        if !self.is_consumer_registered() {
            tracing::debug!(queue = %self.name, "request without consumer");
            return Err(SurfaceError::NoConsumer);
        }
        config.validate()?;

        let mut state = self.state.lock();
        let key = self.pick_slot(&mut state, config)?;

        let slot = &mut state.slots[key];
        slot.state = SlotState::Dequeued;
        slot.config = *config;
        slot.buffer.set_color_gamut(config.color_gamut);
        slot.buffer.set_transform(config.transform);
        let buffer = slot.buffer.clone();
        let release_fence = std::mem::replace(&mut slot.release_fence, Fence::invalid());
        let deleted_sequences = std::mem::take(&mut state.deleted);

        tracing::debug!(
            queue = %self.name,
            sequence = buffer.sequence(),
            fence = release_fence.fd(),
            "buffer dequeued"
        );
        Ok(RequestedSlot {
            buffer,
            release_fence,
            deleted_sequences,
        })
    }

    fn pick_slot(
        &self,
        state: &mut QueueState,
        config: &BufferRequestConfig,
    ) -> SurfaceResult<SlotKey> {
        if let Some(pos) = state
            .free_list
            .iter()
            .position(|key| state.slots[*key].config.is_compatible(config))
            && let Some(key) = state.free_list.remove(pos)
        {
            return Ok(key);
        }

        if state.slots.len() < state.queue_size as usize {
            let buffer = self.alloc_buffer(config)?;
            return Ok(state.insert(BufferSlot::new(buffer, *config)));
        }

        let Some(&oldest) = state.free_list.front() else {
            tracing::debug!(
                queue = %self.name,
                used = state.slots.len(),
                "no free buffer"
            );
            return Err(SurfaceError::NoBuffer);
        };
        let buffer = self.alloc_buffer(config)?;
        state.free_list.pop_front();
        state.destroy(oldest);
        Ok(state.insert(BufferSlot::new(buffer, *config)))
    }

    fn alloc_buffer(&self, config: &BufferRequestConfig) -> SurfaceResult<Arc<SurfaceBuffer>> {
        let buffer = SurfaceBuffer::new(self.allocator.clone());
        buffer.alloc(config)?;
        if config.usage.is_cpu_accessible() {
            buffer.map()?;
        }
        Ok(Arc::new(buffer))
    }
}
