use std::sync::Arc;

use super::token::{AcquiredBuffer, DequeuedBuffer, RequestedBuffer};
use super::{ProducerSurface, Surface, check_origin};
use crate::surface::allocator::AllocatorClient;
use crate::surface::error::{Rejected, SurfaceError, SurfaceResult};
use crate::surface::fence::SharedFence;
use crate::surface::queue::{BufferQueue, BufferQueueInit, ConsumerListener};
use crate::surface::types::{BufferFlushConfig, BufferRequestConfig};

/// ### English
/// Consumer role: owns the queue's creation, acquires flushed buffers and releases them.
///
/// ### 中文
/// 消费者角色：负责创建队列，acquire 已提交的缓冲区并 release。
#[derive(Debug, Clone)]
pub struct ConsumerSurface {
    queue: Arc<BufferQueue>,
}

impl ConsumerSurface {
    /// ### English
    /// Creates a new queue and returns its consumer handle.
    ///
    /// ### 中文
    /// 创建新队列并返回其消费者句柄。
    pub fn new(init: BufferQueueInit, allocator: Arc<AllocatorClient>) -> Self {
        Self {
            queue: BufferQueue::new(init, allocator),
        }
    }

    /// ### English
    /// Producer handle for the same queue.
    ///
    /// ### 中文
    /// 同一队列的生产者句柄。
    pub fn producer(&self) -> ProducerSurface {
        ProducerSurface::new(self.queue.clone())
    }
}

impl Surface for ConsumerSurface {
    fn is_consumer(&self) -> bool {
        true
    }

    fn queue(&self) -> &Arc<BufferQueue> {
        &self.queue
    }

    fn request_buffer(&self, _config: &BufferRequestConfig) -> SurfaceResult<RequestedBuffer> {
        Err(SurfaceError::NotSupport)
    }

    fn flush_buffer(
        &self,
        buffer: DequeuedBuffer,
        _fence: SharedFence,
        _config: &BufferFlushConfig,
    ) -> Result<(), Rejected<DequeuedBuffer>> {
        Err(Rejected::new(SurfaceError::NotSupport, buffer))
    }

    fn cancel_buffer(&self, buffer: DequeuedBuffer) -> Result<(), Rejected<DequeuedBuffer>> {
        Err(Rejected::new(SurfaceError::NotSupport, buffer))
    }

    fn acquire_buffer(&self) -> SurfaceResult<AcquiredBuffer> {
        let slot = self.queue.acquire_buffer()?;
        Ok(AcquiredBuffer {
            queue_id: self.queue.unique_id(),
            buffer: slot.buffer,
            acquire_fence: slot.acquire_fence,
            timestamp: slot.timestamp,
            damage: slot.damage,
            scaling_mode: slot.scaling_mode,
        })
    }

    fn release_buffer(
        &self,
        buffer: AcquiredBuffer,
        fence: SharedFence,
    ) -> Result<(), Rejected<AcquiredBuffer>> {
        let buffer = check_origin(&self.queue, buffer.queue_id, buffer)?;
        match self.queue.release_buffer(Some(buffer.buffer.as_ref()), fence) {
            Ok(()) => Ok(()),
            Err(error) => Err(Rejected::new(error, buffer)),
        }
    }

    fn register_consumer_listener(&self, listener: Arc<dyn ConsumerListener>) -> SurfaceResult<()> {
        self.queue.register_consumer_listener(listener);
        Ok(())
    }

    fn unregister_consumer_listener(&self) -> SurfaceResult<()> {
        self.queue.unregister_consumer_listener();
        Ok(())
    }
}
