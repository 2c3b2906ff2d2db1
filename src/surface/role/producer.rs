use std::sync::Arc;

use super::token::{AcquiredBuffer, DequeuedBuffer, RequestedBuffer};
use super::{Surface, check_origin};
use crate::surface::error::{Rejected, SurfaceError, SurfaceResult};
use crate::surface::fence::SharedFence;
use crate::surface::queue::{BufferQueue, ConsumerListener, ReleaseListener};
use crate::surface::types::{BufferFlushConfig, BufferRequestConfig};

/// ### English
/// Producer role: requests buffers, renders into them and flushes or cancels them.
///
/// ### 中文
/// 生产者角色：请求缓冲区、渲染后 flush 或 cancel。
#[derive(Debug, Clone)]
pub struct ProducerSurface {
    queue: Arc<BufferQueue>,
}

impl ProducerSurface {
    pub fn new(queue: Arc<BufferQueue>) -> Self {
        Self { queue }
    }

    /// ### English
    /// Subscribes to buffers coming back from the consumer.
    ///
    /// ### 中文
    /// 订阅消费者归还的缓冲区。
    pub fn register_release_listener(&self, listener: Arc<dyn ReleaseListener>) {
        self.queue.register_release_listener(listener);
    }

    pub fn unregister_release_listener(&self) {
        self.queue.unregister_release_listener();
    }
}

impl Surface for ProducerSurface {
    fn is_consumer(&self) -> bool {
        false
    }

    fn queue(&self) -> &Arc<BufferQueue> {
        &self.queue
    }

    fn request_buffer(&self, config: &BufferRequestConfig) -> SurfaceResult<RequestedBuffer> {
        let slot = self.queue.request_buffer(config)?;
        Ok(RequestedBuffer {
            buffer: DequeuedBuffer {
                queue_id: self.queue.unique_id(),
                buffer: slot.buffer,
            },
            release_fence: slot.release_fence,
            deleted_sequences: slot.deleted_sequences,
        })
    }

    fn flush_buffer(
        &self,
        buffer: DequeuedBuffer,
        fence: SharedFence,
        config: &BufferFlushConfig,
    ) -> Result<(), Rejected<DequeuedBuffer>> {
        let buffer = check_origin(&self.queue, buffer.queue_id, buffer)?;
        match self
            .queue
            .flush_buffer(Some(buffer.buffer.as_ref()), fence, config)
        {
            Ok(()) => Ok(()),
            Err(error) => Err(Rejected::new(error, buffer)),
        }
    }

    fn cancel_buffer(&self, buffer: DequeuedBuffer) -> Result<(), Rejected<DequeuedBuffer>> {
        let buffer = check_origin(&self.queue, buffer.queue_id, buffer)?;
        match self.queue.cancel_buffer(Some(buffer.buffer.as_ref())) {
            Ok(()) => Ok(()),
            Err(error) => Err(Rejected::new(error, buffer)),
        }
    }

    fn acquire_buffer(&self) -> SurfaceResult<AcquiredBuffer> {
        Err(SurfaceError::NotSupport)
    }

    fn release_buffer(
        &self,
        buffer: AcquiredBuffer,
        _fence: SharedFence,
    ) -> Result<(), Rejected<AcquiredBuffer>> {
        Err(Rejected::new(SurfaceError::NotSupport, buffer))
    }

    fn register_consumer_listener(
        &self,
        _listener: Arc<dyn ConsumerListener>,
    ) -> SurfaceResult<()> {
        Err(SurfaceError::NotSupport)
    }

    fn unregister_consumer_listener(&self) -> SurfaceResult<()> {
        Err(SurfaceError::NotSupport)
    }
}
