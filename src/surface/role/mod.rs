//! ### English
//! Role handles over a shared `BufferQueue`.
//!
//! `ProducerSurface` and `ConsumerSurface` implement the same `Surface` trait; an operation that
//! belongs to the other role returns `NotSupport`. Buffers change hands through the move-only
//! tokens in `token`.
//!
//! ### 中文
//! 基于共享 `BufferQueue` 的角色句柄。
//!
//! `ProducerSurface` 与 `ConsumerSurface` 实现同一个 `Surface` trait；属于另一角色的操作返回
//! `NotSupport`。缓冲区通过 `token` 中只能移动的令牌转移所有权。

mod consumer;
mod producer;
mod token;

use std::sync::Arc;

use dpi::PhysicalSize;

use super::error::{Rejected, SurfaceError, SurfaceResult};
use super::fence::SharedFence;
use super::flags::BufferUsage;
use super::queue::{BufferQueue, ConsumerListener};
use super::types::{BufferFlushConfig, BufferRequestConfig};

pub use consumer::ConsumerSurface;
pub use producer::ProducerSurface;
pub use token::{AcquiredBuffer, DequeuedBuffer, RequestedBuffer};

pub trait Surface: Send + Sync {
    fn is_consumer(&self) -> bool;

    fn queue(&self) -> &Arc<BufferQueue>;

    fn request_buffer(&self, config: &BufferRequestConfig) -> SurfaceResult<RequestedBuffer>;

    fn flush_buffer(
        &self,
        buffer: DequeuedBuffer,
        fence: SharedFence,
        config: &BufferFlushConfig,
    ) -> Result<(), Rejected<DequeuedBuffer>>;

    fn cancel_buffer(&self, buffer: DequeuedBuffer) -> Result<(), Rejected<DequeuedBuffer>>;

    fn acquire_buffer(&self) -> SurfaceResult<AcquiredBuffer>;

    fn release_buffer(
        &self,
        buffer: AcquiredBuffer,
        fence: SharedFence,
    ) -> Result<(), Rejected<AcquiredBuffer>>;

    fn register_consumer_listener(&self, listener: Arc<dyn ConsumerListener>)
    -> SurfaceResult<()>;

    fn unregister_consumer_listener(&self) -> SurfaceResult<()>;

    fn name(&self) -> &str {
        self.queue().name()
    }

    fn unique_id(&self) -> u64 {
        self.queue().unique_id()
    }

    fn queue_size(&self) -> u32 {
        self.queue().queue_size()
    }

    fn set_queue_size(&self, queue_size: u32) -> SurfaceResult<()> {
        self.queue().set_queue_size(queue_size)
    }

    fn set_default_width_and_height(&self, width: i32, height: i32) -> SurfaceResult<()> {
        self.queue().set_default_width_and_height(width, height)
    }

    fn default_size(&self) -> PhysicalSize<i32> {
        self.queue().default_size()
    }

    fn set_default_usage(&self, usage: BufferUsage) {
        self.queue().set_default_usage(usage)
    }

    fn default_usage(&self) -> BufferUsage {
        self.queue().default_usage()
    }

    fn set_user_data(&self, key: &str, value: &str) -> SurfaceResult<()> {
        self.queue().set_user_data(key, value)
    }

    fn user_data(&self, key: &str) -> Option<String> {
        self.queue().user_data(key)
    }

    fn clean_cache(&self) -> SurfaceResult<()> {
        self.queue().clean_cache()
    }

    fn available_buffer_count(&self) -> u32 {
        self.queue().available_buffer_count()
    }
}

/// ### English
/// Rejects a token minted by another queue without touching this queue's state.
///
/// ### 中文
/// 拒绝由其它队列发放的令牌，且不触碰本队列状态。
fn check_origin<T>(queue: &BufferQueue, queue_id: u64, token: T) -> Result<T, Rejected<T>> {
    if queue_id == queue.unique_id() {
        Ok(token)
    } else {
        tracing::warn!(queue = %queue.name(), foreign = queue_id, "token from another queue");
        Err(Rejected::new(SurfaceError::InvalidOperating, token))
    }
}
