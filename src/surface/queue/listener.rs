//! ### English
//! Callbacks the queue fires outside its lock.
//!
//! Delivery is best effort: a missing listener never makes a queue operation fail.
//!
//! ### 中文
//! 队列在锁外触发的回调。
//!
//! 投递为尽力而为：缺少监听器不会导致队列操作失败。

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel as channel;

use crate::surface::buffer::SurfaceBuffer;

/// ### English
/// Consumer-side notification: a buffer was flushed and can be acquired.
///
/// ### 中文
/// 消费者侧通知：有缓冲区被提交，可以 acquire。
pub trait ConsumerListener: Send + Sync {
    fn on_buffer_available(&self);
}

impl<F> ConsumerListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_buffer_available(&self) {
        self()
    }
}

/// ### English
/// Producer-side notification: the consumer released a buffer back to the queue.
///
/// ### 中文
/// 生产者侧通知：消费者已将缓冲区释放回队列。
pub trait ReleaseListener: Send + Sync {
    fn on_buffer_released(&self, buffer: &Arc<SurfaceBuffer>);
}

impl<F> ReleaseListener for F
where
    F: Fn(&Arc<SurfaceBuffer>) + Send + Sync,
{
    fn on_buffer_released(&self, buffer: &Arc<SurfaceBuffer>) {
        self(buffer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAvailable {
    pub at: Instant,
}

/// ### English
/// Listener forwarding availability events to a channel, for consumers that drain
/// notifications from their own loop.
///
/// ### 中文
/// 将可用事件转发到 channel 的监听器，供在自身循环中取通知的消费者使用。
pub struct ChannelListener {
    sender: channel::Sender<BufferAvailable>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, channel::Receiver<BufferAvailable>) {
        let (sender, receiver) = channel::unbounded();
        (Arc::new(Self { sender }), receiver)
    }
}

impl ConsumerListener for ChannelListener {
    fn on_buffer_available(&self) {
        if self
            .sender
            .send(BufferAvailable { at: Instant::now() })
            .is_err()
        {
            tracing::trace!("buffer-available receiver dropped");
        }
    }
}
