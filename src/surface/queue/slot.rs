use std::sync::Arc;

use slotmap::new_key_type;

use crate::surface::buffer::SurfaceBuffer;
use crate::surface::fence::{Fence, SharedFence};
use crate::surface::types::{BufferRequestConfig, Rect};

new_key_type! {
    /// ### English
    /// Generational index of a slot inside one queue's arena.
    ///
    /// ### 中文
    /// 单个队列 arena 内槽位的分代索引。
    pub struct SlotKey;
}

/// ### English
/// Ownership state of a slot.
///
/// - `Free`: owned by the queue, reusable.
/// - `Dequeued`: owned by the producer, being rendered.
/// - `Queued`: waiting in the FIFO for the consumer.
/// - `Acquired`: owned by the consumer.
///
/// ### 中文
/// 槽位的所有权状态。
///
/// - `Free`：归队列所有，可复用。
/// - `Dequeued`：归生产者所有，正在渲染。
/// - `Queued`：在 FIFO 中等待消费者。
/// - `Acquired`：归消费者所有。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Free,
    Dequeued,
    Queued,
    Acquired,
}

pub(super) struct BufferSlot {
    pub(super) buffer: Arc<SurfaceBuffer>,
    pub(super) state: SlotState,
    pub(super) config: BufferRequestConfig,
    pub(super) acquire_fence: SharedFence,
    pub(super) release_fence: SharedFence,
    pub(super) damage: Rect,
    pub(super) timestamp: i64,
    /// ### English
    /// Evicted while in flight; destroyed instead of recycled when it comes back.
    ///
    /// ### 中文
    /// 在流转中被驱逐；回到队列时直接销毁而不回收。
    pub(super) deleting: bool,
}

impl BufferSlot {
    pub(super) fn new(buffer: Arc<SurfaceBuffer>, config: BufferRequestConfig) -> Self {
        Self {
            buffer,
            state: SlotState::Free,
            config,
            acquire_fence: Fence::invalid(),
            release_fence: Fence::invalid(),
            damage: Rect::default(),
            timestamp: 0,
            deleting: false,
        }
    }

    pub(super) fn sequence(&self) -> u32 {
        self.buffer.sequence()
    }

    pub(super) fn is_in_flight(&self) -> bool {
        matches!(self.state, SlotState::Dequeued | SlotState::Acquired)
    }
}
