//! ### English
//! Move-only ownership tokens.
//!
//! A `DequeuedBuffer` is the producer's proof that it owns a buffer between request and
//! flush/cancel; an `AcquiredBuffer` is the consumer's proof between acquire and release.
//! Neither is `Clone`, so a buffer cannot be flushed or released twice through them.
//!
//! ### 中文
//! 只能移动的所有权令牌。
//!
//! `DequeuedBuffer` 证明生产者在 request 与 flush/cancel 之间拥有缓冲区；`AcquiredBuffer`
//! 证明消费者在 acquire 与 release 之间拥有缓冲区。二者都不可 `Clone`，因此无法通过它们
//! 重复 flush 或 release 同一缓冲区。

use std::sync::Arc;

use crate::surface::buffer::SurfaceBuffer;
use crate::surface::fence::SharedFence;
use crate::surface::types::{Rect, ScalingMode};

#[derive(Debug)]
#[must_use = "a dequeued buffer must be flushed or cancelled"]
pub struct DequeuedBuffer {
    pub(super) queue_id: u64,
    pub(super) buffer: Arc<SurfaceBuffer>,
}

impl DequeuedBuffer {
    pub fn buffer(&self) -> &Arc<SurfaceBuffer> {
        &self.buffer
    }

    pub fn sequence(&self) -> u32 {
        self.buffer.sequence()
    }
}

/// ### English
/// Output of `request_buffer`: the token, the fence to wait on before writing and the sequences
/// of buffers the queue destroyed since the previous request.
///
/// ### 中文
/// `request_buffer` 的输出：令牌、写入前需等待的 fence，以及自上次 request 以来队列销毁的缓冲区序列号。
#[derive(Debug)]
pub struct RequestedBuffer {
    pub buffer: DequeuedBuffer,
    pub release_fence: SharedFence,
    pub deleted_sequences: Vec<u32>,
}

#[derive(Debug)]
#[must_use = "an acquired buffer must be released"]
pub struct AcquiredBuffer {
    pub(super) queue_id: u64,
    pub(super) buffer: Arc<SurfaceBuffer>,
    pub(super) acquire_fence: SharedFence,
    pub(super) timestamp: i64,
    pub(super) damage: Rect,
    pub(super) scaling_mode: ScalingMode,
}

impl AcquiredBuffer {
    pub fn buffer(&self) -> &Arc<SurfaceBuffer> {
        &self.buffer
    }

    pub fn sequence(&self) -> u32 {
        self.buffer.sequence()
    }

    /// ### English
    /// Fence to wait on before reading the buffer.
    ///
    /// ### 中文
    /// 读取缓冲区前需等待的 fence。
    pub fn acquire_fence(&self) -> &SharedFence {
        &self.acquire_fence
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn damage(&self) -> Rect {
        self.damage
    }

    pub fn scaling_mode(&self) -> ScalingMode {
        self.scaling_mode
    }
}
