//! ### English
//! Core implementation: buffers, fences, the buffer queue with its role handles, damage
//! tracking and the presentation cache.
//!
//! ### 中文
//! 核心实现：缓冲区、fence、带角色句柄的缓冲队列、damage 追踪以及呈现缓存。

pub mod allocator;
pub mod buffer;
pub mod dirty;
pub mod error;
pub mod fence;
pub mod flags;
pub mod presentation;
pub mod queue;
pub mod role;
pub mod types;
pub mod window;
