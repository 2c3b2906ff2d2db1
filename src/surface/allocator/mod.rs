//! ### English
//! Allocator seam: the trait a native buffer allocator implements, the handle it produces and
//! the client that owns the connection to it.
//!
//! ### 中文
//! 分配器接缝：原生缓冲区分配器需实现的 trait、它产出的句柄，以及持有其连接的客户端。

mod client;
mod handle;
mod heap;

use std::ptr::NonNull;

use crate::surface::error::{LowError, SurfaceError, SurfaceResult};
use crate::surface::flags::NativeUsage;
use crate::surface::types::PixelFormat;

pub use client::{AllocatorClient, AllocatorConnector, DeathCallback};
pub use handle::{BufferHandle, HandleDesc};
pub use heap::HeapAllocator;

/// ### English
/// Outcome of an allocator call, in the backend's own vocabulary.
///
/// ### 中文
/// 分配器调用结果（后端自身的分类）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorStatus {
    Success,
    Failure,
    BadFd,
    InvalidParam,
    NullPtr,
    NotSupported,
    NoMem,
    Busy,
    NotPermitted,
}

impl AllocatorStatus {
    pub fn into_result(self) -> SurfaceResult<()> {
        match self.low_error() {
            None => Ok(()),
            Some(low) => Err(SurfaceError::ApiFailed(low)),
        }
    }

    pub const fn low_error(self) -> Option<LowError> {
        Some(match self {
            AllocatorStatus::Success => return None,
            AllocatorStatus::Failure => LowError::Failure,
            AllocatorStatus::BadFd => LowError::BadFd,
            AllocatorStatus::InvalidParam => LowError::InvalidParam,
            AllocatorStatus::NullPtr => LowError::NullPtr,
            AllocatorStatus::NotSupported => LowError::NotSupported,
            AllocatorStatus::NoMem => LowError::NoMem,
            AllocatorStatus::Busy => LowError::Busy,
            AllocatorStatus::NotPermitted => LowError::NotPermitted,
        })
    }

    /// ### English
    /// Error for a call the backend reported as failed. A failure carrying `Success` is a
    /// backend bug and maps to `ApiFailed(Unknown)`.
    ///
    /// ### 中文
    /// 后端报告失败时对应的错误。携带 `Success` 的失败属于后端缺陷，映射为 `ApiFailed(Unknown)`。
    pub fn into_error(self) -> SurfaceError {
        SurfaceError::ApiFailed(self.low_error().unwrap_or(LowError::Unknown))
    }
}

/// ### English
/// Allocation request in native terms.
///
/// ### 中文
/// 以原生术语表达的分配请求。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocInfo {
    pub width: i32,
    pub height: i32,
    pub stride_alignment: i32,
    pub format: PixelFormat,
    pub usage: NativeUsage,
}

/// ### English
/// Native buffer allocator backend.
///
/// # Safety
/// `mmap` must return a pointer valid for reads and writes of `handle.desc().size` bytes until
/// the matching `unmap` or `free_mem` of that handle. Memory behind one descriptor must stay
/// valid while any imported handle for it is alive.
///
/// ### 中文
/// 原生缓冲区分配器后端。
///
/// # 安全性
/// `mmap` 返回的指针在对应句柄 `unmap` 或 `free_mem` 之前，必须对 `handle.desc().size`
/// 字节可读写。同一描述符的内存在任何导入句柄存活期间必须保持有效。
pub unsafe trait BufferAllocator: Send + Sync {
    fn alloc_mem(&self, info: &AllocInfo) -> Result<BufferHandle, AllocatorStatus>;

    /// ### English
    /// Takes a reference on memory described by a handle received from another process.
    ///
    /// ### 中文
    /// 对从其它进程收到的句柄所描述的内存增加引用。
    fn import_handle(&self, handle: &BufferHandle) -> AllocatorStatus;

    fn free_mem(&self, handle: BufferHandle);

    fn mmap(&self, handle: &BufferHandle) -> Option<NonNull<u8>>;

    fn unmap(&self, handle: &BufferHandle) -> AllocatorStatus;

    fn flush_cache(&self, handle: &BufferHandle) -> AllocatorStatus;

    fn invalidate_cache(&self, handle: &BufferHandle) -> AllocatorStatus;
}
