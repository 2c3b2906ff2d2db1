//! ### English
//! In-process allocator backend: each descriptor names a zeroed heap region.
//!
//! Used as the default backend and in tests; it honors stride alignment, reference-counts
//! imported handles and can enforce a byte budget so exhaustion paths are reachable.
//!
//! ### 中文
//! 进程内分配器后端：每个描述符对应一块清零的堆内存。
//!
//! 作为默认后端及测试使用；遵循跨度对齐，对导入句柄做引用计数，并可设置字节预算以便触发耗尽路径。

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;

use super::{AllocInfo, AllocatorStatus, BufferAllocator, BufferHandle, HandleDesc};

const HEAP_FD_BASE: i32 = 1 << 16;

struct HeapRegion {
    base: NonNull<u8>,
    len: usize,
    refs: u32,
    maps: u32,
}

// Only reachable through the allocator's mutex.
unsafe impl Send for HeapRegion {}

impl HeapRegion {
    fn zeroed(len: usize) -> Self {
        let memory: Box<[u8]> = vec![0u8; len].into_boxed_slice();
        let base = NonNull::from(Box::leak(memory)).cast::<u8>();
        Self {
            base,
            len,
            refs: 1,
            maps: 0,
        }
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.len);
        // SAFETY: `base`/`len` come from the leaked box in `zeroed`.
        drop(unsafe { Box::from_raw(slice) });
    }
}

#[derive(Default)]
struct HeapState {
    regions: HashMap<i32, HeapRegion>,
    bytes_in_use: usize,
}

pub struct HeapAllocator {
    state: Mutex<HeapState>,
    next_fd: AtomicI32,
    budget: Option<usize>,
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeapState::default()),
            next_fd: AtomicI32::new(HEAP_FD_BASE),
            budget: None,
        }
    }

    /// ### English
    /// Allocator that fails with `NoMem` once `bytes` would be exceeded.
    ///
    /// ### 中文
    /// 超出 `bytes` 时以 `NoMem` 失败的分配器。
    pub fn with_budget(bytes: usize) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::new()
        }
    }

    pub fn live_allocations(&self) -> usize {
        self.state.lock().regions.len()
    }

    pub fn bytes_in_use(&self) -> usize {
        self.state.lock().bytes_in_use
    }

    fn with_region(
        &self,
        handle: &BufferHandle,
        f: impl FnOnce(&mut HeapRegion) -> AllocatorStatus,
    ) -> AllocatorStatus {
        let mut state = self.state.lock();
        match state.regions.get_mut(&handle.desc().fd) {
            Some(region) => f(region),
            None => AllocatorStatus::BadFd,
        }
    }
}

fn align_up(value: i32, align: i32) -> i32 {
    (value + align - 1) & !(align - 1)
}

unsafe impl BufferAllocator for HeapAllocator {
    fn alloc_mem(&self, info: &AllocInfo) -> Result<BufferHandle, AllocatorStatus> {
        if info.width <= 0 || info.height <= 0 || info.stride_alignment <= 0 {
            return Err(AllocatorStatus::InvalidParam);
        }
        let row_bytes = info.width * info.format.plane_bytes_per_pixel();
        let stride = align_up(row_bytes, info.stride_alignment);
        let size = info.format.buffer_size(stride, info.height);

        let mut state = self.state.lock();
        if let Some(budget) = self.budget
            && state.bytes_in_use + size > budget
        {
            tracing::debug!(size, budget, "heap allocator budget exhausted");
            return Err(AllocatorStatus::NoMem);
        }

        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        state.regions.insert(fd, HeapRegion::zeroed(size));
        state.bytes_in_use += size;
        tracing::trace!(fd, size, stride, "heap region allocated");

        Ok(BufferHandle::new(HandleDesc {
            fd,
            width: info.width,
            height: info.height,
            stride,
            size,
            format: info.format,
            usage: info.usage,
            phy_addr: 0,
        }))
    }

    fn import_handle(&self, handle: &BufferHandle) -> AllocatorStatus {
        self.with_region(handle, |region| {
            region.refs += 1;
            AllocatorStatus::Success
        })
    }

    fn free_mem(&self, handle: BufferHandle) {
        let fd = handle.desc().fd;
        let mut state = self.state.lock();
        let Some(region) = state.regions.get_mut(&fd) else {
            tracing::warn!(fd, "free of unknown heap descriptor");
            return;
        };
        if handle.is_mapped() {
            region.maps = region.maps.saturating_sub(1);
        }
        region.refs -= 1;
        if region.refs == 0
            && let Some(region) = state.regions.remove(&fd)
        {
            state.bytes_in_use -= region.len;
            tracing::trace!(fd, "heap region released");
        }
    }

    fn mmap(&self, handle: &BufferHandle) -> Option<NonNull<u8>> {
        let mut state = self.state.lock();
        let region = state.regions.get_mut(&handle.desc().fd)?;
        region.maps += 1;
        Some(region.base)
    }

    fn unmap(&self, handle: &BufferHandle) -> AllocatorStatus {
        self.with_region(handle, |region| {
            if region.maps == 0 {
                return AllocatorStatus::InvalidParam;
            }
            region.maps -= 1;
            AllocatorStatus::Success
        })
    }

    fn flush_cache(&self, handle: &BufferHandle) -> AllocatorStatus {
        self.with_region(handle, |region| {
            if region.maps == 0 {
                AllocatorStatus::InvalidParam
            } else {
                AllocatorStatus::Success
            }
        })
    }

    fn invalidate_cache(&self, handle: &BufferHandle) -> AllocatorStatus {
        self.flush_cache(handle)
    }
}
