//! ### English
//! `SurfaceBuffer`: a native buffer handle plus the metadata that travels with it.
//!
//! All handle-touching operations serialize on the buffer's own lock. Sequence numbers come
//! from a process-wide counter and, together with the process id, identify a buffer across
//! processes.
//!
//! ### 中文
//! `SurfaceBuffer`：原生缓冲区句柄及随之传递的元数据。
//!
//! 所有涉及句柄的操作都在缓冲区自身的锁上串行化。序列号来自进程级计数器，
//! 与进程 id 一起在跨进程时标识缓冲区。

mod extra;
mod parcel;

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::allocator::{AllocInfo, AllocatorClient, BufferAllocator, BufferHandle, HandleDesc};
use super::error::{LowError, SurfaceError, SurfaceResult};
use super::flags::NativeUsage;
use super::types::{BufferRequestConfig, ColorGamut, PixelFormat, TransformType};

pub use extra::{ExtraData, ExtraKey, ExtraValue};

static NEXT_SEQUENCE: AtomicU32 = AtomicU32::new(0);

const MAPPED_ACCESS_STRIPES: usize = 32;

/// ### English
/// Exclusive CPU access to mapped memory, striped by descriptor.
///
/// Buffers imported from a parcel share memory with their sender but not the buffer lock, so
/// `with_mapped` also takes the stripe of the descriptor. Unrelated descriptors may share a stripe.
///
/// ### 中文
/// 按描述符分条的映射内存独占访问锁。
///
/// 从 parcel 导入的缓冲区与发送方共享内存但不共享缓冲区锁，因此 `with_mapped` 还会持有该描述符
/// 所在分条的锁。不相关的描述符可能落在同一分条。
static MAPPED_ACCESS: [Mutex<()>; MAPPED_ACCESS_STRIPES] =
    [const { Mutex::new(()) }; MAPPED_ACCESS_STRIPES];

fn mapped_access(fd: i32) -> &'static Mutex<()> {
    &MAPPED_ACCESS[fd.unsigned_abs() as usize % MAPPED_ACCESS_STRIPES]
}

/// ### English
/// Cross-process identity of a buffer.
///
/// ### 中文
/// 缓冲区的跨进程标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId {
    pub pid: u32,
    pub sequence: u32,
}

/// ### English
/// GPU-side resource created from a buffer (EGL image / texture). Buffers only keep a weak
/// reference; the renderer owns it.
///
/// ### 中文
/// 由缓冲区创建的 GPU 侧资源（EGL image / 纹理）。缓冲区只保留弱引用；所有权在渲染器。
pub trait EglData: Send + Sync {
    fn egl_image(&self) -> u64;
    fn texture_id(&self) -> u32;
}

struct BufferState {
    handle: Option<BufferHandle>,
    color_gamut: ColorGamut,
    transform: TransformType,
    extra: ExtraData,
    egl_data: Option<Weak<dyn EglData>>,
}

pub struct SurfaceBuffer {
    id: BufferId,
    allocator: Arc<AllocatorClient>,
    state: Mutex<BufferState>,
}

impl SurfaceBuffer {
    /// ### English
    /// Creates an unallocated buffer with the next process-wide sequence number.
    ///
    /// ### 中文
    /// 创建一个未分配的缓冲区，并分配下一个进程级序列号。
    pub fn new(allocator: Arc<AllocatorClient>) -> Self {
        let id = BufferId {
            pid: std::process::id(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        };
        Self::with_id(id, allocator)
    }

    fn with_id(id: BufferId, allocator: Arc<AllocatorClient>) -> Self {
        Self {
            id,
            allocator,
            state: Mutex::new(BufferState {
                handle: None,
                color_gamut: ColorGamut::Srgb,
                transform: TransformType::RotateNone,
                extra: ExtraData::default(),
                egl_data: None,
            }),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn sequence(&self) -> u32 {
        self.id.sequence
    }

    /// ### English
    /// Allocates backing memory for `config`, releasing any handle held before.
    ///
    /// Allocator failures surface as `ApiFailed` carrying the backend class; nothing is retried.
    ///
    /// ### 中文
    /// 按 `config` 分配底层内存，并释放之前持有的句柄。
    ///
    /// 分配器失败以携带后端类别的 `ApiFailed` 返回；不做重试。
    pub fn alloc(&self, config: &BufferRequestConfig) -> SurfaceResult<()> {
        config.validate()?;
        let backend = self.allocator.backend()?;
        let mut state = self.state.lock();
        release_locked(backend.as_ref(), &mut state, self.id.sequence);

        let info = AllocInfo {
            width: config.width,
            height: config.height,
            stride_alignment: config.stride_alignment,
            format: config.format,
            usage: config.usage.to_native(),
        };
        let handle = backend.alloc_mem(&info).map_err(|status| {
            let error = status.into_error();
            tracing::warn!(sequence = self.id.sequence, %error, "buffer allocation failed");
            error
        })?;
        tracing::debug!(
            sequence = self.id.sequence,
            fd = handle.desc().fd,
            width = config.width,
            height = config.height,
            "buffer allocated"
        );
        state.handle = Some(handle);
        state.color_gamut = config.color_gamut;
        state.transform = config.transform;
        Ok(())
    }

    /// ### English
    /// Maps the buffer for CPU access. Mapping a mapped buffer is a no-op.
    ///
    /// ### 中文
    /// 为 CPU 访问映射缓冲区。对已映射缓冲区再次映射不做任何事。
    pub fn map(&self) -> SurfaceResult<()> {
        let mut state = self.state.lock();
        self.map_locked(&mut state).map(|_| ())
    }

    /// ### English
    /// Unmaps the buffer. Unmapping an unmapped buffer is a no-op.
    ///
    /// ### 中文
    /// 解除映射。对未映射缓冲区解除映射不做任何事。
    pub fn unmap(&self) -> SurfaceResult<()> {
        let mut state = self.state.lock();
        let handle = state.handle.as_mut().ok_or(SurfaceError::InvalidOperating)?;
        if !handle.is_mapped() {
            return Ok(());
        }
        let backend = self.allocator.backend()?;
        backend.unmap(handle).into_result()?;
        handle.set_vir_addr(None);
        Ok(())
    }

    pub fn flush_cache(&self) -> SurfaceResult<()> {
        self.with_mapped_handle(|backend, handle| backend.flush_cache(handle).into_result())
    }

    pub fn invalidate_cache(&self) -> SurfaceResult<()> {
        self.with_mapped_handle(|backend, handle| backend.invalidate_cache(handle).into_result())
    }

    /// ### English
    /// CPU address of the buffer, mapping it on first use.
    ///
    /// ### 中文
    /// 缓冲区的 CPU 地址，首次使用时映射。
    pub fn vir_addr(&self) -> SurfaceResult<NonNull<u8>> {
        let mut state = self.state.lock();
        self.map_locked(&mut state)
    }

    /// ### English
    /// Runs `f` over the mapped bytes, mapping on first use.
    ///
    /// Holds the buffer lock and the access lock of the descriptor, so every buffer sharing the
    /// memory (the sender and receivers of a parcel) is excluded while `f` runs. `f` must not
    /// map another buffer.
    ///
    /// ### 中文
    /// 对映射字节执行 `f`，首次使用时映射。
    ///
    /// 期间持有缓冲区锁及该描述符的访问锁，共享同一内存的所有缓冲区（parcel 的发送方与接收方）
    /// 在 `f` 运行时均被排除。`f` 内不得再映射其它缓冲区。
    pub fn with_mapped<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> SurfaceResult<R> {
        let mut state = self.state.lock();
        let addr = self.map_locked(&mut state)?;
        let (fd, size) = state
            .handle
            .as_ref()
            .map(|h| (h.desc().fd, h.desc().size))
            .ok_or(SurfaceError::InvalidOperating)?;
        let _access = mapped_access(fd).lock();
        // SAFETY: `BufferAllocator::mmap` guarantees `size` valid bytes until unmap/free, which
        // need the buffer lock held here. Other handles on the same memory go through the same
        // descriptor stripe, so no other `&mut` to these bytes exists while `f` runs.
        let bytes = unsafe { std::slice::from_raw_parts_mut(addr.as_ptr(), size) };
        Ok(f(bytes))
    }

    fn map_locked(&self, state: &mut BufferState) -> SurfaceResult<NonNull<u8>> {
        let handle = state.handle.as_mut().ok_or(SurfaceError::InvalidOperating)?;
        if let Some(addr) = handle.vir_addr() {
            return Ok(addr);
        }
        let backend = self.allocator.backend()?;
        let addr = backend.mmap(handle).ok_or_else(|| {
            tracing::warn!(sequence = self.id.sequence, "buffer map returned null");
            SurfaceError::ApiFailed(LowError::NullPtr)
        })?;
        handle.set_vir_addr(Some(addr));
        Ok(addr)
    }

    fn with_mapped_handle(
        &self,
        f: impl FnOnce(&dyn BufferAllocator, &BufferHandle) -> SurfaceResult<()>,
    ) -> SurfaceResult<()> {
        let state = self.state.lock();
        let handle = state.handle.as_ref().ok_or(SurfaceError::InvalidOperating)?;
        if !handle.is_mapped() {
            return Err(SurfaceError::InvalidOperating);
        }
        let backend = self.allocator.backend()?;
        f(backend.as_ref(), handle)
    }

    /// ### English
    /// Unmaps (if mapped) and releases the native handle. Safe to call repeatedly.
    ///
    /// ### 中文
    /// 解除映射（如已映射）并释放原生句柄。可重复调用。
    pub fn free_handle(&self) {
        let mut state = self.state.lock();
        if state.handle.is_none() {
            return;
        }
        match self.allocator.backend() {
            Ok(backend) => release_locked(backend.as_ref(), &mut state, self.id.sequence),
            Err(error) => {
                tracing::warn!(sequence = self.id.sequence, %error, "native handle leaked");
                state.handle = None;
            }
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    pub fn is_mapped(&self) -> bool {
        self.state
            .lock()
            .handle
            .as_ref()
            .is_some_and(BufferHandle::is_mapped)
    }

    /// ### English
    /// Snapshot of the handle description; `None` while unallocated.
    ///
    /// ### 中文
    /// 句柄描述快照；未分配时为 `None`。
    pub fn desc(&self) -> Option<HandleDesc> {
        self.state.lock().handle.as_ref().map(|h| *h.desc())
    }

    pub fn width(&self) -> Option<i32> {
        self.desc().map(|d| d.width)
    }

    pub fn height(&self) -> Option<i32> {
        self.desc().map(|d| d.height)
    }

    pub fn stride(&self) -> Option<i32> {
        self.desc().map(|d| d.stride)
    }

    pub fn format(&self) -> Option<PixelFormat> {
        self.desc().map(|d| d.format)
    }

    pub fn usage(&self) -> Option<NativeUsage> {
        self.desc().map(|d| d.usage)
    }

    pub fn fd(&self) -> Option<i32> {
        self.desc().map(|d| d.fd)
    }

    pub fn size(&self) -> Option<usize> {
        self.desc().map(|d| d.size)
    }

    pub fn phy_addr(&self) -> Option<u64> {
        self.desc().map(|d| d.phy_addr)
    }

    pub fn color_gamut(&self) -> ColorGamut {
        self.state.lock().color_gamut
    }

    pub fn set_color_gamut(&self, gamut: ColorGamut) {
        self.state.lock().color_gamut = gamut;
    }

    pub fn transform(&self) -> TransformType {
        self.state.lock().transform
    }

    pub fn set_transform(&self, transform: TransformType) {
        self.state.lock().transform = transform;
    }

    pub fn set_extra_data(
        &self,
        key: impl Into<ExtraKey>,
        value: impl Into<ExtraValue>,
    ) -> SurfaceResult<()> {
        self.state.lock().extra.set(key.into(), value.into())
    }

    pub fn extra_i32(&self, key: impl Into<ExtraKey>) -> SurfaceResult<i32> {
        self.state.lock().extra.get_i32(&key.into())
    }

    pub fn extra_i64(&self, key: impl Into<ExtraKey>) -> SurfaceResult<i64> {
        self.state.lock().extra.get_i64(&key.into())
    }

    pub fn extra_f64(&self, key: impl Into<ExtraKey>) -> SurfaceResult<f64> {
        self.state.lock().extra.get_f64(&key.into())
    }

    pub fn extra_string(&self, key: impl Into<ExtraKey>) -> SurfaceResult<String> {
        self.state.lock().extra.get_str(&key.into()).map(str::to_owned)
    }

    /// ### English
    /// Copy of the whole extra-data map.
    ///
    /// ### 中文
    /// 整个 extra data 表的副本。
    pub fn extra_data(&self) -> ExtraData {
        self.state.lock().extra.clone()
    }

    pub fn set_egl_data(&self, data: &Arc<dyn EglData>) {
        self.state.lock().egl_data = Some(Arc::downgrade(data));
    }

    /// ### English
    /// The GPU-side resource, if its owner still keeps it alive.
    ///
    /// ### 中文
    /// GPU 侧资源（若其所有者仍保持其存活）。
    pub fn egl_data(&self) -> Option<Arc<dyn EglData>> {
        self.state.lock().egl_data.as_ref().and_then(Weak::upgrade)
    }
}

fn release_locked(backend: &dyn BufferAllocator, state: &mut BufferState, sequence: u32) {
    state.egl_data = None;
    let Some(mut handle) = state.handle.take() else {
        return;
    };
    if handle.is_mapped() {
        if let Err(error) = backend.unmap(&handle).into_result() {
            tracing::warn!(sequence, %error, "unmap before free failed");
        }
        handle.set_vir_addr(None);
    }
    tracing::debug!(sequence, fd = handle.desc().fd, "buffer freed");
    backend.free_mem(handle);
}

impl Drop for SurfaceBuffer {
    fn drop(&mut self) {
        self.free_handle();
    }
}

impl std::fmt::Debug for SurfaceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceBuffer")
            .field("id", &self.id)
            .field("desc", &self.desc())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::allocator::HeapAllocator;
    use crate::surface::flags::BufferUsage;

    fn config() -> BufferRequestConfig {
        BufferRequestConfig {
            width: 8,
            height: 4,
            usage: BufferUsage::CPU_READ | BufferUsage::CPU_WRITE,
            ..Default::default()
        }
    }

    fn heap_buffer() -> (Arc<HeapAllocator>, SurfaceBuffer) {
        let heap = Arc::new(HeapAllocator::new());
        let client = AllocatorClient::with_backend(heap.clone());
        (heap, SurfaceBuffer::new(client))
    }

    #[test]
    fn sequences_increase() {
        let client = AllocatorClient::heap();
        let a = SurfaceBuffer::new(client.clone());
        let b = SurfaceBuffer::new(client);
        assert!(b.sequence() > a.sequence());
        assert_eq!(a.id().pid, std::process::id());
    }

    #[test]
    fn map_and_unmap_are_idempotent() {
        let (_heap, buffer) = heap_buffer();
        buffer.alloc(&config()).unwrap();

        buffer.map().unwrap();
        let first = buffer.vir_addr().unwrap();
        buffer.map().unwrap();
        assert_eq!(buffer.vir_addr().unwrap(), first);

        buffer.unmap().unwrap();
        buffer.unmap().unwrap();
        assert!(!buffer.is_mapped());
    }

    #[test]
    fn vir_addr_maps_lazily() {
        let (_heap, buffer) = heap_buffer();
        buffer.alloc(&config()).unwrap();
        assert!(!buffer.is_mapped());
        buffer.vir_addr().unwrap();
        assert!(buffer.is_mapped());
    }

    #[test]
    fn cache_ops_require_mapping() {
        let (_heap, buffer) = heap_buffer();
        buffer.alloc(&config()).unwrap();
        assert_eq!(buffer.flush_cache(), Err(SurfaceError::InvalidOperating));
        assert_eq!(buffer.invalidate_cache(), Err(SurfaceError::InvalidOperating));
        buffer.map().unwrap();
        buffer.flush_cache().unwrap();
        buffer.invalidate_cache().unwrap();
    }

    #[test]
    fn unallocated_buffer_rejects_handle_ops() {
        let (_heap, buffer) = heap_buffer();
        assert_eq!(buffer.map(), Err(SurfaceError::InvalidOperating));
        assert_eq!(buffer.width(), None);
    }

    #[test]
    fn realloc_and_drop_release_memory() {
        let (heap, buffer) = heap_buffer();
        buffer.alloc(&config()).unwrap();
        buffer.map().unwrap();
        buffer
            .alloc(&BufferRequestConfig {
                width: 16,
                ..config()
            })
            .unwrap();
        assert_eq!(heap.live_allocations(), 1);
        assert_eq!(buffer.width(), Some(16));
        drop(buffer);
        assert_eq!(heap.live_allocations(), 0);
    }

    #[test]
    fn allocation_failure_maps_backend_class() {
        let heap = Arc::new(HeapAllocator::with_budget(16));
        let buffer = SurfaceBuffer::new(AllocatorClient::with_backend(heap));
        assert_eq!(
            buffer.alloc(&config()),
            Err(SurfaceError::ApiFailed(LowError::NoMem))
        );
        assert!(!buffer.is_allocated());
    }

    #[test]
    fn writes_through_mapping_are_visible() {
        let (_heap, buffer) = heap_buffer();
        buffer.alloc(&config()).unwrap();
        buffer.with_mapped(|bytes| bytes[0] = 0xAB).unwrap();
        assert_eq!(buffer.with_mapped(|bytes| bytes[0]).unwrap(), 0xAB);
    }

    #[test]
    fn egl_data_is_weak() {
        struct Texture;
        impl EglData for Texture {
            fn egl_image(&self) -> u64 {
                1
            }
            fn texture_id(&self) -> u32 {
                2
            }
        }

        let (_heap, buffer) = heap_buffer();
        let texture: Arc<dyn EglData> = Arc::new(Texture);
        buffer.set_egl_data(&texture);
        assert_eq!(buffer.egl_data().map(|d| d.texture_id()), Some(2));
        drop(texture);
        assert!(buffer.egl_data().is_none());
    }
}
