/// ### English
/// `surface_queue` crate root.
/// Core implementation lives under `surface`; `ffi` exposes a C ABI over it.
///
/// ### 中文
/// `surface_queue` 的 crate 根。
/// 核心实现位于 `surface` 模块；`ffi` 在其之上导出 C ABI。
pub mod surface;

mod ffi;

pub use surface::allocator::{
    AllocInfo, AllocatorClient, AllocatorStatus, BufferAllocator, BufferHandle, HandleDesc,
    HeapAllocator,
};
pub use surface::buffer::{BufferId, EglData, ExtraData, ExtraKey, ExtraValue, SurfaceBuffer};
pub use surface::dirty::DirtyRegionManager;
pub use surface::error::{LowError, Rejected, SurfaceError, SurfaceResult};
pub use surface::fence::{Fence, FenceSignaler, FenceStatus, SharedFence};
pub use surface::flags::{BufferUsage, NativeUsage};
pub use surface::presentation::{BufferPresentationCache, CachedBuffer};
pub use surface::queue::{
    BufferAvailable, BufferQueue, BufferQueueInit, ChannelListener, ConsumerListener,
    ReleaseListener, SlotState,
};
pub use surface::role::{
    AcquiredBuffer, ConsumerSurface, DequeuedBuffer, ProducerSurface, RequestedBuffer, Surface,
};
pub use surface::types::{
    BufferFlushConfig, BufferRequestConfig, ColorGamut, PixelFormat, Rect, ScalingMode,
    TransformType,
};
pub use surface::window::{NativeWindow, WindowConfig};
