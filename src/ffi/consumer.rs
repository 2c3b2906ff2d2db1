use std::ffi::{c_char, c_void};
use std::sync::Arc;
use std::time::Duration;

use dpi::PhysicalSize;

use super::{
    SURFACE_QUEUE_OK, SurfaceQueueAcquiredBuffer, SurfaceQueueBufferInfo, SurfaceQueueConsumer,
    cstr_to_name, status,
};
use crate::surface::allocator::AllocatorClient;
use crate::surface::error::SurfaceError;
use crate::surface::fence::{Fence, FenceStatus};
use crate::surface::queue::BufferQueueInit;
use crate::surface::role::{ConsumerSurface, Surface};
use crate::surface::types::SURFACE_DEFAULT_QUEUE_SIZE;

pub type SurfaceQueueAvailableCallback = unsafe extern "C" fn(user_data: *mut c_void);

/// ### English
/// C callback plus its opaque user pointer.
///
/// The caller guarantees `user_data` may be used from whichever thread flushes.
///
/// ### 中文
/// C 回调及其不透明用户指针。
///
/// 调用方保证 `user_data` 可在任意执行 flush 的线程上使用。
struct CallbackListener {
    callback: SurfaceQueueAvailableCallback,
    user_data: *mut c_void,
}

unsafe impl Send for CallbackListener {}
unsafe impl Sync for CallbackListener {}

impl crate::surface::queue::ConsumerListener for CallbackListener {
    fn on_buffer_available(&self) {
        unsafe { (self.callback)(self.user_data) };
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Creates a buffer queue backed by the in-process heap allocator and returns its consumer.
///
/// `name` is an optional NUL-terminated UTF-8 string; NULL or empty keeps the default name.
/// `queue_size == 0` selects the default capacity. Returns NULL for a negative size.
///
/// ### 中文
/// 创建一个由进程内堆分配器支撑的缓冲队列，并返回其消费者。
///
/// `name` 为可选的 NUL 结尾 UTF-8 字符串；NULL 或空字符串保留默认名称。
/// `queue_size == 0` 使用默认容量。尺寸为负时返回 NULL。
pub unsafe extern "C" fn surface_queue_consumer_create(
    name: *const c_char,
    width: i32,
    height: i32,
    queue_size: u32,
) -> *mut SurfaceQueueConsumer {
    if width < 0 || height < 0 {
        return std::ptr::null_mut();
    }

    let mut init = BufferQueueInit {
        default_size: PhysicalSize::new(width, height),
        queue_size: if queue_size == 0 {
            SURFACE_DEFAULT_QUEUE_SIZE
        } else {
            queue_size
        },
        ..Default::default()
    };
    if let Some(name) = unsafe { cstr_to_name(name) } {
        init.name = name;
    }

    let consumer = ConsumerSurface::new(init, AllocatorClient::heap());
    Box::into_raw(Box::new(SurfaceQueueConsumer { consumer }))
}

#[unsafe(no_mangle)]
/// ### English
/// Destroys a consumer created by `surface_queue_consumer_create`.
///
/// Windows created from it keep the queue alive until they are destroyed too.
///
/// ### 中文
/// 销毁由 `surface_queue_consumer_create` 创建的消费者。
///
/// 由其创建的窗口会保持队列存活，直到它们也被销毁。
pub unsafe extern "C" fn surface_queue_consumer_destroy(consumer: *mut SurfaceQueueConsumer) {
    if consumer.is_null() {
        return;
    }

    drop(unsafe { Box::from_raw(consumer) });
}

#[unsafe(no_mangle)]
/// ### English
/// Installs the buffer-available callback. Passing NULL `callback` unregisters it.
///
/// The callback runs on the flushing thread, outside the queue lock.
///
/// ### 中文
/// 设置缓冲区可用回调。`callback` 传 NULL 表示注销。
///
/// 回调在执行 flush 的线程上、队列锁之外运行。
pub unsafe extern "C" fn surface_queue_consumer_set_listener(
    consumer: *mut SurfaceQueueConsumer,
    callback: Option<SurfaceQueueAvailableCallback>,
    user_data: *mut c_void,
) -> i32 {
    if consumer.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    let consumer = unsafe { &(*consumer).consumer };
    status(match callback {
        Some(callback) => {
            consumer.register_consumer_listener(Arc::new(CallbackListener { callback, user_data }))
        }
        None => consumer.unregister_consumer_listener(),
    })
}

#[unsafe(no_mangle)]
/// ### English
/// Acquires the oldest flushed buffer.
///
/// On success `*out_buffer` receives a handle that must be passed to
/// `surface_queue_consumer_release_buffer`. On failure `*out_buffer` is set to NULL.
///
/// ### 中文
/// acquire 最早提交的缓冲区。
///
/// 成功时 `*out_buffer` 得到一个必须交给 `surface_queue_consumer_release_buffer` 的句柄；
/// 失败时 `*out_buffer` 被置为 NULL。
pub unsafe extern "C" fn surface_queue_consumer_acquire_buffer(
    consumer: *mut SurfaceQueueConsumer,
    out_buffer: *mut *mut SurfaceQueueAcquiredBuffer,
) -> i32 {
    if consumer.is_null() || out_buffer.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    unsafe { *out_buffer = std::ptr::null_mut() };
    match unsafe { (*consumer).consumer.acquire_buffer() } {
        Ok(token) => {
            let handle = Box::new(SurfaceQueueAcquiredBuffer { token: Some(token) });
            unsafe { *out_buffer = Box::into_raw(handle) };
            SURFACE_QUEUE_OK
        }
        Err(error) => error.code(),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Releases an acquired buffer back to the queue with an already-signalled release fence.
///
/// On success `buffer` is freed. On failure it stays valid and owned by the caller.
///
/// ### 中文
/// 以已触发的 release fence 将 acquire 的缓冲区释放回队列。
///
/// 成功时 `buffer` 被释放；失败时它仍有效并归调用方所有。
pub unsafe extern "C" fn surface_queue_consumer_release_buffer(
    consumer: *mut SurfaceQueueConsumer,
    buffer: *mut SurfaceQueueAcquiredBuffer,
) -> i32 {
    if consumer.is_null() || buffer.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    let slot = unsafe { &mut (*buffer).token };
    let Some(token) = slot.take() else {
        return SurfaceError::InvalidOperating.code();
    };

    match unsafe { (*consumer).consumer.release_buffer(token, Fence::invalid()) } {
        Ok(()) => {
            drop(unsafe { Box::from_raw(buffer) });
            SURFACE_QUEUE_OK
        }
        Err(rejected) => {
            let (error, token) = rejected.into_parts();
            *slot = Some(token);
            error.code()
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Fills `out_info` with the layout, mapping, timestamp and damage of an acquired buffer.
///
/// ### 中文
/// 将 acquire 的缓冲区布局、映射地址、时间戳与 damage 写入 `out_info`。
pub unsafe extern "C" fn surface_queue_acquired_buffer_info(
    buffer: *const SurfaceQueueAcquiredBuffer,
    out_info: *mut SurfaceQueueBufferInfo,
) -> i32 {
    if buffer.is_null() || out_info.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    let Some(token) = (unsafe { &(*buffer).token }) else {
        return SurfaceError::InvalidOperating.code();
    };
    match SurfaceQueueBufferInfo::collect(token.buffer(), token.timestamp(), token.damage()) {
        Ok(info) => {
            unsafe { *out_info = info };
            SURFACE_QUEUE_OK
        }
        Err(error) => error.code(),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Waits up to `timeout_ms` for the producer's acquire fence. Returns `1` once signalled.
///
/// ### 中文
/// 最多等待 `timeout_ms` 毫秒直到生产者的 acquire fence 触发。触发后返回 `1`。
pub unsafe extern "C" fn surface_queue_acquired_buffer_wait(
    buffer: *const SurfaceQueueAcquiredBuffer,
    timeout_ms: u32,
) -> u8 {
    if buffer.is_null() {
        return 0;
    }

    let Some(token) = (unsafe { &(*buffer).token }) else {
        return 0;
    };
    let timeout = Duration::from_millis(u64::from(timeout_ms));
    (token.acquire_fence().wait(timeout) == FenceStatus::Signaled) as u8
}
