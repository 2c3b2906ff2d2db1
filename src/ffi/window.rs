use std::time::Duration;

use super::{
    SURFACE_QUEUE_OK, SurfaceQueueBufferInfo, SurfaceQueueConsumer, SurfaceQueueRect,
    SurfaceQueueWindow, SurfaceQueueWindowBuffer, SurfaceQueueWindowConfig, status,
};
use crate::surface::error::SurfaceError;
use crate::surface::fence::{Fence, FenceStatus};
use crate::surface::types::Rect;
use crate::surface::window::{NativeWindow, WindowConfig};

#[unsafe(no_mangle)]
/// ### English
/// Creates a producer window on the consumer's queue. Returns NULL if `consumer` is NULL.
///
/// ### 中文
/// 在消费者的队列上创建生产者窗口。`consumer` 为 NULL 时返回 NULL。
pub unsafe extern "C" fn surface_queue_window_create(
    consumer: *mut SurfaceQueueConsumer,
) -> *mut SurfaceQueueWindow {
    if consumer.is_null() {
        return std::ptr::null_mut();
    }

    let producer = unsafe { (*consumer).consumer.producer() };
    let window = NativeWindow::new(producer);
    Box::into_raw(Box::new(SurfaceQueueWindow { window }))
}

#[unsafe(no_mangle)]
/// ### English
/// Destroys a window created by `surface_queue_window_create`.
///
/// ### 中文
/// 销毁由 `surface_queue_window_create` 创建的窗口。
pub unsafe extern "C" fn surface_queue_window_destroy(window: *mut SurfaceQueueWindow) {
    if window.is_null() {
        return;
    }

    drop(unsafe { Box::from_raw(window) });
}

#[unsafe(no_mangle)]
/// ### English
/// Writes the window's current options into `out_config`.
///
/// # Safety
/// `window` must come from `surface_queue_window_create`; `out_config` must be writable.
///
/// ### 中文
/// 将窗口当前选项写入 `out_config`。
///
/// # Safety
/// `window` 必须来自 `surface_queue_window_create`；`out_config` 必须可写。
pub unsafe extern "C" fn surface_queue_window_get_config(
    window: *const SurfaceQueueWindow,
    out_config: *mut SurfaceQueueWindowConfig,
) -> i32 {
    if window.is_null() || out_config.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    unsafe { *out_config = (*window).window.config().into() };
    SURFACE_QUEUE_OK
}

#[unsafe(no_mangle)]
/// ### English
/// Replaces the window options. Unknown enum values or usage bits leave the window untouched
/// and return the `InvalidParam` code.
///
/// ### 中文
/// 替换窗口选项。未知的枚举值或 usage 位不会修改窗口，并返回 `InvalidParam` 码。
pub unsafe extern "C" fn surface_queue_window_set_config(
    window: *const SurfaceQueueWindow,
    config: *const SurfaceQueueWindowConfig,
) -> i32 {
    if window.is_null() || config.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    let window = unsafe { &(*window).window };
    status(WindowConfig::try_from(unsafe { *config }).and_then(|config| {
        window.set_stride(config.stride_alignment)?;
        window.set_config(config);
        Ok(())
    }))
}

#[unsafe(no_mangle)]
/// ### English
/// Requests a buffer using the window options.
///
/// The call blocks on the buffer's release fence for at most the window timeout. If the fence
/// does not signal in time the buffer is cancelled and the `NoBuffer` code is returned.
/// On success `*out_buffer` must later go to `surface_queue_window_flush_buffer` or
/// `surface_queue_window_cancel_buffer`.
///
/// ### 中文
/// 按窗口选项请求缓冲区。
///
/// 调用会在缓冲区的 release fence 上最多阻塞窗口超时时长；若 fence 未能及时触发，
/// 缓冲区会被取消并返回 `NoBuffer` 码。成功时 `*out_buffer` 之后必须交给
/// `surface_queue_window_flush_buffer` 或 `surface_queue_window_cancel_buffer`。
pub unsafe extern "C" fn surface_queue_window_request_buffer(
    window: *const SurfaceQueueWindow,
    out_buffer: *mut *mut SurfaceQueueWindowBuffer,
) -> i32 {
    if window.is_null() || out_buffer.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    unsafe { *out_buffer = std::ptr::null_mut() };
    let window = unsafe { &(*window).window };
    let requested = match window.request_buffer() {
        Ok(requested) => requested,
        Err(error) => return error.code(),
    };

    if requested.release_fence.wait(window.timeout()) != FenceStatus::Signaled {
        tracing::debug!(
            sequence = requested.buffer.sequence(),
            "release fence timed out, cancelling"
        );
        if let Err(rejected) = window.cancel_buffer(requested.buffer) {
            tracing::warn!(error = %rejected.error(), "cancel after fence timeout failed");
        }
        return SurfaceError::NoBuffer.code();
    }

    let handle = Box::new(SurfaceQueueWindowBuffer {
        token: Some(requested.buffer),
    });
    unsafe { *out_buffer = Box::into_raw(handle) };
    SURFACE_QUEUE_OK
}

#[unsafe(no_mangle)]
/// ### English
/// Flushes a requested buffer with `rect_count` damage rects (`rects` may be NULL when the
/// count is zero, meaning the whole buffer). The acquire fence is already signalled.
///
/// On success `buffer` is freed. On failure it stays valid and owned by the caller.
///
/// #### Parameters
/// - `rects`: Array of damage rects in buffer coordinates.
/// - `rect_count`: Number of entries in `rects`.
///
/// ### 中文
/// 以 `rect_count` 个 damage 矩形提交已请求的缓冲区（数量为 0 时 `rects` 可为 NULL，
/// 表示整个缓冲区）。acquire fence 已处于触发状态。
///
/// 成功时 `buffer` 被释放；失败时它仍有效并归调用方所有。
///
/// #### 参数
/// - `rects`：缓冲区坐标下的 damage 矩形数组。
/// - `rect_count`：`rects` 中的元素数量。
pub unsafe extern "C" fn surface_queue_window_flush_buffer(
    window: *const SurfaceQueueWindow,
    buffer: *mut SurfaceQueueWindowBuffer,
    rects: *const SurfaceQueueRect,
    rect_count: usize,
) -> i32 {
    if window.is_null() || buffer.is_null() || (rects.is_null() && rect_count != 0) {
        return SurfaceError::InvalidArguments.code();
    }

    let region: Vec<Rect> = if rect_count == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(rects, rect_count) }
            .iter()
            .copied()
            .map(Rect::from)
            .collect()
    };

    let slot = unsafe { &mut (*buffer).token };
    let Some(token) = slot.take() else {
        return SurfaceError::InvalidOperating.code();
    };

    match unsafe { (*window).window.flush_buffer(token, Fence::invalid(), &region) } {
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
/// Returns a requested buffer to the queue unused. Frees `buffer` on success.
///
/// ### 中文
/// 将未使用的已请求缓冲区归还队列。成功时释放 `buffer`。
pub unsafe extern "C" fn surface_queue_window_cancel_buffer(
    window: *const SurfaceQueueWindow,
    buffer: *mut SurfaceQueueWindowBuffer,
) -> i32 {
    if window.is_null() || buffer.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    let slot = unsafe { &mut (*buffer).token };
    let Some(token) = slot.take() else {
        return SurfaceError::InvalidOperating.code();
    };

    match unsafe { (*window).window.cancel_buffer(token) } {
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
/// Describes a requested buffer. `vir_addr` maps the buffer on first use and stays valid until
/// the buffer is flushed or cancelled.
///
/// # Safety
/// `buffer` must come from `surface_queue_window_request_buffer` and not yet be consumed;
/// `out_info` must be writable.
///
/// ### 中文
/// 描述已请求的缓冲区。`vir_addr` 首次使用时映射，在缓冲区 flush 或 cancel 之前有效。
///
/// # Safety
/// `buffer` 必须来自 `surface_queue_window_request_buffer` 且尚未被消耗；`out_info` 必须可写。
pub unsafe extern "C" fn surface_queue_window_buffer_info(
    buffer: *const SurfaceQueueWindowBuffer,
    out_info: *mut SurfaceQueueBufferInfo,
) -> i32 {
    if buffer.is_null() || out_info.is_null() {
        return SurfaceError::InvalidArguments.code();
    }

    let Some(token) = (unsafe { &(*buffer).token }) else {
        return SurfaceError::InvalidOperating.code();
    };
    match SurfaceQueueBufferInfo::collect(token.buffer(), 0, Rect::default()) {
        Ok(info) => {
            unsafe { *out_info = info };
            SURFACE_QUEUE_OK
        }
        Err(error) => error.code(),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Sets the window's request timeout in milliseconds.
///
/// ### 中文
/// 设置窗口请求超时（毫秒）。
pub unsafe extern "C" fn surface_queue_window_set_timeout(
    window: *const SurfaceQueueWindow,
    timeout_ms: u32,
) {
    if window.is_null() {
        return;
    }

    unsafe { (*window).window.set_timeout(Duration::from_millis(u64::from(timeout_ms))) };
}
