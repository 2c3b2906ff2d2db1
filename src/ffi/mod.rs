//! ### English
//! C ABI surface for `surface_queue`.
//!
//! All exported symbols are `extern "C"` functions; structs are `#[repr(C)]`. Fallible calls
//! return `SURFACE_QUEUE_OK` (0) or the numeric code of the `SurfaceError`. Buffer tokens are
//! handed out as boxed opaque pointers and are consumed by the call that returns them to the
//! queue; a failed flush/cancel/release leaves the pointer valid so the call can be retried.
//!
//! ### 中文
//! `surface_queue` 的 C ABI 接口层。
//!
//! 所有导出符号均为 `extern "C"` 函数；结构体使用 `#[repr(C)]`。可失败的调用返回
//! `SURFACE_QUEUE_OK`（0）或 `SurfaceError` 的数值码。缓冲区令牌以装箱的不透明指针交出，
//! 并由将其归还队列的调用消耗；flush/cancel/release 失败时指针仍然有效，可重试。
mod abi;
mod consumer;
mod window;

use std::ffi::{CStr, c_char};
use std::ptr::NonNull;
use std::time::Duration;

use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::flags::BufferUsage;
use crate::surface::role::{AcquiredBuffer, ConsumerSurface, DequeuedBuffer};
use crate::surface::types::{ColorGamut, PixelFormat, Rect, ScalingMode, TransformType};
use crate::surface::window::{NativeWindow, WindowConfig};

/// ### English
/// C ABI version for `surface_queue`.
///
/// ### 中文
/// `surface_queue` 的 C ABI 版本号。
const SURFACE_QUEUE_ABI_VERSION: u32 = 1;

pub const SURFACE_QUEUE_OK: i32 = 0;

/// ### English
/// Opaque consumer handle; owns the queue.
///
/// ### 中文
/// 不透明消费者句柄；持有队列。
pub struct SurfaceQueueConsumer {
    consumer: ConsumerSurface,
}

/// ### English
/// Opaque producer-side window.
///
/// ### 中文
/// 不透明的生产者侧窗口。
pub struct SurfaceQueueWindow {
    window: NativeWindow,
}

/// ### English
/// Opaque dequeued buffer. `None` only transiently while a call holds the token.
///
/// ### 中文
/// 不透明的已出队缓冲区。仅在调用持有令牌期间短暂为 `None`。
pub struct SurfaceQueueWindowBuffer {
    token: Option<DequeuedBuffer>,
}

pub struct SurfaceQueueAcquiredBuffer {
    token: Option<AcquiredBuffer>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceQueueRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl From<SurfaceQueueRect> for Rect {
    fn from(value: SurfaceQueueRect) -> Self {
        Rect::new(value.x, value.y, value.w, value.h)
    }
}

impl From<Rect> for SurfaceQueueRect {
    fn from(value: Rect) -> Self {
        Self {
            x: value.x,
            y: value.y,
            w: value.w,
            h: value.h,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// ### English
/// Window options as seen from C. Enum fields carry the raw values of `PixelFormat`,
/// `ColorGamut`, `TransformType` and `ScalingMode`.
///
/// ### 中文
/// C 侧看到的窗口选项。枚举字段为 `PixelFormat`、`ColorGamut`、`TransformType` 与
/// `ScalingMode` 的原始值。
pub struct SurfaceQueueWindowConfig {
    pub width: i32,
    pub height: i32,
    pub stride_alignment: i32,
    pub format: i32,
    pub usage: u64,
    pub timeout_ms: u32,
    pub color_gamut: i32,
    pub transform: i32,
    pub scaling_mode: i32,
}

impl From<WindowConfig> for SurfaceQueueWindowConfig {
    fn from(value: WindowConfig) -> Self {
        Self {
            width: value.width,
            height: value.height,
            stride_alignment: value.stride_alignment,
            format: value.format.into(),
            usage: value.usage.bits(),
            timeout_ms: value.timeout.as_millis().min(u32::MAX as u128) as u32,
            color_gamut: value.color_gamut.into(),
            transform: value.transform.into(),
            scaling_mode: value.scaling_mode.into(),
        }
    }
}

impl TryFrom<SurfaceQueueWindowConfig> for WindowConfig {
    type Error = SurfaceError;

    fn try_from(value: SurfaceQueueWindowConfig) -> SurfaceResult<Self> {
        Ok(Self {
            width: value.width,
            height: value.height,
            stride_alignment: value.stride_alignment,
            format: PixelFormat::try_from(value.format)?,
            usage: BufferUsage::from_bits(value.usage).ok_or(SurfaceError::InvalidParam)?,
            timeout: Duration::from_millis(u64::from(value.timeout_ms)),
            color_gamut: ColorGamut::try_from(value.color_gamut)?,
            transform: TransformType::try_from(value.transform)?,
            scaling_mode: ScalingMode::try_from(value.scaling_mode)?,
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
/// ### English
/// Snapshot of a buffer handed to C.
///
/// `vir_addr` stays valid until the buffer is flushed, cancelled or released.
///
/// ### 中文
/// 交给 C 的缓冲区快照。
///
/// `vir_addr` 在缓冲区被 flush、cancel 或 release 之前有效。
pub struct SurfaceQueueBufferInfo {
    pub sequence: u32,
    pub fd: i32,
    pub width: i32,
    pub height: i32,
    /// ### English
    /// Row stride in bytes.
    ///
    /// ### 中文
    /// 行跨度（字节）。
    pub stride: i32,
    pub format: i32,
    pub size: u64,
    pub vir_addr: *mut u8,
    pub timestamp: i64,
    pub damage: SurfaceQueueRect,
}

impl SurfaceQueueBufferInfo {
    fn collect(
        buffer: &crate::surface::buffer::SurfaceBuffer,
        timestamp: i64,
        damage: Rect,
    ) -> SurfaceResult<Self> {
        let desc = buffer.desc().ok_or(SurfaceError::InvalidOperating)?;
        let vir_addr = buffer
            .vir_addr()
            .map(NonNull::as_ptr)
            .unwrap_or(std::ptr::null_mut());
        Ok(Self {
            sequence: buffer.sequence(),
            fd: desc.fd,
            width: desc.width,
            height: desc.height,
            stride: desc.stride,
            format: desc.format.into(),
            size: desc.size as u64,
            vir_addr,
            timestamp,
            damage: damage.into(),
        })
    }
}

fn status(result: SurfaceResult<()>) -> i32 {
    match result {
        Ok(()) => SURFACE_QUEUE_OK,
        Err(error) => error.code(),
    }
}

/// ### English
/// Converts an optional NUL-terminated UTF-8 C string into a queue name.
///
/// Returns `None` for NULL pointers, invalid UTF-8, or empty strings.
///
/// # Safety
/// `ptr` must be valid and point to a NUL-terminated string for the duration of the call.
///
/// ### 中文
/// 将可选的 NUL 结尾 UTF-8 C 字符串转换为队列名称。
///
/// 对 NULL 指针、UTF-8 非法或空字符串返回 `None`。
///
/// # Safety
/// `ptr` 在本次调用期间必须有效，并指向以 NUL 结尾的字符串。
unsafe fn cstr_to_name(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    let value = unsafe { CStr::from_ptr(ptr) }.to_str().ok()?;
    if value.is_empty() {
        return None;
    }

    Some(value.to_owned())
}
