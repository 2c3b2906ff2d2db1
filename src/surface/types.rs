//! ### English
//! Plain value types shared by the queue, buffers and the C ABI: limits, pixel formats,
//! color metadata, rectangles and the request/flush configs.
//!
//! ### 中文
//! 队列、缓冲区与 C ABI 共享的值类型：限制常量、像素格式、颜色元数据、矩形以及请求/提交配置。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{SurfaceError, SurfaceResult};
use super::flags::BufferUsage;

pub const SURFACE_MAX_QUEUE_SIZE: u32 = 32;
pub const SURFACE_DEFAULT_QUEUE_SIZE: u32 = 3;
pub const SURFACE_MAX_WIDTH: i32 = 7680;
pub const SURFACE_MAX_HEIGHT: i32 = 7680;
pub const SURFACE_MIN_STRIDE_ALIGNMENT: i32 = 4;
pub const SURFACE_MAX_STRIDE_ALIGNMENT: i32 = 32;
/// ### English
/// Upper bound for both the queue user-data map and a buffer's extra-data map.
///
/// ### 中文
/// 队列 user data 与缓冲区 extra data 的条目上限。
pub const SURFACE_MAX_USER_DATA_COUNT: usize = 1000;

macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(i32)]
        pub enum $name { $($variant = $value),+ }

        impl TryFrom<i32> for $name {
            type Error = SurfaceError;

            fn try_from(raw: i32) -> SurfaceResult<Self> {
                match raw {
                    $(v if v == $value => Ok($name::$variant),)+
                    _ => Err(SurfaceError::InvalidParam),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value as i32
            }
        }
    };
}

raw_enum! {
    /// ### English
    /// Pixel layout of a buffer. Unknown raw values are rejected with `InvalidParam`.
    ///
    /// ### 中文
    /// 缓冲区像素布局。未知原始值以 `InvalidParam` 拒绝。
    pub enum PixelFormat {
        Rgb565 = 3,
        Rgbx8888 = 11,
        Rgba8888 = 12,
        Rgb888 = 13,
        Bgrx8888 = 19,
        Bgra8888 = 20,
        Ycbcr420Sp = 24,
        Ycrcb420Sp = 25,
    }
}

impl PixelFormat {
    /// ### English
    /// Bytes per pixel of the first plane.
    ///
    /// ### 中文
    /// 第一平面每像素字节数。
    pub const fn plane_bytes_per_pixel(self) -> i32 {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgbx8888
            | PixelFormat::Rgba8888
            | PixelFormat::Bgrx8888
            | PixelFormat::Bgra8888 => 4,
            PixelFormat::Ycbcr420Sp | PixelFormat::Ycrcb420Sp => 1,
        }
    }

    /// ### English
    /// Total byte size for a buffer with the given row stride (bytes) and height.
    ///
    /// ### 中文
    /// 给定行跨度（字节）与高度时缓冲区的总字节数。
    pub fn buffer_size(self, stride: i32, height: i32) -> usize {
        let plane = stride as usize * height as usize;
        match self {
            PixelFormat::Ycbcr420Sp | PixelFormat::Ycrcb420Sp => plane + plane / 2,
            _ => plane,
        }
    }
}

raw_enum! {
    pub enum ColorGamut {
        Invalid = -1,
        Native = 0,
        StandardBt601 = 1,
        StandardBt709 = 2,
        DciP3 = 3,
        Srgb = 4,
        AdobeRgb = 5,
        DisplayP3 = 6,
        Bt2020 = 7,
        Bt2100Pq = 8,
        Bt2100Hlg = 9,
        DisplayBt2020 = 10,
    }
}

raw_enum! {
    /// ### English
    /// Rotation/flip the consumer applies when presenting the buffer.
    ///
    /// ### 中文
    /// 消费者呈现缓冲区时应用的旋转/翻转。
    pub enum TransformType {
        RotateNone = 0,
        Rotate90 = 1,
        Rotate180 = 2,
        Rotate270 = 3,
        FlipH = 4,
        FlipV = 5,
        FlipHRot90 = 6,
        FlipVRot90 = 7,
        FlipHRot180 = 8,
        FlipVRot180 = 9,
        FlipHRot270 = 10,
        FlipVRot270 = 11,
    }
}

raw_enum! {
    pub enum ScalingMode {
        Freeze = 0,
        ScaleToWindow = 1,
        ScaleCrop = 2,
        NoScaleCrop = 3,
    }
}

/// ### English
/// Integer rectangle `{x, y, w, h}` used for damage and dirty regions.
///
/// ### 中文
/// 用于 damage 与脏区的整数矩形 `{x, y, w, h}`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// ### English
    /// Exclusive right edge, saturating at `i32::MAX`.
    ///
    /// ### 中文
    /// 右边界（不含），在 `i32::MAX` 处饱和。
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    pub const fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// ### English
    /// Bounding union. Empty rects are ignored.
    ///
    /// ### 中文
    /// 包围并集。空矩形被忽略。
    pub fn join(&self, other: &Rect) -> Rect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }

    /// ### English
    /// Intersection; an empty default rect when the two do not overlap.
    ///
    /// ### 中文
    /// 交集；不相交时返回空的默认矩形。
    pub fn intersect(&self, other: &Rect) -> Rect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Rect::default();
        }
        Rect::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }

    pub const fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.w,
            self.h,
        )
    }

    /// ### English
    /// Whether `other` lies completely inside `self`. An empty `other` is always contained.
    ///
    /// ### 中文
    /// `other` 是否完全位于 `self` 内。空的 `other` 总是被包含。
    pub fn contains(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.right() <= self.right()
                && other.bottom() <= self.bottom())
    }
}

/// ### English
/// Parameters of a `request_buffer` call.
///
/// `timeout` is carried for callers that wait on the returned release fence; the queue itself
/// never blocks.
///
/// ### 中文
/// `request_buffer` 调用参数。
///
/// `timeout` 供等待返回的 release fence 的调用方使用；队列本身从不阻塞。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRequestConfig {
    pub width: i32,
    pub height: i32,
    pub stride_alignment: i32,
    pub format: PixelFormat,
    pub usage: BufferUsage,
    pub timeout: Duration,
    pub color_gamut: ColorGamut,
    pub transform: TransformType,
    pub scaling_mode: ScalingMode,
}

impl Default for BufferRequestConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            stride_alignment: 8,
            format: PixelFormat::Rgba8888,
            usage: BufferUsage::CPU_READ | BufferUsage::MEM_DMA,
            timeout: Duration::from_millis(3000),
            color_gamut: ColorGamut::Srgb,
            transform: TransformType::RotateNone,
            scaling_mode: ScalingMode::ScaleToWindow,
        }
    }
}

impl BufferRequestConfig {
    /// ### English
    /// Checks geometry and stride alignment against the allocator limits.
    ///
    /// ### 中文
    /// 按分配器限制校验尺寸与跨度对齐。
    pub fn validate(&self) -> SurfaceResult<()> {
        if self.width <= 0 || self.width > SURFACE_MAX_WIDTH {
            return Err(SurfaceError::InvalidParam);
        }
        if self.height <= 0 || self.height > SURFACE_MAX_HEIGHT {
            return Err(SurfaceError::InvalidParam);
        }
        let align = self.stride_alignment;
        if !(SURFACE_MIN_STRIDE_ALIGNMENT..=SURFACE_MAX_STRIDE_ALIGNMENT).contains(&align)
            || (align & (align - 1)) != 0
        {
            return Err(SurfaceError::InvalidParam);
        }
        Ok(())
    }

    /// ### English
    /// Whether a buffer allocated for `self` can serve `other` without reallocation.
    ///
    /// ### 中文
    /// 为 `self` 分配的缓冲区能否不重新分配即满足 `other`。
    pub fn is_compatible(&self, other: &BufferRequestConfig) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.stride_alignment == other.stride_alignment
            && self.format == other.format
            && self.usage == other.usage
    }
}

/// ### English
/// Parameters of a `flush_buffer` call. A zero `timestamp` means "now".
///
/// ### 中文
/// `flush_buffer` 调用参数。`timestamp` 为 0 表示“当前时间”。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BufferFlushConfig {
    pub damage: Rect,
    pub timestamp: i64,
}

impl BufferFlushConfig {
    /// ### English
    /// Damage must be non-negative and its far edges must fit in `i32`.
    ///
    /// ### 中文
    /// damage 必须非负，且其右/下边界必须能以 `i32` 表示。
    pub fn validate(&self) -> SurfaceResult<()> {
        let d = &self.damage;
        if d.x < 0 || d.y < 0 || d.w < 0 || d.h < 0 {
            return Err(SurfaceError::InvalidParam);
        }
        if d.x.checked_add(d.w).is_none() || d.y.checked_add(d.h).is_none() {
            return Err(SurfaceError::InvalidParam);
        }
        Ok(())
    }
}
