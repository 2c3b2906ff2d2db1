//! ### English
//! `NativeWindow`: a producer wrapper holding the request parameters a renderer reuses every
//! frame.
//!
//! Each option has one typed setter and getter; `request_buffer` turns the current config into
//! a `BufferRequestConfig`, and `flush_buffer` turns a damage region into a flush config.
//!
//! ### 中文
//! `NativeWindow`：包装生产者，保存渲染器每帧复用的请求参数。
//!
//! 每个选项都有一个类型化的 setter 与 getter；`request_buffer` 将当前配置转为
//! `BufferRequestConfig`，`flush_buffer` 将 damage 区域转为 flush 配置。

use std::time::Duration;

use dpi::PhysicalSize;
use parking_lot::Mutex;

use super::error::{Rejected, SurfaceError, SurfaceResult};
use super::fence::SharedFence;
use super::flags::BufferUsage;
use super::role::{DequeuedBuffer, ProducerSurface, RequestedBuffer, Surface};
use super::types::{
    BufferFlushConfig, BufferRequestConfig, ColorGamut, PixelFormat, Rect,
    SURFACE_MAX_STRIDE_ALIGNMENT, SURFACE_MIN_STRIDE_ALIGNMENT, ScalingMode, TransformType,
};

pub const WINDOW_DEFAULT_STRIDE_ALIGNMENT: i32 = 8;
pub const WINDOW_DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// ### English
/// Request parameters carried by a `NativeWindow`.
///
/// ### 中文
/// `NativeWindow` 携带的请求参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
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

impl WindowConfig {
    /// ### English
    /// Defaults for a window whose surface advertises `size`.
    ///
    /// ### 中文
    /// surface 声明尺寸为 `size` 时的窗口默认配置。
    pub fn with_size(size: PhysicalSize<i32>) -> Self {
        Self {
            width: size.width,
            height: size.height,
            stride_alignment: WINDOW_DEFAULT_STRIDE_ALIGNMENT,
            format: PixelFormat::Rgba8888,
            usage: BufferUsage::CPU_READ | BufferUsage::MEM_DMA,
            timeout: WINDOW_DEFAULT_TIMEOUT,
            color_gamut: ColorGamut::Srgb,
            transform: TransformType::RotateNone,
            scaling_mode: ScalingMode::ScaleToWindow,
        }
    }

    pub fn request_config(&self) -> BufferRequestConfig {
        BufferRequestConfig {
            width: self.width,
            height: self.height,
            stride_alignment: self.stride_alignment,
            format: self.format,
            usage: self.usage,
            timeout: self.timeout,
            color_gamut: self.color_gamut,
            transform: self.transform,
            scaling_mode: self.scaling_mode,
        }
    }
}

#[derive(Debug)]
pub struct NativeWindow {
    surface: ProducerSurface,
    config: Mutex<WindowConfig>,
}

impl NativeWindow {
    pub fn new(surface: ProducerSurface) -> Self {
        let config = WindowConfig::with_size(surface.default_size());
        Self {
            surface,
            config: Mutex::new(config),
        }
    }

    pub fn surface(&self) -> &ProducerSurface {
        &self.surface
    }

    pub fn config(&self) -> WindowConfig {
        *self.config.lock()
    }

    pub fn set_config(&self, config: WindowConfig) {
        *self.config.lock() = config;
    }

    pub fn set_buffer_geometry(&self, width: i32, height: i32) {
        let mut config = self.config.lock();
        config.width = width;
        config.height = height;
    }

    pub fn buffer_geometry(&self) -> PhysicalSize<i32> {
        let config = self.config.lock();
        PhysicalSize::new(config.width, config.height)
    }

    pub fn set_format(&self, format: PixelFormat) {
        self.config.lock().format = format;
    }

    pub fn format(&self) -> PixelFormat {
        self.config.lock().format
    }

    pub fn set_usage(&self, usage: BufferUsage) {
        self.config.lock().usage = usage;
    }

    pub fn usage(&self) -> BufferUsage {
        self.config.lock().usage
    }

    /// ### English
    /// Sets the stride alignment; must be a power of two in `[4, 32]`.
    ///
    /// ### 中文
    /// 设置跨度对齐；必须是 `[4, 32]` 内的 2 的幂。
    pub fn set_stride(&self, stride_alignment: i32) -> SurfaceResult<()> {
        if !(SURFACE_MIN_STRIDE_ALIGNMENT..=SURFACE_MAX_STRIDE_ALIGNMENT).contains(&stride_alignment)
            || (stride_alignment & (stride_alignment - 1)) != 0
        {
            return Err(SurfaceError::InvalidParam);
        }
        self.config.lock().stride_alignment = stride_alignment;
        Ok(())
    }

    pub fn stride(&self) -> i32 {
        self.config.lock().stride_alignment
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.config.lock().timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.config.lock().timeout
    }

    pub fn set_color_gamut(&self, gamut: ColorGamut) {
        self.config.lock().color_gamut = gamut;
    }

    pub fn color_gamut(&self) -> ColorGamut {
        self.config.lock().color_gamut
    }

    pub fn set_transform(&self, transform: TransformType) {
        self.config.lock().transform = transform;
    }

    pub fn transform(&self) -> TransformType {
        self.config.lock().transform
    }

    pub fn set_scaling_mode(&self, mode: ScalingMode) {
        self.config.lock().scaling_mode = mode;
    }

    pub fn scaling_mode(&self) -> ScalingMode {
        self.config.lock().scaling_mode
    }

    pub fn request_buffer(&self) -> SurfaceResult<RequestedBuffer> {
        let config = self.config().request_config();
        self.surface.request_buffer(&config)
    }

    /// ### English
    /// Flushes with a damage region. An empty region damages the whole buffer; several rects
    /// are merged into their bounding union.
    ///
    /// #### Parameters
    /// - `buffer`: Token from `request_buffer`.
    /// - `fence`: Signals when rendering into the buffer is complete.
    /// - `region`: Damaged rects in buffer coordinates.
    ///
    /// ### 中文
    /// 带 damage 区域 flush。空区域表示整个缓冲区受损；多个矩形合并为包围并集。
    ///
    /// #### 参数
    /// - `buffer`：`request_buffer` 返回的令牌。
    /// - `fence`：渲染写入完成时触发。
    /// - `region`：缓冲区坐标下的受损矩形。
    pub fn flush_buffer(
        &self,
        buffer: DequeuedBuffer,
        fence: SharedFence,
        region: &[Rect],
    ) -> Result<(), Rejected<DequeuedBuffer>> {
        let damage = if region.is_empty() {
            let geometry = self.buffer_geometry();
            Rect::new(
                0,
                0,
                buffer.buffer().width().unwrap_or(geometry.width),
                buffer.buffer().height().unwrap_or(geometry.height),
            )
        } else {
            region
                .iter()
                .fold(Rect::default(), |acc, rect| acc.join(rect))
        };
        let config = BufferFlushConfig {
            damage,
            timestamp: 0,
        };
        self.surface.flush_buffer(buffer, fence, &config)
    }

    pub fn cancel_buffer(&self, buffer: DequeuedBuffer) -> Result<(), Rejected<DequeuedBuffer>> {
        self.surface.cancel_buffer(buffer)
    }
}
