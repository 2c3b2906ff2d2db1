//! ### English
//! Buffer usage bitmasks.
//!
//! `BufferUsage` is the abstract mask callers put in request configs; `NativeUsage` is the mask
//! understood by the allocator backend. Both cross the C ABI as `u64`.
//!
//! ### 中文
//! 缓冲区用途位掩码。
//!
//! `BufferUsage` 是调用方写入请求配置的抽象掩码；`NativeUsage` 是分配器后端理解的掩码。
//! 二者均以 `u64` 形式穿过 C ABI。

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// ### English
    /// Abstract usage of a buffer, as requested by producers.
    ///
    /// ### 中文
    /// 生产者请求的缓冲区抽象用途。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BufferUsage: u64 {
        const CPU_READ = 1 << 0;
        const CPU_WRITE = 1 << 1;
        const MEM_DMA = 1 << 2;
        const MEM_FB = 1 << 3;
        const GPU_RENDER_TARGET = 1 << 8;
        const GPU_TEXTURE = 1 << 9;
        const COMPOSER_OVERLAY = 1 << 10;
        const VIDEO_DECODE = 1 << 16;
        const VIDEO_ENCODE = 1 << 17;
        const CAMERA_READ = 1 << 18;
        const CAMERA_WRITE = 1 << 19;
        const PROTECTED = 1 << 24;
    }
}

bitflags! {
    /// ### English
    /// Usage bits in the allocator backend's native layout.
    ///
    /// ### 中文
    /// 分配器后端原生布局下的用途位。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NativeUsage: u64 {
        const CPU_READ = 1 << 0;
        const CPU_WRITE = 1 << 1;
        const MEM_MMZ = 1 << 2;
        const MEM_DMA = 1 << 3;
        const MEM_SHARE = 1 << 4;
        const MEM_MMZ_CACHE = 1 << 5;
        const MEM_FB = 1 << 6;
        const HW_RENDER = 1 << 8;
        const HW_TEXTURE = 1 << 9;
        const HW_COMPOSER = 1 << 10;
        const PROTECTED = 1 << 11;
        const CAMERA_READ = 1 << 12;
        const CAMERA_WRITE = 1 << 13;
        const VIDEO_ENCODER = 1 << 14;
        const VIDEO_DECODER = 1 << 15;
    }
}

/// ### English
/// Projection table: each abstract bit contributes these native bits.
///
/// ### 中文
/// 投影表：每个抽象位贡献的原生位。
const USAGE_PROJECTION: [(BufferUsage, NativeUsage); 12] = [
    (
        BufferUsage::CPU_READ,
        NativeUsage::CPU_READ.union(NativeUsage::MEM_MMZ_CACHE),
    ),
    (
        BufferUsage::CPU_WRITE,
        NativeUsage::CPU_WRITE.union(NativeUsage::MEM_MMZ_CACHE),
    ),
    (BufferUsage::MEM_DMA, NativeUsage::MEM_DMA),
    (BufferUsage::MEM_FB, NativeUsage::MEM_FB),
    (
        BufferUsage::GPU_RENDER_TARGET,
        NativeUsage::HW_RENDER.union(NativeUsage::MEM_DMA),
    ),
    (
        BufferUsage::GPU_TEXTURE,
        NativeUsage::HW_TEXTURE.union(NativeUsage::MEM_DMA),
    ),
    (
        BufferUsage::COMPOSER_OVERLAY,
        NativeUsage::HW_COMPOSER.union(NativeUsage::MEM_DMA),
    ),
    (
        BufferUsage::VIDEO_DECODE,
        NativeUsage::VIDEO_DECODER.union(NativeUsage::MEM_DMA),
    ),
    (
        BufferUsage::VIDEO_ENCODE,
        NativeUsage::VIDEO_ENCODER.union(NativeUsage::MEM_DMA),
    ),
    (BufferUsage::CAMERA_READ, NativeUsage::CAMERA_READ),
    (BufferUsage::CAMERA_WRITE, NativeUsage::CAMERA_WRITE),
    (
        BufferUsage::PROTECTED,
        NativeUsage::PROTECTED.union(NativeUsage::MEM_SHARE),
    ),
];

impl BufferUsage {
    /// ### English
    /// Projects the abstract mask onto the allocator's native bits (bitwise OR of table rows).
    ///
    /// ### 中文
    /// 将抽象掩码投影为分配器原生位（按表逐行按位或）。
    pub fn to_native(self) -> NativeUsage {
        USAGE_PROJECTION
            .iter()
            .filter(|(abstract_bit, _)| self.contains(*abstract_bit))
            .fold(NativeUsage::empty(), |acc, (_, native)| acc | *native)
    }

    /// ### English
    /// Whether buffers with this usage are CPU-visible and get mapped on allocation.
    ///
    /// ### 中文
    /// 此用途的缓冲区是否对 CPU 可见（分配时会映射）。
    pub fn is_cpu_accessible(self) -> bool {
        self.intersects(BufferUsage::CPU_READ | BufferUsage::CPU_WRITE)
    }
}
