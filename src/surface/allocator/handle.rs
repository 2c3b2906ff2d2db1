use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

use crate::surface::flags::NativeUsage;
use crate::surface::types::PixelFormat;

/// ### English
/// Plain description of an allocated native buffer; this is what crosses process boundaries.
///
/// ### 中文
/// 已分配原生缓冲区的纯数据描述；跨进程传递的正是它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleDesc {
    pub fd: i32,
    pub width: i32,
    pub height: i32,
    /// ### English
    /// Row stride in bytes.
    ///
    /// ### 中文
    /// 行跨度（字节）。
    pub stride: i32,
    pub size: usize,
    pub format: PixelFormat,
    pub usage: NativeUsage,
    pub phy_addr: u64,
}

/// ### English
/// CPU mapping of a handle. Only dereferenced under the owning buffer's lock.
///
/// ### 中文
/// 句柄的 CPU 映射。仅在所属缓冲区的锁内解引用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MappedAddr(NonNull<u8>);

unsafe impl Send for MappedAddr {}
unsafe impl Sync for MappedAddr {}

/// ### English
/// Exclusively owned native buffer handle. Not `Clone`: releasing it consumes it.
///
/// ### 中文
/// 独占的原生缓冲区句柄。不可 `Clone`：释放时会被消耗。
#[derive(Debug)]
pub struct BufferHandle {
    desc: HandleDesc,
    vir_addr: Option<MappedAddr>,
}

impl BufferHandle {
    pub fn new(desc: HandleDesc) -> Self {
        Self {
            desc,
            vir_addr: None,
        }
    }

    pub fn desc(&self) -> &HandleDesc {
        &self.desc
    }

    pub fn vir_addr(&self) -> Option<NonNull<u8>> {
        self.vir_addr.map(|addr| addr.0)
    }

    pub fn is_mapped(&self) -> bool {
        self.vir_addr.is_some()
    }

    pub(crate) fn set_vir_addr(&mut self, addr: Option<NonNull<u8>>) {
        self.vir_addr = addr.map(MappedAddr);
    }
}
