//! ### English
//! Opaque wire form of a `SurfaceBuffer` for the IPC layer.
//!
//! The blob carries identity, handle description, color metadata and extra data. The receiving
//! side imports the handle through its own allocator client; the mapping is never transferred.
//!
//! ### 中文
//! 供 IPC 层使用的 `SurfaceBuffer` 不透明线格式。
//!
//! 数据块携带标识、句柄描述、颜色元数据与 extra data。接收方通过自己的分配器客户端导入句柄；
//! 映射地址不会被传递。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{BufferId, ExtraData, ExtraKey, ExtraValue, SurfaceBuffer};
use crate::surface::allocator::{AllocatorClient, BufferHandle, HandleDesc};
use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::types::{ColorGamut, TransformType};

#[derive(Serialize, Deserialize)]
struct BufferParcel {
    id: BufferId,
    handle: Option<HandleDesc>,
    color_gamut: ColorGamut,
    transform: TransformType,
    extra: Vec<(ExtraKey, ExtraValue)>,
}

impl SurfaceBuffer {
    pub fn write_to_parcel(&self) -> SurfaceResult<Vec<u8>> {
        let parcel = {
            let state = self.state.lock();
            BufferParcel {
                id: self.id,
                handle: state.handle.as_ref().map(|h| *h.desc()),
                color_gamut: state.color_gamut,
                transform: state.transform,
                extra: state.extra.to_entries(),
            }
        };
        serde_json::to_vec(&parcel).map_err(|error| {
            tracing::warn!(sequence = self.id.sequence, %error, "buffer parcel encode failed");
            SurfaceError::Internal
        })
    }

    /// ### English
    /// Rebuilds a buffer from a parcel, keeping the sender's identity and importing its handle.
    ///
    /// ### 中文
    /// 从 parcel 重建缓冲区，保留发送方标识并导入其句柄。
    pub fn read_from_parcel(
        bytes: &[u8],
        allocator: Arc<AllocatorClient>,
    ) -> SurfaceResult<SurfaceBuffer> {
        let parcel: BufferParcel = serde_json::from_slice(bytes).map_err(|error| {
            tracing::warn!(%error, "buffer parcel decode failed");
            SurfaceError::InvalidParam
        })?;
        let extra = ExtraData::from_entries(parcel.extra)?;

        let buffer = SurfaceBuffer::with_id(parcel.id, allocator);
        {
            let mut state = buffer.state.lock();
            state.color_gamut = parcel.color_gamut;
            state.transform = parcel.transform;
            state.extra = extra;
            if let Some(desc) = parcel.handle {
                let handle = BufferHandle::new(desc);
                buffer
                    .allocator
                    .backend()?
                    .import_handle(&handle)
                    .into_result()?;
                state.handle = Some(handle);
            }
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::allocator::HeapAllocator;
    use crate::surface::flags::BufferUsage;
    use crate::surface::types::BufferRequestConfig;

    #[test]
    fn parcel_round_trip_shares_memory() {
        let heap = Arc::new(HeapAllocator::new());
        let client = AllocatorClient::with_backend(heap.clone());
        let sender = SurfaceBuffer::new(client.clone());
        sender
            .alloc(&BufferRequestConfig {
                width: 4,
                height: 4,
                usage: BufferUsage::CPU_WRITE,
                color_gamut: ColorGamut::DisplayP3,
                ..Default::default()
            })
            .unwrap();
        sender.set_extra_data("frame", 17i64).unwrap();
        sender.set_extra_data(3u32, "hdr").unwrap();
        sender.with_mapped(|bytes| bytes[5] = 9).unwrap();

        let blob = sender.write_to_parcel().unwrap();
        let receiver = SurfaceBuffer::read_from_parcel(&blob, client).unwrap();

        assert_eq!(receiver.id(), sender.id());
        assert_eq!(receiver.desc(), sender.desc());
        assert_eq!(receiver.color_gamut(), ColorGamut::DisplayP3);
        assert_eq!(receiver.extra_i64("frame"), Ok(17));
        assert_eq!(receiver.extra_string(3u32).as_deref(), Ok("hdr"));
        assert!(!receiver.is_mapped());
        assert_eq!(receiver.with_mapped(|bytes| bytes[5]).unwrap(), 9);

        drop(sender);
        assert_eq!(heap.live_allocations(), 1);
        drop(receiver);
        assert_eq!(heap.live_allocations(), 0);
    }

    #[test]
    fn non_finite_doubles_survive_the_parcel() {
        let sender = SurfaceBuffer::new(AllocatorClient::heap());
        sender.set_extra_data("inf", f64::INFINITY).unwrap();
        sender.set_extra_data("neg-inf", f64::NEG_INFINITY).unwrap();
        sender.set_extra_data("nan", f64::NAN).unwrap();
        sender.set_extra_data("zero", -0.0f64).unwrap();

        let blob = sender.write_to_parcel().unwrap();
        let receiver = SurfaceBuffer::read_from_parcel(&blob, AllocatorClient::heap()).unwrap();

        assert_eq!(receiver.extra_f64("inf"), Ok(f64::INFINITY));
        assert_eq!(receiver.extra_f64("neg-inf"), Ok(f64::NEG_INFINITY));
        assert!(receiver.extra_f64("nan").unwrap().is_nan());
        assert_eq!(
            receiver.extra_f64("zero").unwrap().to_bits(),
            (-0.0f64).to_bits()
        );
    }

    #[test]
    fn shared_memory_access_is_exclusive() {
        let client = AllocatorClient::heap();
        let sender = SurfaceBuffer::new(client.clone());
        sender
            .alloc(&BufferRequestConfig {
                width: 16,
                height: 16,
                usage: BufferUsage::CPU_WRITE,
                ..Default::default()
            })
            .unwrap();
        let blob = sender.write_to_parcel().unwrap();
        let receiver = SurfaceBuffer::read_from_parcel(&blob, client).unwrap();

        std::thread::scope(|scope| {
            for (buffer, fill) in [(&sender, 0x11u8), (&receiver, 0x22u8)] {
                scope.spawn(move || {
                    for _ in 0..200 {
                        buffer
                            .with_mapped(|bytes| {
                                bytes.fill(fill);
                                std::thread::yield_now();
                                assert!(bytes.iter().all(|&b| b == fill));
                            })
                            .unwrap();
                    }
                });
            }
        });

        let last = receiver.with_mapped(|bytes| bytes[0]).unwrap();
        assert!(last == 0x11 || last == 0x22);
        assert!(sender.with_mapped(|bytes| bytes.iter().all(|&b| b == last)).unwrap());
    }

    #[test]
    fn garbage_is_invalid_param() {
        let result = SurfaceBuffer::read_from_parcel(b"not a parcel", AllocatorClient::heap());
        assert_eq!(result.err(), Some(SurfaceError::InvalidParam));
    }
}
