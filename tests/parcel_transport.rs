mod common;

use common::{flush_config, pair, request_config};
use surface_queue::{Fence, Rect, Surface, SurfaceBuffer, TransformType};

/// 消费者将 acquire 的缓冲区打包为 parcel，远端重建后读取同一块内存。
#[test]
fn acquired_buffer_crosses_the_parcel_boundary() {
    let pair = pair("parcel", 2);
    let mut config = request_config();
    config.transform = TransformType::Rotate180;
    let requested = pair.producer.request_buffer(&config).unwrap();
    let writer = requested.buffer.buffer().clone();
    writer.with_mapped(|bytes| bytes[..4].copy_from_slice(&[1, 2, 3, 4])).unwrap();
    writer.set_extra_data("frame", 42i32).unwrap();
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 64, 64), 7),
        )
        .unwrap();

    let acquired = pair.consumer.acquire_buffer().unwrap();
    let blob = acquired.buffer().write_to_parcel().unwrap();
    let allocator = pair.consumer.queue().allocator().clone();
    let remote = SurfaceBuffer::read_from_parcel(&blob, allocator).unwrap();

    assert_eq!(remote.id(), acquired.buffer().id());
    assert_eq!(remote.width(), Some(64));
    assert_eq!(remote.stride(), acquired.buffer().stride());
    assert_eq!(remote.transform(), TransformType::Rotate180);
    assert_eq!(remote.extra_i32("frame"), Ok(42));
    assert_eq!(remote.with_mapped(|bytes| bytes[..4].to_vec()).unwrap(), vec![1, 2, 3, 4]);

    drop(remote);
    // 远端释放自己的引用后，队列中的缓冲区仍可访问。
    assert_eq!(acquired.buffer().with_mapped(|bytes| bytes[3]).unwrap(), 4);
    pair.consumer
        .release_buffer(acquired, Fence::invalid())
        .unwrap();
}
