mod common;

use std::sync::{Arc, Mutex};

use common::{flush_config, pair, request_config};
use surface_queue::{
    AllocatorClient, BufferQueue, BufferQueueInit, ConsumerSurface, Fence, HeapAllocator,
    LowError, Rect, SlotState, Surface, SurfaceBuffer, SurfaceError,
};

/// 场景 A：容量为 3 时，第 4 次请求返回 NoBuffer。
#[test]
fn fourth_request_hits_backpressure() {
    let pair = pair("scenario-a", 3);
    let config = request_config();

    let held: Vec<_> = (0..3)
        .map(|_| pair.producer.request_buffer(&config).expect("request"))
        .collect();
    let err = pair.producer.request_buffer(&config).unwrap_err();
    assert_eq!(err, SurfaceError::NoBuffer);
    assert!(err.is_transient());
    // 重复请求不会阻塞，也不会交出仍在使用的缓冲区。
    assert_eq!(pair.producer.request_buffer(&config).unwrap_err(), SurfaceError::NoBuffer);

    for requested in held {
        pair.producer.cancel_buffer(requested.buffer).unwrap();
    }
    assert!(pair.producer.request_buffer(&config).is_ok());
}

/// 场景 B：非法 damage 被拒绝且缓冲区保持 DEQUEUED，重试后成功。
#[test]
fn invalid_damage_keeps_buffer_dequeued() {
    let pair = pair("scenario-b", 3);
    let requested = pair.producer.request_buffer(&request_config()).unwrap();
    let buffer = requested.buffer.buffer().clone();

    let rejected = pair
        .producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, -1, 10), 1),
        )
        .unwrap_err();
    assert_eq!(rejected.error(), SurfaceError::InvalidParam);
    let queue = pair.producer.queue();
    assert_eq!(queue.slot_state(&buffer), Some(SlotState::Dequeued));
    assert_eq!(pair.notifications(), 0);

    pair.producer
        .flush_buffer(
            rejected.into_inner(),
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 10, 10), 1),
        )
        .unwrap();
    assert_eq!(queue.slot_state(&buffer), Some(SlotState::Queued));
    assert_eq!(pair.notifications(), 1);
}

/// 场景 C：空队列 acquire 返回 NoBuffer；flush 后返回对应 damage 与时间戳。
#[test]
fn acquire_returns_flushed_metadata() {
    let pair = pair("scenario-c", 3);
    assert_eq!(pair.consumer.acquire_buffer().unwrap_err(), SurfaceError::NoBuffer);

    let requested = pair.producer.request_buffer(&request_config()).unwrap();
    let sequence = requested.buffer.sequence();
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(2, 3, 10, 12), 16_000),
        )
        .unwrap();
    assert_eq!(pair.consumer.available_buffer_count(), 1);

    let acquired = pair.consumer.acquire_buffer().unwrap();
    assert_eq!(acquired.sequence(), sequence);
    assert_eq!(acquired.damage(), Rect::new(2, 3, 10, 12));
    assert_eq!(acquired.timestamp(), 16_000);
    assert_eq!(pair.consumer.available_buffer_count(), 0);
    pair.consumer
        .release_buffer(acquired, Fence::invalid())
        .unwrap();
}

#[test]
fn zero_timestamp_is_stamped_at_flush() {
    let pair = pair("stamp", 3);
    let requested = pair.producer.request_buffer(&request_config()).unwrap();
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 1, 1), 0),
        )
        .unwrap();
    let acquired = pair.consumer.acquire_buffer().unwrap();
    assert!(acquired.timestamp() > 0);
    pair.consumer
        .release_buffer(acquired, Fence::invalid())
        .unwrap();
}

/// 场景 D：重复 release 同一缓冲区，第二次返回 InvalidOperating。
#[test]
fn double_release_is_rejected() {
    let pair = pair("scenario-d", 3);
    let requested = pair.producer.request_buffer(&request_config()).unwrap();
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 8, 8), 1),
        )
        .unwrap();
    let acquired = pair.consumer.acquire_buffer().unwrap();
    let buffer = acquired.buffer().clone();
    pair.consumer
        .release_buffer(acquired, Fence::invalid())
        .unwrap();

    let queue = pair.consumer.queue();
    assert_eq!(queue.slot_state(&buffer), Some(SlotState::Free));
    assert_eq!(
        queue.release_buffer(Some(buffer.as_ref()), Fence::invalid()),
        Err(SurfaceError::InvalidOperating)
    );
}

#[test]
fn buffers_are_acquired_in_flush_order() {
    let pair = pair("fifo", 4);
    let config = request_config();
    let first = pair.producer.request_buffer(&config).unwrap();
    let second = pair.producer.request_buffer(&config).unwrap();
    let third = pair.producer.request_buffer(&config).unwrap();
    let order = [third.buffer.sequence(), first.buffer.sequence(), second.buffer.sequence()];

    for requested in [third, first, second] {
        pair.producer
            .flush_buffer(
                requested.buffer,
                Fence::invalid(),
                &flush_config(Rect::new(0, 0, 4, 4), 1),
            )
            .unwrap();
    }

    for expected in order {
        let acquired = pair.consumer.acquire_buffer().unwrap();
        assert_eq!(acquired.sequence(), expected);
        pair.consumer
            .release_buffer(acquired, Fence::invalid())
            .unwrap();
    }
}

#[test]
fn each_buffer_has_exactly_one_state() {
    let pair = pair("exclusive", 3);
    let queue = pair.producer.queue().clone();
    let config = request_config();

    let a = pair.producer.request_buffer(&config).unwrap();
    let b = pair.producer.request_buffer(&config).unwrap();
    let c = pair.producer.request_buffer(&config).unwrap();
    let (a_buf, b_buf, c_buf) = (
        a.buffer.buffer().clone(),
        b.buffer.buffer().clone(),
        c.buffer.buffer().clone(),
    );

    pair.producer
        .flush_buffer(a.buffer, Fence::invalid(), &flush_config(Rect::new(0, 0, 1, 1), 1))
        .unwrap();
    pair.producer
        .flush_buffer(b.buffer, Fence::invalid(), &flush_config(Rect::new(0, 0, 1, 1), 2))
        .unwrap();
    let acquired = pair.consumer.acquire_buffer().unwrap();

    assert_eq!(queue.slot_state(&a_buf), Some(SlotState::Acquired));
    assert_eq!(queue.slot_state(&b_buf), Some(SlotState::Queued));
    assert_eq!(queue.slot_state(&c_buf), Some(SlotState::Dequeued));

    // 状态错误的操作不会改变任何状态。
    assert_eq!(
        queue.flush_buffer(Some(b_buf.as_ref()), Fence::invalid(), &flush_config(Rect::new(0, 0, 1, 1), 3)),
        Err(SurfaceError::InvalidOperating)
    );
    assert_eq!(queue.cancel_buffer(Some(a_buf.as_ref())), Err(SurfaceError::InvalidOperating));
    assert_eq!(
        queue.release_buffer(Some(c_buf.as_ref()), Fence::invalid()),
        Err(SurfaceError::InvalidOperating)
    );
    assert_eq!(queue.slot_state(&b_buf), Some(SlotState::Queued));
    assert_eq!(queue.slot_state(&c_buf), Some(SlotState::Dequeued));

    pair.consumer
        .release_buffer(acquired, Fence::invalid())
        .unwrap();
    pair.producer.cancel_buffer(c.buffer).unwrap();
    assert_eq!(queue.slot_state(&a_buf), Some(SlotState::Free));
    assert_eq!(queue.slot_state(&c_buf), Some(SlotState::Free));
}

#[test]
fn cancel_makes_the_same_buffer_available_again() {
    let pair = pair("cancel", 1);
    let config = request_config();
    let first = pair.producer.request_buffer(&config).unwrap();
    let buffer = first.buffer.buffer().clone();
    pair.producer.cancel_buffer(first.buffer).unwrap();

    let again = pair.producer.request_buffer(&config).unwrap();
    assert!(Arc::ptr_eq(again.buffer.buffer(), &buffer));
    pair.producer.cancel_buffer(again.buffer).unwrap();
}

#[test]
fn missing_arguments_and_missing_consumer() {
    let consumer = ConsumerSurface::new(BufferQueueInit::default(), AllocatorClient::heap());
    let producer = consumer.producer();
    assert_eq!(
        producer.request_buffer(&request_config()).unwrap_err(),
        SurfaceError::NoConsumer
    );

    let queue = consumer.queue();
    assert_eq!(
        queue.flush_buffer(None, Fence::invalid(), &flush_config(Rect::new(0, 0, 1, 1), 1)),
        Err(SurfaceError::InvalidArguments)
    );
    assert_eq!(queue.cancel_buffer(None), Err(SurfaceError::InvalidArguments));
    assert_eq!(
        queue.release_buffer(None, Fence::invalid()),
        Err(SurfaceError::InvalidArguments)
    );

    let stranger = SurfaceBuffer::new(AllocatorClient::heap());
    assert_eq!(
        queue.release_buffer(Some(&stranger), Fence::invalid()),
        Err(SurfaceError::NoEntry)
    );
    assert_eq!(queue.cancel_buffer(Some(&stranger)), Err(SurfaceError::InvalidOperating));
}

#[test]
fn invalid_request_config_is_rejected() {
    let pair = pair("bad-config", 3);
    let mut config = request_config();
    config.width = 0;
    assert_eq!(
        pair.producer.request_buffer(&config).unwrap_err(),
        SurfaceError::InvalidParam
    );
    config.width = 64;
    config.stride_alignment = 3;
    assert_eq!(
        pair.producer.request_buffer(&config).unwrap_err(),
        SurfaceError::InvalidParam
    );
    assert_eq!(pair.producer.queue().used_size(), 0);
}

#[test]
fn roles_reject_the_other_side() {
    let pair = pair("roles", 3);
    assert_eq!(
        pair.producer
            .register_consumer_listener(Arc::new(|| {}))
            .unwrap_err(),
        SurfaceError::NotSupport
    );
    assert_eq!(pair.producer.acquire_buffer().unwrap_err(), SurfaceError::NotSupport);
    assert_eq!(
        pair.consumer.request_buffer(&request_config()).unwrap_err(),
        SurfaceError::NotSupport
    );

    let requested = pair.producer.request_buffer(&request_config()).unwrap();
    let rejected = pair
        .consumer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 1, 1), 1),
        )
        .unwrap_err();
    assert_eq!(rejected.error(), SurfaceError::NotSupport);
    pair.producer.cancel_buffer(rejected.into_inner()).unwrap();
}

#[test]
fn token_from_another_queue_is_rejected() {
    let left = pair("left", 3);
    let right = pair("right", 3);
    let requested = left.producer.request_buffer(&request_config()).unwrap();

    let rejected = right
        .producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 1, 1), 1),
        )
        .unwrap_err();
    assert_eq!(rejected.error(), SurfaceError::InvalidOperating);
    assert_eq!(right.notifications(), 0);
    left.producer.cancel_buffer(rejected.into_inner()).unwrap();
}

#[test]
fn flush_after_listener_removed_still_succeeds() {
    let pair = pair("late-unregister", 3);
    let requested = pair.producer.request_buffer(&request_config()).unwrap();
    pair.consumer.unregister_consumer_listener().unwrap();
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 1, 1), 1),
        )
        .unwrap();
    assert_eq!(pair.notifications(), 0);
    assert_eq!(pair.consumer.available_buffer_count(), 1);
}

#[test]
fn release_fence_reaches_the_next_request() {
    let pair = pair("release-fence", 1);
    let config = request_config();
    let requested = pair.producer.request_buffer(&config).unwrap();
    assert!(!requested.release_fence.is_valid());
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 1, 1), 1),
        )
        .unwrap();

    let acquired = pair.consumer.acquire_buffer().unwrap();
    let (fence, signaler) = Fence::pending();
    let fd = fence.fd();
    pair.consumer
        .release_buffer(acquired, Arc::new(fence))
        .unwrap();

    let again = pair.producer.request_buffer(&config).unwrap();
    assert_eq!(again.release_fence.fd(), fd);
    signaler.signal();
    assert_eq!(
        again.release_fence.wait(std::time::Duration::from_millis(10)),
        surface_queue::FenceStatus::Signaled
    );
    pair.producer.cancel_buffer(again.buffer).unwrap();
}

#[test]
fn release_listener_sees_returned_buffers() {
    let pair = pair("release-listener", 3);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    pair.producer
        .register_release_listener(Arc::new(move |buffer: &Arc<SurfaceBuffer>| {
            sink.lock().unwrap().push(buffer.sequence());
        }));

    let requested = pair.producer.request_buffer(&request_config()).unwrap();
    let sequence = requested.buffer.sequence();
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 1, 1), 1),
        )
        .unwrap();
    let acquired = pair.consumer.acquire_buffer().unwrap();
    pair.consumer
        .release_buffer(acquired, Fence::invalid())
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![sequence]);
}

#[test]
fn release_listener_skips_buffers_destroyed_by_shrink() {
    let pair = pair("release-shrink", 2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    pair.producer
        .register_release_listener(Arc::new(move |buffer: &Arc<SurfaceBuffer>| {
            sink.lock().unwrap().push(buffer.sequence());
        }));

    let config = request_config();
    let mut sequences = Vec::new();
    for ts in 1..=2 {
        let requested = pair.producer.request_buffer(&config).unwrap();
        sequences.push(requested.buffer.sequence());
        pair.producer
            .flush_buffer(
                requested.buffer,
                Fence::invalid(),
                &flush_config(Rect::new(0, 0, 1, 1), ts),
            )
            .unwrap();
    }
    let first = pair.consumer.acquire_buffer().unwrap();
    let second = pair.consumer.acquire_buffer().unwrap();

    pair.producer.set_queue_size(1).unwrap();
    let queue = pair.producer.queue().clone();
    assert_eq!(queue.used_size(), 2);

    pair.consumer.release_buffer(first, Fence::invalid()).unwrap();
    pair.consumer.release_buffer(second, Fence::invalid()).unwrap();
    assert_eq!(queue.used_size(), 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(sequences.contains(&seen[0]));
}

#[test]
fn shrinking_defers_in_flight_buffers() {
    let pair = pair("shrink", 3);
    let config = request_config();
    let a = pair.producer.request_buffer(&config).unwrap();
    let b = pair.producer.request_buffer(&config).unwrap();
    let c = pair.producer.request_buffer(&config).unwrap();
    let c_sequence = c.buffer.sequence();
    pair.producer.cancel_buffer(c.buffer).unwrap();

    pair.producer.set_queue_size(1).unwrap();
    assert_eq!(pair.producer.queue_size(), 1);
    let queue = pair.producer.queue().clone();
    // FREE 槽位立即销毁，流转中的一个被标记，另一个保留。
    assert_eq!(queue.used_size(), 2);

    let b_sequence = b.buffer.sequence();
    let a_sequence = a.buffer.sequence();
    pair.producer.cancel_buffer(a.buffer).unwrap();
    pair.producer.cancel_buffer(b.buffer).unwrap();
    assert_eq!(queue.used_size(), 1);

    let next = pair.producer.request_buffer(&config).unwrap();
    assert!(next.deleted_sequences.contains(&c_sequence));
    assert_eq!(next.deleted_sequences.len(), 2);
    assert!(
        next.deleted_sequences.contains(&a_sequence) || next.deleted_sequences.contains(&b_sequence)
    );
    assert_eq!(
        pair.producer.request_buffer(&config).unwrap_err(),
        SurfaceError::NoBuffer
    );
    pair.producer.cancel_buffer(next.buffer).unwrap();
}

#[test]
fn queue_size_bounds() {
    let pair = pair("bounds", 3);
    assert_eq!(pair.producer.set_queue_size(0), Err(SurfaceError::InvalidParam));
    assert_eq!(pair.producer.set_queue_size(33), Err(SurfaceError::InvalidParam));
    assert_eq!(pair.producer.queue_size(), 3);
    pair.producer.set_queue_size(32).unwrap();
}

#[test]
fn clean_cache_drops_queued_buffers() {
    let pair = pair("clean", 3);
    let config = request_config();
    let requested = pair.producer.request_buffer(&config).unwrap();
    let sequence = requested.buffer.sequence();
    pair.producer
        .flush_buffer(
            requested.buffer,
            Fence::invalid(),
            &flush_config(Rect::new(0, 0, 1, 1), 1),
        )
        .unwrap();

    pair.producer.clean_cache().unwrap();
    assert_eq!(pair.consumer.available_buffer_count(), 0);
    assert_eq!(pair.consumer.acquire_buffer().unwrap_err(), SurfaceError::NoBuffer);

    let next = pair.producer.request_buffer(&config).unwrap();
    assert_eq!(next.deleted_sequences, vec![sequence]);
    assert_ne!(next.buffer.sequence(), sequence);
    pair.producer.cancel_buffer(next.buffer).unwrap();
}

#[test]
fn settings_round_trip() {
    let pair = pair("settings", 3);
    pair.producer.set_default_width_and_height(320, 240).unwrap();
    assert_eq!(pair.consumer.default_size(), dpi::PhysicalSize::new(320, 240));
    assert_eq!(
        pair.producer.set_default_width_and_height(0, 240),
        Err(SurfaceError::InvalidParam)
    );

    pair.producer.set_user_data("role", "preview").unwrap();
    assert_eq!(pair.consumer.user_data("role").as_deref(), Some("preview"));
    assert_eq!(pair.consumer.user_data("missing"), None);
    assert_eq!(pair.consumer.name(), "settings");
    assert_eq!(pair.consumer.unique_id(), pair.producer.unique_id());
}

#[test]
fn allocator_failures_surface_with_low_offset() {
    common::init_tracing();
    let allocator = AllocatorClient::with_backend(Arc::new(HeapAllocator::with_budget(64)));
    let queue = BufferQueue::new(BufferQueueInit::default(), allocator);
    queue.register_consumer_listener(Arc::new(|| {}));

    let err = queue.request_buffer(&request_config()).unwrap_err();
    assert_eq!(err, SurfaceError::ApiFailed(LowError::NoMem));
    assert_eq!(
        err.code(),
        SurfaceError::ApiFailed(LowError::Failure).code() - LowError::Failure.offset()
            + LowError::NoMem.offset()
    );
    assert_eq!(queue.used_size(), 0);
}

mod properties {
    use proptest::prelude::*;

    use super::common::{flush_config, pair, request_config};
    use surface_queue::{Fence, Rect, Surface};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// 任意 flush 顺序下，acquire 顺序与 flush 顺序一致。
        #[test]
        fn acquire_order_matches_flush_order(order in Just((0usize..6).collect::<Vec<_>>()).prop_shuffle()) {
            let pair = pair("fifo-property", 6);
            let config = request_config();
            let requested: Vec<_> = (0..6)
                .map(|_| pair.producer.request_buffer(&config).unwrap())
                .collect();
            let mut slots: Vec<_> = requested.into_iter().map(Some).collect();

            let mut expected = Vec::new();
            for index in order {
                let requested = slots[index].take().unwrap();
                expected.push(requested.buffer.sequence());
                pair.producer
                    .flush_buffer(requested.buffer, Fence::invalid(), &flush_config(Rect::new(0, 0, 1, 1), 1))
                    .unwrap();
            }

            for sequence in expected {
                let acquired = pair.consumer.acquire_buffer().unwrap();
                prop_assert_eq!(acquired.sequence(), sequence);
                pair.consumer.release_buffer(acquired, Fence::invalid()).unwrap();
            }
        }
    }
}
