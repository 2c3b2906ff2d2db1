#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dpi::PhysicalSize;
use surface_queue::{
    AllocatorClient, BufferFlushConfig, BufferQueueInit, BufferRequestConfig, ConsumerSurface,
    ProducerSurface, Rect, Surface,
};
use tracing_subscriber::EnvFilter;

/// 测试日志：`RUST_LOG=surface_queue=debug cargo test` 可查看队列状态流转。
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Pair {
    pub consumer: ConsumerSurface,
    pub producer: ProducerSurface,
    pub notified: Arc<AtomicUsize>,
}

impl Pair {
    pub fn notifications(&self) -> usize {
        self.notified.load(Ordering::SeqCst)
    }
}

/// 构造一对已注册消费者监听器的生产者/消费者。
pub fn pair(name: &str, queue_size: u32) -> Pair {
    init_tracing();
    let consumer = ConsumerSurface::new(
        BufferQueueInit {
            name: name.to_owned(),
            queue_size,
            default_size: PhysicalSize::new(64, 64),
            ..Default::default()
        },
        AllocatorClient::heap(),
    );
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    consumer
        .register_consumer_listener(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .expect("register listener");
    let producer = consumer.producer();
    Pair {
        consumer,
        producer,
        notified,
    }
}

pub fn request_config() -> BufferRequestConfig {
    BufferRequestConfig {
        width: 64,
        height: 64,
        ..Default::default()
    }
}

pub fn flush_config(damage: Rect, timestamp: i64) -> BufferFlushConfig {
    BufferFlushConfig { damage, timestamp }
}
