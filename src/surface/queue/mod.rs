//! ### English
//! `BufferQueue`: bounded slot table implementing the producer/consumer state machine.
//!
//! Slot states move `Free → Dequeued → Queued → Acquired → Free` (plus `Dequeued → Free` on
//! cancel). One mutex guards the whole table; listeners are stored separately and invoked after
//! the table lock is released. Operations never block: exhaustion is reported as `NoBuffer`.
//!
//! The table is split across files by operation, the same way the frame state is:
//! `request`, `flush` (flush + cancel), `acquire`, `release`, `capacity` and `settings`.
//!
//! ### 中文
//! `BufferQueue`：实现生产者/消费者状态机的有界槽位表。
//!
//! 槽位状态按 `Free → Dequeued → Queued → Acquired → Free` 流转（取消时 `Dequeued → Free`）。
//! 一把互斥锁保护整张表；监听器单独存放，在释放表锁后调用。操作从不阻塞：耗尽时返回 `NoBuffer`。
//!
//! 按操作拆分到不同文件：`request`、`flush`（flush + cancel）、`acquire`、`release`、
//! `capacity` 与 `settings`。

mod acquire;
mod capacity;
mod flush;
mod listener;
mod release;
mod request;
mod settings;
mod slot;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use dpi::PhysicalSize;
use parking_lot::{Mutex, RwLock};
use slotmap::SlotMap;

use super::allocator::AllocatorClient;
use super::buffer::SurfaceBuffer;
use super::error::{SurfaceError, SurfaceResult};
use super::fence::SharedFence;
use super::flags::BufferUsage;
use super::types::{Rect, SURFACE_DEFAULT_QUEUE_SIZE, ScalingMode};

pub use listener::{BufferAvailable, ChannelListener, ConsumerListener, ReleaseListener};
pub use slot::{SlotKey, SlotState};
use slot::BufferSlot;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// ### English
/// Construction parameters of a `BufferQueue`.
///
/// ### 中文
/// `BufferQueue` 的构造参数。
#[derive(Debug, Clone)]
pub struct BufferQueueInit {
    pub name: String,
    pub queue_size: u32,
    pub default_size: PhysicalSize<i32>,
    pub default_usage: BufferUsage,
}

impl Default for BufferQueueInit {
    fn default() -> Self {
        Self {
            name: String::from("surface"),
            queue_size: SURFACE_DEFAULT_QUEUE_SIZE,
            default_size: PhysicalSize::new(0, 0),
            default_usage: BufferUsage::CPU_READ | BufferUsage::MEM_DMA,
        }
    }
}

/// ### English
/// Result of a successful request: the dequeued buffer, the fence to wait on before writing,
/// and the sequences of buffers destroyed since the previous request.
///
/// ### 中文
/// 成功 request 的结果：出队的缓冲区、写入前需等待的 fence，以及自上次 request 以来被销毁的缓冲区序列号。
#[derive(Debug)]
pub struct RequestedSlot {
    pub buffer: Arc<SurfaceBuffer>,
    pub release_fence: SharedFence,
    pub deleted_sequences: Vec<u32>,
}

/// ### English
/// Result of a successful acquire.
///
/// ### 中文
/// 成功 acquire 的结果。
#[derive(Debug)]
pub struct AcquiredSlot {
    pub buffer: Arc<SurfaceBuffer>,
    pub acquire_fence: SharedFence,
    pub timestamp: i64,
    pub damage: Rect,
    pub scaling_mode: ScalingMode,
}

pub(crate) struct QueueState {
    slots: SlotMap<SlotKey, BufferSlot>,
    by_sequence: HashMap<u32, SlotKey>,
    /// ### English
    /// FREE slots, least recently returned first.
    ///
    /// ### 中文
    /// FREE 槽位，最早归还的在前。
    free_list: VecDeque<SlotKey>,
    /// ### English
    /// QUEUED slots in flush order.
    ///
    /// ### 中文
    /// 按 flush 顺序排列的 QUEUED 槽位。
    dirty_list: VecDeque<SlotKey>,
    deleted: Vec<u32>,
    queue_size: u32,
    default_size: PhysicalSize<i32>,
    default_usage: BufferUsage,
    user_data: HashMap<String, String>,
}

impl QueueState {
    /// ### English
    /// Resolves a buffer to the slot that owns it. Buffers of other queues resolve to `None`.
    ///
    /// ### 中文
    /// 将缓冲区解析为拥有它的槽位。其它队列的缓冲区解析为 `None`。
    fn key_of(&self, buffer: &SurfaceBuffer) -> Option<SlotKey> {
        let key = *self.by_sequence.get(&buffer.sequence())?;
        let slot = self.slots.get(key)?;
        (slot.buffer.id() == buffer.id()).then_some(key)
    }

    fn insert(&mut self, slot: BufferSlot) -> SlotKey {
        let sequence = slot.sequence();
        let key = self.slots.insert(slot);
        self.by_sequence.insert(sequence, key);
        key
    }

    /// ### English
    /// Removes a slot and destroys its buffer. The slot must not be on either list.
    ///
    /// ### 中文
    /// 移除槽位并销毁其缓冲区。该槽位不得仍在任何列表中。
    fn destroy(&mut self, key: SlotKey) {
        let Some(slot) = self.slots.remove(key) else {
            return;
        };
        let sequence = slot.sequence();
        self.by_sequence.remove(&sequence);
        slot.buffer.free_handle();
        self.deleted.push(sequence);
        tracing::debug!(sequence, "slot destroyed");
    }

    fn live_slot_count(&self) -> usize {
        self.slots.values().filter(|slot| !slot.deleting).count()
    }
}

pub struct BufferQueue {
    id: u64,
    name: String,
    allocator: Arc<AllocatorClient>,
    state: Mutex<QueueState>,
    consumer_listener: RwLock<Option<Arc<dyn ConsumerListener>>>,
    release_listener: RwLock<Option<Arc<dyn ReleaseListener>>>,
    available: AtomicU32,
}

impl BufferQueue {
    /// ### English
    /// Creates a queue. An out-of-range `init.queue_size` is clamped into `[1, 32]`.
    ///
    /// #### Parameters
    /// - `init`: Name, capacity and defaults.
    /// - `allocator`: Client used for every buffer of this queue.
    ///
    /// ### 中文
    /// 创建队列。超出范围的 `init.queue_size` 会被钳制到 `[1, 32]`。
    ///
    /// #### 参数
    /// - `init`：名称、容量与默认值。
    /// - `allocator`：此队列所有缓冲区使用的客户端。
    pub fn new(init: BufferQueueInit, allocator: Arc<AllocatorClient>) -> Arc<Self> {
        let BufferQueueInit {
            name,
            queue_size,
            default_size,
            default_usage,
        } = init;
        let queue_size = queue_size.clamp(1, super::types::SURFACE_MAX_QUEUE_SIZE);
        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(queue = %name, id, queue_size, "buffer queue created");

        Arc::new(Self {
            id,
            name,
            allocator,
            state: Mutex::new(QueueState {
                slots: SlotMap::with_key(),
                by_sequence: HashMap::new(),
                free_list: VecDeque::new(),
                dirty_list: VecDeque::new(),
                deleted: Vec::new(),
                queue_size,
                default_size,
                default_usage,
                user_data: HashMap::new(),
            }),
            consumer_listener: RwLock::new(None),
            release_listener: RwLock::new(None),
            available: AtomicU32::new(0),
        })
    }

    pub fn unique_id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allocator(&self) -> &Arc<AllocatorClient> {
        &self.allocator
    }

    /// ### English
    /// Number of QUEUED buffers waiting for the consumer.
    ///
    /// ### 中文
    /// 等待消费者的 QUEUED 缓冲区数量。
    pub fn available_buffer_count(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// ### English
    /// Number of slots currently allocated (in-flight evicted slots included).
    ///
    /// ### 中文
    /// 当前已分配的槽位数（包含流转中已被驱逐的槽位）。
    pub fn used_size(&self) -> u32 {
        self.state.lock().slots.len() as u32
    }

    /// ### English
    /// State of the slot owning `buffer`, or `None` if the buffer is not in this queue.
    ///
    /// ### 中文
    /// 拥有 `buffer` 的槽位状态；缓冲区不在此队列时为 `None`。
    pub fn slot_state(&self, buffer: &SurfaceBuffer) -> Option<SlotState> {
        let state = self.state.lock();
        state.key_of(buffer).map(|key| state.slots[key].state)
    }

    pub fn register_consumer_listener(&self, listener: Arc<dyn ConsumerListener>) {
        *self.consumer_listener.write() = Some(listener);
        tracing::debug!(queue = %self.name, "consumer listener registered");
    }

    pub fn unregister_consumer_listener(&self) {
        *self.consumer_listener.write() = None;
        tracing::debug!(queue = %self.name, "consumer listener unregistered");
    }

    pub fn is_consumer_registered(&self) -> bool {
        self.consumer_listener.read().is_some()
    }

    pub fn register_release_listener(&self, listener: Arc<dyn ReleaseListener>) {
        *self.release_listener.write() = Some(listener);
    }

    pub fn unregister_release_listener(&self) {
        *self.release_listener.write() = None;
    }

    fn notify_available(&self) {
        let listener = self.consumer_listener.read().clone();
        match listener {
            Some(listener) => listener.on_buffer_available(),
            None => tracing::debug!(queue = %self.name, "flush without consumer listener"),
        }
    }

    fn notify_released(&self, buffer: &Arc<SurfaceBuffer>) {
        let listener = self.release_listener.read().clone();
        if let Some(listener) = listener {
            listener.on_buffer_released(buffer);
        }
    }
}

fn resolve(
    state: &QueueState,
    buffer: Option<&SurfaceBuffer>,
    unknown: SurfaceError,
) -> SurfaceResult<SlotKey> {
    let buffer = buffer.ok_or(SurfaceError::InvalidArguments)?;
    state.key_of(buffer).ok_or(unknown)
}

impl Drop for BufferQueue {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for slot in state.slots.values() {
            slot.buffer.free_handle();
        }
        tracing::debug!(queue = %self.name, slots = state.slots.len(), "buffer queue torn down");
    }
}

impl std::fmt::Debug for BufferQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferQueue")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("available", &self.available_buffer_count())
            .finish()
    }
}
