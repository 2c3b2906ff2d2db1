//! ### English
//! Connection to the allocator backend with an explicit lifecycle.
//!
//! The backend is obtained through an injected connector. The first call that needs it connects
//! lazily; `connection_died` drops it and fires the injected death callback so the next call
//! reconnects; `teardown` drops it for good.
//!
//! ### 中文
//! 具有显式生命周期的分配器后端连接。
//!
//! 后端通过注入的 connector 获取。首次需要时惰性连接；`connection_died` 丢弃后端并触发
//! 注入的死亡回调，下次调用时重新连接；`teardown` 永久丢弃后端。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use super::{BufferAllocator, HeapAllocator};
use crate::surface::error::{SurfaceError, SurfaceResult};

pub type AllocatorConnector =
    Box<dyn Fn() -> SurfaceResult<Arc<dyn BufferAllocator>> + Send + Sync>;
pub type DeathCallback = Box<dyn Fn() + Send + Sync>;

pub struct AllocatorClient {
    connector: AllocatorConnector,
    backend: RwLock<Option<Arc<dyn BufferAllocator>>>,
    on_died: Mutex<Option<DeathCallback>>,
    torn_down: AtomicBool,
}

impl AllocatorClient {
    pub fn new(
        connector: impl Fn() -> SurfaceResult<Arc<dyn BufferAllocator>> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            connector: Box::new(connector),
            backend: RwLock::new(None),
            on_died: Mutex::new(None),
            torn_down: AtomicBool::new(false),
        })
    }

    /// ### English
    /// Client whose connector always hands out `backend`.
    ///
    /// ### 中文
    /// connector 总是返回 `backend` 的客户端。
    pub fn with_backend(backend: Arc<dyn BufferAllocator>) -> Arc<Self> {
        Self::new(move || Ok(backend.clone()))
    }

    /// ### English
    /// Client backed by a fresh `HeapAllocator`.
    ///
    /// ### 中文
    /// 以新建 `HeapAllocator` 为后端的客户端。
    pub fn heap() -> Arc<Self> {
        Self::with_backend(Arc::new(HeapAllocator::new()))
    }

    /// ### English
    /// Connects now if not connected yet.
    ///
    /// ### 中文
    /// 若尚未连接则立即连接。
    pub fn init(&self) -> SurfaceResult<()> {
        self.backend().map(|_| ())
    }

    pub fn is_connected(&self) -> bool {
        self.backend.read().is_some()
    }

    /// ### English
    /// Current backend, connecting lazily. Fails `NotInit` after teardown or when the connector
    /// cannot reach a backend.
    ///
    /// ### 中文
    /// 当前后端（惰性连接）。teardown 之后或 connector 无法连接时返回 `NotInit`。
    pub fn backend(&self) -> SurfaceResult<Arc<dyn BufferAllocator>> {
        if self.torn_down.load(Ordering::Acquire) {
            return Err(SurfaceError::NotInit);
        }
        if let Some(backend) = self.backend.read().as_ref() {
            return Ok(backend.clone());
        }

        let mut slot = self.backend.write();
        if let Some(backend) = slot.as_ref() {
            return Ok(backend.clone());
        }
        match (self.connector)() {
            Ok(backend) => {
                tracing::debug!("allocator backend connected");
                *slot = Some(backend.clone());
                Ok(backend)
            }
            Err(error) => {
                tracing::warn!(%error, "allocator backend unavailable");
                Err(SurfaceError::NotInit)
            }
        }
    }

    /// ### English
    /// Installs the callback fired when the backend connection dies.
    ///
    /// ### 中文
    /// 设置后端连接断开时触发的回调。
    pub fn set_death_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_died.lock() = Some(Box::new(callback));
    }

    /// ### English
    /// Reports that the backend went away. The next operation reconnects.
    ///
    /// ### 中文
    /// 报告后端已断开。下一次操作会重新连接。
    pub fn connection_died(&self) {
        if self.backend.write().take().is_none() {
            return;
        }
        tracing::warn!("allocator backend connection died");
        if let Some(callback) = self.on_died.lock().as_ref() {
            callback();
        }
    }

    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::Release);
        self.backend.write().take();
        tracing::debug!("allocator client torn down");
    }
}

impl std::fmt::Debug for AllocatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatorClient")
            .field("connected", &self.is_connected())
            .field("torn_down", &self.torn_down.load(Ordering::Relaxed))
            .finish()
    }
}
