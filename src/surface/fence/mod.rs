//! ### English
//! Fences: cross-thread "work finished" signals attached to buffers.
//!
//! A `Fence` owns at most one descriptor. The shared `Fence::invalid()` sentinel stands for a
//! fence that is already signaled; producers and consumers pass it when there is nothing to wait
//! for. Acquire fences travel producer → consumer on flush, release fences consumer → producer on
//! release.
//!
//! ### 中文
//! Fence：附着在缓冲区上的跨线程“工作已完成”信号。
//!
//! `Fence` 最多持有一个描述符。共享的 `Fence::invalid()` 哨兵表示已触发的 fence；
//! 无需等待时生产者与消费者传递它。acquire fence 在 flush 时从生产者传给消费者，
//! release fence 在 release 时从消费者传回生产者。

mod sync_point;

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use sync_point::SyncPoint;
pub use sync_point::FenceSignaler;

/// ### English
/// Descriptor numbers start above the stdio range, mirroring real fd allocation.
///
/// ### 中文
/// 描述符编号从 stdio 范围之上开始，与真实 fd 分配一致。
static NEXT_FENCE_FD: AtomicI32 = AtomicI32::new(3);

static INVALID_FENCE: LazyLock<SharedFence> = LazyLock::new(|| {
    Arc::new(Fence {
        fd: Fence::INVALID_FD,
        point: None,
    })
});

pub type SharedFence = Arc<Fence>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    /// ### English
    /// Still pending (returned by `wait` on timeout).
    ///
    /// ### 中文
    /// 仍未触发（`wait` 超时时返回）。
    Active,
}

pub struct Fence {
    fd: i32,
    point: Option<Arc<SyncPoint>>,
}

impl Fence {
    pub const INVALID_FD: i32 = -1;

    /// ### English
    /// The shared already-signaled sentinel.
    ///
    /// ### 中文
    /// 共享的已触发哨兵。
    pub fn invalid() -> SharedFence {
        INVALID_FENCE.clone()
    }

    /// ### English
    /// Creates a pending fence and the signaler that completes it.
    ///
    /// ### 中文
    /// 创建一个待定 fence 及完成它的触发端。
    pub fn pending() -> (Fence, FenceSignaler) {
        let point = SyncPoint::pending();
        let fence = Fence::with_point(point.clone());
        let signaler = FenceSignaler::new(point, fence.fd);
        (fence, signaler)
    }

    fn with_point(point: Arc<SyncPoint>) -> Fence {
        Fence {
            fd: NEXT_FENCE_FD.fetch_add(1, Ordering::Relaxed),
            point: Some(point),
        }
    }

    fn empty() -> Fence {
        Fence {
            fd: Self::INVALID_FD,
            point: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.point.is_some()
    }

    /// ### English
    /// Descriptor number, or `Fence::INVALID_FD`.
    ///
    /// ### 中文
    /// 描述符编号，或 `Fence::INVALID_FD`。
    pub fn fd(&self) -> i32 {
        self.fd
    }

    pub fn status(&self) -> FenceStatus {
        match &self.point {
            Some(point) if point.signal_time().is_none() => FenceStatus::Active,
            _ => FenceStatus::Signaled,
        }
    }

    /// ### English
    /// Waits up to `timeout` for the fence to signal. Invalid fences return immediately.
    ///
    /// ### 中文
    /// 最多等待 `timeout` 直到 fence 触发。无效 fence 立即返回。
    pub fn wait(&self, timeout: Duration) -> FenceStatus {
        let Some(point) = &self.point else {
            return FenceStatus::Signaled;
        };
        let deadline = Instant::now().checked_add(timeout);
        if point.wait_until(deadline) {
            FenceStatus::Signaled
        } else {
            tracing::trace!(fd = self.fd, ?timeout, "fence wait timed out");
            FenceStatus::Active
        }
    }

    pub fn signal_time(&self) -> Option<Instant> {
        self.point.as_ref().and_then(|p| p.signal_time())
    }

    /// ### English
    /// New descriptor on the same sync point.
    ///
    /// ### 中文
    /// 同一同步点上的新描述符。
    pub fn dup(&self) -> Fence {
        match &self.point {
            Some(point) => Fence::with_point(point.clone()),
            None => Fence::empty(),
        }
    }

    /// ### English
    /// Fence that signals once both `a` and `b` have signaled.
    ///
    /// ### 中文
    /// 在 `a` 与 `b` 都触发后才触发的 fence。
    pub fn merge(a: &Fence, b: &Fence) -> Fence {
        match (&a.point, &b.point) {
            (Some(pa), Some(pb)) => Fence::with_point(SyncPoint::merged(pa.clone(), pb.clone())),
            (Some(_), None) => a.dup(),
            (None, Some(_)) => b.dup(),
            (None, None) => Fence::empty(),
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        if self.point.is_some() {
            tracing::trace!(fd = self.fd, "fence descriptor closed");
        }
    }
}

impl std::fmt::Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence")
            .field("fd", &self.fd)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn invalid_is_signaled_and_shared() {
        let a = Fence::invalid();
        let b = Fence::invalid();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_valid());
        assert_eq!(a.fd(), Fence::INVALID_FD);
        assert_eq!(a.wait(Duration::ZERO), FenceStatus::Signaled);
    }

    #[test]
    fn wait_times_out_then_signals() {
        let (fence, signaler) = Fence::pending();
        assert_eq!(fence.wait(Duration::from_millis(5)), FenceStatus::Active);
        signaler.signal();
        assert_eq!(fence.wait(Duration::ZERO), FenceStatus::Signaled);
        assert!(fence.signal_time().is_some());
    }

    #[test]
    fn dropped_signaler_signals() {
        let (fence, signaler) = Fence::pending();
        drop(signaler);
        assert_eq!(fence.status(), FenceStatus::Signaled);
    }

    #[test]
    fn dup_shares_the_sync_point() {
        let (fence, signaler) = Fence::pending();
        let copy = fence.dup();
        assert_ne!(fence.fd(), copy.fd());
        drop(fence);
        assert_eq!(copy.status(), FenceStatus::Active);
        signaler.signal();
        assert_eq!(copy.status(), FenceStatus::Signaled);
    }

    #[test]
    fn merge_is_logical_and() {
        let (a, sa) = Fence::pending();
        let (b, sb) = Fence::pending();
        let merged = Fence::merge(&a, &b);
        sa.signal();
        assert_eq!(merged.status(), FenceStatus::Active);
        sb.signal();
        assert_eq!(merged.status(), FenceStatus::Signaled);
        assert_eq!(
            merged.signal_time(),
            Some(a.signal_time().unwrap().max(b.signal_time().unwrap()))
        );
    }

    #[test]
    fn merge_with_invalid_is_dup() {
        let (a, _sa) = Fence::pending();
        let merged = Fence::merge(&a, &Fence::invalid());
        assert!(merged.is_valid());
        assert_eq!(merged.status(), FenceStatus::Active);
        assert!(!Fence::merge(&Fence::invalid(), &Fence::invalid()).is_valid());
    }

    #[test]
    fn waiter_wakes_across_threads() {
        let (fence, signaler) = Fence::pending();
        let waiter = thread::spawn(move || fence.wait(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(10));
        signaler.signal();
        assert_eq!(waiter.join().unwrap(), FenceStatus::Signaled);
    }
}
