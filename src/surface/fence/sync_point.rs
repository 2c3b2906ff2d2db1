//! ### English
//! Sync points behind fence descriptors.
//!
//! A timeline point is signaled once by its `FenceSignaler`; a merged point is signaled when all
//! of its parents are. Waiting parks on a condition variable with a deadline.
//!
//! ### 中文
//! fence 描述符背后的同步点。
//!
//! timeline 同步点由其 `FenceSignaler` 触发一次；合并同步点在所有父同步点触发后视为触发。
//! 等待时在条件变量上按截止时间挂起。

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

pub(super) struct SyncPoint {
    kind: PointKind,
}

enum PointKind {
    Timeline {
        /// ### English
        /// Signal time; `None` while pending.
        ///
        /// ### 中文
        /// 触发时间；未触发时为 `None`。
        signaled_at: Mutex<Option<Instant>>,
        cond: Condvar,
    },
    Merged(Vec<Arc<SyncPoint>>),
}

impl SyncPoint {
    pub(super) fn pending() -> Arc<Self> {
        Arc::new(Self {
            kind: PointKind::Timeline {
                signaled_at: Mutex::new(None),
                cond: Condvar::new(),
            },
        })
    }

    pub(super) fn merged(a: Arc<SyncPoint>, b: Arc<SyncPoint>) -> Arc<Self> {
        Arc::new(Self {
            kind: PointKind::Merged(vec![a, b]),
        })
    }

    /// ### English
    /// Marks a timeline point signaled and wakes all waiters. Repeated calls keep the first time.
    ///
    /// ### 中文
    /// 将 timeline 同步点标记为已触发并唤醒所有等待者。重复调用保留首次时间。
    pub(super) fn signal(&self) {
        if let PointKind::Timeline { signaled_at, cond } = &self.kind {
            let mut state = signaled_at.lock();
            if state.is_none() {
                *state = Some(Instant::now());
                cond.notify_all();
            }
        }
    }

    /// ### English
    /// Time at which the point became signaled; for a merged point, the latest parent time.
    ///
    /// ### 中文
    /// 同步点触发的时间；合并同步点取父同步点中最晚的时间。
    pub(super) fn signal_time(&self) -> Option<Instant> {
        match &self.kind {
            PointKind::Timeline { signaled_at, .. } => *signaled_at.lock(),
            PointKind::Merged(parents) => parents
                .iter()
                .map(|p| p.signal_time())
                .try_fold(None::<Instant>, |latest, t| {
                    t.map(|t| Some(latest.map_or(t, |l| l.max(t))))
                })
                .flatten(),
        }
    }

    /// ### English
    /// Blocks until signaled or `deadline` passes (`None` waits without a deadline).
    /// Returns whether the point is signaled.
    ///
    /// ### 中文
    /// 阻塞直到触发或超过 `deadline`（`None` 表示无截止时间）。返回是否已触发。
    pub(super) fn wait_until(&self, deadline: Option<Instant>) -> bool {
        match &self.kind {
            PointKind::Timeline { signaled_at, cond } => {
                let mut state = signaled_at.lock();
                while state.is_none() {
                    match deadline {
                        Some(deadline) => {
                            if cond.wait_until(&mut state, deadline).timed_out() {
                                return state.is_some();
                            }
                        }
                        None => cond.wait(&mut state),
                    }
                }
                true
            }
            PointKind::Merged(parents) => parents.iter().all(|p| p.wait_until(deadline)),
        }
    }
}

/// ### English
/// Signaling side of a pending fence. Signals on `signal()` or, at the latest, on drop, so a
/// producer that goes away never leaves waiters parked until their timeout.
///
/// ### 中文
/// 待定 fence 的触发端。在 `signal()` 时触发，最迟在 drop 时触发，
/// 因此生产者消失时不会让等待者一直挂起到超时。
pub struct FenceSignaler {
    point: Option<Arc<SyncPoint>>,
    fd: i32,
}

impl FenceSignaler {
    pub(super) fn new(point: Arc<SyncPoint>, fd: i32) -> Self {
        Self {
            point: Some(point),
            fd,
        }
    }

    pub fn signal(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(point) = self.point.take() {
            point.signal();
            tracing::trace!(fd = self.fd, "fence signaled");
        }
    }
}

impl Drop for FenceSignaler {
    fn drop(&mut self) {
        self.fire();
    }
}

impl std::fmt::Debug for FenceSignaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FenceSignaler")
            .field("fd", &self.fd)
            .field("fired", &self.point.is_none())
            .finish()
    }
}
