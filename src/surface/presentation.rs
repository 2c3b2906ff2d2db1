//! ### English
//! Consumer-side cache matching acquired buffers to vsync deadlines.
//!
//! Buffers are cached in arrival order. At each vsync the consumer asks for the newest buffer
//! whose timestamp is not later than the vsync time; older cached buffers that it supersedes
//! are handed to the superseded listener so they can be released.
//!
//! ### 中文
//! 消费者侧缓存：将 acquire 的缓冲区与 vsync 截止时间匹配。
//!
//! 缓冲区按到达顺序缓存。每次 vsync 时取时间戳不晚于 vsync 的最新缓冲区；被其取代的更早缓存
//! 交给 superseded 监听器，以便释放。

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::role::AcquiredBuffer;

/// ### English
/// One cached entry. The empty sentinel has no buffer and timestamp 0.
///
/// ### 中文
/// 单条缓存。空哨兵没有缓冲区且时间戳为 0。
#[derive(Debug, Default)]
pub struct CachedBuffer {
    pub buffer: Option<AcquiredBuffer>,
    pub timestamp: i64,
}

impl CachedBuffer {
    pub fn new(buffer: Option<AcquiredBuffer>, timestamp: i64) -> Self {
        Self { buffer, timestamp }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// ### English
    /// Entry for an acquired buffer, stamped with its flush timestamp.
    ///
    /// ### 中文
    /// 以 flush 时间戳标记的已 acquire 缓冲区条目。
    pub fn from_acquired(buffer: AcquiredBuffer) -> Self {
        let timestamp = buffer.timestamp();
        Self::new(Some(buffer), timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_none() && self.timestamp == 0
    }
}

pub type SupersededListener = Box<dyn FnMut(CachedBuffer) + Send>;

#[derive(Default)]
pub struct BufferPresentationCache {
    entries: Mutex<VecDeque<CachedBuffer>>,
    on_superseded: Mutex<Option<SupersededListener>>,
}

impl BufferPresentationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// ### English
    /// Receives entries dropped by `get_buffer_from_cache` and `clean_cache`.
    ///
    /// ### 中文
    /// 接收被 `get_buffer_from_cache` 与 `clean_cache` 丢弃的条目。
    pub fn register_superseded_listener(&self, listener: impl FnMut(CachedBuffer) + Send + 'static) {
        *self.on_superseded.lock() = Some(Box::new(listener));
    }

    pub fn cache_buffer(&self, entry: CachedBuffer) {
        self.entries.lock().push_back(entry);
    }

    /// ### English
    /// Returns the entry with the largest timestamp `<= vsync` (earliest inserted on ties), or
    /// the empty sentinel when every entry is later than `vsync`.
    ///
    /// ### 中文
    /// 返回时间戳 `<= vsync` 中最大的条目（相同时取最早插入的），若所有条目都晚于 `vsync`
    /// 则返回空哨兵。
    pub fn get_buffer_from_cache(&self, vsync: i64) -> CachedBuffer {
        let (selected, superseded) = {
            let mut entries = self.entries.lock();
            let mut best: Option<(usize, i64)> = None;
            for (index, entry) in entries.iter().enumerate() {
                if entry.timestamp > vsync {
                    continue;
                }
                if best.is_none_or(|(_, ts)| entry.timestamp > ts) {
                    best = Some((index, entry.timestamp));
                }
            }
            let Some((index, ts)) = best else {
                return CachedBuffer::empty();
            };

            let mut superseded = Vec::new();
            let mut kept = VecDeque::with_capacity(entries.len());
            let mut selected = None;
            for (i, entry) in entries.drain(..).enumerate() {
                if i == index {
                    selected = Some(entry);
                } else if i < index && entry.timestamp <= ts {
                    superseded.push(entry);
                } else {
                    kept.push_back(entry);
                }
            }
            *entries = kept;
            (selected.unwrap_or_default(), superseded)
        };

        if !superseded.is_empty() {
            tracing::trace!(
                vsync,
                count = superseded.len(),
                "cached buffers superseded"
            );
        }
        self.hand_off(superseded);
        selected
    }

    /// ### English
    /// Drops every cached entry, handing each to the superseded listener.
    ///
    /// ### 中文
    /// 丢弃所有缓存条目，并逐条交给 superseded 监听器。
    pub fn clean_cache(&self) {
        let drained: Vec<CachedBuffer> = self.entries.lock().drain(..).collect();
        self.hand_off(drained);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn hand_off(&self, entries: Vec<CachedBuffer>) {
        if entries.is_empty() {
            return;
        }
        let mut listener = self.on_superseded.lock();
        match listener.as_mut() {
            Some(listener) => entries.into_iter().for_each(|entry| listener(entry)),
            None => tracing::debug!(count = entries.len(), "superseded buffers dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn cache_with(timestamps: &[i64]) -> BufferPresentationCache {
        let cache = BufferPresentationCache::new();
        for &ts in timestamps {
            cache.cache_buffer(CachedBuffer::new(None, ts));
        }
        cache
    }

    #[test]
    fn selects_latest_not_after_vsync() {
        assert!(cache_with(&[100, 200]).get_buffer_from_cache(50).is_empty());
        assert_eq!(cache_with(&[100, 200]).get_buffer_from_cache(150).timestamp, 100);
        assert_eq!(cache_with(&[100, 200]).get_buffer_from_cache(300).timestamp, 200);
        assert_eq!(cache_with(&[100, 200]).get_buffer_from_cache(200).timestamp, 200);
    }

    #[test]
    fn empty_cache_yields_sentinel() {
        let entry = BufferPresentationCache::new().get_buffer_from_cache(1_000);
        assert!(entry.is_empty());
        assert!(entry.buffer.is_none());
    }

    #[test]
    fn selection_removes_superseded_entries() {
        let cache = cache_with(&[100, 300, 200]);
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let sink = dropped.clone();
        cache.register_superseded_listener(move |entry| sink.lock().push(entry.timestamp));

        assert_eq!(cache.get_buffer_from_cache(250).timestamp, 200);
        assert_eq!(*dropped.lock(), vec![100]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_buffer_from_cache(300).timestamp, 300);
        assert!(cache.is_empty());
    }

    #[test]
    fn ties_pick_the_earliest_insertion() {
        let cache = BufferPresentationCache::new();
        cache.cache_buffer(CachedBuffer::new(None, 100));
        cache.cache_buffer(CachedBuffer::new(None, 100));
        assert_eq!(cache.get_buffer_from_cache(100).timestamp, 100);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clean_cache_hands_everything_off() {
        let cache = cache_with(&[1, 2, 3]);
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        cache.register_superseded_listener(move |_| *sink.lock() += 1);
        cache.clean_cache();
        assert_eq!(*count.lock(), 3);
        assert!(cache.is_empty());
    }
}
