//! ### English
//! Per-surface damage accumulation.
//!
//! During a frame, damage rects are unioned into the current dirty region. At the end of the
//! frame the region is pushed into a fixed-depth history ring and widened by buffer age: a
//! buffer whose content is `age` frames old must redraw everything damaged in the last `age`
//! frames. Unknown age, or an age older than the recorded history, falls back to the whole
//! surface. Every reported region is conservative (a superset of the true damage).
//!
//! ### 中文
//! 单个 surface 的 damage 累积。
//!
//! 帧内将 damage 矩形并入当前脏区。帧结束时将脏区压入固定深度的历史环，并按 buffer age 扩展：
//! 内容为 `age` 帧之前的缓冲区必须重绘最近 `age` 帧内的所有损坏区域。age 未知或超过已记录历史时
//! 回退为整个 surface。报告的区域总是保守的（真实 damage 的超集）。

use super::types::Rect;

pub const DEFAULT_HISTORY_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct DirtyRegionManager {
    surface_rect: Rect,
    dirty_region: Rect,
    history: Vec<Rect>,
    /// ### English
    /// Next write position in `history`.
    ///
    /// ### 中文
    /// `history` 中下一个写入位置。
    history_head: usize,
    history_len: usize,
    buffer_age: u32,
    offset_x: i32,
    offset_y: i32,
}

impl Default for DirtyRegionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyRegionManager {
    pub fn new() -> Self {
        Self::with_history_depth(DEFAULT_HISTORY_DEPTH)
    }

    /// ### English
    /// Manager with a custom history depth (at least 1).
    ///
    /// ### 中文
    /// 自定义历史深度（至少为 1）的管理器。
    pub fn with_history_depth(depth: usize) -> Self {
        Self {
            surface_rect: Rect::default(),
            dirty_region: Rect::default(),
            history: vec![Rect::default(); depth.max(1)],
            history_head: 0,
            history_len: 0,
            buffer_age: 0,
            offset_x: 0,
            offset_y: 0,
        }
    }

    /// ### English
    /// Sets the surface bounds. Negative sizes are rejected and leave the bounds unchanged.
    ///
    /// ### 中文
    /// 设置 surface 边界。负尺寸被拒绝且不修改边界。
    pub fn set_surface_size(&mut self, width: i32, height: i32) -> bool {
        if width < 0 || height < 0 {
            return false;
        }
        self.surface_rect = Rect::new(0, 0, width, height);
        true
    }

    pub fn surface_rect(&self) -> Rect {
        self.surface_rect
    }

    /// ### English
    /// Sets the age of the buffer about to be drawn. A negative age resets it to 0 (unknown) and
    /// returns `false`.
    ///
    /// ### 中文
    /// 设置即将绘制的缓冲区的 age。负值会重置为 0（未知）并返回 `false`。
    pub fn set_buffer_age(&mut self, age: i32) -> bool {
        match u32::try_from(age) {
            Ok(age) => {
                self.buffer_age = age;
                true
            }
            Err(_) => {
                self.buffer_age = 0;
                false
            }
        }
    }

    pub fn buffer_age(&self) -> u32 {
        self.buffer_age
    }

    pub fn merge_dirty_rect(&mut self, rect: &Rect) {
        if rect.is_empty() {
            return;
        }
        self.dirty_region = self.dirty_region.join(rect);
    }

    /// ### English
    /// Merges flush damage, clipped to the surface.
    ///
    /// ### 中文
    /// 合并 flush 携带的 damage（裁剪到 surface 内）。
    pub fn merge_damage(&mut self, damage: &Rect) {
        let clipped = damage.intersect(&self.surface_rect);
        self.merge_dirty_rect(&clipped);
    }

    pub fn dirty_region(&self) -> Rect {
        self.dirty_region
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_region.is_empty()
    }

    /// ### English
    /// Clears the current frame's region; history is kept.
    ///
    /// ### 中文
    /// 清空当前帧的脏区；保留历史。
    pub fn clear(&mut self) {
        self.dirty_region = Rect::default();
    }

    pub fn reset_history(&mut self) {
        self.history_head = 0;
        self.history_len = 0;
    }

    /// ### English
    /// Ends the frame: records the current region and widens it by buffer age.
    ///
    /// ### 中文
    /// 结束当前帧：记录当前脏区并按 buffer age 扩展。
    pub fn update_dirty(&mut self) {
        let current = self.dirty_region;
        self.push_history(current);
        self.dirty_region = self.merge_history(self.buffer_age, current);
    }

    fn push_history(&mut self, rect: Rect) {
        let depth = self.history.len();
        self.history[self.history_head] = rect;
        self.history_head = (self.history_head + 1) % depth;
        self.history_len = (self.history_len + 1).min(depth);
    }

    /// ### English
    /// Recorded region `back` frames ago (0 = most recent).
    ///
    /// ### 中文
    /// `back` 帧之前记录的区域（0 = 最近一帧）。
    pub fn history(&self, back: usize) -> Option<Rect> {
        if back >= self.history_len {
            return None;
        }
        let depth = self.history.len();
        Some(self.history[(self.history_head + depth - 1 - back) % depth])
    }

    /// ### English
    /// Unions `rect` with the `age` most recent history entries. Age 0 or an age beyond the
    /// recorded history yields the full surface.
    ///
    /// ### 中文
    /// 将 `rect` 与最近 `age` 条历史合并。age 为 0 或超出已记录历史时返回整个 surface。
    pub fn merge_history(&self, age: u32, rect: Rect) -> Rect {
        let age = age as usize;
        if age == 0 || age > self.history_len {
            return self.surface_rect;
        }
        (0..age)
            .filter_map(|back| self.history(back))
            .fold(rect, |acc, past| acc.join(&past))
    }

    /// ### English
    /// Expands `rect` outward to multiples of `bits`. Never shrinks.
    ///
    /// Far edges past `i32::MAX` are clamped there; when the aligned rect is not representable
    /// at all, `rect` is returned unchanged.
    ///
    /// ### 中文
    /// 将 `rect` 向外扩展到 `bits` 的整数倍。从不缩小。
    ///
    /// 超过 `i32::MAX` 的右/下边界钳制到该值；对齐结果完全无法表示时原样返回 `rect`。
    pub fn get_pixel_aligned_rect(rect: &Rect, bits: i32) -> Rect {
        if bits <= 1 || rect.is_empty() {
            return *rect;
        }
        let bits = i64::from(bits);
        let max = i64::from(i32::MAX);
        let floor = |v: i32| i64::from(v).div_euclid(bits) * bits;
        let ceil = |v: i32| (-(-i64::from(v)).div_euclid(bits) * bits).min(max);

        let left = floor(rect.x);
        let top = floor(rect.y);
        let right = ceil(rect.right());
        let bottom = ceil(rect.bottom());
        match (
            i32::try_from(left),
            i32::try_from(top),
            i32::try_from(right - left),
            i32::try_from(bottom - top),
        ) {
            (Ok(x), Ok(y), Ok(w), Ok(h)) => Rect::new(x, y, w, h),
            _ => *rect,
        }
    }

    /// ### English
    /// Converts between top-left and bottom-left origin: `y' = H − y − h`.
    ///
    /// ### 中文
    /// 在左上与左下原点之间转换：`y' = H − y − h`。
    pub fn get_rect_flip_within_surface(&self, rect: &Rect) -> Rect {
        Rect::new(
            rect.x,
            self.surface_rect.h.saturating_sub(rect.y).saturating_sub(rect.h),
            rect.w,
            rect.h,
        )
    }

    pub fn get_dirty_region_flip_within_surface(&self) -> Rect {
        self.get_rect_flip_within_surface(&self.dirty_region)
    }

    /// ### English
    /// Translation applied by `get_offseted_dirty_region`, for damage tracked in node-local
    /// coordinates.
    ///
    /// ### 中文
    /// `get_offseted_dirty_region` 使用的平移量，用于以节点局部坐标记录的 damage。
    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset_x = x;
        self.offset_y = y;
    }

    pub fn get_offseted_dirty_region(&self) -> Rect {
        self.dirty_region.offset(self.offset_x, self.offset_y)
    }

    pub fn clip_dirty_rect_within_surface(&mut self) {
        self.dirty_region = self.dirty_region.intersect(&self.surface_rect);
    }
}
