use dpi::PhysicalSize;

use super::BufferQueue;
use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::flags::BufferUsage;
use crate::surface::types::{SURFACE_MAX_HEIGHT, SURFACE_MAX_USER_DATA_COUNT, SURFACE_MAX_WIDTH};

impl BufferQueue {
    /// ### English
    /// Sets the size producers should request by default. Both sides must be in `(0, 7680]`.
    ///
    /// ### 中文
    /// 设置生产者默认请求的尺寸。宽高都必须位于 `(0, 7680]`。
    pub fn set_default_width_and_height(&self, width: i32, height: i32) -> SurfaceResult<()> {
        if width <= 0 || width > SURFACE_MAX_WIDTH || height <= 0 || height > SURFACE_MAX_HEIGHT {
            return Err(SurfaceError::InvalidParam);
        }
        self.state.lock().default_size = PhysicalSize::new(width, height);
        Ok(())
    }

    pub fn default_size(&self) -> PhysicalSize<i32> {
        self.state.lock().default_size
    }

    pub fn set_default_usage(&self, usage: BufferUsage) {
        self.state.lock().default_usage = usage;
    }

    pub fn default_usage(&self) -> BufferUsage {
        self.state.lock().default_usage
    }

    /// ### English
    /// Stores a string pair on the queue. New keys beyond the entry bound fail `InvalidParam`.
    ///
    /// ### 中文
    /// 在队列上保存字符串键值。超过条目上限的新键返回 `InvalidParam`。
    pub fn set_user_data(&self, key: &str, value: &str) -> SurfaceResult<()> {
        let mut state = self.state.lock();
        if !state.user_data.contains_key(key)
            && state.user_data.len() >= SURFACE_MAX_USER_DATA_COUNT
        {
            return Err(SurfaceError::InvalidParam);
        }
        state.user_data.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    pub fn user_data(&self, key: &str) -> Option<String> {
        self.state.lock().user_data.get(key).cloned()
    }
}
