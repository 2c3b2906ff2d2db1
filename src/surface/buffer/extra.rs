//! ### English
//! Per-buffer metadata map keyed by string or integer.
//!
//! ### 中文
//! 以字符串或整数为键的缓冲区元数据表。

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::surface::error::{SurfaceError, SurfaceResult};
use crate::surface::types::SURFACE_MAX_USER_DATA_COUNT;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtraKey {
    Id(u32),
    Name(String),
}

impl From<u32> for ExtraKey {
    fn from(id: u32) -> Self {
        ExtraKey::Id(id)
    }
}

impl From<&str> for ExtraKey {
    fn from(name: &str) -> Self {
        ExtraKey::Name(name.to_owned())
    }
}

impl From<String> for ExtraKey {
    fn from(name: String) -> Self {
        ExtraKey::Name(name)
    }
}

/// ### English
/// Typed extra-data value. `Double` travels as its IEEE-754 bit pattern so NaN and infinities
/// survive the parcel.
///
/// ### 中文
/// 类型化的 extra data 值。`Double` 以 IEEE-754 位模式传输，NaN 与无穷值可经 parcel 完整往返。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtraValue {
    Int32(i32),
    Int64(i64),
    Double(#[serde(with = "f64_bits")] f64),
    Str(String),
}

mod f64_bits {
    use super::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.to_bits())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        u64::deserialize(deserializer).map(f64::from_bits)
    }
}

impl From<i32> for ExtraValue {
    fn from(v: i32) -> Self {
        ExtraValue::Int32(v)
    }
}

impl From<i64> for ExtraValue {
    fn from(v: i64) -> Self {
        ExtraValue::Int64(v)
    }
}

impl From<f64> for ExtraValue {
    fn from(v: f64) -> Self {
        ExtraValue::Double(v)
    }
}

impl From<&str> for ExtraValue {
    fn from(v: &str) -> Self {
        ExtraValue::Str(v.to_owned())
    }
}

impl From<String> for ExtraValue {
    fn from(v: String) -> Self {
        ExtraValue::Str(v)
    }
}

/// ### English
/// Bounded metadata map. Overwriting an existing key never counts against the bound.
///
/// ### 中文
/// 有上限的元数据表。覆盖已有键不计入上限。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraData {
    entries: HashMap<ExtraKey, ExtraValue>,
}

impl ExtraData {
    pub fn set(&mut self, key: ExtraKey, value: ExtraValue) -> SurfaceResult<()> {
        if !self.entries.contains_key(&key) && self.entries.len() >= SURFACE_MAX_USER_DATA_COUNT {
            return Err(SurfaceError::InvalidParam);
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &ExtraKey) -> SurfaceResult<&ExtraValue> {
        self.entries.get(key).ok_or(SurfaceError::NoEntry)
    }

    pub fn get_i32(&self, key: &ExtraKey) -> SurfaceResult<i32> {
        match self.get(key)? {
            ExtraValue::Int32(v) => Ok(*v),
            _ => Err(SurfaceError::InvalidParam),
        }
    }

    pub fn get_i64(&self, key: &ExtraKey) -> SurfaceResult<i64> {
        match self.get(key)? {
            ExtraValue::Int64(v) => Ok(*v),
            _ => Err(SurfaceError::InvalidParam),
        }
    }

    pub fn get_f64(&self, key: &ExtraKey) -> SurfaceResult<f64> {
        match self.get(key)? {
            ExtraValue::Double(v) => Ok(*v),
            _ => Err(SurfaceError::InvalidParam),
        }
    }

    pub fn get_str(&self, key: &ExtraKey) -> SurfaceResult<&str> {
        match self.get(key)? {
            ExtraValue::Str(v) => Ok(v),
            _ => Err(SurfaceError::InvalidParam),
        }
    }

    pub fn remove(&mut self, key: &ExtraKey) -> Option<ExtraValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn to_entries(&self) -> Vec<(ExtraKey, ExtraValue)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn from_entries(entries: Vec<(ExtraKey, ExtraValue)>) -> SurfaceResult<Self> {
        let mut data = ExtraData::default();
        for (key, value) in entries {
            data.set(key, value)?;
        }
        Ok(data)
    }
}
